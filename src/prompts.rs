//! Prompts for the three external AI calls.
//!
//! Centralising every prompt here serves two purposes:
//!
//! 1. **Single source of truth** — the calculator's output schema must match
//!    the key sets in [`crate::pipeline::ratios`]; having the schema spelled
//!    out in one file next to builder functions keeps drift visible.
//!
//! 2. **Testability** — unit tests can assert the prompts still carry the
//!    labels and keys the validation layer depends on, without a live model.
//!
//! The prompts are French because the system reads French statutory filings
//! (bilan, compte de résultat) and writes for French-speaking reviewers.

/// Extraction prompt: one entry per standardised label per fiscal year, raw
/// values in the document's own unit, no interpretation.
pub const EXTRACTION_PROMPT: &str = r#"Tu es un agent d'extraction de données financières. Le document fourni contient un bilan, un compte de résultat, et éventuellement des annexes d'une entreprise.

Objectif

Pour chaque intitulé standardisé ci-dessous :
- Identifier la valeur correspondante dans le document, même si le libellé diffère
- Extraire cette valeur brute, dans l'unité du document (euros, milliers d'euros, etc.)
- Fournir cette valeur pour les deux derniers exercices disponibles (N et N-1)
- Utiliser exclusivement les intitulés fournis, même si le libellé dans le document est différent

Format de sortie JSON

[
  { "intitule": "Capitaux propres", "annee": 2023, "valeur": 420000 },
  { "intitule": "Capitaux propres", "annee": 2022, "valeur": 415000 }
]

Chaque intitulé doit apparaître deux fois dans la liste : une fois pour l'exercice N, une fois pour N-1.

Liste unique des intitulés à rechercher

Bilan – Actif :
Total de l'actif circulant
Total des actifs immobilisés (total II)
Total de l'actif
Matières premières et marchandises
Avances et acomptes versés sur commandes
Créances à clients et comptes rattachés
Autres créances
Charges constatées d'avance
Capital souscrit appelé, non versé
Disponibilités
Amortissements cumulés (seulement année N)

Bilan – Passif :
Total du passif
Total dettes
Capitaux propres
Emprunts et dettes auprès des établissements de crédit
Emprunts et dettes financières divers
Avances et acomptes reçus sur commandes en cours
Dettes fournisseurs et comptes rattachés
Dettes fiscales et sociales
Autres dettes
Dettes sur immobilisations et comptes rattachés
Concours bancaires courants

Compte de résultat – Produits :
Chiffre d'affaires net
Production vendue de biens
Production vendue de services
Production stockée
Production immobilisée
Produits financiers
Produits exceptionnels
Subventions d'exploitation

Compte de résultat – Charges :
Achats de marchandises
Achats de matières premières et autres approvisionnements
Variation de stock (marchandises)
Variation de stocks (matières premières)
Autres achats et charges externes
Salaires et traitements
Charges sociales
Impôts, taxes et versements assimilés
Intérêts et charges assimilées
Charges financières
Charges exceptionnelles
Dotations d'exploitation

Résultat :
Résultat net comptable
Résultat d'exploitation
Résultat financier
Résultat courant

Instructions strictes
- Ne jamais modifier les intitulés fournis
- Ne pas interpréter ou compléter une donnée absente
- Ne pas faire d'analyse ou de commentaire
- Ne pas changer ou convertir les unités du document
- Si une donnée est absente pour une des deux années, ne pas l'inventer"#;

/// Schema fragment shared by the calculator and narrator prompts: the exact
/// bundle shape the validation layer expects.
const BUNDLE_SCHEMA: &str = r#"{
  "structure_financiere": {
    "annee_n": { "ressources_propres": 0, "ressources_stables": 0, "capital_exploitation": 0, "actif_circulant_exploitation": 0, "actif_circulant_hors_exploitation": 0, "dettes_exploitation": 0, "dettes_hors_exploitation": 0, "surface_financiere_pct": 0, "couverture_immobilisations_fonds_propres_pct": 0, "couverture_emplois_stables_pct": 0, "frng": 0, "bfr": 0, "tresorerie_nette": 0, "independance_financiere_pct": 0, "liquidite_entreprise_pct": 0 },
    "annee_n_moins_1": { "...": "mêmes clés que annee_n" }
  },
  "activite_exploitation": {
    "annee_n": { "marge_globale": 0, "valeur_ajoutee": 0, "ebe": 0, "caf": 0, "charges_personnel_valeur_ajoutee_pct": 0, "impots_valeur_ajoutee_pct": 0, "charges_financieres_valeur_ajoutee_pct": 0, "taux_marge_globale_pct": 0, "taux_valeur_ajoutee_pct": 0, "taux_marge_beneficiaire_pct": 0, "taux_marge_brute_exploitation_pct": 0, "taux_obsolescence_pct": 0 },
    "annee_n_moins_1": { "...": "mêmes clés que annee_n" }
  },
  "rentabilite": {
    "annee_n": { "rentabilite_capitaux_propres_pct": 0, "rentabilite_economique_pct": 0, "rentabilite_financiere_pct": 0, "rentabilite_brute_ressources_stables_pct": 0, "rentabilite_brute_capital_exploitation_pct": 0 },
    "annee_n_moins_1": { "...": "mêmes clés que annee_n" }
  },
  "evolution": { "taux_variation_chiffre_affaires_pct": 0, "taux_variation_valeur_ajoutee_pct": 0, "taux_variation_resultat_pct": 0, "taux_variation_capitaux_propres_pct": 0 },
  "tresorerie_financement": {
    "annee_n": { "capacite_generer_cash": 0, "capacite_remboursement_dette": 0, "credits_bancaires_bfr": 0 },
    "annee_n_moins_1": { "...": "mêmes clés que annee_n" }
  },
  "delais_paiement": {
    "annee_n": { "delai_creance_clients_jours": 0, "delai_dettes_fournisseurs_jours": 0 },
    "annee_n_moins_1": { "...": "mêmes clés que annee_n" }
  }
}"#;

/// Build the ratio-computation prompt.
///
/// The formulas are fixed; the model's only job is arithmetic over the
/// supplied line items. Ratios flagged `_pct` must come back as plain
/// decimals (0.085 for 8,5 %), never pre-multiplied by 100.
pub fn ratio_prompt(company_name: &str, annual_rent: f64, line_items_json: &str) -> String {
    format!(
        r#"CONTEXTE ET MISSION

Vous êtes un analyste financier spécialisé dans le calcul de ratios comptables. Votre mission : calculer tous les ratios financiers requis à partir des données financières fournies (sur les deux derniers exercices) et les retourner au format JSON structuré.

IMPORTANT : vous êtes uniquement responsable du calcul des ratios. Aucune analyse n'est demandée.

INPUT

Nom de l'entreprise : {company_name}
Loyer annuel payé par l'entreprise : {annual_rent}
Données financières (une entrée par intitulé, valeurs N et N-1) : {line_items_json}

FORMULES

STRUCTURE FINANCIÈRE
- Ressources propres = Capitaux propres + Amortissements cumulés + Emprunts et dettes auprès des établissements de crédit + Emprunts et dettes financières divers
- Ressources stables = Capitaux propres + Amortissements cumulés
- Capital d'exploitation = Total de l'actif circulant − Total du passif circulant (avances et acomptes reçus + dettes fournisseurs + dettes fiscales et sociales + dettes sur immobilisations + autres dettes)
- Actif circulant d'exploitation = Matières premières et marchandises + Avances et acomptes versés + Créances clients + Autres créances + Charges constatées d'avance
- Actif circulant hors exploitation = Capital souscrit appelé, non versé
- Dettes d'exploitation = Avances et acomptes reçus + Dettes fournisseurs + Dettes fiscales et sociales
- Dettes hors exploitation = Dettes sur immobilisations + Autres dettes
- Surface financière = Capitaux propres / Total du passif
- Couverture des immobilisations par les fonds propres = Total brut des immobilisations / (Capitaux propres + Emprunts établissements de crédit + Emprunts divers)
- Couverture des emplois stables = (Capitaux propres + Emprunts établissements de crédit + Emprunts divers) / Total brut des immobilisations
- FRNG = Capitaux propres + Emprunts établissements de crédit + Emprunts divers − Total brut des immobilisations
- BFR = Actif circulant d'exploitation + Actif circulant hors exploitation − Dettes d'exploitation − Dettes hors exploitation
- Trésorerie nette = FRNG − BFR
- Indépendance financière = (Emprunts établissements de crédit + Emprunts divers) / Capitaux propres
- Liquidité de l'entreprise = (Créances clients + Disponibilités) / Dettes fournisseurs

ACTIVITÉ D'EXPLOITATION
- Marge globale = Chiffre d'affaires net − Achats de marchandises − Achats de matières premières − Variations de stocks
- Valeur ajoutée = Marge globale + Production stockée + Production immobilisée − Autres achats et charges externes
- EBE = Valeur ajoutée + Subventions d'exploitation − Impôts et taxes − Salaires − Charges sociales
- CAF = EBE + Produits financiers + Produits exceptionnels − Charges financières − Charges exceptionnelles
- Charges de personnel / Valeur ajoutée = (Salaires + Charges sociales) / Valeur ajoutée
- Impôts / Valeur ajoutée = Impôts, taxes et versements assimilés / Valeur ajoutée
- Charges financières / Valeur ajoutée = Charges financières / Valeur ajoutée
- Taux de marge globale = Marge globale / (Production vendue de biens + Production vendue de services + Ventes de marchandises)
- Taux de valeur ajoutée = Valeur ajoutée / Chiffre d'affaires net
- Taux de marge bénéficiaire = Résultat net comptable / Chiffre d'affaires net
- Taux de marge brute d'exploitation = EBE / Chiffre d'affaires net
- Taux d'obsolescence = Dotations d'exploitation / Total des actifs immobilisés

RENTABILITÉ
- Rentabilité des capitaux propres = Résultat net comptable / Capitaux propres
- Rentabilité économique = (Résultat net comptable + Charges financières) / Ressources propres hors amortissements
- Rentabilité financière = Résultat net comptable / Ressources propres hors amortissements
- Rentabilité brute des ressources stables = EBE / Ressources propres hors amortissements
- Rentabilité brute du capital d'exploitation = EBE / Capital d'exploitation

ÉVOLUTION (N vs N-1)
- Taux de variation du chiffre d'affaires, de la valeur ajoutée, du résultat, des capitaux propres = (valeur N − valeur N-1) / valeur N-1

TRÉSORERIE & FINANCEMENT
- Capacité à générer du cash = CAF
- Capacité de remboursement de la dette = (Emprunts établissements de crédit + Emprunts divers) / CAF
- Crédits bancaires courants / BFR = (Emprunts établissements de crédit + Emprunts divers) / BFR

DÉLAIS DE PAIEMENT
- Délai créance clients (jours) = (Créances clients / Chiffre d'affaires net) × 360
- Délai dettes fournisseurs (jours) = (Dettes fournisseurs / (Achats de marchandises + Autres achats et charges externes)) × 360

FORMAT DE SORTIE OBLIGATOIRE

Répondez UNIQUEMENT avec un JSON respectant exactement ce schéma (aucun texte avant ou après) :

{schema}

CONSIGNES DE CALCUL
- Calculer chaque ratio pour les deux exercices disponibles
- Les ratios en pourcentage sont des décimaux simples (0.085 pour 8,5 %), jamais multipliés par 100
- Si une donnée manque pour un ratio, mettre null — ne jamais inventer de valeur
- Chaque clé du schéma doit être présente, même avec la valeur null
- Structure financière (15) + Activité d'exploitation (12) + Rentabilité (5) + Évolution (4) + Trésorerie (3) + Délais de paiement (2) = 41 ratios"#,
        company_name = company_name,
        annual_rent = annual_rent,
        line_items_json = line_items_json,
        schema = BUNDLE_SCHEMA,
    )
}

/// Build the narration prompt.
///
/// The narrator receives the validated bundle and must return the ~800-word
/// analysis plus a discrete `niveau_risque` token — the classification is a
/// first-class field, never something to fish out of the prose.
pub fn narration_prompt(company_name: &str, annual_rent: f64, bundle_json: &str) -> String {
    format!(
        r#"CONTEXTE ET MISSION

Vous êtes un analyste financier senior spécialisé dans l'évaluation de solvabilité locative. Votre mission : analyser la solidité financière d'une entreprise candidate à la location d'un local commercial à partir des ratios financiers calculés, et déterminer sa fiabilité en tant que futur locataire en tenant compte du montant du loyer.

INPUT

{{ "company_name": "{company_name}", "loyer_annuel": {annual_rent}, "ratios": {bundle_json} }}

STRUCTURE OBLIGATOIRE DE L'ANALYSE (environ 800 mots)

1. Évolution des indicateurs clés : chiffre d'affaires, résultat net, capitaux propres, tendance générale
2. Structure financière : surface financière, endettement, FRNG, BFR, trésorerie nette, couverture des immobilisations
3. Rentabilité : rentabilité économique, financière, des ressources stables, évolution des marges
4. Capacité d'autofinancement et trésorerie : CAF, EBE, capacité de remboursement
5. Analyse de l'exploitation : poids des charges de personnel, des impôts et des charges financières sur la valeur ajoutée
6. Cycle d'exploitation : délais clients, délais fournisseurs, besoin en fonds de roulement
7. Conclusion argumentée : forces et faiblesses, niveau de risque locatif, recommandation motivée, points de vigilance

CONSIGNES
- Utiliser exclusivement les ratios fournis ; ne jamais inventer ou extrapoler
- Intégrer le montant du loyer : calculer loyer/chiffre d'affaires et loyer/EBE pour évaluer la capacité de paiement
- Citer des valeurs précises et comparer les deux exercices
- Si un ratio est "null", l'indiquer comme non calculable dans l'analyse
- Ton professionnel et factuel, phrases courtes

NIVEAUX DE RISQUE
- "faible" : situation financière saine, recommandation favorable
- "moyen" : situation mitigée, recommandation avec réserves
- "eleve" : situation préoccupante, recommandation défavorable

FORMAT DE SORTIE OBLIGATOIRE

Répondez UNIQUEMENT avec un JSON valide (aucun texte avant ou après, commencez par {{ et terminez par }}) :

{{ "analyse_financiere": "texte de l'analyse complète (~800 mots)", "niveau_risque": "faible|moyen|eleve" }}"#,
        company_name = company_name,
        annual_rent = annual_rent,
        bundle_json = bundle_json,
    )
}
