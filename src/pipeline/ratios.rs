//! Computation stage: line items → validated ratio bundle.
//!
//! The ratio formulas themselves live in the calculator prompt (see
//! [`crate::prompts`]); this stage's contract is purely structural. Six fixed
//! categories, each with a fixed key set, 41 ratios in total. The shape is
//! invariant: every key of every category is present in the output even when
//! its value is unknown — `None` means "not computable from the available
//! inputs", which is distinct from zero.
//!
//! Tolerance boundary: a missing *key* inside a category is filled with
//! `None`; a missing *category* is a contract violation and fails the run.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Instant;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{AnalysisError, ComputationReason};
use crate::pipeline::extract::RawLineItems;
use crate::provider::Calculator;

/// The six ratio categories, in presentation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RatioCategory {
    Structure,
    Exploitation,
    Profitability,
    Evolution,
    Treasury,
    PaymentTerms,
}

impl RatioCategory {
    pub const ALL: [RatioCategory; 6] = [
        RatioCategory::Structure,
        RatioCategory::Exploitation,
        RatioCategory::Profitability,
        RatioCategory::Evolution,
        RatioCategory::Treasury,
        RatioCategory::PaymentTerms,
    ];

    /// Key under which the category appears in the wire JSON.
    pub fn json_key(self) -> &'static str {
        match self {
            RatioCategory::Structure => "structure_financiere",
            RatioCategory::Exploitation => "activite_exploitation",
            RatioCategory::Profitability => "rentabilite",
            RatioCategory::Evolution => "evolution",
            RatioCategory::Treasury => "tresorerie_financement",
            RatioCategory::PaymentTerms => "delais_paiement",
        }
    }

    /// The fixed ratio keys of this category.
    pub fn keys(self) -> &'static [&'static str] {
        match self {
            RatioCategory::Structure => STRUCTURE_KEYS,
            RatioCategory::Exploitation => EXPLOITATION_KEYS,
            RatioCategory::Profitability => PROFITABILITY_KEYS,
            RatioCategory::Evolution => EVOLUTION_KEYS,
            RatioCategory::Treasury => TREASURY_KEYS,
            RatioCategory::PaymentTerms => PAYMENT_TERMS_KEYS,
        }
    }

    /// Evolution ratios compare N against N−1, so the category has a single
    /// key set instead of one per year.
    pub fn spans_both_years(self) -> bool {
        matches!(self, RatioCategory::Evolution)
    }
}

impl fmt::Display for RatioCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.json_key())
    }
}

pub const STRUCTURE_KEYS: &[&str] = &[
    "ressources_propres",
    "ressources_stables",
    "capital_exploitation",
    "actif_circulant_exploitation",
    "actif_circulant_hors_exploitation",
    "dettes_exploitation",
    "dettes_hors_exploitation",
    "surface_financiere_pct",
    "couverture_immobilisations_fonds_propres_pct",
    "couverture_emplois_stables_pct",
    "frng",
    "bfr",
    "tresorerie_nette",
    "independance_financiere_pct",
    "liquidite_entreprise_pct",
];

pub const EXPLOITATION_KEYS: &[&str] = &[
    "marge_globale",
    "valeur_ajoutee",
    "ebe",
    "caf",
    "charges_personnel_valeur_ajoutee_pct",
    "impots_valeur_ajoutee_pct",
    "charges_financieres_valeur_ajoutee_pct",
    "taux_marge_globale_pct",
    "taux_valeur_ajoutee_pct",
    "taux_marge_beneficiaire_pct",
    "taux_marge_brute_exploitation_pct",
    "taux_obsolescence_pct",
];

pub const PROFITABILITY_KEYS: &[&str] = &[
    "rentabilite_capitaux_propres_pct",
    "rentabilite_economique_pct",
    "rentabilite_financiere_pct",
    "rentabilite_brute_ressources_stables_pct",
    "rentabilite_brute_capital_exploitation_pct",
];

pub const EVOLUTION_KEYS: &[&str] = &[
    "taux_variation_chiffre_affaires_pct",
    "taux_variation_valeur_ajoutee_pct",
    "taux_variation_resultat_pct",
    "taux_variation_capitaux_propres_pct",
];

pub const TREASURY_KEYS: &[&str] = &[
    "capacite_generer_cash",
    "capacite_remboursement_dette",
    "credits_bancaires_bfr",
];

pub const PAYMENT_TERMS_KEYS: &[&str] = &[
    "delai_creance_clients_jours",
    "delai_dettes_fournisseurs_jours",
];

/// Ratio key → value. `None` means not computable, never zero.
pub type RatioSet = BTreeMap<String, Option<f64>>;

/// A category's ratios for fiscal years N and N−1.
#[derive(Debug, Clone, Serialize)]
pub struct YearlyRatios {
    #[serde(rename = "annee_n")]
    pub current: RatioSet,
    #[serde(rename = "annee_n_moins_1")]
    pub prior: RatioSet,
}

/// The full six-category ratio bundle. Percentage-flavoured ratios are plain
/// decimals (0.085 for 8.5 %), never pre-multiplied — formatting for display
/// is [`crate::pipeline::figures`]' job alone.
#[derive(Debug, Clone, Serialize)]
pub struct RatioBundle {
    #[serde(rename = "structure_financiere")]
    pub structure: YearlyRatios,
    #[serde(rename = "activite_exploitation")]
    pub exploitation: YearlyRatios,
    #[serde(rename = "rentabilite")]
    pub profitability: YearlyRatios,
    pub evolution: RatioSet,
    #[serde(rename = "tresorerie_financement")]
    pub treasury: YearlyRatios,
    #[serde(rename = "delais_paiement")]
    pub payment_terms: YearlyRatios,
}

/// Which fiscal year to read from a bundle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FiscalYear {
    Current,
    Prior,
}

impl RatioBundle {
    /// Read one ratio. Evolution ratios ignore the year argument.
    pub fn value(&self, category: RatioCategory, key: &str, year: FiscalYear) -> Option<f64> {
        let set = match (category, year) {
            (RatioCategory::Evolution, _) => &self.evolution,
            (RatioCategory::Structure, FiscalYear::Current) => &self.structure.current,
            (RatioCategory::Structure, FiscalYear::Prior) => &self.structure.prior,
            (RatioCategory::Exploitation, FiscalYear::Current) => &self.exploitation.current,
            (RatioCategory::Exploitation, FiscalYear::Prior) => &self.exploitation.prior,
            (RatioCategory::Profitability, FiscalYear::Current) => &self.profitability.current,
            (RatioCategory::Profitability, FiscalYear::Prior) => &self.profitability.prior,
            (RatioCategory::Treasury, FiscalYear::Current) => &self.treasury.current,
            (RatioCategory::Treasury, FiscalYear::Prior) => &self.treasury.prior,
            (RatioCategory::PaymentTerms, FiscalYear::Current) => &self.payment_terms.current,
            (RatioCategory::PaymentTerms, FiscalYear::Prior) => &self.payment_terms.prior,
        };
        set.get(key).copied().flatten()
    }
}

/// Run the calculator capability and validate its response into a bundle.
pub async fn run(
    calculator: &dyn Calculator,
    line_items: &RawLineItems,
    company_name: &str,
    annual_rent: f64,
) -> Result<RatioBundle, AnalysisError> {
    let start = Instant::now();
    info!("Computing financial ratios for {}", company_name);

    let raw = calculator
        .compute_ratios(line_items, company_name, annual_rent)
        .await
        .map_err(|e| {
            warn!("Calculator call failed: {}", e);
            AnalysisError::ComputationFailed {
                reason: ComputationReason::UpstreamError,
            }
        })?;

    let bundle = parse_bundle(&raw).map_err(|reason| {
        debug!("Rejected calculator response: {:?}", reason);
        AnalysisError::ComputationFailed { reason }
    })?;

    info!(
        "Ratio bundle validated ({} categories) in {:.2}s",
        RatioCategory::ALL.len(),
        start.elapsed().as_secs_f64()
    );
    Ok(bundle)
}

/// Parse raw calculator text into a normalized [`RatioBundle`].
pub(crate) fn parse_bundle(raw: &str) -> Result<RatioBundle, ComputationReason> {
    let value =
        crate::pipeline::sanitize::parse_object(raw).ok_or(ComputationReason::MalformedResponse)?;
    let mut root = value
        .as_object()
        .ok_or(ComputationReason::MalformedResponse)?;

    // Some responses nest the categories under a "ratios" wrapper.
    if let Some(inner) = root.get("ratios").and_then(|v| v.as_object()) {
        root = inner;
    }

    let yearly = |category: RatioCategory| -> Result<YearlyRatios, ComputationReason> {
        let obj = root
            .get(category.json_key())
            .and_then(|v| v.as_object())
            .ok_or(ComputationReason::MissingCategory)?;
        let current = obj.get("annee_n").and_then(|v| v.as_object());
        let prior = obj.get("annee_n_moins_1").and_then(|v| v.as_object());
        Ok(YearlyRatios {
            current: normalize_set(category.keys(), current),
            prior: normalize_set(category.keys(), prior),
        })
    };

    let structure = yearly(RatioCategory::Structure)?;
    let exploitation = yearly(RatioCategory::Exploitation)?;
    let profitability = yearly(RatioCategory::Profitability)?;
    let treasury = yearly(RatioCategory::Treasury)?;
    let payment_terms = yearly(RatioCategory::PaymentTerms)?;

    let evolution_obj = root
        .get(RatioCategory::Evolution.json_key())
        .and_then(|v| v.as_object())
        .ok_or(ComputationReason::MissingCategory)?;
    let evolution = normalize_set(RatioCategory::Evolution.keys(), Some(evolution_obj));

    Ok(RatioBundle {
        structure,
        exploitation,
        profitability,
        evolution,
        treasury,
        payment_terms,
    })
}

/// Project a wire object onto the fixed key set: known keys take their parsed
/// value, missing keys become `None`, unknown keys are dropped.
fn normalize_set(
    keys: &[&str],
    source: Option<&serde_json::Map<String, serde_json::Value>>,
) -> RatioSet {
    keys.iter()
        .map(|&key| {
            let value = source.and_then(|obj| obj.get(key)).and_then(ratio_value);
            (key.to_string(), value)
        })
        .collect()
}

/// Parse one ratio value. Numbers pass through; the calculator's French
/// "not computable" markers and anything non-numeric become `None`.
///
/// A `%`-suffixed string is a display percentage and is scaled back to the
/// bundle's plain-decimal representation: `"8,5 %"` is 0.085, never 8.5.
fn ratio_value(v: &serde_json::Value) -> Option<f64> {
    match v {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => {
            let trimmed = s.trim();
            let (body, is_percent) = match trimmed.strip_suffix('%') {
                Some(rest) => (rest.trim(), true),
                None => (trimmed, false),
            };
            if body.is_empty() {
                return None;
            }
            let value: f64 = body
                .replace(' ', "")
                .replace('\u{202f}', "")
                .replace(',', ".")
                .parse()
                .ok()?;
            Some(if is_percent { value / 100.0 } else { value })
        }
        _ => None,
    }
}
