//! Key-figure projection: display strings for the response's `chiffres_cles`.
//!
//! This is presentation, not computation. Every value here is read from the
//! raw line items or the ratio bundle and formatted for display; nothing is
//! re-derived that a stage already produced. Amounts keep the document's own
//! unit (statements are filed in K€) and are space-grouped; percentage keys
//! convert the bundle's plain decimals for display. Gaps render as
//! "Non disponible" — the key set is fixed regardless of data completeness.

use std::collections::BTreeMap;

use crate::pipeline::extract::RawLineItems;
use crate::pipeline::ratios::{FiscalYear, RatioBundle, RatioCategory};

/// Key-figure key → formatted display string.
pub type KeyFigures = BTreeMap<String, String>;

/// The fixed key set: 14 business figures, each for N and N−1.
pub const KEY_FIGURE_BASES: &[&str] = &[
    "chiffre_affaires",
    "marge_globale",
    "taux_marge_globale",
    "valeur_ajoutee",
    "taux_valeur_ajoutee",
    "ebe",
    "resultat_exploitation",
    "resultat_financier",
    "resultat_courant",
    "resultat_exercice",
    "marge_exploitation",
    "resultat_net",
    "capitaux_propres",
    "dette_financiere",
];

// Statement labels the projection reads directly.
const REVENUE: &str = "Chiffre d'affaires net";
const OPERATING_RESULT: &str = "Résultat d'exploitation";
const FINANCIAL_RESULT: &str = "Résultat financier";
const ORDINARY_RESULT: &str = "Résultat courant";
const NET_RESULT: &str = "Résultat net comptable";
const EQUITY: &str = "Capitaux propres";
const BANK_DEBT: &str = "Emprunts et dettes auprès des établissements de crédit";
const OTHER_FINANCIAL_DEBT: &str = "Emprunts et dettes financières divers";

/// Build the full key-figure map from the run's line items and ratio bundle.
pub fn project(items: &RawLineItems, ratios: &RatioBundle) -> KeyFigures {
    let mut out = KeyFigures::new();
    for year in [FiscalYear::Current, FiscalYear::Prior] {
        let suffix = match year {
            FiscalYear::Current => "_n",
            FiscalYear::Prior => "_n_moins_1",
        };
        let item = |label: &str| match year {
            FiscalYear::Current => items.current(label),
            FiscalYear::Prior => items.prior(label),
        };
        let ratio = |key: &str| ratios.value(RatioCategory::Exploitation, key, year);

        let revenue = item(REVENUE);
        let operating = item(OPERATING_RESULT);
        let net = item(NET_RESULT);
        // Financial debt is the sum of the two borrowing lines; one missing
        // line does not wipe out the other.
        let debt = match (item(BANK_DEBT), item(OTHER_FINANCIAL_DEBT)) {
            (None, None) => None,
            (a, b) => Some(a.unwrap_or(0.0) + b.unwrap_or(0.0)),
        };
        let operating_margin = match (operating, revenue) {
            (Some(op), Some(rev)) if rev != 0.0 => Some(op / rev),
            _ => None,
        };

        let mut put = |base: &str, text: String| {
            out.insert(format!("{base}{suffix}"), text);
        };
        put("chiffre_affaires", amount(revenue));
        put("marge_globale", amount(ratio("marge_globale")));
        put("taux_marge_globale", percent(ratio("taux_marge_globale_pct")));
        put("valeur_ajoutee", amount(ratio("valeur_ajoutee")));
        put("taux_valeur_ajoutee", percent(ratio("taux_valeur_ajoutee_pct")));
        put("ebe", amount(ratio("ebe")));
        put("resultat_exploitation", amount(operating));
        put("resultat_financier", amount(item(FINANCIAL_RESULT)));
        put("resultat_courant", amount(item(ORDINARY_RESULT)));
        put("resultat_exercice", amount(net));
        put("marge_exploitation", percent(operating_margin));
        put("resultat_net", amount(net));
        put("capitaux_propres", amount(item(EQUITY)));
        put("dette_financiere", amount(debt));
    }
    out
}

/// Format an amount in the statement unit: `152450.0` → `"152 450 K€"`.
fn amount(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{} K€", group_thousands(v)),
        None => "Non disponible".to_string(),
    }
}

/// Format a plain-decimal ratio as a display percentage: `0.085` → `"8,5 %"`.
fn percent(value: Option<f64>) -> String {
    match value {
        Some(v) => {
            let pct = v * 100.0;
            let text = format!("{:.1}", pct).replace('.', ",");
            format!("{text} %")
        }
        None => "Non disponible".to_string(),
    }
}

/// Space-grouped integer rendering, French style.
fn group_thousands(value: f64) -> String {
    let rounded = value.round() as i64;
    let digits = rounded.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(' ');
        }
        grouped.push(ch);
    }
    if rounded < 0 {
        format!("-{grouped}")
    } else {
        grouped
    }
}
