//! Extraction stage: document bytes → validated line items.
//!
//! The extractor capability returns raw model text; everything that can go
//! wrong with that text is handled here, not in the provider. The wire schema
//! is one entry per label per fiscal year:
//!
//! ```json
//! [
//!   { "intitule": "Capitaux propres", "annee": 2023, "valeur": 420000 },
//!   { "intitule": "Capitaux propres", "annee": 2022, "valeur": 415000 }
//! ]
//! ```
//!
//! Entries are folded into one [`LineItem`] per label with a current-year and
//! a prior-year slot. The highest year present in the response is taken as N;
//! anything older than N−1 is ignored. Duplicate (label, year) pairs are
//! last-wins.

use std::time::Instant;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{AnalysisError, ExtractionReason};
use crate::pipeline::fetch::FetchedDocument;
use crate::pipeline::sanitize;
use crate::provider::Extractor;

/// One labelled figure from the financial statements, with the value for the
/// two most recent fiscal years where the document provides them.
///
/// Order is extraction order and carries no meaning.
#[derive(Debug, Clone, Serialize)]
pub struct LineItem {
    /// Standardised label (e.g. "Capitaux propres").
    #[serde(rename = "intitule")]
    pub label: String,
    /// Value for fiscal year N, in the document's own unit.
    #[serde(rename = "valeur_n")]
    pub current: Option<f64>,
    /// Value for fiscal year N−1.
    #[serde(rename = "valeur_n_moins_1")]
    pub prior: Option<f64>,
}

/// The extraction stage output: line items plus the fiscal years they cover.
#[derive(Debug, Clone, Serialize)]
pub struct RawLineItems {
    pub items: Vec<LineItem>,
    /// Fiscal year N.
    pub year_current: i32,
    /// Fiscal year N−1 (not necessarily `year_current - 1`; broken fiscal
    /// years happen).
    pub year_prior: Option<i32>,
}

impl RawLineItems {
    /// Look up the current-year value for a label (exact match).
    pub fn current(&self, label: &str) -> Option<f64> {
        self.items.iter().find(|i| i.label == label)?.current
    }

    /// Look up the prior-year value for a label (exact match).
    pub fn prior(&self, label: &str) -> Option<f64> {
        self.items.iter().find(|i| i.label == label)?.prior
    }
}

/// Run the extraction capability and validate its response.
pub async fn run(
    extractor: &dyn Extractor,
    document: &FetchedDocument,
    company_name: &str,
) -> Result<RawLineItems, AnalysisError> {
    let start = Instant::now();
    info!("Extracting financial data for {}", company_name);

    let raw = extractor
        .extract(document, company_name)
        .await
        .map_err(|e| {
            warn!("Extractor call failed: {}", e);
            AnalysisError::ExtractionFailed {
                reason: ExtractionReason::UpstreamError,
            }
        })?;

    let parsed = parse_line_items(&raw).ok_or_else(|| {
        debug!("Unparseable extractor response (first 500 chars): {}", truncate(&raw, 500));
        AnalysisError::ExtractionFailed {
            reason: ExtractionReason::MalformedResponse,
        }
    })?;

    if parsed.items.is_empty() {
        return Err(AnalysisError::ExtractionFailed {
            reason: ExtractionReason::EmptyResult,
        });
    }

    info!(
        "Extracted {} line items (years {} / {:?}) in {:.2}s",
        parsed.items.len(),
        parsed.year_current,
        parsed.year_prior,
        start.elapsed().as_secs_f64()
    );
    Ok(parsed)
}

/// Parse and fold the wire entries. Returns `None` on structural problems;
/// an empty item list is *not* a structural problem and is reported upstream
/// as `empty_result` instead.
fn parse_line_items(raw: &str) -> Option<RawLineItems> {
    let value = sanitize::parse_array(raw)?;
    let entries = value.as_array()?;

    // First pass: collect (label, year, value) triples, tolerating both the
    // accented and unaccented key spellings the model produces.
    let mut triples: Vec<(String, i32, Option<f64>)> = Vec::new();
    for entry in entries {
        let obj = entry.as_object()?;
        let label = obj
            .get("intitule")
            .or_else(|| obj.get("intitulé"))
            .and_then(|v| v.as_str())?
            .trim()
            .to_string();
        if label.is_empty() {
            return None;
        }
        let year = obj
            .get("annee")
            .or_else(|| obj.get("année"))
            .and_then(|v| v.as_i64())? as i32;
        let value = obj.get("valeur").and_then(numeric);
        triples.push((label, year, value));
    }

    if triples.is_empty() {
        return Some(RawLineItems {
            items: Vec::new(),
            year_current: 0,
            year_prior: None,
        });
    }

    let year_current = triples.iter().map(|t| t.1).max()?;
    let year_prior = triples
        .iter()
        .map(|t| t.1)
        .filter(|&y| y < year_current)
        .max();

    // Second pass: fold into one item per label, preserving first-seen order.
    // Duplicate (label, year) pairs are last-wins.
    let mut items: Vec<LineItem> = Vec::new();
    for (label, year, value) in triples {
        let idx = match items.iter().position(|i| i.label == label) {
            Some(idx) => idx,
            None => {
                items.push(LineItem {
                    label,
                    current: None,
                    prior: None,
                });
                items.len() - 1
            }
        };
        let slot = &mut items[idx];
        if year == year_current {
            slot.current = value;
        } else if Some(year) == year_prior {
            slot.prior = value;
        }
        // Years older than N−1 are dropped.
    }

    Some(RawLineItems {
        items,
        year_current,
        year_prior,
    })
}

/// Accept numbers, numeric strings, and null. The extraction prompt forbids
/// inventing absent figures, so null simply means "not in the document".
fn numeric(v: &serde_json::Value) -> Option<f64> {
    match v {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().replace(' ', "").replace(',', ".").parse().ok(),
        _ => None,
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn folds_two_years_per_label() {
        let raw = r#"[
            {"intitule": "Capitaux propres", "annee": 2023, "valeur": 420000},
            {"intitule": "Capitaux propres", "annee": 2022, "valeur": 415000},
            {"intitule": "Total de l'actif", "annee": 2023, "valeur": 900000}
        ]"#;
        let parsed = parse_line_items(raw).unwrap();
        assert_eq!(parsed.year_current, 2023);
        assert_eq!(parsed.year_prior, Some(2022));
        assert_eq!(parsed.items.len(), 2);
        assert_eq!(parsed.current("Capitaux propres"), Some(420000.0));
        assert_eq!(parsed.prior("Capitaux propres"), Some(415000.0));
        assert_eq!(parsed.prior("Total de l'actif"), None);
    }

    #[test]
    fn accented_keys_are_accepted() {
        let raw = r#"[{"intitulé": "Disponibilités", "année": 2024, "valeur": 12000}]"#;
        let parsed = parse_line_items(raw).unwrap();
        assert_eq!(parsed.current("Disponibilités"), Some(12000.0));
        assert_eq!(parsed.year_prior, None);
    }

    #[test]
    fn duplicate_label_year_is_last_wins() {
        let raw = r#"[
            {"intitule": "Total dettes", "annee": 2023, "valeur": 100},
            {"intitule": "Total dettes", "annee": 2023, "valeur": 250}
        ]"#;
        let parsed = parse_line_items(raw).unwrap();
        assert_eq!(parsed.items.len(), 1);
        assert_eq!(parsed.current("Total dettes"), Some(250.0));
    }

    #[test]
    fn absent_values_stay_absent() {
        let raw = r#"[{"intitule": "Produits financiers", "annee": 2023, "valeur": null}]"#;
        let parsed = parse_line_items(raw).unwrap();
        assert_eq!(parsed.current("Produits financiers"), None);
    }

    #[test]
    fn fenced_response_is_tolerated() {
        let raw = "```json\n[{\"intitule\": \"Chiffre d'affaires net\", \"annee\": 2023, \"valeur\": 152450}]\n```";
        let parsed = parse_line_items(raw).unwrap();
        assert_eq!(parsed.current("Chiffre d'affaires net"), Some(152450.0));
    }

    #[test]
    fn non_array_is_malformed() {
        assert!(parse_line_items("{\"not\": \"an array\"}").is_none());
        assert!(parse_line_items("plain prose").is_none());
    }

    #[test]
    fn entry_without_label_is_malformed() {
        let raw = r#"[{"annee": 2023, "valeur": 1}]"#;
        assert!(parse_line_items(raw).is_none());
    }

    #[test]
    fn empty_array_parses_to_empty_items() {
        let parsed = parse_line_items("[]").unwrap();
        assert!(parsed.items.is_empty());
    }
}
