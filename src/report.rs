//! The assembled result of a successful analysis run.

use serde::Serialize;

use crate::pipeline::figures::KeyFigures;
use crate::pipeline::narrate::RiskLevel;
use crate::pipeline::ratios::RatioBundle;

/// Everything a caller gets back from one run: the validated ratio bundle,
/// the display key figures, the narrative, and the discrete risk level.
///
/// Serialises to the wire shape consumers expect: ratio and key-figure keys
/// stay French (they mirror statutory statement vocabulary), the risk level
/// is the English token `low` / `medium` / `high`.
#[derive(Debug, Serialize)]
pub struct AnalysisReport {
    /// Always `"completed"`; failures never produce a report.
    pub status: &'static str,

    pub company_name: String,

    #[serde(rename = "loyer_annuel")]
    pub annual_rent: f64,

    /// The 41 validated ratios in their six categories.
    pub ratios: RatioBundle,

    /// Formatted display figures derived from the line items and ratios.
    #[serde(rename = "chiffres_cles")]
    pub key_figures: KeyFigures,

    /// The ~800-word narrative analysis.
    #[serde(rename = "analyse_financiere")]
    pub narrative: String,

    pub risk_level: RiskLevel,

    /// Wall-clock duration of the whole run, in seconds.
    pub processing_time: f64,
}
