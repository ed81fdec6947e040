//! Narration stage: ratio bundle → risk assessment.
//!
//! The narrator capability writes the ~800-word solvency analysis and must
//! also commit to a discrete risk classification in a `niveau_risque` field.
//! Only three tokens are accepted; anything else is a contract violation, not
//! something to paper over with a default. A response that is not parseable
//! JSON at all is treated as an upstream failure — the narrator did not hold
//! up its side of the contract.

use std::fmt;
use std::time::Instant;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{AnalysisError, NarrationReason};
use crate::pipeline::ratios::RatioBundle;
use crate::pipeline::sanitize;
use crate::provider::Narrator;

/// Three-valued tenant-risk classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    /// Map a narrator token onto a risk level. The prompts are French, so the
    /// French tokens are canonical; the English ones are accepted because
    /// models drift.
    pub fn parse_token(token: &str) -> Option<RiskLevel> {
        match token.trim().to_lowercase().as_str() {
            "faible" | "low" => Some(RiskLevel::Low),
            "moyen" | "medium" => Some(RiskLevel::Medium),
            "eleve" | "élevé" | "high" => Some(RiskLevel::High),
            _ => None,
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
        })
    }
}

/// The narration stage output.
#[derive(Debug, Clone)]
pub struct RiskAssessment {
    /// Narrative solvency analysis, target length ~800 words.
    pub narrative: String,
    pub risk_level: RiskLevel,
}

/// Run the narrator capability and validate its response.
pub async fn run(
    narrator: &dyn Narrator,
    ratios: &RatioBundle,
    company_name: &str,
    annual_rent: f64,
) -> Result<RiskAssessment, AnalysisError> {
    let start = Instant::now();
    info!("Generating risk assessment for {}", company_name);

    let raw = narrator
        .narrate(ratios, company_name, annual_rent)
        .await
        .map_err(|e| {
            warn!("Narrator call failed: {}", e);
            AnalysisError::NarrationFailed {
                reason: NarrationReason::UpstreamError,
            }
        })?;

    let assessment = parse_assessment(&raw).map_err(|reason| {
        debug!("Rejected narrator response: {:?}", reason);
        AnalysisError::NarrationFailed { reason }
    })?;

    info!(
        "Risk assessment complete (level: {}, {} chars) in {:.2}s",
        assessment.risk_level,
        assessment.narrative.len(),
        start.elapsed().as_secs_f64()
    );
    Ok(assessment)
}

pub(crate) fn parse_assessment(raw: &str) -> Result<RiskAssessment, NarrationReason> {
    let value = sanitize::parse_object(raw).ok_or(NarrationReason::UpstreamError)?;

    let narrative = value
        .get("analyse_financiere")
        .or_else(|| value.get("analyse"))
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .trim()
        .to_string();
    if narrative.is_empty() {
        return Err(NarrationReason::EmptyText);
    }

    let token = value
        .get("niveau_risque")
        .or_else(|| value.get("risk_level"))
        .and_then(|v| v.as_str())
        .unwrap_or("");
    let risk_level = RiskLevel::parse_token(token).ok_or(NarrationReason::InvalidRiskLevel)?;

    Ok(RiskAssessment {
        narrative,
        risk_level,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn french_and_english_tokens_map() {
        assert_eq!(RiskLevel::parse_token("faible"), Some(RiskLevel::Low));
        assert_eq!(RiskLevel::parse_token("MOYEN"), Some(RiskLevel::Medium));
        assert_eq!(RiskLevel::parse_token("élevé"), Some(RiskLevel::High));
        assert_eq!(RiskLevel::parse_token("eleve"), Some(RiskLevel::High));
        assert_eq!(RiskLevel::parse_token(" low "), Some(RiskLevel::Low));
        assert_eq!(RiskLevel::parse_token("medium"), Some(RiskLevel::Medium));
        assert_eq!(RiskLevel::parse_token("high"), Some(RiskLevel::High));
    }

    #[test]
    fn unknown_token_is_rejected() {
        assert_eq!(RiskLevel::parse_token("unknown"), None);
        assert_eq!(RiskLevel::parse_token("modéré"), None);
        assert_eq!(RiskLevel::parse_token(""), None);
    }

    #[test]
    fn valid_assessment_parses() {
        let raw = r#"{"analyse_financiere": "L'entreprise présente une structure saine.", "niveau_risque": "faible"}"#;
        let a = parse_assessment(raw).unwrap();
        assert_eq!(a.risk_level, RiskLevel::Low);
        assert!(a.narrative.contains("structure saine"));
    }

    #[test]
    fn fenced_assessment_parses() {
        let raw = "```json\n{\"analyse_financiere\": \"Analyse.\", \"niveau_risque\": \"moyen\"}\n```";
        let a = parse_assessment(raw).unwrap();
        assert_eq!(a.risk_level, RiskLevel::Medium);
    }

    #[test]
    fn empty_narrative_is_rejected() {
        let raw = r#"{"analyse_financiere": "  ", "niveau_risque": "faible"}"#;
        assert_eq!(parse_assessment(raw).unwrap_err(), NarrationReason::EmptyText);
    }

    #[test]
    fn invalid_risk_token_is_rejected() {
        let raw = r#"{"analyse_financiere": "Texte.", "niveau_risque": "unknown"}"#;
        assert_eq!(
            parse_assessment(raw).unwrap_err(),
            NarrationReason::InvalidRiskLevel
        );
    }

    #[test]
    fn missing_risk_field_is_rejected() {
        let raw = r#"{"analyse_financiere": "Texte."}"#;
        assert_eq!(
            parse_assessment(raw).unwrap_err(),
            NarrationReason::InvalidRiskLevel
        );
    }

    #[test]
    fn unparseable_response_is_upstream_error() {
        assert_eq!(
            parse_assessment("I cannot produce JSON today").unwrap_err(),
            NarrationReason::UpstreamError
        );
    }

    #[test]
    fn risk_level_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&RiskLevel::Medium).unwrap(),
            "\"medium\""
        );
    }

    #[test]
    fn run_maps_upstream_failure_onto_the_stage_error() {
        use crate::provider::UpstreamError;
        use async_trait::async_trait;

        struct FailingNarrator;

        #[async_trait]
        impl Narrator for FailingNarrator {
            async fn narrate(
                &self,
                _ratios: &RatioBundle,
                _company_name: &str,
                _annual_rent: f64,
            ) -> Result<String, UpstreamError> {
                Err(UpstreamError::new("overloaded"))
            }
        }

        let bundle = crate::pipeline::ratios::parse_bundle(
            r#"{
            "structure_financiere": {"annee_n": {}, "annee_n_moins_1": {}},
            "activite_exploitation": {"annee_n": {}, "annee_n_moins_1": {}},
            "rentabilite": {"annee_n": {}, "annee_n_moins_1": {}},
            "evolution": {},
            "tresorerie_financement": {"annee_n": {}, "annee_n_moins_1": {}},
            "delais_paiement": {"annee_n": {}, "annee_n_moins_1": {}}
        }"#,
        )
        .unwrap();

        let err = tokio_test::block_on(run(&FailingNarrator, &bundle, "ACME", 36000.0))
            .unwrap_err();
        assert!(matches!(
            err,
            AnalysisError::NarrationFailed {
                reason: NarrationReason::UpstreamError
            }
        ));
    }
}
