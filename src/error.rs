//! Error types for the bailcheck library.
//!
//! Every failure mode maps onto exactly one [`AnalysisError`] variant carrying
//! the stage that failed and a coarse reason code. The pipeline is fail-fast:
//! there is no partial-degradation mode, so a variant here is always terminal
//! for its run.
//!
//! Reason codes are deliberately generic. Raw upstream error bodies are logged
//! via `tracing` at debug level but never embedded in the outward response —
//! callers can distinguish "the document could not be fetched" from "the
//! analysis service rejected the input" without seeing provider internals.

use serde::Serialize;
use thiserror::Error;

use crate::run::Stage;

/// Why document retrieval failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RetrievalReason {
    /// The total retry budget was exhausted before a response arrived.
    Timeout,
    /// The host answered with a non-success HTTP status.
    HttpError,
    /// Connect or read failure below the HTTP layer.
    NetworkError,
    /// The document exceeds the configured size cap.
    TooLarge,
}

/// Why the extraction stage failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionReason {
    /// The extractor call itself failed.
    UpstreamError,
    /// The response could not be parsed as a line-item array.
    MalformedResponse,
    /// The response parsed but contained no line items.
    EmptyResult,
}

/// Why the ratio-computation stage failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ComputationReason {
    /// The calculator call itself failed.
    UpstreamError,
    /// The response could not be parsed as a ratio bundle.
    MalformedResponse,
    /// One of the six fixed categories is absent from the bundle.
    MissingCategory,
}

/// Why the narration stage failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NarrationReason {
    /// The narrator call itself failed.
    UpstreamError,
    /// The returned risk token is not one of the three accepted values.
    InvalidRiskLevel,
    /// The narrative text is empty.
    EmptyText,
}

/// All errors returned by the bailcheck library.
///
/// One variant per pipeline stage, plus the orchestrator's outer deadline,
/// inbound-request validation, and provider configuration.
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// Document retrieval failed after exhausting retries, or hit a
    /// non-retryable condition.
    #[error("document retrieval failed for '{url}': {reason:?}")]
    RetrievalFailed { url: String, reason: RetrievalReason },

    /// Line-item extraction failed.
    #[error("financial data extraction failed: {reason:?}")]
    ExtractionFailed { reason: ExtractionReason },

    /// Ratio computation failed.
    #[error("ratio computation failed: {reason:?}")]
    ComputationFailed { reason: ComputationReason },

    /// Narrative generation failed.
    #[error("risk narration failed: {reason:?}")]
    NarrationFailed { reason: NarrationReason },

    /// The whole-pipeline deadline elapsed while a stage was in flight.
    #[error("pipeline deadline exceeded during {stage}")]
    PipelineTimeout { stage: Stage },

    /// The inbound request is malformed (bad URL, non-numeric rent).
    /// Rejected before any stage runs.
    #[error("invalid request: {detail}")]
    InvalidRequest { detail: String },

    /// A provider is not configured (missing API key etc.).
    /// Raised before any stage runs.
    #[error("provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },
}

impl AnalysisError {
    /// Stage identifier for the outward error response.
    pub fn stage(&self) -> &'static str {
        match self {
            AnalysisError::RetrievalFailed { .. } => "fetch",
            AnalysisError::ExtractionFailed { .. } => "extract",
            AnalysisError::ComputationFailed { .. } => "compute",
            AnalysisError::NarrationFailed { .. } => "narrate",
            AnalysisError::PipelineTimeout { .. } => "pipeline",
            AnalysisError::InvalidRequest { .. } => "request",
            AnalysisError::ProviderNotConfigured { .. } => "config",
        }
    }

    /// Generic reason code for the outward error response.
    pub fn reason(&self) -> &'static str {
        match self {
            AnalysisError::RetrievalFailed { reason, .. } => match reason {
                RetrievalReason::Timeout => "timeout",
                RetrievalReason::HttpError => "http_error",
                RetrievalReason::NetworkError => "network_error",
                RetrievalReason::TooLarge => "too_large",
            },
            AnalysisError::ExtractionFailed { reason } => match reason {
                ExtractionReason::UpstreamError => "upstream_error",
                ExtractionReason::MalformedResponse => "malformed_response",
                ExtractionReason::EmptyResult => "empty_result",
            },
            AnalysisError::ComputationFailed { reason } => match reason {
                ComputationReason::UpstreamError => "upstream_error",
                ComputationReason::MalformedResponse => "malformed_response",
                ComputationReason::MissingCategory => "missing_category",
            },
            AnalysisError::NarrationFailed { reason } => match reason {
                NarrationReason::UpstreamError => "upstream_error",
                NarrationReason::InvalidRiskLevel => "invalid_risk_level",
                NarrationReason::EmptyText => "empty_text",
            },
            AnalysisError::PipelineTimeout { .. } => "deadline_exceeded",
            AnalysisError::InvalidRequest { .. } => "validation",
            AnalysisError::ProviderNotConfigured { .. } => "provider_not_configured",
        }
    }

    /// The structured error object sent to callers: stage + reason only.
    pub fn to_response(&self) -> ErrorResponse {
        ErrorResponse {
            status: "error",
            stage: self.stage(),
            reason: self.reason(),
        }
    }
}

/// Outward error shape. Never carries upstream bodies or internal detail.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub status: &'static str,
    pub stage: &'static str,
    pub reason: &'static str,
}
