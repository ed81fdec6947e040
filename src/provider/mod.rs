//! Capability traits for the three external AI calls, plus their concrete
//! provider clients.
//!
//! Each stage depends on a narrow trait — [`Extractor`], [`Calculator`],
//! [`Narrator`] — with a fixed input/output contract, not on a provider. The
//! traits return raw model text: all parsing and validation belongs to the
//! stage, so a provider swap can never weaken a stage's contract checks.
//! Swap-ability is the point of the seam; tests inject stubs, production
//! injects [`GeminiClient`] and [`AnthropicClient`].

pub mod anthropic;
pub mod gemini;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::error::AnalysisError;
use crate::pipeline::extract::RawLineItems;
use crate::pipeline::fetch::FetchedDocument;
use crate::pipeline::ratios::RatioBundle;

pub use anthropic::AnthropicClient;
pub use gemini::GeminiClient;

/// Opaque failure of a provider call. Stages map this onto their own
/// `upstream_error` reason; the detail is logged, never surfaced.
#[derive(Debug, Error)]
#[error("{detail}")]
pub struct UpstreamError {
    pub detail: String,
}

impl UpstreamError {
    pub fn new(detail: impl Into<String>) -> Self {
        Self {
            detail: detail.into(),
        }
    }
}

/// Turns document bytes into a JSON array of labelled line items.
#[async_trait]
pub trait Extractor: Send + Sync {
    async fn extract(
        &self,
        document: &FetchedDocument,
        company_name: &str,
    ) -> Result<String, UpstreamError>;
}

/// Turns line items + rent into a JSON ratio bundle.
#[async_trait]
pub trait Calculator: Send + Sync {
    async fn compute_ratios(
        &self,
        line_items: &RawLineItems,
        company_name: &str,
        annual_rent: f64,
    ) -> Result<String, UpstreamError>;
}

/// Turns the ratio bundle + rent into a JSON risk assessment.
#[async_trait]
pub trait Narrator: Send + Sync {
    async fn narrate(
        &self,
        ratios: &RatioBundle,
        company_name: &str,
        annual_rent: f64,
    ) -> Result<String, UpstreamError>;
}

/// Read an API key from the environment, with an optional legacy fallback
/// variable name.
fn key_from_env(primary: &str, fallback: Option<&str>) -> Option<String> {
    std::env::var(primary)
        .ok()
        .filter(|k| !k.is_empty())
        .or_else(|| {
            fallback
                .and_then(|name| std::env::var(name).ok())
                .filter(|k| !k.is_empty())
        })
}

/// Build the default extractor from `GEMINI_API_KEY`.
pub fn extractor_from_env(
    client: reqwest::Client,
    model: &str,
    api_timeout: std::time::Duration,
) -> Result<Arc<dyn Extractor>, AnalysisError> {
    let key = key_from_env("GEMINI_API_KEY", None).ok_or_else(|| {
        AnalysisError::ProviderNotConfigured {
            provider: "gemini".to_string(),
            hint: "Set GEMINI_API_KEY, or inject an Extractor through the config.".to_string(),
        }
    })?;
    Ok(Arc::new(GeminiClient::new(client, key, model, api_timeout)))
}

/// Build the default calculator/narrator client from `ANTHROPIC_API_KEY`
/// (`CLAUDE_API_KEY` accepted as a legacy spelling).
pub fn anthropic_from_env(
    client: reqwest::Client,
    model: &str,
    api_timeout: std::time::Duration,
) -> Result<Arc<AnthropicClient>, AnalysisError> {
    let key = key_from_env("ANTHROPIC_API_KEY", Some("CLAUDE_API_KEY")).ok_or_else(|| {
        AnalysisError::ProviderNotConfigured {
            provider: "anthropic".to_string(),
            hint: "Set ANTHROPIC_API_KEY, or inject Calculator/Narrator through the config."
                .to_string(),
        }
    })?;
    Ok(Arc::new(AnthropicClient::new(
        client,
        key,
        model,
        api_timeout,
    )))
}
