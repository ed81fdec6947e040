//! Anthropic `messages` client, used for ratio computation and narration.
//!
//! One client serves both capabilities; only the prompt, token budget, and
//! temperature differ. Computation runs cold (0.1) because it is arithmetic;
//! narration runs slightly warmer (0.2) because it writes prose.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tracing::debug;

use crate::pipeline::extract::RawLineItems;
use crate::pipeline::ratios::RatioBundle;
use crate::prompts;

use super::{Calculator, Narrator, UpstreamError};

const API_URL: &str = "https://api.anthropic.com/v1/messages";
const API_VERSION: &str = "2023-06-01";

/// Default analyst model for both computation and narration.
pub const DEFAULT_ANALYST_MODEL: &str = "claude-sonnet-4-20250514";

const RATIO_MAX_TOKENS: u32 = 4096;
const RATIO_TEMPERATURE: f64 = 0.1;
const NARRATION_MAX_TOKENS: u32 = 8192;
const NARRATION_TEMPERATURE: f64 = 0.2;

pub struct AnthropicClient {
    client: reqwest::Client,
    api_key: String,
    model: String,
    api_timeout: Duration,
}

impl AnthropicClient {
    pub fn new(
        client: reqwest::Client,
        api_key: impl Into<String>,
        model: impl Into<String>,
        api_timeout: Duration,
    ) -> Self {
        Self {
            client,
            api_key: api_key.into(),
            model: model.into(),
            api_timeout,
        }
    }

    /// Send one user message and return the first text block.
    async fn message(
        &self,
        prompt: String,
        max_tokens: u32,
        temperature: f64,
    ) -> Result<String, UpstreamError> {
        let body = json!({
            "model": self.model,
            "max_tokens": max_tokens,
            "temperature": temperature,
            "messages": [{ "role": "user", "content": prompt }]
        });

        let response = self
            .client
            .post(API_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&body)
            .timeout(self.api_timeout)
            .send()
            .await
            .map_err(|e| UpstreamError::new(format!("anthropic request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            debug!("Anthropic error body: {}", detail);
            return Err(UpstreamError::new(format!(
                "anthropic returned HTTP {status}"
            )));
        }

        let payload: serde_json::Value = response
            .json()
            .await
            .map_err(|e| UpstreamError::new(format!("anthropic response unreadable: {e}")))?;

        let text = payload["content"]
            .as_array()
            .map(|blocks| {
                blocks
                    .iter()
                    .filter_map(|b| b["text"].as_str())
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(UpstreamError::new("anthropic returned an empty response"));
        }
        Ok(text)
    }
}

#[async_trait]
impl Calculator for AnthropicClient {
    async fn compute_ratios(
        &self,
        line_items: &RawLineItems,
        company_name: &str,
        annual_rent: f64,
    ) -> Result<String, UpstreamError> {
        let items_json = serde_json::to_string(line_items)
            .map_err(|e| UpstreamError::new(format!("line items unserialisable: {e}")))?;
        let prompt = prompts::ratio_prompt(company_name, annual_rent, &items_json);
        debug!("Ratio prompt: {} chars", prompt.len());
        self.message(prompt, RATIO_MAX_TOKENS, RATIO_TEMPERATURE)
            .await
    }
}

#[async_trait]
impl Narrator for AnthropicClient {
    async fn narrate(
        &self,
        ratios: &RatioBundle,
        company_name: &str,
        annual_rent: f64,
    ) -> Result<String, UpstreamError> {
        let bundle_json = serde_json::to_string(ratios)
            .map_err(|e| UpstreamError::new(format!("ratio bundle unserialisable: {e}")))?;
        let prompt = prompts::narration_prompt(company_name, annual_rent, &bundle_json);
        debug!("Narration prompt: {} chars", prompt.len());
        self.message(prompt, NARRATION_MAX_TOKENS, NARRATION_TEMPERATURE)
            .await
    }
}
