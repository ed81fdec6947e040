//! Gemini `generateContent` client, used for statement extraction.
//!
//! The PDF travels inline (base64) next to the extraction prompt; the request
//! asks for `application/json` output so the model skips prose wrappers in
//! the common case (the sanitizer still guards the uncommon one). Temperature
//! and thinking budget are fixed — extraction is transcription, not
//! creativity.

use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde_json::json;
use tracing::debug;

use crate::pipeline::fetch::FetchedDocument;
use crate::prompts;

use super::{Extractor, UpstreamError};

const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Default extraction model.
pub const DEFAULT_EXTRACTION_MODEL: &str = "gemini-2.5-flash";

pub struct GeminiClient {
    client: reqwest::Client,
    api_key: String,
    model: String,
    api_timeout: Duration,
}

impl GeminiClient {
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
}

#[async_trait]
impl Extractor for GeminiClient {
    async fn extract(
        &self,
        document: &FetchedDocument,
        _company_name: &str,
    ) -> Result<String, UpstreamError> {
        let body = json!({
            "contents": [{
                "role": "user",
                "parts": [
                    {
                        "inline_data": {
                            "mime_type": "application/pdf",
                            "data": BASE64.encode(&document.bytes),
                        }
                    },
                    { "text": prompts::EXTRACTION_PROMPT }
                ]
            }],
            "generationConfig": {
                "temperature": 0.1,
                "responseMimeType": "application/json",
                "thinkingConfig": { "thinkingBudget": 8000 }
            }
        });

        let url = format!("{API_BASE}/models/{}:generateContent", self.model);
        debug!("Gemini extraction request ({} document bytes)", document.size_bytes);

        let response = self
            .client
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .timeout(self.api_timeout)
            .send()
            .await
            .map_err(|e| UpstreamError::new(format!("gemini request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            debug!("Gemini error body: {}", detail);
            return Err(UpstreamError::new(format!("gemini returned HTTP {status}")));
        }

        let payload: serde_json::Value = response
            .json()
            .await
            .map_err(|e| UpstreamError::new(format!("gemini response unreadable: {e}")))?;

        // Concatenate all text parts of the first candidate.
        let text = payload["candidates"]
            .get(0)
            .and_then(|c| c["content"]["parts"].as_array())
            .map(|parts| {
                parts
                    .iter()
                    .filter_map(|p| p["text"].as_str())
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(UpstreamError::new("gemini returned an empty response"));
        }
        Ok(text)
    }
}
