//! Inbound request validation.
//!
//! An [`AnalysisRequest`] can only be constructed through [`AnalysisRequest::new`],
//! so the pipeline never sees a relative URL, a non-HTTP scheme, or a rent it
//! cannot interpret. Everything rejected here fails with stage `request`
//! before any network traffic happens.

use reqwest::Url;

use crate::error::AnalysisError;

/// A validated analysis request: who the tenant is, what they would pay, and
/// where their financial statement lives.
#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    pub company_name: String,
    pub annual_rent: f64,
    pub document_url: Url,
}

impl AnalysisRequest {
    /// Validate and build a request.
    ///
    /// The rent accepts French number formatting: `"36 000,50"`, `"36000.5"`,
    /// and `"36 000 €"` all parse to the same value.
    pub fn new(
        company_name: impl Into<String>,
        annual_rent: &str,
        document_url: &str,
    ) -> Result<Self, AnalysisError> {
        let company_name = company_name.into();
        if company_name.trim().is_empty() {
            return Err(AnalysisError::InvalidRequest {
                detail: "company name is empty".into(),
            });
        }

        let document_url = parse_document_url(document_url)?;
        let annual_rent = parse_rent(annual_rent)?;

        Ok(Self {
            company_name: company_name.trim().to_string(),
            annual_rent,
            document_url,
        })
    }
}

fn parse_document_url(input: &str) -> Result<Url, AnalysisError> {
    let url = Url::parse(input.trim()).map_err(|e| AnalysisError::InvalidRequest {
        detail: format!("document URL unparseable: {e}"),
    })?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(AnalysisError::InvalidRequest {
            detail: format!("document URL must be http(s), got scheme '{other}'"),
        }),
    }
}

/// Parse a rent amount, tolerating French formatting: non-breaking or plain
/// spaces as thousands separators, comma as decimal separator, an optional
/// trailing currency marker.
fn parse_rent(input: &str) -> Result<f64, AnalysisError> {
    let cleaned: String = input
        .trim()
        .trim_end_matches('€')
        .trim_end_matches("EUR")
        .trim()
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '\u{a0}' && *c != '\u{202f}')
        .map(|c| if c == ',' { '.' } else { c })
        .collect();

    let value: f64 = cleaned
        .parse()
        .map_err(|_| AnalysisError::InvalidRequest {
            detail: format!("annual rent is not a number: '{input}'"),
        })?;

    if !value.is_finite() || value < 0.0 {
        return Err(AnalysisError::InvalidRequest {
            detail: format!("annual rent must be a finite non-negative amount, got {value}"),
        });
    }
    Ok(value)
}
