//! Document retrieval with bounded retry/backoff.
//!
//! ## Retry Strategy
//!
//! Statement PDFs are hosted on whatever storage the landlord's back office
//! uses, and those hosts fail in mundane ways: connection resets, slow
//! responses, transient 5xx. Up to 3 attempts with exponential backoff
//! (`base * 2^(attempt-1)`) absorb those without hammering a recovering host;
//! the 500 ms default base gives a 500 ms → 1 s wait sequence across the
//! three attempts.
//!
//! The retry decision itself is a pure function of (attempts completed,
//! failure class, remaining budget) — see [`next_attempt`] — so the policy is
//! unit-testable without a transport. Permanent failures (4xx, over-size
//! body) abort immediately without consuming the remaining attempts, and no
//! sleep ever extends past the caller's total budget.

use std::time::{Duration, Instant};

use reqwest::{StatusCode, Url};
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::error::{AnalysisError, RetrievalReason};
use crate::progress::ProgressCallback;

/// A fully retrieved document, owned by the run that fetched it.
///
/// Never cached or persisted; handed to the extraction stage and dropped when
/// the run ends.
#[derive(Debug, Clone)]
pub struct FetchedDocument {
    /// Raw document bytes.
    pub bytes: Vec<u8>,
    /// Declared `Content-Type`, unvalidated. Whether the bytes are actually a
    /// readable financial statement is the extraction stage's problem.
    pub content_type: String,
    /// Byte length of `bytes`.
    pub size_bytes: usize,
}

/// Transient failures are retried; permanent ones abort immediately.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FailureClass {
    Transient(RetrievalReason),
    Permanent(RetrievalReason),
}

/// What to do after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RetryDecision {
    /// Sleep for the given delay, then try again.
    RetryAfter(Duration),
    /// Give up and surface the last failure.
    Abort,
}

/// Pure retry policy: decide the next action after `completed` failed
/// attempts, given the backoff base and the time left in the total budget.
///
/// The delay doubles per attempt and is never allowed to eat the remaining
/// budget — if waiting would leave no time for the next attempt, abort now
/// rather than sleep into the deadline.
pub(crate) fn next_attempt(
    completed: u32,
    max_attempts: u32,
    base_backoff: Duration,
    remaining: Duration,
) -> RetryDecision {
    if completed >= max_attempts {
        return RetryDecision::Abort;
    }
    let delay = base_backoff * 2u32.saturating_pow(completed.saturating_sub(1));
    if delay >= remaining {
        return RetryDecision::Abort;
    }
    RetryDecision::RetryAfter(delay)
}

/// Classify an HTTP status: 5xx is worth retrying, anything else non-success
/// is a client-side problem that repeats identically on retry.
pub(crate) fn classify_status(status: StatusCode) -> Option<FailureClass> {
    if status.is_success() {
        None
    } else if status.is_server_error() {
        Some(FailureClass::Transient(RetrievalReason::HttpError))
    } else {
        Some(FailureClass::Permanent(RetrievalReason::HttpError))
    }
}

/// Retrieves a remote document within a total time budget.
///
/// Holds a shared [`reqwest::Client`] (pooled connections, safe for
/// concurrent runs) plus the retry knobs from the run's configuration.
pub struct DocumentFetcher {
    client: reqwest::Client,
    max_attempts: u32,
    base_backoff: Duration,
    attempt_timeout: Duration,
    max_size_bytes: usize,
    progress: Option<ProgressCallback>,
}

impl DocumentFetcher {
    pub fn new(
        client: reqwest::Client,
        max_attempts: u32,
        base_backoff: Duration,
        attempt_timeout: Duration,
        max_size_bytes: usize,
        progress: Option<ProgressCallback>,
    ) -> Self {
        Self {
            client,
            max_attempts: max_attempts.max(1),
            base_backoff,
            attempt_timeout,
            max_size_bytes,
            progress,
        }
    }

    /// Fetch the document at `url`, retrying transient failures until the
    /// attempts or the total `budget` run out.
    ///
    /// No partial document is ever returned: a body that stops mid-stream is
    /// a failed attempt like any other.
    pub async fn fetch(
        &self,
        url: &Url,
        budget: Duration,
    ) -> Result<FetchedDocument, AnalysisError> {
        info!("Downloading document from: {}", url);
        let deadline = Instant::now() + budget;
        let mut completed: u32 = 0;

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(AnalysisError::RetrievalFailed {
                    url: url.to_string(),
                    reason: RetrievalReason::Timeout,
                });
            }

            let started = Instant::now();
            match self.attempt(url, remaining.min(self.attempt_timeout)).await {
                Ok(doc) => {
                    info!(
                        "Document downloaded in {:.2}s ({} bytes, {})",
                        started.elapsed().as_secs_f64(),
                        doc.size_bytes,
                        doc.content_type
                    );
                    return Ok(doc);
                }
                Err(FailureClass::Permanent(reason)) => {
                    warn!("Non-retryable download failure for {}: {:?}", url, reason);
                    return Err(AnalysisError::RetrievalFailed {
                        url: url.to_string(),
                        reason,
                    });
                }
                Err(FailureClass::Transient(reason)) => {
                    completed += 1;
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    match next_attempt(completed, self.max_attempts, self.base_backoff, remaining) {
                        RetryDecision::RetryAfter(delay) => {
                            warn!(
                                "Download attempt {}/{} failed ({:?}), retrying in {}ms",
                                completed,
                                self.max_attempts,
                                reason,
                                delay.as_millis()
                            );
                            if let Some(ref cb) = self.progress {
                                cb.on_fetch_retry(completed, delay);
                            }
                            sleep(delay).await;
                        }
                        RetryDecision::Abort => {
                            // Out of attempts or out of time. A run whose
                            // budget ran dry reports the budget, not the last
                            // low-level hiccup.
                            let reason = if remaining.is_zero() {
                                RetrievalReason::Timeout
                            } else {
                                reason
                            };
                            warn!(
                                "Download failed after {} attempt(s) for {}: {:?}",
                                completed, url, reason
                            );
                            return Err(AnalysisError::RetrievalFailed {
                                url: url.to_string(),
                                reason,
                            });
                        }
                    }
                }
            }
        }
    }

    /// One attempt: send the request, stream the body under the size cap.
    async fn attempt(
        &self,
        url: &Url,
        timeout: Duration,
    ) -> Result<FetchedDocument, FailureClass> {
        let response = self
            .client
            .get(url.clone())
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    FailureClass::Transient(RetrievalReason::Timeout)
                } else {
                    FailureClass::Transient(RetrievalReason::NetworkError)
                }
            })?;

        if let Some(class) = classify_status(response.status()) {
            debug!("Download attempt got HTTP {}", response.status());
            return Err(class);
        }

        // Reject oversize documents before reading them when the host
        // declares a length; re-checked below for hosts that lie or chunk.
        if let Some(declared) = response.content_length() {
            if declared as usize > self.max_size_bytes {
                return Err(FailureClass::Permanent(RetrievalReason::TooLarge));
            }
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("application/octet-stream")
            .to_string();

        let mut bytes: Vec<u8> = Vec::new();
        let mut response = response;
        loop {
            match response.chunk().await {
                Ok(Some(chunk)) => {
                    if bytes.len() + chunk.len() > self.max_size_bytes {
                        return Err(FailureClass::Permanent(RetrievalReason::TooLarge));
                    }
                    bytes.extend_from_slice(&chunk);
                }
                Ok(None) => break,
                Err(e) => {
                    return Err(if e.is_timeout() {
                        FailureClass::Transient(RetrievalReason::Timeout)
                    } else {
                        FailureClass::Transient(RetrievalReason::NetworkError)
                    });
                }
            }
        }

        let size_bytes = bytes.len();
        Ok(FetchedDocument {
            bytes,
            content_type,
            size_bytes,
        })
    }
}
