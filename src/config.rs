//! Configuration for a solvency analysis run.
//!
//! Everything tunable lives in [`AnalysisConfig`], built via its
//! [`AnalysisConfigBuilder`]. Keeping every knob in one struct makes it
//! trivial to share a config across concurrent runs and to diff two runs to
//! understand why their outcomes differ.
//!
//! # Design choice: builder over constructor
//! A twelve-field constructor is unreadable and breaks on every new field.
//! The builder lets callers set only what they care about and rely on
//! documented defaults for the rest.

use std::fmt;
use std::sync::Arc;

use crate::error::AnalysisError;
use crate::progress::ProgressCallback;
use crate::provider::{Calculator, Extractor, Narrator};

/// Configuration for a solvency analysis.
///
/// Built via [`AnalysisConfig::builder()`] or [`AnalysisConfig::default()`].
///
/// # Example
/// ```rust
/// use bailcheck::AnalysisConfig;
///
/// let config = AnalysisConfig::builder()
///     .fetch_attempts(5)
///     .pipeline_timeout_secs(300)
///     .analyst_model("claude-sonnet-4-20250514")
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct AnalysisConfig {
    /// Total time budget for document retrieval, all attempts included, in
    /// seconds. Default: 120.
    ///
    /// This is a budget, not a per-attempt timeout: retries and their backoff
    /// pauses all draw from it. When it runs dry mid-retry the fetch aborts
    /// with a `timeout` reason regardless of how many attempts remain.
    pub fetch_timeout_secs: u64,

    /// Per-attempt timeout for a single download, in seconds. Default: 30.
    ///
    /// Caps how long one slow host can eat into the fetch budget. The
    /// effective per-attempt limit is the smaller of this and whatever budget
    /// remains.
    pub fetch_attempt_timeout_secs: u64,

    /// Maximum download attempts on transient failures. Default: 3.
    ///
    /// 5xx statuses and network errors are retried; 4xx statuses are not —
    /// a document that does not exist will not start existing on attempt two.
    pub fetch_attempts: u32,

    /// Initial retry delay in milliseconds (exponential backoff). Default: 500.
    ///
    /// Doubles after each attempt: 500 ms → 1 s → 2 s. A delay that would
    /// outlive the remaining fetch budget aborts the retry loop instead of
    /// sleeping through the deadline.
    pub retry_backoff_ms: u64,

    /// Maximum accepted document size in bytes. Default: 25 MiB.
    ///
    /// Statements are a handful of megabytes; anything larger is either the
    /// wrong document or an abuse vector. The cap is enforced while the body
    /// streams in, so an oversized download is cut off early, not after.
    pub max_document_bytes: usize,

    /// Whole-pipeline deadline in seconds. Default: 600.
    ///
    /// Covers everything from fetch through narration. A stage still in
    /// flight when the deadline passes is cancelled and the run fails with
    /// `deadline_exceeded` naming that stage.
    pub pipeline_timeout_secs: u64,

    /// Per-provider-call timeout in seconds. Default: 180.
    ///
    /// Extraction reads a whole PDF and narration writes ~800 words; both
    /// routinely take over a minute. The pipeline deadline still bounds the
    /// sum.
    pub api_timeout_secs: u64,

    /// Extraction model identifier. If `None`, the provider default is used.
    pub extraction_model: Option<String>,

    /// Ratio-computation and narration model identifier. If `None`, the
    /// provider default is used.
    pub analyst_model: Option<String>,

    /// Pre-constructed extractor. Takes precedence over the environment.
    pub extractor: Option<Arc<dyn Extractor>>,

    /// Pre-constructed calculator. Takes precedence over the environment.
    pub calculator: Option<Arc<dyn Calculator>>,

    /// Pre-constructed narrator. Takes precedence over the environment.
    pub narrator: Option<Arc<dyn Narrator>>,

    /// Progress callback invoked at stage boundaries. Default: none.
    pub progress: Option<ProgressCallback>,

    /// Outbound HTTP client shared by the document fetch and the provider
    /// calls of every run using this config. Default: a fresh pooled client.
    ///
    /// `reqwest::Client` is an `Arc` around its pool, so cloning the config
    /// still shares one pool; concurrent runs share connections instead of
    /// each opening their own.
    pub http_client: reqwest::Client,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            fetch_timeout_secs: 120,
            fetch_attempt_timeout_secs: 30,
            fetch_attempts: 3,
            retry_backoff_ms: 500,
            max_document_bytes: 25 * 1024 * 1024,
            pipeline_timeout_secs: 600,
            api_timeout_secs: 180,
            extraction_model: None,
            analyst_model: None,
            extractor: None,
            calculator: None,
            narrator: None,
            progress: None,
            http_client: reqwest::Client::new(),
        }
    }
}

impl fmt::Debug for AnalysisConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnalysisConfig")
            .field("fetch_timeout_secs", &self.fetch_timeout_secs)
            .field(
                "fetch_attempt_timeout_secs",
                &self.fetch_attempt_timeout_secs,
            )
            .field("fetch_attempts", &self.fetch_attempts)
            .field("retry_backoff_ms", &self.retry_backoff_ms)
            .field("max_document_bytes", &self.max_document_bytes)
            .field("pipeline_timeout_secs", &self.pipeline_timeout_secs)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("extraction_model", &self.extraction_model)
            .field("analyst_model", &self.analyst_model)
            .field("extractor", &self.extractor.as_ref().map(|_| "<dyn Extractor>"))
            .field(
                "calculator",
                &self.calculator.as_ref().map(|_| "<dyn Calculator>"),
            )
            .field("narrator", &self.narrator.as_ref().map(|_| "<dyn Narrator>"))
            .field("http_client", &"<reqwest::Client>")
            .finish()
    }
}

impl AnalysisConfig {
    /// Create a new builder for `AnalysisConfig`.
    pub fn builder() -> AnalysisConfigBuilder {
        AnalysisConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`AnalysisConfig`].
#[derive(Debug)]
pub struct AnalysisConfigBuilder {
    config: AnalysisConfig,
}

impl AnalysisConfigBuilder {
    pub fn fetch_timeout_secs(mut self, secs: u64) -> Self {
        self.config.fetch_timeout_secs = secs;
        self
    }

    pub fn fetch_attempt_timeout_secs(mut self, secs: u64) -> Self {
        self.config.fetch_attempt_timeout_secs = secs;
        self
    }

    pub fn fetch_attempts(mut self, n: u32) -> Self {
        self.config.fetch_attempts = n.max(1);
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn max_document_bytes(mut self, bytes: usize) -> Self {
        self.config.max_document_bytes = bytes;
        self
    }

    pub fn pipeline_timeout_secs(mut self, secs: u64) -> Self {
        self.config.pipeline_timeout_secs = secs;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn extraction_model(mut self, model: impl Into<String>) -> Self {
        self.config.extraction_model = Some(model.into());
        self
    }

    pub fn analyst_model(mut self, model: impl Into<String>) -> Self {
        self.config.analyst_model = Some(model.into());
        self
    }

    pub fn extractor(mut self, extractor: Arc<dyn Extractor>) -> Self {
        self.config.extractor = Some(extractor);
        self
    }

    pub fn calculator(mut self, calculator: Arc<dyn Calculator>) -> Self {
        self.config.calculator = Some(calculator);
        self
    }

    pub fn narrator(mut self, narrator: Arc<dyn Narrator>) -> Self {
        self.config.narrator = Some(narrator);
        self
    }

    pub fn progress(mut self, callback: ProgressCallback) -> Self {
        self.config.progress = Some(callback);
        self
    }

    pub fn http_client(mut self, client: reqwest::Client) -> Self {
        self.config.http_client = client;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<AnalysisConfig, AnalysisError> {
        let c = &self.config;
        if c.pipeline_timeout_secs == 0 {
            return Err(AnalysisError::InvalidRequest {
                detail: "pipeline timeout must be ≥ 1 second".into(),
            });
        }
        if c.fetch_timeout_secs == 0 || c.fetch_attempt_timeout_secs == 0 {
            return Err(AnalysisError::InvalidRequest {
                detail: "fetch timeouts must be ≥ 1 second".into(),
            });
        }
        if c.fetch_timeout_secs > c.pipeline_timeout_secs {
            return Err(AnalysisError::InvalidRequest {
                detail: format!(
                    "fetch budget ({}s) cannot exceed the pipeline deadline ({}s)",
                    c.fetch_timeout_secs, c.pipeline_timeout_secs
                ),
            });
        }
        if c.max_document_bytes < 1024 {
            return Err(AnalysisError::InvalidRequest {
                detail: "document size cap below 1 KiB rejects every real statement".into(),
            });
        }
        Ok(self.config)
    }
}
