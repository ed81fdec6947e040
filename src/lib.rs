//! # bailcheck
//!
//! Assess the solvency of a prospective commercial tenant from their filed
//! financial statements, using AI services for the parts that need judgment.
//!
//! ## Why this crate?
//!
//! A landlord deciding whether to sign a commercial lease needs more than a
//! credit score: they need the candidate's actual statements read, ratio'd,
//! and weighed against the rent. Doing that by hand takes an analyst an
//! afternoon per candidate. This crate automates the workflow end to end
//! while keeping every numeric contract validated in Rust — the models
//! extract, compute, and write, but nothing they return is trusted until it
//! parses into the fixed shapes defined here.
//!
//! ## Pipeline Overview
//!
//! ```text
//! document URL
//!  │
//!  ├─ 1. Fetch     download the statement PDF (bounded retry/backoff)
//!  ├─ 2. Extract   Gemini reads the PDF → standardised line items, N and N-1
//!  ├─ 3. Compute   Claude applies fixed formulas → 41 ratios in 6 categories
//!  ├─ 4. Narrate   Claude writes ~800 words + a discrete risk level
//!  └─ 5. Report    ratios + key figures + narrative + low/medium/high
//! ```
//!
//! The whole run sits under one deadline; each stage is additionally
//! cancelled if that deadline passes while it is in flight. Failures carry a
//! stage and a coarse reason code, never raw provider output.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use bailcheck::{analyze, AnalysisConfig, AnalysisRequest};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Providers auto-configured from GEMINI_API_KEY / ANTHROPIC_API_KEY
//!     let request = AnalysisRequest::new(
//!         "ACME SARL",
//!         "36 000",
//!         "https://example.com/bilan-2023.pdf",
//!     )?;
//!     let report = analyze(&request, &AnalysisConfig::default()).await?;
//!     println!("{}", serde_json::to_string_pretty(&report)?);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `bailcheck` binary (clap + anyhow + tracing-subscriber) |
//!
//! Disable `cli` when using only the library to avoid pulling in CLI-only deps:
//! ```toml
//! bailcheck = { version = "0.3", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod provider;
pub mod report;
pub mod request;
pub mod run;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{AnalysisConfig, AnalysisConfigBuilder};
pub use error::{AnalysisError, ErrorResponse};
pub use pipeline::narrate::RiskLevel;
pub use pipeline::ratios::{FiscalYear, RatioBundle, RatioCategory};
pub use progress::{NoopProgressCallback, PipelineProgressCallback, ProgressCallback};
pub use report::AnalysisReport;
pub use request::AnalysisRequest;
pub use run::{analyze, Stage};
