//! Pipeline orchestration: one request in, one report or one error out.
//!
//! ## Stage sequencing
//!
//! The four stages run strictly in order — fetch → extract → compute →
//! narrate — because each consumes the validated output of the previous one.
//! There is no partial-success mode: the first stage error ends the run, and
//! later stages are never invoked.
//!
//! ## Deadlines
//!
//! Two clocks bound a run. The fetch stage has its own retry budget
//! ([`crate::config::AnalysisConfig::fetch_timeout_secs`]), and the whole run
//! sits under the pipeline deadline. Every stage future is wrapped in
//! `timeout_at` against the same deadline instant, so however the time was
//! spent, the stage in flight when it passes is cancelled — dropping the
//! future aborts the underlying HTTP call — and the run fails with
//! `deadline_exceeded` naming that stage.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::info;

use crate::config::AnalysisConfig;
use crate::error::AnalysisError;
use crate::pipeline::{extract, fetch::DocumentFetcher, figures, narrate, ratios};
use crate::progress::ProgressCallback;
use crate::provider::{self, anthropic, gemini, Calculator, Extractor, Narrator};
use crate::report::AnalysisReport;
use crate::request::AnalysisRequest;

/// Where a run currently is. Used for progress events and for naming the
/// stage a deadline interrupted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Fetching,
    Extracting,
    Computing,
    Narrating,
    Done,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Fetching => "fetching",
            Stage::Extracting => "extracting",
            Stage::Computing => "computing",
            Stage::Narrating => "narrating",
            Stage::Done => "done",
        };
        f.write_str(name)
    }
}

/// Run the full analysis pipeline for one validated request.
///
/// # Example
/// ```rust,no_run
/// use bailcheck::{analyze, AnalysisConfig, AnalysisRequest};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let request = AnalysisRequest::new(
///         "ACME SARL",
///         "36 000",
///         "https://example.com/bilan-2023.pdf",
///     )?;
///     let report = analyze(&request, &AnalysisConfig::default()).await?;
///     println!("{}: {}", report.company_name, report.risk_level);
///     Ok(())
/// }
/// ```
pub async fn analyze(
    request: &AnalysisRequest,
    config: &AnalysisConfig,
) -> Result<AnalysisReport, AnalysisError> {
    let started = Instant::now();
    if let Some(ref cb) = config.progress {
        cb.on_pipeline_start(&request.company_name);
    }

    let result = run_stages(request, config, started).await;

    let elapsed = started.elapsed();
    if let Some(ref cb) = config.progress {
        cb.on_pipeline_complete(elapsed, result.is_ok());
    }
    match &result {
        Ok(report) => info!(
            "Analysis of {} completed in {:.2}s (risk: {})",
            request.company_name, report.processing_time, report.risk_level
        ),
        Err(e) => info!(
            "Analysis of {} failed after {:.2}s at stage '{}': {}",
            request.company_name,
            elapsed.as_secs_f64(),
            e.stage(),
            e
        ),
    }
    result
}

async fn run_stages(
    request: &AnalysisRequest,
    config: &AnalysisConfig,
    started: Instant,
) -> Result<AnalysisReport, AnalysisError> {
    let deadline = started + Duration::from_secs(config.pipeline_timeout_secs);
    let (extractor, calculator, narrator, client) = resolve_providers(config)?;

    // Stage 1: fetch.
    let fetcher = DocumentFetcher::new(
        client,
        config.fetch_attempts,
        Duration::from_millis(config.retry_backoff_ms),
        Duration::from_secs(config.fetch_attempt_timeout_secs),
        config.max_document_bytes,
        config.progress.clone(),
    );
    let fetch_budget = Duration::from_secs(config.fetch_timeout_secs);
    let document = stage(
        Stage::Fetching,
        deadline,
        &config.progress,
        fetcher.fetch(&request.document_url, fetch_budget),
    )
    .await?;

    // Stage 2: extract.
    let line_items = stage(
        Stage::Extracting,
        deadline,
        &config.progress,
        extract::run(extractor.as_ref(), &document, &request.company_name),
    )
    .await?;

    // Stage 3: compute.
    let bundle = stage(
        Stage::Computing,
        deadline,
        &config.progress,
        ratios::run(
            calculator.as_ref(),
            &line_items,
            &request.company_name,
            request.annual_rent,
        ),
    )
    .await?;

    // Stage 4: narrate.
    let assessment = stage(
        Stage::Narrating,
        deadline,
        &config.progress,
        narrate::run(
            narrator.as_ref(),
            &bundle,
            &request.company_name,
            request.annual_rent,
        ),
    )
    .await?;

    let key_figures = figures::project(&line_items, &bundle);

    Ok(AnalysisReport {
        status: "completed",
        company_name: request.company_name.clone(),
        annual_rent: request.annual_rent,
        ratios: bundle,
        key_figures,
        narrative: assessment.narrative,
        risk_level: assessment.risk_level,
        processing_time: started.elapsed().as_secs_f64(),
    })
}

/// Run one stage future under the pipeline deadline, emitting progress events
/// around it. A deadline hit cancels the future by dropping it.
async fn stage<T>(
    which: Stage,
    deadline: Instant,
    progress: &Option<ProgressCallback>,
    fut: impl Future<Output = Result<T, AnalysisError>>,
) -> Result<T, AnalysisError> {
    let stage_start = Instant::now();
    if let Some(cb) = progress {
        cb.on_stage_start(which);
    }
    let value = tokio::time::timeout_at(deadline, fut)
        .await
        .map_err(|_| AnalysisError::PipelineTimeout { stage: which })??;
    if let Some(cb) = progress {
        cb.on_stage_complete(which, stage_start.elapsed());
    }
    Ok(value)
}

type Providers = (
    Arc<dyn Extractor>,
    Arc<dyn Calculator>,
    Arc<dyn Narrator>,
    reqwest::Client,
);

/// Resolve the three capabilities: injected instances win, otherwise clients
/// are built from the environment. Calculator and narrator share one
/// Anthropic client when both come from the environment, and every provider
/// shares the config's pooled HTTP client across concurrent runs.
fn resolve_providers(config: &AnalysisConfig) -> Result<Providers, AnalysisError> {
    let client = config.http_client.clone();
    let api_timeout = Duration::from_secs(config.api_timeout_secs);

    let extractor = match &config.extractor {
        Some(e) => Arc::clone(e),
        None => provider::extractor_from_env(
            client.clone(),
            config
                .extraction_model
                .as_deref()
                .unwrap_or(gemini::DEFAULT_EXTRACTION_MODEL),
            api_timeout,
        )?,
    };

    let (calculator, narrator) = match (&config.calculator, &config.narrator) {
        (Some(c), Some(n)) => (Arc::clone(c), Arc::clone(n)),
        (c, n) => {
            let shared = provider::anthropic_from_env(
                client.clone(),
                config
                    .analyst_model
                    .as_deref()
                    .unwrap_or(anthropic::DEFAULT_ANALYST_MODEL),
                api_timeout,
            )?;
            let calculator: Arc<dyn Calculator> = match c {
                Some(c) => Arc::clone(c),
                None => shared.clone(),
            };
            let narrator: Arc<dyn Narrator> = match n {
                Some(n) => Arc::clone(n),
                None => shared,
            };
            (calculator, narrator)
        }
    };

    Ok((extractor, calculator, narrator, client))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_display_is_lowercase() {
        assert_eq!(Stage::Fetching.to_string(), "fetching");
        assert_eq!(Stage::Computing.to_string(), "computing");
        assert_eq!(Stage::Done.to_string(), "done");
    }

    #[tokio::test(start_paused = true)]
    async fn stage_deadline_cancels_the_future() {
        let deadline = Instant::now() + Duration::from_millis(50);
        let result: Result<(), AnalysisError> = stage(Stage::Narrating, deadline, &None, async {
            tokio::time::sleep(Duration::from_secs(10)).await;
            Ok(())
        })
        .await;
        match result {
            Err(AnalysisError::PipelineTimeout { stage }) => assert_eq!(stage, Stage::Narrating),
            other => panic!("expected PipelineTimeout, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn stage_passes_values_through() {
        let deadline = Instant::now() + Duration::from_secs(5);
        let result = stage(Stage::Computing, deadline, &None, async { Ok(41) }).await;
        assert_eq!(result.unwrap(), 41);
    }
}
