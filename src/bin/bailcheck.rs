//! CLI binary for bailcheck.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `AnalysisConfig` and prints the report.

use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use tracing_subscriber::EnvFilter;

use bailcheck::{
    analyze, AnalysisConfig, AnalysisRequest, PipelineProgressCallback, ProgressCallback, Stage,
};

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: one spinner that renames itself as the run
/// moves through its stages, with a ✓ log line per completed stage.
struct CliProgressCallback {
    bar: ProgressBar,
    current: Mutex<Option<Instant>>,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(style);
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self {
            bar,
            current: Mutex::new(None),
        })
    }

    fn stage_label(stage: Stage) -> &'static str {
        match stage {
            Stage::Fetching => "Downloading statement",
            Stage::Extracting => "Extracting line items",
            Stage::Computing => "Computing ratios",
            Stage::Narrating => "Writing assessment",
            Stage::Done => "Done",
        }
    }
}

impl PipelineProgressCallback for CliProgressCallback {
    fn on_pipeline_start(&self, company_name: &str) {
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Analysing {company_name}…"))
        ));
    }

    fn on_stage_start(&self, stage: Stage) {
        *self.current.lock().unwrap() = Some(Instant::now());
        self.bar.set_prefix(Self::stage_label(stage));
        self.bar.set_message("");
    }

    fn on_stage_complete(&self, stage: Stage, elapsed: Duration) {
        self.current.lock().unwrap().take();
        self.bar.println(format!(
            "  {} {:<24} {}",
            green("✓"),
            Self::stage_label(stage),
            dim(&format!("{:.1}s", elapsed.as_secs_f64())),
        ));
    }

    fn on_fetch_retry(&self, attempt: u32, delay: Duration) {
        self.bar
            .set_message(format!("retry {attempt} in {}ms", delay.as_millis()));
    }

    fn on_pipeline_complete(&self, elapsed: Duration, success: bool) {
        self.bar.finish_and_clear();
        if success {
            eprintln!(
                "{} analysis complete in {}",
                green("✔"),
                bold(&format!("{:.1}s", elapsed.as_secs_f64()))
            );
        } else {
            eprintln!(
                "{} analysis failed after {:.1}s",
                red("✘"),
                elapsed.as_secs_f64()
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Basic analysis (pretty JSON to stdout)
  bailcheck "ACME SARL" 36000 https://example.com/bilan-2023.pdf

  # French rent formatting works
  bailcheck "ACME SARL" "36 000,50" https://example.com/bilan.pdf

  # Write the report to a file
  bailcheck "ACME SARL" 36000 https://example.com/bilan.pdf -o report.json

  # Narrative only, no JSON
  bailcheck --text "ACME SARL" 36000 https://example.com/bilan.pdf

  # Pick models and tighten the deadline
  bailcheck --analyst-model claude-sonnet-4-20250514 --pipeline-timeout 300 \
      "ACME SARL" 36000 https://example.com/bilan.pdf

ENVIRONMENT VARIABLES:
  GEMINI_API_KEY       Google Gemini API key (statement extraction)
  ANTHROPIC_API_KEY    Anthropic API key (ratio computation and narration)
  CLAUDE_API_KEY       Accepted as a legacy spelling of ANTHROPIC_API_KEY

EXIT STATUS:
  0  analysis completed
  1  analysis failed; a JSON object {"status","stage","reason"} is printed
     to stderr
"#;

/// Assess a commercial tenant's solvency from their financial statements.
#[derive(Parser, Debug)]
#[command(
    name = "bailcheck",
    version,
    about = "Assess a commercial tenant's solvency from their financial statements",
    long_about = "Download a candidate tenant's financial statement PDF, extract its line \
items, compute 41 financial ratios, and produce a narrative risk assessment with a discrete \
low/medium/high risk level, weighed against the annual rent.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Company name of the candidate tenant.
    company: String,

    /// Annual rent. French formatting accepted ("36 000,50").
    rent: String,

    /// HTTP(S) URL of the financial statement PDF.
    url: String,

    /// Write the JSON report to this file instead of stdout.
    #[arg(short, long, env = "BAILCHECK_OUTPUT")]
    output: Option<PathBuf>,

    /// Print only the narrative and risk level, not the JSON report.
    #[arg(long, conflicts_with = "output")]
    text: bool,

    /// Extraction model ID.
    #[arg(long, env = "BAILCHECK_EXTRACTION_MODEL")]
    extraction_model: Option<String>,

    /// Ratio-computation and narration model ID.
    #[arg(long, env = "BAILCHECK_ANALYST_MODEL")]
    analyst_model: Option<String>,

    /// Whole-pipeline deadline in seconds.
    #[arg(long, env = "BAILCHECK_PIPELINE_TIMEOUT", default_value_t = 600)]
    pipeline_timeout: u64,

    /// Total document-download budget in seconds, retries included.
    #[arg(long, env = "BAILCHECK_FETCH_TIMEOUT", default_value_t = 120)]
    fetch_timeout: u64,

    /// Maximum download attempts on transient failures.
    #[arg(long, env = "BAILCHECK_FETCH_ATTEMPTS", default_value_t = 3)]
    fetch_attempts: u32,

    /// Per-provider-call timeout in seconds.
    #[arg(long, env = "BAILCHECK_API_TIMEOUT", default_value_t = 180)]
    api_timeout: u64,

    /// Disable the progress spinner.
    #[arg(long, env = "BAILCHECK_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "BAILCHECK_VERBOSE")]
    verbose: bool,

    /// Suppress all output except the report and errors.
    #[arg(short, long, env = "BAILCHECK_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Suppress INFO-level library logs when the spinner is active; the
    // spinner provides all the feedback that matters to the user.
    let show_progress = !cli.quiet && !cli.no_progress;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Build request and config ─────────────────────────────────────────
    let request = match AnalysisRequest::new(&cli.company, &cli.rent, &cli.url) {
        Ok(r) => r,
        Err(e) => return fail(&e),
    };

    let mut builder = AnalysisConfig::builder()
        .pipeline_timeout_secs(cli.pipeline_timeout)
        .fetch_timeout_secs(cli.fetch_timeout)
        .fetch_attempts(cli.fetch_attempts)
        .api_timeout_secs(cli.api_timeout);
    if let Some(ref model) = cli.extraction_model {
        builder = builder.extraction_model(model);
    }
    if let Some(ref model) = cli.analyst_model {
        builder = builder.analyst_model(model);
    }
    if show_progress {
        let cb: ProgressCallback = CliProgressCallback::new();
        builder = builder.progress(cb);
    }
    let config = match builder.build() {
        Ok(c) => c,
        Err(e) => return fail(&e),
    };

    // ── Run the pipeline ─────────────────────────────────────────────────
    let report = match analyze(&request, &config).await {
        Ok(r) => r,
        Err(e) => return fail(&e),
    };

    if cli.text {
        println!("{}", report.narrative);
        println!();
        println!("Risk level: {}", report.risk_level);
    } else {
        let json =
            serde_json::to_string_pretty(&report).context("Failed to serialise the report")?;
        match cli.output {
            Some(ref path) => {
                tokio::fs::write(path, &json)
                    .await
                    .with_context(|| format!("Failed to write report to {}", path.display()))?;
                if !cli.quiet {
                    eprintln!("Report written to {}", bold(&path.display().to_string()));
                }
            }
            None => {
                let stdout = io::stdout();
                let mut handle = stdout.lock();
                handle
                    .write_all(json.as_bytes())
                    .context("Failed to write to stdout")?;
                handle.write_all(b"\n").ok();
            }
        }
    }

    if !cli.quiet && !cli.text {
        eprintln!(
            "   risk: {}  —  {}",
            bold(&report.risk_level.to_string()),
            dim(&format!("{:.1}s total", report.processing_time)),
        );
    }
    Ok(ExitCode::SUCCESS)
}

/// Print the structured error shape and exit non-zero. Detail beyond
/// stage + reason only appears in logs, mirroring the library contract.
fn fail(error: &bailcheck::AnalysisError) -> Result<ExitCode> {
    eprintln!("{} {}", red("✘"), error);
    let response = serde_json::to_string(&error.to_response())
        .context("Failed to serialise the error response")?;
    eprintln!("{response}");
    Ok(ExitCode::FAILURE)
}
