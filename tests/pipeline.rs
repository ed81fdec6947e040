//! End-to-end pipeline tests with stub providers and a loopback HTTP host.
//!
//! No external service is contacted: documents are served from a local
//! listener and the three AI capabilities are scripted stubs with call
//! counters, so stage sequencing and short-circuiting are observable.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use bailcheck::pipeline::extract::RawLineItems;
use bailcheck::pipeline::fetch::FetchedDocument;
use bailcheck::provider::{Calculator, Extractor, Narrator, UpstreamError};
use bailcheck::{analyze, AnalysisConfig, AnalysisError, AnalysisRequest, RatioBundle};

/// Route pipeline logs through the test harness when RUST_LOG is set.
fn init_logs() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

// ── Loopback HTTP host ───────────────────────────────────────────────────

/// Serve a fixed sequence of responses, one per connection. Returns the
/// document URL and a counter of connections actually made.
async fn serve(responses: Vec<(u16, Vec<u8>)>) -> (String, Arc<AtomicUsize>) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let hits = Arc::new(AtomicUsize::new(0));
    let hits_inner = Arc::clone(&hits);

    tokio::spawn(async move {
        for (status, body) in responses {
            let (mut sock, _) = match listener.accept().await {
                Ok(conn) => conn,
                Err(_) => return,
            };
            hits_inner.fetch_add(1, Ordering::SeqCst);
            let mut buf = [0u8; 2048];
            let _ = sock.read(&mut buf).await;
            let reason = if status == 200 { "OK" } else { "Error" };
            let header = format!(
                "HTTP/1.1 {status} {reason}\r\nContent-Type: application/pdf\r\n\
                 Content-Length: {}\r\nConnection: close\r\n\r\n",
                body.len()
            );
            let _ = sock.write_all(header.as_bytes()).await;
            let _ = sock.write_all(&body).await;
        }
    });

    (format!("http://{addr}/bilan.pdf"), hits)
}

/// Accept connections but never answer them, so every attempt times out.
async fn serve_stalled() -> (String, Arc<AtomicUsize>) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let hits = Arc::new(AtomicUsize::new(0));
    let hits_inner = Arc::clone(&hits);

    tokio::spawn(async move {
        let mut held = Vec::new();
        loop {
            match listener.accept().await {
                Ok((sock, _)) => {
                    hits_inner.fetch_add(1, Ordering::SeqCst);
                    held.push(sock);
                }
                Err(_) => return,
            }
        }
    });

    (format!("http://{addr}/bilan.pdf"), hits)
}

// ── Scripted providers ───────────────────────────────────────────────────

struct StubExtractor {
    response: Result<String, String>,
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl Extractor for StubExtractor {
    async fn extract(
        &self,
        _document: &FetchedDocument,
        _company_name: &str,
    ) -> Result<String, UpstreamError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.response.clone().map_err(UpstreamError::new)
    }
}

struct StubCalculator {
    response: String,
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl Calculator for StubCalculator {
    async fn compute_ratios(
        &self,
        _line_items: &RawLineItems,
        _company_name: &str,
        _annual_rent: f64,
    ) -> Result<String, UpstreamError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.response.clone())
    }
}

struct StubNarrator {
    response: String,
    delay: Duration,
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl Narrator for StubNarrator {
    async fn narrate(
        &self,
        _ratios: &RatioBundle,
        _company_name: &str,
        _annual_rent: f64,
    ) -> Result<String, UpstreamError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        Ok(self.response.clone())
    }
}

// ── Fixtures ─────────────────────────────────────────────────────────────

fn line_items_json() -> String {
    r#"[
        {"intitule": "Chiffre d'affaires net", "annee": 2023, "valeur": 152450},
        {"intitule": "Chiffre d'affaires net", "annee": 2022, "valeur": 140000},
        {"intitule": "Résultat net comptable", "annee": 2023, "valeur": 8000},
        {"intitule": "Résultat net comptable", "annee": 2022, "valeur": 7500},
        {"intitule": "Capitaux propres", "annee": 2023, "valeur": 42000},
        {"intitule": "Capitaux propres", "annee": 2022, "valeur": 41500}
    ]"#
    .to_string()
}

fn bundle_json() -> String {
    r#"{
        "structure_financiere": {"annee_n": {"frng": 12000, "bfr": 8000}, "annee_n_moins_1": {}},
        "activite_exploitation": {"annee_n": {"ebe": 18000}, "annee_n_moins_1": {}},
        "rentabilite": {"annee_n": {}, "annee_n_moins_1": {}},
        "evolution": {"taux_variation_chiffre_affaires_pct": 0.089},
        "tresorerie_financement": {"annee_n": {}, "annee_n_moins_1": {}},
        "delais_paiement": {"annee_n": {}, "annee_n_moins_1": {}}
    }"#
    .to_string()
}

fn assessment_json() -> String {
    r#"{"analyse_financiere": "La situation financière est correcte mais sensible au cycle d'exploitation.", "niveau_risque": "moyen"}"#.to_string()
}

struct Counters {
    extractor: Arc<AtomicUsize>,
    calculator: Arc<AtomicUsize>,
    narrator: Arc<AtomicUsize>,
}

/// A config wired entirely to stubs, with fast timeouts for tests.
fn stub_config(
    extractor_response: Result<String, String>,
    calculator_response: String,
    narrator_response: String,
    narrator_delay: Duration,
) -> (AnalysisConfig, Counters) {
    let counters = Counters {
        extractor: Arc::new(AtomicUsize::new(0)),
        calculator: Arc::new(AtomicUsize::new(0)),
        narrator: Arc::new(AtomicUsize::new(0)),
    };
    let config = AnalysisConfig::builder()
        .fetch_timeout_secs(10)
        .fetch_attempt_timeout_secs(5)
        .retry_backoff_ms(10)
        .pipeline_timeout_secs(30)
        .extractor(Arc::new(StubExtractor {
            response: extractor_response,
            calls: Arc::clone(&counters.extractor),
        }))
        .calculator(Arc::new(StubCalculator {
            response: calculator_response,
            calls: Arc::clone(&counters.calculator),
        }))
        .narrator(Arc::new(StubNarrator {
            response: narrator_response,
            delay: narrator_delay,
            calls: Arc::clone(&counters.narrator),
        }))
        .build()
        .unwrap();
    (config, counters)
}

// ── Tests ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn full_pipeline_produces_a_report() {
    init_logs();
    let (url, _) = serve(vec![(200, b"%PDF-1.4 fake".to_vec())]).await;
    let (config, counters) = stub_config(
        Ok(line_items_json()),
        bundle_json(),
        assessment_json(),
        Duration::ZERO,
    );
    let request = AnalysisRequest::new("ACME SARL", "36 000", &url).unwrap();

    let report = analyze(&request, &config).await.unwrap();

    assert_eq!(report.status, "completed");
    assert_eq!(report.company_name, "ACME SARL");
    assert_eq!(report.annual_rent, 36000.0);
    assert_eq!(report.risk_level.to_string(), "medium");
    assert!(report.narrative.contains("situation financière"));
    assert!(report.processing_time >= 0.0);
    // 14 key figures for each of the two years.
    assert_eq!(report.key_figures.len(), 28);
    assert_eq!(report.key_figures["chiffre_affaires_n"], "152 450 K€");

    assert_eq!(counters.extractor.load(Ordering::SeqCst), 1);
    assert_eq!(counters.calculator.load(Ordering::SeqCst), 1);
    assert_eq!(counters.narrator.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn extraction_failure_short_circuits_later_stages() {
    let (url, _) = serve(vec![(200, b"%PDF-1.4 fake".to_vec())]).await;
    let (config, counters) = stub_config(
        Err("model unavailable".into()),
        bundle_json(),
        assessment_json(),
        Duration::ZERO,
    );
    let request = AnalysisRequest::new("ACME SARL", "36000", &url).unwrap();

    let err = analyze(&request, &config).await.unwrap_err();
    assert_eq!(err.stage(), "extract");
    assert_eq!(err.reason(), "upstream_error");
    assert_eq!(counters.calculator.load(Ordering::SeqCst), 0);
    assert_eq!(counters.narrator.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn empty_extraction_is_a_failure_not_an_empty_report() {
    let (url, _) = serve(vec![(200, b"%PDF-1.4 fake".to_vec())]).await;
    let (config, counters) = stub_config(
        Ok("[]".to_string()),
        bundle_json(),
        assessment_json(),
        Duration::ZERO,
    );
    let request = AnalysisRequest::new("ACME SARL", "36000", &url).unwrap();

    let err = analyze(&request, &config).await.unwrap_err();
    assert_eq!(err.stage(), "extract");
    assert_eq!(err.reason(), "empty_result");
    assert_eq!(counters.calculator.load(Ordering::SeqCst), 0);
    assert_eq!(counters.narrator.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn transient_server_errors_are_retried() {
    let (url, hits) = serve(vec![
        (500, Vec::new()),
        (503, Vec::new()),
        (200, b"%PDF-1.4 fake".to_vec()),
    ])
    .await;
    let (config, counters) = stub_config(
        Ok(line_items_json()),
        bundle_json(),
        assessment_json(),
        Duration::ZERO,
    );
    let request = AnalysisRequest::new("ACME SARL", "36000", &url).unwrap();

    let report = analyze(&request, &config).await.unwrap();
    assert_eq!(report.status, "completed");
    assert_eq!(hits.load(Ordering::SeqCst), 3);
    assert_eq!(counters.extractor.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn exhausting_all_attempts_on_5xx_reports_http_error() {
    let (url, hits) = serve(vec![
        (500, Vec::new()),
        (500, Vec::new()),
        (500, Vec::new()),
    ])
    .await;
    let (config, counters) = stub_config(
        Ok(line_items_json()),
        bundle_json(),
        assessment_json(),
        Duration::ZERO,
    );
    let request = AnalysisRequest::new("ACME SARL", "36000", &url).unwrap();

    let err = analyze(&request, &config).await.unwrap_err();
    assert_eq!(err.stage(), "fetch");
    assert_eq!(err.reason(), "http_error");
    assert_eq!(hits.load(Ordering::SeqCst), 3, "all three attempts must run");
    assert_eq!(counters.extractor.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn unresponsive_host_exhausts_the_budget_as_timeout() {
    let (url, hits) = serve_stalled().await;
    let (mut config, counters) = stub_config(
        Ok(line_items_json()),
        bundle_json(),
        assessment_json(),
        Duration::ZERO,
    );
    config.fetch_timeout_secs = 1;
    config.fetch_attempt_timeout_secs = 1;
    let request = AnalysisRequest::new("ACME SARL", "36000", &url).unwrap();

    let err = analyze(&request, &config).await.unwrap_err();
    assert_eq!(err.stage(), "fetch");
    assert_eq!(err.reason(), "timeout");
    assert!(hits.load(Ordering::SeqCst) >= 1);
    assert_eq!(counters.extractor.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn missing_document_is_not_retried() {
    let (url, hits) = serve(vec![(404, Vec::new()), (404, Vec::new())]).await;
    let (config, counters) = stub_config(
        Ok(line_items_json()),
        bundle_json(),
        assessment_json(),
        Duration::ZERO,
    );
    let request = AnalysisRequest::new("ACME SARL", "36000", &url).unwrap();

    let err = analyze(&request, &config).await.unwrap_err();
    assert_eq!(err.stage(), "fetch");
    assert_eq!(err.reason(), "http_error");
    assert_eq!(hits.load(Ordering::SeqCst), 1, "a 404 must not be retried");
    assert_eq!(counters.extractor.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn pipeline_deadline_interrupts_the_running_stage() {
    let (url, _) = serve(vec![(200, b"%PDF-1.4 fake".to_vec())]).await;
    let (mut config, counters) = stub_config(
        Ok(line_items_json()),
        bundle_json(),
        assessment_json(),
        Duration::from_secs(30),
    );
    config.pipeline_timeout_secs = 1;
    config.fetch_timeout_secs = 1;
    let request = AnalysisRequest::new("ACME SARL", "36000", &url).unwrap();

    let err = analyze(&request, &config).await.unwrap_err();
    match err {
        AnalysisError::PipelineTimeout { stage } => {
            assert_eq!(stage.to_string(), "narrating");
        }
        other => panic!("expected PipelineTimeout, got {other:?}"),
    }
    assert_eq!(counters.narrator.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn malformed_ratio_bundle_fails_the_compute_stage() {
    let (url, _) = serve(vec![(200, b"%PDF-1.4 fake".to_vec())]).await;
    let (config, counters) = stub_config(
        Ok(line_items_json()),
        "Voici les ratios demandés, en prose.".to_string(),
        assessment_json(),
        Duration::ZERO,
    );
    let request = AnalysisRequest::new("ACME SARL", "36000", &url).unwrap();

    let err = analyze(&request, &config).await.unwrap_err();
    assert_eq!(err.stage(), "compute");
    assert_eq!(err.reason(), "malformed_response");
    assert_eq!(counters.narrator.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn unknown_risk_token_fails_narration() {
    let (url, _) = serve(vec![(200, b"%PDF-1.4 fake".to_vec())]).await;
    let (config, _) = stub_config(
        Ok(line_items_json()),
        bundle_json(),
        r#"{"analyse_financiere": "Analyse.", "niveau_risque": "catastrophique"}"#.to_string(),
        Duration::ZERO,
    );
    let request = AnalysisRequest::new("ACME SARL", "36000", &url).unwrap();

    let err = analyze(&request, &config).await.unwrap_err();
    assert_eq!(err.stage(), "narrate");
    assert_eq!(err.reason(), "invalid_risk_level");
}

#[tokio::test]
async fn oversized_document_is_rejected_permanently() {
    let (url, hits) = serve(vec![(200, vec![0u8; 4096])]).await;
    let (mut config, counters) = stub_config(
        Ok(line_items_json()),
        bundle_json(),
        assessment_json(),
        Duration::ZERO,
    );
    config.max_document_bytes = 1024;
    let request = AnalysisRequest::new("ACME SARL", "36000", &url).unwrap();

    let err = analyze(&request, &config).await.unwrap_err();
    assert_eq!(err.stage(), "fetch");
    assert_eq!(err.reason(), "too_large");
    assert_eq!(hits.load(Ordering::SeqCst), 1);
    assert_eq!(counters.extractor.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn error_response_shape_is_stable() {
    let (url, _) = serve(vec![(404, Vec::new())]).await;
    let (config, _) = stub_config(
        Ok(line_items_json()),
        bundle_json(),
        assessment_json(),
        Duration::ZERO,
    );
    let request = AnalysisRequest::new("ACME SARL", "36000", &url).unwrap();

    let err = analyze(&request, &config).await.unwrap_err();
    let json = serde_json::to_value(err.to_response()).unwrap();
    assert_eq!(json["status"], "error");
    assert_eq!(json["stage"], "fetch");
    assert_eq!(json["reason"], "http_error");
    assert_eq!(json.as_object().unwrap().len(), 3);
}
