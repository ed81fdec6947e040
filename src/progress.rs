//! Progress-callback trait for pipeline stage events.
//!
//! Inject an [`Arc<dyn PipelineProgressCallback>`] via
//! [`crate::config::AnalysisConfigBuilder::progress`] to receive events as
//! the run moves through its stages.
//!
//! The callback approach is the least-invasive integration point: callers can
//! forward events to a channel, a log sink, or a terminal spinner without the
//! library knowing anything about how the host application communicates. The
//! trait is `Send + Sync` because the shared outbound clients allow several
//! runs to execute concurrently, each with its own callback or a shared one.

use std::sync::Arc;
use std::time::Duration;

use crate::run::Stage;

/// Called by the orchestrator as a run moves through its stages.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. Stages within one run are strictly sequential, so a
/// single run never invokes two methods concurrently; implementations shared
/// across runs must still synchronise their own state.
pub trait PipelineProgressCallback: Send + Sync {
    /// Called once before the first stage starts.
    fn on_pipeline_start(&self, company_name: &str) {
        let _ = company_name;
    }

    /// Called when a stage begins.
    fn on_stage_start(&self, stage: Stage) {
        let _ = stage;
    }

    /// Called when a stage finishes successfully.
    fn on_stage_complete(&self, stage: Stage, elapsed: Duration) {
        let _ = (stage, elapsed);
    }

    /// Called before each document-fetch retry sleep.
    ///
    /// `attempt` is the attempt that just failed (1-indexed); `delay` is the
    /// backoff wait before the next attempt.
    fn on_fetch_retry(&self, attempt: u32, delay: Duration) {
        let _ = (attempt, delay);
    }

    /// Called once after the run ends, successfully or not.
    fn on_pipeline_complete(&self, elapsed: Duration, success: bool) {
        let _ = (elapsed, success);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl PipelineProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::AnalysisConfig`].
pub type ProgressCallback = Arc<dyn PipelineProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct TrackingCallback {
        starts: AtomicUsize,
        completes: AtomicUsize,
        retries: AtomicUsize,
    }

    impl PipelineProgressCallback for TrackingCallback {
        fn on_stage_start(&self, _stage: Stage) {
            self.starts.fetch_add(1, Ordering::SeqCst);
        }

        fn on_stage_complete(&self, _stage: Stage, _elapsed: Duration) {
            self.completes.fetch_add(1, Ordering::SeqCst);
        }

        fn on_fetch_retry(&self, _attempt: u32, _delay: Duration) {
            self.retries.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_pipeline_start("ACME SARL");
        cb.on_stage_start(Stage::Fetching);
        cb.on_stage_complete(Stage::Fetching, Duration::from_millis(12));
        cb.on_fetch_retry(1, Duration::from_millis(500));
        cb.on_pipeline_complete(Duration::from_secs(3), true);
    }

    #[test]
    fn tracking_callback_receives_events() {
        let tracker = TrackingCallback {
            starts: AtomicUsize::new(0),
            completes: AtomicUsize::new(0),
            retries: AtomicUsize::new(0),
        };

        tracker.on_stage_start(Stage::Fetching);
        tracker.on_fetch_retry(1, Duration::from_millis(500));
        tracker.on_stage_complete(Stage::Fetching, Duration::from_secs(1));
        tracker.on_stage_start(Stage::Extracting);
        tracker.on_stage_complete(Stage::Extracting, Duration::from_secs(9));

        assert_eq!(tracker.starts.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.completes.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.retries.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn arc_dyn_callback_works() {
        let cb: Arc<dyn PipelineProgressCallback> = Arc::new(NoopProgressCallback);
        cb.on_stage_start(Stage::Narrating);
        cb.on_pipeline_complete(Duration::from_secs(1), false);
    }
}
