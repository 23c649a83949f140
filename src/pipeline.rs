//! The at-most-once ghost stories run.
//!
//! Discovery, the sample test run and failure categorization are tied
//! together here and reported as a single `ghost-stories` telemetry event.
//! The run is gated by a marker in the event cache, written through the
//! cache queue before any expensive work starts.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use futures::FutureExt;
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::{ConfigError, GhostStoriesConfig};
use crate::discovery::{CandidateDiscovery, DiscoveryOptions};
use crate::execution::TestExecutionAdapter;
use crate::report::TestRunSummary;
use crate::telemetry::{EventCache, EventType, Telemetry, TelemetryError};

/// Reported when discovery succeeds but selects nothing.
pub const NO_CANDIDATES: &str = "No candidates found";

/// Errors that can occur while assembling a run.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Telemetry(#[from] TelemetryError),
}

/// Result type for pipeline assembly.
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Telemetry payload of a ghost stories run. Field names are the event contract.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GhostStoriesPayload {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_count: Option<usize>,
    /// Milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_duration: Option<u64>,
    /// Milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis_duration: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_summary: Option<TestRunSummary>,
    pub match_count: usize,
}

impl GhostStoriesPayload {
    /// Minimal failure payload.
    pub fn failed(error: impl Into<String>, match_count: usize) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            match_count,
            ..Self::default()
        }
    }
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "payload", rename_all = "lowercase")]
pub enum RunOutcome {
    /// A previous run was already recorded.
    Skipped,
    Completed(GhostStoriesPayload),
}

/// One ghost stories run over a project.
pub struct GhostStoriesRun {
    discovery: CandidateDiscovery,
    options: DiscoveryOptions,
    adapter: TestExecutionAdapter,
    telemetry: Telemetry,
}

impl GhostStoriesRun {
    pub fn new(
        discovery: CandidateDiscovery,
        options: DiscoveryOptions,
        adapter: TestExecutionAdapter,
        telemetry: Telemetry,
    ) -> Self {
        Self {
            discovery,
            options,
            adapter,
            telemetry,
        }
    }

    /// Assemble a run from configuration, using the filesystem, the
    /// configured runner and the configured telemetry sink.
    pub fn from_config(root: &Path, config: &GhostStoriesConfig) -> PipelineResult<Self> {
        let discovery =
            CandidateDiscovery::new(root).with_exclusions(config.discovery.exclusions()?);
        let adapter = TestExecutionAdapter::new(root, config.runner.clone());
        let cache = EventCache::new(Arc::new(config.telemetry.cache_store(root)));
        let telemetry = Telemetry::new(root, config.telemetry.sink(root)?, cache);

        Ok(Self::new(
            discovery,
            config.discovery.options(),
            adapter,
            telemetry,
        ))
    }

    /// Get the event cache backing the run marker.
    pub fn cache(&self) -> &EventCache {
        self.telemetry.cache()
    }

    /// Run unless a previous run is recorded; `force` ignores the record.
    ///
    /// Never fails: stage failures and panics end up in the payload.
    pub async fn execute(&self, force: bool) -> RunOutcome {
        if !force && self.already_ran().await {
            info!("ghost stories already recorded for this project, skipping");
            return RunOutcome::Skipped;
        }

        let marker = self
            .telemetry
            .event(EventType::GhostStories, json!({ "status": "started" }));
        if let Err(e) = self.cache().set(EventType::GhostStories, marker).await {
            warn!(error = %e, "failed to record run marker");
        }

        let match_count = AtomicUsize::new(0);
        let payload = match AssertUnwindSafe(self.run_stages(&match_count))
            .catch_unwind()
            .await
        {
            Ok(payload) => payload,
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                warn!(error = %message, "ghost stories run panicked");
                GhostStoriesPayload::failed(message, match_count.load(Ordering::SeqCst))
            }
        };

        self.report(&payload).await;
        RunOutcome::Completed(payload)
    }

    async fn already_ran(&self) -> bool {
        match self.cache().get(EventType::GhostStories).await {
            Ok(entry) => entry.is_some(),
            Err(e) => {
                warn!(error = %e, "cannot read event cache, treating run as recorded");
                true
            }
        }
    }

    async fn run_stages(&self, match_count: &AtomicUsize) -> GhostStoriesPayload {
        let started = Instant::now();
        let candidates = self.discovery.discover(&self.options).await;
        let analysis_duration = started.elapsed().as_millis() as u64;
        match_count.store(candidates.match_count, Ordering::SeqCst);

        if let Some(error) = candidates.error {
            return GhostStoriesPayload {
                analysis_duration: Some(analysis_duration),
                ..GhostStoriesPayload::failed(error, candidates.match_count)
            };
        }

        if candidates.candidates.is_empty() {
            debug!(match_count = candidates.match_count, "no candidates selected");
            return GhostStoriesPayload {
                generated_count: Some(0),
                analysis_duration: Some(analysis_duration),
                ..GhostStoriesPayload::failed(NO_CANDIDATES, candidates.match_count)
            };
        }

        let summary = self.adapter.run_tests(&candidates.candidates).await;

        GhostStoriesPayload {
            success: summary.success,
            error: summary.error.clone(),
            generated_count: Some(candidates.candidates.len()),
            test_duration: summary.duration,
            analysis_duration: Some(analysis_duration),
            test_summary: Some(summary),
            match_count: candidates.match_count,
        }
    }

    async fn report(&self, payload: &GhostStoriesPayload) {
        let value = match serde_json::to_value(payload) {
            Ok(value) => value,
            Err(e) => {
                warn!(error = %e, "cannot encode ghost stories payload");
                return;
            }
        };
        if let Err(e) = self.telemetry.emit(EventType::GhostStories, value).await {
            warn!(error = %e, "failed to send ghost stories telemetry");
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unexpected panic".to_string()
    }
}
