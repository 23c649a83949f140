//! Test execution adapter.
//!
//! Shapes a runner invocation for the selected candidates, runs it, and turns
//! whatever comes back into a [`TestRunSummary`]. Every failure mode is
//! reported through the summary's `error` field; nothing is returned as `Err`.

pub mod executor;
pub mod invocation;
pub mod signatures;

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::categorize::ErrorCategorizer;
use crate::report::{parse_report_with, RawReport, TestRunSummary};

pub use executor::{CommandExecutor, CommandOutput, TokioCommandExecutor};
pub use invocation::{RunnerConfig, RunnerInvocation, COMPONENT_PATHS_ENV};
pub use signatures::{classify_failure, RUNNER_NOT_FOUND};

/// The runner finished but left no report behind.
pub const REPORT_NOT_FOUND: &str = "JSON report not found";

/// The report exists but could not be read or decoded.
pub const REPORT_UNREADABLE: &str = "Failed to read or parse JSON report";

/// The report decoded but holds no test results.
pub const NO_TESTS_FOUND: &str = "No tests found";

/// The report directory could not be created.
pub const CACHE_DIR_UNAVAILABLE: &str = "Failed to create cache directory";

/// Runs candidate files through the external test runner.
pub struct TestExecutionAdapter {
    root: PathBuf,
    config: RunnerConfig,
    executor: Arc<dyn CommandExecutor>,
    categorizer: Arc<ErrorCategorizer>,
}

impl TestExecutionAdapter {
    /// Create an adapter for the project at `root`.
    pub fn new(root: impl Into<PathBuf>, config: RunnerConfig) -> Self {
        Self {
            root: root.into(),
            config,
            executor: Arc::new(TokioCommandExecutor),
            categorizer: Arc::new(ErrorCategorizer::default()),
        }
    }

    /// Replace the subprocess executor.
    pub fn with_executor(mut self, executor: Arc<dyn CommandExecutor>) -> Self {
        self.executor = executor;
        self
    }

    /// Replace the failure categorizer.
    pub fn with_categorizer(mut self, categorizer: Arc<ErrorCategorizer>) -> Self {
        self.categorizer = categorizer;
        self
    }

    /// Get the runner configuration.
    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// Run `files` and summarise the outcome.
    ///
    /// # Arguments
    ///
    /// * `files` - Candidate paths relative to the project root
    ///
    /// # Returns
    ///
    /// A summary whose `duration` is the wall-clock time of the whole call.
    pub async fn run_tests(&self, files: &[String]) -> TestRunSummary {
        let started = Instant::now();
        let summary = self.run_inner(files).await;
        let duration = started.elapsed().as_millis() as u64;

        match &summary.error {
            Some(error) => warn!(error = %error, duration_ms = duration, "test run failed"),
            None => info!(files = files.len(), duration_ms = duration, "test run finished"),
        }
        summary.with_duration(duration)
    }

    async fn run_inner(&self, files: &[String]) -> TestRunSummary {
        let cache_dir = self.config.resolved_cache_dir(&self.root);
        if let Err(e) = tokio::fs::create_dir_all(&cache_dir).await {
            warn!(dir = %cache_dir.display(), error = %e, "cannot create report directory");
            return TestRunSummary::failed(CACHE_DIR_UNAVAILABLE);
        }

        let output_file = report_path(&cache_dir);
        let invocation = self.config.invocation(&self.root, files, &output_file);

        match self.executor.run(&invocation).await {
            Ok(output) if !output.success => {
                if let Some(error) = classify_failure(&output.combined()) {
                    return TestRunSummary::failed(error);
                }
                debug!(
                    exit_code = ?output.exit_code,
                    "runner exited unsuccessfully; reading report"
                );
            }
            Ok(_) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                warn!(program = %invocation.program, error = %e, "test runner not found");
                return TestRunSummary::failed(RUNNER_NOT_FOUND);
            }
            Err(e) => {
                if let Some(error) = classify_failure(&e.to_string()) {
                    return TestRunSummary::failed(error);
                }
                warn!(error = %e, "test runner failed; reading report");
            }
        }

        self.read_report(&output_file).await
    }

    /// Read and summarise the report; the file is removed once read.
    async fn read_report(&self, output_file: &Path) -> TestRunSummary {
        let content = match tokio::fs::read_to_string(output_file).await {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return TestRunSummary::failed(REPORT_NOT_FOUND);
            }
            Err(e) => {
                warn!(path = %output_file.display(), error = %e, "cannot read test report");
                return TestRunSummary::failed(REPORT_UNREADABLE);
            }
        };
        if let Err(e) = tokio::fs::remove_file(output_file).await {
            debug!(path = %output_file.display(), error = %e, "cannot remove test report");
        }

        let report: RawReport = match serde_json::from_str(&content) {
            Ok(report) => report,
            Err(e) => {
                warn!(path = %output_file.display(), error = %e, "cannot parse test report");
                return TestRunSummary::failed(REPORT_UNREADABLE);
            }
        };

        if report.assertion_count() == 0 {
            return TestRunSummary::failed(NO_TESTS_FOUND);
        }

        parse_report_with(&report, &self.categorizer)
    }
}

/// Unique report path: millisecond timestamp plus process id.
fn report_path(cache_dir: &Path) -> PathBuf {
    cache_dir.join(format!(
        "test-results-{}-{}.json",
        Utc::now().timestamp_millis(),
        std::process::id()
    ))
}
