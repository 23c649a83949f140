//! Test run results and their summary.
//!
//! [`TestRunSummary`] is the final artifact of a run. It is serialized
//! verbatim into the telemetry payload, so its field names are part of the
//! event contract.

pub mod parser;
pub mod schema;

use serde::{Deserialize, Serialize};

use crate::categorize::CategorizedError;

pub use parser::{parse_report, parse_report_with, story_results};
pub use schema::RawReport;

/// Outcome of a single story test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TestStatus {
    Pass,
    Fail,
    Pending,
}

impl TestStatus {
    /// Map the runner's status string.
    pub fn from_runner(status: &str) -> Self {
        match status {
            "passed" => TestStatus::Pass,
            "failed" => TestStatus::Fail,
            _ => TestStatus::Pending,
        }
    }
}

/// Result of one assertion in the runner's report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoryTestResult {
    pub story_id: String,
    pub status: TestStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
    #[serde(default)]
    pub empty_render: bool,
}

/// Aggregate counters and rates for a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestSummary {
    pub total: u64,
    pub passed: u64,
    pub passed_but_empty_render: u64,
    pub failed: u64,
    pub success_rate: f64,
    pub success_rate_without_empty_render: f64,
    pub failure_rate: f64,
    /// Distinct full error messages, not distinct categories.
    pub unique_error_count: usize,
    pub categorized_errors: Vec<CategorizedError>,
}

/// Final result of a test run.
///
/// Failures never escape as errors; they are reported through `error`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestRunSummary {
    pub success: bool,
    /// Wall-clock duration in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<TestSummary>,
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "runError")]
    pub error: Option<String>,
}

impl TestRunSummary {
    /// A run that produced a parsed report.
    pub fn completed(summary: TestSummary) -> Self {
        Self {
            success: true,
            duration: None,
            summary: Some(summary),
            error: None,
        }
    }

    /// A run that failed before a usable report existed.
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            duration: None,
            summary: None,
            error: Some(error.into()),
        }
    }

    /// Attach the measured duration.
    pub fn with_duration(mut self, duration_ms: u64) -> Self {
        self.duration = Some(duration_ms);
        self
    }
}
