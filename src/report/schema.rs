//! Serde model of the runner's JSON report.
//!
//! Only the fields the parser consumes are modelled. Everything is
//! defaulted so partially-written reports still deserialize.

use serde::Deserialize;
use serde_json::Value;

/// Report entry type carrying render analysis for a story.
pub const RENDER_ANALYSIS_REPORT: &str = "render-analysis";

/// Top-level report written by the runner's JSON reporter.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawReport {
    #[serde(default)]
    pub test_results: Vec<RawSuiteResult>,
    #[serde(default)]
    pub num_total_tests: u64,
    #[serde(default)]
    pub num_passed_tests: u64,
    #[serde(default)]
    pub num_failed_tests: u64,
}

impl RawReport {
    /// Number of assertions across all suites.
    pub fn assertion_count(&self) -> usize {
        self.test_results
            .iter()
            .map(|suite| suite.assertion_results.len())
            .sum()
    }

    /// All assertions in report order.
    pub fn assertions(&self) -> impl Iterator<Item = &RawAssertion> {
        self.test_results
            .iter()
            .flat_map(|suite| suite.assertion_results.iter())
    }
}

/// One test file's results.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawSuiteResult {
    #[serde(default)]
    pub assertion_results: Vec<RawAssertion>,
}

/// A single test case.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawAssertion {
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub failure_messages: Vec<String>,
    #[serde(default)]
    pub meta: Option<RawMeta>,
}

impl RawAssertion {
    /// Story id from the test metadata, falling back to the test name.
    pub fn story_id(&self) -> &str {
        self.meta
            .as_ref()
            .and_then(|meta| meta.story_id.as_deref())
            .unwrap_or(&self.full_name)
    }

    /// Whether render analysis flagged the story as rendering nothing.
    pub fn is_empty_render(&self) -> bool {
        self.meta.as_ref().is_some_and(|meta| {
            meta.reports.iter().any(|report| {
                report.kind == RENDER_ANALYSIS_REPORT
                    && report
                        .result
                        .get("emptyRender")
                        .and_then(Value::as_bool)
                        .unwrap_or(false)
            })
        })
    }
}

/// Story metadata attached by the test plugin.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawMeta {
    #[serde(default)]
    pub story_id: Option<String>,
    #[serde(default)]
    pub reports: Vec<RawMetaReport>,
}

/// Nested report entry, e.g. render analysis.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawMetaReport {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub result: Value,
}
