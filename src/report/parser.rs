//! Normalisation of a raw runner report into a [`TestRunSummary`].

use std::collections::HashSet;

use tracing::debug;

use super::schema::{RawAssertion, RawReport};
use super::{StoryTestResult, TestRunSummary, TestStatus, TestSummary};
use crate::categorize::{default_categorizer, ErrorCategorizer};
use crate::round2;

/// Derive one [`StoryTestResult`] per assertion, in report order.
pub fn story_results(report: &RawReport) -> Vec<StoryTestResult> {
    report.assertions().map(story_result).collect()
}

fn story_result(assertion: &RawAssertion) -> StoryTestResult {
    let first_failure = assertion.failure_messages.first();
    StoryTestResult {
        story_id: assertion.story_id().to_string(),
        status: TestStatus::from_runner(&assertion.status),
        error: first_failure.map(|m| m.lines().next().unwrap_or_default().to_string()),
        stack: first_failure.cloned(),
        empty_render: assertion.is_empty_render(),
    }
}

/// Summarise a report using the built-in categorization rules.
pub fn parse_report(report: &RawReport) -> TestRunSummary {
    parse_report_with(report, default_categorizer())
}

/// Summarise a report with a specific categorizer.
///
/// `total`, `passed` and `failed` come from the report's own counters;
/// pending tests are counted in neither `passed` nor `failed`.
pub fn parse_report_with(report: &RawReport, categorizer: &ErrorCategorizer) -> TestRunSummary {
    let results = story_results(report);

    let total = report.num_total_tests;
    let passed = report.num_passed_tests;
    let failed = report.num_failed_tests;
    let passed_but_empty_render = results
        .iter()
        .filter(|r| r.status == TestStatus::Pass && r.empty_render)
        .count() as u64;

    let rate = |count: u64| {
        if total == 0 {
            0.0
        } else {
            round2(count as f64 / total as f64)
        }
    };

    let failures: Vec<(&str, Option<&str>)> = results
        .iter()
        .filter(|r| r.status == TestStatus::Fail)
        .map(|r| (r.error.as_deref().unwrap_or_default(), r.stack.as_deref()))
        .collect();

    let unique_error_count = failures
        .iter()
        .map(|(message, _)| *message)
        .filter(|message| !message.is_empty())
        .collect::<HashSet<_>>()
        .len();
    let categorized_errors = categorizer.aggregate(failures);

    debug!(
        total,
        passed,
        failed,
        categories = categorized_errors.len(),
        "parsed test report"
    );

    TestRunSummary::completed(TestSummary {
        total,
        passed,
        passed_but_empty_render,
        failed,
        success_rate: rate(passed),
        success_rate_without_empty_render: rate(passed.saturating_sub(passed_but_empty_render)),
        failure_rate: rate(failed),
        unique_error_count,
        categorized_errors,
    })
}
