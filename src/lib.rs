//! Ghost Stories: discovery and diagnosis of component sample runs.
//!
//! The pipeline scans a project for component files, scores their structural
//! complexity to pick simple samples, runs a short test pass against them
//! through an external runner, and classifies the failures into root-cause
//! categories. The result is reported as a single anonymised telemetry event.
//!
//! # Overview
//!
//! - **analysis**: complexity scoring and the component validity check
//! - **discovery**: file enumeration, exclusion rules and candidate selection
//! - **execution**: runner invocation and startup-failure classification
//! - **report**: normalisation of the runner's JSON report
//! - **categorize**: prioritized rule engine over messages and stack traces
//! - **telemetry**: events, sinks and the serialized event cache
//! - **pipeline**: the at-most-once orchestrator tying the stages together
//!
//! # Example
//!
//! ```ignore
//! use ghost_stories::config::GhostStoriesConfig;
//! use ghost_stories::pipeline::GhostStoriesRun;
//!
//! let config = GhostStoriesConfig::load(&root, None)?;
//! let run = GhostStoriesRun::from_config(&root, &config)?;
//! let outcome = run.execute(false).await;
//! ```

pub mod analysis;
pub mod categorize;
pub mod config;
pub mod discovery;
pub mod execution;
pub mod logging;
pub mod pipeline;
pub mod report;
pub mod telemetry;

pub use categorize::{categorize_error, ErrorCategory, ErrorCategorizer};
pub use discovery::{CandidateDiscovery, ComponentCandidatesResult};
pub use execution::TestExecutionAdapter;
pub use pipeline::{GhostStoriesRun, RunOutcome};
pub use report::{parse_report, StoryTestResult, TestRunSummary, TestStatus};
pub use telemetry::{EventCache, EventType, TelemetryEvent};

/// Round to two decimal places, the precision used for every reported ratio.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
