//! Integration tests for the ghost-stories binary.
//!
//! Each test runs the binary against a throwaway project directory and
//! checks the JSON it prints.

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

const COMPONENT: &str = "export const Alert = () => <div role=\"alert\" />;\nexport default Alert;\n";

/// Get a Command instance for the ghost-stories binary
#[allow(deprecated)]
fn ghost_cmd() -> Command {
    Command::cargo_bin("ghost-stories").expect("Failed to find ghost-stories binary")
}

fn write(root: &Path, relative: &str, content: &str) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().expect("parent")).expect("Failed to create dir");
    fs::write(path, content).expect("Failed to write file");
}

fn stdout_json(output: &std::process::Output) -> Value {
    serde_json::from_slice(&output.stdout).expect("stdout should be JSON")
}

#[test]
fn test_help_lists_subcommands() {
    ghost_cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("run"))
        .stdout(predicate::str::contains("discover"))
        .stdout(predicate::str::contains("score"))
        .stdout(predicate::str::contains("categorize"))
        .stdout(predicate::str::contains("events"));
}

#[test]
fn test_categorize_module_import_error() {
    ghost_cmd()
        .args(["categorize", "--message", "Cannot find module \"react\""])
        .assert()
        .success()
        .stdout(predicate::str::contains("MODULE_IMPORT_ERROR"));
}

#[test]
fn test_categorize_uses_stack_dependencies() {
    let output = ghost_cmd()
        .args([
            "categorize",
            "--message",
            "Cannot read properties of undefined (reading 'colors')",
            "--stack",
            "at Button (http://localhost:6006/node_modules/.vite/deps/styled-components.js?v=1:10:2)",
        ])
        .output()
        .expect("run categorize");

    assert!(output.status.success());
    let json = stdout_json(&output);
    assert_eq!(json["category"], "MISSING_THEME_PROVIDER");
    assert_eq!(json["matchedDependencies"], serde_json::json!(["styled-components"]));
}

#[test]
fn test_score_reports_component_facts() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    write(temp_dir.path(), "Alert.tsx", COMPONENT);

    let output = ghost_cmd()
        .current_dir(temp_dir.path())
        .args(["score", "Alert.tsx"])
        .output()
        .expect("run score");

    assert!(output.status.success());
    let json = stdout_json(&output);
    assert_eq!(json["candidate"], true);
    assert_eq!(json["simple"], true);
    assert_eq!(json["runtimeLines"], 2);
}

#[test]
fn test_score_missing_file_fails() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    ghost_cmd()
        .current_dir(temp_dir.path())
        .args(["score", "Missing.tsx"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot read"));
}

#[test]
fn test_discover_with_no_components() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    write(temp_dir.path(), "src/util.ts", "export const x = 1;\n");

    let output = ghost_cmd()
        .args(["discover", "--root"])
        .arg(temp_dir.path())
        .output()
        .expect("run discover");

    assert!(output.status.success());
    let json = stdout_json(&output);
    assert_eq!(json["matchCount"], 0);
    assert_eq!(json["candidates"], serde_json::json!([]));
    assert!(json.get("error").is_none());
}

#[test]
fn test_discover_selects_candidates() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    write(temp_dir.path(), "src/Alert.tsx", COMPONENT);
    write(temp_dir.path(), "src/Badge.jsx", COMPONENT);
    write(temp_dir.path(), "src/Alert.stories.tsx", COMPONENT);

    let output = ghost_cmd()
        .current_dir(temp_dir.path())
        .args(["discover", "--sample-size", "1"])
        .output()
        .expect("run discover");

    assert!(output.status.success());
    let json = stdout_json(&output);
    assert_eq!(json["matchCount"], 2);
    assert_eq!(json["candidates"].as_array().map(Vec::len), Some(1));
}

#[test]
fn test_invalid_config_is_rejected() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    write(
        temp_dir.path(),
        "ghost-stories.toml",
        "[discovery]\nsample_size = 0\n",
    );

    ghost_cmd()
        .current_dir(temp_dir.path())
        .arg("discover")
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid configuration"));
}

#[test]
fn test_events_empty_project() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");

    let output = ghost_cmd()
        .current_dir(temp_dir.path())
        .arg("events")
        .output()
        .expect("run events");

    assert!(output.status.success());
    let json = stdout_json(&output);
    assert_eq!(json["events"], serde_json::json!({}));
    assert!(json["precedingUpgrade"].is_null());
}

#[test]
fn test_run_without_candidates() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");

    let output = ghost_cmd()
        .current_dir(temp_dir.path())
        .args(["run", "--no-telemetry"])
        .output()
        .expect("run");

    assert!(output.status.success());
    let json = stdout_json(&output);
    assert_eq!(json["status"], "completed");
    assert_eq!(json["payload"]["success"], false);
    assert_eq!(json["payload"]["error"], "No candidates found");
    assert_eq!(json["payload"]["generatedCount"], 0);
}

/// Runner stand-in: writes a report with one pass and one failure to the
/// path given by `--outputFile=`.
#[cfg(unix)]
const FAKE_RUNNER_CONFIG: &str = r##"
[runner]
program = "sh"
args = ["-c", '''
for a in "$@"; do
  case "$a" in --outputFile=*) out="${a#--outputFile=}" ;; esac
done
printf '%s' '{"testResults":[{"assertionResults":[{"fullName":"A","status":"passed","failureMessages":[]},{"fullName":"B","status":"failed","failureMessages":["Cannot find module ./missing"]}]}],"numTotalTests":2,"numPassedTests":1,"numFailedTests":1}' > "$out"
exit 1
''', "runner"]

[telemetry]
output = "telemetry/events.jsonl"
"##;

#[cfg(unix)]
#[test]
fn test_run_is_recorded_once() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    write(temp_dir.path(), "ghost-stories.toml", FAKE_RUNNER_CONFIG);
    write(temp_dir.path(), "src/Alert.tsx", COMPONENT);
    write(temp_dir.path(), "src/Badge.tsx", COMPONENT);

    let first = ghost_cmd()
        .current_dir(temp_dir.path())
        .arg("run")
        .timeout(std::time::Duration::from_secs(30))
        .output()
        .expect("first run");
    assert!(first.status.success());
    let json = stdout_json(&first);
    assert_eq!(json["status"], "completed");
    let payload = &json["payload"];
    assert_eq!(payload["success"], true);
    assert_eq!(payload["generatedCount"], 2);
    assert_eq!(payload["matchCount"], 2);
    let summary = &payload["testSummary"]["summary"];
    assert_eq!(summary["passed"], 1);
    assert_eq!(summary["failed"], 1);
    assert_eq!(summary["successRate"], 0.5);
    assert_eq!(
        summary["categorizedErrors"][0]["category"],
        "MODULE_IMPORT_ERROR"
    );

    let events = fs::read_to_string(temp_dir.path().join("telemetry/events.jsonl"))
        .expect("telemetry written");
    assert_eq!(events.lines().count(), 1);
    assert!(events.contains("\"eventType\":\"ghost-stories\""));

    ghost_cmd()
        .current_dir(temp_dir.path())
        .arg("run")
        .assert()
        .success()
        .stdout(predicate::str::contains("\"skipped\""));

    ghost_cmd()
        .current_dir(temp_dir.path())
        .arg("events")
        .assert()
        .success()
        .stdout(predicate::str::contains("ghost-stories"));
}
