//! Known runner startup failures.
//!
//! A runner exits non-zero whenever any test fails, so a failed exit alone
//! says nothing. Only output matching one of these signatures is treated as
//! a failure to run at all.

/// Reported when the runner executable cannot be spawned.
pub const RUNNER_NOT_FOUND: &str = "Runner not found";

/// Signature needles (lowercase) and the error they map to, checked in order.
const SIGNATURES: &[(&[&str], &str)] = &[
    (
        &["browsertype.launch", "failed to launch", "executable doesn't exist"],
        "Browser launch failed",
    ),
    (&["startup error"], "Startup Error"),
    (&["no test files found", "no tests found"], "No tests found"),
    (&["test timed out", "test timeout"], "Test timeout"),
    (
        &[
            "err_dlopen_failed",
            "cannot find native binding",
            "window is not defined",
            "document is not defined",
        ],
        "Platform render error",
    ),
    (&["unhandled rejection", "unhandledrejection"], "Unhandled rejection"),
];

/// Map runner output to a short error, if it matches a known signature.
pub fn classify_failure(output: &str) -> Option<&'static str> {
    let normalized = output.to_lowercase();
    SIGNATURES
        .iter()
        .find(|(needles, _)| needles.iter().any(|n| normalized.contains(n)))
        .map(|(_, error)| *error)
}
