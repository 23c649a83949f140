//! Runner configuration and the shape of a single invocation.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Environment variable carrying the candidate paths to the runner.
pub const COMPONENT_PATHS_ENV: &str = "STORYBOOK_COMPONENT_PATHS";

/// Separator used when joining candidate paths into the environment.
pub const COMPONENT_PATHS_SEPARATOR: &str = ";";

/// Configuration for the external test runner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// Executable to launch.
    /// Default: `npx`
    pub program: String,

    /// Leading arguments, including the run-mode flag.
    /// Default: `["vitest", "run"]`
    pub args: Vec<String>,

    /// Flag selecting the JSON reporter.
    /// Default: `--reporter=json`
    pub reporter_flag: String,

    /// Per-test timeout passed to the runner, in milliseconds.
    /// Default: 1000
    pub test_timeout_ms: u64,

    /// Directory for report files, relative to the project root unless absolute.
    /// Default: `node_modules/.cache/ghost-stories`
    pub cache_dir: PathBuf,

    /// Extra environment variables for the runner process.
    pub env: BTreeMap<String, String>,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            program: "npx".to_string(),
            args: vec!["vitest".to_string(), "run".to_string()],
            reporter_flag: "--reporter=json".to_string(),
            test_timeout_ms: 1000,
            cache_dir: PathBuf::from("node_modules/.cache/ghost-stories"),
            env: BTreeMap::new(),
        }
    }
}

impl RunnerConfig {
    /// Creates a RunnerConfig with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the executable and its leading arguments.
    pub fn with_command<I, S>(mut self, program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.program = program.into();
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the per-test timeout.
    pub fn with_test_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.test_timeout_ms = timeout_ms;
        self
    }

    /// Sets the report directory.
    pub fn with_cache_dir(mut self, cache_dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = cache_dir.into();
        self
    }

    /// Adds an environment variable for the runner process.
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Report directory resolved against the project root.
    pub fn resolved_cache_dir(&self, root: &Path) -> PathBuf {
        if self.cache_dir.is_absolute() {
            self.cache_dir.clone()
        } else {
            root.join(&self.cache_dir)
        }
    }

    /// Shape the invocation for `files`, writing the report to `output_file`.
    pub fn invocation(&self, root: &Path, files: &[String], output_file: &Path) -> RunnerInvocation {
        let mut args = self.args.clone();
        args.push(self.reporter_flag.clone());
        args.push(format!("--testTimeout={}", self.test_timeout_ms));
        args.push(format!("--outputFile={}", output_file.display()));
        args.extend(files.iter().cloned());

        let mut env = self.env.clone();
        env.insert(
            COMPONENT_PATHS_ENV.to_string(),
            files.join(COMPONENT_PATHS_SEPARATOR),
        );

        RunnerInvocation {
            program: self.program.clone(),
            args,
            env,
            cwd: root.to_path_buf(),
            output_file: output_file.to_path_buf(),
        }
    }
}

/// A fully shaped runner command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunnerInvocation {
    pub program: String,
    pub args: Vec<String>,
    pub env: BTreeMap<String, String>,
    pub cwd: PathBuf,
    /// Where the runner is asked to write its JSON report.
    pub output_file: PathBuf,
}
