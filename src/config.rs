//! Layered configuration.
//!
//! Sources, lowest precedence first: built-in defaults, `ghost-stories.toml`
//! in the project root (or an explicit file), then `GHOST_STORIES__*`
//! environment variables with `__` separating nested keys, e.g.
//! `GHOST_STORIES__DISCOVERY__SAMPLE_SIZE=10`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::discovery::{
    DiscoveryError, DiscoveryOptions, ExclusionRules, DEFAULT_GLOB_PATTERN, DEFAULT_SAMPLE_SIZE,
};
use crate::execution::RunnerConfig;
use crate::telemetry::{
    FileCacheStore, HttpTelemetrySink, JsonlTelemetrySink, NoopTelemetrySink, TelemetryResult,
    TelemetrySink,
};

/// Project-level configuration file name.
pub const CONFIG_FILE_NAME: &str = "ghost-stories.toml";

/// Environment variable prefix.
pub const ENV_PREFIX: &str = "GHOST_STORIES";

/// Errors that can occur while loading configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A source could not be read or deserialized.
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    /// A value is out of range.
    #[error("invalid configuration: {0}")]
    Invalid(String),

    /// An exclusion pattern does not compile.
    #[error(transparent)]
    Exclusion(#[from] DiscoveryError),
}

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Candidate discovery settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoverySettings {
    /// Number of candidates to select.
    /// Default: 20
    pub sample_size: usize,

    /// Glob for component files, relative to the project root.
    /// Default: `**/*.{tsx,jsx}`
    pub glob_pattern: String,

    /// Extra glob patterns excluded on top of the standard list.
    pub exclude: Vec<String>,
}

impl Default for DiscoverySettings {
    fn default() -> Self {
        Self {
            sample_size: DEFAULT_SAMPLE_SIZE,
            glob_pattern: DEFAULT_GLOB_PATTERN.to_string(),
            exclude: Vec::new(),
        }
    }
}

impl DiscoverySettings {
    pub fn options(&self) -> DiscoveryOptions {
        DiscoveryOptions {
            sample_size: self.sample_size,
            glob_pattern: self.glob_pattern.clone(),
        }
    }

    /// Standard exclusions plus the configured extras.
    pub fn exclusions(&self) -> ConfigResult<ExclusionRules> {
        Ok(ExclusionRules::standard().with_extra_patterns(&self.exclude)?)
    }
}

/// Telemetry settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetrySettings {
    /// Send events at all.
    /// Default: true
    pub enabled: bool,

    /// HTTP endpoint. Takes precedence over `output`.
    pub endpoint: Option<String>,

    /// JSON-lines file events are appended to.
    /// Default: `node_modules/.cache/ghost-stories/telemetry.jsonl`
    pub output: Option<PathBuf>,

    /// Event-cache file.
    /// Default: `node_modules/.cache/ghost-stories/event-cache.json`
    pub cache_file: PathBuf,
}

impl Default for TelemetrySettings {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: None,
            output: Some(PathBuf::from("node_modules/.cache/ghost-stories/telemetry.jsonl")),
            cache_file: PathBuf::from("node_modules/.cache/ghost-stories/event-cache.json"),
        }
    }
}

impl TelemetrySettings {
    /// Build the configured sink.
    pub fn sink(&self, root: &Path) -> TelemetryResult<Arc<dyn TelemetrySink>> {
        if !self.enabled {
            return Ok(Arc::new(NoopTelemetrySink));
        }
        if let Some(endpoint) = &self.endpoint {
            return Ok(Arc::new(HttpTelemetrySink::new(endpoint.clone())?));
        }
        Ok(match &self.output {
            Some(output) => Arc::new(JsonlTelemetrySink::new(resolve(root, output))),
            None => Arc::new(NoopTelemetrySink),
        })
    }

    /// Build the event-cache store.
    pub fn cache_store(&self, root: &Path) -> FileCacheStore {
        FileCacheStore::new(resolve(root, &self.cache_file))
    }
}

fn resolve(root: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    }
}

/// Complete configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GhostStoriesConfig {
    pub discovery: DiscoverySettings,
    pub runner: RunnerConfig,
    pub telemetry: TelemetrySettings,
    /// Log level used when `RUST_LOG` is unset.
    /// Default: `warn`
    pub log_level: String,
}

impl Default for GhostStoriesConfig {
    fn default() -> Self {
        Self {
            discovery: DiscoverySettings::default(),
            runner: RunnerConfig::default(),
            telemetry: TelemetrySettings::default(),
            log_level: "warn".to_string(),
        }
    }
}

impl GhostStoriesConfig {
    /// Load configuration for the project at `root`.
    ///
    /// # Arguments
    ///
    /// * `root` - Project root; `ghost-stories.toml` there is optional
    /// * `explicit` - A config file that must exist, replacing the project file
    pub fn load(root: &Path, explicit: Option<&Path>) -> ConfigResult<Self> {
        Self::load_with_env(root, explicit, None)
    }

    /// Load with an explicit environment map instead of the process environment.
    pub fn load_with_env(
        root: &Path,
        explicit: Option<&Path>,
        env: Option<HashMap<String, String>>,
    ) -> ConfigResult<Self> {
        let file = match explicit {
            Some(path) => File::from(path).format(FileFormat::Toml).required(true),
            None => File::from(root.join(CONFIG_FILE_NAME).as_path())
                .format(FileFormat::Toml)
                .required(false),
        };

        let environment = Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("__")
            .separator("__")
            .try_parsing(true)
            .source(env);

        let config: Self = Config::builder()
            .add_source(file)
            .add_source(environment)
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the pipeline cannot run with.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.discovery.sample_size == 0 {
            return Err(ConfigError::Invalid(
                "discovery.sample_size must be at least 1".to_string(),
            ));
        }
        if self.discovery.glob_pattern.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "discovery.glob_pattern must not be empty".to_string(),
            ));
        }
        if self.runner.program.trim().is_empty() {
            return Err(ConfigError::Invalid("runner.program must not be empty".to_string()));
        }
        if self.runner.test_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "runner.test_timeout_ms must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Sets the number of candidates to select.
    pub fn with_sample_size(mut self, sample_size: usize) -> Self {
        self.discovery.sample_size = sample_size;
        self
    }

    /// Sets the component glob.
    pub fn with_glob_pattern(mut self, glob_pattern: impl Into<String>) -> Self {
        self.discovery.glob_pattern = glob_pattern.into();
        self
    }

    /// Replaces the runner configuration.
    pub fn with_runner(mut self, runner: RunnerConfig) -> Self {
        self.runner = runner;
        self
    }

    /// Enables or disables telemetry.
    pub fn with_telemetry_enabled(mut self, enabled: bool) -> Self {
        self.telemetry.enabled = enabled;
        self
    }

    /// Sets the fallback log level.
    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }
}
