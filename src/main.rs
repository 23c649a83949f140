//! ghost-stories CLI entrypoint.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;

use ghost_stories::analysis::{complexity_score, count_lines, is_simple, ComponentAnalyzer, LexicalAnalyzer};
use ghost_stories::categorize::categorize_error;
use ghost_stories::config::{ConfigError, GhostStoriesConfig};
use ghost_stories::discovery::CandidateDiscovery;
use ghost_stories::logging;
use ghost_stories::pipeline::{GhostStoriesRun, PipelineError};
use ghost_stories::telemetry::{CacheError, EventCache};

#[derive(Debug, Parser)]
#[command(name = "ghost-stories")]
#[command(about = "Find sample components, test-render them and diagnose the failures")]
#[command(version)]
struct Cli {
    /// Project root.
    #[arg(long, global = true, default_value = ".")]
    root: PathBuf,

    /// Config file. Defaults to ghost-stories.toml in the project root, if present.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log level used when RUST_LOG is unset. Overrides the configured level.
    #[arg(long, global = true)]
    log: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run discovery, the sample test run and telemetry once per project
    Run {
        /// Run even if a previous run is recorded.
        #[arg(long)]
        force: bool,

        /// Do not send telemetry.
        #[arg(long)]
        no_telemetry: bool,
    },

    /// Select component candidates without running tests
    Discover {
        /// Number of candidates to select.
        #[arg(long)]
        sample_size: Option<usize>,

        /// Glob for component files.
        #[arg(long)]
        glob: Option<String>,
    },

    /// Score the complexity of one file
    Score {
        /// File to score.
        file: PathBuf,
    },

    /// Categorize an error message
    Categorize {
        /// Error message.
        #[arg(long)]
        message: String,

        /// Stack trace.
        #[arg(long)]
        stack: Option<String>,
    },

    /// Show the recorded lifecycle events
    Events,
}

#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error("cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ScoreReport {
    path: PathBuf,
    complexity: f64,
    simple: bool,
    runtime_lines: usize,
    import_lines: usize,
    has_jsx: bool,
    has_export: bool,
    candidate: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match GhostStoriesConfig::load(&cli.root, cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            logging::init(cli.log.as_deref().unwrap_or("warn"));
            eprintln!("error: {e}");
            return ExitCode::FAILURE;
        }
    };
    logging::init(cli.log.as_deref().unwrap_or(&config.log_level));

    match run_command(&cli, config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run_command(cli: &Cli, config: GhostStoriesConfig) -> Result<(), CliError> {
    match &cli.command {
        Command::Run {
            force,
            no_telemetry,
        } => {
            let config = if *no_telemetry {
                config.with_telemetry_enabled(false)
            } else {
                config
            };
            let run = GhostStoriesRun::from_config(&cli.root, &config)?;
            let outcome = run.execute(*force).await;
            print_json(&outcome)
        }

        Command::Discover { sample_size, glob } => {
            let mut config = config;
            if let Some(sample_size) = sample_size {
                config = config.with_sample_size(*sample_size);
            }
            if let Some(glob) = glob {
                config = config.with_glob_pattern(glob.clone());
            }
            config.validate()?;

            let discovery = CandidateDiscovery::new(&cli.root)
                .with_exclusions(config.discovery.exclusions()?);
            let result = discovery.discover(&config.discovery.options()).await;
            print_json(&result)
        }

        Command::Score { file } => print_json(&score(file).await?),

        Command::Categorize { message, stack } => {
            print_json(&categorize_error(message, stack.as_deref()))
        }

        Command::Events => {
            let store = config.telemetry.cache_store(&cli.root);
            let cache = EventCache::new(Arc::new(store));
            let events = cache.get_all().await?;
            let preceding_upgrade = cache.preceding_upgrade().await?;
            print_json(&json!({
                "events": events,
                "precedingUpgrade": preceding_upgrade,
            }))
        }
    }
}

async fn score(file: &Path) -> Result<ScoreReport, CliError> {
    let source = tokio::fs::read_to_string(file)
        .await
        .map_err(|source| CliError::Read {
            path: file.to_path_buf(),
            source,
        })?;

    let counts = count_lines(&source);
    let complexity = complexity_score(&source);
    let facts = LexicalAnalyzer.analyze(file, &source);

    Ok(ScoreReport {
        path: file.to_path_buf(),
        complexity,
        simple: is_simple(complexity),
        runtime_lines: counts.runtime_lines,
        import_lines: counts.import_lines,
        has_jsx: facts.has_jsx,
        has_export: facts.has_export,
        candidate: facts.is_candidate(),
    })
}

fn print_json<T: Serialize>(value: &T) -> Result<(), CliError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
