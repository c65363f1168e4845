//! Log output for the chunkstore binary
//!
//! Two sinks: stderr at the level picked on the command line, and a
//! `chunkstore-last-run.log` file that records every event of the most recent
//! run.

use std::fs::{File, create_dir_all};
use std::path::{Path, PathBuf};

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, fmt};

const LOG_FILE_NAME: &str = "chunkstore-last-run.log";
const DEFAULT_LOGS_DIR: &str = "logs";

type SetupError = Box<dyn std::error::Error + Send + Sync>;

/// Installs the global subscriber and returns the path of the run log.
///
/// `RUST_LOG` takes precedence over `console_level` for stderr. The run log
/// lives in `logs_dir` (default `./logs`) and is truncated on every call.
///
/// # Errors
///
/// - `SetupError` - If the run log cannot be created or a global subscriber
///   is already installed
pub fn init_tracing(console_level: Level, logs_dir: Option<&Path>) -> Result<PathBuf, SetupError> {
    let logs_dir = logs_dir.unwrap_or_else(|| Path::new(DEFAULT_LOGS_DIR));
    create_dir_all(logs_dir)?;
    let run_log = logs_dir.join(LOG_FILE_NAME);
    let run_log_file = File::create(&run_log)?;

    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_filter(console_filter(console_level));
    let run_log_layer = fmt::layer()
        .with_ansi(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .with_writer(run_log_file)
        .with_filter(EnvFilter::new("trace"));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(run_log_layer)
        .try_init()?;

    tracing::debug!("Logging to stderr at {} and to {}", console_level, run_log.display());
    Ok(run_log)
}

fn console_filter(level: Level) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()))
}

/// Verbosity accepted by `--log-level`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum CliLogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl CliLogLevel {
    const ALL: [CliLogLevel; 5] = [
        CliLogLevel::Error,
        CliLogLevel::Warn,
        CliLogLevel::Info,
        CliLogLevel::Debug,
        CliLogLevel::Trace,
    ];

    /// ```
    /// use chunkstore_core::tracing_setup::CliLogLevel;
    ///
    /// assert_eq!(CliLogLevel::Debug.as_tracing_level(), tracing::Level::DEBUG);
    /// ```
    pub fn as_tracing_level(self) -> Level {
        match self {
            CliLogLevel::Error => Level::ERROR,
            CliLogLevel::Warn => Level::WARN,
            CliLogLevel::Info => Level::INFO,
            CliLogLevel::Debug => Level::DEBUG,
            CliLogLevel::Trace => Level::TRACE,
        }
    }

    fn name(self) -> &'static str {
        match self {
            CliLogLevel::Error => "error",
            CliLogLevel::Warn => "warn",
            CliLogLevel::Info => "info",
            CliLogLevel::Debug => "debug",
            CliLogLevel::Trace => "trace",
        }
    }
}

impl std::str::FromStr for CliLogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|level| level.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown log level `{s}`"))
    }
}

impl std::fmt::Display for CliLogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
