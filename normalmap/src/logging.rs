//! Tracing subscriber setup.
//!
//! Logs go to stderr, and optionally to a file as well. `RUST_LOG` takes
//! precedence over the configured level when it is set.
//!
//! ```no_run
//! use normalmap::logging::{init_logging, LoggingConfig};
//!
//! let _guard = init_logging(&LoggingConfig::default()).unwrap();
//! tracing::info!("ready");
//! ```

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{Level, Subscriber};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Errors raised while installing the subscriber.
#[derive(Debug, Error)]
pub enum LoggingError {
    /// The log file path has no file name component.
    #[error("Invalid log file path: {}", path.display())]
    InvalidPath { path: PathBuf },

    /// The log file or its directory could not be created.
    #[error("Failed to open log file {}: {reason}", path.display())]
    File { path: PathBuf, reason: String },

    /// A global subscriber is already installed.
    #[error("Logging already initialized: {0}")]
    AlreadyInitialized(String),
}

/// Logging options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    /// Level used when `RUST_LOG` is unset.
    pub level: Level,

    /// Optional file that receives a copy of every log line.
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            file: None,
        }
    }
}

impl LoggingConfig {
    /// Picks the level for `-v` / `-q`, falling back to `default`.
    pub fn level_for(verbose: bool, quiet: bool, default: Level) -> Level {
        match (verbose, quiet) {
            (true, _) => Level::DEBUG,
            (false, true) => Level::WARN,
            (false, false) => default,
        }
    }
}

/// Keeps the file writer alive; buffered lines are flushed on drop.
#[must_use = "dropping the guard stops file logging"]
#[derive(Debug)]
pub struct LoggingGuard {
    _file: Option<WorkerGuard>,
}

/// Builds the level filter: `RUST_LOG` if set, else `level`.
fn build_filter(level: Level) -> EnvFilter {
    EnvFilter::builder()
        .with_default_directive(LevelFilter::from_level(level).into())
        .from_env_lossy()
}

fn file_appender(path: &Path) -> Result<RollingFileAppender, LoggingError> {
    let name = path
        .file_name()
        .ok_or_else(|| LoggingError::InvalidPath {
            path: path.to_path_buf(),
        })?
        .to_string_lossy()
        .into_owned();
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };

    std::fs::create_dir_all(dir).map_err(|e: io::Error| LoggingError::File {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(name)
        .build(dir)
        .map_err(|e| LoggingError::File {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
}

/// Installs the global tracing subscriber, logging to stderr.
///
/// Hold the returned guard for the life of the program.
///
/// # Errors
///
/// Fails if the log file cannot be opened or a subscriber is already set.
pub fn init_logging(config: &LoggingConfig) -> Result<LoggingGuard, LoggingError> {
    init_logging_with_writer(config, io::stderr)
}

/// Like [`init_logging`], but console output goes to `console` instead of
/// stderr. Used to keep log lines from tearing a progress bar.
pub fn init_logging_with_writer<W>(
    config: &LoggingConfig,
    console: W,
) -> Result<LoggingGuard, LoggingError>
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let (subscriber, guard) = build_subscriber(config, console)?;
    subscriber
        .try_init()
        .map_err(|e| LoggingError::AlreadyInitialized(e.to_string()))?;

    Ok(LoggingGuard { _file: guard })
}

fn build_subscriber<W>(
    config: &LoggingConfig,
    console: W,
) -> Result<(impl Subscriber + Send + Sync + 'static, Option<WorkerGuard>), LoggingError>
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let console_layer = fmt::layer().with_writer(console).with_target(false);

    let (file_layer, guard) = match &config.file {
        Some(path) => {
            let (writer, guard) = tracing_appender::non_blocking(file_appender(path)?);
            let layer = fmt::layer().with_writer(writer).with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    let subscriber = tracing_subscriber::registry()
        .with(build_filter(config.level))
        .with(console_layer)
        .with(file_layer);

    Ok((subscriber, guard))
}
