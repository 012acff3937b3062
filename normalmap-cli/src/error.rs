//! CLI error type.

use std::error::Error;
use std::fmt;

use normalmap::batch::BatchError;
use normalmap::config::ConfigError;
use normalmap::logging::LoggingError;

/// Everything that can make the CLI exit non-zero.
#[derive(Debug)]
pub enum CliError {
    /// Bad flag value or flag combination.
    Usage(String),
    /// Config file missing or invalid.
    Config(ConfigError),
    /// Logging could not be set up.
    Logging(LoggingError),
    /// The Ctrl-C handler could not be installed.
    Signal(String),
    /// The batch could not run.
    Batch(BatchError),
    /// The batch ran but not every input was converted.
    Incomplete { failed: usize, skipped: usize },
}

impl CliError {
    /// Process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        1
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::Usage(msg) => write!(f, "{}", msg),
            CliError::Config(e) => write!(f, "{}", e),
            CliError::Logging(e) => write!(f, "{}", e),
            CliError::Signal(msg) => write!(f, "Failed to set signal handler: {}", msg),
            CliError::Batch(e) => write!(f, "{}", e),
            CliError::Incomplete { failed, skipped } => write!(
                f,
                "{} file(s) failed, {} file(s) skipped",
                failed, skipped
            ),
        }
    }
}

// Wrapped library errors are transparent: `Display` already prints them, so
// the chain continues with their own sources.
impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::Config(e) => e.source(),
            CliError::Logging(e) => e.source(),
            CliError::Batch(e) => e.source(),
            CliError::Usage(_) | CliError::Signal(_) | CliError::Incomplete { .. } => None,
        }
    }
}

/// Formats an error and every cause behind it as `outer: inner: ...`.
pub fn error_chain(err: &dyn Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        CliError::Config(e)
    }
}

impl From<LoggingError> for CliError {
    fn from(e: LoggingError) -> Self {
        CliError::Logging(e)
    }
}

impl From<BatchError> for CliError {
    fn from(e: BatchError) -> Self {
        CliError::Batch(e)
    }
}
