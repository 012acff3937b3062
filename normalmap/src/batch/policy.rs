//! Policy types for batch execution control.
//!
//! - [`ErrorPolicy`]: what a batch does after a file fails
//! - [`AveragingMode`]: how merge mode averages its inputs
//!
//! # Example
//!
//! ```
//! use normalmap::batch::{AveragingMode, ErrorPolicy};
//!
//! // Attempt every file and report the aggregate.
//! let policy: ErrorPolicy = "continue".parse().unwrap();
//! assert!(policy.continues_after_failure());
//!
//! assert_eq!(AveragingMode::default(), AveragingMode::Exact);
//! ```

use std::fmt;
use std::str::FromStr;

// =============================================================================
// Error Policy
// =============================================================================

/// How a batch handles per-file failures.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ErrorPolicy {
    /// Stop on the first failure.
    ///
    /// Files that have not started are reported as skipped and the run is
    /// marked aborted. Outputs already written stay on disk.
    #[default]
    FailFast,

    /// Attempt every file regardless of earlier failures.
    ContinueOnError,
}

impl ErrorPolicy {
    /// Returns true if remaining files are still attempted after a failure.
    pub fn continues_after_failure(&self) -> bool {
        matches!(self, ErrorPolicy::ContinueOnError)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorPolicy::FailFast => "fail_fast",
            ErrorPolicy::ContinueOnError => "continue",
        }
    }
}

impl fmt::Display for ErrorPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ErrorPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fail_fast" | "fail-fast" | "failfast" => Ok(ErrorPolicy::FailFast),
            "continue" | "continue_on_error" | "continue-on-error" => {
                Ok(ErrorPolicy::ContinueOnError)
            }
            other => Err(format!(
                "unknown error policy '{}' (expected fail_fast or continue)",
                other
            )),
        }
    }
}

// =============================================================================
// Averaging Mode
// =============================================================================

/// How merge mode combines input samples.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum AveragingMode {
    /// Sum at full precision and divide once, rounding to nearest.
    #[default]
    Exact,

    /// Truncate `sample / count` per input before summing.
    ///
    /// Reproduces output of older releases bit-for-bit at the cost of
    /// compounding rounding error across inputs.
    LegacyTruncated,
}

impl AveragingMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            AveragingMode::Exact => "exact",
            AveragingMode::LegacyTruncated => "legacy",
        }
    }
}

impl fmt::Display for AveragingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AveragingMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "exact" => Ok(AveragingMode::Exact),
            "legacy" | "legacy_truncated" | "truncated" => Ok(AveragingMode::LegacyTruncated),
            other => Err(format!(
                "unknown averaging mode '{}' (expected exact or legacy)",
                other
            )),
        }
    }
}
