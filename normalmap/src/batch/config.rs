//! Batch executor configuration.

use std::path::PathBuf;

use super::policy::{AveragingMode, ErrorPolicy};
use crate::pool::QueueOrder;

/// Default gradient scale.
pub const DEFAULT_SCALE: f32 = 20.0;

/// Suffix appended to each input stem in per-file modes.
pub const DEFAULT_OUTPUT_SUFFIX: &str = "_normals.png";

/// Which dispatch strategy a batch uses.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum DispatchMode {
    /// One file after another on the calling thread.
    #[default]
    Sequential,

    /// One task per file on a worker pool.
    Parallel {
        /// Number of worker threads (must be at least 1).
        workers: usize,
    },

    /// Average every input and write a single normal map.
    Merge {
        /// File name of the single output, relative to the output directory.
        output_name: String,
    },
}

impl DispatchMode {
    pub fn name(&self) -> &'static str {
        match self {
            DispatchMode::Sequential => "sequential",
            DispatchMode::Parallel { .. } => "parallel",
            DispatchMode::Merge { .. } => "merge",
        }
    }
}

/// Configuration for a [`BatchExecutor`](super::BatchExecutor) run.
///
/// # Example
///
/// ```
/// use normalmap::batch::{BatchConfig, DispatchMode, ErrorPolicy};
///
/// let config = BatchConfig::new("out")
///     .with_scale(8.0)
///     .with_mode(DispatchMode::Parallel { workers: 4 })
///     .with_error_policy(ErrorPolicy::ContinueOnError);
///
/// assert_eq!(config.scale, 8.0);
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct BatchConfig {
    /// Gradient scale passed to the generator.
    pub scale: f32,

    /// Directory outputs are written to (created if absent).
    pub output_dir: PathBuf,

    /// Suffix appended to each input stem in per-file modes.
    pub output_suffix: String,

    /// Dispatch strategy.
    pub mode: DispatchMode,

    /// What to do after a file fails.
    pub error_policy: ErrorPolicy,

    /// Task order for parallel mode.
    pub queue_order: QueueOrder,

    /// How merge mode averages its inputs.
    pub averaging: AveragingMode,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            scale: DEFAULT_SCALE,
            output_dir: PathBuf::from("."),
            output_suffix: DEFAULT_OUTPUT_SUFFIX.to_string(),
            mode: DispatchMode::default(),
            error_policy: ErrorPolicy::default(),
            queue_order: QueueOrder::default(),
            averaging: AveragingMode::default(),
        }
    }
}

impl BatchConfig {
    /// Creates a sequential configuration writing into `output_dir`.
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            ..Self::default()
        }
    }

    pub fn with_scale(mut self, scale: f32) -> Self {
        self.scale = scale;
        self
    }

    pub fn with_mode(mut self, mode: DispatchMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_error_policy(mut self, policy: ErrorPolicy) -> Self {
        self.error_policy = policy;
        self
    }

    pub fn with_queue_order(mut self, order: QueueOrder) -> Self {
        self.queue_order = order;
        self
    }

    pub fn with_averaging(mut self, averaging: AveragingMode) -> Self {
        self.averaging = averaging;
        self
    }

    pub fn with_output_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.output_suffix = suffix.into();
        self
    }

    /// Checks values that would make a run meaningless.
    pub(crate) fn validate(&self) -> Result<(), String> {
        if !self.scale.is_finite() {
            return Err(format!("scale must be finite, got {}", self.scale));
        }
        match &self.mode {
            DispatchMode::Parallel { workers: 0 } => {
                Err("parallel mode requires at least one worker".to_string())
            }
            DispatchMode::Merge { output_name } if output_name.trim().is_empty() => {
                Err("merge mode requires an output file name".to_string())
            }
            _ => Ok(()),
        }
    }
}
