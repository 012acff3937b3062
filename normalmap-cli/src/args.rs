//! Command-line arguments and their resolution against the config file.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use normalmap::batch::{AveragingMode, BatchConfig, DispatchMode, ErrorPolicy};
use normalmap::config::ConfigFile;
use normalmap::logging::LoggingConfig;
use normalmap::pool::QueueOrder;
use tracing::Level;

use crate::error::CliError;

/// Convert grayscale heightmaps into tangent-space normal maps.
///
/// Each input is written to <OUTPUT_DIR>/<stem>_normals.png. With --merge,
/// all inputs are averaged into one heightmap and a single normal map is
/// written instead.
#[derive(Debug, Parser)]
#[command(name = "normalmap", version, about)]
pub struct Cli {
    /// Heightmap images to convert
    #[arg(required = true, value_name = "FILE")]
    pub inputs: Vec<PathBuf>,

    /// Gradient scale; larger values give steeper normals [default: 20]
    #[arg(short, long, allow_negative_numbers = true)]
    pub scale: Option<f32>,

    /// Directory for output files (created if absent) [default: .]
    #[arg(short = 'd', long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Number of worker threads
    #[arg(short, long, value_name = "N", value_parser = parse_jobs)]
    pub jobs: Option<usize>,

    /// Use one worker thread per hardware thread
    #[arg(short = 't', long)]
    pub all_threads: bool,

    /// Average all inputs and write a single normal map named NAME
    #[arg(short = 'J', long, value_name = "NAME")]
    pub merge: Option<String>,

    /// Keep converting after a file fails
    #[arg(short, long)]
    pub keep_going: bool,

    /// Order in which queued files are picked up by workers
    #[arg(long, value_enum, value_name = "ORDER")]
    pub queue_order: Option<QueueOrderArg>,

    /// Truncate each input before summing when merging
    #[arg(long)]
    pub legacy_average: bool,

    /// Config file to read instead of the default location
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Log debug output
    #[arg(short, long, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Only log warnings and errors
    #[arg(short, long)]
    pub quiet: bool,

    /// Also write logs to this file
    #[arg(long, value_name = "PATH")]
    pub log_file: Option<PathBuf>,
}

/// Queue order selection for CLI arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum QueueOrderArg {
    /// First queued, first processed
    Fifo,
    /// Most recently queued first
    Lifo,
}

impl From<QueueOrderArg> for QueueOrder {
    fn from(arg: QueueOrderArg) -> Self {
        match arg {
            QueueOrderArg::Fifo => QueueOrder::Fifo,
            QueueOrderArg::Lifo => QueueOrder::Lifo,
        }
    }
}

fn parse_jobs(value: &str) -> Result<usize, String> {
    match value.parse::<usize>() {
        Ok(0) => Err("must be at least 1".to_string()),
        Ok(n) => Ok(n),
        Err(e) => Err(e.to_string()),
    }
}

impl Cli {
    /// Builds the batch configuration: flags over config file over defaults.
    ///
    /// `--merge` wins over `--jobs` and `--all-threads`; `--all-threads`
    /// wins over `--jobs`.
    pub fn batch_config(
        &self,
        file: &ConfigFile,
        hardware_threads: usize,
    ) -> Result<BatchConfig, CliError> {
        let mut config = file.apply_to(BatchConfig::default());

        if let Some(scale) = self.scale {
            if !scale.is_finite() {
                return Err(CliError::Usage(format!("Invalid scale: {}", scale)));
            }
            config.scale = scale;
        }
        if let Some(dir) = &self.output_dir {
            config.output_dir = dir.clone();
        }
        if self.keep_going {
            config.error_policy = ErrorPolicy::ContinueOnError;
        }
        if let Some(order) = self.queue_order {
            config.queue_order = order.into();
        }
        if self.legacy_average {
            config.averaging = AveragingMode::LegacyTruncated;
        }

        if let Some(name) = &self.merge {
            if name.is_empty() {
                return Err(CliError::Usage("Merge output name is empty".to_string()));
            }
            config.mode = DispatchMode::Merge {
                output_name: name.clone(),
            };
        } else if self.all_threads {
            config.mode = DispatchMode::Parallel {
                workers: hardware_threads.max(1),
            };
        } else if let Some(workers) = self.jobs {
            config.mode = DispatchMode::Parallel { workers };
        }

        Ok(config)
    }

    /// Builds the logging configuration from flags and the config file.
    pub fn logging_config(&self, file: &ConfigFile) -> LoggingConfig {
        let default = file.logging.level.unwrap_or(Level::INFO);
        LoggingConfig {
            level: LoggingConfig::level_for(self.verbose, self.quiet, default),
            file: self.log_file.clone().or_else(|| file.logging.file.clone()),
        }
    }
}
