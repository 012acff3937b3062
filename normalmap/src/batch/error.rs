//! Error types for batch execution.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::codec::CodecError;
use crate::pool::PoolError;

/// A single input that could not be turned into a normal map.
#[derive(Debug, Error)]
pub enum FileError {
    /// The input could not be decoded.
    #[error("Failed to process {}", input.display())]
    Decode {
        input: PathBuf,
        #[source]
        source: CodecError,
    },

    /// The output could not be written.
    #[error("Failed to write normal map for {}", input.display())]
    Encode {
        input: PathBuf,
        #[source]
        source: CodecError,
    },

    /// The worker panicked before reporting a result.
    #[error("Processing {} panicked", input.display())]
    Panicked { input: PathBuf },
}

impl FileError {
    /// Returns the input path the failure belongs to.
    pub fn input(&self) -> &std::path::Path {
        match self {
            FileError::Decode { input, .. }
            | FileError::Encode { input, .. }
            | FileError::Panicked { input } => input,
        }
    }
}

/// Errors that stop a batch before or outside per-file processing.
#[derive(Debug, Error)]
pub enum BatchError {
    /// No input files were given.
    #[error("No input files given")]
    NoInputs,

    /// An input file name has no extension to replace.
    #[error("File extension doesn't exist: {}", path.display())]
    NoExtension { path: PathBuf },

    /// The configuration cannot be run.
    #[error("Invalid batch configuration: {0}")]
    InvalidConfig(String),

    /// The output directory could not be created.
    #[error("Failed to create output directory {}", path.display())]
    CreateOutputDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The worker pool could not be started.
    #[error("Failed to start worker pool")]
    Pool(#[from] PoolError),

    /// Merge inputs do not all share the same dimensions.
    #[error(
        "Dimension mismatch in {}: expected {}×{}, found {}×{}",
        path.display(),
        expected.0,
        expected.1,
        actual.0,
        actual.1
    )]
    DimensionMismatch {
        path: PathBuf,
        expected: (u32, u32),
        actual: (u32, u32),
    },

    /// A merge input failed; merge mode cannot produce partial output.
    #[error("Merge input {} failed", .0.input().display())]
    Input(#[source] FileError),

    /// The merged output could not be written.
    #[error("Failed to write merged output {}", .0.path().display())]
    Output(#[source] CodecError),

    /// The run was cancelled before the merge completed.
    #[error("Merge cancelled")]
    Cancelled,
}
