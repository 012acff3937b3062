//! Error types for image codec operations.

use std::path::PathBuf;

use thiserror::Error;

use crate::heightmap::HeightmapError;

/// Errors that can occur while decoding or encoding images.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The input file does not exist.
    #[error("File not found: {}", path.display())]
    NotFound { path: PathBuf },

    /// The input exists but could not be read as an image.
    #[error("Failed to decode {}: {reason}", path.display())]
    Decode { path: PathBuf, reason: String },

    /// The output could not be written.
    #[error("Failed to encode {}: {reason}", path.display())]
    Encode { path: PathBuf, reason: String },

    /// Decoded pixels did not form a valid heightmap.
    #[error("Invalid image {}", path.display())]
    InvalidImage {
        path: PathBuf,
        #[source]
        source: HeightmapError,
    },
}

impl CodecError {
    /// Returns the path the error refers to.
    pub fn path(&self) -> &std::path::Path {
        match self {
            CodecError::NotFound { path }
            | CodecError::Decode { path, .. }
            | CodecError::Encode { path, .. }
            | CodecError::InvalidImage { path, .. } => path,
        }
    }

    /// Returns true if the error means the input file is missing.
    pub fn is_not_found(&self) -> bool {
        matches!(self, CodecError::NotFound { .. })
    }
}
