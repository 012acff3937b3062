//! Image codec abstraction for normalmap.
//!
//! The batch executor never touches pixel formats directly. It goes through
//! the [`ImageCodec`] trait, which decodes an input file into a
//! [`Heightmap`], probes dimensions without decoding, and encodes a
//! [`NormalMap`] back to disk.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────┐
//! │    BatchExecutor    │
//! │                     │
//! │  Arc<dyn ImageCodec>│
//! └──────────┬──────────┘
//!            │
//!            ▼
//! ┌─────────────────────┐
//! │     ImageCodec      │ (trait)
//! └──────────┬──────────┘
//!            │
//!       ┌────┴────┐
//!       ▼         ▼
//! ┌──────────┐ ┌──────────┐
//! │ PngCodec │ │  Test    │
//! │ (image)  │ │  codecs  │
//! └──────────┘ └──────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use normalmap::codec::{ImageCodec, PngCodec};
//! use normalmap::normal::NormalMapGenerator;
//! use std::path::Path;
//!
//! let codec = PngCodec::new();
//! let heightmap = codec.decode(Path::new("rock.png")).unwrap();
//! let normals = NormalMapGenerator::new(20.0).generate(&heightmap);
//! codec.encode(Path::new("rock_normals.png"), &normals).unwrap();
//! ```

mod error;
mod png;

pub use error::CodecError;
pub use png::PngCodec;

use std::path::Path;

use crate::heightmap::Heightmap;
use crate::normal::NormalMap;

/// Decodes heightmaps and encodes normal maps.
///
/// Implementations must be thread-safe (`Send + Sync`): the parallel batch
/// strategy shares one codec across all worker threads.
pub trait ImageCodec: Send + Sync {
    /// Decodes `path` into a single-channel heightmap.
    ///
    /// Color inputs are reduced to 8-bit luma.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::NotFound`] if the file does not exist and
    /// [`CodecError::Decode`] if it cannot be read as an image.
    fn decode(&self, path: &Path) -> Result<Heightmap, CodecError>;

    /// Reads the dimensions of `path` without decoding pixel data.
    fn probe(&self, path: &Path) -> Result<(u32, u32), CodecError>;

    /// Writes `normals` to `path` as a 3-channel image.
    fn encode(&self, path: &Path, normals: &NormalMap) -> Result<(), CodecError>;

    /// Returns a human-readable name for logging.
    fn name(&self) -> &str;
}
