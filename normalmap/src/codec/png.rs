//! `image`-crate codec implementation.
//!
//! Reads any raster format the `image` crate supports (format is sniffed
//! from file contents, falling back to the extension) and always writes PNG.

use std::io;
use std::path::Path;

use image::{ExtendedColorType, ImageFormat, ImageReader};
use tracing::trace;

use super::{CodecError, ImageCodec};
use crate::heightmap::Heightmap;
use crate::normal::NormalMap;

/// Codec backed by the `image` crate, writing PNG output.
///
/// # Example
///
/// ```
/// use normalmap::codec::{ImageCodec, PngCodec};
///
/// let codec = PngCodec::new();
/// assert_eq!(codec.name(), "PNG");
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct PngCodec;

impl PngCodec {
    pub fn new() -> Self {
        Self
    }

    fn open(path: &Path) -> Result<ImageReader<io::BufReader<std::fs::File>>, CodecError> {
        let reader = ImageReader::open(path).map_err(|e| io_error(path, e))?;
        reader.with_guessed_format().map_err(|e| io_error(path, e))
    }
}

/// Maps an I/O failure on an input file to a codec error.
fn io_error(path: &Path, err: io::Error) -> CodecError {
    if err.kind() == io::ErrorKind::NotFound {
        CodecError::NotFound {
            path: path.to_path_buf(),
        }
    } else {
        CodecError::Decode {
            path: path.to_path_buf(),
            reason: err.to_string(),
        }
    }
}

/// Maps an `image` decode failure to a codec error.
fn decode_error(path: &Path, err: image::ImageError) -> CodecError {
    match err {
        image::ImageError::IoError(e) => io_error(path, e),
        other => CodecError::Decode {
            path: path.to_path_buf(),
            reason: other.to_string(),
        },
    }
}

impl ImageCodec for PngCodec {
    fn decode(&self, path: &Path) -> Result<Heightmap, CodecError> {
        let image = Self::open(path)?
            .decode()
            .map_err(|e| decode_error(path, e))?;
        trace!(
            path = %path.display(),
            width = image.width(),
            height = image.height(),
            color = ?image.color(),
            "Decoded heightmap"
        );

        Heightmap::try_from(image.into_luma8()).map_err(|source| {
            CodecError::InvalidImage {
                path: path.to_path_buf(),
                source,
            }
        })
    }

    fn probe(&self, path: &Path) -> Result<(u32, u32), CodecError> {
        Self::open(path)?
            .into_dimensions()
            .map_err(|e| decode_error(path, e))
    }

    fn encode(&self, path: &Path, normals: &NormalMap) -> Result<(), CodecError> {
        image::save_buffer_with_format(
            path,
            normals.as_bytes(),
            normals.width(),
            normals.height(),
            ExtendedColorType::Rgb8,
            ImageFormat::Png,
        )
        .map_err(|e| CodecError::Encode {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    fn name(&self) -> &str {
        "PNG"
    }
}
