//! Single-channel heightmap buffers.
//!
//! A [`Heightmap`] is the decoded form of an input image: `width × height`
//! unsigned 8-bit elevation samples in row-major order. Construction checks
//! that the buffer matches the declared dimensions so downstream code can
//! index without bounds surprises.

use thiserror::Error;

/// Errors raised when building a heightmap from raw parts.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HeightmapError {
    /// Width or height is zero.
    #[error("Invalid dimensions {width}×{height}: both must be non-zero")]
    EmptyDimensions { width: u32, height: u32 },

    /// Buffer length does not equal `width × height`.
    #[error("Sample buffer holds {actual} bytes, expected {expected} for {width}×{height}")]
    BufferSize {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },
}

/// A grayscale heightmap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Heightmap {
    width: u32,
    height: u32,
    samples: Vec<u8>,
}

impl Heightmap {
    /// Creates a heightmap from row-major samples.
    ///
    /// # Errors
    ///
    /// Returns [`HeightmapError`] if either dimension is zero or the buffer
    /// length is not `width × height`.
    pub fn new(width: u32, height: u32, samples: Vec<u8>) -> Result<Self, HeightmapError> {
        if width == 0 || height == 0 {
            return Err(HeightmapError::EmptyDimensions { width, height });
        }

        let expected = width as usize * height as usize;
        if samples.len() != expected {
            return Err(HeightmapError::BufferSize {
                width,
                height,
                expected,
                actual: samples.len(),
            });
        }

        Ok(Self {
            width,
            height,
            samples,
        })
    }

    /// Wraps a buffer already known to match `width × height`.
    pub(crate) fn from_parts(width: u32, height: u32, samples: Vec<u8>) -> Self {
        debug_assert_eq!(samples.len(), width as usize * height as usize);
        Self {
            width,
            height,
            samples,
        }
    }

    /// Creates a heightmap where every sample has the same value.
    pub fn filled(width: u32, height: u32, value: u8) -> Result<Self, HeightmapError> {
        Self::new(width, height, vec![value; width as usize * height as usize])
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Returns `(width, height)`.
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Row-major samples, `width × height` bytes.
    pub fn samples(&self) -> &[u8] {
        &self.samples
    }

    /// Sample at `(x, y)`, or `None` outside the map.
    pub fn get(&self, x: u32, y: u32) -> Option<u8> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.samples
            .get(y as usize * self.width as usize + x as usize)
            .copied()
    }

    /// Consumes the heightmap, returning its sample buffer.
    pub fn into_samples(self) -> Vec<u8> {
        self.samples
    }
}

impl TryFrom<image::GrayImage> for Heightmap {
    type Error = HeightmapError;

    fn try_from(image: image::GrayImage) -> Result<Self, Self::Error> {
        let (width, height) = image.dimensions();
        Self::new(width, height, image.into_raw())
    }
}
