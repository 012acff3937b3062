//! Normal map generation.
//!
//! This module turns a [`Heightmap`](crate::heightmap::Heightmap) into a
//! tangent-space [`NormalMap`]: each output pixel is a unit vector encoded as
//! an RGB triple, where +Z points straight out of the image plane.
//!
//! # Encoding
//!
//! ```text
//! axis ∈ [-1, 1]  ──►  byte = ⌊clamp(axis·0.5 + 0.5, 0, 1) · 255⌋
//!
//!   R = X (right)   G = Y (down)   B = Z (out of surface)
//! ```
//!
//! A flat surface therefore encodes as `(127, 127, 255)`.

mod generator;

pub use generator::{generate_normal_map, NormalMapGenerator, FLAT_NORMAL};

/// Bytes per normal-map pixel (R, G, B).
pub const CHANNELS: usize = 3;

/// A 3-channel, row-major normal map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalMap {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl NormalMap {
    /// Wraps a generated buffer. The caller guarantees
    /// `data.len() == width × height × 3`.
    pub(crate) fn from_parts(width: u32, height: u32, data: Vec<u8>) -> Self {
        debug_assert_eq!(data.len(), width as usize * height as usize * CHANNELS);
        Self {
            width,
            height,
            data,
        }
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

    /// Bytes per row (`width × 3`).
    pub fn stride(&self) -> usize {
        self.width as usize * CHANNELS
    }

    /// Raw RGB bytes in row-major order.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// The encoded RGB triple at `(x, y)`, or `None` outside the map.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 3]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = y as usize * self.stride() + x as usize * CHANNELS;
        Some([self.data[idx], self.data[idx + 1], self.data[idx + 2]])
    }

    /// Consumes the map, returning its RGB buffer.
    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }
}
