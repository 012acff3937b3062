//! Heightmap → normal map transform.
//!
//! Gradients come from central differences over the four direct neighbours.
//! Neighbours outside the image are clamped to the nearest edge sample
//! (replicate boundary), so edge pixels see a damped gradient.

use super::{NormalMap, CHANNELS};
use crate::heightmap::Heightmap;

/// Encoded value of the unperturbed normal `(0, 0, 1)`.
pub const FLAT_NORMAL: [u8; 3] = [127, 127, 255];

/// Generates normal maps with a fixed gradient scale.
///
/// # Example
///
/// ```
/// use normalmap::heightmap::Heightmap;
/// use normalmap::normal::{NormalMapGenerator, FLAT_NORMAL};
///
/// let flat = Heightmap::filled(4, 4, 200).unwrap();
/// let normals = NormalMapGenerator::new(20.0).generate(&flat);
///
/// assert_eq!(normals.pixel(1, 1), Some(FLAT_NORMAL));
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormalMapGenerator {
    scale: f32,
}

impl NormalMapGenerator {
    /// Creates a generator. Larger `scale` values exaggerate slopes; `0`
    /// produces a flat map.
    pub fn new(scale: f32) -> Self {
        Self { scale }
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }

    /// Generates the normal map for `heightmap`. Output dimensions always
    /// match the input.
    pub fn generate(&self, heightmap: &Heightmap) -> NormalMap {
        let (width, height) = heightmap.dimensions();
        let data = generate_normal_map(heightmap.samples(), width, height, self.scale);
        NormalMap::from_parts(width, height, data)
    }
}

/// Normalized intensity at `(x, y)` with coordinates clamped into the image.
#[inline]
fn sample(samples: &[u8], x: i64, y: i64, width: i64, height: i64) -> f32 {
    let x = x.clamp(0, width - 1);
    let y = y.clamp(0, height - 1);
    f32::from(samples[(y * width + x) as usize]) / 255.0
}

/// Quantizes one unit-vector axis to a byte, truncating toward zero.
#[inline]
fn encode_axis(axis: f32) -> u8 {
    ((f64::from(axis) * 0.5 + 0.5).clamp(0.0, 1.0) * 255.0) as u8
}

/// Converts row-major heightmap samples into a row-major RGB normal map.
///
/// `samples` must hold `width × height` bytes; the result holds
/// `width × height × 3` bytes with stride `width × 3`.
///
/// # Panics
///
/// Panics if `samples` is shorter than `width × height`. Use
/// [`NormalMapGenerator::generate`] with a validated [`Heightmap`] to rule
/// this out.
pub fn generate_normal_map(samples: &[u8], width: u32, height: u32, scale: f32) -> Vec<u8> {
    let w = i64::from(width);
    let h = i64::from(height);
    let mut data = vec![0u8; width as usize * height as usize * CHANNELS];

    for (idx, pixel) in data.chunks_exact_mut(CHANNELS).enumerate() {
        let x = idx as i64 % w;
        let y = idx as i64 / w;

        let left = sample(samples, x - 1, y, w, h);
        let right = sample(samples, x + 1, y, w, h);
        let up = sample(samples, x, y - 1, w, h);
        let down = sample(samples, x, y + 1, w, h);

        let dx = (right - left) * scale;
        let dy = (down - up) * scale;

        // nz is 1 before normalization, so the length is never zero
        let (nx, ny, nz) = (-dx, -dy, 1.0_f32);
        let inv_len = 1.0 / (nx * nx + ny * ny + nz * nz).sqrt();

        pixel[0] = encode_axis(nx * inv_len);
        pixel[1] = encode_axis(ny * inv_len);
        pixel[2] = encode_axis(nz * inv_len);
    }

    data
}
