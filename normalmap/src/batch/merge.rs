//! Heightmap averaging for merge mode.
//!
//! The accumulator is owned by the single thread running the merge, so it
//! carries no synchronization.

use crate::heightmap::Heightmap;

use super::policy::AveragingMode;

/// A heightmap whose dimensions differ from the accumulator's.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DimensionMismatch {
    pub expected: (u32, u32),
    pub actual: (u32, u32),
}

/// Running average of equally-sized heightmaps.
///
/// # Example
///
/// ```
/// use normalmap::batch::{AveragingMode, HeightAccumulator};
/// use normalmap::heightmap::Heightmap;
///
/// let mut acc = HeightAccumulator::new(2, 1, 2, AveragingMode::Exact);
/// acc.fold(&Heightmap::new(2, 1, vec![0, 100]).unwrap()).unwrap();
/// acc.fold(&Heightmap::new(2, 1, vec![255, 101]).unwrap()).unwrap();
///
/// assert_eq!(acc.finish().samples(), &[128, 101]);
/// ```
#[derive(Debug, Clone)]
pub struct HeightAccumulator {
    width: u32,
    height: u32,
    /// Number of inputs the average is taken over.
    count: u32,
    folded: u32,
    mode: AveragingMode,
    sums: Vec<u32>,
}

impl HeightAccumulator {
    /// Creates a zeroed accumulator for `count` inputs of `width × height`.
    ///
    /// A `count` of zero is treated as one.
    pub fn new(width: u32, height: u32, count: u32, mode: AveragingMode) -> Self {
        Self {
            width,
            height,
            count: count.max(1),
            folded: 0,
            mode,
            sums: vec![0; width as usize * height as usize],
        }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Number of heightmaps folded in so far.
    pub fn folded(&self) -> u32 {
        self.folded
    }

    /// Adds one heightmap's contribution.
    ///
    /// # Errors
    ///
    /// Returns [`DimensionMismatch`] (and leaves the accumulator untouched)
    /// if `heightmap` is not the accumulator's size.
    pub fn fold(&mut self, heightmap: &Heightmap) -> Result<(), DimensionMismatch> {
        if heightmap.dimensions() != self.dimensions() {
            return Err(DimensionMismatch {
                expected: self.dimensions(),
                actual: heightmap.dimensions(),
            });
        }

        match self.mode {
            AveragingMode::Exact => {
                for (sum, &sample) in self.sums.iter_mut().zip(heightmap.samples()) {
                    *sum += u32::from(sample);
                }
            }
            AveragingMode::LegacyTruncated => {
                for (sum, &sample) in self.sums.iter_mut().zip(heightmap.samples()) {
                    *sum += u32::from(sample) / self.count;
                }
            }
        }

        self.folded += 1;
        Ok(())
    }

    /// Produces the averaged heightmap.
    pub fn finish(self) -> Heightmap {
        let samples: Vec<u8> = match self.mode {
            AveragingMode::Exact => {
                let n = self.folded.max(1);
                self.sums
                    .iter()
                    .map(|&sum| ((sum + n / 2) / n).min(255) as u8)
                    .collect()
            }
            AveragingMode::LegacyTruncated => {
                self.sums.iter().map(|&sum| sum.min(255) as u8).collect()
            }
        };

        Heightmap::from_parts(self.width, self.height, samples)
    }
}
