//! normalmap - Tangent-space normal maps from grayscale heightmaps
//!
//! This library provides the core functionality behind the `normalmap` CLI:
//!
//! - [`heightmap`]: validated single-channel sample buffers
//! - [`normal`]: the gradient-to-normal transform
//! - [`codec`]: the image codec seam (PNG output via the `image` crate)
//! - [`pool`]: a fixed-size worker thread pool with an explicit queue order
//! - [`batch`]: sequential, parallel and merge dispatch over many inputs
//! - [`config`] and [`logging`]: the ambient configuration and tracing setup
//!
//! # Example
//!
//! ```
//! use normalmap::heightmap::Heightmap;
//! use normalmap::normal::NormalMapGenerator;
//!
//! let heightmap = Heightmap::new(2, 2, vec![0, 255, 255, 0]).unwrap();
//! let normals = NormalMapGenerator::new(1.0).generate(&heightmap);
//!
//! assert_eq!(normals.width(), 2);
//! assert_eq!(normals.as_bytes().len(), 2 * 2 * 3);
//! ```

pub mod batch;
pub mod codec;
pub mod config;
pub mod heightmap;
pub mod logging;
pub mod normal;
pub mod pool;
