// SPDX-License-Identifier: MIT
//! # sr-scale: Geometry and CPU Resampling for Multi-Backend Super-Resolution
//!
//! This crate holds the parts of the upscaler that are pure arithmetic or pure pixel
//! shuffling: no async, no I/O, no knowledge of which backend produced a buffer.
//!
//! ## Key Components
//!
//! - [`presets`]: sizes, quality modes, scale clamping and exact target computation
//! - [`grid`]: overlapping tile grids and seam-trim insets
//! - [`cpu`]: SIMD RGBA8 resampling, edge extension and cropping on fast_image_resize
//!
//! ## Usage Example
//!
//! ```rust
//! use sr_scale::grid::TileGrid;
//! use sr_scale::presets::{target_size, Size};
//!
//! let input = Size { w: 1000, h: 600 };
//! assert_eq!(target_size(input, 2.5), Size { w: 2500, h: 1500 });
//!
//! let grid = TileGrid::new(input, Size { w: 512, h: 512 }, 16);
//! assert_eq!(grid.xs, vec![0, 488]);
//! assert_eq!(*grid.ys.last().unwrap(), 600 - 512);
//! ```

pub mod cpu;
pub mod grid;
pub mod presets;
