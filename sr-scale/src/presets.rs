// SPDX-License-Identifier: MIT
//! # Scale Presets and Target Computation
//!
//! This module holds the small value types every stage of the upscaler agrees on:
//! pixel sizes, the output quality mode, resampling filters, and the arithmetic
//! that turns a requested magnification into an exact output size.
//!
//! ## Design Philosophy
//!
//! Backends report integer output sizes, so every stage of a multi-backend chain
//! introduces rounding. The functions here keep that bookkeeping in one place:
//!
//! 1. **Clamp** the requested factor into the supported `[1.0, 6.0]` range
//! 2. **Target** the final size as `round(w·s) × round(h·s)`, never below 1px
//! 3. **Measure** what a stage actually did as an output/input ratio per axis
//!
//! All computations use `f64` and round once at the end.

/// Smallest magnification the pipeline accepts.
pub const MIN_SCALE: f64 = 1.0;

/// Largest magnification the pipeline accepts.
pub const MAX_SCALE: f64 = 6.0;

/// Represents a 2D size with width and height in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Size {
    pub w: u32,
    pub h: u32,
}

impl Size {
    pub const fn new(w: u32, h: u32) -> Self {
        Self { w, h }
    }

    /// True when both sides are at least one pixel.
    pub fn is_valid(self) -> bool {
        self.w > 0 && self.h > 0
    }

    /// Scale each side independently and round, clamping to at least 1px.
    pub fn scaled(self, scale_x: f64, scale_y: f64) -> Size {
        Size {
            w: ((self.w as f64 * scale_x).round() as u32).max(1),
            h: ((self.h as f64 * scale_y).round() as u32).max(1),
        }
    }

    /// Component-wise maximum.
    pub fn max(self, other: Size) -> Size {
        Size {
            w: self.w.max(other.w),
            h: self.h.max(other.h),
        }
    }

    /// Number of pixels covered.
    pub fn area(self) -> u64 {
        self.w as u64 * self.h as u64
    }
}

impl std::fmt::Display for Size {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.w, self.h)
    }
}

/// Output quality mode requested by the caller.
///
/// The mode controls two things: whether a restoration backend runs before the
/// upscaler, and how many test-time augmentations each neural pass uses.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum QualityMode {
    /// Upscaler only, single pass per stage.
    #[clap(name = "fast")]
    Fast,
    /// Restoration + upscaler, two augmentations.
    #[default]
    #[clap(name = "balanced")]
    Balanced,
    /// Restoration + upscaler, four augmentations.
    #[clap(name = "ultra")]
    Ultra,
}

impl QualityMode {
    /// Number of test-time augmentations used per neural pass.
    pub fn augmentation_count(self) -> usize {
        match self {
            QualityMode::Fast => 1,
            QualityMode::Balanced => 2,
            QualityMode::Ultra => 4,
        }
    }

    /// Whether a restoration backend should be chained before the upscaler.
    pub fn wants_restoration(self) -> bool {
        !matches!(self, QualityMode::Fast)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            QualityMode::Fast => "fast",
            QualityMode::Balanced => "balanced",
            QualityMode::Ultra => "ultra",
        }
    }
}

/// Resampling kernels exposed by the CPU scaler.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum ResampleFilter {
    /// Pixel replication. Used by reference backends in tests.
    Nearest,
    /// Cheap and smooth; fine for corrective resizes of a few pixels.
    Bilinear,
    /// High-quality default for geometric upscaling.
    #[default]
    Lanczos3,
}

/// Clamp a requested factor into `[MIN_SCALE, MAX_SCALE]`.
///
/// Callers must reject non-finite or non-positive input before clamping;
/// `NaN` is mapped to `MIN_SCALE` here only so the function is total.
pub fn clamp_scale(requested: f64) -> f64 {
    if requested.is_nan() {
        return MIN_SCALE;
    }
    requested.clamp(MIN_SCALE, MAX_SCALE)
}

/// Exact final output size for `input` magnified by `scale`.
pub fn target_size(input: Size, scale: f64) -> Size {
    input.scaled(scale, scale)
}

/// Measured per-axis ratio of `output` to `input`.
pub fn measured_scale(input: Size, output: Size) -> (f64, f64) {
    (
        output.w as f64 / input.w.max(1) as f64,
        output.h as f64 / input.h.max(1) as f64,
    )
}
