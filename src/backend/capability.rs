//! Capability traits for the collaborators the upscaler drives but does not own.
//!
//! Everything that touches a model runtime, a GPU or a platform scaler sits behind
//! one of these traits. The orchestrator receives them as explicit resources, so a
//! test can swap in a deterministic stub (for example a nearest-neighbor doubler)
//! with no model on disk.
//!
//! Implementations must release whatever session or device resource a call
//! acquires before returning, on success and on error alike. The orchestrator
//! never holds a lock across a call.

use async_trait::async_trait;
use image::RgbaImage;
use sr_scale::presets::Size;

use super::descriptor::BackendDescriptor;
use crate::error::UpscaleResult;

/// Runs one neural backend over one tile.
///
/// No guarantee on output size beyond "larger than input for an upscaler,
/// same or similar for a restorer"; callers validate.
#[async_trait]
pub trait InferenceBackend: Send + Sync {
    async fn infer(&self, tile: &RgbaImage, backend: &BackendDescriptor) -> UpscaleResult<RgbaImage>;
}

/// Source of the backend descriptors available to this process.
pub trait BackendRegistry: Send + Sync {
    /// May be empty; the pipeline then degrades to classical resampling.
    fn list_available_backends(&self) -> Vec<BackendDescriptor>;
}

/// Platform super-resolution frame scaler.
#[async_trait]
pub trait HardwareScaler: Send + Sync {
    fn is_supported(&self) -> bool;

    /// Integer magnifications the scaler can perform.
    fn supported_factors(&self) -> Vec<u32>;

    /// Largest input the scaler accepts in one call.
    fn max_input_size(&self) -> Size;

    async fn scale(&self, image: &RgbaImage, factor: u32) -> UpscaleResult<RgbaImage>;
}

/// Pure geometric resampling.
pub trait Resampler: Send + Sync {
    /// Resample to an exact size; axes scale independently.
    fn resample_to(&self, image: &RgbaImage, size: Size) -> UpscaleResult<RgbaImage>;

    /// Resample by per-axis factors; the output is `round(w·sx) × round(h·sy)`.
    fn resample(&self, image: &RgbaImage, scale_x: f64, scale_y: f64) -> UpscaleResult<RgbaImage> {
        let size = Size::new(image.width(), image.height()).scaled(scale_x, scale_y);
        self.resample_to(image, size)
    }
}

/// Post-filter applied once after all scaling.
pub trait Sharpener: Send + Sync {
    fn sharpen(&self, image: &RgbaImage) -> UpscaleResult<RgbaImage>;
}
