//! # Processing Module
//!
//! The tiled multi-backend super-resolution core: tiled inference, test-time
//! augmentation, scale reconciliation and the pipeline orchestrator.

pub mod ensemble;
pub mod pipeline;
pub mod reconcile;
pub mod tiled;
pub mod trace;

use image::RgbaImage;
use sr_scale::presets::{measured_scale, Size};

use crate::error::{UpscaleError, UpscaleResult};

pub use ensemble::{run_with_augmentations, Augmentation, AugmentationSet};
pub use pipeline::{UpscaleOutput, UpscaleResources, Upscaler};
pub use reconcile::reconcile;
pub use tiled::{run_tiled, TileSettings};
pub use trace::PipelineTrace;

/// Output of one stage plus its measured per-axis magnification.
#[derive(Debug, Clone)]
pub struct StageResult {
    pub image: RgbaImage,
    /// Measured output/input width ratio.
    pub scale_x: f64,
    /// Measured output/input height ratio.
    pub scale_y: f64,
}

impl StageResult {
    /// Measure `image` against the stage's input size.
    pub fn measure(input: Size, image: RgbaImage) -> Self {
        let (scale_x, scale_y) = measured_scale(input, image_size(&image));
        Self {
            image,
            scale_x,
            scale_y,
        }
    }

    /// The factor the residual-scale bookkeeping divides by.
    pub fn effective_scale(&self) -> f64 {
        self.scale_x.min(self.scale_y)
    }

    pub fn size(&self) -> Size {
        image_size(&self.image)
    }
}

/// Dimensions of an image as a [`Size`].
pub fn image_size(image: &RgbaImage) -> Size {
    Size::new(image.width(), image.height())
}

/// Wrap a packed RGBA8 buffer produced by `stage` into an image.
pub(crate) fn image_from_raw(size: Size, data: Vec<u8>, stage: &str) -> UpscaleResult<RgbaImage> {
    let len = data.len();
    RgbaImage::from_raw(size.w, size.h, data).ok_or_else(|| {
        UpscaleError::output_unproducible(
            stage,
            format!("{} bytes do not form a {} RGBA image", len, size),
        )
    })
}
