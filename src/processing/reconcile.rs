//! Scale reconciliation: snap an image to the exact size a stage should have
//! produced, and track how much magnification is still owed.

use image::RgbaImage;
use sr_scale::presets::Size;
use tracing::debug;

use super::image_size;
use crate::backend::Resampler;
use crate::error::{UpscaleError, UpscaleResult};

/// Resample `image` to `expected` when its size drifted; otherwise return it as-is.
pub fn reconcile(image: RgbaImage, expected: Size, resampler: &dyn Resampler) -> UpscaleResult<RgbaImage> {
    let actual = image_size(&image);
    if actual == expected {
        return Ok(image);
    }
    if !expected.is_valid() {
        return Err(UpscaleError::geometry_invalid(
            "reconcile target",
            "both sides must be at least 1px",
            expected.to_string(),
        ));
    }
    debug!(actual = %actual, expected = %expected, "reconciling size drift");
    resampler
        .resample_to(&image, expected)
        .map_err(|e| UpscaleError::output_unproducible("scale reconciliation", e.to_string()))
}

/// Size a pass with effective factor `factor` should have produced from `input`.
pub fn expected_after(input: Size, factor: f64) -> Size {
    input.scaled(factor, factor)
}

/// Magnification still owed after a pass that achieved `achieved`.
pub fn residual_scale(remaining: f64, achieved: f64) -> f64 {
    if achieved > 0.0 {
        remaining / achieved
    } else {
        remaining
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::CpuResampler;

    #[test]
    fn exact_size_is_untouched() {
        let img = RgbaImage::from_fn(6, 4, |x, y| image::Rgba([x as u8, y as u8, 0, 255]));
        let out = reconcile(img.clone(), Size::new(6, 4), &CpuResampler::default()).unwrap();
        assert_eq!(out, img);
    }

    #[test]
    fn drift_is_snapped() {
        let img = RgbaImage::new(401, 299);
        let out = reconcile(img, expected_after(Size::new(100, 75), 4.0), &CpuResampler::default()).unwrap();
        assert_eq!(out.dimensions(), (400, 300));
    }

    #[test]
    fn residual_divides() {
        assert_eq!(residual_scale(6.0, 4.0), 1.5);
        assert_eq!(residual_scale(2.0, 0.0), 2.0);
    }
}
