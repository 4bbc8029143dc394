//! Built-in collaborators: the pieces the CLI and tests need without any model runtime.

use async_trait::async_trait;
use image::RgbaImage;
use sr_scale::cpu::resample_rgba_to_vec;
use sr_scale::presets::{ResampleFilter, Size};

use super::capability::{BackendRegistry, InferenceBackend, Resampler, Sharpener};
use super::descriptor::BackendDescriptor;
use crate::config::EngineConfig;
use crate::error::{UpscaleError, UpscaleResult};
use crate::processing::{image_from_raw, image_size};

/// Registry over a fixed, constructor-injected descriptor list.
#[derive(Debug, Clone, Default)]
pub struct StaticRegistry {
    descriptors: Vec<BackendDescriptor>,
}

impl StaticRegistry {
    pub fn new(descriptors: Vec<BackendDescriptor>) -> Self {
        Self { descriptors }
    }

    pub fn empty() -> Self {
        Self::default()
    }
}

impl BackendRegistry for StaticRegistry {
    fn list_available_backends(&self) -> Vec<BackendDescriptor> {
        self.descriptors.clone()
    }
}

/// fast_image_resize-backed resampler.
#[derive(Debug, Clone, Copy, Default)]
pub struct CpuResampler {
    pub filter: ResampleFilter,
}

impl CpuResampler {
    pub fn new(filter: ResampleFilter) -> Self {
        Self { filter }
    }
}

impl Resampler for CpuResampler {
    fn resample_to(&self, image: &RgbaImage, size: Size) -> UpscaleResult<RgbaImage> {
        let src = image_size(image);
        if !size.is_valid() {
            return Err(UpscaleError::geometry_invalid(
                "resample target",
                "both sides must be at least 1px",
                size.to_string(),
            ));
        }
        if src == size {
            return Ok(image.clone());
        }
        let data = resample_rgba_to_vec(image.as_raw(), src, size, self.filter)?;
        image_from_raw(size, data, "resample")
    }
}

/// Unsharp-mask sharpener on `image::imageops::unsharpen`.
#[derive(Debug, Clone, Copy)]
pub struct CpuSharpener {
    pub sigma: f32,
    pub threshold: i32,
}

impl Default for CpuSharpener {
    fn default() -> Self {
        Self::from_config(&EngineConfig::default())
    }
}

impl CpuSharpener {
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            sigma: config.sharpen_sigma,
            threshold: config.sharpen_threshold,
        }
    }
}

impl Sharpener for CpuSharpener {
    fn sharpen(&self, image: &RgbaImage) -> UpscaleResult<RgbaImage> {
        Ok(image::imageops::unsharpen(image, self.sigma, self.threshold))
    }
}

/// Reference "model" that magnifies by the descriptor's nominal scale with
/// nearest-neighbor sampling. Deterministic, so it doubles as a test fixture.
#[derive(Debug, Clone, Copy, Default)]
pub struct NearestNeighborBackend;

impl NearestNeighborBackend {
    /// Descriptor the CLI registers for this backend.
    pub fn descriptor(scale: f64) -> BackendDescriptor {
        BackendDescriptor::new(format!("nearest-x{}", scale), scale)
    }
}

#[async_trait]
impl InferenceBackend for NearestNeighborBackend {
    async fn infer(&self, tile: &RgbaImage, backend: &BackendDescriptor) -> UpscaleResult<RgbaImage> {
        if !(backend.nominal_scale > 0.0) {
            return Err(UpscaleError::inference_failed(
                &backend.name,
                "nominal scale must be positive",
            ));
        }
        let src = image_size(tile);
        let out = src.scaled(backend.nominal_scale, backend.nominal_scale);
        if out == src {
            return Ok(tile.clone());
        }
        let data = resample_rgba_to_vec(tile.as_raw(), src, out, ResampleFilter::Nearest)
            .map_err(|e| UpscaleError::inference_failed(&backend.name, e.to_string()))?;
        image_from_raw(out, data, "nearest-neighbor inference")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resampler_hits_exact_size() {
        let img = RgbaImage::from_pixel(7, 5, image::Rgba([10, 20, 30, 255]));
        let out = CpuResampler::default().resample(&img, 3.0, 2.0).unwrap();
        assert_eq!(out.dimensions(), (21, 10));
        let out = CpuResampler::default().resample_to(&img, Size::new(4, 9)).unwrap();
        assert_eq!(out.dimensions(), (4, 9));
    }

    #[test]
    fn resampler_rejects_empty_target() {
        let img = RgbaImage::new(2, 2);
        assert!(CpuResampler::default().resample_to(&img, Size::new(0, 2)).is_err());
    }

    #[test]
    fn sharpen_keeps_size() {
        let img = RgbaImage::from_fn(8, 8, |x, _| image::Rgba([(x * 30) as u8, 0, 0, 255]));
        let out = CpuSharpener::default().sharpen(&img).unwrap();
        assert_eq!(out.dimensions(), img.dimensions());
    }

    #[tokio::test]
    async fn nearest_backend_doubles() {
        let img = RgbaImage::from_fn(3, 2, |x, y| image::Rgba([x as u8, y as u8, 0, 255]));
        let out = NearestNeighborBackend
            .infer(&img, &NearestNeighborBackend::descriptor(2.0))
            .await
            .unwrap();
        assert_eq!(out.dimensions(), (6, 4));
        assert_eq!(out.get_pixel(5, 3), img.get_pixel(2, 1));
    }

    #[test]
    fn static_registry_lists_in_order() {
        let registry = StaticRegistry::new(vec![
            BackendDescriptor::new("a", 2.0),
            BackendDescriptor::new("b", 1.0),
        ]);
        let names: Vec<String> = registry
            .list_available_backends()
            .into_iter()
            .map(|d| d.name)
            .collect();
        assert_eq!(names, vec!["a", "b"]);
        assert!(StaticRegistry::empty().list_available_backends().is_empty());
    }
}
