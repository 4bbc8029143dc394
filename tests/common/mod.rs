//! Shared stubs and helpers for the upscaler integration tests.
//!
//! Every collaborator here is deterministic so pipeline behavior can be
//! asserted pixel for pixel without a model runtime.

#![allow(dead_code)]

pub mod stubs {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use async_trait::async_trait;
    use hybrid_upscale::backend::{
        BackendDescriptor, HardwareScaler, InferenceBackend, NearestNeighborBackend, Resampler,
        Sharpener,
    };
    use hybrid_upscale::{UpscaleError, UpscaleResult};
    use image::RgbaImage;
    use sr_scale::presets::Size;

    /// Nearest-neighbor at the descriptor's nominal scale, counting calls.
    #[derive(Clone, Default)]
    pub struct CountingBackend {
        pub calls: Arc<AtomicUsize>,
    }

    impl CountingBackend {
        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl InferenceBackend for CountingBackend {
        async fn infer(&self, tile: &RgbaImage, backend: &BackendDescriptor) -> UpscaleResult<RgbaImage> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            NearestNeighborBackend.infer(tile, backend).await
        }
    }

    /// Fails every call for the named backends, delegates the rest.
    pub struct SelectiveFailure {
        pub failing: Vec<String>,
    }

    #[async_trait]
    impl InferenceBackend for SelectiveFailure {
        async fn infer(&self, tile: &RgbaImage, backend: &BackendDescriptor) -> UpscaleResult<RgbaImage> {
            if self.failing.iter().any(|n| *n == backend.name) {
                return Err(UpscaleError::inference_failed(&backend.name, "simulated session failure"));
            }
            NearestNeighborBackend.infer(tile, backend).await
        }
    }

    /// Returns its input unchanged regardless of the advertised scale.
    pub struct IdentityBackend;

    #[async_trait]
    impl InferenceBackend for IdentityBackend {
        async fn infer(&self, tile: &RgbaImage, _: &BackendDescriptor) -> UpscaleResult<RgbaImage> {
            Ok(tile.clone())
        }
    }

    /// Magnifies by the nominal scale plus a few stray pixels per axis.
    pub struct DriftingBackend {
        pub extra_w: u32,
        pub extra_h: u32,
    }

    #[async_trait]
    impl InferenceBackend for DriftingBackend {
        async fn infer(&self, tile: &RgbaImage, backend: &BackendDescriptor) -> UpscaleResult<RgbaImage> {
            let scale = backend.nominal_scale;
            let w = (tile.width() as f64 * scale).round() as u32 + self.extra_w;
            let h = (tile.height() as f64 * scale).round() as u32 + self.extra_h;
            Ok(RgbaImage::from_pixel(w, h, image::Rgba([128, 64, 32, 255])))
        }
    }

    /// Platform scaler stub with nearest-neighbor output.
    pub struct FakeHardware {
        pub supported: bool,
        pub factors: Vec<u32>,
        pub max_input: Size,
        pub fail: bool,
        pub calls: Arc<AtomicUsize>,
    }

    impl FakeHardware {
        pub fn new(factors: Vec<u32>, max_input: Size) -> Self {
            Self {
                supported: true,
                factors,
                max_input,
                fail: false,
                calls: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    #[async_trait]
    impl HardwareScaler for FakeHardware {
        fn is_supported(&self) -> bool {
            self.supported
        }

        fn supported_factors(&self) -> Vec<u32> {
            self.factors.clone()
        }

        fn max_input_size(&self) -> Size {
            self.max_input
        }

        async fn scale(&self, image: &RgbaImage, factor: u32) -> UpscaleResult<RgbaImage> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(UpscaleError::inference_failed("hardware", "device lost"));
            }
            if image.width() > self.max_input.w || image.height() > self.max_input.h {
                return Err(UpscaleError::inference_failed("hardware", "input exceeds device limit"));
            }
            let descriptor = BackendDescriptor::new("hardware", factor as f64);
            NearestNeighborBackend.infer(image, &descriptor).await
        }
    }

    /// Fails exactly the calls whose zero-based index is listed.
    pub struct FlakyBackend {
        pub fail_on: Vec<usize>,
        pub calls: AtomicUsize,
    }

    impl FlakyBackend {
        pub fn new(fail_on: Vec<usize>) -> Self {
            Self {
                fail_on,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl InferenceBackend for FlakyBackend {
        async fn infer(&self, tile: &RgbaImage, backend: &BackendDescriptor) -> UpscaleResult<RgbaImage> {
            let index = self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_on.contains(&index) {
                return Err(UpscaleError::inference_failed(&backend.name, "transient failure"));
            }
            NearestNeighborBackend.infer(tile, backend).await
        }
    }

    /// Widens restoration output by two columns; upscalers stay exact.
    pub struct RestorerDrift;

    #[async_trait]
    impl InferenceBackend for RestorerDrift {
        async fn infer(&self, tile: &RgbaImage, backend: &BackendDescriptor) -> UpscaleResult<RgbaImage> {
            if backend.is_unit_scale() {
                return Ok(RgbaImage::from_pixel(tile.width() + 2, tile.height(), image::Rgba([90, 90, 90, 255])));
            }
            NearestNeighborBackend.infer(tile, backend).await
        }
    }

    /// Emits a solid image keyed on the tile's top-left red value and sleeps
    /// that many milliseconds first, so larger keys finish later.
    #[derive(Default)]
    pub struct CornerKeyedBackend {
        pub completed: Mutex<Vec<u8>>,
    }

    #[async_trait]
    impl InferenceBackend for CornerKeyedBackend {
        async fn infer(&self, tile: &RgbaImage, backend: &BackendDescriptor) -> UpscaleResult<RgbaImage> {
            let key = tile.get_pixel(0, 0)[0];
            tokio::time::sleep(Duration::from_millis(key as u64)).await;
            if let Ok(mut completed) = self.completed.lock() {
                completed.push(key);
            }
            let w = (tile.width() as f64 * backend.nominal_scale).round() as u32;
            let h = (tile.height() as f64 * backend.nominal_scale).round() as u32;
            Ok(RgbaImage::from_pixel(w, h, image::Rgba([key, key, key, key])))
        }
    }

    pub struct FailingResampler;

    impl Resampler for FailingResampler {
        fn resample_to(&self, _: &RgbaImage, _: Size) -> UpscaleResult<RgbaImage> {
            Err(UpscaleError::output_unproducible("resample", "no filter available"))
        }
    }

    pub struct FailingSharpener;

    impl Sharpener for FailingSharpener {
        fn sharpen(&self, _: &RgbaImage) -> UpscaleResult<RgbaImage> {
            Err(UpscaleError::output_unproducible("sharpen", "filter unavailable"))
        }
    }
}

pub mod test_images {
    use image::RgbaImage;

    /// Non-uniform pattern so misplaced tiles are visible.
    pub fn pattern(w: u32, h: u32) -> RgbaImage {
        RgbaImage::from_fn(w, h, |x, y| {
            image::Rgba([(x * 7 % 251) as u8, (y * 13 % 251) as u8, ((x ^ y) % 256) as u8, 255])
        })
    }

    pub fn solid(w: u32, h: u32, value: u8) -> RgbaImage {
        RgbaImage::from_pixel(w, h, image::Rgba([value, value, value, 255]))
    }
}

pub mod assertions {
    use hybrid_upscale::UpscaleOutput;

    /// Assert the output is exactly `w × h`.
    pub fn assert_size(output: &UpscaleOutput, w: u32, h: u32) {
        assert_eq!(
            output.image.dimensions(),
            (w, h),
            "unexpected output size; trace: {}",
            output.trace
        );
    }
}
