//! # Pipeline Orchestrator
//!
//! Drives one upscale invocation through a fixed chain of stages, tracking the
//! magnification still owed after each one:
//!
//! 1. **Neural**: optional restoration pass, then up to `max_neural_passes`
//!    upscale passes with test-time augmentation.
//! 2. **Hardware**: platform scaler passes at the largest integer factor that
//!    does not overshoot.
//! 3. **Classical**: one resample for whatever is left.
//! 4. **Normalization**: snap to `round(w·scale) × round(h·scale)`.
//! 5. **Sharpen**: optional unsharp mask.
//!
//! Neural and hardware failures are absorbed: the stage stops, the last good
//! image carries on, and a later stage covers the rest. Only invalid input
//! geometry and a failure to produce the final size surface as errors.
//!
//! Collaborators arrive through [`UpscalerBuilder`]; nothing is looked up
//! globally, so every stage can be driven by a stub in tests.

use std::sync::Arc;

use async_trait::async_trait;
use image::RgbaImage;
use sr_scale::presets::{clamp_scale, target_size, ResampleFilter, Size};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use super::ensemble::{run_with_augmentations, AugmentationSet};
use super::reconcile::{expected_after, reconcile, residual_scale};
use super::tiled::{run_tiled, TileSettings};
use super::trace::{PipelineTrace, NO_PROCESSING_LABEL};
use super::image_size;
use crate::backend::{
    BackendDescriptor, BackendRegistry, BackendSelector, CpuResampler, CpuSharpener, HardwareScaler,
    InferenceBackend, NearestNeighborBackend, Resampler, Sharpener, StaticRegistry,
};
use crate::config::EngineConfig;
use crate::error::{classify, UpscaleError, UpscaleResult};
use crate::UpscaleOptions;

/// Final image plus the record of how it was produced.
#[derive(Debug, Clone)]
pub struct UpscaleOutput {
    pub image: RgbaImage,
    pub trace: PipelineTrace,
}

impl UpscaleOutput {
    pub fn size(&self) -> Size {
        image_size(&self.image)
    }

    /// Whether any neural or hardware pass contributed to the image.
    pub fn used_ai(&self) -> bool {
        self.trace.used_ai()
    }

    pub fn inference_pass_count(&self) -> u32 {
        self.trace.inference_pass_count()
    }

    pub fn model_summary(&self) -> Option<String> {
        self.trace.model_summary()
    }
}

/// Shared collaborators handed to every invocation.
#[derive(Clone)]
pub struct UpscaleResources {
    pub registry: Arc<dyn BackendRegistry>,
    pub inference: Arc<dyn InferenceBackend>,
    pub hardware: Option<Arc<dyn HardwareScaler>>,
    pub resampler: Arc<dyn Resampler>,
    pub sharpener: Arc<dyn Sharpener>,
}

impl Default for UpscaleResources {
    /// No neural descriptors, no hardware scaler: classical resampling only.
    fn default() -> Self {
        Self {
            registry: Arc::new(StaticRegistry::empty()),
            inference: Arc::new(NearestNeighborBackend),
            hardware: None,
            resampler: Arc::new(CpuResampler::new(ResampleFilter::Lanczos3)),
            sharpener: Arc::new(CpuSharpener::default()),
        }
    }
}

/// Tiled multi-backend upscaler. Cheap to share behind an `Arc`; concurrent
/// invocations keep no state in common beyond the injected collaborators.
pub struct Upscaler {
    resources: UpscaleResources,
    config: EngineConfig,
    selector: BackendSelector,
}

/// Image and residual scale carried between stages.
struct PassState {
    image: RgbaImage,
    remaining: f64,
}

impl Upscaler {
    pub fn builder() -> UpscalerBuilder {
        UpscalerBuilder::new()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Upscale `image` by `options.scale`.
    ///
    /// The output is exactly `round(w·s) × round(h·s)` where `s` is the scale
    /// clamped into `[1.0, 6.0]`. Fails with `GeometryInvalid` for an empty
    /// image or a non-finite / non-positive scale, and with
    /// `OutputUnproducible` if the final resample cannot run.
    #[instrument(skip_all, name = "upscale_pipeline", fields(scale = options.scale, quality = options.quality.as_str()))]
    pub async fn upscale(&self, image: RgbaImage, options: UpscaleOptions) -> UpscaleResult<UpscaleOutput> {
        let original = image_size(&image);
        validate_request(original, options.scale)?;

        let requested = clamp_scale(options.scale);
        let target = target_size(original, requested);
        let epsilon = self.config.progress_epsilon;
        info!(input = %original, target = %target, requested, "upscale started");

        let mut state = PassState {
            image,
            remaining: requested,
        };
        let mut trace = PipelineTrace::new();
        let mut processed = false;

        if state.remaining > epsilon {
            processed |= self.neural_stage(&mut state, &options, &mut trace).await;
        }
        if state.remaining > epsilon {
            processed |= self.hardware_stage(&mut state, &mut trace).await;
        }
        if state.remaining > epsilon {
            self.classical_stage(&mut state, &mut trace)?;
            processed = true;
        }
        if !processed {
            trace.push(NO_PROCESSING_LABEL);
        }

        let before = image_size(&state.image);
        let mut image = reconcile(state.image, target, self.resources.resampler.as_ref())?;
        if before != target {
            trace.push(format!("Normalized {} → {}", before, target));
        }

        if options.sharpen {
            match self.resources.sharpener.sharpen(&image) {
                Ok(sharpened) if image_size(&sharpened) == target => {
                    image = sharpened;
                    trace.push("Sharpen");
                }
                Ok(sharpened) => {
                    warn!(size = %image_size(&sharpened), "sharpener changed the image size; discarded");
                }
                Err(e) => warn!(error = %e, "sharpen failed; keeping unsharpened output"),
            }
        }

        info!(output = %image_size(&image), trace = %trace, "upscale finished");
        Ok(UpscaleOutput { image, trace })
    }

    /// Run [`Upscaler::upscale`] on the Tokio runtime. Dropping or aborting the
    /// handle cancels the invocation; no partial image is produced.
    pub fn spawn(self: &Arc<Self>, image: RgbaImage, options: UpscaleOptions) -> JoinHandle<UpscaleResult<UpscaleOutput>> {
        let upscaler = Arc::clone(self);
        tokio::spawn(async move { upscaler.upscale(image, options).await })
    }

    /// Restoration plus up to `max_neural_passes` upscale passes. Returns
    /// whether any pass was committed.
    async fn neural_stage(&self, state: &mut PassState, options: &UpscaleOptions, trace: &mut PipelineTrace) -> bool {
        let available = self.resources.registry.list_available_backends();
        let Some(strategy) = self.selector.select(options.quality, &available) else {
            let reason = UpscaleError::backend_unavailable("neural", "no upscale-capable backend registered");
            debug!(error = %reason, "skipping neural stage");
            return false;
        };

        let infer = self.resources.inference.as_ref();
        let resampler = self.resources.resampler.as_ref();
        let augmentations = AugmentationSet::for_quality(options.quality);
        let settings = TileSettings::neural(&self.config);
        let epsilon = self.config.progress_epsilon;
        let mut committed = false;

        if let Some(restore) = strategy.restoration() {
            let input = image_size(&state.image);
            match run_with_augmentations(&state.image, restore, &augmentations, infer, &settings).await {
                Ok(result) => match reconcile(result.image, input, resampler) {
                    Ok(image) => {
                        state.image = image;
                        committed = true;
                        trace.record_pass(
                            format!("AI restore ({}, {}× TTA)", restore.name, augmentations.len()),
                            &restore.name,
                        );
                    }
                    Err(e) => {
                        warn!(backend = %restore.name, error = %e, "restoration output unusable");
                        trace.push(format!("AI restore failed ({})", restore.name));
                    }
                },
                Err(e) => {
                    warn!(backend = %restore.name, error = %e, "restoration failed; continuing without it");
                    trace.push(format!("AI restore failed ({})", restore.name));
                }
            }
        }

        let upscale = strategy.upscale();
        for pass in 0..self.config.max_neural_passes {
            if pass > 0 && self.near_nominal_ceiling(state.remaining, upscale) {
                debug!(remaining = state.remaining, "remaining scale below one model pass");
                break;
            }

            let input = image_size(&state.image);
            let result = match run_with_augmentations(&state.image, upscale, &augmentations, infer, &settings).await {
                Ok(result) => result,
                Err(e) => {
                    warn!(
                        backend = %upscale.name,
                        pass,
                        fallback = classify::triggers_fallback(&e),
                        error = %e,
                        "upscale pass failed"
                    );
                    trace.push(format!("AI upscale failed ({})", upscale.name));
                    break;
                }
            };

            let achieved = result.effective_scale();
            if achieved <= epsilon {
                warn!(backend = %upscale.name, achieved, "upscale pass made no progress; discarded");
                break;
            }
            let image = match reconcile(result.image, expected_after(input, achieved), resampler) {
                Ok(image) => image,
                Err(e) => {
                    warn!(backend = %upscale.name, error = %e, "upscale output unusable");
                    trace.push(format!("AI upscale failed ({})", upscale.name));
                    break;
                }
            };

            state.image = image;
            state.remaining = residual_scale(state.remaining, achieved);
            committed = true;
            trace.record_pass(format!("AI upscale {:.2}× ({})", achieved, upscale.name), &upscale.name);
            debug!(pass, achieved, remaining = state.remaining, "upscale pass committed");

            if state.remaining <= epsilon {
                break;
            }
        }
        committed
    }

    /// Another full model pass would overshoot by more than the margin.
    fn near_nominal_ceiling(&self, remaining: f64, upscale: &BackendDescriptor) -> bool {
        remaining < upscale.nominal_scale - self.config.nominal_margin
    }

    /// Hardware scaler passes until no supported factor fits the remainder.
    async fn hardware_stage(&self, state: &mut PassState, trace: &mut PipelineTrace) -> bool {
        let Some(scaler) = self.resources.hardware.as_ref() else {
            return false;
        };
        if !scaler.is_supported() {
            debug!("hardware scaler unsupported on this device");
            return false;
        }

        let max_input = scaler.max_input_size();
        if !max_input.is_valid() {
            warn!(max_input = %max_input, "hardware scaler reports an empty input limit");
            return false;
        }
        let settings = TileSettings::hardware(&self.config, max_input);
        let factors = scaler.supported_factors();
        let resampler = self.resources.resampler.as_ref();
        let epsilon = self.config.progress_epsilon;
        let mut committed = false;

        for _ in 0..self.config.max_hardware_passes {
            if state.remaining <= epsilon {
                break;
            }
            let Some(factor) = pick_hardware_factor(&factors, state.remaining) else {
                break;
            };

            let descriptor = BackendDescriptor::new(format!("hardware-x{}", factor), factor as f64);
            let pass = HardwarePass {
                scaler: Arc::clone(scaler),
                factor,
            };
            let input = image_size(&state.image);
            let result = match run_tiled(&state.image, &descriptor, &pass, &settings).await {
                Ok(result) => result,
                Err(e) => {
                    warn!(factor, fallback = classify::triggers_fallback(&e), error = %e, "hardware pass failed");
                    trace.push(format!("Hardware SR failed ({}×)", factor));
                    break;
                }
            };

            let achieved = result.effective_scale();
            if achieved <= epsilon {
                warn!(factor, achieved, "hardware pass made no progress; discarded");
                break;
            }
            match reconcile(result.image, expected_after(input, achieved), resampler) {
                Ok(image) => state.image = image,
                Err(e) => {
                    warn!(factor, error = %e, "hardware output unusable");
                    trace.push(format!("Hardware SR failed ({}×)", factor));
                    break;
                }
            }
            state.remaining = residual_scale(state.remaining, achieved);
            committed = true;
            trace.record_pass(format!("Hardware SR {}×", factor), "hardware-sr");
        }
        committed
    }

    fn classical_stage(&self, state: &mut PassState, trace: &mut PipelineTrace) -> UpscaleResult<()> {
        let factor = state.remaining;
        state.image = self
            .resources
            .resampler
            .resample(&state.image, factor, factor)
            .map_err(|e| UpscaleError::output_unproducible("classical resample", e.to_string()))?;
        state.remaining = 1.0;
        trace.push(format!("Classical resample {:.2}×", factor));
        Ok(())
    }
}

/// Largest supported integer factor that magnifies without exceeding `remaining`.
fn pick_hardware_factor(factors: &[u32], remaining: f64) -> Option<u32> {
    factors
        .iter()
        .copied()
        .filter(|&f| f >= 2 && f as f64 <= remaining)
        .max()
}

fn validate_request(size: Size, scale: f64) -> UpscaleResult<()> {
    if !size.is_valid() {
        return Err(UpscaleError::geometry_invalid(
            "image",
            "width and height must be at least 1",
            size.to_string(),
        ));
    }
    if !scale.is_finite() || scale <= 0.0 {
        return Err(UpscaleError::geometry_invalid(
            "scale",
            "must be a finite number greater than 0",
            scale.to_string(),
        ));
    }
    Ok(())
}

/// Presents a hardware scaler at one fixed factor as an inference backend, so
/// it can reuse the tiling path.
struct HardwarePass {
    scaler: Arc<dyn HardwareScaler>,
    factor: u32,
}

#[async_trait]
impl InferenceBackend for HardwarePass {
    async fn infer(&self, tile: &RgbaImage, _backend: &BackendDescriptor) -> UpscaleResult<RgbaImage> {
        self.scaler.scale(tile, self.factor).await
    }
}

/// Fluent construction of an [`Upscaler`].
pub struct UpscalerBuilder {
    resources: UpscaleResources,
    config: EngineConfig,
    custom_sharpener: bool,
}

impl Default for UpscalerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl UpscalerBuilder {
    pub fn new() -> Self {
        Self {
            resources: UpscaleResources::default(),
            config: EngineConfig::default(),
            custom_sharpener: false,
        }
    }

    pub fn with_registry<R: BackendRegistry + 'static>(mut self, registry: R) -> Self {
        self.resources.registry = Arc::new(registry);
        self
    }

    pub fn with_inference<B: InferenceBackend + 'static>(mut self, inference: B) -> Self {
        self.resources.inference = Arc::new(inference);
        self
    }

    pub fn with_hardware<H: HardwareScaler + 'static>(mut self, hardware: H) -> Self {
        self.resources.hardware = Some(Arc::new(hardware));
        self
    }

    pub fn with_resampler<R: Resampler + 'static>(mut self, resampler: R) -> Self {
        self.resources.resampler = Arc::new(resampler);
        self
    }

    pub fn with_sharpener<S: Sharpener + 'static>(mut self, sharpener: S) -> Self {
        self.resources.sharpener = Arc::new(sharpener);
        self.custom_sharpener = true;
        self
    }

    pub fn with_resources(mut self, resources: UpscaleResources) -> Self {
        self.resources = resources;
        self.custom_sharpener = true;
        self
    }

    pub fn with_engine_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Validate the engine constants and build. The built-in sharpener takes
    /// its settings from the engine config unless one was injected.
    pub fn build(mut self) -> UpscaleResult<Upscaler> {
        self.config.validate()?;
        if !self.custom_sharpener {
            self.resources.sharpener = Arc::new(CpuSharpener::from_config(&self.config));
        }
        Ok(Upscaler {
            selector: BackendSelector::from_config(&self.config),
            resources: self.resources,
            config: self.config,
        })
    }
}
