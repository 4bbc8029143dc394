//! # Hybrid Upscale Library
//!
//! Tiled multi-backend super-resolution. An image is magnified by an arbitrary
//! factor in `[1.0, 6.0]` through a chain of enhancement stages, each covering
//! as much of the requested scale as it can, with classical resampling as the
//! floor that always works.
//!
//! ## Architecture
//!
//! - `backend`: backend descriptors, capability traits, strategy selection and
//!   built-in collaborators
//! - `processing`: tiled inference, augmentation ensemble, scale reconciliation,
//!   the pipeline orchestrator and its trace
//! - `config`: job parameters and engine constants
//! - `error`: error taxonomy with severity and recovery hints
//!
//! Pure geometry (tile grids, target sizes) and the SIMD resampler live in the
//! `sr_scale` crate.
//!
//! ## Guarantees
//!
//! - The output is exactly `round(w·s) × round(h·s)` for the clamped scale `s`.
//! - With no neural backend and no hardware scaler the result is a single
//!   classical resample.
//! - Backend failures never fail the invocation; only invalid input geometry or
//!   an impossible final resample do.
//!
//! ## Example
//!
//! ```rust,no_run
//! use hybrid_upscale::{UpscaleOptions, Upscaler};
//! use hybrid_upscale::backend::{NearestNeighborBackend, StaticRegistry};
//! use sr_scale::presets::QualityMode;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let upscaler = Upscaler::builder()
//!     .with_registry(StaticRegistry::new(vec![NearestNeighborBackend::descriptor(2.0)]))
//!     .with_inference(NearestNeighborBackend)
//!     .build()?;
//!
//! let image = image::open("photo.png")?.to_rgba8();
//! let options = UpscaleOptions {
//!     scale: 3.0,
//!     quality: QualityMode::Balanced,
//!     sharpen: false,
//! };
//! let output = upscaler.upscale(image, options).await?;
//! println!("{}", output.trace);
//! # Ok(())
//! # }
//! ```

use tracing::info;

pub mod backend;
pub mod config;
pub mod error;
pub mod processing;

pub use error::{
    ErrorSeverity, HasRecoverySuggestion, HasSeverity, Recoverable, UpscaleError, UpscaleResult,
};
pub use processing::{PipelineTrace, UpscaleOutput, UpscaleResources, Upscaler};
pub use processing::pipeline::UpscalerBuilder;

use backend::{NearestNeighborBackend, StaticRegistry};
use config::UpscaleConfig;
use sr_scale::presets::QualityMode;

/// Per-invocation options.
///
/// # Examples
///
/// ```rust
/// use hybrid_upscale::UpscaleOptions;
/// use sr_scale::presets::QualityMode;
///
/// let options = UpscaleOptions {
///     scale: 2.5,
///     quality: QualityMode::Ultra,
///     sharpen: true,
/// };
/// assert_eq!(options.quality.augmentation_count(), 4);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UpscaleOptions {
    /// Requested magnification. Clamped into `[1.0, 6.0]`; non-finite or
    /// non-positive values are rejected.
    pub scale: f64,

    /// Backend chain and number of test-time augmentations.
    pub quality: QualityMode,

    /// Apply an unsharp mask after all scaling.
    pub sharpen: bool,
}

impl Default for UpscaleOptions {
    fn default() -> Self {
        Self {
            scale: 2.0,
            quality: QualityMode::Balanced,
            sharpen: false,
        }
    }
}

/// Build the upscaler a job describes: engine constants from its config file
/// and, when asked, the built-in reference model.
pub fn upscaler_for_job(config: &UpscaleConfig) -> UpscaleResult<Upscaler> {
    let engine = config.load_engine_config()?;
    let mut builder = Upscaler::builder().with_engine_config(engine);
    if config.builtin_model {
        builder = builder
            .with_registry(StaticRegistry::new(vec![NearestNeighborBackend::descriptor(2.0)]))
            .with_inference(NearestNeighborBackend);
    }
    builder.build()
}

/// Run one file-to-file job: decode, upscale, encode.
///
/// # Errors
///
/// Returns an error if the configuration is invalid, the input cannot be
/// decoded, the pipeline fails, or the output cannot be written.
pub async fn upscale_file(config: &UpscaleConfig) -> UpscaleResult<UpscaleOutput> {
    config.validate()?;
    let upscaler = upscaler_for_job(config)?;

    let image = image::open(&config.input)
        .map_err(|e| UpscaleError::from(e).with_path(config.input.clone()))?
        .to_rgba8();
    info!(input = %config.input, width = image.width(), height = image.height(), "decoded input");

    let output = upscaler.upscale(image, config.to_options()).await?;

    output
        .image
        .save(&config.output)
        .map_err(|e| UpscaleError::from(e).with_path(config.output.clone()))?;
    info!(output = %config.output, "wrote output");
    Ok(output)
}
