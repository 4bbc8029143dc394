//! # Configuration Module
//!
//! This module provides configuration structures and validation for upscale jobs.
//! It serves as the common interface between the CLI and the core library.
//!
//! ## Job Parameters
//!
//! | Parameter | Type | Range | Description |
//! |-----------|------|-------|-------------|
//! | `input` | `String` | Any readable image | Source image path |
//! | `output` | `String` | Any writable path | Destination; extension picks the format |
//! | `scale` | `f64` | > 0, clamped to 1.0-6.0 | Requested magnification |
//! | `quality` | `QualityMode` | fast / balanced / ultra | Backend chain and augmentation count |
//! | `sharpen` | `bool` | true/false | Unsharp-mask post filter |
//!
//! ## Engine Constants
//!
//! [`EngineConfig`] holds tile sizes, overlaps, pass caps and backend name
//! preferences. Every field has a default, so a JSON file only needs the keys it
//! wants to change:
//!
//! ```json
//! { "neural_tile": 256, "upscale_preferences": ["my-esrgan-x4"] }
//! ```
//!
//! ## Examples
//!
//! ```rust
//! use hybrid_upscale::config::UpscaleConfig;
//!
//! let config = UpscaleConfig {
//!     input: "photo.png".to_string(),
//!     scale: 3.0,
//!     ..UpscaleConfig::default()
//! };
//! assert!(config.validate().is_ok());
//!
//! let options = config.to_options();
//! assert_eq!(options.scale, 3.0);
//! ```

use std::path::Path;

use serde::Deserialize;
use sr_scale::presets::QualityMode;

use crate::error::{UpscaleError, UpscaleResult};

/// Hard cap on neural upscale passes per invocation.
pub const MAX_NEURAL_PASSES: u32 = 4;

/// Configuration for a single upscale job.
#[derive(Debug, Clone)]
pub struct UpscaleConfig {
    /// Source image path. Any format the `image` crate decodes.
    pub input: String,

    /// Output path. The extension selects the encoder.
    pub output: String,

    /// Requested magnification. Values above 6.0 or below 1.0 are clamped by the
    /// orchestrator; non-finite or non-positive values are rejected.
    pub scale: f64,

    /// Output quality mode.
    pub quality: QualityMode,

    /// Whether to apply the unsharp-mask post filter.
    pub sharpen: bool,

    /// Optional path to an [`EngineConfig`] JSON file.
    pub engine_config: Option<String>,

    /// Register the built-in nearest-neighbor reference upscaler.
    pub builtin_model: bool,
}

impl Default for UpscaleConfig {
    /// Default values:
    /// - `output`: "upscaled.png"
    /// - `scale`: 2.0
    /// - `quality`: balanced
    /// - `sharpen`: false
    fn default() -> Self {
        Self {
            input: String::new(),
            output: "upscaled.png".to_string(),
            scale: 2.0,
            quality: QualityMode::Balanced,
            sharpen: false,
            engine_config: None,
            builtin_model: false,
        }
    }
}

impl UpscaleConfig {
    /// Validates the configuration parameters.
    pub fn validate(&self) -> UpscaleResult<()> {
        if self.input.trim().is_empty() {
            return Err(UpscaleError::config("input", "", "input path must not be empty"));
        }
        if self.output.trim().is_empty() {
            return Err(UpscaleError::config("output", "", "output path must not be empty"));
        }
        if !self.scale.is_finite() || self.scale <= 0.0 {
            return Err(UpscaleError::config(
                "scale",
                self.scale.to_string(),
                "scale must be a finite number greater than 0",
            ));
        }
        Ok(())
    }

    /// Convert to UpscaleOptions for use with the upscaler
    pub fn to_options(&self) -> crate::UpscaleOptions {
        crate::UpscaleOptions {
            scale: self.scale,
            quality: self.quality,
            sharpen: self.sharpen,
        }
    }

    /// Load the engine constants named by `engine_config`, or the defaults.
    pub fn load_engine_config(&self) -> UpscaleResult<EngineConfig> {
        match &self.engine_config {
            Some(path) => EngineConfig::from_json_file(path),
            None => Ok(EngineConfig::default()),
        }
    }
}

/// Tunable constants for tiling, pass limits and backend selection.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Default tile side for size-unconstrained neural backends (floored at 64).
    pub neural_tile: u32,
    /// Overlap between neural tiles, before clamping to a quarter tile.
    pub neural_overlap: u32,
    /// Overlap between hardware-scaler tiles.
    pub hardware_overlap: u32,
    /// Largest side submitted whole to a size-unconstrained backend.
    pub direct_limit: u32,
    /// Upscale passes allowed in the neural stage, at most [`MAX_NEURAL_PASSES`].
    pub max_neural_passes: u32,
    /// Safety cap on hardware-scaler passes.
    pub max_hardware_passes: u32,
    /// A factor at or below this counts as "no magnification left / no progress".
    pub progress_epsilon: f64,
    /// Stop looping once the remaining scale falls below `nominal - margin`.
    pub nominal_margin: f64,
    /// Known-good upscaler families, most preferred first.
    pub upscale_preferences: Vec<String>,
    /// Known-good restoration families, most preferred first.
    pub restoration_preferences: Vec<String>,
    /// Gaussian sigma of the unsharp mask.
    pub sharpen_sigma: f32,
    /// Minimum brightness difference the unsharp mask acts on.
    pub sharpen_threshold: i32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            neural_tile: 512,
            neural_overlap: 16,
            hardware_overlap: 32,
            direct_limit: 1024,
            max_neural_passes: 4,
            max_hardware_passes: 8,
            progress_epsilon: 1.01,
            nominal_margin: 0.1,
            upscale_preferences: vec![
                "realesrgan-x4plus".to_string(),
                "realesrgan".to_string(),
                "esrgan".to_string(),
                "swinir".to_string(),
            ],
            restoration_preferences: vec![
                "scunet".to_string(),
                "nafnet".to_string(),
                "restore".to_string(),
                "denoise".to_string(),
            ],
            sharpen_sigma: 1.0,
            sharpen_threshold: 2,
        }
    }
}

impl EngineConfig {
    /// Parse a JSON document; missing keys keep their defaults.
    pub fn from_json_str(json: &str) -> UpscaleResult<Self> {
        let config: EngineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> UpscaleResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            UpscaleError::io("read engine config", e).with_path(path.display().to_string())
        })?;
        Self::from_json_str(&text)
    }

    /// Validates the constants.
    pub fn validate(&self) -> UpscaleResult<()> {
        if self.neural_tile == 0 {
            return Err(UpscaleError::config("neural_tile", "0", "must be greater than 0"));
        }
        if self.direct_limit == 0 {
            return Err(UpscaleError::config("direct_limit", "0", "must be greater than 0"));
        }
        if self.max_neural_passes == 0 || self.max_neural_passes > MAX_NEURAL_PASSES {
            return Err(UpscaleError::config(
                "max_neural_passes",
                self.max_neural_passes.to_string(),
                format!("must be between 1 and {MAX_NEURAL_PASSES}"),
            ));
        }
        if !self.progress_epsilon.is_finite() || self.progress_epsilon < 1.0 {
            return Err(UpscaleError::config(
                "progress_epsilon",
                self.progress_epsilon.to_string(),
                "must be at least 1.0",
            ));
        }
        if !self.nominal_margin.is_finite() || self.nominal_margin < 0.0 {
            return Err(UpscaleError::config(
                "nominal_margin",
                self.nominal_margin.to_string(),
                "must be non-negative",
            ));
        }
        if !self.sharpen_sigma.is_finite() || self.sharpen_sigma <= 0.0 {
            return Err(UpscaleError::config(
                "sharpen_sigma",
                self.sharpen_sigma.to_string(),
                "must be greater than 0",
            ));
        }
        Ok(())
    }
}
