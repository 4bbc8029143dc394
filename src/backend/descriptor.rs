//! Backend descriptors and the two-slot pipeline strategy built from them.

use std::fmt;

use sr_scale::presets::Size;

use crate::error::{UpscaleError, UpscaleResult};

/// Descriptors within this distance of 1.0 count as same-size (restoration) backends.
pub const UNIT_SCALE_TOLERANCE: f64 = 0.01;

/// Immutable metadata about one enhancement capability.
///
/// `preferred_tile_size = None` means the backend takes any input up to the
/// platform maximum. `Some(size)` means the backend only accepts exactly that
/// input shape.
#[derive(Debug, Clone, PartialEq)]
pub struct BackendDescriptor {
    pub name: String,
    pub preferred_tile_size: Option<Size>,
    pub nominal_scale: f64,
}

impl BackendDescriptor {
    /// A size-unconstrained backend.
    pub fn new(name: impl Into<String>, nominal_scale: f64) -> Self {
        Self {
            name: name.into(),
            preferred_tile_size: None,
            nominal_scale,
        }
    }

    /// Pin the backend to a fixed input shape.
    pub fn with_tile_size(mut self, size: Size) -> Self {
        self.preferred_tile_size = Some(size);
        self
    }

    pub fn is_fixed_shape(&self) -> bool {
        self.preferred_tile_size.is_some()
    }

    /// Whether the advertised factor magnifies by more than `epsilon`.
    pub fn is_upscaler(&self, epsilon: f64) -> bool {
        self.nominal_scale > epsilon
    }

    /// Whether the advertised factor is approximately 1.0.
    pub fn is_unit_scale(&self) -> bool {
        (self.nominal_scale - 1.0).abs() <= UNIT_SCALE_TOLERANCE
    }
}

impl fmt::Display for BackendDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}x", self.name, self.nominal_scale)?;
        if let Some(tile) = self.preferred_tile_size {
            write!(f, ", tile {}", tile)?;
        }
        write!(f, ")")
    }
}

/// Ordered backend chain for one invocation: optional restoration, then upscale.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineStrategy {
    restoration: Option<BackendDescriptor>,
    upscale: BackendDescriptor,
}

impl PipelineStrategy {
    /// Build a strategy, enforcing its invariants:
    /// the upscaler magnifies (> 1.0), and a restoration backend, if present,
    /// is unit-scale and differs in name from the upscaler.
    pub fn new(
        restoration: Option<BackendDescriptor>,
        upscale: BackendDescriptor,
    ) -> UpscaleResult<Self> {
        if !(upscale.nominal_scale > 1.0) {
            return Err(UpscaleError::geometry_invalid(
                "upscale.nominal_scale",
                "must be greater than 1.0",
                upscale.nominal_scale.to_string(),
            ));
        }
        if let Some(restore) = &restoration {
            if !restore.is_unit_scale() {
                return Err(UpscaleError::geometry_invalid(
                    "restoration.nominal_scale",
                    "must be approximately 1.0",
                    restore.nominal_scale.to_string(),
                ));
            }
            if restore.name.eq_ignore_ascii_case(&upscale.name) {
                return Err(UpscaleError::config(
                    "restoration.name",
                    restore.name.clone(),
                    "restoration and upscale backends must differ",
                ));
            }
        }
        Ok(Self {
            restoration,
            upscale,
        })
    }

    pub fn restoration(&self) -> Option<&BackendDescriptor> {
        self.restoration.as_ref()
    }

    pub fn upscale(&self) -> &BackendDescriptor {
        &self.upscale
    }

    /// Human-readable chain, e.g. `scunet → realesrgan-x4plus`.
    pub fn summary(&self) -> String {
        match &self.restoration {
            Some(restore) => format!("{} → {}", restore.name, self.upscale.name),
            None => self.upscale.name.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strategy_rejects_non_magnifying_upscaler() {
        let err = PipelineStrategy::new(None, BackendDescriptor::new("noop", 1.0)).unwrap_err();
        assert_eq!(err.category(), "geometry_invalid");
    }

    #[test]
    fn strategy_rejects_same_name_restoration() {
        let up = BackendDescriptor::new("esrgan", 4.0);
        let restore = BackendDescriptor::new("ESRGAN", 1.0);
        assert!(PipelineStrategy::new(Some(restore), up).is_err());
    }

    #[test]
    fn strategy_summary() {
        let up = BackendDescriptor::new("realesrgan-x4plus", 4.0);
        let restore = BackendDescriptor::new("scunet", 1.0);
        let strategy = PipelineStrategy::new(Some(restore), up.clone()).unwrap();
        assert_eq!(strategy.summary(), "scunet → realesrgan-x4plus");
        assert_eq!(PipelineStrategy::new(None, up).unwrap().summary(), "realesrgan-x4plus");
    }

    #[test]
    fn descriptor_display() {
        let d = BackendDescriptor::new("swinir", 2.0).with_tile_size(Size::new(64, 64));
        assert_eq!(d.to_string(), "swinir (2x, tile 64x64)");
        assert!(d.is_fixed_shape());
    }
}
