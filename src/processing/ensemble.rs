//! # Augmentation Ensemble
//!
//! Test-time augmentation: run one backend over geometrically transformed
//! copies of the input, undo each transform on its output and blend the results.
//!
//! Every transform is its own inverse, so undoing one means applying it again.
//! Outputs are folded in list order: the k-th subsequent output (1-based) is
//! mixed into the running composite with weight `1 / (k + 1)`. That makes the
//! composite the arithmetic mean of every output folded so far, so later
//! augmentations carry the same weight as the first one rather than a
//! shrinking share. Rounding to 8 bits after each step keeps the result
//! dependent on list order, never on completion order.

use std::borrow::Cow;

use futures_util::future::join_all;
use image::{imageops, RgbaImage};
use sr_scale::cpu::resample_rgba_to_vec;
use sr_scale::presets::{QualityMode, ResampleFilter};
use tracing::{debug, instrument, warn};

use super::tiled::{run_tiled, TileSettings};
use super::{image_from_raw, image_size, StageResult};
use crate::backend::{BackendDescriptor, InferenceBackend};
use crate::error::{UpscaleError, UpscaleResult};

/// Geometric transform applied before inference and undone after it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Augmentation {
    Identity,
    FlipHorizontal,
    FlipVertical,
    Rotate180,
}

impl Augmentation {
    /// All transforms, in the order quality modes take them.
    pub const ALL: [Augmentation; 4] = [
        Augmentation::Identity,
        Augmentation::FlipHorizontal,
        Augmentation::FlipVertical,
        Augmentation::Rotate180,
    ];

    /// Apply the transform. Identity borrows.
    pub fn apply(self, image: &RgbaImage) -> Cow<'_, RgbaImage> {
        match self {
            Augmentation::Identity => Cow::Borrowed(image),
            Augmentation::FlipHorizontal => Cow::Owned(imageops::flip_horizontal(image)),
            Augmentation::FlipVertical => Cow::Owned(imageops::flip_vertical(image)),
            Augmentation::Rotate180 => Cow::Owned(imageops::rotate180(image)),
        }
    }

    /// Undo the transform on an owned output.
    pub fn invert(self, image: RgbaImage) -> RgbaImage {
        match self {
            Augmentation::Identity => image,
            _ => self.apply(&image).into_owned(),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Augmentation::Identity => "identity",
            Augmentation::FlipHorizontal => "flip-h",
            Augmentation::FlipVertical => "flip-v",
            Augmentation::Rotate180 => "rot180",
        }
    }
}

/// Non-empty, duplicate-free, ordered list of augmentations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AugmentationSet(Vec<Augmentation>);

impl AugmentationSet {
    /// Build a set, dropping repeats. An empty input yields `[Identity]`.
    pub fn new(augmentations: impl IntoIterator<Item = Augmentation>) -> Self {
        let mut list: Vec<Augmentation> = Vec::new();
        for aug in augmentations {
            if !list.contains(&aug) {
                list.push(aug);
            }
        }
        if list.is_empty() {
            list.push(Augmentation::Identity);
        }
        Self(list)
    }

    /// Fast: identity. Balanced: + horizontal flip. Ultra: all four.
    pub fn for_quality(mode: QualityMode) -> Self {
        Self::new(Augmentation::ALL.into_iter().take(mode.augmentation_count()))
    }

    pub fn as_slice(&self) -> &[Augmentation] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Run `backend` once per augmentation and blend the inverted outputs.
///
/// The augmented runs execute concurrently. A run that fails is logged and left
/// out of the blend; the call fails only when every run fails.
#[instrument(skip_all, name = "augmentation_ensemble", fields(backend = %backend.name, runs = augmentations.len()))]
pub async fn run_with_augmentations(
    image: &RgbaImage,
    backend: &BackendDescriptor,
    augmentations: &AugmentationSet,
    infer: &dyn InferenceBackend,
    settings: &TileSettings,
) -> UpscaleResult<StageResult> {
    if let [only] = augmentations.as_slice() {
        return run_one(image, *only, backend, infer, settings).await;
    }

    let runs = augmentations
        .as_slice()
        .iter()
        .map(|&aug| run_one(image, aug, backend, infer, settings));
    let outcomes = join_all(runs).await;

    let mut results = Vec::with_capacity(outcomes.len());
    let mut first_error = None;
    for (aug, outcome) in augmentations.as_slice().iter().zip(outcomes) {
        match outcome {
            Ok(result) => results.push(result),
            Err(e) => {
                warn!(augmentation = aug.as_str(), error = %e, "augmented run failed");
                first_error.get_or_insert(e);
            }
        }
    }

    if results.is_empty() {
        return Err(first_error.unwrap_or_else(|| {
            UpscaleError::inference_failed(&backend.name, "no augmented run completed")
        }));
    }
    debug!(completed = results.len(), "blending augmented outputs");
    merge_progressive(results)
}

async fn run_one(
    image: &RgbaImage,
    aug: Augmentation,
    backend: &BackendDescriptor,
    infer: &dyn InferenceBackend,
    settings: &TileSettings,
) -> UpscaleResult<StageResult> {
    let input = aug.apply(image);
    let result = run_tiled(&input, backend, infer, settings).await?;
    Ok(StageResult {
        image: aug.invert(result.image),
        scale_x: result.scale_x,
        scale_y: result.scale_y,
    })
}

/// Average outputs into the first one's dimensions as a running mean.
///
/// This is a uniform mean, not a first-weighted blend: each output ends with a
/// `1 / n` share up to per-step rounding. Later outputs of a different size
/// are resampled to the composite first. The reported scale is the mean over
/// all outputs. Deterministic for equal input in equal order.
pub fn merge_progressive(results: Vec<StageResult>) -> UpscaleResult<StageResult> {
    let count = results.len();
    let mut iter = results.into_iter();
    let first = iter
        .next()
        .ok_or_else(|| UpscaleError::output_unproducible("augmentation merge", "no outputs to merge"))?;

    let size = image_size(&first.image);
    let mut scale_x = first.scale_x;
    let mut scale_y = first.scale_y;
    let mut composite = first.image.into_raw();

    for (k, next) in iter.enumerate() {
        let weight = 1.0 / (k as f64 + 2.0);
        scale_x += next.scale_x;
        scale_y += next.scale_y;

        let next_size = image_size(&next.image);
        let pixels = if next_size == size {
            next.image.into_raw()
        } else {
            resample_rgba_to_vec(next.image.as_raw(), next_size, size, ResampleFilter::Bilinear)?
        };
        for (c, n) in composite.iter_mut().zip(pixels.iter()) {
            let blended = *c as f64 * (1.0 - weight) + *n as f64 * weight;
            *c = blended.round().clamp(0.0, 255.0) as u8;
        }
    }

    Ok(StageResult {
        image: image_from_raw(size, composite, "augmentation merge")?,
        scale_x: scale_x / count as f64,
        scale_y: scale_y / count as f64,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use sr_scale::presets::Size;

    fn stage(w: u32, h: u32, value: u8, scale: f64) -> StageResult {
        StageResult {
            image: RgbaImage::from_pixel(w, h, image::Rgba([value, value, value, 255])),
            scale_x: scale,
            scale_y: scale,
        }
    }

    #[test]
    fn transforms_are_self_inverse() {
        let img = RgbaImage::from_fn(5, 3, |x, y| image::Rgba([x as u8, y as u8, 7, 255]));
        for aug in Augmentation::ALL {
            let once = aug.apply(&img).into_owned();
            assert_eq!(aug.invert(once), img, "{}", aug.as_str());
        }
    }

    #[test]
    fn sets_per_quality() {
        assert_eq!(AugmentationSet::for_quality(QualityMode::Fast).as_slice(), &[Augmentation::Identity]);
        assert_eq!(AugmentationSet::for_quality(QualityMode::Balanced).len(), 2);
        assert_eq!(AugmentationSet::for_quality(QualityMode::Ultra).len(), 4);
        let set = AugmentationSet::new([Augmentation::Rotate180, Augmentation::Rotate180]);
        assert_eq!(set.as_slice(), &[Augmentation::Rotate180]);
        assert_eq!(AugmentationSet::new([]).as_slice(), &[Augmentation::Identity]);
    }

    #[test]
    fn progressive_merge_is_equal_weight() {
        let merged = merge_progressive(vec![
            stage(4, 4, 0, 2.0),
            stage(4, 4, 90, 2.0),
            stage(4, 4, 180, 2.0),
        ])
        .unwrap();
        // 0 → 45 → round(45·2/3 + 180/3) = 90
        assert_eq!(merged.image.get_pixel(1, 1).0[0], 90);
        assert_eq!(merged.scale_x, 2.0);
    }

    #[test]
    fn merge_resamples_mismatched_output() {
        let merged = merge_progressive(vec![stage(8, 8, 100, 2.0), stage(9, 8, 100, 2.25)]).unwrap();
        assert_eq!(image_size(&merged.image), Size::new(8, 8));
        let value = merged.image.get_pixel(3, 3).0[0];
        assert!((99..=101).contains(&value), "{value}");
        assert!((merged.scale_x - 2.125).abs() < 1e-9);
    }

    #[test]
    fn merge_is_deterministic() {
        let make = || vec![stage(6, 6, 10, 2.0), stage(6, 6, 33, 2.0)];
        assert_eq!(merge_progressive(make()).unwrap().image, merge_progressive(make()).unwrap().image);
    }

    #[test]
    fn merge_needs_an_output() {
        assert!(merge_progressive(Vec::new()).is_err());
    }
}
