//! Integration tests for tiled inference and the augmentation ensemble
//!
//! These tests call the stage functions directly with deterministic stubs.

mod common;

use std::sync::atomic::Ordering;

use common::stubs::{CornerKeyedBackend, CountingBackend, FlakyBackend};
use common::test_images::pattern;
use hybrid_upscale::backend::{BackendDescriptor, InferenceBackend, NearestNeighborBackend};
use hybrid_upscale::config::EngineConfig;
use hybrid_upscale::processing::tiled::MIN_TILE_SIDE;
use hybrid_upscale::processing::{run_tiled, run_with_augmentations, Augmentation, AugmentationSet, TileSettings};
use sr_scale::presets::Size;

fn tiny_tiles() -> TileSettings {
    TileSettings {
        tile: Size::new(64, 64),
        overlap: 16,
        direct_limit: Size::new(0, 0),
        min_side: MIN_TILE_SIDE,
    }
}

async fn nearest(image: &image::RgbaImage, scale: f64) -> image::RgbaImage {
    NearestNeighborBackend
        .infer(image, &BackendDescriptor::new("reference", scale))
        .await
        .unwrap()
}

#[tokio::test]
async fn test_single_tile_output_is_unmodified() {
    let input = pattern(48, 48);
    let backend = NearestNeighborBackend::descriptor(4.0).with_tile_size(Size::new(48, 48));
    let out = run_tiled(&input, &backend, &NearestNeighborBackend, &tiny_tiles())
        .await
        .unwrap();

    assert_eq!(out.image, nearest(&input, 4.0).await);
    assert_eq!((out.scale_x, out.scale_y), (4.0, 4.0));
}

#[tokio::test]
async fn test_tiles_cover_every_pixel() {
    // Odd sizes against a fixed 32px tile exercise the clamped last origin.
    for (w, h) in [(33, 32), (95, 41), (129, 200), (32, 97)] {
        let input = pattern(w, h);
        let backend = BackendDescriptor::new("fixed-x2", 2.0).with_tile_size(Size::new(32, 32));
        let counting = CountingBackend::default();
        let out = run_tiled(&input, &backend, &counting, &tiny_tiles()).await.unwrap();

        assert_eq!(out.image.dimensions(), (w * 2, h * 2));
        assert_eq!(out.image, nearest(&input, 2.0).await, "{w}x{h}");
        assert!(counting.calls() >= 2);
    }
}

#[tokio::test]
async fn test_unconstrained_backend_floors_tile_side() {
    let settings = TileSettings {
        tile: Size::new(16, 16),
        overlap: 8,
        direct_limit: Size::new(0, 0),
        min_side: MIN_TILE_SIDE,
    };
    let backend = BackendDescriptor::new("esrgan-x2", 2.0);
    assert_eq!(settings.tile_for(Size::new(200, 50), &backend), Size::new(64, 50));

    let input = pattern(200, 50);
    let counting = CountingBackend::default();
    let out = run_tiled(&input, &backend, &counting, &settings).await.unwrap();
    assert_eq!(out.image, nearest(&input, 2.0).await);
    // 64px tiles with a 8px overlap over 200px: origins 0, 56, 112, 136
    assert_eq!(counting.calls(), 4);
}

#[tokio::test]
async fn test_direct_call_within_limit() {
    let input = pattern(300, 200);
    let counting = CountingBackend::default();
    let settings = TileSettings::neural(&EngineConfig::default());
    let out = run_tiled(&input, &BackendDescriptor::new("esrgan-x2", 2.0), &counting, &settings)
        .await
        .unwrap();

    assert_eq!(counting.calls(), 1);
    assert_eq!(out.image.dimensions(), (600, 400));
}

#[tokio::test]
async fn test_restorer_direct_output_accepted_at_same_size() {
    let input = pattern(100, 60);
    let counting = CountingBackend::default();
    let settings = TileSettings::neural(&EngineConfig::default());
    let out = run_tiled(&input, &BackendDescriptor::new("scunet", 1.0), &counting, &settings)
        .await
        .unwrap();

    assert_eq!(counting.calls(), 1);
    assert_eq!(out.image, input);
}

#[tokio::test]
async fn test_augmented_outputs_are_realigned() {
    let input = pattern(37, 23);
    let backend = NearestNeighborBackend::descriptor(2.0);
    let settings = TileSettings::neural(&EngineConfig::default());
    for aug in Augmentation::ALL {
        let set = AugmentationSet::new([aug]);
        let out = run_with_augmentations(&input, &backend, &set, &NearestNeighborBackend, &settings)
            .await
            .unwrap();
        assert_eq!(out.image, nearest(&input, 2.0).await, "{}", aug.as_str());
    }
}

#[tokio::test]
async fn test_partial_augmentation_failure_is_tolerated() {
    let input = pattern(32, 32);
    // fixed shape: exactly one backend call per augmented run
    let backend = BackendDescriptor::new("fixed-x2", 2.0).with_tile_size(Size::new(32, 32));
    let flaky = FlakyBackend::new(vec![1]);
    let set = AugmentationSet::for_quality(sr_scale::presets::QualityMode::Ultra);
    let out = run_with_augmentations(&input, &backend, &set, &flaky, &tiny_tiles())
        .await
        .unwrap();

    assert_eq!(flaky.calls.load(Ordering::SeqCst), 4);
    assert_eq!(out.image, nearest(&input, 2.0).await);
}

#[tokio::test]
async fn test_all_augmentations_failing_fails_stage() {
    let input = pattern(32, 32);
    let backend = BackendDescriptor::new("fixed-x2", 2.0).with_tile_size(Size::new(32, 32));
    let flaky = FlakyBackend::new(vec![0, 1]);
    let set = AugmentationSet::for_quality(sr_scale::presets::QualityMode::Balanced);
    let err = run_with_augmentations(&input, &backend, &set, &flaky, &tiny_tiles())
        .await
        .unwrap_err();

    assert_eq!(err.category(), "inference_failed");
}

#[tokio::test]
async fn test_merge_follows_list_order_not_completion_order() {
    // each augmentation moves a different corner to the origin
    let input = image::RgbaImage::from_fn(32, 32, |x, y| {
        let v = match (x, y) {
            (0, 0) => 200,
            (31, 0) => 120,
            (0, 31) => 61,
            (31, 31) => 0,
            _ => 10,
        };
        image::Rgba([v, v, v, 255])
    });
    let backend = BackendDescriptor::new("fixed-x2", 2.0).with_tile_size(Size::new(32, 32));
    let keyed = CornerKeyedBackend::default();
    let set = AugmentationSet::for_quality(sr_scale::presets::QualityMode::Ultra);
    let out = run_with_augmentations(&input, &backend, &set, &keyed, &tiny_tiles())
        .await
        .unwrap();

    // identity sleeps longest, so completion runs opposite to list order
    assert_eq!(*keyed.completed.lock().unwrap(), vec![0, 61, 120, 200]);

    // list order 200, 120, 61, 0 folds to 160, 127, 95; the reverse fold ends at 96
    assert_eq!(out.image.dimensions(), (64, 64));
    assert!(out.image.pixels().all(|p| p.0 == [95, 95, 95, 95]));
    assert_eq!((out.scale_x, out.scale_y), (2.0, 2.0));
}
