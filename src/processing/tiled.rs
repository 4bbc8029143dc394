//! # Tiled Inference
//!
//! Runs one backend over an image of any size by cutting it into overlapping
//! tiles, inferring each tile and stitching the trimmed outputs.
//!
//! ## Flow
//!
//! 1. A size-unconstrained backend gets the whole image in one call when it fits
//!    under the direct limit. The output is kept if it grew (upscaler) or did not
//!    shrink (restorer); otherwise tiling takes over.
//! 2. The source is padded by edge extension to at least one tile per axis.
//! 3. Tiles run in raster order. The first output fixes the measured per-axis
//!    scale; later outputs of a different size are resampled to match.
//! 4. Each tile drops `overlap / 2` on interior edges and lands at its origin
//!    times the measured scale. Later tiles overwrite earlier ones.
//! 5. The composite is cropped back to the unpadded region.
//!
//! Tiles are inferred sequentially so only one tile's backend buffers are live
//! at a time.

use image::RgbaImage;
use sr_scale::cpu::{blit_rgba, crop_rgba, extend_edges, resample_rgba_to_vec, rgba_len};
use sr_scale::grid::{effective_overlap, Rect, TileGrid};
use sr_scale::presets::{ResampleFilter, Size};
use tracing::{debug, instrument, trace};

use super::{image_from_raw, image_size, StageResult};
use crate::backend::{BackendDescriptor, InferenceBackend};
use crate::config::EngineConfig;
use crate::error::{UpscaleError, UpscaleResult};

/// Smallest tile side used for size-unconstrained neural backends.
pub const MIN_TILE_SIDE: u32 = 64;

/// Tiling parameters for one backend family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileSettings {
    /// Default tile for size-unconstrained backends.
    pub tile: Size,
    /// Overlap before clamping to a quarter tile.
    pub overlap: u32,
    /// Largest input submitted whole to a size-unconstrained backend.
    pub direct_limit: Size,
    /// Floor applied to each side of the default tile.
    pub min_side: u32,
}

impl TileSettings {
    pub fn neural(config: &EngineConfig) -> Self {
        Self {
            tile: Size::new(config.neural_tile, config.neural_tile),
            overlap: config.neural_overlap,
            direct_limit: Size::new(config.direct_limit, config.direct_limit),
            min_side: MIN_TILE_SIDE,
        }
    }

    /// Hardware scalers tile at their maximum input size, however small.
    pub fn hardware(config: &EngineConfig, max_input: Size) -> Self {
        Self {
            tile: max_input,
            overlap: config.hardware_overlap,
            direct_limit: max_input,
            min_side: 1,
        }
    }

    fn fits_directly(&self, size: Size) -> bool {
        size.w <= self.direct_limit.w && size.h <= self.direct_limit.h
    }

    /// Tile used for `input`: the backend's fixed shape, otherwise the default
    /// tile floored at `min_side` and never larger than the input.
    pub fn tile_for(&self, input: Size, backend: &BackendDescriptor) -> Size {
        match backend.preferred_tile_size {
            Some(fixed) => fixed,
            None => Size::new(
                input.w.min(self.tile.w.max(self.min_side)),
                input.h.min(self.tile.h.max(self.min_side)),
            ),
        }
    }
}

/// Run `backend` over `image`, tiling as needed.
///
/// Returns the stitched output with its measured per-axis scale. Any backend
/// failure on any tile fails the whole call; no partial image is returned.
#[instrument(skip_all, name = "tiled_inference", fields(backend = %backend.name))]
pub async fn run_tiled(
    image: &RgbaImage,
    backend: &BackendDescriptor,
    infer: &dyn InferenceBackend,
    settings: &TileSettings,
) -> UpscaleResult<StageResult> {
    let input = image_size(image);
    if !input.is_valid() {
        return Err(UpscaleError::geometry_invalid(
            "tile input",
            "both sides must be at least 1px",
            input.to_string(),
        ));
    }

    if !backend.is_fixed_shape() && settings.fits_directly(input) {
        match infer.infer(image, backend).await {
            Ok(out) if accepts_direct(input, image_size(&out), backend) => {
                debug!(input = %input, output = %image_size(&out), "direct inference accepted");
                return Ok(StageResult::measure(input, out));
            }
            Ok(out) => {
                debug!(output = %image_size(&out), "direct output rejected, tiling instead");
            }
            Err(e) => {
                debug!(error = %e, "direct inference failed, tiling instead");
            }
        }
    }

    let tile = settings.tile_for(input, backend);
    if !tile.is_valid() {
        return Err(UpscaleError::geometry_invalid(
            "tile size",
            "both sides must be at least 1px",
            tile.to_string(),
        ));
    }
    let canvas = input.max(tile);
    let grid = TileGrid::new(canvas, tile, effective_overlap(settings.overlap, tile));
    let padded = extend_edges(image.as_raw(), input, canvas)?;
    let rects = grid.rects();
    debug!(tiles = rects.len(), tile = %tile, canvas = %canvas, overlap = grid.overlap, "tiling");

    let mut stitch: Option<Stitch> = None;
    for (index, rect) in rects.iter().copied().enumerate() {
        let tile_size = Size::new(rect.w, rect.h);
        let tile_image = image_from_raw(tile_size, crop_rgba(&padded, canvas, rect)?, "tile extraction")?;
        let out = infer.infer(&tile_image, backend).await.map_err(|e| {
            UpscaleError::inference_failed(&backend.name, e.to_string())
                .with_operation(format!("tile {}/{}", index + 1, rects.len()))
        })?;

        let out_size = image_size(&out);
        if !out_size.is_valid() {
            return Err(UpscaleError::inference_failed(&backend.name, "backend returned an empty tile"));
        }
        trace!(index, rect = ?rect, output = %out_size, "tile inferred");

        stitch
            .get_or_insert_with(|| Stitch::new(canvas, tile_size, out_size))
            .place(&grid, rect, out, &backend.name)?;
    }

    stitch
        .ok_or_else(|| UpscaleError::inference_failed(&backend.name, "tile grid was empty"))?
        .finish(input)
}

/// Acceptance rule for a whole-image call.
fn accepts_direct(input: Size, output: Size, backend: &BackendDescriptor) -> bool {
    if backend.is_unit_scale() {
        output.w >= input.w && output.h >= input.h
    } else {
        output.w > input.w && output.h > input.h
    }
}

/// Output canvas being assembled from tiles.
struct Stitch {
    scale_x: f64,
    scale_y: f64,
    size: Size,
    data: Vec<u8>,
}

impl Stitch {
    fn new(canvas: Size, first_tile: Size, first_out: Size) -> Self {
        let scale_x = first_out.w as f64 / first_tile.w as f64;
        let scale_y = first_out.h as f64 / first_tile.h as f64;
        let size = canvas.scaled(scale_x, scale_y);
        Self {
            scale_x,
            scale_y,
            size,
            data: vec![0u8; rgba_len(size)],
        }
    }

    fn map_x(&self, x: u32) -> u32 {
        ((x as f64 * self.scale_x).round() as u32).min(self.size.w)
    }

    fn map_y(&self, y: u32) -> u32 {
        ((y as f64 * self.scale_y).round() as u32).min(self.size.h)
    }

    fn place(&mut self, grid: &TileGrid, rect: Rect, out: RgbaImage, backend: &str) -> UpscaleResult<()> {
        let expected = Size::new(
            self.map_x(rect.right()) - self.map_x(rect.x),
            self.map_y(rect.bottom()) - self.map_y(rect.y),
        );
        let out_size = image_size(&out);
        let (pixels, pixels_size) = if out_size == expected || !expected.is_valid() {
            (out.into_raw(), out_size)
        } else {
            debug!(output = %out_size, expected = %expected, "resampling mismatched tile");
            let resampled = resample_rgba_to_vec(out.as_raw(), out_size, expected, ResampleFilter::Bilinear)
                .map_err(|e| UpscaleError::inference_failed(backend, e.to_string()))?;
            (resampled, expected)
        };

        let kept = grid.kept(rect);
        let (dx0, dx1) = (self.map_x(kept.x), self.map_x(kept.right()));
        let (dy0, dy1) = (self.map_y(kept.y), self.map_y(kept.bottom()));
        if dx1 <= dx0 || dy1 <= dy0 {
            return Ok(());
        }
        let src_x = dx0 - self.map_x(rect.x);
        let src_y = dy0 - self.map_y(rect.y);
        if src_x >= pixels_size.w || src_y >= pixels_size.h {
            return Ok(());
        }
        let roi = Rect {
            x: src_x,
            y: src_y,
            w: (dx1 - dx0).min(pixels_size.w - src_x),
            h: (dy1 - dy0).min(pixels_size.h - src_y),
        };
        blit_rgba(&pixels, pixels_size, roi, &mut self.data, self.size, dx0, dy0)?;
        Ok(())
    }

    fn finish(self, input: Size) -> UpscaleResult<StageResult> {
        let wanted = Size::new(self.map_x(input.w).max(1), self.map_y(input.h).max(1));
        let data = if wanted == self.size {
            self.data
        } else {
            crop_rgba(&self.data, self.size, Rect { x: 0, y: 0, w: wanted.w, h: wanted.h })?
        };
        let image = image_from_raw(wanted, data, "tile stitching")?;
        Ok(StageResult::measure(input, image))
    }
}
