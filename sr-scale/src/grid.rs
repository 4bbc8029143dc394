// SPDX-License-Identifier: MIT
//! # Overlapping Tile Grids
//!
//! Backends with a fixed input shape, or a practical memory ceiling, cannot take a
//! whole image at once. This module plans how an image is cut into overlapping
//! tiles and how much of each tile survives stitching.
//!
//! ## Grid Rules
//!
//! Origins along one axis are produced by walking forward by `step = tile - overlap`
//! while the origin is still short of `total - tile`, then forcing one final tile
//! flush with the far edge:
//!
//! ```text
//! total = 10, tile = 4, overlap = 1  →  step = 3
//! origins: 0, 3, 6   (6 == 10 - 4, flush right)
//! ```
//!
//! Consecutive origins never skip pixels (`step ≤ tile`) and are strictly
//! increasing. When the tile is at least as large as the axis a single origin `0`
//! is produced.
//!
//! ## Seam Trimming
//!
//! After inference every tile gives up `overlap / 2` pixels on each edge that
//! borders another tile. Edges on the canvas boundary are kept whole, so a
//! single-tile grid keeps the backend output untouched.

use crate::presets::Size;

/// Rectangle definition in source pixel coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
}

impl Rect {
    pub fn right(&self) -> u32 {
        self.x + self.w
    }

    pub fn bottom(&self) -> u32 {
        self.y + self.h
    }
}

/// Pixels removed from each side of a tile before compositing.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Insets {
    pub left: u32,
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
}

/// Clamp a backend family's overlap to at most a quarter of the smaller tile side.
pub fn effective_overlap(base: u32, tile: Size) -> u32 {
    base.min(tile.w.min(tile.h) / 4)
}

/// Tile origins along one axis.
///
/// `step` is clamped into `[1, tile]`. The last origin is always
/// `total.saturating_sub(tile)`.
pub fn tile_origins(total: u32, tile: u32, step: u32) -> Vec<u32> {
    let tile = tile.max(1);
    let step = step.clamp(1, tile);
    if tile >= total {
        return vec![0];
    }

    let last = total - tile;
    let mut origins = Vec::with_capacity((last / step) as usize + 2);
    let mut origin = 0;
    while origin < last {
        origins.push(origin);
        origin += step;
    }
    origins.push(last);
    origins
}

/// Planned tiling of one canvas.
#[derive(Clone, Debug)]
pub struct TileGrid {
    pub canvas: Size,
    pub tile: Size,
    pub overlap: u32,
    pub xs: Vec<u32>,
    pub ys: Vec<u32>,
}

impl TileGrid {
    /// Plan a grid over `canvas` with tiles of `tile` and the given overlap.
    ///
    /// The canvas must be at least one tile in each dimension; callers pad the
    /// source by edge extension first when it is smaller.
    pub fn new(canvas: Size, tile: Size, overlap: u32) -> Self {
        let step_x = tile.w.saturating_sub(overlap).max(1);
        let step_y = tile.h.saturating_sub(overlap).max(1);
        Self {
            canvas,
            tile,
            overlap,
            xs: tile_origins(canvas.w, tile.w, step_x),
            ys: tile_origins(canvas.h, tile.h, step_y),
        }
    }

    pub fn len(&self) -> usize {
        self.xs.len() * self.ys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Tile rectangles in raster order (rows top to bottom, left to right).
    pub fn rects(&self) -> Vec<Rect> {
        let mut rects = Vec::with_capacity(self.len());
        for &y in &self.ys {
            for &x in &self.xs {
                rects.push(Rect {
                    x,
                    y,
                    w: self.tile.w.min(self.canvas.w - x),
                    h: self.tile.h.min(self.canvas.h - y),
                });
            }
        }
        rects
    }

    /// Seam trim for one tile: half the overlap on each interior edge.
    pub fn trim(&self, rect: Rect) -> Insets {
        let half = self.overlap / 2;
        Insets {
            left: if rect.x > 0 { half } else { 0 },
            top: if rect.y > 0 { half } else { 0 },
            right: if rect.right() < self.canvas.w { half } else { 0 },
            bottom: if rect.bottom() < self.canvas.h { half } else { 0 },
        }
    }

    /// Region of `rect` kept after trimming, in source coordinates.
    pub fn kept(&self, rect: Rect) -> Rect {
        let t = self.trim(rect);
        Rect {
            x: rect.x + t.left,
            y: rect.y + t.top,
            w: rect.w.saturating_sub(t.left + t.right).max(1),
            h: rect.h.saturating_sub(t.top + t.bottom).max(1),
        }
    }
}
