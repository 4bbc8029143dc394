// SPDX-License-Identifier: MIT
// CPU resampler built on fast_image_resize (SIMD-accelerated).
// RGBA8 in → RGBA8 out, tightly packed rows, direct write into caller-provided dst buffer.

use fast_image_resize as fir;
use fir::images::{TypedImage, TypedImageRef};
use fir::pixels::U8x4;
use fir::{ResizeAlg, ResizeOptions, Resizer};

use crate::grid::Rect;
use crate::presets::{ResampleFilter, Size};

#[derive(Debug)]
pub enum ScaleError {
    BufferTooSmall { need: usize, have: usize },
    EmptyImage,
    Fir(fir::ResizeError),
    ImageBuf(fir::ImageBufferError),
}

impl From<fir::ResizeError> for ScaleError { fn from(e: fir::ResizeError) -> Self { Self::Fir(e) } }
impl From<fir::ImageBufferError> for ScaleError { fn from(e: fir::ImageBufferError) -> Self { Self::ImageBuf(e) } }

impl std::fmt::Display for ScaleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScaleError::BufferTooSmall { need, have } => {
                write!(f, "Buffer too small: need {} bytes, have {}", need, have)
            }
            ScaleError::EmptyImage => write!(f, "Image has a zero dimension"),
            ScaleError::Fir(e) => write!(f, "Fast image resize error: {}", e),
            ScaleError::ImageBuf(e) => write!(f, "Image buffer error: {}", e),
        }
    }
}

impl std::error::Error for ScaleError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ScaleError::Fir(e) => Some(e),
            ScaleError::ImageBuf(e) => Some(e),
            _ => None,
        }
    }
}

/// Bytes needed for a tightly packed RGBA8 image of `size`.
#[inline]
pub fn rgba_len(size: Size) -> usize {
    (size.w as usize) * (size.h as usize) * 4
}

fn check_len(buf_len: usize, size: Size) -> Result<(), ScaleError> {
    if !size.is_valid() {
        return Err(ScaleError::EmptyImage);
    }
    let need = rgba_len(size);
    if buf_len < need {
        return Err(ScaleError::BufferTooSmall { need, have: buf_len });
    }
    Ok(())
}

/// Resample `src` (tightly packed RGBA8 of `src_size`) into `dst` of `dst_size`.
///
/// Scale factors are implied by the two sizes and may differ per axis.
/// `dst` must hold at least `dst_size.w * dst_size.h * 4` bytes.
pub fn resample_rgba(
    resizer: &mut Resizer,
    src: &[u8],
    src_size: Size,
    dst: &mut [u8],
    dst_size: Size,
    filter: ResampleFilter,
) -> Result<(), ScaleError> {
    check_len(src.len(), src_size)?;
    check_len(dst.len(), dst_size)?;

    let dst_len = rgba_len(dst_size);
    if src_size == dst_size {
        dst[..dst_len].copy_from_slice(&src[..dst_len]);
        return Ok(());
    }

    let src_view = TypedImageRef::<U8x4>::from_buffer(src_size.w, src_size.h, &src[..rgba_len(src_size)])?;
    let mut dst_image = TypedImage::<U8x4>::from_buffer(dst_size.w, dst_size.h, &mut dst[..dst_len])?;

    let alg = match filter {
        ResampleFilter::Nearest => ResizeAlg::Nearest,
        ResampleFilter::Bilinear => ResizeAlg::Convolution(fir::FilterType::Bilinear),
        ResampleFilter::Lanczos3 => ResizeAlg::Convolution(fir::FilterType::Lanczos3),
    };
    let opts = ResizeOptions::new().resize_alg(alg).use_alpha(false);
    resizer.resize_typed::<U8x4>(&src_view, &mut dst_image, &opts)?;
    Ok(())
}

/// Allocating convenience wrapper around [`resample_rgba`].
pub fn resample_rgba_to_vec(
    src: &[u8],
    src_size: Size,
    dst_size: Size,
    filter: ResampleFilter,
) -> Result<Vec<u8>, ScaleError> {
    let mut dst = vec![0u8; rgba_len(dst_size)];
    let mut resizer = Resizer::new();
    resample_rgba(&mut resizer, src, src_size, &mut dst, dst_size, filter)?;
    Ok(dst)
}

/// Grow `src` to `canvas` by repeating the last column and row (clamp-to-edge).
///
/// The source occupies the top-left corner of the result. `canvas` must be at
/// least as large as `src_size` on both axes.
pub fn extend_edges(src: &[u8], src_size: Size, canvas: Size) -> Result<Vec<u8>, ScaleError> {
    check_len(src.len(), src_size)?;
    let canvas = canvas.max(src_size);
    if canvas == src_size {
        return Ok(src[..rgba_len(src_size)].to_vec());
    }

    let src_row = (src_size.w as usize) * 4;
    let dst_row = (canvas.w as usize) * 4;
    let mut out = vec![0u8; rgba_len(canvas)];
    for y in 0..canvas.h as usize {
        let sy = y.min(src_size.h as usize - 1);
        let s = &src[sy * src_row..(sy + 1) * src_row];
        let d = &mut out[y * dst_row..(y + 1) * dst_row];
        d[..src_row].copy_from_slice(s);
        let edge = &s[src_row - 4..];
        for px in d[src_row..].chunks_exact_mut(4) {
            px.copy_from_slice(edge);
        }
    }
    Ok(out)
}

/// Copy the `roi` region of a tightly packed RGBA8 image into a new packed buffer.
pub fn crop_rgba(src: &[u8], src_size: Size, roi: Rect) -> Result<Vec<u8>, ScaleError> {
    check_len(src.len(), src_size)?;
    if roi.w == 0 || roi.h == 0 || roi.right() > src_size.w || roi.bottom() > src_size.h {
        return Err(ScaleError::EmptyImage);
    }

    let src_pitch = (src_size.w as usize) * 4;
    let row_bytes = (roi.w as usize) * 4;
    let mut out = vec![0u8; row_bytes * roi.h as usize];
    for r in 0..roi.h as usize {
        let row_off = (roi.y as usize + r) * src_pitch + (roi.x as usize) * 4;
        out[r * row_bytes..(r + 1) * row_bytes].copy_from_slice(&src[row_off..row_off + row_bytes]);
    }
    Ok(out)
}

/// Copy the `roi` region of `src` into `dst` with its top-left at `(dx, dy)`.
///
/// The copied block is clipped to `dst`; pixels already in `dst` are overwritten.
pub fn blit_rgba(
    src: &[u8],
    src_size: Size,
    roi: Rect,
    dst: &mut [u8],
    dst_size: Size,
    dx: u32,
    dy: u32,
) -> Result<(), ScaleError> {
    check_len(src.len(), src_size)?;
    check_len(dst.len(), dst_size)?;
    if roi.right() > src_size.w || roi.bottom() > src_size.h {
        return Err(ScaleError::EmptyImage);
    }
    let w = roi.w.min(dst_size.w.saturating_sub(dx)) as usize;
    let h = roi.h.min(dst_size.h.saturating_sub(dy)) as usize;
    if w == 0 || h == 0 {
        return Ok(());
    }

    let src_pitch = (src_size.w as usize) * 4;
    let dst_pitch = (dst_size.w as usize) * 4;
    for r in 0..h {
        let s = (roi.y as usize + r) * src_pitch + (roi.x as usize) * 4;
        let d = (dy as usize + r) * dst_pitch + (dx as usize) * 4;
        dst[d..d + w * 4].copy_from_slice(&src[s..s + w * 4]);
    }
    Ok(())
}
