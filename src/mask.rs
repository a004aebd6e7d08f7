//! Builds the alpha plane of an RGBA output buffer from whichever of the
//! three masking conventions an image uses.
//!
//! A soft mask and a stencil mask both start life as an 8-bit gray buffer
//! (produced by a sub-image's
//! [`fill_gray_buffer`](crate::image::PdfImage::fill_gray_buffer)) that may
//! need resampling to the draw dimensions; a color-key mask instead tests
//! each pixel's raw, pre-decode samples against per-component ranges. All
//! three write into the same `rgba[4i+3]` alpha byte.

use crate::bits::SampleBuffer;

/// Resample an 8-bit single-channel buffer from `(sw, sh)` to `(dw, dh)`
/// with nearest-neighbor sampling: `alpha_dst(i,j) =
/// alpha_src(floor(j*sw/dw), floor(i*sh/dh))`.
///
/// Returns `src` unchanged (well, cloned) when the dimensions already
/// match.
pub fn resize_alpha_nearest(src: &[u8], sw: u32, sh: u32, dw: u32, dh: u32) -> Vec<u8> {
    if (sw, sh) == (dw, dh) {
        return src.to_vec();
    }

    let mut out = vec![0u8; dw as usize * dh as usize];
    for y in 0..dh {
        let sy = (y as u64 * sh as u64 / dh as u64) as u32;
        for x in 0..dw {
            let sx = (x as u64 * sw as u64 / dw as u64) as u32;
            out[(y as usize * dw as usize) + x as usize] =
                src[(sy as usize * sw as usize) + sx as usize];
        }
    }
    out
}

/// Write a soft-mask- or stencil-mask-derived gray buffer into `rgba`'s
/// alpha channel, resampling first if `(gw, gh) != (w, h)`.
///
/// `invert` is set for stencil masks, whose alpha is `255 - a` before any
/// resize is applied.
pub fn write_alpha_plane(
    rgba: &mut [u8],
    w: u32,
    h: u32,
    gray: &[u8],
    gw: u32,
    gh: u32,
    invert: bool,
) {
    let inverted;
    let gray = if invert {
        inverted = gray.iter().map(|&a| 255 - a).collect::<Vec<_>>();
        &inverted
    } else {
        gray
    };

    let resized = resize_alpha_nearest(gray, gw, gh, w, h);
    for (i, &a) in resized.iter().enumerate() {
        rgba[i * 4 + 3] = a;
    }
}

/// Apply a color-key mask: opacity 255 (visible) when any component falls
/// outside its `[min, max]` range, 0 (transparent) otherwise.
///
/// Evaluated on pre-decode samples, since altering the `Decode` array must
/// not change which pixels become transparent — callers must invoke this
/// before [`crate::decode::apply_decode`].
pub fn apply_color_key_mask(
    rgba: &mut [u8],
    width: u32,
    actual_height: u32,
    samples: &SampleBuffer,
    num_components: u8,
    key: &[(f32, f32)],
) {
    let nc = num_components as usize;
    let pixel_count = width as usize * actual_height as usize;

    for i in 0..pixel_count {
        let mut visible = false;
        for j in 0..nc {
            let v = samples.get_f32(i * nc + j);
            let (min, max) = key[j];
            if v < min || v > max {
                visible = true;
                break;
            }
        }
        rgba[i * 4 + 3] = if visible { 255 } else { 0 };
    }
}
