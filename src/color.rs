//! The color space collaborator: converts component buffers to RGB. This
//! crate only calls through the [`ColorSpace`] trait; ICC profiles,
//! CalRGB/CalGray, Lab, Separation/DeviceN tint transforms, and indexed
//! palettes are all implemented by whoever provides one.

/// A color space that can turn raw component samples into RGB.
///
/// Mirrors the four device color spaces' worth of surface a document layer
/// needs: `numComps`, `name`, `isDefaultDecode`, `getRgb`, `fillRgb`.
pub trait ColorSpace: Send + Sync {
    /// Number of components per pixel this color space expects.
    fn num_components(&self) -> u8;

    /// The color space's name, for diagnostics.
    fn name(&self) -> &'static str;

    /// Whether `decode` is this color space's identity decode array for
    /// `bits_per_component`, i.e. `[0,1]` repeated `num_components()` times
    /// for every space except `Lab` and `Indexed`.
    fn is_default_decode(&self, decode: &[(f32, f32)], bits_per_component: u8) -> bool {
        let _ = bits_per_component;
        decode
            .iter()
            .all(|&(min, max)| min == 0.0 && max == 1.0)
    }

    /// Convert one pixel's raw (but already decode-transformed) components
    /// to 8-bit RGB, used by [`crate::matte::undo_preblend`] to transform a
    /// `Matte` color once before undoing premultiplication.
    fn get_rgb(&self, components: &[f32]) -> [u8; 3];

    /// Convert `src_width * src_height` pixels of `num_components()`-wide
    /// `f32` samples in `src` into the `(dst_width, dst_height)` RGB or
    /// RGBA buffer `dst`, resampling with nearest-neighbor when the source
    /// and destination dimensions differ, and respecting a stride of 4
    /// bytes per pixel (RGB + alpha already in `dst`) when `has_alpha` is
    /// set, or 3 bytes per pixel otherwise.
    ///
    /// Only `actual_height` rows of `src` are valid; rows beyond it must
    /// be treated as absent.
    fn fill_rgb(
        &self,
        dst: &mut [u8],
        src_width: u32,
        src_height: u32,
        dst_width: u32,
        dst_height: u32,
        actual_height: u32,
        src: &[f32],
        has_alpha: bool,
    );
}

/// A 1-component grayscale color space, usable as a default and in tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeviceGray;

impl ColorSpace for DeviceGray {
    fn num_components(&self) -> u8 {
        1
    }

    fn name(&self) -> &'static str {
        "DeviceGray"
    }

    fn get_rgb(&self, components: &[f32]) -> [u8; 3] {
        let v = to_u8(components[0]);
        [v, v, v]
    }

    fn fill_rgb(
        &self,
        dst: &mut [u8],
        src_width: u32,
        src_height: u32,
        dst_width: u32,
        dst_height: u32,
        actual_height: u32,
        src: &[f32],
        has_alpha: bool,
    ) {
        fill_rgb_nearest(
            dst,
            src_width,
            src_height,
            dst_width,
            dst_height,
            actual_height,
            src,
            has_alpha,
            1,
            |c| {
                let v = to_u8(c[0]);
                [v, v, v]
            },
        );
    }
}

/// A 3-component RGB color space, usable as a default and in tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeviceRgb;

impl ColorSpace for DeviceRgb {
    fn num_components(&self) -> u8 {
        3
    }

    fn name(&self) -> &'static str {
        "DeviceRGB"
    }

    fn get_rgb(&self, components: &[f32]) -> [u8; 3] {
        [
            to_u8(components[0]),
            to_u8(components[1]),
            to_u8(components[2]),
        ]
    }

    fn fill_rgb(
        &self,
        dst: &mut [u8],
        src_width: u32,
        src_height: u32,
        dst_width: u32,
        dst_height: u32,
        actual_height: u32,
        src: &[f32],
        has_alpha: bool,
    ) {
        fill_rgb_nearest(
            dst,
            src_width,
            src_height,
            dst_width,
            dst_height,
            actual_height,
            src,
            has_alpha,
            3,
            |c| [to_u8(c[0]), to_u8(c[1]), to_u8(c[2])],
        );
    }
}

/// A 4-component CMYK color space, usable as a default and in tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeviceCmyk;

impl ColorSpace for DeviceCmyk {
    fn num_components(&self) -> u8 {
        4
    }

    fn name(&self) -> &'static str {
        "DeviceCMYK"
    }

    fn get_rgb(&self, components: &[f32]) -> [u8; 3] {
        cmyk_to_rgb(components)
    }

    fn fill_rgb(
        &self,
        dst: &mut [u8],
        src_width: u32,
        src_height: u32,
        dst_width: u32,
        dst_height: u32,
        actual_height: u32,
        src: &[f32],
        has_alpha: bool,
    ) {
        fill_rgb_nearest(
            dst,
            src_width,
            src_height,
            dst_width,
            dst_height,
            actual_height,
            src,
            has_alpha,
            4,
            cmyk_to_rgb,
        );
    }
}

fn cmyk_to_rgb(c: &[f32]) -> [u8; 3] {
    [
        to_u8((1.0 - c[0]) * (1.0 - c[3])),
        to_u8((1.0 - c[1]) * (1.0 - c[3])),
        to_u8((1.0 - c[2]) * (1.0 - c[3])),
    ]
}

fn to_u8(v: f32) -> u8 {
    (v.clamp(0.0, 1.0) * 255.0 + 0.5) as u8
}

/// Shared nearest-neighbor resampling loop behind every built-in color
/// space's `fill_rgb`.
#[allow(clippy::too_many_arguments)]
fn fill_rgb_nearest(
    dst: &mut [u8],
    src_width: u32,
    src_height: u32,
    dst_width: u32,
    dst_height: u32,
    actual_height: u32,
    src: &[f32],
    has_alpha: bool,
    nc: usize,
    to_rgb: impl Fn(&[f32]) -> [u8; 3],
) {
    let stride = if has_alpha { 4 } else { 3 };

    for y in 0..dst_height {
        let sy = ((y as u64 * src_height as u64) / dst_height as u64) as u32;
        if sy >= actual_height {
            break;
        }

        for x in 0..dst_width {
            let sx = ((x as u64 * src_width as u64) / dst_width as u64) as u32;
            let src_idx = (sy as usize * src_width as usize + sx as usize) * nc;
            let rgb = to_rgb(&src[src_idx..src_idx + nc]);

            let dst_idx = (y as usize * dst_width as usize + x as usize) * stride;
            dst[dst_idx] = rgb[0];
            dst[dst_idx + 1] = rgb[1];
            dst[dst_idx + 2] = rgb[2];
        }
    }
}
