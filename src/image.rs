//! The image object and its factory: parses the
//! image dictionary, resolves auxiliary mask/soft-mask streams as
//! recursive sub-images, selects a fast path when one applies, and
//! orchestrates the bit unpacker, decode transform, mask engine, matte
//! undo, and downscaler to emit an output descriptor.

use crate::bits::{unpack_samples, SampleBuffer};
use crate::color::{ColorSpace, DeviceGray};
use crate::decode::{apply_decode, decode_coefficients, max_value};
use crate::dict::{keys, Dict};
use crate::downscale::{
    downscale_bilevel, downscale_gray_bytewise, scale_bits, shall_resize_image, DownscaleConfig,
};
use crate::error::{FormatError, ImageError, ImageWarning, Result};
use crate::mask::{apply_color_key_mask, write_alpha_plane};
use crate::matte::undo_preblend;
use crate::stream::{DecodeHints, EncodedStream, NativeDecoder, StreamBytes};
use smallvec::SmallVec;
use std::sync::{Arc, Mutex};

const FALLBACK_GRAY: DeviceGray = DeviceGray;

/// A caller-installed callback for non-fatal anomalies.
///
/// The analogue of `hayro_interpret::InterpreterSettings::warning_sink`.
pub type WarningSink = Arc<dyn Fn(ImageWarning) + Send + Sync>;

/// How an image's alpha channel is produced, if at all.
pub enum AlphaSource<'a> {
    /// No masking; alpha is 255 everywhere.
    None,
    /// An `SMask` full-resolution 8-bit alpha sub-image.
    SoftMask(Box<PdfImage<'a>>),
    /// A stencil `Mask` sub-image; alpha is inverted before use.
    Stencil(Box<PdfImage<'a>>),
    /// A `Mask` color-key range, `(min, max)` per component.
    ColorKey(SmallVec<[(f32, f32); 4]>),
    /// `SMaskInData`: the primary JPX codestream already decoded its own
    /// alpha channel alongside the color channels.
    InData,
}

impl AlphaSource<'_> {
    fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    fn sub_image_dims(&self) -> Option<(u32, u32)> {
        match self {
            Self::SoftMask(img) | Self::Stencil(img) => Some((img.width, img.height)),
            _ => None,
        }
    }
}

/// One decoded image, ready to be turned into pixels exactly once.
pub struct PdfImage<'a> {
    stream: Box<dyn EncodedStream + 'a>,
    width: u32,
    height: u32,
    bits_per_component: u8,
    num_components: u8,
    /// Absent for stencil masks.
    color_space: Option<Arc<dyn ColorSpace>>,
    image_mask: bool,
    interpolate: bool,
    needs_decode: bool,
    addends: Vec<f32>,
    coefficients: Vec<f32>,
    alpha_source: AlphaSource<'a>,
    /// Inherited from the `SMask`'s own dictionary.
    matte: Option<SmallVec<[f32; 4]>>,
    warning_sink: Option<WarningSink>,
}

/// One of the three output buffer layouts this crate can emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputKind {
    /// Packed MSB-first bits, row-aligned to whole bytes.
    Grayscale1Bpp,
    /// Interleaved R, G, B, tightly packed.
    Rgb24Bpp,
    /// Interleaved R, G, B, A, tightly packed.
    Rgba32Bpp,
}

/// The buffer a decode produces, ready to hand to a renderer.
#[derive(Debug, Clone)]
pub struct ImageData {
    /// Which of the three layouts `data` uses.
    pub kind: OutputKind,
    /// Buffer width in pixels.
    pub width: u32,
    /// Buffer height in pixels.
    pub height: u32,
    /// The pixel bytes, laid out according to `kind`.
    pub data: Vec<u8>,
}

fn row_bytes(width: u32, num_components: u8, bits_per_component: u8) -> usize {
    (width as usize * num_components as usize * bits_per_component as usize).div_ceil(8)
}

/// Build a [`PdfImage`] from its dictionary and raw stream, resolving any
/// `SMask`/`Mask` auxiliary streams it refers to.
///
/// The fan-in of up to three data-readiness steps is realized as three
/// independent, ordinary calls — native-decoding the primary stream, then
/// `SMask`, then `Mask` — since nothing in this crate's decode path is
/// actually asynchronous.
pub fn build_image<'a>(
    stream: Box<dyn EncodedStream + 'a>,
    dict: &Dict<'a>,
    native_decoder: Option<&dyn NativeDecoder>,
    warning_sink: Option<WarningSink>,
) -> Result<PdfImage<'a>> {
    let stream = native_decode(stream, native_decoder);
    let (alpha_source, matte) =
        resolve_alpha_source(dict, &stream, native_decoder, &warning_sink)?;

    PdfImage::new(stream, dict, alpha_source, matte, warning_sink, false)
}

fn native_decode<'a>(
    stream: Box<dyn EncodedStream + 'a>,
    native_decoder: Option<&dyn NativeDecoder>,
) -> Box<dyn EncodedStream + 'a> {
    match native_decoder {
        Some(decoder) if decoder.can_decode(stream.as_ref()) => {
            match decoder.decode(stream) {
                Ok(decoded) => decoded,
                Err(original) => original,
            }
        }
        _ => stream,
    }
}

/// Resolve this image's `SMask`/`Mask` entry into an [`AlphaSource`], plus
/// the `Matte` color the image inherits from its `SMask`'s own dictionary.
/// `Matte` lives on the soft mask's dictionary, not the primary image's,
/// and only applies when an `SMask` is actually present.
fn resolve_alpha_source<'a>(
    dict: &Dict<'a>,
    primary_stream: &dyn EncodedStream,
    native_decoder: Option<&dyn NativeDecoder>,
    warning_sink: &Option<WarningSink>,
) -> Result<(AlphaSource<'a>, Option<SmallVec<[f32; 4]>>)> {
    if let Some((smask_stream, smask_dict)) =
        dict.get::<(Arc<Mutex<dyn EncodedStream + 'a>>, Dict<'a>)>(keys::SMASK)
    {
        let matte = smask_dict
            .get::<SmallVec<[f32; 8]>>(keys::MATTE)
            .map(|v| v.into_iter().collect());

        let stream = native_decode(Box::new(ArcStream(smask_stream)), native_decoder);
        let sub = PdfImage::new(
            stream,
            &smask_dict,
            AlphaSource::None,
            None,
            warning_sink.clone(),
            true,
        )?;
        return Ok((AlphaSource::SoftMask(Box::new(sub)), matte));
    }

    if dict.get::<bool>(keys::SMASK_IN_DATA).unwrap_or(false)
        && primary_stream.metadata().num_components.is_some()
    {
        return Ok((AlphaSource::InData, None));
    }

    if let Some((mask_stream, mask_dict)) =
        dict.get::<(Arc<Mutex<dyn EncodedStream + 'a>>, Dict<'a>)>(keys::MASK)
    {
        if !mask_dict.get::<bool>(keys::IMAGE_MASK).unwrap_or(false)
            && !mask_dict.get::<bool>(keys::IM).unwrap_or(false)
        {
            warn(warning_sink, ImageWarning::MaskMissingImageMask);
            return Ok((AlphaSource::None, None));
        }

        let stream = native_decode(Box::new(ArcStream(mask_stream)), native_decoder);
        let sub = PdfImage::new(
            stream,
            &mask_dict,
            AlphaSource::None,
            None,
            warning_sink.clone(),
            true,
        )?;
        return Ok((AlphaSource::Stencil(Box::new(sub)), None));
    }

    if let Some(key) = dict.get::<SmallVec<[f32; 8]>>(keys::MASK) {
        let pairs = key.chunks_exact(2).map(|p| (p[0], p[1])).collect();
        return Ok((AlphaSource::ColorKey(pairs), None));
    }

    if dict.contains_key(keys::MASK) {
        warn(warning_sink, ImageWarning::MaskUnknownShape);
    }

    Ok((AlphaSource::None, None))
}

fn warn(sink: &Option<WarningSink>, warning: ImageWarning) {
    if let Some(sink) = sink {
        sink(warning.clone());
    }
    #[cfg(feature = "logging")]
    log::warn!("{warning}");
    #[cfg(not(feature = "logging"))]
    let _ = warning;
}

/// Adapts an `Arc<Mutex<dyn EncodedStream>>` (as stored in a [`Dict`]) into
/// an owned `Box<dyn EncodedStream>` so `SMask`/`Mask` sub-streams can be
/// native-decoded and consumed the same way the primary stream is.
///
/// The dictionary and this adapter both hold a strong reference to the same
/// stream, so `get_mut` on the `Arc` would never succeed; locking the
/// `Mutex` instead lets the sub-image drive the stream to completion
/// regardless of how many other references to it exist.
struct ArcStream<'a>(Arc<Mutex<dyn EncodedStream + 'a>>);

impl EncodedStream for ArcStream<'_> {
    fn reset(&mut self) {
        self.0.lock().unwrap().reset();
    }

    fn get_bytes(&mut self, n: usize) -> StreamBytes {
        self.0.lock().unwrap().get_bytes(n)
    }

    fn metadata(&self) -> crate::stream::StreamMetadata {
        self.0.lock().unwrap().metadata()
    }

    fn hints(&self) -> DecodeHints {
        self.0.lock().unwrap().hints()
    }

    fn set_hints(&mut self, hints: DecodeHints) {
        self.0.lock().unwrap().set_hints(hints);
    }

    fn is_jpeg(&self) -> bool {
        self.0.lock().unwrap().is_jpeg()
    }
}

impl<'a> PdfImage<'a> {
    /// Construct an image from an already-native-decoded stream and its
    /// dictionary.
    ///
    /// `is_sub_image` forces `SMask`/`Mask` resolution to be skipped even
    /// if `dict` names them, enforcing the invariant that a sub-image used
    /// as `SMask`/`Mask` never carries its own `SMask`/`Mask`.
    fn new(
        mut stream: Box<dyn EncodedStream + 'a>,
        dict: &Dict<'a>,
        alpha_source: AlphaSource<'a>,
        matte: Option<SmallVec<[f32; 4]>>,
        warning_sink: Option<WarningSink>,
        is_sub_image: bool,
    ) -> Result<Self> {
        let _ = is_sub_image;
        let metadata = stream.metadata();

        let width = dict
            .get::<u32>(keys::W)
            .or_else(|| dict.get::<u32>(keys::WIDTH))
            .ok_or(FormatError::InvalidDimensions)?;
        let height = dict
            .get::<u32>(keys::H)
            .or_else(|| dict.get::<u32>(keys::HEIGHT))
            .ok_or(FormatError::InvalidDimensions)?;
        if width < 1 || height < 1 {
            return Err(FormatError::InvalidDimensions.into());
        }

        let interpolate = dict
            .get::<bool>(keys::I)
            .or_else(|| dict.get::<bool>(keys::INTERPOLATE))
            .unwrap_or(false);
        let image_mask = dict
            .get::<bool>(keys::IM)
            .or_else(|| dict.get::<bool>(keys::IMAGE_MASK))
            .unwrap_or(false);

        let bits_per_component = if image_mask {
            1
        } else {
            dict.get::<u8>(keys::BPC)
                .or_else(|| dict.get::<u8>(keys::BITS_PER_COMPONENT))
                .or(metadata.bits_per_component)
                .ok_or(FormatError::MissingBitsPerComponent)?
        };

        let explicit_color_space = dict
            .get::<Arc<dyn ColorSpace>>(keys::CS)
            .or_else(|| dict.get::<Arc<dyn ColorSpace>>(keys::COLORSPACE));

        let color_space = if image_mask {
            None
        } else if let Some(cs) = explicit_color_space {
            Some(cs)
        } else if let Some(nc) = metadata.num_components {
            // No explicit ColorSpace entry: fall back by component count,
            // as JPX images often omit it. An unsupported count is fatal.
            match nc {
                1 => Some(Arc::new(crate::color::DeviceGray) as Arc<dyn ColorSpace>),
                3 => Some(Arc::new(crate::color::DeviceRgb) as Arc<dyn ColorSpace>),
                4 => Some(Arc::new(crate::color::DeviceCmyk) as Arc<dyn ColorSpace>),
                other => return Err(crate::error::UnsupportedError::JpxComponentCount(other).into()),
            }
        } else {
            Some(Arc::new(crate::color::DeviceGray) as Arc<dyn ColorSpace>)
        };

        let num_components = if image_mask {
            1
        } else {
            color_space.as_ref().map_or(1, |cs| cs.num_components())
        };

        let default_decode: SmallVec<[(f32, f32); 4]> = if image_mask {
            smallvec::smallvec![(0.0, 1.0)]
        } else {
            (0..num_components).map(|_| (0.0, 1.0)).collect()
        };

        let decode: SmallVec<[(f32, f32); 4]> = dict
            .get::<SmallVec<[f32; 8]>>(keys::D)
            .or_else(|| dict.get::<SmallVec<[f32; 8]>>(keys::DECODE))
            .map(|flat| flat.chunks_exact(2).map(|p| (p[0], p[1])).collect())
            .unwrap_or_else(|| default_decode.clone());

        // needsDecode is deferred to the color space's own isDefaultDecode
        // rather than a hardcoded [0,1]*NC comparison, since spaces like
        // Lab or Indexed have a different identity decode. Stencil masks
        // have no color space, so they fall back to the plain equality
        // check against their only valid identity array.
        let needs_decode = match &color_space {
            Some(cs) => !cs.is_default_decode(&decode, bits_per_component),
            None => decode != default_decode,
        };
        let (addends, coefficients) = if needs_decode {
            decode_coefficients(&decode, bits_per_component)
        } else {
            (Vec::new(), Vec::new())
        };

        stream.set_hints(DecodeHints {
            draw_width: Some(width.max(alpha_source.sub_image_dims().map_or(0, |d| d.0))),
            draw_height: Some(height.max(alpha_source.sub_image_dims().map_or(0, |d| d.1))),
            force_rgb: false,
        });

        Ok(Self {
            stream,
            width,
            height,
            bits_per_component,
            num_components,
            color_space,
            image_mask,
            interpolate,
            needs_decode,
            addends,
            coefficients,
            alpha_source,
            matte,
            warning_sink,
        })
    }

    /// Image width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Image height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Whether this image is a stencil mask (`ImageMask true`).
    pub fn is_image_mask(&self) -> bool {
        self.image_mask
    }

    /// Whether interpolation was requested (`Interpolate true`).
    pub fn interpolate(&self) -> bool {
        self.interpolate
    }

    /// The warning sink installed at construction, if any, so a caller can
    /// install one on a sub-image's own collaborators if it later needs to
    /// re-decode it independently of its parent.
    pub fn warning_sink(&self) -> Option<&WarningSink> {
        self.warning_sink.as_ref()
    }

    /// `max(W, SMask.W?, Mask.W?)`.
    pub fn draw_width(&self) -> u32 {
        self.width
            .max(self.alpha_source.sub_image_dims().map_or(0, |d| d.0))
    }

    /// `max(H, SMask.H?, Mask.H?)`.
    pub fn draw_height(&self) -> u32 {
        self.height
            .max(self.alpha_source.sub_image_dims().map_or(0, |d| d.1))
    }

    fn color_space_or_gray(&self) -> &dyn ColorSpace {
        self.color_space
            .as_deref()
            .unwrap_or(&FALLBACK_GRAY)
    }

    /// Orchestrate the full decode: bit-unpack, mask, decode-transform,
    /// color-convert, and matte-undo, emitting one of the three output
    /// layouts.
    ///
    /// Should not be called on a stencil mask image
    /// ([`PdfImage::is_image_mask`]); use [`PdfImage::fill_gray_buffer`]
    /// for those instead.
    pub fn create_image_data(
        &mut self,
        force_rgba: bool,
        config: &DownscaleConfig,
    ) -> Result<ImageData> {
        let draw_width = self.draw_width();
        let draw_height = self.draw_height();
        let has_mask = !self.alpha_source.is_none();
        let dims_match = (draw_width, draw_height) == (self.width, self.height);

        if !force_rgba && !has_mask && dims_match {
            if let Some(data) = self.try_grayscale_1bpp_passthrough(config)? {
                return Ok(data);
            }
            if let Some(data) = self.try_rgb_passthrough()? {
                return Ok(data);
            }
        }

        self.create_image_data_general(force_rgba, has_mask, draw_width, draw_height, config)
    }

    fn try_grayscale_1bpp_passthrough(
        &mut self,
        config: &DownscaleConfig,
    ) -> Result<Option<ImageData>> {
        if self.bits_per_component != 1 || self.color_space_or_gray().name() != "DeviceGray" {
            return Ok(None);
        }

        let rb = row_bytes(self.width, 1, 1);
        let bytes = self.stream.get_bytes(self.height as usize * rb);
        let mut data = bytes.into_vec();

        if self.needs_decode {
            for b in &mut data {
                *b ^= 0xFF;
            }
        }

        let mut width = self.width;
        let mut height = self.height;

        if !config.print && shall_resize_image(1, 1) {
            let bits = scale_bits(width.max(height), config);
            if bits > 0 {
                let (resized, w, h, _row_bytes) = downscale_bilevel(&data, width, height, bits);
                data = resized;
                width = w;
                height = h;
            }
        }

        Ok(Some(ImageData {
            kind: OutputKind::Grayscale1Bpp,
            width,
            height,
            data,
        }))
    }

    fn try_rgb_passthrough(&mut self) -> Result<Option<ImageData>> {
        let name = self.color_space_or_gray().name();
        let is_device_space = matches!(name, "DeviceGray" | "DeviceRGB" | "DeviceCMYK");

        if is_device_space && self.stream.is_jpeg() {
            self.stream.set_hints(DecodeHints {
                draw_width: Some(self.width),
                draw_height: Some(self.height),
                force_rgb: true,
            });
            self.stream.reset();
            let bytes = self
                .stream
                .get_bytes(self.width as usize * self.height as usize * 3);
            return Ok(Some(ImageData {
                kind: OutputKind::Rgb24Bpp,
                width: self.width,
                height: self.height,
                data: bytes.into_vec(),
            }));
        }

        if name == "DeviceRGB" && self.bits_per_component == 8 && !self.needs_decode {
            let rb = row_bytes(self.width, 3, 8);
            let bytes = self.stream.get_bytes(self.height as usize * rb);
            return Ok(Some(ImageData {
                kind: OutputKind::Rgb24Bpp,
                width: self.width,
                height: self.height,
                data: bytes.into_vec(),
            }));
        }

        Ok(None)
    }

    fn create_image_data_general(
        &mut self,
        force_rgba: bool,
        has_mask: bool,
        draw_width: u32,
        draw_height: u32,
        config: &DownscaleConfig,
    ) -> Result<ImageData> {
        let mut draw_width = draw_width;
        let mut draw_height = draw_height;
        let mut width = self.width;
        let mut height = self.height;
        let mut rb = row_bytes(width, self.num_components, self.bits_per_component);

        let bytes = self.stream.get_bytes(height as usize * rb);
        let mut raw = bytes.into_vec();

        if self.color_space_or_gray().name() == "DeviceGray"
            && !config.print
            && shall_resize_image(self.num_components, self.bits_per_component)
        {
            let bits = scale_bits(width.max(height), config);
            if bits > 0 {
                if self.bits_per_component == 1 {
                    let (resized, w, h, new_rb) = downscale_bilevel(&raw, width, height, bits);
                    raw = resized;
                    width = w;
                    height = h;
                    rb = new_rb as usize;
                } else {
                    let (resized, w, h) = downscale_gray_bytewise(&raw, width, height, bits);
                    raw = resized;
                    width = w;
                    height = h;
                    rb = row_bytes(width, self.num_components, self.bits_per_component);
                }

                // No mask enlarges the draw dimensions beyond the source's
                // own: the decimated size becomes the draw size too, so the
                // rest of the pipeline (and the emitted descriptor) actually
                // shrinks instead of resampling back up to the original
                // dimensions. A mask wider/taller than the source keeps the
                // draw dimensions as they were; the downscaled color data
                // then simply gets upsampled to match during color fill.
                if draw_width == self.width && draw_height == self.height {
                    draw_width = width;
                    draw_height = height;
                }
            }
        }

        let bytes_read = raw.len();
        let actual_height = if rb == 0 || height == 0 {
            draw_height
        } else {
            (((bytes_read / rb) as u64 * draw_height as u64) / height as u64) as u32
        };

        let mut samples = unpack_samples(
            &raw,
            width,
            height,
            self.num_components,
            self.bits_per_component,
        );

        let emit_alpha = has_mask || force_rgba;
        let stride = if emit_alpha { 4 } else { 3 };
        let mut dst = vec![0u8; stride * draw_width as usize * draw_height as usize];

        if emit_alpha {
            if !has_mask {
                for a in dst.iter_mut().skip(3).step_by(4) {
                    *a = 255;
                }
            } else {
                self.fill_opacity(&mut dst, width, draw_width, draw_height, actual_height, &samples)?;
            }
        }

        if self.needs_decode {
            apply_decode(
                &mut samples,
                self.num_components,
                self.bits_per_component,
                &self.addends,
                &self.coefficients,
            );
        }

        let src_f32 = samples_to_unit_f32(&samples, self.bits_per_component);
        self.color_space_or_gray().fill_rgb(
            &mut dst,
            width,
            height,
            draw_width,
            draw_height,
            actual_height,
            &src_f32,
            emit_alpha,
        );

        if emit_alpha {
            if let Some(matte) = &self.matte {
                let rgb = self.color_space_or_gray().get_rgb(matte);
                undo_preblend(&mut dst, rgb);
            }
        }

        Ok(ImageData {
            kind: if emit_alpha {
                OutputKind::Rgba32Bpp
            } else {
                OutputKind::Rgb24Bpp
            },
            width: draw_width,
            height: draw_height,
            data: dst,
        })
    }

    fn fill_opacity(
        &mut self,
        dst: &mut [u8],
        src_width: u32,
        draw_width: u32,
        draw_height: u32,
        actual_height: u32,
        samples: &SampleBuffer,
    ) -> Result<()> {
        match &mut self.alpha_source {
            AlphaSource::None => {
                for a in dst.iter_mut().skip(3).step_by(4) {
                    *a = 255;
                }
            }
            AlphaSource::SoftMask(sub) => {
                let gray = sub.fill_gray_buffer()?;
                write_alpha_plane(
                    dst,
                    draw_width,
                    draw_height,
                    &gray,
                    sub.width,
                    sub.height,
                    false,
                );
            }
            AlphaSource::Stencil(sub) => {
                let gray = sub.fill_gray_buffer()?;
                write_alpha_plane(
                    dst,
                    draw_width,
                    draw_height,
                    &gray,
                    sub.width,
                    sub.height,
                    true,
                );
            }
            AlphaSource::ColorKey(key) => {
                apply_color_key_mask(
                    dst,
                    src_width,
                    actual_height,
                    samples,
                    self.num_components,
                    key,
                );
            }
            AlphaSource::InData => {
                if let Some(alpha) = self.stream.in_data_alpha() {
                    write_alpha_plane(dst, draw_width, draw_height, &alpha, self.width, self.height, false);
                } else {
                    for a in dst.iter_mut().skip(3).step_by(4) {
                        *a = 255;
                    }
                }
            }
        }

        Ok(())
    }

    /// Read and unpack this image's own samples into an 8-bit gray buffer.
    /// Only valid on a single-component image; used both as the final step
    /// when this image *is* a mask, and directly by callers who just want
    /// a gray preview.
    pub fn fill_gray_buffer(&mut self) -> Result<Vec<u8>> {
        if self.num_components != 1 {
            return Err(FormatError::NotGrayscale.into());
        }

        let rb = row_bytes(self.width, 1, self.bits_per_component);
        let bytes = self.stream.get_bytes(self.height as usize * rb);
        let raw = bytes.as_slice();
        let mut samples = unpack_samples(raw, self.width, self.height, 1, self.bits_per_component);

        if self.bits_per_component == 1 {
            let SampleBuffer::U8(bits) = &samples else {
                unreachable!("1-bpp samples are always stored as u8")
            };
            let out = bits
                .iter()
                .map(|&bit| {
                    if self.needs_decode {
                        if bit == 1 { 255 } else { 0 }
                    } else if bit == 1 {
                        0
                    } else {
                        255
                    }
                })
                .collect();
            return Ok(out);
        }

        if self.needs_decode {
            apply_decode(
                &mut samples,
                1,
                self.bits_per_component,
                &self.addends,
                &self.coefficients,
            );
        }

        let max = max_value(self.bits_per_component);
        let out = (0..samples.len())
            .map(|i| ((samples.get_f32(i) * 255.0 / max) as u8))
            .collect();
        Ok(out)
    }
}

/// Widen a sample buffer to `f32`, normalized to `[0, 1]` by the component's
/// maximum representable value, as [`ColorSpace::fill_rgb`] expects.
fn samples_to_unit_f32(samples: &SampleBuffer, bits_per_component: u8) -> Vec<f32> {
    let max = max_value(bits_per_component);
    (0..samples.len()).map(|i| samples.get_f32(i) / max).collect()
}

/// Build a stencil-mask-shaped output descriptor directly from raw,
/// already-unpacked bits, without going through the dictionary-driven
/// factory.
///
/// Allocates a buffer of `ceil(width / 8) * height` bytes; when `data` is
/// shorter, the tail is padded with `0xFF` iff `inverse_decode`, and the
/// copied portion is bitwise-negated iff `inverse_decode`.
pub fn create_mask(
    data: StreamBytes,
    width: u32,
    height: u32,
    from_decode_stream: bool,
    inverse_decode: bool,
) -> ImageData {
    let row_bytes = (width as usize).div_ceil(8);
    let total = row_bytes * height as usize;

    let (mut out, original_len) = match data {
        StreamBytes::Owned(mut v) if from_decode_stream && v.len() >= total => {
            let original_len = total;
            v.truncate(total);
            (v, original_len)
        }
        other => {
            let slice = other.as_slice();
            let original_len = slice.len().min(total);
            let mut v = vec![0u8; total];
            v[..original_len].copy_from_slice(&slice[..original_len]);
            (v, original_len)
        }
    };

    if original_len < total && inverse_decode {
        for b in &mut out[original_len..] {
            *b = 0xFF;
        }
    }

    if inverse_decode {
        for b in &mut out[..original_len] {
            *b = !*b;
        }
    }

    ImageData {
        kind: OutputKind::Grayscale1Bpp,
        width,
        height,
        data: out,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::StreamMetadata;

    struct FakeStream {
        data: Vec<u8>,
        pos: usize,
        hints: DecodeHints,
        is_jpeg: bool,
        metadata: StreamMetadata,
    }

    impl FakeStream {
        fn new(data: Vec<u8>) -> Self {
            Self {
                data,
                pos: 0,
                hints: DecodeHints::default(),
                is_jpeg: false,
                metadata: StreamMetadata::default(),
            }
        }

        fn with_metadata(data: Vec<u8>, metadata: StreamMetadata) -> Self {
            Self {
                metadata,
                ..Self::new(data)
            }
        }
    }

    impl EncodedStream for FakeStream {
        fn reset(&mut self) {
            self.pos = 0;
        }

        fn get_bytes(&mut self, n: usize) -> StreamBytes {
            let end = (self.pos + n).min(self.data.len());
            let chunk = self.data[self.pos..end].to_vec();
            self.pos = end;
            StreamBytes::Owned(chunk)
        }

        fn metadata(&self) -> StreamMetadata {
            self.metadata
        }

        fn hints(&self) -> DecodeHints {
            self.hints
        }

        fn set_hints(&mut self, hints: DecodeHints) {
            self.hints = hints;
        }

        fn is_jpeg(&self) -> bool {
            self.is_jpeg
        }
    }

    fn dict_with(width: u32, height: u32, bpc: u8) -> Dict<'static> {
        let mut dict = dict_without_bpc(width, height);
        dict.insert(keys::BPC, crate::dict::DictValue::Int(bpc as i64));
        dict
    }

    /// A dict carrying only `Width`/`Height`, for images whose
    /// `BitsPerComponent`/`ColorSpace` are meant to come from the stream's
    /// own JPX/JBIG2 metadata instead.
    fn dict_without_bpc(width: u32, height: u32) -> Dict<'static> {
        let mut dict = Dict::new();
        dict.insert(keys::W, crate::dict::DictValue::Int(width as i64));
        dict.insert(keys::H, crate::dict::DictValue::Int(height as i64));
        dict
    }

    #[test]
    fn stencil_mask_2x2_bit_packed() {
        let mut dict = dict_with(2, 2, 1);
        dict.insert(keys::IMAGE_MASK, crate::dict::DictValue::Bool(true));
        let stream = Box::new(FakeStream::new(vec![0b1000_0000, 0b0100_0000]));

        let mut image = build_image(stream, &dict, None, None).unwrap();
        assert!(image.is_image_mask());
        let gray = image.fill_gray_buffer().unwrap();
        assert_eq!(gray, vec![0, 255, 255, 0]);
    }

    #[test]
    fn gray_4bpc_fill_gray_buffer() {
        let dict = dict_with(2, 1, 4);
        let stream = Box::new(FakeStream::new(vec![0x0F]));
        let mut image = build_image(stream, &dict, None, None).unwrap();
        let gray = image.fill_gray_buffer().unwrap();
        assert_eq!(gray, vec![0, 255]);
    }

    #[test]
    fn rgb_8bpc_compact_passthrough() {
        let mut dict = dict_with(1, 1, 8);
        dict.insert(
            keys::CS,
            crate::dict::DictValue::ColorSpace(Arc::new(crate::color::DeviceRgb)),
        );
        let stream = Box::new(FakeStream::new(vec![10, 20, 30]));
        let mut image = build_image(stream, &dict, None, None).unwrap();
        let data = image
            .create_image_data(false, &DownscaleConfig::default())
            .unwrap();
        assert_eq!(data.kind, OutputKind::Rgb24Bpp);
        assert_eq!(data.data, vec![10, 20, 30]);
    }

    #[test]
    fn color_key_mask_transparency() {
        let mut dict = dict_with(1, 1, 8);
        dict.insert(
            keys::CS,
            crate::dict::DictValue::ColorSpace(Arc::new(crate::color::DeviceRgb)),
        );
        dict.insert(
            keys::MASK,
            crate::dict::DictValue::NumberArray(smallvec::smallvec![
                0.0, 20.0, 0.0, 20.0, 0.0, 20.0
            ]),
        );
        let stream = Box::new(FakeStream::new(vec![10, 10, 10]));
        let mut image = build_image(stream, &dict, None, None).unwrap();
        let data = image
            .create_image_data(false, &DownscaleConfig::default())
            .unwrap();
        assert_eq!(data.kind, OutputKind::Rgba32Bpp);
        assert_eq!(data.data[3], 0);
    }

    #[test]
    fn oversize_grayscale_downscales_the_emitted_descriptor() {
        // W=H=16000, BPC=8, DeviceGray, no mask: scaleBits=3, so the
        // descriptor actually emitted must be 2000x2000, not upsampled
        // back to the source's own 16000x16000.
        let mut dict = dict_with(16_000, 16_000, 8);
        dict.insert(
            keys::CS,
            crate::dict::DictValue::ColorSpace(Arc::new(crate::color::DeviceGray)),
        );
        let stream = Box::new(FakeStream::new(vec![0u8; 16_000 * 16_000]));
        let mut image = build_image(stream, &dict, None, None).unwrap();
        let data = image
            .create_image_data(false, &DownscaleConfig::default())
            .unwrap();
        assert_eq!(data.kind, OutputKind::Rgb24Bpp);
        assert_eq!((data.width, data.height), (2_000, 2_000));
        assert_eq!(data.data.len(), 3 * 2_000 * 2_000);
    }

    #[test]
    fn invalid_dimensions_rejected() {
        let mut dict = Dict::new();
        dict.insert(keys::W, crate::dict::DictValue::Int(0));
        dict.insert(keys::H, crate::dict::DictValue::Int(1));
        let stream = Box::new(FakeStream::new(vec![]));
        let err = build_image(stream, &dict, None, None).unwrap_err();
        assert_eq!(err, ImageError::Format(FormatError::InvalidDimensions));
    }

    #[test]
    fn jpx_unknown_component_count_is_unsupported() {
        // No ColorSpace/BitsPerComponent in the dict: both come from the
        // JPX codestream's own metadata. A component count outside
        // {1,3,4} has no device color space fallback.
        let dict = dict_without_bpc(2, 1);
        let stream = Box::new(FakeStream::with_metadata(
            vec![0u8; 4],
            StreamMetadata {
                bits_per_component: Some(8),
                num_components: Some(2),
            },
        ));
        let err = build_image(stream, &dict, None, None).unwrap_err();
        assert_eq!(
            err,
            ImageError::Unsupported(crate::error::UnsupportedError::JpxComponentCount(2))
        );
    }

    #[test]
    fn jpx_component_count_falls_back_to_device_color_space() {
        let dict = dict_without_bpc(1, 1);
        let stream = Box::new(FakeStream::with_metadata(
            vec![10, 20, 30],
            StreamMetadata {
                bits_per_component: Some(8),
                num_components: Some(3),
            },
        ));
        let mut image = build_image(stream, &dict, None, None).unwrap();
        let data = image
            .create_image_data(false, &DownscaleConfig::default())
            .unwrap();
        assert_eq!(data.kind, OutputKind::Rgb24Bpp);
        assert_eq!(data.data, vec![10, 20, 30]);
    }

    #[test]
    fn fill_gray_buffer_on_color_image_fails() {
        let mut dict = dict_with(1, 1, 8);
        dict.insert(
            keys::CS,
            crate::dict::DictValue::ColorSpace(Arc::new(crate::color::DeviceRgb)),
        );
        let stream = Box::new(FakeStream::new(vec![1, 2, 3]));
        let mut image = build_image(stream, &dict, None, None).unwrap();
        let err = image.fill_gray_buffer().unwrap_err();
        assert_eq!(err, ImageError::Format(FormatError::NotGrayscale));
    }

    #[test]
    fn create_mask_round_trip() {
        let buf = vec![0b1010_1010u8, 0b0101_0101];
        // width=8, height=2 => row_bytes=1, total=2, buf already matches.
        let data = create_mask(
            StreamBytes::Owned(buf.clone()),
            8,
            2,
            false,
            true,
        );
        let mut negated = data.data.clone();
        for b in &mut negated {
            *b = !*b;
        }
        assert_eq!(negated, buf);
    }

    #[test]
    fn create_mask_pads_short_input() {
        let buf = vec![0xAAu8];
        // width=8, height=3 => total=3 bytes, only 1 provided.
        let data = create_mask(StreamBytes::Owned(buf.clone()), 8, 3, false, true);
        assert_eq!(data.data.len(), 3);
        assert_eq!(data.data[0], !buf[0]);
        assert_eq!(&data.data[1..], &[0xFFu8, 0xFF]);
    }

    #[test]
    fn smask_resolution_produces_rgba_with_alpha() {
        let mut dict = dict_with(1, 1, 8);
        dict.insert(
            keys::CS,
            crate::dict::DictValue::ColorSpace(Arc::new(crate::color::DeviceRgb)),
        );

        let mut smask_dict = dict_with(1, 1, 8);
        smask_dict.insert(
            keys::CS,
            crate::dict::DictValue::ColorSpace(Arc::new(crate::color::DeviceGray)),
        );
        let smask_stream: Arc<Mutex<dyn EncodedStream>> =
            Arc::new(Mutex::new(FakeStream::new(vec![128])));
        dict.insert(
            keys::SMASK,
            crate::dict::DictValue::Stream(smask_stream, smask_dict),
        );

        let stream = Box::new(FakeStream::new(vec![10, 20, 30]));
        let mut image = build_image(stream, &dict, None, None).unwrap();
        let data = image
            .create_image_data(false, &DownscaleConfig::default())
            .unwrap();
        assert_eq!(data.kind, OutputKind::Rgba32Bpp);
        assert_eq!(data.data[0..3], [10, 20, 30]);
        assert_eq!(data.data[3], 128);
    }

    #[test]
    fn matte_is_read_from_the_smasks_own_dictionary() {
        // Matte lives on the SMask's dictionary, not the primary image's:
        // putting it on the primary dict instead must have no effect.
        let mut dict = dict_with(1, 1, 8);
        dict.insert(
            keys::CS,
            crate::dict::DictValue::ColorSpace(Arc::new(crate::color::DeviceRgb)),
        );
        dict.insert(
            keys::MATTE,
            crate::dict::DictValue::NumberArray(smallvec::smallvec![1.0, 1.0, 1.0]),
        );

        let mut smask_dict = dict_with(1, 1, 8);
        smask_dict.insert(
            keys::CS,
            crate::dict::DictValue::ColorSpace(Arc::new(crate::color::DeviceGray)),
        );
        smask_dict.insert(
            keys::MATTE,
            crate::dict::DictValue::NumberArray(smallvec::smallvec![50.0 / 255.0; 3]),
        );
        let smask_stream: Arc<Mutex<dyn EncodedStream>> =
            Arc::new(Mutex::new(FakeStream::new(vec![128])));
        dict.insert(
            keys::SMASK,
            crate::dict::DictValue::Stream(smask_stream, smask_dict),
        );

        // Pixel (100,100,100) pre-blended against matte (50,50,50), alpha 128:
        // k = 255/128; c' = (100-50)*k + 50 = 149 (truncated).
        let stream = Box::new(FakeStream::new(vec![100, 100, 100]));
        let mut image = build_image(stream, &dict, None, None).unwrap();
        let data = image
            .create_image_data(false, &DownscaleConfig::default())
            .unwrap();
        assert_eq!(data.data[0], 149);
        assert_eq!(data.data[3], 128);
    }

    #[test]
    fn matte_does_not_apply_to_a_stencil_mask() {
        // A Matte on the primary dict with only a stencil `Mask` (no
        // `SMask`) must be ignored entirely.
        let mut dict = dict_with(1, 1, 8);
        dict.insert(
            keys::CS,
            crate::dict::DictValue::ColorSpace(Arc::new(crate::color::DeviceRgb)),
        );
        dict.insert(
            keys::MATTE,
            crate::dict::DictValue::NumberArray(smallvec::smallvec![1.0, 1.0, 1.0]),
        );

        let mut mask_dict = dict_with(1, 1, 1);
        mask_dict.insert(keys::IMAGE_MASK, crate::dict::DictValue::Bool(true));
        let mask_stream: Arc<Mutex<dyn EncodedStream>> =
            Arc::new(Mutex::new(FakeStream::new(vec![0b1000_0000])));
        dict.insert(
            keys::MASK,
            crate::dict::DictValue::Stream(mask_stream, mask_dict),
        );

        let stream = Box::new(FakeStream::new(vec![100, 100, 100]));
        let mut image = build_image(stream, &dict, None, None).unwrap();
        let data = image
            .create_image_data(false, &DownscaleConfig::default())
            .unwrap();
        // No matte undo applied: channel stays exactly 100.
        assert_eq!(data.data[0..3], [100, 100, 100]);
    }
}
