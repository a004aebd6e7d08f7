/*!
Decodes a single PDF image XObject into a pixel buffer ready for
compositing.

Given an already-parsed image dictionary and the raw (already
entropy-decoded) byte stream of one embedded image, this crate
reconstructs a pixel buffer as a compact 1-bpp bitmap, a packed 24-bit RGB
buffer, or a 32-bit RGBA buffer, depending on the image's characteristics
and the caller's requirement.

This is deliberately narrow: it does not parse PDF syntax, resolve
indirect references, decode CCITT/JBIG2/JPX/JPEG codestreams, or convert
device-independent color spaces to RGB. Those are external collaborators,
modeled here as the [`stream::EncodedStream`], [`stream::NativeDecoder`],
and [`color::ColorSpace`] traits. It's also still very much in
development; the API surface is likely to grow as more of those
collaborators land alongside it.
*/

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod bits;
pub mod color;
pub mod decode;
pub mod dict;
pub mod downscale;
pub mod error;
pub mod image;
pub mod mask;
pub mod matte;

pub use downscale::DownscaleConfig;
pub use error::{FormatError, ImageError, ImageWarning, Result, UnsupportedError};
pub use image::{build_image, create_mask, AlphaSource, ImageData, OutputKind, PdfImage, WarningSink};
