//! Error types for image decoding.

use core::fmt;

/// The result type used throughout this crate.
pub type Result<T> = core::result::Result<T, ImageError>;

/// The top-level error type for image decoding operations.
#[derive(Debug, Clone, PartialEq)]
pub enum ImageError {
    /// The image dictionary or its auxiliary streams were malformed.
    Format(FormatError),
    /// The image uses a feature this crate does not implement.
    Unsupported(UnsupportedError),
}

/// Errors related to a malformed image dictionary or data stream.
#[derive(Debug, Clone, PartialEq)]
pub enum FormatError {
    /// `Width` or `Height` was missing, zero, or otherwise not a valid
    /// positive integer.
    InvalidDimensions,
    /// `BitsPerComponent` was missing and the image is not an image mask
    /// (which defaults it to 1).
    MissingBitsPerComponent,
    /// [`fill_gray_buffer`](crate::image::PdfImage::fill_gray_buffer) was
    /// called on an image whose component count is not 1.
    NotGrayscale,
    /// A `Mask` entry was neither a stream nor an array of color-key ranges.
    UnknownMaskShape,
}

/// Errors related to a feature this crate does not (yet) implement.
#[derive(Debug, Clone, PartialEq)]
pub enum UnsupportedError {
    /// The underlying JPX codestream reported a component count this
    /// crate has no color space fallback for.
    JpxComponentCount(u8),
}

impl fmt::Display for ImageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Format(e) => write!(f, "{e}"),
            Self::Unsupported(e) => write!(f, "{e}"),
        }
    }
}

impl fmt::Display for FormatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidDimensions => write!(f, "image has invalid width or height"),
            Self::MissingBitsPerComponent => write!(f, "image is missing BitsPerComponent"),
            Self::NotGrayscale => write!(f, "fill_gray_buffer requires a single-component image"),
            Self::UnknownMaskShape => write!(f, "Mask entry is neither a stream nor an array"),
        }
    }
}

impl fmt::Display for UnsupportedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::JpxComponentCount(n) => {
                write!(f, "unsupported JPX component count: {n}")
            }
        }
    }
}

impl std::error::Error for ImageError {}
impl std::error::Error for FormatError {}
impl std::error::Error for UnsupportedError {}

impl From<FormatError> for ImageError {
    fn from(e: FormatError) -> Self {
        Self::Format(e)
    }
}

impl From<UnsupportedError> for ImageError {
    fn from(e: UnsupportedError) -> Self {
        Self::Unsupported(e)
    }
}

/// Non-fatal anomalies reported while building or decoding an image.
///
/// These never abort the decode; they are surfaced through a
/// [`WarningSink`](crate::image::WarningSink) so an embedder can log or
/// display them, the same way [`FormatError`] aborts it.
#[derive(Debug, Clone, PartialEq)]
pub enum ImageWarning {
    /// A `Mask` stream's dictionary lacked `ImageMask true`; it was dropped.
    MaskMissingImageMask,
    /// A `Mask` entry had a shape other than a stream or a color-key array.
    MaskUnknownShape,
}

impl fmt::Display for ImageWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MaskMissingImageMask => {
                write!(f, "ignoring Mask stream without ImageMask true")
            }
            Self::MaskUnknownShape => write!(f, "ignoring Mask entry of unsupported shape"),
        }
    }
}
