//! The external data-producing collaborators this crate decodes against:
//! the resettable encoded byte stream, and the optional native decoder
//! that may intercept it.
//!
//! Entropy/CCITT/flate/JBIG2/JPX/JPEG decoding itself lives outside this
//! crate; everything here is a trait an embedder implements against its
//! own filter pipeline.

use std::sync::Arc;

/// Caller-writable hints a stream may honor while producing bytes.
///
/// `draw_width`/`draw_height` let the stream know the eventual draw
/// dimensions so a native decoder can pick a cheaper internal resolution;
/// `force_rgb` asks a JPEG-backed stream to convert CMYK/Gray to RGB during
/// decode.
#[derive(Debug, Clone, Copy, Default)]
pub struct DecodeHints {
    /// Requested output width, if known.
    pub draw_width: Option<u32>,
    /// Requested output height, if known.
    pub draw_height: Option<u32>,
    /// Ask the stream to emit RGB samples directly.
    pub force_rgb: bool,
}

/// Who owns the bytes a stream handed back.
///
/// The 1-bpp passthrough in [`crate::image::PdfImage::create_image_data`]
/// transfers ownership of an `Owned` buffer instead of copying it; a
/// `Borrowed` buffer is a view into something the stream still owns and
/// must be copied before use.
#[derive(Clone)]
pub enum StreamBytes {
    /// A buffer fully owned by the pipeline; safe to consume destructively.
    Owned(Vec<u8>),
    /// A slice of a larger buffer the stream still owns.
    Borrowed(Arc<[u8]>),
}

impl StreamBytes {
    /// Borrow the bytes regardless of ownership.
    pub fn as_slice(&self) -> &[u8] {
        match self {
            Self::Owned(v) => v,
            Self::Borrowed(v) => v,
        }
    }

    /// Take the bytes by value, copying only if they were borrowed.
    pub fn into_vec(self) -> Vec<u8> {
        match self {
            Self::Owned(v) => v,
            Self::Borrowed(v) => v.to_vec(),
        }
    }

    /// Whether this buffer can be transferred without a copy.
    pub fn is_owned(&self) -> bool {
        matches!(self, Self::Owned(_))
    }
}

/// Metadata a JPX or JBIG2 codestream can report ahead of decoding, used
/// to fill in `BitsPerComponent`/component count when the dictionary
/// omits them.
#[derive(Debug, Clone, Copy, Default)]
pub struct StreamMetadata {
    /// Bits per component, if the codestream header carries one.
    pub bits_per_component: Option<u8>,
    /// Number of color components, if the codestream header carries one.
    pub num_components: Option<u8>,
}

/// An opaque, resettable producer of already-entropy-decoded image bytes.
///
/// Implemented by the document layer's filter pipeline; this crate only
/// calls [`EncodedStream::reset`] and [`EncodedStream::get_bytes`].
pub trait EncodedStream {
    /// Rewind the stream to its start, discarding any partial read state.
    fn reset(&mut self);

    /// Pull up to `n` bytes. Returns fewer than `n` bytes (or an empty
    /// vector) when the underlying data is truncated; callers must
    /// tolerate this.
    fn get_bytes(&mut self, n: usize) -> StreamBytes;

    /// Metadata the stream's own codestream header carries, if any.
    fn metadata(&self) -> StreamMetadata {
        StreamMetadata::default()
    }

    /// The caller-writable decode hints for this stream.
    fn hints(&self) -> DecodeHints {
        DecodeHints::default()
    }

    /// Mutable access to the decode hints, so the core can set
    /// `draw_width`/`draw_height`/`force_rgb` before pulling bytes.
    fn set_hints(&mut self, hints: DecodeHints);

    /// Whether this stream's underlying filter is JPEG (DCTDecode), which
    /// unlocks the 24-bpp RGB passthrough.
    fn is_jpeg(&self) -> bool {
        false
    }

    /// For a JPX codestream decoded with `SMaskInData` set: the alpha
    /// channel it decoded alongside its color channels, one byte per
    /// pixel at the stream's native resolution. `None` for every other
    /// stream.
    fn in_data_alpha(&self) -> Option<Vec<u8>> {
        None
    }
}

/// A host-provided fast-path decoder for JPEG/JPX images.
///
/// Entirely optional: when [`NativeDecoder::can_decode`] returns `false`
/// for a stream, the factory keeps decoding it through the ordinary
/// [`EncodedStream`] path.
pub trait NativeDecoder {
    /// Whether this decoder claims to handle `stream`.
    fn can_decode(&self, stream: &dyn EncodedStream) -> bool;

    /// Decode `stream`, replacing it with one that yields the already-decoded
    /// bytes. Fallible: a native decode failure falls back to the original
    /// stream.
    ///
    /// Generic over the stream's borrow lifetime so a decoder can be used
    /// against streams borrowing from a document of any lifetime.
    fn decode<'a>(
        &self,
        stream: Box<dyn EncodedStream + 'a>,
    ) -> Result<Box<dyn EncodedStream + 'a>, Box<dyn EncodedStream + 'a>>;
}
