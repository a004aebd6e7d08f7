//! A small typed key-value map standing in for an already-parsed, already
//! xref-resolved PDF image dictionary.
//!
//! Real PDF dictionaries are parsed and their indirect references resolved
//! by the document layer's cross-reference resolver long before an image
//! reaches this crate; this module only models the shape of what that
//! layer hands us, not how it got there.

use crate::color::ColorSpace;
use crate::stream::EncodedStream;
use smallvec::SmallVec;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// One already-resolved dictionary value.
#[derive(Clone)]
pub enum DictValue<'a> {
    /// A boolean, e.g. `ImageMask true`.
    Bool(bool),
    /// An integer, e.g. `BitsPerComponent 8`.
    Int(i64),
    /// An array of numbers, e.g. `Decode [0 1 0 1 0 1]`.
    NumberArray(SmallVec<[f32; 8]>),
    /// A resolved color space collaborator.
    ColorSpace(Arc<dyn ColorSpace>),
    /// A reference to an auxiliary stream (`SMask` or `Mask`), carrying its
    /// own dictionary.
    ///
    /// Wrapped in a [`Mutex`] rather than handed out as a bare `Arc` because
    /// [`EncodedStream`]'s methods take `&mut self`: a stream referenced
    /// from a dictionary entry may need driving to completion from more
    /// than one owning path (e.g. a sub-image constructed, then the
    /// dictionary dropped) without ever having unique ownership of the
    /// `Arc` to reach for `Arc::get_mut`.
    Stream(Arc<Mutex<dyn EncodedStream + 'a>>, Dict<'a>),
}

/// An already-parsed, already-resolved image dictionary.
///
/// Construct one with [`Dict::new`] and populate it with [`Dict::insert`],
/// or build it however the embedding document layer sees fit; this crate
/// only ever reads from it through [`Dict::get`].
#[derive(Clone, Default)]
pub struct Dict<'a> {
    entries: HashMap<&'static str, DictValue<'a>>,
}

impl<'a> Dict<'a> {
    /// Create a new, empty dictionary.
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Insert a value under `key`, replacing any previous value.
    pub fn insert(&mut self, key: &'static str, value: DictValue<'a>) {
        self.entries.insert(key, value);
    }

    /// Look up a typed value for `key`.
    ///
    /// Returns `None` both when the key is absent and when it is present
    /// but of the wrong shape, mirroring `hayro_syntax::object::Dict::get`.
    pub fn get<T: FromDictValue<'a>>(&self, key: &'static str) -> Option<T> {
        T::from_value(self.entries.get(key)?)
    }

    /// Whether the dictionary has an entry for `key` at all.
    pub fn contains_key(&self, key: &'static str) -> bool {
        self.entries.contains_key(key)
    }
}

/// Types that can be extracted out of a [`DictValue`].
pub trait FromDictValue<'a>: Sized {
    /// Attempt the conversion, returning `None` on a shape mismatch.
    fn from_value(value: &DictValue<'a>) -> Option<Self>;
}

impl<'a> FromDictValue<'a> for bool {
    fn from_value(value: &DictValue<'a>) -> Option<Self> {
        match value {
            DictValue::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

macro_rules! int_from_dict_value {
    ($($ty:ty),*) => {
        $(
            impl<'a> FromDictValue<'a> for $ty {
                fn from_value(value: &DictValue<'a>) -> Option<Self> {
                    match value {
                        DictValue::Int(n) => Self::try_from(*n).ok(),
                        _ => None,
                    }
                }
            }
        )*
    };
}

int_from_dict_value!(u8, u32, i64, usize);

impl<'a> FromDictValue<'a> for SmallVec<[f32; 8]> {
    fn from_value(value: &DictValue<'a>) -> Option<Self> {
        match value {
            DictValue::NumberArray(a) => Some(a.clone()),
            _ => None,
        }
    }
}

impl<'a> FromDictValue<'a> for Arc<dyn ColorSpace> {
    fn from_value(value: &DictValue<'a>) -> Option<Self> {
        match value {
            DictValue::ColorSpace(cs) => Some(cs.clone()),
            _ => None,
        }
    }
}

impl<'a> FromDictValue<'a> for (Arc<Mutex<dyn EncodedStream + 'a>>, Dict<'a>) {
    fn from_value(value: &DictValue<'a>) -> Option<Self> {
        match value {
            DictValue::Stream(s, d) => Some((s.clone(), d.clone())),
            _ => None,
        }
    }
}

/// Dictionary key name constants, mirroring `hayro_syntax::object::dict::keys`.
pub mod keys {
    /// `BitsPerComponent`.
    pub const BITS_PER_COMPONENT: &str = "BitsPerComponent";
    /// `BPC` (inline-image abbreviation of [`BITS_PER_COMPONENT`]).
    pub const BPC: &str = "BPC";
    /// `ColorSpace`.
    pub const COLORSPACE: &str = "ColorSpace";
    /// `CS` (inline-image abbreviation of [`COLORSPACE`]).
    pub const CS: &str = "CS";
    /// `Decode`.
    pub const DECODE: &str = "Decode";
    /// `D` (inline-image abbreviation of [`DECODE`]).
    pub const D: &str = "D";
    /// `Height`.
    pub const HEIGHT: &str = "Height";
    /// `H` (inline-image abbreviation of [`HEIGHT`]).
    pub const H: &str = "H";
    /// `Width`.
    pub const WIDTH: &str = "Width";
    /// `W` (inline-image abbreviation of [`WIDTH`]).
    pub const W: &str = "W";
    /// `ImageMask`.
    pub const IMAGE_MASK: &str = "ImageMask";
    /// `IM` (inline-image abbreviation of [`IMAGE_MASK`]).
    pub const IM: &str = "IM";
    /// `Interpolate`.
    pub const INTERPOLATE: &str = "Interpolate";
    /// `I` (inline-image abbreviation of [`INTERPOLATE`]).
    pub const I: &str = "I";
    /// `Matte`.
    pub const MATTE: &str = "Matte";
    /// `SMask`.
    pub const SMASK: &str = "SMask";
    /// `SMaskInData`.
    pub const SMASK_IN_DATA: &str = "SMaskInData";
    /// `Mask`.
    pub const MASK: &str = "Mask";
}
