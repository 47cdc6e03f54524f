//! Argument payloads.
//!
//! The list stores, moves and splices arguments but never interprets them,
//! except where a queue pattern has to compare transforms, fonts or images
//! structurally.

use std::sync::Arc;

use bytes::Bytes;
use smol_str::SmolStr;

use crate::utils::{Matrix, Rect};

/// The arguments of one operation, in evaluator order.
pub type Args = Vec<Arg>;

/// A single argument value.
#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    Null,
    Bool(bool),
    Int(i64),
    Number(f64),
    /// Resource identifier (font id, XObject id, dependency id).
    Name(SmolStr),
    String(Bytes),
    Array(Vec<Self>),
    Rect(Rect),
    Matrix(Matrix),
    /// Decoded image or mask samples.
    Image(Arc<ImageData>),
    /// Flattened (x, y) pairs of a repeat operation.
    Positions(Vec<f32>),
    /// Atlas placement map of an inline image group.
    Placements(Vec<ImagePlacement>),
    /// Per-instance masks of a mask group.
    MaskGroup(Vec<MaskGroupEntry>),
}

impl Arg {
    /// Creates a name argument.
    pub fn name(name: impl AsRef<str>) -> Self {
        Self::Name(SmolStr::new(name))
    }

    /// Creates an image argument.
    pub fn image(image: ImageData) -> Self {
        Self::Image(Arc::new(image))
    }

    /// Numeric value of an `Int` or `Number` argument.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Int(v) => Some(*v as f64),
            Self::Number(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_name(&self) -> Option<&str> {
        match self {
            Self::Name(name) => Some(name.as_str()),
            _ => None,
        }
    }

    pub const fn as_image(&self) -> Option<&Arc<ImageData>> {
        match self {
            Self::Image(image) => Some(image),
            _ => None,
        }
    }

    /// Identity comparison used by the queue patterns.
    ///
    /// Images compare by allocation, so two decodes of equal samples are
    /// different resources. Everything else compares by value.
    pub fn is_same_resource(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Image(a), Self::Image(b)) => Arc::ptr_eq(a, b),
            (Self::Image(_), _) | (_, Self::Image(_)) => false,
            _ => self == other,
        }
    }
}

/// Pixel layout of [`ImageData`] samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageKind {
    /// One bit per pixel, rows padded to whole bytes.
    Grayscale1Bpp,
    Rgb24Bpp,
    Rgba32Bpp,
}

impl ImageKind {
    /// Bytes per row for an image of `width` pixels.
    pub const fn row_bytes(self, width: u32) -> usize {
        let width = width as usize;
        match self {
            Self::Grayscale1Bpp => width.div_ceil(8),
            Self::Rgb24Bpp => width * 3,
            Self::Rgba32Bpp => width * 4,
        }
    }
}

/// Decoded image samples.
///
/// `cached` images are shared with a resource cache and are never listed
/// for ownership transfer when a chunk is flushed.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageData {
    pub width: u32,
    pub height: u32,
    pub kind: ImageKind,
    pub data: Bytes,
    pub cached: bool,
}

impl ImageData {
    pub fn new(width: u32, height: u32, kind: ImageKind, data: impl Into<Bytes>) -> Self {
        Self {
            width,
            height,
            kind,
            data: data.into(),
            cached: false,
        }
    }

    /// Marks the image as held by a resource cache.
    pub fn into_cached(mut self) -> Self {
        self.cached = true;
        self
    }

    /// Expected sample buffer length for the declared size and kind.
    pub const fn expected_len(&self) -> usize {
        self.kind.row_bytes(self.width) * self.height as usize
    }

    /// A 1x1 mask whose only sample is zero (or that carries no samples):
    /// drawing it is a plain fill of one device pixel.
    pub fn is_solid_unit_mask(&self) -> bool {
        self.width == 1
            && self.height == 1
            && (self.data.is_empty() || (self.data.len() == 1 && self.data[0] == 0))
    }
}

/// Where one inline image landed inside a group atlas.
#[derive(Debug, Clone, PartialEq)]
pub struct ImagePlacement {
    /// Arguments of the `transform` op that positioned this image.
    pub transform: Args,
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
}

/// One mask of a mask group, with the transform it was painted under.
#[derive(Debug, Clone, PartialEq)]
pub struct MaskGroupEntry {
    pub image: Arc<ImageData>,
    pub transform: Args,
}
