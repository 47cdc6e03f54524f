//! Operation tags.
//!
//! The evaluator owns the meaning of every tag. This crate only names the
//! tags it has to recognise for chunking, dependency bookkeeping, transfer
//! lists and queue optimization; every other value passes through untouched.

use std::fmt;

/// An operation tag: a small integer identifying one rendering instruction.
///
/// Tags start at 1 so that a zeroed tag is easy to spot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OpCode(pub u8);

impl OpCode {
    pub const DEPENDENCY: Self = Self(1);
    pub const SAVE: Self = Self(10);
    pub const RESTORE: Self = Self(11);
    pub const TRANSFORM: Self = Self(12);
    pub const BEGIN_TEXT: Self = Self(31);
    pub const END_TEXT: Self = Self(32);
    pub const SET_FONT: Self = Self(37);
    pub const SET_TEXT_MATRIX: Self = Self(42);
    pub const SHOW_TEXT: Self = Self(44);
    pub const BEGIN_ANNOTATIONS: Self = Self(78);
    pub const END_ANNOTATIONS: Self = Self(79);
    pub const BEGIN_ANNOTATION: Self = Self(80);
    pub const END_ANNOTATION: Self = Self(81);
    pub const PAINT_IMAGE_MASK: Self = Self(83);
    pub const PAINT_IMAGE_MASK_GROUP: Self = Self(84);
    pub const PAINT_IMAGE: Self = Self(85);
    pub const PAINT_INLINE_IMAGE: Self = Self(86);
    pub const PAINT_INLINE_IMAGE_GROUP: Self = Self(87);
    pub const PAINT_IMAGE_REPEAT: Self = Self(88);
    pub const PAINT_IMAGE_MASK_REPEAT: Self = Self(89);
    pub const PAINT_SOLID_COLOR_IMAGE_MASK: Self = Self(90);

    const NAMED: [(Self, &'static str); 21] = [
        (Self::DEPENDENCY, "dependency"),
        (Self::SAVE, "save"),
        (Self::RESTORE, "restore"),
        (Self::TRANSFORM, "transform"),
        (Self::BEGIN_TEXT, "beginText"),
        (Self::END_TEXT, "endText"),
        (Self::SET_FONT, "setFont"),
        (Self::SET_TEXT_MATRIX, "setTextMatrix"),
        (Self::SHOW_TEXT, "showText"),
        (Self::BEGIN_ANNOTATIONS, "beginAnnotations"),
        (Self::END_ANNOTATIONS, "endAnnotations"),
        (Self::BEGIN_ANNOTATION, "beginAnnotation"),
        (Self::END_ANNOTATION, "endAnnotation"),
        (Self::PAINT_IMAGE_MASK, "paintImageMaskXObject"),
        (Self::PAINT_IMAGE_MASK_GROUP, "paintImageMaskXObjectGroup"),
        (Self::PAINT_IMAGE, "paintImageXObject"),
        (Self::PAINT_INLINE_IMAGE, "paintInlineImageXObject"),
        (Self::PAINT_INLINE_IMAGE_GROUP, "paintInlineImageXObjectGroup"),
        (Self::PAINT_IMAGE_REPEAT, "paintImageXObjectRepeat"),
        (Self::PAINT_IMAGE_MASK_REPEAT, "paintImageMaskXObjectRepeat"),
        (Self::PAINT_SOLID_COLOR_IMAGE_MASK, "paintSolidColorImageMask"),
    ];

    /// Name of a tag this crate knows about, if any.
    pub fn name(self) -> Option<&'static str> {
        Self::NAMED
            .iter()
            .find(|(op, _)| *op == self)
            .map(|(_, name)| *name)
    }

    /// Looks a tag up by the name returned from [`OpCode::name`].
    pub fn from_name(name: &str) -> Option<Self> {
        Self::NAMED
            .iter()
            .find(|(_, n)| *n == name)
            .map(|(op, _)| *op)
    }
}

impl From<u8> for OpCode {
    fn from(value: u8) -> Self {
        Self(value)
    }
}

impl fmt::Display for OpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => f.write_str(name),
            None => write!(f, "op#{}", self.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip_and_unknown_tags_print_numerically() {
        assert_eq!(OpCode::from_name("save"), Some(OpCode::SAVE));
        assert_eq!(OpCode::RESTORE.to_string(), "restore");
        assert_eq!(OpCode(13).to_string(), "op#13");
        assert_eq!(OpCode::from_name("moveTo"), None);
    }
}
