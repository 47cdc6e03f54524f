//! Chunking and queue optimization parameters.
//!
//! The pattern thresholds are tuning constants calibrated against real
//! documents. Their relative order matters more than the exact values: the
//! same-mask repeat cap is much larger than the mask group cap, and plain
//! image repeats start matching at a lower count than masks.

use crate::error::{RenderError, Result};

/// Controls when an operator list with a sink flushes on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkParams {
    /// Flush once this many operations were appended since the last flush.
    pub chunk_size: usize,

    /// Within this distance of `chunk_size`, flush early on a `restore` or
    /// `endText` so that chunks tend to end on a scope boundary.
    pub boundary_margin: usize,
}

impl Default for ChunkParams {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            boundary_margin: 5,
        }
    }
}

impl ChunkParams {
    /// Weight at which a scope-closing operation triggers an early flush.
    pub const fn near_mark(&self) -> usize {
        self.chunk_size.saturating_sub(self.boundary_margin)
    }
}

/// Minimum and maximum group counts for each queue pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatternLimits {
    /// Fewest `save, transform, paintInlineImage, restore` groups that are packed.
    pub min_inline_images: usize,
    /// Most inline images packed into one atlas.
    pub max_inline_images: usize,
    /// Widest atlas row, in pixels, before wrapping to a new row.
    pub max_atlas_width: u32,
    /// Border replicated around every image in the atlas.
    pub atlas_padding: u32,

    /// Fewest mask groups that are batched.
    pub min_image_masks: usize,
    /// Most masks in a group of differing masks.
    pub max_image_masks: usize,
    /// Most repeats of the same translated mask.
    pub max_same_image_masks: usize,

    /// Fewest repeats of the same translated image.
    pub min_images: usize,
    /// Most repeats of the same translated image.
    pub max_images: usize,

    /// Fewest text wrappers sharing one font that are merged.
    pub min_glyph_runs: usize,
    /// Most text wrappers merged into one.
    pub max_glyph_runs: usize,
}

impl Default for PatternLimits {
    fn default() -> Self {
        Self {
            min_inline_images: 10,
            max_inline_images: 200,
            max_atlas_width: 1000,
            atlas_padding: 1,
            min_image_masks: 10,
            max_image_masks: 100,
            max_same_image_masks: 1000,
            min_images: 3,
            max_images: 1000,
            min_glyph_runs: 3,
            max_glyph_runs: 1000,
        }
    }
}

impl PatternLimits {
    /// Checks that every minimum is positive and no cap is below its minimum.
    pub fn validate(&self) -> Result<()> {
        let pairs = [
            ("inline images", self.min_inline_images, self.max_inline_images),
            ("image masks", self.min_image_masks, self.max_image_masks),
            (
                "same image masks",
                self.min_image_masks,
                self.max_same_image_masks,
            ),
            ("images", self.min_images, self.max_images),
            ("glyph runs", self.min_glyph_runs, self.max_glyph_runs),
        ];
        for (what, min, max) in pairs {
            if min == 0 {
                return Err(RenderError::InvalidLimits(format!(
                    "minimum for {what} must be positive"
                )));
            }
            if max < min {
                return Err(RenderError::InvalidLimits(format!(
                    "cap for {what} ({max}) is below its minimum ({min})"
                )));
            }
        }
        if self.max_atlas_width == 0 {
            return Err(RenderError::InvalidLimits(
                "atlas width must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
