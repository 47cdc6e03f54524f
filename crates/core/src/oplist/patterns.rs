//! Queue patterns recognised by the optimizer.
//!
//! Each pattern is a fixed start sequence of tags, an optional guard run once
//! the start sequence is complete, a continuation test applied to every
//! following operation, and a rewrite run when the continuation test fails
//! (or the queue is flushed). The rewrite receives the index of the first
//! operation of the run and the first index past it, and returns the index
//! scanning resumes from.

use std::sync::Arc;

use tracing::trace;

use super::atlas;
use super::list::OpQueue;
use super::params::PatternLimits;
use crate::model::{Arg, Args, ImageData, MaskGroupEntry, OpCode};

/// One entry of the static pattern table.
pub(crate) struct Pattern {
    pub name: &'static str,
    pub start: &'static [OpCode],
    /// Guard evaluated once on the completed start sequence at `first`.
    pub check: Option<fn(&OpQueue, usize) -> bool>,
    /// Whether the operation at `i` continues the run starting at `first`.
    pub iterate: fn(&OpQueue, usize, usize) -> bool,
    /// Rewrites the run `[first, end)`; returns where scanning resumes.
    pub process: fn(&mut OpQueue, usize, usize, &PatternLimits) -> usize,
}

pub(crate) const PATTERN_COUNT: usize = 4;

pub(crate) static PATTERNS: [Pattern; PATTERN_COUNT] = [
    Pattern {
        name: "inline image group",
        start: &[
            OpCode::SAVE,
            OpCode::TRANSFORM,
            OpCode::PAINT_INLINE_IMAGE,
            OpCode::RESTORE,
        ],
        check: Some(check_inline_image_group),
        iterate: iterate_inline_image_group,
        process: process_inline_image_group,
    },
    Pattern {
        name: "image mask group",
        start: &[
            OpCode::SAVE,
            OpCode::TRANSFORM,
            OpCode::PAINT_IMAGE_MASK,
            OpCode::RESTORE,
        ],
        check: None,
        iterate: iterate_image_mask_group,
        process: process_image_mask_group,
    },
    Pattern {
        name: "image repeat",
        start: &[
            OpCode::SAVE,
            OpCode::TRANSFORM,
            OpCode::PAINT_IMAGE,
            OpCode::RESTORE,
        ],
        check: Some(check_image_group),
        iterate: iterate_image_group,
        process: process_image_group,
    },
    Pattern {
        name: "glyph run batch",
        start: &[
            OpCode::BEGIN_TEXT,
            OpCode::SET_FONT,
            OpCode::SET_TEXT_MATRIX,
            OpCode::SHOW_TEXT,
            OpCode::END_TEXT,
        ],
        check: None,
        iterate: iterate_show_text_group,
        process: process_show_text_group,
    },
];

/// True if some pattern starts with `op`.
pub(crate) fn starts_pattern(op: OpCode) -> bool {
    PATTERNS.iter().any(|p| p.start[0] == op)
}

fn number(args: &Args, k: usize) -> Option<f64> {
    args.get(k).and_then(Arg::as_number)
}

/// A transform without skew or rotation.
fn is_translation_only(transform: &Args) -> bool {
    number(transform, 1) == Some(0.0) && number(transform, 2) == Some(0.0)
}

/// `other` has no skew and the same scale as `first`.
fn same_scale(first: &Args, other: &Args) -> bool {
    is_translation_only(other)
        && number(first, 0).is_some()
        && number(other, 0) == number(first, 0)
        && number(other, 3) == number(first, 3)
}

fn same_args(a: &Args, b: &Args) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.is_same_resource(y))
}

fn first_image(queue: &OpQueue, idx: usize) -> Option<&Arc<ImageData>> {
    queue.args[idx].first().and_then(Arg::as_image)
}

fn translation_positions(queue: &OpQueue, first_transform: usize, count: usize) -> Vec<f32> {
    let mut positions = Vec::with_capacity(count * 2);
    for q in 0..count {
        let transform = &queue.args[first_transform + 4 * q];
        positions.push(number(transform, 4).unwrap_or(0.0) as f32);
        positions.push(number(transform, 5).unwrap_or(0.0) as f32);
    }
    positions
}

/// Index scanning resumes from when a run of `group`-sized groups is left
/// untouched: the start of its trailing incomplete group.
const fn skip_run(first: usize, end: usize, group: usize) -> usize {
    end - (end - first) % group
}

fn iterate_quartet(queue: &OpQueue, first: usize, i: usize, paint: OpCode) -> bool {
    let expected = match (i - first) % 4 {
        0 => OpCode::SAVE,
        1 => OpCode::TRANSFORM,
        2 => paint,
        _ => OpCode::RESTORE,
    };
    queue.ops[i] == expected
}

// save, transform, paintInlineImage, restore

fn check_inline_image_group(queue: &OpQueue, first: usize) -> bool {
    first_image(queue, first + 2).is_some_and(|image| atlas::is_packable(image))
}

fn iterate_inline_image_group(queue: &OpQueue, first: usize, i: usize) -> bool {
    if !iterate_quartet(queue, first, i, OpCode::PAINT_INLINE_IMAGE) {
        return false;
    }
    if (i - first) % 4 == 2 {
        return first_image(queue, i).is_some_and(|image| atlas::is_packable(image));
    }
    true
}

fn process_inline_image_group(
    queue: &mut OpQueue,
    first: usize,
    end: usize,
    limits: &PatternLimits,
) -> usize {
    let count = ((end - first) / 4).min(limits.max_inline_images);
    if count < limits.min_inline_images {
        return skip_run(first, end, 4);
    }

    let items: Option<Vec<(Args, Arc<ImageData>)>> = (0..count)
        .map(|q| {
            let base = first + 4 * q;
            let image = first_image(queue, base + 2)?;
            Some((queue.args[base + 1].clone(), Arc::clone(image)))
        })
        .collect();
    let Some(items) = items else {
        return skip_run(first, end, 4);
    };

    let packed = atlas::pack(&items, limits.max_atlas_width, limits.atlas_padding);
    trace!(
        pattern = PATTERNS[0].name,
        count,
        width = packed.image.width,
        height = packed.image.height,
        "collapsed run"
    );
    queue.splice_one(
        first..first + 4 * count,
        OpCode::PAINT_INLINE_IMAGE_GROUP,
        vec![Arg::image(packed.image), Arg::Placements(packed.map)],
    );
    first + 1
}

// save, transform, paintImageMask, restore

fn iterate_image_mask_group(queue: &OpQueue, first: usize, i: usize) -> bool {
    iterate_quartet(queue, first, i, OpCode::PAINT_IMAGE_MASK)
}

/// Retags the leading solid 1x1 masks of a run and returns how many there were.
fn retag_solid_masks(queue: &mut OpQueue, first: usize, count: usize) -> usize {
    let mut converted = 0;
    while converted < count {
        let idx = first + 4 * converted + 2;
        let args = &queue.args[idx];
        let solid = args.len() == 1
            && args[0]
                .as_image()
                .is_some_and(|image| image.is_solid_unit_mask());
        if !solid {
            break;
        }
        queue.ops[idx] = OpCode::PAINT_SOLID_COLOR_IMAGE_MASK;
        converted += 1;
    }
    converted
}

fn process_image_mask_group(
    queue: &mut OpQueue,
    first: usize,
    end: usize,
    limits: &PatternLimits,
) -> usize {
    let mut count = (end - first) / 4;
    let solid = retag_solid_masks(queue, first, count);
    let first = first + 4 * solid;
    count -= solid;
    if count < limits.min_image_masks {
        return skip_run(first, end, 4);
    }

    let first_transform = first + 1;
    let Some(mask) = first_image(queue, first + 2).cloned() else {
        return skip_run(first, end, 4);
    };
    let mask_arg = Arg::Image(Arc::clone(&mask));

    let mut is_same_image = is_translation_only(&queue.args[first_transform]);
    if is_same_image {
        let head = &queue.args[first_transform];
        for q in 1..count {
            let transform = &queue.args[first_transform + 4 * q];
            let same_mask = queue.args[first + 2 + 4 * q]
                .first()
                .is_some_and(|arg| arg.is_same_resource(&mask_arg));
            if !same_mask || !same_scale(head, transform) {
                if q < limits.min_image_masks {
                    is_same_image = false;
                } else {
                    count = q;
                }
                break;
            }
        }
    }

    if is_same_image {
        let count = count.min(limits.max_same_image_masks);
        let head = &queue.args[first_transform];
        let scale_x = number(head, 0).unwrap_or(1.0);
        let scale_y = number(head, 3).unwrap_or(1.0);
        let positions = translation_positions(queue, first_transform, count);
        trace!(pattern = PATTERNS[1].name, count, "collapsed run into mask repeat");
        queue.splice_one(
            first..first + 4 * count,
            OpCode::PAINT_IMAGE_MASK_REPEAT,
            vec![
                mask_arg,
                Arg::Number(scale_x),
                Arg::Number(scale_y),
                Arg::Positions(positions),
            ],
        );
    } else {
        let count = count.min(limits.max_image_masks);
        let entries: Option<Vec<MaskGroupEntry>> = (0..count)
            .map(|q| {
                let image = first_image(queue, first + 2 + 4 * q)?;
                Some(MaskGroupEntry {
                    image: Arc::clone(image),
                    transform: queue.args[first_transform + 4 * q].clone(),
                })
            })
            .collect();
        let Some(entries) = entries else {
            return skip_run(first, end, 4);
        };
        trace!(pattern = PATTERNS[1].name, count, "collapsed run into mask group");
        queue.splice_one(
            first..first + 4 * count,
            OpCode::PAINT_IMAGE_MASK_GROUP,
            vec![Arg::MaskGroup(entries)],
        );
    }

    first + 1
}

// save, transform, paintImage, restore

fn check_image_group(queue: &OpQueue, first: usize) -> bool {
    is_translation_only(&queue.args[first + 1])
}

fn iterate_image_group(queue: &OpQueue, first: usize, i: usize) -> bool {
    if !iterate_quartet(queue, first, i, OpCode::PAINT_IMAGE) {
        return false;
    }
    match (i - first) % 4 {
        1 => same_scale(&queue.args[first + 1], &queue.args[i]),
        2 => match (queue.args[first + 2].first(), queue.args[i].first()) {
            (Some(head), Some(arg)) => arg.is_same_resource(head),
            _ => false,
        },
        _ => true,
    }
}

fn process_image_group(
    queue: &mut OpQueue,
    first: usize,
    end: usize,
    limits: &PatternLimits,
) -> usize {
    let count = ((end - first) / 4).min(limits.max_images);
    if count < limits.min_images {
        return skip_run(first, end, 4);
    }

    let first_transform = first + 1;
    let head = &queue.args[first_transform];
    let scale_x = number(head, 0).unwrap_or(1.0);
    let scale_y = number(head, 3).unwrap_or(1.0);
    let image = queue.args[first + 2].first().cloned().unwrap_or(Arg::Null);
    let positions = translation_positions(queue, first_transform, count);

    trace!(pattern = PATTERNS[2].name, count, "collapsed run");
    queue.splice_one(
        first..first + 4 * count,
        OpCode::PAINT_IMAGE_REPEAT,
        vec![
            image,
            Arg::Number(scale_x),
            Arg::Number(scale_y),
            Arg::Positions(positions),
        ],
    );
    first + 1
}

// beginText, setFont, setTextMatrix, showText, endText

fn iterate_show_text_group(queue: &OpQueue, first: usize, i: usize) -> bool {
    let ops = &queue.ops;
    match (i - first) % 5 {
        0 => ops[i] == OpCode::BEGIN_TEXT,
        1 => ops[i] == OpCode::SET_FONT && same_args(&queue.args[first + 1], &queue.args[i]),
        2 => ops[i] == OpCode::SET_TEXT_MATRIX,
        3 => ops[i] == OpCode::SHOW_TEXT,
        _ => ops[i] == OpCode::END_TEXT,
    }
}

fn process_show_text_group(
    queue: &mut OpQueue,
    first: usize,
    end: usize,
    limits: &PatternLimits,
) -> usize {
    let mut count = ((end - first) / 5).min(limits.max_glyph_runs);
    if count < limits.min_glyph_runs {
        return skip_run(first, end, 5);
    }

    // A preceding (<anything>, setFont, setTextMatrix, showText, endText)
    // with the same font joins the batch; <anything> is typically the font's
    // dependency op emitted right after beginText.
    let mut end_text = first + 4;
    if first >= 4
        && queue.ops[first - 4..first]
            == [
                OpCode::SET_FONT,
                OpCode::SET_TEXT_MATRIX,
                OpCode::SHOW_TEXT,
                OpCode::END_TEXT,
            ]
        && same_args(&queue.args[first - 4], &queue.args[first + 1])
    {
        count += 1;
        end_text = first - 1;
    }

    // Drop every (endText, beginText, setFont) trio between the groups.
    let span = end_text..end_text + 5 * (count - 1);
    queue.retain_in(span, |offset| offset % 5 >= 3);

    trace!(pattern = PATTERNS[3].name, count, "collapsed run");
    end_text + 2 * (count - 1) + 1
}
