//! Inline image atlas packing.
//!
//! Small inline images (typically a pixel or two high) are packed row by row
//! into one RGBA atlas. Every image gets a border of `padding` pixels that
//! repeats its own edge pixels, so sampling at the image edge never picks up
//! a neighbour.

use std::sync::Arc;

use crate::model::{Args, ImageData, ImageKind, ImagePlacement};

/// A packed atlas and where each source image landed in it.
#[derive(Debug, Clone)]
pub(crate) struct Atlas {
    pub image: ImageData,
    pub map: Vec<ImagePlacement>,
}

/// True if `image` can be copied into an RGBA atlas.
pub(crate) fn is_packable(image: &ImageData) -> bool {
    image.kind == ImageKind::Rgba32Bpp && image.data.len() >= image.expected_len()
}

/// Packs `(transform args, image)` pairs into one atlas.
///
/// Every image must satisfy [`is_packable`].
pub(crate) fn pack(items: &[(Args, Arc<ImageData>)], max_width: u32, padding: u32) -> Atlas {
    let mut map = Vec::with_capacity(items.len());
    let mut max_x = 0u32;
    let mut current_x = padding;
    let mut current_y = padding;
    let mut line_height = 0u32;

    for (transform, image) in items {
        if current_x > padding && current_x + image.width > max_width {
            max_x = max_x.max(current_x);
            current_y += line_height + 2 * padding;
            current_x = padding;
            line_height = 0;
        }
        map.push(ImagePlacement {
            transform: transform.clone(),
            x: current_x,
            y: current_y,
            w: image.width,
            h: image.height,
        });
        current_x += image.width + 2 * padding;
        line_height = line_height.max(image.height);
    }

    let width = max_x.max(current_x).saturating_sub(padding);
    let height = current_y + line_height + padding;
    let stride = width as usize * 4;
    let mut data = vec![0u8; stride * height as usize];

    for (placement, (_, image)) in map.iter().zip(items) {
        blit_padded(&mut data, stride, placement, &image.data, padding);
    }

    Atlas {
        image: ImageData::new(width, height, ImageKind::Rgba32Bpp, data),
        map,
    }
}

fn blit_padded(dst: &mut [u8], stride: usize, at: &ImagePlacement, src: &[u8], padding: u32) {
    if at.w == 0 || at.h == 0 {
        return;
    }
    let row_size = at.w as usize * 4;
    let x = at.x as usize;
    let y = at.y as usize;
    let h = at.h as usize;
    let pad = padding as usize;

    for k in 0..h {
        let offset = (y + k) * stride + x * 4;
        dst[offset..offset + row_size].copy_from_slice(&src[k * row_size..(k + 1) * row_size]);
    }
    if pad == 0 {
        return;
    }

    // Rows above and below repeat the first and last image rows.
    let first_row = y * stride + x * 4;
    let last_row = (y + h - 1) * stride + x * 4;
    for d in 1..=pad {
        dst.copy_within(first_row..first_row + row_size, first_row - d * stride);
        dst.copy_within(last_row..last_row + row_size, last_row + d * stride);
    }

    // Columns left and right repeat the first and last pixel of every row,
    // padding rows included, which fills the corners too.
    for row in (y - pad)..(y + h + pad) {
        let left = row * stride + x * 4;
        let right = left + row_size - 4;
        for d in 1..=pad {
            dst.copy_within(left..left + 4, left - d * 4);
            dst.copy_within(right..right + 4, right + d * 4);
        }
    }
}
