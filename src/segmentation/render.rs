// file: src/segmentation/render.rs
// description: translucent random-colour mask overlays
// reference: https://docs.rs/rand

use super::mask::Mask;
use crate::error::{Result, WorkbenchError};
use image::{Rgb, RgbImage};
use rand::Rng;

pub const OVERLAY_ALPHA: f32 = 0.35;

/// Mask indices by descending area. Equal areas keep their input order.
pub fn paint_order(masks: &[Mask]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..masks.len()).collect();
    order.sort_by(|a, b| masks[*b].area.cmp(&masks[*a].area));
    order
}

fn blend(base: u8, colour: u8) -> u8 {
    let mixed = (1.0 - OVERLAY_ALPHA) * base as f32 + OVERLAY_ALPHA * colour as f32;
    mixed.round().clamp(0.0, 255.0) as u8
}

/// Paints masks largest first so smaller ones stay visible on top.
pub fn overlay<R: Rng>(source: &RgbImage, masks: &[Mask], rng: &mut R) -> Result<RgbImage> {
    let mut out = source.clone();
    let (width, height) = source.dimensions();

    for index in paint_order(masks) {
        let mask = &masks[index];
        if (mask.width, mask.height) != (width, height) {
            return Err(WorkbenchError::Validation(format!(
                "mask {} is {}x{} but the image is {}x{}",
                index, mask.width, mask.height, width, height
            )));
        }
        let colour = [
            rng.gen_range(0..=255u8),
            rng.gen_range(0..=255u8),
            rng.gen_range(0..=255u8),
        ];
        for (i, _) in mask.bitmap.iter().enumerate().filter(|(_, c)| **c) {
            let (x, y) = ((i as u32) % width, (i as u32) / width);
            let px = out.get_pixel(x, y).0;
            out.put_pixel(
                x,
                y,
                Rgb([
                    blend(px[0], colour[0]),
                    blend(px[1], colour[1]),
                    blend(px[2], colour[2]),
                ]),
            );
        }
    }
    Ok(out)
}
