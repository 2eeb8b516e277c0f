// file: src/segmentation/mask.rs
// description: binary coverage masks and their run-length encoded records
// reference: internal module structure

use crate::error::{Result, WorkbenchError};
use serde::{Deserialize, Serialize};

/// Axis-aligned box in pixels: left, top, width, height.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Mask {
    pub width: u32,
    pub height: u32,
    /// Row-major coverage, `width * height` entries
    pub bitmap: Vec<bool>,
    pub area: u64,
    pub bbox: BoundingBox,
    pub score: f32,
}

impl Mask {
    /// Derives area and bounding box from the bitmap.
    pub fn from_bitmap(width: u32, height: u32, bitmap: Vec<bool>, score: f32) -> Result<Self> {
        if bitmap.len() != width as usize * height as usize {
            return Err(WorkbenchError::Validation(format!(
                "mask bitmap has {} entries, expected {}x{}",
                bitmap.len(),
                width,
                height
            )));
        }

        let mut area = 0u64;
        let (mut min_x, mut min_y, mut max_x, mut max_y) = (u32::MAX, u32::MAX, 0u32, 0u32);
        for (i, _) in bitmap.iter().enumerate().filter(|(_, covered)| **covered) {
            let x = (i % width as usize) as u32;
            let y = (i / width as usize) as u32;
            area += 1;
            min_x = min_x.min(x);
            min_y = min_y.min(y);
            max_x = max_x.max(x);
            max_y = max_y.max(y);
        }

        let bbox = if area == 0 {
            BoundingBox {
                x: 0,
                y: 0,
                width: 0,
                height: 0,
            }
        } else {
            BoundingBox {
                x: min_x,
                y: min_y,
                width: max_x - min_x + 1,
                height: max_y - min_y + 1,
            }
        };

        Ok(Self {
            width,
            height,
            bitmap,
            area,
            bbox,
            score,
        })
    }

    pub fn covers(&self, x: u32, y: u32) -> bool {
        x < self.width && y < self.height && self.bitmap[(y * self.width + x) as usize]
    }

    /// Alternating run lengths over the row-major bitmap, starting with an
    /// uncovered run (possibly zero).
    pub fn rle_counts(&self) -> Vec<u64> {
        let mut counts = Vec::new();
        let mut current = false;
        let mut run = 0u64;
        for &covered in &self.bitmap {
            if covered == current {
                run += 1;
            } else {
                counts.push(run);
                current = covered;
                run = 1;
            }
        }
        counts.push(run);
        counts
    }

    pub fn to_record(&self, index: usize) -> MaskRecord {
        MaskRecord {
            index,
            area: self.area,
            bbox: self.bbox,
            score: self.score,
            size: [self.height, self.width],
            counts: self.rle_counts(),
        }
    }
}

/// One line of the serialised mask file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaskRecord {
    pub index: usize,
    pub area: u64,
    pub bbox: BoundingBox,
    pub score: f32,
    /// `[height, width]`
    pub size: [u32; 2],
    pub counts: Vec<u64>,
}

impl MaskRecord {
    pub fn decode(&self) -> Result<Mask> {
        let [height, width] = self.size;
        let mut bitmap = Vec::with_capacity(width as usize * height as usize);
        let mut covered = false;
        for &run in &self.counts {
            bitmap.extend(std::iter::repeat_n(covered, run as usize));
            covered = !covered;
        }
        Mask::from_bitmap(width, height, bitmap, self.score)
    }
}
