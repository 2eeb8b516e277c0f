// file: src/segmentation/sam.rs
// description: segment anything automatic mask generation on candle
// reference: https://github.com/huggingface/candle/tree/main/candle-examples/examples/segment-anything

use super::mask::Mask;
use super::{MaskGenerator, SamVariant};
use crate::config::SegmentationConfig;
use crate::error::{Result, WorkbenchError};
use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::segment_anything::sam::{IMAGE_SIZE, Sam};
use image::RgbImage;
use image::imageops::{self, FilterType};
use tracing::{debug, info};

const CROP_LAYERS: usize = 0;
const CROP_OVERLAP_RATIO: f64 = 512.0 / 1500.0;
const CROP_POINTS_DOWNSCALE: usize = 1;

pub struct SamGenerator {
    model: Sam,
    device: Device,
    variant: SamVariant,
    points_per_side: usize,
}

impl SamGenerator {
    pub fn load(config: &SegmentationConfig, variant: SamVariant) -> Result<Self> {
        let device = if config.use_gpu {
            Device::cuda_if_available(0)
                .map_err(|e| WorkbenchError::model_load(&config.checkpoint, e.to_string()))?
        } else {
            Device::Cpu
        };

        let load_err = |e: candle_core::Error| WorkbenchError::model_load(&config.checkpoint, e.to_string());

        // SAFETY: the checkpoint is memory mapped read-only and not modified while loaded
        let vb = unsafe {
            VarBuilder::from_mmaped_safetensors(&[&config.checkpoint], DType::F32, &device)
                .map_err(load_err)?
        };

        let (embed_dim, depth, heads, global_attn): (usize, usize, usize, &[usize]) = match variant {
            SamVariant::VitB => (768, 12, 12, &[2, 5, 8, 11]),
            SamVariant::VitL => (1024, 24, 16, &[5, 11, 17, 23]),
            SamVariant::VitH => (1280, 32, 16, &[7, 15, 23, 31]),
        };
        let model = Sam::new(embed_dim, depth, heads, global_attn, vb).map_err(load_err)?;

        info!(
            "Loaded SAM {} from {} on {}",
            variant.name(),
            config.checkpoint.display(),
            if device.is_cpu() { "cpu" } else { "gpu" }
        );

        Ok(Self {
            model,
            device,
            variant,
            points_per_side: config.points_per_side,
        })
    }

    fn input_tensor(&self, image: &RgbImage) -> candle_core::Result<Tensor> {
        let (width, height) = image.dimensions();
        let scale = IMAGE_SIZE as f64 / width.max(height) as f64;
        let w = ((width as f64 * scale).round() as u32).max(1);
        let h = ((height as f64 * scale).round() as u32).max(1);
        let resized = imageops::resize(image, w, h, FilterType::Triangle);
        Tensor::from_vec(resized.into_raw(), (h as usize, w as usize, 3), &self.device)?
            .permute((2, 0, 1))
    }

    /// Model-resolution logits and confidence for each candidate.
    fn candidate_logits(&self, image: &RgbImage) -> candle_core::Result<Vec<(Vec<Vec<f32>>, f32)>> {
        let input = self.input_tensor(image)?;
        let boxes = self.model.generate_masks(
            &input,
            self.points_per_side,
            CROP_LAYERS,
            CROP_OVERLAP_RATIO,
            CROP_POINTS_DOWNSCALE,
        )?;
        debug!("SAM produced {} candidate masks", boxes.len());

        let mut candidates = Vec::with_capacity(boxes.len());
        for candidate in boxes {
            let data = if candidate.data.rank() == 3 {
                candidate.data.squeeze(0)?
            } else {
                candidate.data
            };
            let rows = data.to_dtype(DType::F32)?.to_vec2::<f32>()?;
            candidates.push((rows, candidate.confidence));
        }
        Ok(candidates)
    }
}

fn masks_from_logits(
    candidates: Vec<(Vec<Vec<f32>>, f32)>,
    width: u32,
    height: u32,
) -> Result<Vec<Mask>> {
    candidates
        .into_iter()
        .map(|(rows, confidence)| {
            Mask::from_bitmap(width, height, rescale_nearest(&rows, width, height), confidence)
        })
        .collect()
}

/// Thresholds at zero and maps the model-resolution grid onto the source size.
fn rescale_nearest(rows: &[Vec<f32>], width: u32, height: u32) -> Vec<bool> {
    let src_h = rows.len();
    let src_w = rows.first().map_or(0, |r| r.len());
    let mut out = vec![false; width as usize * height as usize];
    if src_h == 0 || src_w == 0 {
        return out;
    }
    for y in 0..height as usize {
        let sy = (y * src_h / height as usize).min(src_h - 1);
        for x in 0..width as usize {
            let sx = (x * src_w / width as usize).min(src_w - 1);
            out[y * width as usize + x] = rows[sy][sx] > 0.0;
        }
    }
    out
}

impl MaskGenerator for SamGenerator {
    fn name(&self) -> String {
        format!("sam-{}", self.variant.name())
    }

    fn generate(&self, image: &RgbImage) -> Result<Vec<Mask>> {
        let candidates = self
            .candidate_logits(image)
            .map_err(|e| WorkbenchError::generation_with("mask generation failed", e))?;
        let (width, height) = image.dimensions();
        masks_from_logits(candidates, width, height)
    }
}
