// file: src/segmentation/mod.rs
// description: automatic mask generation behind a pluggable generator
// reference: internal module structure

pub mod mask;
pub mod render;
#[cfg(feature = "sam")]
pub mod sam;
pub mod segmenter;

pub use mask::{BoundingBox, Mask, MaskRecord};
pub use segmenter::{EnhanceRequest, Segmenter, SegmenterState};

use crate::config::SegmentationConfig;
use crate::error::{Result, WorkbenchError};
use image::RgbImage;
use std::str::FromStr;

/// Produces coverage masks for a whole image.
pub trait MaskGenerator: Send + Sync {
    fn name(&self) -> String;

    fn generate(&self, image: &RgbImage) -> Result<Vec<Mask>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamVariant {
    VitH,
    VitL,
    VitB,
}

impl SamVariant {
    pub fn name(self) -> &'static str {
        match self {
            SamVariant::VitH => "vit_h",
            SamVariant::VitL => "vit_l",
            SamVariant::VitB => "vit_b",
        }
    }
}

impl FromStr for SamVariant {
    type Err = WorkbenchError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "vit_h" => Ok(SamVariant::VitH),
            "vit_l" => Ok(SamVariant::VitL),
            "vit_b" => Ok(SamVariant::VitB),
            other => Err(WorkbenchError::Configuration(format!(
                "unknown segmentation model variant '{}', expected vit_h, vit_l or vit_b",
                other
            ))),
        }
    }
}

/// Loads the configured model. The checkpoint must exist before any backend is tried.
pub fn load_generator(config: &SegmentationConfig) -> Result<Box<dyn MaskGenerator>> {
    let variant: SamVariant = config.variant.parse()?;
    if !config.checkpoint.is_file() {
        return Err(WorkbenchError::model_load(
            &config.checkpoint,
            "checkpoint file not found",
        ));
    }
    load_sam(config, variant)
}

#[cfg(feature = "sam")]
fn load_sam(config: &SegmentationConfig, variant: SamVariant) -> Result<Box<dyn MaskGenerator>> {
    Ok(Box::new(sam::SamGenerator::load(config, variant)?))
}

#[cfg(not(feature = "sam"))]
fn load_sam(config: &SegmentationConfig, variant: SamVariant) -> Result<Box<dyn MaskGenerator>> {
    Err(WorkbenchError::model_load(
        &config.checkpoint,
        format!(
            "{} requires building with the `sam` feature",
            variant.name()
        ),
    ))
}
