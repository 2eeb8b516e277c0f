// file: src/segmentation/segmenter.rs
// description: segmentation session moving from model load to rendered masks
// reference: internal module structure

use super::mask::Mask;
use super::render;
use super::{MaskGenerator, load_generator};
use crate::config::SegmentationConfig;
use crate::error::{Result, WorkbenchError};
use crate::imaging::{self, ImagePipeline, Transform};
use crate::utils::{OperationTimer, Validator};
use image::RgbImage;
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmenterState {
    Uninitialized,
    ModelLoaded,
    ImageSet,
    MasksGenerated,
}

/// A single transform name or an ordered chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnhanceRequest {
    Single(String),
    Sequence(Vec<String>),
}

impl From<&str> for EnhanceRequest {
    fn from(name: &str) -> Self {
        EnhanceRequest::Single(name.to_string())
    }
}

impl From<Vec<String>> for EnhanceRequest {
    fn from(names: Vec<String>) -> Self {
        EnhanceRequest::Sequence(names)
    }
}

pub struct Segmenter {
    generator: Option<Box<dyn MaskGenerator>>,
    image: Option<RgbImage>,
    source: Option<PathBuf>,
    masks: Option<Vec<Mask>>,
    seed: Option<u64>,
}

impl Segmenter {
    pub fn new(seed: Option<u64>) -> Self {
        Self {
            generator: None,
            image: None,
            source: None,
            masks: None,
            seed,
        }
    }

    /// Loads the configured checkpoint. Load failures are fatal.
    pub fn load(config: &SegmentationConfig) -> Result<Self> {
        let mut segmenter = Self::new(config.seed);
        segmenter.attach_generator(load_generator(config)?);
        Ok(segmenter)
    }

    pub fn with_generator(generator: Box<dyn MaskGenerator>, seed: Option<u64>) -> Self {
        let mut segmenter = Self::new(seed);
        segmenter.attach_generator(generator);
        segmenter
    }

    pub fn attach_generator(&mut self, generator: Box<dyn MaskGenerator>) {
        info!("Mask generator ready: {}", generator.name());
        self.generator = Some(generator);
    }

    pub fn state(&self) -> SegmenterState {
        match (&self.generator, &self.image, &self.masks) {
            (None, _, _) => SegmenterState::Uninitialized,
            (Some(_), None, _) => SegmenterState::ModelLoaded,
            (Some(_), Some(_), None) => SegmenterState::ImageSet,
            (Some(_), Some(_), Some(_)) => SegmenterState::MasksGenerated,
        }
    }

    pub fn image(&self) -> Option<&RgbImage> {
        self.image.as_ref()
    }

    pub fn masks(&self) -> Option<&[Mask]> {
        self.masks.as_deref()
    }

    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    fn require_model(&self, operation: &'static str) -> Result<&dyn MaskGenerator> {
        self.generator
            .as_deref()
            .ok_or(WorkbenchError::InvalidState {
                operation,
                required: "a loaded segmentation model",
            })
    }

    fn require_image(&self, operation: &'static str) -> Result<&RgbImage> {
        self.require_model(operation)?;
        self.image.as_ref().ok_or(WorkbenchError::InvalidState {
            operation,
            required: "an image (call set_image first)",
        })
    }

    fn require_masks(&self, operation: &'static str) -> Result<&[Mask]> {
        self.require_image(operation)?;
        self.masks.as_deref().ok_or(WorkbenchError::InvalidState {
            operation,
            required: "generated masks (call run first)",
        })
    }

    /// Decodes `path` to RGB and discards any previous masks.
    pub fn set_image(&mut self, path: &Path) -> Result<()> {
        self.require_model("set_image")?;
        let image = imaging::load_rgb(path)?;
        info!(
            "Image set: {} ({}x{})",
            path.display(),
            image.width(),
            image.height()
        );
        self.set_image_buffer(image);
        self.source = Some(path.to_path_buf());
        Ok(())
    }

    pub fn set_image_buffer(&mut self, image: RgbImage) {
        self.image = Some(image);
        self.source = None;
        self.masks = None;
    }

    /// Runs the request on a copy of the working image. With `commit` the
    /// result becomes the working image and stale masks are dropped.
    pub fn enhance(&mut self, request: impl Into<EnhanceRequest>, commit: bool) -> Result<RgbImage> {
        let mut pipeline = ImagePipeline::new(self.require_image("enhance")?.clone());

        match request.into() {
            EnhanceRequest::Single(name) => {
                let transform: Transform = name.parse()?;
                pipeline.apply(transform);
            }
            EnhanceRequest::Sequence(names) => {
                let report = pipeline.apply_sequence(&names);
                if !report.is_clean() {
                    warn!("Rejected transforms: {}", report.rejected.join(", "));
                }
            }
        }

        let enhanced = pipeline.into_current();
        if commit {
            self.image = Some(enhanced.clone());
            self.masks = None;
        }
        Ok(enhanced)
    }

    pub fn run(&mut self) -> Result<&[Mask]> {
        let image = self.require_image("run")?;
        let generator = self.require_model("run")?;
        let timer = OperationTimer::new("mask generation");
        let masks = generator.generate(image)?;
        info!("Generated {} masks", masks.len());
        timer.finish();
        Ok(self.masks.insert(masks).as_slice())
    }

    pub fn set_and_run(&mut self, path: &Path) -> Result<&[Mask]> {
        self.set_image(path)?;
        self.run()
    }

    /// Overlays the masks on the working image, saving when `output` is given.
    pub fn render(&self, output: Option<&Path>) -> Result<RgbImage> {
        let masks = self.require_masks("render")?;
        let image = self.require_image("render")?;
        let mut rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let annotated = render::overlay(image, masks, &mut rng)?;
        if let Some(path) = output {
            imaging::save_rgb(&annotated, path)?;
            info!("Annotated image saved to {}", path.display());
        }
        Ok(annotated)
    }

    /// Writes one JSON record per mask, in generation order.
    pub fn serialize(&self, path: &Path) -> Result<usize> {
        let masks = self.require_masks("serialize")?;
        Validator::ensure_parent_dir(path)?;
        let file = std::fs::File::create(path).map_err(|source| WorkbenchError::FileOperation {
            path: path.to_path_buf(),
            source,
        })?;
        let mut writer = BufWriter::new(file);
        for (index, mask) in masks.iter().enumerate() {
            serde_json::to_writer(&mut writer, &mask.to_record(index))?;
            writer.write_all(b"\n")?;
        }
        writer.flush()?;
        info!("Wrote {} mask records to {}", masks.len(), path.display());
        Ok(masks.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segmentation::MaskRecord;
    use image::Rgb;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    /// Emits one mask per requested area, filling pixels in row-major order.
    struct FixedAreas {
        areas: Vec<usize>,
        calls: Arc<AtomicUsize>,
    }

    impl MaskGenerator for FixedAreas {
        fn name(&self) -> String {
            "fixed".to_string()
        }

        fn generate(&self, image: &RgbImage) -> Result<Vec<Mask>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let (w, h) = image.dimensions();
            self.areas
                .iter()
                .map(|area| {
                    let bits = (0..(w * h) as usize).map(|i| i < *area).collect();
                    Mask::from_bitmap(w, h, bits, 0.8)
                })
                .collect()
        }
    }

    fn segmenter(areas: Vec<usize>) -> (Segmenter, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let generator = FixedAreas {
            areas,
            calls: Arc::clone(&calls),
        };
        (Segmenter::with_generator(Box::new(generator), Some(3)), calls)
    }

    fn write_png(dir: &TempDir) -> PathBuf {
        let path = dir.path().join("field.png");
        let img = RgbImage::from_fn(10, 10, |x, y| Rgb([(x * 25) as u8, (y * 25) as u8, 80]));
        img.save(&path).unwrap();
        path
    }

    #[test]
    fn test_state_transitions() {
        let mut bare = Segmenter::new(None);
        assert_eq!(bare.state(), SegmenterState::Uninitialized);
        assert!(matches!(
            bare.run(),
            Err(WorkbenchError::InvalidState { .. })
        ));

        let dir = TempDir::new().unwrap();
        let path = write_png(&dir);
        let (mut seg, calls) = segmenter(vec![10, 50, 5]);
        assert_eq!(seg.state(), SegmenterState::ModelLoaded);
        assert!(seg.render(None).is_err());

        seg.set_image(&path).unwrap();
        assert_eq!(seg.state(), SegmenterState::ImageSet);

        assert_eq!(seg.run().unwrap().len(), 3);
        assert_eq!(seg.state(), SegmenterState::MasksGenerated);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        seg.set_image(&path).unwrap();
        assert_eq!(seg.state(), SegmenterState::ImageSet);
        assert!(seg.masks().is_none());
    }

    #[test]
    fn test_missing_image_is_fatal() {
        let (mut seg, _) = segmenter(vec![]);
        assert!(matches!(
            seg.set_image(Path::new("/nonexistent/field.png")),
            Err(WorkbenchError::Image { .. })
        ));
        assert_eq!(seg.state(), SegmenterState::ModelLoaded);
    }

    #[test]
    fn test_enhance_commit_semantics() {
        let dir = TempDir::new().unwrap();
        let (mut seg, _) = segmenter(vec![4]);
        seg.set_and_run(&write_png(&dir)).unwrap();
        let original = seg.image().unwrap().clone();

        let preview = seg.enhance("dilate", false).unwrap();
        assert!(seg.image().unwrap() == &original);
        assert_eq!(seg.state(), SegmenterState::MasksGenerated);

        let committed = seg
            .enhance(vec!["dilate".to_string(), "unknown".to_string()], true)
            .unwrap();
        assert!(committed == preview);
        assert!(seg.image().unwrap() == &committed);
        assert_eq!(seg.state(), SegmenterState::ImageSet);
    }

    #[test]
    fn test_enhance_single_unknown_is_error() {
        let (mut seg, _) = segmenter(vec![]);
        seg.set_image_buffer(RgbImage::new(3, 3));
        assert!(matches!(
            seg.enhance("sharpen", true),
            Err(WorkbenchError::InvalidOperation { .. })
        ));
    }

    #[test]
    fn test_zero_masks_render_equals_source() {
        let (mut seg, _) = segmenter(vec![]);
        let img = RgbImage::from_pixel(5, 5, Rgb([10, 20, 30]));
        seg.set_image_buffer(img.clone());
        seg.run().unwrap();
        assert!(seg.render(None).unwrap() == img);
    }

    #[test]
    fn test_render_saves_and_serialize_writes_jsonl() {
        let dir = TempDir::new().unwrap();
        let (mut seg, _) = segmenter(vec![10, 50, 5]);
        seg.set_and_run(&write_png(&dir)).unwrap();

        let out = dir.path().join("out/annotated.png");
        let rendered = seg.render(Some(&out)).unwrap();
        assert!(out.exists());
        assert_eq!(rendered.dimensions(), (10, 10));

        let masks_path = dir.path().join("out/masks.jsonl");
        assert_eq!(seg.serialize(&masks_path).unwrap(), 3);
        let text = std::fs::read_to_string(&masks_path).unwrap();
        let records: Vec<MaskRecord> = text
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(records.len(), 3);
        assert_eq!(records[1].index, 1);
        assert_eq!(records[1].area, 50);
        assert_eq!(records[1].decode().unwrap().area, 50);
    }
}
