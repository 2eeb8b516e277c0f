// file: src/imaging/pipeline.rs
// description: stateful transform chain with a restore point
// reference: internal module structure

use super::transform::Transform;
use crate::error::Result;
use image::RgbImage;
use tracing::{debug, warn};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SequenceReport {
    pub applied: Vec<Transform>,
    /// Names that did not parse, in request order
    pub rejected: Vec<String>,
}

impl SequenceReport {
    pub fn is_clean(&self) -> bool {
        self.rejected.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct ImagePipeline {
    current: RgbImage,
    original: RgbImage,
}

impl ImagePipeline {
    pub fn new(image: RgbImage) -> Self {
        Self {
            original: image.clone(),
            current: image,
        }
    }

    /// Replaces both the working image and the restore point.
    pub fn set(&mut self, image: RgbImage) {
        self.original = image.clone();
        self.current = image;
    }

    pub fn current(&self) -> &RgbImage {
        &self.current
    }

    pub fn original(&self) -> &RgbImage {
        &self.original
    }

    pub fn into_current(self) -> RgbImage {
        self.current
    }

    pub fn apply(&mut self, transform: Transform) -> &RgbImage {
        debug!(
            "Applying {} (kernel {})",
            transform,
            transform.kernel_size()
        );
        self.current = transform.apply(&self.current);
        &self.current
    }

    pub fn apply_named(&mut self, name: &str) -> Result<&RgbImage> {
        let transform: Transform = name.parse()?;
        Ok(self.apply(transform))
    }

    pub fn apply_sequence<S: AsRef<str>>(&mut self, names: &[S]) -> SequenceReport {
        let mut report = SequenceReport::default();
        for name in names {
            let name = name.as_ref();
            match name.parse::<Transform>() {
                Ok(transform) => {
                    self.apply(transform);
                    report.applied.push(transform);
                }
                Err(e) => {
                    warn!("Skipping transform: {}", e);
                    report.rejected.push(name.to_string());
                }
            }
        }
        report
    }

    pub fn restore(&mut self) {
        self.current = self.original.clone();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::WorkbenchError;
    use image::Rgb;
    use pretty_assertions::assert_eq;

    fn gradient() -> RgbImage {
        RgbImage::from_fn(24, 18, |x, y| {
            Rgb([(x * 10) as u8, (y * 13) as u8, ((x * y) % 251) as u8])
        })
    }

    #[test]
    fn test_blur_then_restore_is_bit_exact() {
        let original = gradient();
        let mut pipeline = ImagePipeline::new(original.clone());
        pipeline.apply(Transform::Blur);
        assert_ne!(pipeline.current(), &original);
        pipeline.restore();
        assert!(pipeline.current().as_raw() == original.as_raw());
    }

    #[test]
    fn test_sequence_matches_stepwise() {
        let mut chained = ImagePipeline::new(gradient());
        let report = chained.apply_sequence(&["erode", "top_hat"]);
        assert_eq!(report.applied, vec![Transform::Erode, Transform::TopHat]);
        assert!(report.is_clean());

        let mut stepwise = ImagePipeline::new(gradient());
        stepwise.apply(Transform::Erode);
        stepwise.apply(Transform::TopHat);
        assert!(chained.current() == stepwise.current());
    }

    #[test]
    fn test_unknown_name_leaves_image_unchanged() {
        let mut pipeline = ImagePipeline::new(gradient());
        let before = pipeline.current().clone();
        let err = pipeline.apply_named("sharpen").err().unwrap();
        assert!(matches!(err, WorkbenchError::InvalidOperation { .. }));
        assert!(pipeline.current() == &before);
    }

    #[test]
    fn test_sequence_skips_invalid_entries() {
        let mut pipeline = ImagePipeline::new(gradient());
        let report = pipeline.apply_sequence(&["dilate", "nope", "simple_blur"]);
        assert_eq!(report.applied, vec![Transform::Dilate, Transform::Blur]);
        assert_eq!(report.rejected, vec!["nope".to_string()]);

        let mut expected = ImagePipeline::new(gradient());
        expected.apply(Transform::Dilate);
        expected.apply(Transform::Blur);
        assert!(pipeline.current() == expected.current());
    }

    #[test]
    fn test_set_moves_restore_point() {
        let mut pipeline = ImagePipeline::new(gradient());
        let replacement = RgbImage::from_pixel(3, 3, Rgb([1, 2, 3]));
        pipeline.set(replacement.clone());
        pipeline.apply(Transform::Dilate);
        pipeline.restore();
        assert!(pipeline.current() == &replacement);
    }
}
