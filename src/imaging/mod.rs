// file: src/imaging/mod.rs
// description: image loading and the morphological transform pipeline
// reference: internal module structure

pub mod morphology;
pub mod pipeline;
pub mod transform;

pub use pipeline::{ImagePipeline, SequenceReport};
pub use transform::Transform;

use crate::error::{Result, WorkbenchError};
use image::RgbImage;
use std::path::Path;

/// Decodes any supported format to 8-bit RGB.
pub fn load_rgb(path: &Path) -> Result<RgbImage> {
    let img = image::open(path).map_err(|source| WorkbenchError::Image {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(img.to_rgb8())
}

pub fn save_rgb(image: &RgbImage, path: &Path) -> Result<()> {
    crate::utils::Validator::ensure_parent_dir(path)?;
    image.save(path).map_err(|source| WorkbenchError::Image {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;
    use tempfile::TempDir;

    #[test]
    fn test_png_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out/field.png");
        let img = RgbImage::from_fn(5, 4, |x, y| Rgb([x as u8, y as u8, 99]));
        save_rgb(&img, &path).unwrap();
        assert_eq!(load_rgb(&path).unwrap(), img);
    }

    #[test]
    fn test_undecodable_file_is_image_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.png");
        std::fs::write(&path, b"not an image").unwrap();
        assert!(matches!(load_rgb(&path), Err(WorkbenchError::Image { .. })));
        assert!(load_rgb(&dir.path().join("missing.png")).is_err());
    }
}
