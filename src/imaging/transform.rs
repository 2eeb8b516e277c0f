// file: src/imaging/transform.rs
// description: closed set of named morphological transforms
// reference: internal module structure

use super::morphology::{box_blur, dilate, erode, subtract};
use crate::error::WorkbenchError;
use image::RgbImage;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Transform {
    Blur,
    Erode,
    Dilate,
    Opening,
    Closing,
    MorphGradient,
    TopHat,
    BlackHat,
    ErodeDilate,
    DilateErode,
}

impl Transform {
    pub const ALL: [Transform; 10] = [
        Transform::Blur,
        Transform::Erode,
        Transform::Dilate,
        Transform::Opening,
        Transform::Closing,
        Transform::MorphGradient,
        Transform::TopHat,
        Transform::BlackHat,
        Transform::ErodeDilate,
        Transform::DilateErode,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Transform::Blur => "blur",
            Transform::Erode => "erode",
            Transform::Dilate => "dilate",
            Transform::Opening => "opening",
            Transform::Closing => "closing",
            Transform::MorphGradient => "morph_gradient",
            Transform::TopHat => "top_hat",
            Transform::BlackHat => "black_hat",
            Transform::ErodeDilate => "erode_dilate",
            Transform::DilateErode => "dilate_erode",
        }
    }

    /// Side of the square structuring element.
    pub fn kernel_size(self) -> usize {
        match self {
            Transform::Blur => 15,
            Transform::Erode => 3,
            Transform::Dilate => 5,
            Transform::Opening => 6,
            Transform::Closing => 5,
            Transform::MorphGradient => 5,
            Transform::TopHat => 20,
            Transform::BlackHat => 20,
            Transform::ErodeDilate => 5,
            Transform::DilateErode => 10,
        }
    }

    pub fn names() -> Vec<&'static str> {
        Self::ALL.iter().map(|t| t.name()).collect()
    }

    pub fn apply(self, src: &RgbImage) -> RgbImage {
        let k = self.kernel_size();
        match self {
            Transform::Blur => box_blur(src, k),
            Transform::Erode => erode(src, k),
            Transform::Dilate => dilate(src, k),
            Transform::Opening | Transform::ErodeDilate => dilate(&erode(src, k), k),
            Transform::Closing | Transform::DilateErode => erode(&dilate(src, k), k),
            Transform::MorphGradient => subtract(&dilate(src, k), &erode(src, k)),
            Transform::TopHat => subtract(src, &dilate(&erode(src, k), k)),
            Transform::BlackHat => subtract(&erode(&dilate(src, k), k), src),
        }
    }
}

impl fmt::Display for Transform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Transform {
    type Err = WorkbenchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        if normalized == "simple_blur" {
            return Ok(Transform::Blur);
        }
        Self::ALL
            .into_iter()
            .find(|t| t.name() == normalized)
            .ok_or_else(|| WorkbenchError::InvalidOperation {
                name: s.to_string(),
                valid: Self::names(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_parse_names_and_aliases() {
        assert_eq!("blur".parse::<Transform>().unwrap(), Transform::Blur);
        assert_eq!("simple_blur".parse::<Transform>().unwrap(), Transform::Blur);
        assert_eq!("top-hat".parse::<Transform>().unwrap(), Transform::TopHat);
        assert_eq!("Morph_Gradient".parse::<Transform>().unwrap(), Transform::MorphGradient);
        for t in Transform::ALL {
            assert_eq!(t.name().parse::<Transform>().unwrap(), t);
        }
    }

    #[test]
    fn test_unknown_name_lists_valid() {
        match "sharpen".parse::<Transform>() {
            Err(WorkbenchError::InvalidOperation { name, valid }) => {
                assert_eq!(name, "sharpen");
                assert_eq!(valid.len(), 10);
                assert!(valid.contains(&"black_hat"));
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_uniform_image_hats_are_black() {
        let img = RgbImage::from_pixel(8, 8, Rgb([120, 60, 30]));
        for t in [Transform::TopHat, Transform::BlackHat, Transform::MorphGradient] {
            assert!(t.apply(&img).pixels().all(|p| p.0 == [0, 0, 0]), "{t}");
        }
    }

    #[test]
    fn test_black_hat_highlights_dark_spot() {
        let mut img = RgbImage::from_pixel(9, 9, Rgb([200, 200, 200]));
        img.put_pixel(4, 4, Rgb([50, 50, 50]));
        let out = Transform::BlackHat.apply(&img);
        assert_eq!(out.get_pixel(4, 4).0, [150, 150, 150]);
        assert_eq!(out.get_pixel(0, 0).0, [0, 0, 0]);
    }

    #[test]
    fn test_transforms_preserve_dimensions() {
        let img = RgbImage::from_fn(11, 7, |x, y| Rgb([(x * 20) as u8, (y * 30) as u8, 7]));
        for t in Transform::ALL {
            assert_eq!(t.apply(&img).dimensions(), (11, 7), "{t}");
        }
    }
}
