// file: src/imaging/morphology.rs
// description: separable rank and mean filters over square structuring elements
// reference: https://docs.rs/image

use image::RgbImage;

/// Window offsets for a k-wide element anchored at `k / 2`.
fn window(k: usize) -> (isize, isize) {
    let anchor = (k / 2) as isize;
    (-anchor, k as isize - 1 - anchor)
}

/// Reflect-101 index mapping (`gfedcb|abcdefgh|gfedcba`).
fn reflect_101(mut i: isize, n: usize) -> usize {
    if n == 1 {
        return 0;
    }
    let last = n as isize - 1;
    while i < 0 || i > last {
        if i < 0 {
            i = -i;
        } else {
            i = 2 * last - i;
        }
    }
    i as usize
}

#[derive(Clone, Copy)]
enum Rank {
    Min,
    Max,
}

/// One rank pass along rows (`horizontal`) or columns. Out-of-bounds samples are ignored.
fn rank_pass(src: &RgbImage, k: usize, rank: Rank, horizontal: bool) -> RgbImage {
    let (width, height) = src.dimensions();
    let (lo, hi) = window(k);
    let mut out = RgbImage::new(width, height);

    for y in 0..height {
        for x in 0..width {
            let mut acc = match rank {
                Rank::Min => [u8::MAX; 3],
                Rank::Max => [u8::MIN; 3],
            };
            for d in lo..=hi {
                let (sx, sy) = if horizontal {
                    (x as isize + d, y as isize)
                } else {
                    (x as isize, y as isize + d)
                };
                if sx < 0 || sy < 0 || sx >= width as isize || sy >= height as isize {
                    continue;
                }
                let px = src.get_pixel(sx as u32, sy as u32).0;
                for c in 0..3 {
                    acc[c] = match rank {
                        Rank::Min => acc[c].min(px[c]),
                        Rank::Max => acc[c].max(px[c]),
                    };
                }
            }
            out.put_pixel(x, y, image::Rgb(acc));
        }
    }
    out
}

pub fn erode(src: &RgbImage, k: usize) -> RgbImage {
    let rows = rank_pass(src, k, Rank::Min, true);
    rank_pass(&rows, k, Rank::Min, false)
}

pub fn dilate(src: &RgbImage, k: usize) -> RgbImage {
    let rows = rank_pass(src, k, Rank::Max, true);
    rank_pass(&rows, k, Rank::Max, false)
}

/// Normalised box filter with reflect-101 borders, rounded to nearest.
pub fn box_blur(src: &RgbImage, k: usize) -> RgbImage {
    let (width, height) = src.dimensions();
    if width == 0 || height == 0 {
        return src.clone();
    }
    let (lo, hi) = window(k);
    let (w, h) = (width as usize, height as usize);

    // horizontal sums, exact in u32
    let mut sums = vec![[0u32; 3]; w * h];
    for y in 0..h {
        for x in 0..w {
            let mut acc = [0u32; 3];
            for d in lo..=hi {
                let sx = reflect_101(x as isize + d, w);
                let px = src.get_pixel(sx as u32, y as u32).0;
                for c in 0..3 {
                    acc[c] += px[c] as u32;
                }
            }
            sums[y * w + x] = acc;
        }
    }

    let area = (k * k) as u32;
    let mut out = RgbImage::new(width, height);
    for y in 0..h {
        for x in 0..w {
            let mut acc = [0u32; 3];
            for d in lo..=hi {
                let sy = reflect_101(y as isize + d, h);
                let row = sums[sy * w + x];
                for c in 0..3 {
                    acc[c] += row[c];
                }
            }
            let px = acc.map(|v| ((v + area / 2) / area).min(255) as u8);
            out.put_pixel(x as u32, y as u32, image::Rgb(px));
        }
    }
    out
}

/// Per-channel saturating `a - b`. Both images must share dimensions.
pub fn subtract(a: &RgbImage, b: &RgbImage) -> RgbImage {
    let mut out = a.clone();
    for (dst, src) in out.pixels_mut().zip(b.pixels()) {
        for c in 0..3 {
            dst.0[c] = dst.0[c].saturating_sub(src.0[c]);
        }
    }
    out
}
