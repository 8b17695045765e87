#![allow(dead_code)]

use image::{GrayImage, Luma, Rgb, Rgb32FImage};
use segdiff::{Frame, Mask, Segmenter};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Mask of the given size with a foreground rectangle at (x, y)
pub fn mask_with_block(width: u32, height: u32, x: u32, y: u32, bw: u32, bh: u32) -> Mask {
    let image = GrayImage::from_fn(width, height, |px, py| {
        let inside = px >= x && px < x + bw && py >= y && py < y + bh;
        Luma([if inside { 255u8 } else { 0u8 }])
    });
    Mask::new(image)
}

/// Mask with foreground exactly at the listed pixels
pub fn mask_with_pixels(width: u32, height: u32, pixels: &[(u32, u32)]) -> Mask {
    let mut image = GrayImage::new(width, height);
    for &(x, y) in pixels {
        image.put_pixel(x, y, Luma([255u8]));
    }
    Mask::new(image)
}

/// Black grayscale image with a white rectangle (zero-sized rectangle = all black)
pub fn gray_frame(width: u32, height: u32, block: Option<(u32, u32, u32, u32)>) -> GrayImage {
    GrayImage::from_fn(width, height, |px, py| match block {
        Some((x, y, bw, bh)) if px >= x && px < x + bw && py >= y && py < y + bh => {
            Luma([255u8])
        }
        _ => Luma([0u8]),
    })
}

/// Float frame with a white rectangle on black
pub fn float_frame(index: usize, width: u32, height: u32, block: Option<(u32, u32, u32, u32)>) -> Frame {
    let gray = gray_frame(width, height, block);
    let image = Rgb32FImage::from_fn(width, height, |x, y| {
        let v = gray.get_pixel(x, y)[0] as f32 / 255.0;
        Rgb([v, v, v])
    });
    Frame::new(index, format!("frame_{:02}.png", index), image)
}

/// Save a grayscale image as PNG in `dir` and return its path
pub fn write_png(dir: &Path, name: &str, image: &GrayImage) -> PathBuf {
    let path = dir.join(name);
    image
        .save_with_format(&path, image::ImageFormat::Png)
        .expect("Failed to save test image");
    path
}

/// Every pixel where the mask is non-zero
pub fn foreground_pixels(mask: &Mask) -> HashSet<(u32, u32)> {
    mask.as_image()
        .enumerate_pixels()
        .filter(|(_, _, p)| p[0] > 0)
        .map(|(x, y, _)| (x, y))
        .collect()
}

/// Every pixel where the difference map is non-zero
pub fn changed_pixels(map: &segdiff::DifferenceMap) -> HashSet<(u32, u32)> {
    map.as_image()
        .enumerate_pixels()
        .filter(|(_, _, p)| p[0] > 0)
        .map(|(x, y, _)| (x, y))
        .collect()
}

/// Rectangle pixel set, for comparisons
pub fn block_pixels(x: u32, y: u32, bw: u32, bh: u32) -> HashSet<(u32, u32)> {
    (y..y + bh)
        .flat_map(|py| (x..x + bw).map(move |px| (px, py)))
        .collect()
}

/// Segmenter that fails on frames whose top-left pixel is pure red
pub struct RedFlagSegmenter;

impl Segmenter for RedFlagSegmenter {
    fn segment(&self, image: &Rgb32FImage) -> anyhow::Result<Mask> {
        let p = image.get_pixel(0, 0);
        if p[0] == 1.0 && p[1] == 0.0 && p[2] == 0.0 {
            anyhow::bail!("model rejected frame");
        }
        segdiff::ThresholdSegmenter::default().segment(image)
    }

    fn name(&self) -> &str {
        "Red Flag"
    }
}

/// Segmenter returning a mask of a fixed size regardless of the input
pub struct FixedSizeSegmenter {
    pub width: u32,
    pub height: u32,
}

impl Segmenter for FixedSizeSegmenter {
    fn segment(&self, _image: &Rgb32FImage) -> anyhow::Result<Mask> {
        Ok(Mask::filled(self.width, self.height, 0))
    }

    fn name(&self) -> &str {
        "Fixed Size"
    }
}

/// Float frame whose top-left pixel is pure red (rejected by `RedFlagSegmenter`)
pub fn red_flag_frame(index: usize, width: u32, height: u32) -> Frame {
    let mut frame = float_frame(index, width, height, None);
    frame.image.put_pixel(0, 0, Rgb([1.0, 0.0, 0.0]));
    frame
}
