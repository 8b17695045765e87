use image::{GrayImage, Luma, Rgb32FImage};
use std::path::PathBuf;

/// Bounding box in frame coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundingBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// A decoded frame of the input sequence
#[derive(Debug, Clone)]
pub struct Frame {
    /// Position of the source file in the sequence; unchanged when other files are skipped
    pub index: usize,

    /// File the frame was decoded from
    pub path: PathBuf,

    /// Samples normalized to [0, 1]
    pub image: Rgb32FImage,
}

impl Frame {
    pub fn new(index: usize, path: impl Into<PathBuf>, image: Rgb32FImage) -> Self {
        Self {
            index,
            path: path.into(),
            image,
        }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }
}

/// Segmentation mask: 0 is background, 255 is foreground, anything in
/// between is a probability scaled to the byte range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mask(GrayImage);

impl Mask {
    pub const FOREGROUND: u8 = 255;
    pub const BACKGROUND: u8 = 0;

    pub fn new(image: GrayImage) -> Self {
        Self(image)
    }

    /// Mask with every pixel set to `value`
    pub fn filled(width: u32, height: u32, value: u8) -> Self {
        Self(GrayImage::from_pixel(width, height, Luma([value])))
    }

    /// Build a mask from row-major probabilities in [0, 1].
    /// Returns None when `probabilities` does not hold `width * height` values.
    pub fn from_probabilities(width: u32, height: u32, probabilities: &[f32]) -> Option<Self> {
        if probabilities.len() != (width as usize) * (height as usize) {
            return None;
        }
        let image = GrayImage::from_fn(width, height, |x, y| {
            let p = probabilities[(y * width + x) as usize];
            Luma([(p.clamp(0.0, 1.0) * 255.0).round() as u8])
        });
        Some(Self(image))
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.0.dimensions()
    }

    pub fn width(&self) -> u32 {
        self.0.width()
    }

    pub fn height(&self) -> u32 {
        self.0.height()
    }

    pub fn value(&self, x: u32, y: u32) -> u8 {
        self.0.get_pixel(x, y)[0]
    }

    pub fn probability(&self, x: u32, y: u32) -> f32 {
        self.value(x, y) as f32 / 255.0
    }

    /// Threshold into a binary mask; pixels with probability >= `threshold` become foreground
    pub fn binarize(&self, threshold: f32) -> Mask {
        Mask(GrayImage::from_fn(self.width(), self.height(), |x, y| {
            if self.probability(x, y) >= threshold {
                Luma([Self::FOREGROUND])
            } else {
                Luma([Self::BACKGROUND])
            }
        }))
    }

    pub fn is_binary(&self) -> bool {
        self.0
            .pixels()
            .all(|p| p[0] == Self::FOREGROUND || p[0] == Self::BACKGROUND)
    }

    /// Number of pixels at full foreground
    pub fn foreground_count(&self) -> usize {
        self.0.pixels().filter(|p| p[0] == Self::FOREGROUND).count()
    }

    pub fn as_image(&self) -> &GrayImage {
        &self.0
    }

    pub fn into_image(self) -> GrayImage {
        self.0
    }
}

/// Per-pixel absolute difference between two masks
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DifferenceMap(GrayImage);

impl DifferenceMap {
    pub fn new(image: GrayImage) -> Self {
        Self(image)
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.0.dimensions()
    }

    pub fn value(&self, x: u32, y: u32) -> u8 {
        self.0.get_pixel(x, y)[0]
    }

    /// Number of pixels with a non-zero difference
    pub fn changed_pixel_count(&self) -> usize {
        self.0.pixels().filter(|p| p[0] > 0).count()
    }

    pub fn max_value(&self) -> u8 {
        self.0.pixels().map(|p| p[0]).max().unwrap_or(0)
    }

    pub fn is_unchanged(&self) -> bool {
        self.0.pixels().all(|p| p[0] == 0)
    }

    /// Smallest box enclosing every changed pixel
    pub fn bounding_box(&self) -> Option<BoundingBox> {
        let mut bounds: Option<(u32, u32, u32, u32)> = None;
        for (x, y, pixel) in self.0.enumerate_pixels() {
            if pixel[0] == 0 {
                continue;
            }
            bounds = Some(match bounds {
                None => (x, y, x, y),
                Some((min_x, min_y, max_x, max_y)) => {
                    (min_x.min(x), min_y.min(y), max_x.max(x), max_y.max(y))
                }
            });
        }

        bounds.map(|(min_x, min_y, max_x, max_y)| BoundingBox {
            x: min_x,
            y: min_y,
            width: max_x - min_x + 1,
            height: max_y - min_y + 1,
        })
    }

    pub fn as_image(&self) -> &GrayImage {
        &self.0
    }

    pub fn into_image(self) -> GrayImage {
        self.0
    }
}

/// Connected region of changed pixels in a difference map
#[derive(Debug, Clone)]
pub struct ChangeRegion {
    pub label: u32,
    pub bbox: BoundingBox,
    pub pixel_count: u32,
    /// Largest difference value inside the region
    pub peak: u8,
}

impl ChangeRegion {
    pub fn area(&self) -> u32 {
        self.pixel_count
    }

    pub fn center(&self) -> (u32, u32) {
        (
            self.bbox.x + self.bbox.width / 2,
            self.bbox.y + self.bbox.height / 2,
        )
    }
}
