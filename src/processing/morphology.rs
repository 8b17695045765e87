use image::{GrayImage, Luma};
use imageproc::morphology::{Mask as Kernel, grayscale_dilate, grayscale_erode};
use serde::Deserialize;

use crate::error::ShapeError;
use crate::models::Mask;

/// Largest side `imageproc` accepts for a grayscale morphology kernel
pub const MAX_KERNEL_SIDE: u32 = 511;

/// Rectangular all-ones structuring element, anchored at `(width / 2, height / 2)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct StructuringElement {
    pub width: u32,
    pub height: u32,
}

impl StructuringElement {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn square(side: u32) -> Self {
        Self::new(side, side)
    }

    fn validate(&self) -> Result<(), ShapeError> {
        let valid = |side: u32| (1..=MAX_KERNEL_SIDE).contains(&side);
        if valid(self.width) && valid(self.height) {
            Ok(())
        } else {
            Err(ShapeError::InvalidKernel {
                width: self.width,
                height: self.height,
                max: MAX_KERNEL_SIDE,
            })
        }
    }

    fn anchor(&self) -> (u8, u8) {
        // validate() bounds both sides to 511, so the halves fit in a u8
        ((self.width / 2) as u8, (self.height / 2) as u8)
    }

    /// Kernel pair for closing: the element itself and its reflection through the anchor.
    /// Eroding with the reflection keeps closing idempotent for even-sized elements.
    fn kernels(&self) -> (Kernel, Kernel) {
        let ones = GrayImage::from_pixel(self.width, self.height, Luma([255u8]));
        let (cx, cy) = self.anchor();
        let reflected_cx = (self.width - 1 - cx as u32) as u8;
        let reflected_cy = (self.height - 1 - cy as u32) as u8;
        (
            Kernel::from_image(&ones, cx, cy),
            Kernel::from_image(&ones, reflected_cx, reflected_cy),
        )
    }
}

impl Default for StructuringElement {
    fn default() -> Self {
        Self::square(5)
    }
}

/// Morphological closing of segmentation masks
#[derive(Debug, Clone, Default)]
pub struct MaskRefiner {
    pub element: StructuringElement,
}

impl MaskRefiner {
    pub fn new(element: StructuringElement) -> Self {
        Self { element }
    }

    /// Close the mask: dilate, then erode with the same element.
    /// Fills holes and gaps narrower than the element without growing large regions.
    pub fn refine(&self, mask: &Mask) -> Result<Mask, ShapeError> {
        self.element.validate()?;

        let (width, height) = mask.dimensions();
        if self.element.width > width || self.element.height > height {
            return Err(ShapeError::KernelTooLarge {
                kernel_width: self.element.width,
                kernel_height: self.element.height,
                width,
                height,
            });
        }

        let (kernel, reflected) = self.element.kernels();
        let dilated = grayscale_dilate(mask.as_image(), &kernel);
        let closed = grayscale_erode(&dilated, &reflected);

        Ok(Mask::new(closed))
    }
}
