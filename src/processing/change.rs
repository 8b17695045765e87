use image::{GrayImage, Luma};

use crate::error::ShapeError;
use crate::models::{DifferenceMap, Mask};

/// Temporal differencing over an ordered mask sequence
#[derive(Debug, Clone, Copy, Default)]
pub struct ChangeDetector;

impl ChangeDetector {
    pub fn new() -> Self {
        Self
    }

    /// Absolute difference of every consecutive pair.
    /// Entry `i - 1` of the result is the transition from mask `i - 1` to mask `i`;
    /// fewer than two masks yield an empty result.
    pub fn diff_consecutive(&self, masks: &[Mask]) -> Result<Vec<DifferenceMap>, ShapeError> {
        // Shapes are checked up front so a mismatch never produces a partial result
        for (index, pair) in masks.windows(2).enumerate() {
            if pair[0].dimensions() != pair[1].dimensions() {
                return Err(ShapeError::mismatch(
                    index + 1,
                    pair[0].dimensions(),
                    pair[1].dimensions(),
                ));
            }
        }

        Ok(masks
            .windows(2)
            .map(|pair| absolute_difference(&pair[0], &pair[1]))
            .collect())
    }

    /// Difference of a single pair of masks
    pub fn difference(&self, previous: &Mask, current: &Mask) -> Result<DifferenceMap, ShapeError> {
        if previous.dimensions() != current.dimensions() {
            return Err(ShapeError::mismatch(
                1,
                previous.dimensions(),
                current.dimensions(),
            ));
        }
        Ok(absolute_difference(previous, current))
    }
}

fn absolute_difference(previous: &Mask, current: &Mask) -> DifferenceMap {
    let (width, height) = current.dimensions();
    let previous = previous.as_image();
    let current = current.as_image();

    let diff = GrayImage::from_fn(width, height, |x, y| {
        let a = previous.get_pixel(x, y)[0];
        let b = current.get_pixel(x, y)[0];
        Luma([a.abs_diff(b)])
    });

    DifferenceMap::new(diff)
}
