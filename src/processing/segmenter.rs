use image::Rgb32FImage;
use rten::Model;
use rten_tensor::NdTensor;
use rten_tensor::prelude::*;
use std::path::Path;

use crate::error::{ConfigError, check_threshold};
use crate::models::Mask;

/// Binary segmentation capability: one mask per frame, same width and height
pub trait Segmenter: Send + Sync {
    fn segment(&self, image: &Rgb32FImage) -> anyhow::Result<Mask>;

    /// Human-readable name (used in log output)
    fn name(&self) -> &str;
}

/// Luminance threshold baseline; pixels at or above `threshold` are foreground
#[derive(Debug, Clone, Copy)]
pub struct ThresholdSegmenter {
    threshold: f32,
}

impl ThresholdSegmenter {
    /// Fails when `threshold` lies outside [0, 1]
    pub fn new(threshold: f32) -> Result<Self, ConfigError> {
        Ok(Self {
            threshold: check_threshold("threshold", threshold)?,
        })
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }
}

impl Default for ThresholdSegmenter {
    fn default() -> Self {
        Self { threshold: 0.5 }
    }
}

impl Segmenter for ThresholdSegmenter {
    fn segment(&self, image: &Rgb32FImage) -> anyhow::Result<Mask> {
        let (width, height) = image.dimensions();
        let probabilities: Vec<f32> = image
            .pixels()
            .map(|p| {
                // Rec. 601 luma
                let luma = 0.299 * p[0] + 0.587 * p[1] + 0.114 * p[2];
                if luma >= self.threshold { 1.0 } else { 0.0 }
            })
            .collect();

        Mask::from_probabilities(width, height, &probabilities)
            .ok_or_else(|| anyhow::anyhow!("probability buffer does not match {}x{}", width, height))
    }

    fn name(&self) -> &str {
        "Luminance Threshold"
    }
}

/// Segmentation network in `.rten` format.
///
/// The model takes a `[1, 3, H, W]` float tensor with samples in [0, 1] and
/// produces a `[1, 1, H, W]` foreground probability map.
pub struct RtenSegmenter {
    model: Model,
}

impl RtenSegmenter {
    pub fn load(model_path: &Path) -> anyhow::Result<Self> {
        if !model_path.exists() {
            anyhow::bail!("Segmentation model not found: {}", model_path.display());
        }
        let model = Model::load_file(model_path)?;
        Ok(Self { model })
    }

    fn to_input_tensor(image: &Rgb32FImage) -> NdTensor<f32, 4> {
        let (width, height) = image.dimensions();
        let (w, h) = (width as usize, height as usize);

        // Interleaved HWC samples -> planar CHW
        let mut data = vec![0.0f32; 3 * h * w];
        for (x, y, pixel) in image.enumerate_pixels() {
            let offset = y as usize * w + x as usize;
            for channel in 0..3 {
                data[channel * h * w + offset] = pixel[channel];
            }
        }

        NdTensor::from_data([1, 3, h, w], data)
    }
}

impl Segmenter for RtenSegmenter {
    fn segment(&self, image: &Rgb32FImage) -> anyhow::Result<Mask> {
        let (width, height) = image.dimensions();
        let input = Self::to_input_tensor(image);

        let output = self.model.run_one(input.view().into(), None)?;
        let output: NdTensor<f32, 4> = output
            .try_into()
            .map_err(|e| anyhow::anyhow!("Unexpected model output: {:?}", e))?;

        let [batch, channels, out_h, out_w] = output.shape();
        if batch != 1 || channels != 1 || out_h != height as usize || out_w != width as usize {
            anyhow::bail!(
                "Model produced a {}x{}x{}x{} output for a {}x{} frame",
                batch,
                channels,
                out_h,
                out_w,
                width,
                height
            );
        }

        let mut probabilities = Vec::with_capacity(out_h * out_w);
        for y in 0..out_h {
            for x in 0..out_w {
                probabilities.push(output[[0, 0, y, x]]);
            }
        }

        Mask::from_probabilities(width, height, &probabilities)
            .ok_or_else(|| anyhow::anyhow!("probability buffer does not match {}x{}", width, height))
    }

    fn name(&self) -> &str {
        "Rten Model"
    }
}
