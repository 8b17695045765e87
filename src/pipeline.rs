use anyhow::Result;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::{ConfigError, PipelineError, ShapeError, Stage, check_threshold};
use crate::models::{DifferenceMap, Frame, Mask};
use crate::processing::regions::change_mask;
use crate::processing::{ChangeDetector, ImageSource, MaskRefiner, Segmenter, StructuringElement};

/// How per-frame segmentation and refinement failures are handled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Stop at the first failing frame
    #[default]
    Abort,
    /// Drop failing frames and difference the survivors
    Skip,
    /// Process every frame, then fail with all collected errors
    CollectAll,
}

/// Configuration passed to the pipeline constructor
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub refinement: StructuringElement,
    /// Probability threshold applied to raw masks before refinement
    pub binarize_threshold: Option<f32>,
    pub failure_policy: FailurePolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            refinement: StructuringElement::default(),
            binarize_threshold: Some(0.5),
            failure_policy: FailurePolicy::Abort,
        }
    }
}

/// Everything a run produced, indexed alike: `masks[i]` and `refined_masks[i]`
/// belong to `frames[i]`, `changes[i]` is the transition `frames[i] -> frames[i + 1]`.
#[derive(Debug, Default)]
pub struct PipelineOutput {
    pub frames: Vec<Frame>,
    pub masks: Vec<Mask>,
    pub refined_masks: Vec<Mask>,
    pub changes: Vec<DifferenceMap>,

    /// Frames dropped under `FailurePolicy::Skip`
    pub skipped: Vec<PipelineError>,
}

impl PipelineOutput {
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// (from frame index, to frame index, difference) for every transition
    pub fn transitions(&self) -> impl Iterator<Item = (usize, usize, &DifferenceMap)> {
        self.frames
            .windows(2)
            .zip(self.changes.iter())
            .map(|(pair, change)| (pair[0].index, pair[1].index, change))
    }

    /// Write masks, refined masks and change maps to numbered sub-directories.
    /// The directory must be empty or non-existent.
    pub fn save(&self, output_dir: &Path) -> Result<()> {
        if output_dir.exists() {
            let entries = std::fs::read_dir(output_dir)?;
            if entries.count() > 0 {
                return Err(anyhow::anyhow!(
                    "Output directory is not empty: {}",
                    output_dir.display()
                ));
            }
        } else {
            std::fs::create_dir_all(output_dir)?;
        }

        let masks_dir = create_step_dir(output_dir, 1, "masks")?;
        let refined_dir = create_step_dir(output_dir, 2, "refined")?;
        let changes_dir = create_step_dir(output_dir, 3, "changes")?;

        for (frame, (mask, refined)) in self
            .frames
            .iter()
            .zip(self.masks.iter().zip(self.refined_masks.iter()))
        {
            let filename = format!("{}.png", frame_stem(frame));
            mask.as_image()
                .save(masks_dir.join(&filename))
                .map_err(|e| anyhow::anyhow!("Failed to save mask: {}", e))?;
            refined
                .as_image()
                .save(refined_dir.join(&filename))
                .map_err(|e| anyhow::anyhow!("Failed to save refined mask: {}", e))?;
        }

        for (from, to, change) in self.transitions() {
            let filename = format!("{:03}-{:03}.png", from, to);
            change
                .as_image()
                .save(changes_dir.join(&filename))
                .map_err(|e| anyhow::anyhow!("Failed to save change map: {}", e))?;
            change_mask(change)
                .save(changes_dir.join(format!("{:03}-{:03}_binary.png", from, to)))
                .map_err(|e| anyhow::anyhow!("Failed to save change mask: {}", e))?;
        }

        debug!(
            "Saved {} frames and {} change maps to {}",
            self.frames.len(),
            self.changes.len(),
            output_dir.display()
        );
        Ok(())
    }
}

fn create_step_dir(root: &Path, step: usize, name: &str) -> Result<PathBuf> {
    let dir = root.join(format!("{:02}_{}", step, name));
    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}

fn frame_stem(frame: &Frame) -> String {
    let stem = frame
        .path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("frame");
    format!("{:03}_{}", frame.index, stem)
}

/// Load -> segment -> refine -> difference, over one frame sequence
#[derive(Debug, Clone, Default)]
pub struct Pipeline {
    config: PipelineConfig,
    refiner: MaskRefiner,
    detector: ChangeDetector,
}

impl Pipeline {
    /// Fails when `binarize_threshold` lies outside [0, 1]
    pub fn new(config: PipelineConfig) -> Result<Self, ConfigError> {
        if let Some(threshold) = config.binarize_threshold {
            check_threshold("binarize_threshold", threshold)?;
        }
        Ok(Self {
            refiner: MaskRefiner::new(config.refinement),
            detector: ChangeDetector::new(),
            config,
        })
    }

    pub fn with_structuring_element(mut self, element: StructuringElement) -> Self {
        self.config.refinement = element;
        self.refiner = MaskRefiner::new(element);
        self
    }

    pub fn with_binarize_threshold(mut self, threshold: Option<f32>) -> Result<Self, ConfigError> {
        if let Some(value) = threshold {
            check_threshold("binarize_threshold", value)?;
        }
        self.config.binarize_threshold = threshold;
        Ok(self)
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.config.failure_policy = policy;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Load the sequence at `source` and run every stage over it
    pub fn run(
        &self,
        source: &Path,
        segmenter: &dyn Segmenter,
        images: &dyn ImageSource,
    ) -> Result<PipelineOutput, PipelineError> {
        debug!("Loading frames from {}", source.display());
        let frames = images.load_sequence(source)?;
        debug!("  → {} frames", frames.len());

        self.process(frames, segmenter)
    }

    /// Run segmentation, refinement and differencing over already loaded frames
    pub fn process(
        &self,
        frames: Vec<Frame>,
        segmenter: &dyn Segmenter,
    ) -> Result<PipelineOutput, PipelineError> {
        let mut output = PipelineOutput::default();
        let mut failures = Vec::new();

        debug!(
            "Running step: {} + refinement (processing {} frames)",
            segmenter.name(),
            frames.len()
        );

        for frame in frames {
            match self.process_frame(&frame, segmenter) {
                Ok((mask, refined)) => {
                    output.frames.push(frame);
                    output.masks.push(mask);
                    output.refined_masks.push(refined);
                }
                Err(err) => match self.config.failure_policy {
                    FailurePolicy::Abort => return Err(err),
                    FailurePolicy::Skip => {
                        warn!("Skipping frame {}: {}", frame.index, err);
                        output.skipped.push(err);
                    }
                    FailurePolicy::CollectAll => failures.push(err),
                },
            }
        }

        if !failures.is_empty() {
            return Err(PipelineError::Frames(failures));
        }

        debug!(
            "Running step: change detection (processing {} masks)",
            output.refined_masks.len()
        );
        output.changes = self
            .detector
            .diff_consecutive(&output.refined_masks)
            .map_err(|source| {
                let frame = match &source {
                    ShapeError::Mismatch { index, .. } => output.frames[*index].index,
                    _ => 0,
                };
                PipelineError::Shape {
                    stage: Stage::ChangeDetection,
                    frame,
                    source,
                }
            })?;
        debug!("  → {} change maps", output.changes.len());

        Ok(output)
    }

    /// Segment and refine a single frame; returns (raw mask, refined mask)
    pub fn process_frame(
        &self,
        frame: &Frame,
        segmenter: &dyn Segmenter,
    ) -> Result<(Mask, Mask), PipelineError> {
        let mask = segmenter
            .segment(&frame.image)
            .map_err(|e| PipelineError::Inference {
                frame: frame.index,
                source: e.into(),
            })?;

        if mask.dimensions() != frame.dimensions() {
            return Err(PipelineError::Shape {
                stage: Stage::Segmentation,
                frame: frame.index,
                source: ShapeError::MaskSize {
                    frame_width: frame.image.width(),
                    frame_height: frame.image.height(),
                    mask_width: mask.width(),
                    mask_height: mask.height(),
                },
            });
        }

        let binary = match self.config.binarize_threshold {
            Some(threshold) => mask.binarize(threshold),
            None => mask.clone(),
        };

        let refined = self
            .refiner
            .refine(&binary)
            .map_err(|source| PipelineError::Shape {
                stage: Stage::Refinement,
                frame: frame.index,
                source,
            })?;

        Ok((mask, refined))
    }
}
