use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Boxed failure reported by a segmenter.
pub type InferenceFailure = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Pipeline stage a failure originated from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Load,
    Segmentation,
    Refinement,
    ChangeDetection,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Load => "load",
            Stage::Segmentation => "segmentation",
            Stage::Refinement => "refinement",
            Stage::ChangeDetection => "change detection",
        };
        f.write_str(name)
    }
}

/// Dimension errors raised by the refinement and differencing stages
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ShapeError {
    #[error(
        "structuring element {kernel_width}x{kernel_height} is larger than the {width}x{height} mask"
    )]
    KernelTooLarge {
        kernel_width: u32,
        kernel_height: u32,
        width: u32,
        height: u32,
    },

    #[error("structuring element {width}x{height} is invalid: each side must be within 1..={max}")]
    InvalidKernel { width: u32, height: u32, max: u32 },

    #[error(
        "segmenter returned a {mask_width}x{mask_height} mask for a {frame_width}x{frame_height} frame"
    )]
    MaskSize {
        frame_width: u32,
        frame_height: u32,
        mask_width: u32,
        mask_height: u32,
    },

    #[error(
        "entry {index} is {found_width}x{found_height}, expected {expected_width}x{expected_height}"
    )]
    Mismatch {
        index: usize,
        expected_width: u32,
        expected_height: u32,
        found_width: u32,
        found_height: u32,
    },
}

impl ShapeError {
    pub fn mismatch(index: usize, expected: (u32, u32), found: (u32, u32)) -> Self {
        ShapeError::Mismatch {
            index,
            expected_width: expected.0,
            expected_height: expected.1,
            found_width: found.0,
            found_height: found.1,
        }
    }
}

/// Invalid settings, rejected before any frame is processed
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("{name} must be within [0, 1], got {value}")]
    ThresholdOutOfRange { name: &'static str, value: f32 },
}

/// Check a probability threshold; NaN is rejected as well
pub fn check_threshold(name: &'static str, value: f32) -> Result<f32, ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(ConfigError::ThresholdOutOfRange { name, value })
    }
}

/// Errors surfaced by a pipeline run
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("input path not found: {}", .path.display())]
    NotFound { path: PathBuf },

    #[error("failed to read directory {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to decode frame {index} ({}): {source}", .path.display())]
    Decode {
        index: usize,
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("{stage} failed at frame {frame}: {source}")]
    Shape {
        stage: Stage,
        frame: usize,
        #[source]
        source: ShapeError,
    },

    #[error("segmentation failed at frame {frame}: {source}")]
    Inference {
        frame: usize,
        #[source]
        source: InferenceFailure,
    },

    #[error("{} frame(s) failed, first: {}", .0.len(), first_message(.0))]
    Frames(Vec<PipelineError>),
}

fn first_message(errors: &[PipelineError]) -> String {
    errors.first().map(|e| e.to_string()).unwrap_or_default()
}

impl PipelineError {
    /// Stage that produced the error (None for aggregated errors)
    pub fn stage(&self) -> Option<Stage> {
        match self {
            PipelineError::NotFound { .. }
            | PipelineError::Io { .. }
            | PipelineError::Decode { .. } => Some(Stage::Load),
            PipelineError::Shape { stage, .. } => Some(*stage),
            PipelineError::Inference { .. } => Some(Stage::Segmentation),
            PipelineError::Frames(_) => None,
        }
    }

    /// Offending frame index, when the error concerns a single frame
    pub fn frame(&self) -> Option<usize> {
        match self {
            PipelineError::Decode { index, .. } => Some(*index),
            PipelineError::Shape { frame, .. } | PipelineError::Inference { frame, .. } => {
                Some(*frame)
            }
            _ => None,
        }
    }
}
