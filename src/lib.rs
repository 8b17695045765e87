pub mod config;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod processing;

pub use error::{ConfigError, PipelineError, ShapeError, Stage};
pub use models::{BoundingBox, ChangeRegion, DifferenceMap, Frame, Mask};
pub use pipeline::{FailurePolicy, Pipeline, PipelineConfig, PipelineOutput};
pub use processing::{
    ChangeDetector, FolderImageSource, ImageSource, MaskRefiner, Segmenter, StructuringElement,
    ThresholdSegmenter,
};
