mod fixtures;
pub use fixtures::*;

// Re-export commonly used types from segdiff for tests
pub use segdiff::{
    ChangeDetector, ConfigError, DifferenceMap, FailurePolicy, FolderImageSource, Frame, Mask,
    MaskRefiner, Pipeline, PipelineConfig, PipelineError, Segmenter, ShapeError, Stage,
    StructuringElement, ThresholdSegmenter,
};
