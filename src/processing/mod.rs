pub mod change;
pub mod loader;
pub mod morphology;
pub mod regions;
pub mod segmenter;

pub use change::ChangeDetector;
pub use loader::{DecodePolicy, FolderImageSource, ImageSource, LoaderConfig, ResizeFilter};
pub use morphology::{MaskRefiner, StructuringElement};
pub use regions::find_change_regions;
pub use segmenter::{RtenSegmenter, Segmenter, ThresholdSegmenter};
