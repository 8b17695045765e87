use image::ImageReader;
use image::imageops::FilterType;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::PipelineError;
use crate::models::Frame;

/// Source of an ordered frame sequence
pub trait ImageSource {
    fn load_sequence(&self, path: &Path) -> Result<Vec<Frame>, PipelineError>;
}

/// What to do with a file that cannot be decoded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecodePolicy {
    #[default]
    Abort,
    Skip,
}

/// Resampling filter used when frames are resized
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResizeFilter {
    Nearest,
    #[default]
    Triangle,
    CatmullRom,
    Gaussian,
    Lanczos3,
}

impl From<ResizeFilter> for FilterType {
    fn from(filter: ResizeFilter) -> Self {
        match filter {
            ResizeFilter::Nearest => FilterType::Nearest,
            ResizeFilter::Triangle => FilterType::Triangle,
            ResizeFilter::CatmullRom => FilterType::CatmullRom,
            ResizeFilter::Gaussian => FilterType::Gaussian,
            ResizeFilter::Lanczos3 => FilterType::Lanczos3,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    /// Accepted file extensions, compared case-insensitively
    pub extensions: Vec<String>,
    /// Target (width, height); None keeps each file's native size
    pub resize: Option<(u32, u32)>,
    pub filter: ResizeFilter,
    pub decode_policy: DecodePolicy,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            extensions: vec!["jpg".to_string(), "png".to_string()],
            resize: Some((256, 256)),
            filter: ResizeFilter::Triangle,
            decode_policy: DecodePolicy::Abort,
        }
    }
}

/// Loads every image of a directory, sorted by file name
#[derive(Debug, Clone, Default)]
pub struct FolderImageSource {
    pub config: LoaderConfig,
}

impl FolderImageSource {
    pub fn new(config: LoaderConfig) -> Self {
        Self { config }
    }

    pub fn with_resize(mut self, resize: Option<(u32, u32)>) -> Self {
        self.config.resize = resize;
        self
    }

    pub fn with_decode_policy(mut self, policy: DecodePolicy) -> Self {
        self.config.decode_policy = policy;
        self
    }

    fn is_supported(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| {
                self.config
                    .extensions
                    .iter()
                    .any(|allowed| allowed.eq_ignore_ascii_case(ext))
            })
            .unwrap_or(false)
    }

    /// Supported image files in `dir`, in lexicographic file-name order
    pub fn list_files(&self, dir: &Path) -> Result<Vec<PathBuf>, PipelineError> {
        if !dir.exists() {
            return Err(PipelineError::NotFound {
                path: dir.to_path_buf(),
            });
        }

        let io_err = |source| PipelineError::Io {
            path: dir.to_path_buf(),
            source,
        };

        let mut files = Vec::new();
        for entry in std::fs::read_dir(dir).map_err(io_err)? {
            let path = entry.map_err(io_err)?.path();
            if path.is_file() && self.is_supported(&path) {
                files.push(path);
            }
        }

        files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
        Ok(files)
    }

    fn decode(&self, index: usize, path: &Path) -> Result<image::Rgb32FImage, PipelineError> {
        let decode_err = |source| PipelineError::Decode {
            index,
            path: path.to_path_buf(),
            source,
        };

        let img = ImageReader::open(path)
            .and_then(|reader| reader.with_guessed_format())
            .map_err(|e| decode_err(image::ImageError::IoError(e)))?
            .decode()
            .map_err(decode_err)?;

        let img = match self.config.resize {
            Some((width, height)) if img.width() != width || img.height() != height => {
                img.resize_exact(width, height, self.config.filter.into())
            }
            _ => img,
        };

        Ok(img.to_rgb32f())
    }
}

impl FolderImageSource {
    /// Decode `files` in order. A frame's index is its position in `files`,
    /// so indices keep pointing at the same file when others are skipped.
    pub fn load_files(&self, files: &[PathBuf]) -> Result<Vec<Frame>, PipelineError> {
        let mut frames = Vec::with_capacity(files.len());
        for (index, file) in files.iter().enumerate() {
            match self.decode(index, file) {
                Ok(image) => frames.push(Frame::new(index, file.clone(), image)),
                Err(err @ PipelineError::Decode { .. })
                    if self.config.decode_policy == DecodePolicy::Skip =>
                {
                    warn!("Skipping unreadable frame: {}", err);
                }
                Err(err) => return Err(err),
            }
        }

        Ok(frames)
    }
}

impl ImageSource for FolderImageSource {
    fn load_sequence(&self, path: &Path) -> Result<Vec<Frame>, PipelineError> {
        let files = self.list_files(path)?;
        debug!("Found {} image files in {}", files.len(), path.display());

        self.load_files(&files)
    }
}
