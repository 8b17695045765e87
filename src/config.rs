use anyhow::Context;
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::error::{ConfigError, check_threshold};
use crate::pipeline::PipelineConfig;
use crate::processing::{LoaderConfig, RtenSegmenter, Segmenter, ThresholdSegmenter};

/// Prefix of environment overrides, e.g. `SEGDIFF__PIPELINE__FAILURE_POLICY=skip`
pub const ENV_PREFIX: &str = "SEGDIFF";

/// Which segmenter the run uses
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SegmenterConfig {
    Threshold { threshold: f32 },
    Model { path: PathBuf },
}

impl Default for SegmenterConfig {
    fn default() -> Self {
        SegmenterConfig::Threshold { threshold: 0.5 }
    }
}

impl SegmenterConfig {
    pub fn build(&self) -> anyhow::Result<Box<dyn Segmenter>> {
        match self {
            SegmenterConfig::Threshold { threshold } => {
                Ok(Box::new(ThresholdSegmenter::new(*threshold)?))
            }
            SegmenterConfig::Model { path } => Ok(Box::new(
                RtenSegmenter::load(path)
                    .with_context(|| format!("loading model {}", path.display()))?,
            )),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub loader: LoaderConfig,
    pub pipeline: PipelineConfig,
    pub segmenter: SegmenterConfig,
}

impl Settings {
    /// Defaults, overlaid by the optional file, overlaid by `SEGDIFF__*` variables
    pub fn load(file: Option<&Path>) -> anyhow::Result<Self> {
        let mut builder = ::config::Config::builder();

        if let Some(path) = file {
            if !path.exists() {
                anyhow::bail!("Config file not found: {}", path.display());
            }
            builder = builder.add_source(::config::File::from(path).required(true));
        }

        let settings = builder
            .add_source(
                ::config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("reading configuration")?
            .try_deserialize::<Settings>()
            .context("parsing configuration")?;

        settings.validate()?;
        Ok(settings)
    }

    /// Reject out-of-range thresholds before anything runs
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let SegmenterConfig::Threshold { threshold } = self.segmenter {
            check_threshold("segmenter.threshold", threshold)?;
        }
        if let Some(threshold) = self.pipeline.binarize_threshold {
            check_threshold("pipeline.binarize_threshold", threshold)?;
        }
        Ok(())
    }
}
