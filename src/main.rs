use anyhow::Context;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

use segdiff::config::{SegmenterConfig, Settings};
use segdiff::processing::find_change_regions;
use segdiff::{FailurePolicy, FolderImageSource, Pipeline, StructuringElement};

#[derive(Clone, Copy, ValueEnum)]
enum OnError {
    Abort,
    Skip,
    CollectAll,
}

impl From<OnError> for FailurePolicy {
    fn from(value: OnError) -> Self {
        match value {
            OnError::Abort => FailurePolicy::Abort,
            OnError::Skip => FailurePolicy::Skip,
            OnError::CollectAll => FailurePolicy::CollectAll,
        }
    }
}

#[derive(Parser)]
#[command(name = "segdiff")]
#[command(about = "Segment an image sequence and report frame-to-frame mask changes")]
#[command(version)]
struct Cli {
    /// Folder holding the image sequence
    #[arg(value_name = "DATA_DIR")]
    data_dir: PathBuf,

    /// Configuration file (TOML, YAML or JSON)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Segmentation model in .rten format (overrides the configured segmenter)
    #[arg(long, value_name = "FILE")]
    model: Option<PathBuf>,

    /// Use the luminance threshold segmenter with this threshold
    #[arg(long, conflicts_with = "model")]
    threshold: Option<f32>,

    /// Structuring element size, e.g. 5x5
    #[arg(long, value_name = "WxH", value_parser = parse_kernel)]
    kernel: Option<StructuringElement>,

    /// How to handle frames that fail segmentation or refinement
    #[arg(long, value_enum)]
    on_error: Option<OnError>,

    /// Save masks and change maps to directory (must be empty)
    #[arg(long, value_name = "DIR")]
    out: Option<PathBuf>,

    /// Smallest changed region (in pixels) listed in the report
    #[arg(long, default_value = "1")]
    min_region_area: u32,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn parse_kernel(value: &str) -> Result<StructuringElement, String> {
    let (w, h) = value
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WxH, got '{}'", value))?;
    let width = w.trim().parse::<u32>().map_err(|e| e.to_string())?;
    let height = h.trim().parse::<u32>().map_err(|e| e.to_string())?;
    Ok(StructuringElement::new(width, height))
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> anyhow::Result<()> {
    let args = Cli::parse();
    init_logging(args.verbose);

    let mut settings = Settings::load(args.config.as_deref())?;
    if let Some(path) = args.model {
        settings.segmenter = SegmenterConfig::Model { path };
    } else if let Some(threshold) = args.threshold {
        settings.segmenter = SegmenterConfig::Threshold { threshold };
    }
    if let Some(kernel) = args.kernel {
        settings.pipeline.refinement = kernel;
    }
    if let Some(on_error) = args.on_error {
        settings.pipeline.failure_policy = on_error.into();
    }

    let segmenter = settings.segmenter.build()?;
    let source = FolderImageSource::new(settings.loader.clone());
    let pipeline = Pipeline::new(settings.pipeline.clone())?;

    let element = pipeline.config().refinement;
    tracing::info!(
        "Processing {} with {} ({}x{} closing)",
        args.data_dir.display(),
        segmenter.name(),
        element.width,
        element.height
    );
    let output = pipeline
        .run(&args.data_dir, segmenter.as_ref(), &source)
        .with_context(|| format!("pipeline failed for {}", args.data_dir.display()))?;

    if let Some(out_dir) = &args.out {
        output.save(out_dir)?;
    }

    println!("\n=== Change Detection Results ===");
    println!("Frames processed: {}", output.frames.len());
    if !output.skipped.is_empty() {
        println!("Frames skipped: {}", output.skipped.len());
        for err in &output.skipped {
            println!("  {}", err);
        }
    }
    println!("Transitions: {}", output.changes.len());

    for (from, to, change) in output.transitions() {
        let regions = find_change_regions(change, args.min_region_area);
        println!(
            "  {:03} -> {:03}: {} changed pixels, {} region(s)",
            from,
            to,
            change.changed_pixel_count(),
            regions.len()
        );
        if args.verbose {
            for region in &regions {
                let (cx, cy) = region.center();
                println!(
                    "    region centred at ({}, {}) {}x{} - {} px, peak {}",
                    cx,
                    cy,
                    region.bbox.width,
                    region.bbox.height,
                    region.area(),
                    region.peak
                );
            }
        }
    }

    Ok(())
}
