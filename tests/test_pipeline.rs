//! End-to-end tests for the load -> segment -> refine -> difference pipeline.

mod common;

use image::Rgb32FImage;
use segdiff::ImageSource;

use common::*;

/// Loader that keeps native frame sizes
fn native_source() -> FolderImageSource {
    FolderImageSource::default().with_resize(None)
}

/// Segmenter predicting the same probability everywhere
struct ConstantSegmenter(f32);

impl Segmenter for ConstantSegmenter {
    fn segment(&self, image: &Rgb32FImage) -> anyhow::Result<Mask> {
        let (width, height) = image.dimensions();
        let probabilities = vec![self.0; (width * height) as usize];
        Mask::from_probabilities(width, height, &probabilities)
            .ok_or_else(|| anyhow::anyhow!("bad buffer"))
    }

    fn name(&self) -> &str {
        "Constant"
    }
}

#[test]
fn test_new_foreground_block_is_reported_once() -> anyhow::Result<()> {
    let dir = tempfile::TempDir::new()?;
    write_png(dir.path(), "frame_00.png", &gray_frame(32, 32, None));
    write_png(dir.path(), "frame_01.png", &gray_frame(32, 32, None));
    write_png(dir.path(), "frame_02.png", &gray_frame(32, 32, Some((12, 12, 8, 8))));

    let output = Pipeline::default().run(dir.path(), &ThresholdSegmenter::new(0.5)?, &native_source())?;

    assert_eq!(output.frames.len(), 3);
    assert_eq!(output.masks.len(), 3);
    assert_eq!(output.refined_masks.len(), 3);
    assert_eq!(output.changes.len(), 2);
    assert!(output.skipped.is_empty());

    assert!(output.changes[0].is_unchanged());
    assert_eq!(changed_pixels(&output.changes[1]), block_pixels(12, 12, 8, 8));
    assert_eq!(output.changes[1].max_value(), 255);
    Ok(())
}

#[test]
fn test_frames_keep_file_order_across_stages() -> anyhow::Result<()> {
    let dir = tempfile::TempDir::new()?;
    // Written out of order on purpose
    write_png(dir.path(), "c.png", &gray_frame(16, 16, Some((6, 6, 6, 6))));
    write_png(dir.path(), "a.png", &gray_frame(16, 16, None));
    write_png(dir.path(), "b.png", &gray_frame(16, 16, Some((5, 5, 6, 6))));

    let output = Pipeline::default().run(dir.path(), &ThresholdSegmenter::default(), &native_source())?;

    let names: Vec<String> = output
        .frames
        .iter()
        .map(|f| f.path.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, vec!["a.png", "b.png", "c.png"]);
    assert_eq!(output.refined_masks[0].foreground_count(), 0);
    assert_eq!(foreground_pixels(&output.refined_masks[1]), block_pixels(5, 5, 6, 6));
    assert_eq!(foreground_pixels(&output.refined_masks[2]), block_pixels(6, 6, 6, 6));

    let transitions: Vec<(usize, usize)> = output.transitions().map(|(a, b, _)| (a, b)).collect();
    assert_eq!(transitions, vec![(0, 1), (1, 2)]);
    Ok(())
}

#[test]
fn test_empty_directory_yields_empty_outputs() -> anyhow::Result<()> {
    let dir = tempfile::TempDir::new()?;

    let output = Pipeline::default().run(dir.path(), &ThresholdSegmenter::default(), &native_source())?;

    assert!(output.is_empty());
    assert!(output.masks.is_empty());
    assert!(output.refined_masks.is_empty());
    assert!(output.changes.is_empty());
    Ok(())
}

#[test]
fn test_missing_directory_is_not_found() {
    let dir = tempfile::TempDir::new().expect("Failed to create temp directory");
    let missing = dir.path().join("does-not-exist");

    let result = Pipeline::default().run(&missing, &ThresholdSegmenter::default(), &native_source());

    let err = result.expect_err("missing directory must fail");
    assert!(matches!(err, PipelineError::NotFound { .. }));
    assert_eq!(err.stage(), Some(Stage::Load));
}

#[test]
fn test_segmentation_failure_aborts_run() {
    let frames = vec![
        float_frame(0, 12, 12, None),
        red_flag_frame(1, 12, 12),
        float_frame(2, 12, 12, None),
    ];

    let result = Pipeline::default().process(frames, &RedFlagSegmenter);

    let err = result.expect_err("inference failure must abort");
    assert!(matches!(err, PipelineError::Inference { frame: 1, .. }));
    assert_eq!(err.stage(), Some(Stage::Segmentation));
    assert_eq!(err.frame(), Some(1));
    assert!(err.to_string().contains("model rejected frame"));
}

#[test]
fn test_skip_policy_differences_surviving_frames() -> anyhow::Result<()> {
    let frames = vec![
        float_frame(0, 16, 16, None),
        red_flag_frame(1, 16, 16),
        float_frame(2, 16, 16, Some((4, 4, 8, 8))),
    ];

    let output = Pipeline::default()
        .with_failure_policy(FailurePolicy::Skip)
        .process(frames, &RedFlagSegmenter)?;

    assert_eq!(output.frames.len(), 2);
    assert_eq!(output.skipped.len(), 1);
    assert_eq!(output.skipped[0].frame(), Some(1));
    assert_eq!(output.changes.len(), 1);

    let transitions: Vec<(usize, usize)> = output.transitions().map(|(a, b, _)| (a, b)).collect();
    assert_eq!(transitions, vec![(0, 2)]);
    assert_eq!(changed_pixels(&output.changes[0]), block_pixels(4, 4, 8, 8));
    Ok(())
}

#[test]
fn test_collect_all_policy_reports_every_failure() {
    let frames = vec![
        red_flag_frame(0, 10, 10),
        float_frame(1, 10, 10, None),
        red_flag_frame(2, 10, 10),
    ];

    let result = Pipeline::default()
        .with_failure_policy(FailurePolicy::CollectAll)
        .process(frames, &RedFlagSegmenter);

    match result {
        Err(PipelineError::Frames(errors)) => {
            let failed: Vec<Option<usize>> = errors.iter().map(|e| e.frame()).collect();
            assert_eq!(failed, vec![Some(0), Some(2)]);
        }
        other => panic!("expected collected frame errors, got {:?}", other.map(|o| o.frames.len())),
    }
}

#[test]
fn test_mask_size_must_match_frame() {
    let frames = vec![float_frame(0, 12, 12, None)];

    let result = Pipeline::default().process(frames, &FixedSizeSegmenter { width: 10, height: 12 });

    let err = result.expect_err("mismatched mask must fail");
    assert!(matches!(
        err,
        PipelineError::Shape {
            stage: Stage::Segmentation,
            frame: 0,
            source: ShapeError::MaskSize {
                frame_width: 12,
                frame_height: 12,
                mask_width: 10,
                mask_height: 12,
            },
        }
    ));
}

#[test]
fn test_element_larger_than_frame_fails_refinement() {
    let frames = vec![float_frame(0, 3, 3, None)];

    let result = Pipeline::default().process(frames, &ThresholdSegmenter::default());

    let err = result.expect_err("oversized element must fail");
    assert!(matches!(
        err,
        PipelineError::Shape {
            stage: Stage::Refinement,
            source: ShapeError::KernelTooLarge { .. },
            ..
        }
    ));
}

#[test]
fn test_mixed_frame_sizes_fail_change_detection() {
    let dir = tempfile::TempDir::new().expect("Failed to create temp directory");
    write_png(dir.path(), "0.png", &gray_frame(16, 16, None));
    write_png(dir.path(), "1.png", &gray_frame(20, 16, None));

    let result = Pipeline::default().run(dir.path(), &ThresholdSegmenter::default(), &native_source());

    let err = result.expect_err("mixed sizes must fail");
    assert!(matches!(
        err,
        PipelineError::Shape { stage: Stage::ChangeDetection, frame: 1, .. }
    ));
}

#[test]
fn test_loader_resize_makes_mixed_sizes_comparable() -> anyhow::Result<()> {
    let dir = tempfile::TempDir::new()?;
    write_png(dir.path(), "0.png", &gray_frame(16, 16, None));
    write_png(dir.path(), "1.png", &gray_frame(20, 16, None));

    let source = FolderImageSource::default().with_resize(Some((24, 24)));
    let output = Pipeline::default().run(dir.path(), &ThresholdSegmenter::default(), &source)?;

    assert_eq!(output.changes.len(), 1);
    assert_eq!(output.changes[0].dimensions(), (24, 24));
    Ok(())
}

#[test]
fn test_binarize_threshold_controls_refined_domain() -> anyhow::Result<()> {
    let frames = || vec![float_frame(0, 8, 8, None), float_frame(1, 8, 8, None)];

    let binarized = Pipeline::default().process(frames(), &ConstantSegmenter(0.6))?;
    assert_eq!(binarized.masks[0], Mask::filled(8, 8, 153));
    assert!((binarized.masks[0].probability(3, 3) - 0.6).abs() < 1e-6);
    assert_eq!(binarized.refined_masks[0], Mask::filled(8, 8, 255));

    let raw = Pipeline::default()
        .with_binarize_threshold(None)?
        .process(frames(), &ConstantSegmenter(0.6))?;
    assert_eq!(raw.refined_masks[0], Mask::filled(8, 8, 153));
    assert!(raw.changes[0].is_unchanged());
    Ok(())
}

#[test]
fn test_run_with_configured_loader() -> anyhow::Result<()> {
    let dir = tempfile::TempDir::new()?;
    write_png(dir.path(), "0.png", &gray_frame(10, 10, None));
    write_png(dir.path(), "1.png", &gray_frame(10, 10, Some((2, 2, 6, 6))));

    // Default loader normalizes every frame to 256x256
    let source = FolderImageSource::default();
    let frames = source.load_sequence(dir.path())?;
    assert!(frames.iter().all(|f| f.dimensions() == (256, 256)));

    let pipeline = Pipeline::new(PipelineConfig {
        refinement: StructuringElement::square(3),
        ..PipelineConfig::default()
    })?;
    let output = pipeline.process(frames, &ThresholdSegmenter::default())?;
    assert_eq!(output.changes.len(), 1);
    assert!(!output.changes[0].is_unchanged());
    Ok(())
}

#[test]
fn test_output_is_saved_by_stage() -> anyhow::Result<()> {
    let frames = vec![
        float_frame(0, 12, 12, None),
        float_frame(1, 12, 12, Some((3, 3, 6, 6))),
    ];
    let output = Pipeline::default().process(frames, &ThresholdSegmenter::default())?;

    let dir = tempfile::TempDir::new()?;
    let out_dir = dir.path().join("out");
    output.save(&out_dir)?;

    assert!(out_dir.join("01_masks/000_frame_00.png").exists());
    assert!(out_dir.join("02_refined/001_frame_01.png").exists());
    assert!(out_dir.join("03_changes/000-001.png").exists());
    assert!(out_dir.join("03_changes/000-001_binary.png").exists());

    // Refuses to write into a non-empty directory
    assert!(output.save(&out_dir).is_err());
    Ok(())
}

#[test]
fn test_out_of_range_binarize_threshold_is_rejected() {
    for threshold in [1.5, -0.1, f32::NAN] {
        let result = Pipeline::new(PipelineConfig {
            binarize_threshold: Some(threshold),
            ..PipelineConfig::default()
        });
        assert!(
            matches!(result, Err(ConfigError::ThresholdOutOfRange { .. })),
            "threshold {} accepted",
            threshold
        );
    }

    assert!(Pipeline::default().with_binarize_threshold(Some(2.0)).is_err());
}

#[test]
fn test_boundary_binarize_thresholds_are_accepted() -> anyhow::Result<()> {
    let pipeline = Pipeline::default().with_binarize_threshold(Some(1.0))?;
    assert_eq!(pipeline.config().binarize_threshold, Some(1.0));

    let pipeline = Pipeline::new(PipelineConfig {
        binarize_threshold: Some(0.0),
        ..PipelineConfig::default()
    })?;
    assert_eq!(pipeline.config().binarize_threshold, Some(0.0));
    Ok(())
}
