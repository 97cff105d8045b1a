//! stitchkit-pipeline: Pure embroidery stitch synthesis (sans-IO).
//!
//! Converts raster images into machine stitch patterns through:
//! decode -> colour segmentation -> hatch fill + contour extraction ->
//! resampling -> thread matching -> stitch planning.
//!
//! This crate has **no I/O dependencies**. It operates on in-memory
//! byte slices or decoded images and returns structured data. Preview
//! rendering and file output live in `stitchkit-export`.

pub mod contour;
pub mod diagnostics;
pub mod fill;
pub mod optimize;
pub mod palette;
pub mod pipeline;
pub mod raster;
pub mod resample;
pub mod satin;
pub mod segment;
pub mod simplify;
pub mod stitch;
pub mod transform;
pub mod types;

pub use contour::{ContourExtractor, ContourTracer, ContourTracerKind};
pub use diagnostics::{Clock, PipelineDiagnostics, WebClock};
pub use fill::{FillDirection, FillPlanner};
pub use optimize::PathOrder;
pub use palette::ThreadPalette;
pub use pipeline::{Pipeline, PipelineStage};
pub use satin::ContourStyle;
pub use segment::{ColorSegmenter, Region, RegionMask, SegmenterKind};
pub use stitch::{PatternBuilder, StitchPlanner, StopPolicy};
pub use transform::{DeviceTransform, TargetSize};
pub use types::{
    ConversionWarning, DevicePoint, Dimensions, Pattern, PipelineConfig, PipelineError, Point,
    Polyline, ProcessResult, Rgb, RgbImage, StitchCommand, StitchRun, ThreadSpec,
};

use diagnostics::{PipelineSummary, StageDiagnostics};
use pipeline::Decoded;

/// Run the full pipeline on encoded image bytes.
///
/// Takes raw image bytes (PNG, JPEG, BMP, WebP) and a configuration,
/// then produces a [`ProcessResult`] holding the stitch pattern, every
/// recoverable warning, and the source image dimensions.
///
/// # Errors
///
/// Returns [`PipelineError::InvalidConfig`] if the configuration fails
/// validation, [`PipelineError::EmptyInput`] if `image_bytes` is empty,
/// and [`PipelineError::ImageDecode`] if the format is unrecognized.
pub fn process(
    image_bytes: &[u8],
    config: &PipelineConfig,
) -> Result<ProcessResult, PipelineError> {
    let decoded = Pipeline::new(image_bytes.to_vec(), config.clone()).decode()?;
    run_from(decoded)
}

/// Run the full pipeline on an already-decoded image.
///
/// # Errors
///
/// Returns [`PipelineError::InvalidConfig`] if the configuration fails
/// validation.
pub fn process_image(
    image: &RgbImage,
    config: &PipelineConfig,
) -> Result<ProcessResult, PipelineError> {
    run_from(Pipeline::from_image(image.clone(), config.clone())?)
}

fn run_from(decoded: Decoded) -> Result<ProcessResult, PipelineError> {
    Ok(decoded
        .segment()
        .trace()
        .resample()
        .plan()?
        .into_result())
}

/// Run the full pipeline and time every stage.
///
/// Produces the same [`ProcessResult`] as [`process`] plus per-stage
/// [`PipelineDiagnostics`].
///
/// # Errors
///
/// Same as [`process`].
pub fn process_with_diagnostics<C: Clock>(
    image_bytes: &[u8],
    config: &PipelineConfig,
    clock: &C,
) -> Result<(ProcessResult, PipelineDiagnostics), PipelineError> {
    let start = clock.now();

    let t = clock.now();
    let decoded = Pipeline::new(image_bytes.to_vec(), config.clone()).decode()?;
    let decode = StageDiagnostics::of(&decoded, clock.elapsed(&t));
    let dimensions = decoded.dimensions();

    let t = clock.now();
    let segmented = decoded.segment();
    let segmentation = StageDiagnostics::of(&segmented, clock.elapsed(&t));
    let region_count = segmented.regions().len();

    let t = clock.now();
    let traced = segmented.trace();
    let tracing = StageDiagnostics::of(&traced, clock.elapsed(&t));

    let t = clock.now();
    let resampled = traced.resample();
    let resampling = StageDiagnostics::of(&resampled, clock.elapsed(&t));

    let t = clock.now();
    let planned = resampled.plan()?;
    let planning = StageDiagnostics::of(&planned, clock.elapsed(&t));

    let result = planned.into_result();
    let diagnostics = PipelineDiagnostics {
        decode: Some(decode),
        segmentation,
        tracing,
        resampling,
        planning,
        total_duration: clock.elapsed(&start),
        summary: PipelineSummary {
            image_width: dimensions.width,
            image_height: dimensions.height,
            pixel_count: dimensions.pixel_count(),
            region_count,
            thread_count: result.pattern.threads().len(),
            stitch_count: result.pattern.stitch_count(),
            warning_count: result.warnings.len(),
        },
    };

    Ok((result, diagnostics))
}
