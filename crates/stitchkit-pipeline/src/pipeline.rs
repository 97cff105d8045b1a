//! Incremental pipeline: advance stage-by-stage, inspecting each
//! intermediate result before continuing.
//!
//! [`crate::process`] runs everything in one call. [`Pipeline`] lets the
//! caller drive execution one step at a time:
//!
//! ```rust
//! # use stitchkit_pipeline::{Pipeline, PipelineConfig, PipelineError};
//! # fn run(png: Vec<u8>) -> Result<(), PipelineError> {
//! let planned = Pipeline::new(png, PipelineConfig::default())
//!     .decode()?
//!     .segment()
//!     .trace()
//!     .resample()
//!     .plan()?;
//!
//! let result = planned.into_result();
//! # Ok(())
//! # }
//! ```
//!
//! Each stage method consumes `self` and returns the next state, so
//! stages cannot be skipped or reordered. Configuration is validated by
//! the first transition, before any pixel is touched.

use image::RgbImage;

use crate::contour::ContourExtractor;
use crate::diagnostics::StageMetrics;
use crate::fill::FillPlanner;
use crate::palette::ThreadPalette;
use crate::segment::{ColorSegmenter, Region, regions_bounds};
use crate::stitch::StitchPlanner;
use crate::transform::DeviceTransform;
use crate::types::{
    ConversionWarning, Dimensions, Pattern, PipelineConfig, PipelineError, Polyline,
    ProcessResult, Rgb,
};

// ───────────────────────── Stage 0: Pending ──────────────────────────

/// Pipeline state before any processing has occurred.
///
/// Call [`decode`](Self::decode) to advance.
#[must_use = "pipeline stages are consumed by advancing — call .decode() to continue"]
pub struct Pending {
    config: PipelineConfig,
    source: Vec<u8>,
}

impl Pending {
    /// The raw source image bytes.
    #[must_use]
    pub fn source(&self) -> &[u8] {
        &self.source
    }

    /// Validate the configuration, then decode the source image.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] for an unusable
    /// configuration, [`PipelineError::EmptyInput`] for empty bytes, and
    /// [`PipelineError::ImageDecode`] for unrecognized or corrupt data.
    pub fn decode(self) -> Result<Decoded, PipelineError> {
        self.config.validate()?;
        let image = crate::raster::decode(&self.source)?;
        Ok(Decoded::new(self.config, image, Some(self.source.len())))
    }
}

// ───────────────────────── Stage 1: Decoded ──────────────────────────

/// Pipeline state holding the opaque source raster.
#[must_use = "pipeline stages are consumed by advancing — call .segment() to continue"]
pub struct Decoded {
    config: PipelineConfig,
    image: RgbImage,
    source_len: Option<usize>,
}

impl Decoded {
    const fn new(config: PipelineConfig, image: RgbImage, source_len: Option<usize>) -> Self {
        Self {
            config,
            image,
            source_len,
        }
    }

    /// The decoded image.
    #[must_use]
    pub const fn image(&self) -> &RgbImage {
        &self.image
    }

    /// Image dimensions.
    #[must_use]
    pub fn dimensions(&self) -> Dimensions {
        Dimensions {
            width: self.image.width(),
            height: self.image.height(),
        }
    }

    /// Split the image into colour regions.
    pub fn segment(self) -> Segmented {
        let dimensions = self.dimensions();
        let regions = self.config.segmenter.segment(&self.image, &self.config);
        let mut warnings = Vec::new();
        if regions.is_empty() {
            tracing::warn!("no stitchable region survived segmentation");
            warnings.push(ConversionWarning::SegmentationEmpty);
        }
        tracing::debug!(regions = regions.len(), "segmentation done");
        Segmented {
            config: self.config,
            dimensions,
            regions,
            warnings,
        }
    }
}

// ───────────────────────── Stage 2: Segmented ────────────────────────

/// Pipeline state after colour segmentation.
#[must_use = "pipeline stages are consumed by advancing — call .trace() to continue"]
pub struct Segmented {
    config: PipelineConfig,
    dimensions: Dimensions,
    regions: Vec<Region>,
    warnings: Vec<ConversionWarning>,
}

impl Segmented {
    /// Surviving regions, largest first.
    #[must_use]
    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    /// The pixel-to-device mapping every later stage shares.
    #[must_use]
    pub fn transform(&self) -> DeviceTransform {
        match (self.config.target_size, regions_bounds(&self.regions)) {
            (Some(target), Some(bounds)) => DeviceTransform::fit(bounds, target),
            _ => DeviceTransform::pixel_grid(self.dimensions.height, self.config.units_per_pixel),
        }
    }

    /// Plan hatch fill and trace outlines for every region.
    pub fn trace(self) -> Traced {
        let transform = self.transform();
        let extractor = ContourExtractor::new(&self.config, transform);
        let filler = FillPlanner::new(
            self.config.fill_pitch,
            self.config.fill_direction,
            transform,
        );
        let mut warnings = self.warnings;

        let regions: Vec<TracedRegion> = self
            .regions
            .iter()
            .enumerate()
            .map(|(index, region)| {
                let fill = if self.config.fill_enabled {
                    let planned = filler.plan(&region.mask, index);
                    warnings.extend(planned.warnings);
                    planned.paths
                } else {
                    Vec::new()
                };
                let extracted = extractor.extract(&region.mask, index);
                warnings.extend(extracted.warnings);
                TracedRegion {
                    color: region.color,
                    fill,
                    outlines: extracted.paths,
                }
            })
            .collect();

        let dropped = warnings
            .iter()
            .filter(|w| !matches!(w, ConversionWarning::SegmentationEmpty))
            .count();
        if dropped > 0 {
            tracing::warn!(dropped, "dropped degenerate polygons or hatch segments");
        }

        Traced {
            config: self.config,
            dimensions: self.dimensions,
            regions,
            warnings,
        }
    }
}

/// Raw device-space paths of one region.
#[derive(Debug, Clone, PartialEq)]
pub struct TracedRegion {
    /// Representative colour from segmentation.
    pub color: Rgb,
    /// Hatch segments, in boustrophedon order.
    pub fill: Vec<Polyline>,
    /// Closed outlines, holes included.
    pub outlines: Vec<Polyline>,
}

// ───────────────────────── Stage 3: Traced ───────────────────────────

/// Pipeline state after fill planning and contour extraction.
#[must_use = "pipeline stages are consumed by advancing — call .resample() to continue"]
pub struct Traced {
    config: PipelineConfig,
    dimensions: Dimensions,
    regions: Vec<TracedRegion>,
    warnings: Vec<ConversionWarning>,
}

impl Traced {
    /// Per-region fill and outline paths.
    #[must_use]
    pub fn regions(&self) -> &[TracedRegion] {
        &self.regions
    }

    /// Resample every path, render outline styles, and order the result.
    ///
    /// Fill is sewn before outlines so the outline covers hatch ends.
    pub fn resample(self) -> Resampled {
        let step = self.config.resample_step;
        let style = self.config.contour_style;
        let order = self.config.path_order;

        let regions = self
            .regions
            .into_iter()
            .map(|region| {
                let paths = region
                    .fill
                    .iter()
                    .map(|p| crate::resample::resample(p, step))
                    .chain(region.outlines.iter().map(|p| style.render(p, step)))
                    .collect();
                SewingRegion {
                    color: region.color,
                    paths: order.apply(paths),
                }
            })
            .collect();

        Resampled {
            config: self.config,
            dimensions: self.dimensions,
            regions,
            warnings: self.warnings,
        }
    }
}

/// Paths of one region in sewing order.
#[derive(Debug, Clone, PartialEq)]
pub struct SewingRegion {
    /// Representative colour from segmentation.
    pub color: Rgb,
    /// Resampled paths.
    pub paths: Vec<Polyline>,
}

// ───────────────────────── Stage 4: Resampled ────────────────────────

/// Pipeline state after resampling.
#[must_use = "pipeline stages are consumed by advancing — call .plan() to continue"]
pub struct Resampled {
    config: PipelineConfig,
    dimensions: Dimensions,
    regions: Vec<SewingRegion>,
    warnings: Vec<ConversionWarning>,
}

impl Resampled {
    /// Per-region sewing paths.
    #[must_use]
    pub fn regions(&self) -> &[SewingRegion] {
        &self.regions
    }

    /// Match threads and run the stitch planner.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] if the stitch limits are
    /// unusable.
    pub fn plan(self) -> Result<Planned, PipelineError> {
        let palette = ThreadPalette::from_config(self.config.palette.as_deref());
        let mut planner = StitchPlanner::new(&self.config)?;

        for (index, region) in self.regions.iter().enumerate() {
            let thread = palette.nearest(region.color).clone();
            tracing::debug!(region = index, thread = %thread.name, "sewing region");
            planner.begin_region(index, thread);
            for path in &region.paths {
                planner.sew(path);
            }
            planner.end_region();
        }

        let (pattern, skipped) = planner.finish(self.config.center_origin);
        let mut warnings = self.warnings;
        warnings.extend(skipped);

        tracing::debug!(
            commands = pattern.commands().len(),
            stitches = pattern.stitch_count(),
            threads = pattern.threads().len(),
            "stitch planning done"
        );

        Ok(Planned {
            dimensions: self.dimensions,
            pattern,
            warnings,
        })
    }
}

// ───────────────────────── Stage 5: Planned ──────────────────────────

/// The final stage: a frozen pattern.
#[must_use = "call .into_result() to extract the ProcessResult"]
pub struct Planned {
    dimensions: Dimensions,
    pattern: Pattern,
    warnings: Vec<ConversionWarning>,
}

impl Planned {
    /// The frozen pattern.
    #[must_use]
    pub const fn pattern(&self) -> &Pattern {
        &self.pattern
    }

    /// Every recoverable anomaly, in the order encountered.
    #[must_use]
    pub fn warnings(&self) -> &[ConversionWarning] {
        &self.warnings
    }

    /// Consume the pipeline and return the [`ProcessResult`].
    #[must_use]
    pub fn into_result(self) -> ProcessResult {
        ProcessResult {
            pattern: self.pattern,
            warnings: self.warnings,
            dimensions: self.dimensions,
        }
    }
}

// ──────────────────────── PipelineStage trait ────────────────────────

/// Total number of stages in the pipeline.
pub const STAGE_COUNT: usize = 6;

/// Implemented by every stage so diagnostics can treat them uniformly.
pub trait PipelineStage {
    /// Human-readable stage name.
    const NAME: &str;

    /// Zero-based index, `0` for [`Pending`] through `5` for [`Planned`].
    const INDEX: usize;

    /// Metrics describing the work done to reach this stage; `None` for
    /// [`Pending`].
    fn metrics(&self) -> Option<StageMetrics>;
}

impl PipelineStage for Pending {
    const NAME: &str = "source";
    const INDEX: usize = 0;

    fn metrics(&self) -> Option<StageMetrics> {
        None
    }
}

impl PipelineStage for Decoded {
    const NAME: &str = "decode";
    const INDEX: usize = 1;

    fn metrics(&self) -> Option<StageMetrics> {
        let dimensions = self.dimensions();
        Some(StageMetrics::Decode {
            input_bytes: self.source_len,
            width: dimensions.width,
            height: dimensions.height,
            pixel_count: dimensions.pixel_count(),
        })
    }
}

impl PipelineStage for Segmented {
    const NAME: &str = "segment";
    const INDEX: usize = 2;

    fn metrics(&self) -> Option<StageMetrics> {
        Some(StageMetrics::Segmentation {
            strategy: format!("{:?}", self.config.segmenter),
            region_count: self.regions.len(),
            covered_pixels: self.regions.iter().map(|r| r.pixel_count).sum(),
            total_pixels: self.dimensions.pixel_count(),
        })
    }
}

impl PipelineStage for Traced {
    const NAME: &str = "trace";
    const INDEX: usize = 3;

    fn metrics(&self) -> Option<StageMetrics> {
        let outlines: Vec<&Polyline> = self.regions.iter().flat_map(|r| &r.outlines).collect();
        Some(StageMetrics::Tracing {
            outline_count: outlines.len(),
            outline_points: outlines.iter().map(|p| p.len()).sum(),
            fill_segment_count: self.regions.iter().map(|r| r.fill.len()).sum(),
            dropped_polygons: count_warnings(&self.warnings, |w| {
                matches!(w, ConversionWarning::DegeneratePolygon { .. })
            }),
            dropped_segments: count_warnings(&self.warnings, |w| {
                matches!(w, ConversionWarning::ZeroLengthSegment { .. })
            }),
        })
    }
}

impl PipelineStage for Resampled {
    const NAME: &str = "resample";
    const INDEX: usize = 4;

    fn metrics(&self) -> Option<StageMetrics> {
        let paths = self.regions.iter().flat_map(|r| &r.paths);
        Some(StageMetrics::Resampling {
            step: self.config.resample_step,
            path_count: paths.clone().count(),
            point_count: paths.map(Polyline::len).sum(),
        })
    }
}

impl PipelineStage for Planned {
    const NAME: &str = "plan";
    const INDEX: usize = 5;

    fn metrics(&self) -> Option<StageMetrics> {
        Some(StageMetrics::Planning {
            command_count: self.pattern.commands().len(),
            stitch_count: self.pattern.stitch_count(),
            jump_count: self.pattern.jump_count(),
            trim_count: self.pattern.trim_count(),
            color_change_count: self.pattern.color_change_count(),
            thread_count: self.pattern.threads().len(),
            skipped_paths: count_warnings(&self.warnings, |w| {
                matches!(w, ConversionWarning::DegeneratePath { .. })
            }),
        })
    }
}

fn count_warnings(
    warnings: &[ConversionWarning],
    pred: impl Fn(&ConversionWarning) -> bool,
) -> usize {
    warnings.iter().filter(|w| pred(w)).count()
}

// ───────────────────── Pipeline entry point ──────────────────────────

/// Incremental embroidery pipeline.
///
/// [`Pipeline::new`] stores encoded bytes; [`Pipeline::from_image`]
/// starts from an already-decoded raster. Either way nothing runs until
/// the first stage method is called.
pub struct Pipeline;

impl Pipeline {
    /// Create a pipeline from encoded image bytes.
    #[allow(clippy::new_ret_no_self)]
    pub const fn new(image_bytes: Vec<u8>, config: PipelineConfig) -> Pending {
        Pending {
            config,
            source: image_bytes,
        }
    }

    /// Create a pipeline from a decoded image, skipping the decode stage.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] for an unusable
    /// configuration.
    pub fn from_image(image: RgbImage, config: PipelineConfig) -> Result<Decoded, PipelineError> {
        config.validate()?;
        Ok(Decoded::new(config, image, None))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn png_bytes(img: &RgbImage) -> Vec<u8> {
        let mut buf = Vec::new();
        let encoder = image::codecs::png::PngEncoder::new(&mut buf);
        image::ImageEncoder::write_image(
            encoder,
            img.as_raw(),
            img.width(),
            img.height(),
            image::ExtendedColorType::Rgb8,
        )
        .unwrap();
        buf
    }

    fn red_square() -> RgbImage {
        RgbImage::from_fn(20, 20, |x, y| {
            if (5..15).contains(&x) && (5..15).contains(&y) {
                image::Rgb([210, 20, 30])
            } else {
                image::Rgb([255, 255, 255])
            }
        })
    }

    fn config() -> PipelineConfig {
        PipelineConfig {
            cluster_count: 2,
            fill_pitch: 2.0,
            resample_step: 2.0,
            max_stitch_length: 5.0,
            tie_step: 2.0,
            ..PipelineConfig::default()
        }
    }

    #[test]
    fn pending_exposes_source_bytes() {
        let png = png_bytes(&red_square());
        let expected = png.len();
        let pending = Pipeline::new(png, config());
        assert_eq!(pending.source().len(), expected);
        assert!(pending.metrics().is_none());
    }

    #[test]
    fn invalid_config_fails_before_decoding() {
        let bad = PipelineConfig {
            max_stitch_length: 0.0,
            ..PipelineConfig::default()
        };
        // Empty bytes would be EmptyInput; the config error wins.
        let result = Pipeline::new(Vec::new(), bad).decode();
        assert!(matches!(result, Err(PipelineError::InvalidConfig(_))));
    }

    #[test]
    fn decode_errors_propagate() {
        let result = Pipeline::new(Vec::new(), config()).decode();
        assert!(matches!(result, Err(PipelineError::EmptyInput)));
        let result = Pipeline::new(vec![0xFF, 0x00], config()).decode();
        assert!(matches!(result, Err(PipelineError::ImageDecode(_))));
    }

    #[test]
    fn stages_expose_intermediates() {
        let decoded = Pipeline::new(png_bytes(&red_square()), config())
            .decode()
            .unwrap();
        assert_eq!(decoded.dimensions(), Dimensions { width: 20, height: 20 });

        let segmented = decoded.segment();
        assert_eq!(segmented.regions().len(), 1);

        let traced = segmented.trace();
        assert_eq!(traced.regions()[0].fill.len(), 5);
        assert_eq!(traced.regions()[0].outlines.len(), 1);

        let resampled = traced.resample();
        assert_eq!(resampled.regions()[0].paths.len(), 6);

        let planned = resampled.plan().unwrap();
        assert_eq!(planned.pattern().threads().len(), 1);
        assert!(planned.warnings().is_empty());
    }

    #[test]
    fn fill_can_be_disabled() {
        let traced = Pipeline::from_image(
            red_square(),
            PipelineConfig {
                fill_enabled: false,
                ..config()
            },
        )
        .unwrap()
        .segment()
        .trace();
        assert!(traced.regions()[0].fill.is_empty());
        assert_eq!(traced.regions()[0].outlines.len(), 1);
    }

    #[test]
    fn target_size_fits_design() {
        let planned = Pipeline::from_image(
            red_square(),
            PipelineConfig {
                target_size: Some(crate::transform::TargetSize {
                    width: 900.0,
                    height: 450.0,
                }),
                max_stitch_length: 70.0,
                resample_step: 20.0,
                center_origin: false,
                ..config()
            },
        )
        .unwrap()
        .segment()
        .trace()
        .resample()
        .plan()
        .unwrap();
        let (lo, hi) = planned.pattern().bounds().unwrap();
        // 9-pixel span at 50 units/pixel, centred horizontally.
        assert_eq!((lo.x, hi.x), (225, 675));
        assert_eq!((lo.y, hi.y), (0, 450));
    }

    #[test]
    fn empty_segmentation_is_a_warning() {
        let blank = RgbImage::from_pixel(10, 10, image::Rgb([255, 255, 255]));
        let result = Pipeline::from_image(blank, config())
            .unwrap()
            .segment()
            .trace()
            .resample()
            .plan()
            .unwrap()
            .into_result();
        assert_eq!(result.warnings, vec![ConversionWarning::SegmentationEmpty]);
        assert_eq!(result.pattern.commands(), &[crate::StitchCommand::End]);
    }

    #[test]
    fn stage_indices_are_sequential() {
        assert_eq!(Pending::INDEX, 0);
        assert_eq!(Decoded::INDEX, 1);
        assert_eq!(Segmented::INDEX, 2);
        assert_eq!(Traced::INDEX, 3);
        assert_eq!(Resampled::INDEX, 4);
        assert_eq!(Planned::INDEX, STAGE_COUNT - 1);
        assert_eq!(Planned::NAME, "plan");
    }
}
