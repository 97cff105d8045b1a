//! Shared types for the stitchkit embroidery pipeline.
//!
//! Two coordinate spaces appear throughout the crate:
//!
//! - **pixel space**: floating-point [`Point`]s with `y` growing
//!   downward, produced by segmentation, contour tracing, and fill
//!   planning;
//! - **device space**: integer [`DevicePoint`]s in 0.1 mm units with `y`
//!   growing upward, carried by every [`StitchCommand`].
//!
//! [`DeviceTransform`](crate::transform::DeviceTransform) maps between them.

use serde::{Deserialize, Serialize};

use crate::contour::ContourTracerKind;
use crate::fill::FillDirection;
use crate::optimize::PathOrder;
use crate::satin::ContourStyle;
use crate::segment::SegmenterKind;
use crate::stitch::StopPolicy;
use crate::transform::TargetSize;

/// Re-export `RgbImage` so downstream crates can hand decoded images to
/// [`process_image`](crate::process_image) without depending on `image`
/// directly.
pub use image::RgbImage;

/// Re-export `GrayImage`, the backing store of every region mask.
pub use image::GrayImage;

/// A 2D point with floating-point coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// Horizontal position.
    pub x: f64,
    /// Vertical position.
    pub y: f64,
}

impl Point {
    /// Create a new point.
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Squared Euclidean distance to another point.
    ///
    /// Avoids the square root for comparison purposes.
    #[must_use]
    pub fn distance_squared(self, other: Self) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx.mul_add(dx, dy * dy)
    }

    /// Euclidean distance to another point.
    #[must_use]
    pub fn distance(self, other: Self) -> f64 {
        self.distance_squared(other).sqrt()
    }

    /// Linear interpolation towards `other` by factor `t`.
    #[must_use]
    pub fn lerp(self, other: Self, t: f64) -> Self {
        Self::new(
            t.mul_add(other.x - self.x, self.x),
            t.mul_add(other.y - self.y, self.y),
        )
    }
}

/// An ordered sequence of points.
///
/// A closed polyline is a contour loop whose last point repeats the
/// first; an open one is a hatch segment or other stroke.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Polyline {
    points: Vec<Point>,
    closed: bool,
}

impl Polyline {
    /// Create a new open polyline from a vector of points.
    #[must_use]
    pub const fn new(points: Vec<Point>) -> Self {
        Self {
            points,
            closed: false,
        }
    }

    /// Create a closed polyline, repeating the first point at the end
    /// when the input does not already do so.
    #[must_use]
    pub fn closed(mut points: Vec<Point>) -> Self {
        if let (Some(&first), Some(&last)) = (points.first(), points.last())
            && (points.len() == 1 || first != last)
        {
            points.push(first);
        }
        Self {
            points,
            closed: true,
        }
    }

    /// Returns `true` for contour loops.
    #[must_use]
    pub const fn is_closed(&self) -> bool {
        self.closed
    }

    /// Returns `true` if the polyline has no points.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Returns the number of points in the polyline.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.points.len()
    }

    /// Returns the first point, if any.
    #[must_use]
    pub fn first(&self) -> Option<&Point> {
        self.points.first()
    }

    /// Returns the last point, if any.
    #[must_use]
    pub fn last(&self) -> Option<&Point> {
        self.points.last()
    }

    /// Returns a slice of all points.
    #[must_use]
    pub fn points(&self) -> &[Point] {
        &self.points
    }

    /// Consumes the polyline and returns the underlying vector of points.
    #[must_use]
    pub fn into_points(self) -> Vec<Point> {
        self.points
    }

    /// Total arc length: the sum of all segment lengths.
    #[must_use]
    pub fn length(&self) -> f64 {
        self.points.windows(2).map(|w| w[0].distance(w[1])).sum()
    }

    /// The same path walked in the opposite direction.
    #[must_use]
    pub fn reversed(&self) -> Self {
        let mut points = self.points.clone();
        points.reverse();
        Self {
            points,
            closed: self.closed,
        }
    }

    /// Apply `f` to every point, keeping the closed flag.
    #[must_use]
    pub fn map_points(&self, f: impl Fn(Point) -> Point) -> Self {
        Self {
            points: self.points.iter().map(|&p| f(p)).collect(),
            closed: self.closed,
        }
    }

    /// Number of distinct vertices, ignoring the repeated closing point.
    #[must_use]
    pub fn distinct_vertex_count(&self) -> usize {
        let mut sorted = self.points.clone();
        sorted.sort_by(|a, b| a.x.total_cmp(&b.x).then(a.y.total_cmp(&b.y)));
        sorted.dedup();
        sorted.len()
    }
}

/// Image dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Dimensions {
    /// Total pixel count.
    #[must_use]
    pub const fn pixel_count(self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

/// A 24-bit colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rgb {
    /// Red channel.
    pub r: u8,
    /// Green channel.
    pub g: u8,
    /// Blue channel.
    pub b: u8,
}

impl Rgb {
    /// Create a colour from its channels.
    #[must_use]
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Perceived brightness on a 0–255 scale (`0.299 R + 0.587 G + 0.114 B`).
    #[must_use]
    pub fn luma(self) -> f64 {
        luma(f64::from(self.r), f64::from(self.g), f64::from(self.b))
    }

    /// Squared Euclidean distance in RGB space.
    #[must_use]
    pub fn distance_squared(self, other: Self) -> u32 {
        let dr = i32::from(self.r) - i32::from(other.r);
        let dg = i32::from(self.g) - i32::from(other.g);
        let db = i32::from(self.b) - i32::from(other.b);
        dr.unsigned_abs().pow(2) + dg.unsigned_abs().pow(2) + db.unsigned_abs().pow(2)
    }

    /// `#RRGGBB` notation.
    #[must_use]
    pub fn to_hex(self) -> String {
        format!("#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }

    /// Parse `#RRGGBB` (the leading `#` is optional).
    #[must_use]
    pub fn from_hex(hex: &str) -> Option<Self> {
        let hex = hex.trim_start_matches('#');
        if hex.len() != 6 || !hex.is_ascii() {
            return None;
        }
        let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
        let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
        let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
        Some(Self::new(r, g, b))
    }
}

/// Luma of an RGB triple given as floats.
pub(crate) fn luma(r: f64, g: f64, b: f64) -> f64 {
    0.299f64.mul_add(r, 0.587f64.mul_add(g, 0.114 * b))
}

/// A thread colour: display name plus RGB value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ThreadSpec {
    /// Human-readable thread name.
    pub name: String,
    /// Thread colour.
    pub color: Rgb,
}

impl ThreadSpec {
    /// Create a thread spec.
    #[must_use]
    pub fn new(name: impl Into<String>, color: Rgb) -> Self {
        Self {
            name: name.into(),
            color,
        }
    }
}

/// An integer position in device units (0.1 mm), `y` growing upward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct DevicePoint {
    /// Horizontal position.
    pub x: i32,
    /// Vertical position.
    pub y: i32,
}

impl DevicePoint {
    /// Create a device point.
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Round a floating-point position to the device grid.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn round(p: Point) -> Self {
        Self::new(p.x.round() as i32, p.y.round() as i32)
    }

    /// Euclidean distance to another device point.
    #[must_use]
    pub fn distance(self, other: Self) -> f64 {
        let dx = f64::from(self.x) - f64::from(other.x);
        let dy = f64::from(self.y) - f64::from(other.y);
        dx.hypot(dy)
    }

    /// The same position as a floating-point [`Point`].
    #[must_use]
    pub fn to_point(self) -> Point {
        Point::new(f64::from(self.x), f64::from(self.y))
    }

    /// Translate by an integer offset.
    #[must_use]
    pub const fn offset(self, dx: i32, dy: i32) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }
}

/// One embroidery machine instruction.
///
/// Movement variants carry an absolute target. The four path-break
/// kinds (`Jump`, `Trim`, `Stop`, `ColorChange`) stay distinct so that
/// a preview can split stitched lines exactly where the machine does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "command")]
pub enum StitchCommand {
    /// Needle-up move.
    Jump(DevicePoint),
    /// Needle-down puncture.
    Stitch(DevicePoint),
    /// Cut the thread.
    Trim,
    /// Pause for the operator to swap thread.
    ColorChange,
    /// Optional operator pause.
    Stop,
    /// End of design.
    End,
}

impl StitchCommand {
    /// The absolute target of a movement command.
    #[must_use]
    pub const fn target(self) -> Option<DevicePoint> {
        match self {
            Self::Jump(p) | Self::Stitch(p) => Some(p),
            Self::Trim | Self::ColorChange | Self::Stop | Self::End => None,
        }
    }

    /// Whether this command ends a connected run of stitches.
    #[must_use]
    pub const fn is_path_break(self) -> bool {
        matches!(self, Self::Jump(_) | Self::Trim | Self::Stop | Self::ColorChange)
    }
}

/// A connected run of `Stitch` targets sewn with one thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StitchRun {
    /// Index into [`Pattern::threads`].
    pub thread_index: usize,
    /// Consecutive stitch targets.
    pub points: Vec<DevicePoint>,
}

/// A finished design: command sequence plus thread list.
///
/// Only [`PatternBuilder`](crate::stitch::PatternBuilder) constructs
/// patterns; once built, a pattern exposes read-only views.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pattern {
    commands: Vec<StitchCommand>,
    threads: Vec<ThreadSpec>,
}

impl Pattern {
    pub(crate) const fn from_parts(commands: Vec<StitchCommand>, threads: Vec<ThreadSpec>) -> Self {
        Self { commands, threads }
    }

    /// The command sequence, always terminated by exactly one `End`.
    #[must_use]
    pub fn commands(&self) -> &[StitchCommand] {
        &self.commands
    }

    /// Threads in sewing order; one per colour block.
    #[must_use]
    pub fn threads(&self) -> &[ThreadSpec] {
        &self.threads
    }

    /// `true` when the pattern contains no stitches.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stitch_count() == 0
    }

    /// Number of `Stitch` commands.
    #[must_use]
    pub fn stitch_count(&self) -> usize {
        self.count(|c| matches!(c, StitchCommand::Stitch(_)))
    }

    /// Number of `Jump` commands.
    #[must_use]
    pub fn jump_count(&self) -> usize {
        self.count(|c| matches!(c, StitchCommand::Jump(_)))
    }

    /// Number of `Trim` commands.
    #[must_use]
    pub fn trim_count(&self) -> usize {
        self.count(|c| matches!(c, StitchCommand::Trim))
    }

    /// Number of `Stop` commands.
    #[must_use]
    pub fn stop_count(&self) -> usize {
        self.count(|c| matches!(c, StitchCommand::Stop))
    }

    /// Number of `ColorChange` commands.
    #[must_use]
    pub fn color_change_count(&self) -> usize {
        self.count(|c| matches!(c, StitchCommand::ColorChange))
    }

    fn count(&self, pred: impl Fn(&StitchCommand) -> bool) -> usize {
        self.commands.iter().filter(|c| pred(c)).count()
    }

    /// Bounding box `(min, max)` of every movement target.
    #[must_use]
    pub fn bounds(&self) -> Option<(DevicePoint, DevicePoint)> {
        let mut targets = self.commands.iter().filter_map(|c| c.target());
        let first = targets.next()?;
        Some(targets.fold((first, first), |(lo, hi), p| {
            (
                DevicePoint::new(lo.x.min(p.x), lo.y.min(p.y)),
                DevicePoint::new(hi.x.max(p.x), hi.y.max(p.y)),
            )
        }))
    }

    /// Split the stitches into connected runs, breaking at every
    /// `Jump`, `Trim`, `Stop`, and `ColorChange`.
    ///
    /// Runs with a single stitch are kept; a renderer may draw them as
    /// dots or skip them.
    #[must_use]
    pub fn stitch_runs(&self) -> Vec<StitchRun> {
        let mut runs = Vec::new();
        let mut thread_index = 0;
        let mut current: Vec<DevicePoint> = Vec::new();

        for command in &self.commands {
            match *command {
                StitchCommand::Stitch(p) => current.push(p),
                other => {
                    if !current.is_empty() {
                        runs.push(StitchRun {
                            thread_index,
                            points: std::mem::take(&mut current),
                        });
                    }
                    if other == StitchCommand::ColorChange {
                        thread_index += 1;
                    }
                }
            }
        }
        if !current.is_empty() {
            runs.push(StitchRun {
                thread_index,
                points: current,
            });
        }
        runs
    }
}

/// Configuration for the embroidery pipeline.
///
/// Distances are device units (1 unit = 0.1 mm) unless documented as
/// pixels. Call [`validate`](Self::validate) (done automatically by
/// [`process`](crate::process)) before running any stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Which colour segmentation strategy to use.
    pub segmenter: SegmenterKind,

    /// Maximum number of k-means clusters.
    pub cluster_count: usize,

    /// Luma cut-off for [`SegmenterKind::Threshold`]: pixels darker than
    /// this belong to the design.
    pub threshold_level: u8,

    /// Clusters whose mean luma (0–255) is at or below this value are
    /// treated as outline/background and dropped. Negative disables.
    pub dark_threshold: f64,

    /// Clusters covering at least this fraction of the image are treated
    /// as a backing layer and dropped.
    pub max_area_fraction: f64,

    /// Which contour tracing algorithm to use.
    pub contour_tracer: ContourTracerKind,

    /// Whether to generate hatch fill for each region.
    pub fill_enabled: bool,

    /// Hatch row spacing in pixels.
    pub fill_pitch: f64,

    /// Hatch scan orientation.
    pub fill_direction: FillDirection,

    /// How contour outlines are stitched.
    pub contour_style: ContourStyle,

    /// Device units per source pixel. Ignored when `target_size` is set.
    pub units_per_pixel: f64,

    /// Fit the design into this area (device units), preserving aspect
    /// ratio.
    pub target_size: Option<TargetSize>,

    /// Arc-length resampling step.
    pub resample_step: f64,

    /// Hard upper bound on any single stitch.
    pub max_stitch_length: f64,

    /// Tie-in/tie-out anchor amplitude. Zero disables anchors.
    pub tie_step: f64,

    /// Gaps between consecutive paths of one region up to this length
    /// are sewn through instead of trimmed and jumped. Zero disables.
    pub jump_threshold: f64,

    /// Ramer-Douglas-Peucker tolerance in pixels.
    pub simplify_epsilon: f64,

    /// Raw traced contours with fewer points are discarded.
    pub min_polygon_vertices: usize,

    /// Ordering of paths within one region.
    pub path_order: PathOrder,

    /// Whether a `Stop` precedes each `ColorChange`.
    pub stop_policy: StopPolicy,

    /// Custom thread palette. `None` selects the built-in table.
    pub palette: Option<Vec<ThreadSpec>>,

    /// Centre the finished pattern on the origin.
    pub center_origin: bool,
}

impl PipelineConfig {
    /// Default k-means cluster count.
    pub const DEFAULT_CLUSTER_COUNT: usize = 6;
    /// Default threshold-mode luma cut-off.
    pub const DEFAULT_THRESHOLD_LEVEL: u8 = 200;
    /// Default dark-cluster cut-off.
    pub const DEFAULT_DARK_THRESHOLD: f64 = 40.0;
    /// Default backing-layer area fraction.
    pub const DEFAULT_MAX_AREA_FRACTION: f64 = 0.6;
    /// Default hatch pitch in pixels.
    pub const DEFAULT_FILL_PITCH: f64 = 4.0;
    /// Default resampling step (0.8 mm).
    pub const DEFAULT_RESAMPLE_STEP: f64 = 8.0;
    /// Default maximum stitch length (7 mm).
    pub const DEFAULT_MAX_STITCH_LENGTH: f64 = 70.0;
    /// Default tie anchor amplitude (0.3 mm).
    pub const DEFAULT_TIE_STEP: f64 = 3.0;
    /// Default simplification tolerance in pixels.
    pub const DEFAULT_SIMPLIFY_EPSILON: f64 = 2.0;
    /// Default minimum raw contour length.
    pub const DEFAULT_MIN_POLYGON_VERTICES: usize = 8;

    /// Check every numeric constraint.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] naming the first
    /// offending field.
    pub fn validate(&self) -> Result<(), PipelineError> {
        let invalid = |msg: String| Err(PipelineError::InvalidConfig(msg));

        if !(self.resample_step.is_finite() && self.resample_step > 0.0) {
            return invalid(format!(
                "resample_step must be positive, got {}",
                self.resample_step
            ));
        }
        if !(self.fill_pitch.is_finite() && self.fill_pitch > 0.0) {
            return invalid(format!(
                "fill_pitch must be positive, got {}",
                self.fill_pitch
            ));
        }
        crate::stitch::validate_stitch_limits(self.max_stitch_length, self.tie_step)?;
        if !(self.jump_threshold.is_finite() && self.jump_threshold >= 0.0) {
            return invalid(format!(
                "jump_threshold must be non-negative, got {}",
                self.jump_threshold
            ));
        }
        if self.cluster_count == 0 {
            return invalid("cluster_count must be at least 1".to_string());
        }
        if !(self.max_area_fraction > 0.0 && self.max_area_fraction <= 1.0) {
            return invalid(format!(
                "max_area_fraction must be in (0, 1], got {}",
                self.max_area_fraction
            ));
        }
        if self.dark_threshold.is_nan() {
            return invalid("dark_threshold must not be NaN".to_string());
        }
        if !(self.simplify_epsilon.is_finite() && self.simplify_epsilon >= 0.0) {
            return invalid(format!(
                "simplify_epsilon must be non-negative, got {}",
                self.simplify_epsilon
            ));
        }
        if !(self.units_per_pixel.is_finite() && self.units_per_pixel > 0.0) {
            return invalid(format!(
                "units_per_pixel must be positive, got {}",
                self.units_per_pixel
            ));
        }
        if let Some(target) = self.target_size {
            target.validate()?;
        }
        self.contour_style.validate()?;
        if self.palette.as_ref().is_some_and(Vec::is_empty) {
            return invalid("palette must contain at least one thread".to_string());
        }
        Ok(())
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            segmenter: SegmenterKind::default(),
            cluster_count: Self::DEFAULT_CLUSTER_COUNT,
            threshold_level: Self::DEFAULT_THRESHOLD_LEVEL,
            dark_threshold: Self::DEFAULT_DARK_THRESHOLD,
            max_area_fraction: Self::DEFAULT_MAX_AREA_FRACTION,
            contour_tracer: ContourTracerKind::default(),
            fill_enabled: true,
            fill_pitch: Self::DEFAULT_FILL_PITCH,
            fill_direction: FillDirection::default(),
            contour_style: ContourStyle::default(),
            units_per_pixel: 1.0,
            target_size: None,
            resample_step: Self::DEFAULT_RESAMPLE_STEP,
            max_stitch_length: Self::DEFAULT_MAX_STITCH_LENGTH,
            tie_step: Self::DEFAULT_TIE_STEP,
            jump_threshold: 0.0,
            simplify_epsilon: Self::DEFAULT_SIMPLIFY_EPSILON,
            min_polygon_vertices: Self::DEFAULT_MIN_POLYGON_VERTICES,
            path_order: PathOrder::default(),
            stop_policy: StopPolicy::default(),
            palette: None,
            center_origin: true,
        }
    }
}

/// A recoverable anomaly. The affected unit is skipped and the run
/// continues.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum ConversionWarning {
    /// No colour cluster survived filtering; the pattern is empty.
    #[error("no stitchable region survived segmentation")]
    SegmentationEmpty,

    /// A contour had too few vertices to form a polygon.
    #[error("region {region}: dropped degenerate polygon with {vertices} vertices")]
    DegeneratePolygon {
        /// Region index in processing order.
        region: usize,
        /// Vertex count at the point of rejection.
        vertices: usize,
    },

    /// A hatch run started and ended on the same pixel.
    #[error("region {region}: dropped zero-length hatch segment")]
    ZeroLengthSegment {
        /// Region index in processing order.
        region: usize,
    },

    /// A path collapsed to a single device point and was not stitched.
    #[error("region {region}: skipped zero-length path")]
    DegeneratePath {
        /// Region index in processing order.
        region: usize,
    },
}

/// Paths generated for one region, plus whatever was dropped on the way.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RegionPaths {
    /// Surviving paths in device units.
    pub paths: Vec<Polyline>,
    /// One entry per dropped polygon or segment.
    pub warnings: Vec<ConversionWarning>,
}

/// Result of running the full pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessResult {
    /// The frozen design.
    pub pattern: Pattern,

    /// Recoverable anomalies encountered along the way.
    pub warnings: Vec<ConversionWarning>,

    /// Dimensions of the source image in pixels.
    pub dimensions: Dimensions,
}

/// Errors that abort a conversion.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Failed to decode the input image.
    #[error("failed to decode image: {0}")]
    ImageDecode(#[from] image::ImageError),

    /// The input image bytes were empty.
    #[error("input image data is empty")]
    EmptyInput,

    /// Pipeline configuration is invalid.
    #[error("invalid pipeline configuration: {0}")]
    InvalidConfig(String),
}
