//! Pipeline diagnostics: timing, counts, and other metrics for each stage.
//!
//! These diagnostics are permanent instrumentation for parameter tuning.
//! [`process_with_diagnostics`](crate::process_with_diagnostics) collects
//! them alongside the pipeline result.
//!
//! Timestamps come from a caller-supplied [`Clock`]; [`WebClock`] uses the
//! `web-time` crate, which falls back to `std::time::Instant` on native
//! targets.
//!
//! Durations are serialized as fractional seconds (`f64`) for JSON
//! compatibility, since `std::time::Duration` does not implement serde
//! traits.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::pipeline::PipelineStage;

/// Serde support for `std::time::Duration` as fractional seconds.
mod duration_serde {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        duration.as_secs_f64().serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(|_| {
            serde::de::Error::custom("duration seconds must be finite and non-negative")
        })
    }
}

/// Source of timestamps for stage timing.
pub trait Clock {
    /// Opaque timestamp.
    type Instant;

    /// The current time.
    fn now(&self) -> Self::Instant;

    /// Time passed since `since`.
    fn elapsed(&self, since: &Self::Instant) -> Duration;
}

/// [`Clock`] backed by [`web_time::Instant`].
#[derive(Debug, Clone, Copy, Default)]
pub struct WebClock;

impl Clock for WebClock {
    type Instant = web_time::Instant;

    fn now(&self) -> Self::Instant {
        web_time::Instant::now()
    }

    fn elapsed(&self, since: &Self::Instant) -> Duration {
        since.elapsed()
    }
}

/// Diagnostics collected from a single pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineDiagnostics {
    /// Image decoding; `None` when the run started from a decoded image.
    pub decode: Option<StageDiagnostics>,
    /// Colour segmentation.
    pub segmentation: StageDiagnostics,
    /// Hatch fill planning and contour extraction.
    pub tracing: StageDiagnostics,
    /// Resampling, outline styling, and path ordering.
    pub resampling: StageDiagnostics,
    /// Thread matching and stitch planning.
    pub planning: StageDiagnostics,
    /// Total wall-clock duration of the entire pipeline (seconds).
    #[serde(with = "duration_serde")]
    pub total_duration: Duration,
    /// Summary counts across all stages.
    pub summary: PipelineSummary,
}

/// Diagnostics for a single pipeline stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageDiagnostics {
    /// Wall-clock duration of this stage (seconds).
    #[serde(with = "duration_serde")]
    pub duration: Duration,
    /// Stage-specific metrics.
    pub metrics: Option<StageMetrics>,
}

impl StageDiagnostics {
    /// Capture the metrics of a freshly reached stage.
    #[must_use]
    pub fn of<S: PipelineStage>(stage: &S, duration: Duration) -> Self {
        Self {
            duration,
            metrics: stage.metrics(),
        }
    }
}

/// Stage-specific metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StageMetrics {
    /// Image decoding metrics.
    Decode {
        /// Size of the encoded input, when there was one.
        input_bytes: Option<usize>,
        /// Decoded image width in pixels.
        width: u32,
        /// Decoded image height in pixels.
        height: u32,
        /// Total pixel count (`width * height`).
        pixel_count: u64,
    },
    /// Colour segmentation metrics.
    Segmentation {
        /// Which segmenter ran.
        strategy: String,
        /// Regions that survived filtering.
        region_count: usize,
        /// Pixels assigned to a surviving region.
        covered_pixels: u64,
        /// Pixels in the image.
        total_pixels: u64,
    },
    /// Fill planning and contour extraction metrics.
    Tracing {
        /// Outline loops kept.
        outline_count: usize,
        /// Vertices across all kept outlines.
        outline_points: usize,
        /// Hatch segments kept.
        fill_segment_count: usize,
        /// Contours dropped as degenerate.
        dropped_polygons: usize,
        /// Hatch runs dropped for zero length.
        dropped_segments: usize,
    },
    /// Resampling metrics.
    Resampling {
        /// Arc-length step in device units.
        step: f64,
        /// Paths left to sew.
        path_count: usize,
        /// Points across all paths.
        point_count: usize,
    },
    /// Stitch planning metrics.
    Planning {
        /// Commands including the final `End`.
        command_count: usize,
        /// `Stitch` commands.
        stitch_count: usize,
        /// `Jump` commands.
        jump_count: usize,
        /// `Trim` commands.
        trim_count: usize,
        /// `ColorChange` commands.
        color_change_count: usize,
        /// Colour blocks.
        thread_count: usize,
        /// Paths that collapsed on the device grid.
        skipped_paths: usize,
    },
}

/// High-level summary counts for the entire pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSummary {
    /// Source image width in pixels.
    pub image_width: u32,
    /// Source image height in pixels.
    pub image_height: u32,
    /// Total pixel count.
    pub pixel_count: u64,
    /// Regions that reached the stitch planner.
    pub region_count: usize,
    /// Colour blocks in the pattern.
    pub thread_count: usize,
    /// `Stitch` commands in the pattern.
    pub stitch_count: usize,
    /// Recoverable anomalies reported.
    pub warning_count: usize,
}

impl PipelineDiagnostics {
    /// Format diagnostics as a human-readable report.
    #[must_use]
    pub fn report(&self) -> String {
        let mut lines = Vec::new();

        lines.push(format!("Pipeline Diagnostics Report\n{}", "=".repeat(60)));
        lines.push(format!(
            "Image: {}x{} ({} pixels)",
            self.summary.image_width, self.summary.image_height, self.summary.pixel_count,
        ));
        lines.push(format!(
            "Total duration: {:.3}ms",
            duration_ms(self.total_duration),
        ));
        lines.push(String::new());

        lines.push(format!(
            "{:<24} {:>10} {:>10}  {}",
            "Stage", "Duration", "% Total", "Details"
        ));
        lines.push("-".repeat(80));

        let total_ms = duration_ms(self.total_duration);
        for (name, diag) in self.stages() {
            let ms = duration_ms(diag.duration);
            let pct = if total_ms > 0.0 {
                ms / total_ms * 100.0
            } else {
                0.0
            };
            let details = diag.metrics.as_ref().map_or_else(String::new, format_metrics);
            lines.push(format!("{name:<24} {ms:>8.3}ms {pct:>9.1}%  {details}"));
        }

        lines.push(String::new());
        lines.push(format!(
            "Regions: {}  |  Threads: {}  |  Stitches: {}  |  Warnings: {}",
            self.summary.region_count,
            self.summary.thread_count,
            self.summary.stitch_count,
            self.summary.warning_count,
        ));

        lines.join("\n")
    }

    /// Executed stages in order, labelled for display.
    #[must_use]
    pub fn stages(&self) -> Vec<(&'static str, &StageDiagnostics)> {
        let mut stages = Vec::with_capacity(5);
        if let Some(ref decode) = self.decode {
            stages.push(("Decode", decode));
        }
        stages.push(("Segmentation", &self.segmentation));
        stages.push(("Fill + Contours", &self.tracing));
        stages.push(("Resampling", &self.resampling));
        stages.push(("Stitch Planning", &self.planning));
        stages
    }
}

/// Convert a `Duration` to milliseconds as `f64`.
fn duration_ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

/// Format stage metrics into a compact detail string.
fn format_metrics(metrics: &StageMetrics) -> String {
    match metrics {
        StageMetrics::Decode {
            input_bytes,
            width,
            height,
            ..
        } => match input_bytes {
            Some(bytes) => format!("{bytes} bytes -> {width}x{height}"),
            None => format!("{width}x{height} (pre-decoded)"),
        },
        StageMetrics::Segmentation {
            strategy,
            region_count,
            covered_pixels,
            total_pixels,
        } => {
            #[allow(clippy::cast_precision_loss)]
            let coverage = if *total_pixels > 0 {
                *covered_pixels as f64 / *total_pixels as f64 * 100.0
            } else {
                0.0
            };
            format!("{strategy} {region_count} regions ({coverage:.1}% covered)")
        }
        StageMetrics::Tracing {
            outline_count,
            outline_points,
            fill_segment_count,
            dropped_polygons,
            dropped_segments,
        } => format!(
            "{outline_count} outlines ({outline_points} pts), {fill_segment_count} hatch segs, dropped {dropped_polygons}/{dropped_segments}",
        ),
        StageMetrics::Resampling {
            step,
            path_count,
            point_count,
        } => format!("step={step:.1} {path_count} paths, {point_count} pts"),
        StageMetrics::Planning {
            command_count,
            stitch_count,
            jump_count,
            trim_count,
            color_change_count,
            thread_count,
            skipped_paths,
        } => format!(
            "{command_count} cmds: {stitch_count} stitches, {jump_count} jumps, {trim_count} trims, {color_change_count} changes, {thread_count} threads, {skipped_paths} skipped",
        ),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn stage(ms: u64, metrics: StageMetrics) -> StageDiagnostics {
        StageDiagnostics {
            duration: Duration::from_millis(ms),
            metrics: Some(metrics),
        }
    }

    fn sample() -> PipelineDiagnostics {
        PipelineDiagnostics {
            decode: Some(stage(
                2,
                StageMetrics::Decode {
                    input_bytes: Some(1234),
                    width: 40,
                    height: 20,
                    pixel_count: 800,
                },
            )),
            segmentation: stage(
                4,
                StageMetrics::Segmentation {
                    strategy: "KMeans".to_string(),
                    region_count: 2,
                    covered_pixels: 200,
                    total_pixels: 800,
                },
            ),
            tracing: stage(
                1,
                StageMetrics::Tracing {
                    outline_count: 2,
                    outline_points: 10,
                    fill_segment_count: 8,
                    dropped_polygons: 1,
                    dropped_segments: 0,
                },
            ),
            resampling: stage(
                1,
                StageMetrics::Resampling {
                    step: 8.0,
                    path_count: 10,
                    point_count: 60,
                },
            ),
            planning: stage(
                2,
                StageMetrics::Planning {
                    command_count: 90,
                    stitch_count: 70,
                    jump_count: 10,
                    trim_count: 10,
                    color_change_count: 1,
                    thread_count: 2,
                    skipped_paths: 0,
                },
            ),
            total_duration: Duration::from_millis(10),
            summary: PipelineSummary {
                image_width: 40,
                image_height: 20,
                pixel_count: 800,
                region_count: 2,
                thread_count: 2,
                stitch_count: 70,
                warning_count: 1,
            },
        }
    }

    #[test]
    fn report_lists_every_stage() {
        let report = sample().report();
        assert!(report.contains("Image: 40x20 (800 pixels)"));
        for name in [
            "Decode",
            "Segmentation",
            "Fill + Contours",
            "Resampling",
            "Stitch Planning",
        ] {
            assert!(report.contains(name), "missing {name} in:\n{report}");
        }
        assert!(report.contains("1234 bytes -> 40x20"));
        assert!(report.contains("25.0% covered"));
        assert!(report.contains("Warnings: 1"));
    }

    #[test]
    fn pre_decoded_runs_skip_decode_row() {
        let mut diag = sample();
        diag.decode = None;
        assert_eq!(diag.stages().len(), 4);
        assert!(!diag.report().contains("bytes ->"));
    }

    #[test]
    fn zero_total_duration_does_not_divide_by_zero() {
        let mut diag = sample();
        diag.total_duration = Duration::ZERO;
        assert!(diag.report().contains("0.0%"));
    }

    #[test]
    fn json_durations_are_seconds() {
        let json = serde_json::to_value(sample()).unwrap();
        assert!((json["total_duration"].as_f64().unwrap() - 0.010).abs() < 1e-9);
        let back: PipelineDiagnostics = serde_json::from_value(json).unwrap();
        assert_eq!(back.planning.metrics, sample().planning.metrics);
    }

    #[test]
    fn negative_duration_is_rejected() {
        let mut json = serde_json::to_value(sample()).unwrap();
        json["total_duration"] = serde_json::json!(-1.0);
        assert!(serde_json::from_value::<PipelineDiagnostics>(json).is_err());
    }

    #[test]
    fn web_clock_is_monotonic() {
        let clock = WebClock;
        let start = clock.now();
        assert!(clock.elapsed(&start) >= Duration::ZERO);
    }
}
