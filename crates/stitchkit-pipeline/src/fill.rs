//! Hatch fill: boustrophedon scan-line runs across a region mask.
//!
//! Rows are sampled every `pitch` pixels starting at the top of the
//! mask's bounding box. Within a row every maximal run of member pixels
//! becomes one two-point segment. Successive emitted rows flip scan
//! direction so each row ends near where the next one starts.

use serde::{Deserialize, Serialize};

use crate::segment::RegionMask;
use crate::transform::DeviceTransform;
use crate::types::{ConversionWarning, Point, Polyline, RegionPaths};

/// Hatch scan orientation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FillDirection {
    /// Rows scanned left to right, then right to left.
    #[default]
    Horizontal,
    /// Columns scanned top to bottom, then bottom to top.
    Vertical,
}

/// One inclusive run `start..=end` along a scan line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Run {
    start: u32,
    end: u32,
}

/// Generates hatch segments for region masks.
#[derive(Debug, Clone, Copy)]
pub struct FillPlanner {
    pitch: f64,
    direction: FillDirection,
    transform: DeviceTransform,
}

impl FillPlanner {
    /// `pitch` is in pixels and must be positive.
    #[must_use]
    pub const fn new(pitch: f64, direction: FillDirection, transform: DeviceTransform) -> Self {
        Self {
            pitch,
            direction,
            transform,
        }
    }

    /// Hatch segments for `mask` in sewing order, in device units.
    ///
    /// `region` only labels warnings.
    #[must_use]
    pub fn plan(&self, mask: &RegionMask, region: usize) -> RegionPaths {
        let mut out = RegionPaths::default();
        let Some(bounds) = mask.bounds() else {
            return out;
        };

        let (first_line, extent, span) = match self.direction {
            FillDirection::Horizontal => (bounds.min_y, bounds.height(), (bounds.min_x, bounds.max_x)),
            FillDirection::Vertical => (bounds.min_x, bounds.width(), (bounds.min_y, bounds.max_y)),
        };

        let mut emitted_rows = 0usize;
        for line in scan_lines(first_line, extent, self.pitch) {
            let runs = self.runs_on_line(mask, line, span);
            let mut segments = Vec::with_capacity(runs.len());
            for run in runs {
                if run.start == run.end {
                    out.warnings.push(ConversionWarning::ZeroLengthSegment { region });
                    continue;
                }
                segments.push(run);
            }
            if segments.is_empty() {
                continue;
            }

            let forward = emitted_rows % 2 == 0;
            if !forward {
                segments.reverse();
            }
            for run in segments {
                let (a, b) = if forward {
                    (run.start, run.end)
                } else {
                    (run.end, run.start)
                };
                let segment = Polyline::new(vec![self.point(line, a), self.point(line, b)]);
                out.paths.push(self.transform.apply_polyline(&segment));
            }
            emitted_rows += 1;
        }

        tracing::debug!(
            region,
            rows = emitted_rows,
            segments = out.paths.len(),
            "hatch fill planned"
        );
        out
    }

    /// Maximal member runs on one scan line, in ascending order.
    fn runs_on_line(&self, mask: &RegionMask, line: u32, (lo, hi): (u32, u32)) -> Vec<Run> {
        let inside = |along: u32| match self.direction {
            FillDirection::Horizontal => mask.contains(along, line),
            FillDirection::Vertical => mask.contains(line, along),
        };

        let mut runs = Vec::new();
        let mut open: Option<u32> = None;
        for along in lo..=hi {
            match (inside(along), open) {
                (true, None) => open = Some(along),
                (false, Some(start)) => {
                    runs.push(Run {
                        start,
                        end: along - 1,
                    });
                    open = None;
                }
                _ => {}
            }
        }
        if let Some(start) = open {
            runs.push(Run { start, end: hi });
        }
        runs
    }

    fn point(&self, line: u32, along: u32) -> Point {
        match self.direction {
            FillDirection::Horizontal => Point::new(f64::from(along), f64::from(line)),
            FillDirection::Vertical => Point::new(f64::from(line), f64::from(along)),
        }
    }
}

/// Scan-line indices `first + floor(k * pitch)` for every `k` with
/// `(k + 1) * pitch <= extent`, each pixel line at most once.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn scan_lines(first: u32, extent: u32, pitch: f64) -> Vec<u32> {
    let extent = f64::from(extent);
    let mut lines: Vec<u32> = Vec::new();
    let mut k = 0u32;
    while f64::from(k + 1) * pitch <= extent {
        let line = first + (f64::from(k) * pitch).floor() as u32;
        // Sub-pixel pitch maps several k onto one line.
        if lines.last() != Some(&line) {
            lines.push(line);
        }
        k += 1;
    }
    lines
}
