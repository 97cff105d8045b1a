//! Contour extraction: closed boundary polygons of a region mask.
//!
//! This module defines the [`ContourTracer`] trait for pluggable border
//! tracing algorithms and the [`ContourTracerKind`] enum for selecting
//! one at runtime. [`ContourExtractor`] wraps a tracer with the
//! filtering, simplification, and device mapping every outline needs
//! before it can be resampled.

use image::GrayImage;
use serde::{Deserialize, Serialize};

use crate::segment::RegionMask;
use crate::simplify::simplify;
use crate::transform::DeviceTransform;
use crate::types::{ConversionWarning, PipelineConfig, Point, Polyline, RegionPaths};

/// Fewest distinct vertices a simplified outline may keep.
const MIN_DISTINCT_VERTICES: usize = 3;

/// Selects which contour tracing algorithm to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ContourTracerKind {
    /// Suzuki-Abe border following via `imageproc::contours::find_contours`.
    ///
    /// Reports outer borders and hole borders alike, one point per
    /// boundary pixel.
    #[default]
    BorderFollowing,
}

/// Trait for contour tracing strategies.
///
/// Input: a binary mask (non-zero = inside).
/// Output: one raw point loop per border, in pixel coordinates, without
/// a repeated closing point.
pub trait ContourTracer {
    /// Trace every border in the mask.
    fn trace(&self, mask: &GrayImage) -> Vec<Vec<Point>>;
}

impl ContourTracer for ContourTracerKind {
    fn trace(&self, mask: &GrayImage) -> Vec<Vec<Point>> {
        match *self {
            Self::BorderFollowing => trace_border_following(mask),
        }
    }
}

fn trace_border_following(mask: &GrayImage) -> Vec<Vec<Point>> {
    imageproc::contours::find_contours::<u32>(mask)
        .into_iter()
        .map(|c| {
            c.points
                .into_iter()
                .map(|p| Point::new(f64::from(p.x), f64::from(p.y)))
                .collect()
        })
        .collect()
}

/// Turns region masks into closed outlines in device units.
#[derive(Debug, Clone, Copy)]
pub struct ContourExtractor {
    tracer: ContourTracerKind,
    epsilon: f64,
    min_vertices: usize,
    transform: DeviceTransform,
}

impl ContourExtractor {
    /// Build an extractor from the pipeline settings.
    #[must_use]
    pub const fn new(config: &PipelineConfig, transform: DeviceTransform) -> Self {
        Self {
            tracer: config.contour_tracer,
            epsilon: config.simplify_epsilon,
            min_vertices: config.min_polygon_vertices,
            transform,
        }
    }

    /// Trace, filter, close, simplify, and map every border of `mask`.
    ///
    /// `region` only labels warnings.
    #[must_use]
    pub fn extract(&self, mask: &RegionMask, region: usize) -> RegionPaths {
        let mut out = RegionPaths::default();

        for raw in self.tracer.trace(mask.as_gray()) {
            if raw.len() < self.min_vertices {
                tracing::debug!(region, points = raw.len(), "discarding short contour");
                out.warnings.push(ConversionWarning::DegeneratePolygon {
                    region,
                    vertices: raw.len(),
                });
                continue;
            }

            let outline = simplify(&Polyline::closed(raw), self.epsilon);
            let vertices = outline.distinct_vertex_count();
            if vertices < MIN_DISTINCT_VERTICES {
                tracing::debug!(region, vertices, "discarding degenerate polygon");
                out.warnings
                    .push(ConversionWarning::DegeneratePolygon { region, vertices });
                continue;
            }

            out.paths.push(self.transform.apply_polyline(&outline));
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extractor(min_vertices: usize) -> ContourExtractor {
        let config = PipelineConfig {
            min_polygon_vertices: min_vertices,
            ..PipelineConfig::default()
        };
        ContourExtractor::new(&config, DeviceTransform::pixel_grid(20, 1.0))
    }

    fn square_mask() -> RegionMask {
        RegionMask::from_fn(20, 20, |x, y| (5..15).contains(&x) && (5..15).contains(&y))
    }

    #[test]
    fn default_is_border_following() {
        assert_eq!(
            ContourTracerKind::default(),
            ContourTracerKind::BorderFollowing
        );
    }

    #[test]
    fn empty_mask_produces_no_contours() {
        let result = ContourTracerKind::BorderFollowing.trace(&GrayImage::new(10, 10));
        assert!(result.is_empty());
    }

    #[test]
    fn square_traces_one_border() {
        let raw = ContourTracerKind::BorderFollowing.trace(square_mask().as_gray());
        assert_eq!(raw.len(), 1);
        assert!(raw[0].len() >= 8);
        assert!(raw[0].contains(&Point::new(5.0, 5.0)));
        assert!(raw[0].contains(&Point::new(14.0, 14.0)));
    }

    #[test]
    fn square_yields_one_closed_quad() {
        let out = extractor(8).extract(&square_mask(), 0);
        assert!(out.warnings.is_empty());
        assert_eq!(out.paths.len(), 1);
        let outline = &out.paths[0];
        assert!(outline.is_closed());
        assert_eq!(outline.first(), outline.last());
        assert_eq!(outline.distinct_vertex_count(), 4);
    }

    #[test]
    fn outline_is_flipped_into_device_space() {
        let out = extractor(8).extract(&square_mask(), 0);
        let ys: Vec<f64> = out.paths[0].points().iter().map(|p| p.y).collect();
        // Pixel rows 5..=14 of a 20-row grid become device y 14..=5.
        assert!(ys.iter().all(|&y| (5.0..=14.0).contains(&y)));
        assert!(ys.contains(&5.0) && ys.contains(&14.0));
    }

    #[test]
    fn ring_includes_hole_border() {
        let ring = RegionMask::from_fn(20, 20, |x, y| {
            let outer = (2..18).contains(&x) && (2..18).contains(&y);
            let hole = (7..13).contains(&x) && (7..13).contains(&y);
            outer && !hole
        });
        let out = extractor(8).extract(&ring, 0);
        assert_eq!(out.paths.len(), 2);
    }

    #[test]
    fn short_contours_are_reported() {
        let speck = RegionMask::from_fn(20, 20, |x, y| x == 3 && y == 3);
        let out = extractor(8).extract(&speck, 4);
        assert!(out.paths.is_empty());
        assert!(matches!(
            out.warnings.as_slice(),
            [ConversionWarning::DegeneratePolygon { region: 4, .. }]
        ));
    }

    #[test]
    fn collapsed_outline_is_degenerate() {
        // A one-pixel-wide line passes the length filter but simplifies
        // to two distinct vertices.
        let line = RegionMask::from_fn(20, 20, |x, y| y == 10 && (2..18).contains(&x));
        let out = extractor(4).extract(&line, 1);
        assert!(out.paths.is_empty());
        assert!(matches!(
            out.warnings.as_slice(),
            [ConversionWarning::DegeneratePolygon { region: 1, vertices: 2 }]
        ));
    }
}
