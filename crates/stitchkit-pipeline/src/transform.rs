//! Pixel space to device space.
//!
//! Image rows grow downward while embroidery Y grows upward, so the
//! vertical axis is flipped. Device units are 0.1 mm.

use serde::{Deserialize, Serialize};

use crate::segment::PixelBounds;
use crate::types::{PipelineError, Point, Polyline};

/// Physical area the design is fitted into, in device units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TargetSize {
    /// Available width.
    pub width: f64,
    /// Available height.
    pub height: f64,
}

impl TargetSize {
    /// Both sides must be positive and finite.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] otherwise.
    pub fn validate(self) -> Result<(), PipelineError> {
        if self.width.is_finite() && self.height.is_finite() && self.width > 0.0 && self.height > 0.0
        {
            Ok(())
        } else {
            Err(PipelineError::InvalidConfig(format!(
                "target_size must be positive, got {}x{}",
                self.width, self.height
            )))
        }
    }
}

/// Affine map `device = offset + (pixel - origin) * scale` with the
/// vertical axis measured up from `origin_bottom`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeviceTransform {
    scale: f64,
    origin_left: f64,
    origin_bottom: f64,
    offset_x: f64,
    offset_y: f64,
}

impl DeviceTransform {
    /// Uniform scaling of the whole source grid: pixel `(0, height-1)`
    /// lands on the device origin.
    #[must_use]
    pub fn pixel_grid(height: u32, units_per_pixel: f64) -> Self {
        Self {
            scale: units_per_pixel,
            origin_left: 0.0,
            origin_bottom: f64::from(height.saturating_sub(1)),
            offset_x: 0.0,
            offset_y: 0.0,
        }
    }

    /// Fit `bounds` into `target`, preserving aspect ratio and centering
    /// the short axis.
    ///
    /// The extreme pixel centres land on the target edges. A box one pixel
    /// thin is treated as spanning one pixel.
    #[must_use]
    pub fn fit(bounds: PixelBounds, target: TargetSize) -> Self {
        let src_w = f64::from(bounds.max_x - bounds.min_x).max(1.0);
        let src_h = f64::from(bounds.max_y - bounds.min_y).max(1.0);
        let scale = (target.width / src_w).min(target.height / src_h);
        Self {
            scale,
            origin_left: f64::from(bounds.min_x),
            origin_bottom: f64::from(bounds.max_y),
            offset_x: src_w.mul_add(-scale, target.width) / 2.0,
            offset_y: src_h.mul_add(-scale, target.height) / 2.0,
        }
    }

    /// Device units per pixel.
    #[must_use]
    pub const fn scale(&self) -> f64 {
        self.scale
    }

    /// Map one pixel-space point.
    #[must_use]
    pub fn apply(&self, p: Point) -> Point {
        Point::new(
            (p.x - self.origin_left).mul_add(self.scale, self.offset_x),
            (self.origin_bottom - p.y).mul_add(self.scale, self.offset_y),
        )
    }

    /// Map every point of a polyline.
    #[must_use]
    pub fn apply_polyline(&self, polyline: &Polyline) -> Polyline {
        polyline.map_points(|p| self.apply(p))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pixel_grid_flips_vertical_axis() {
        let t = DeviceTransform::pixel_grid(20, 1.0);
        assert_eq!(t.apply(Point::new(0.0, 19.0)), Point::new(0.0, 0.0));
        assert_eq!(t.apply(Point::new(3.0, 0.0)), Point::new(3.0, 19.0));
    }

    #[test]
    fn pixel_grid_scales() {
        let t = DeviceTransform::pixel_grid(11, 2.5);
        assert_eq!(t.apply(Point::new(2.0, 10.0)), Point::new(5.0, 0.0));
        assert_eq!(t.apply(Point::new(0.0, 0.0)), Point::new(0.0, 25.0));
    }

    #[test]
    fn fit_uses_limiting_axis_and_centers() {
        // 100x50 pixel span into 1000x1000 units: width limits the scale.
        let bounds = PixelBounds {
            min_x: 10,
            min_y: 20,
            max_x: 110,
            max_y: 70,
        };
        let t = DeviceTransform::fit(
            bounds,
            TargetSize {
                width: 1000.0,
                height: 1000.0,
            },
        );
        assert!((t.scale() - 10.0).abs() < 1e-12);
        // Bottom-left of the box: x offset 0, y centred in the spare height.
        let bl = t.apply(Point::new(10.0, 70.0));
        assert!((bl.x - 0.0).abs() < 1e-9);
        assert!((bl.y - 250.0).abs() < 1e-9);
        let tr = t.apply(Point::new(110.0, 20.0));
        assert!((tr.x - 1000.0).abs() < 1e-9);
        assert!((tr.y - 750.0).abs() < 1e-9);
    }

    #[test]
    fn invalid_target_rejected() {
        let bad = TargetSize {
            width: 0.0,
            height: 10.0,
        };
        assert!(matches!(bad.validate(), Err(PipelineError::InvalidConfig(_))));
    }

    #[test]
    fn apply_polyline_keeps_closed_flag() {
        let t = DeviceTransform::pixel_grid(5, 1.0);
        let pl = Polyline::closed(vec![Point::new(0.0, 0.0), Point::new(1.0, 0.0)]);
        assert!(t.apply_polyline(&pl).is_closed());
    }
}
