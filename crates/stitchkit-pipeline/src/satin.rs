//! Outline stitch styles.
//!
//! A running outline sews the resampled contour as-is. A satin column
//! swings the needle from side to side across the contour, giving a
//! solid band of thread `width` units wide.

use serde::{Deserialize, Serialize};

use crate::resample::resample;
use crate::types::{PipelineError, Point, Polyline};

/// How contour outlines are stitched.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub enum ContourStyle {
    /// Single running stitch along the outline.
    #[default]
    Running,
    /// Zigzag across the outline.
    Satin {
        /// Column width in device units.
        width: f64,
        /// Distance along the outline between needle swings.
        spacing: f64,
    },
}

impl ContourStyle {
    /// Satin width and spacing must be positive and finite.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] otherwise.
    pub fn validate(self) -> Result<(), PipelineError> {
        match self {
            Self::Running => Ok(()),
            Self::Satin { width, spacing } => {
                if !(width.is_finite() && width > 0.0) {
                    return Err(PipelineError::InvalidConfig(format!(
                        "satin width must be positive, got {width}"
                    )));
                }
                if !(spacing.is_finite() && spacing > 0.0) {
                    return Err(PipelineError::InvalidConfig(format!(
                        "satin spacing must be positive, got {spacing}"
                    )));
                }
                Ok(())
            }
        }
    }

    /// Turn a device-space outline into the path the needle follows.
    #[must_use]
    pub fn render(self, outline: &Polyline, resample_step: f64) -> Polyline {
        match self {
            Self::Running => resample(outline, resample_step),
            Self::Satin { width, spacing } => satin_column(outline, width, spacing),
        }
    }
}

/// Zigzag across `centre`: samples every `spacing` units and offsets
/// alternate samples by `+width/2` and `-width/2` along the local normal.
///
/// The result is always open; a closed centre line still produces a
/// column whose two ends meet.
#[must_use]
pub fn satin_column(centre: &Polyline, width: f64, spacing: f64) -> Polyline {
    let samples = resample(centre, spacing).into_points();
    if samples.len() < 2 {
        return Polyline::new(samples);
    }

    let half = width / 2.0;
    let last = samples.len() - 1;
    let mut normal = (0.0, 0.0);
    let mut out = Vec::with_capacity(samples.len());

    for (i, &p) in samples.iter().enumerate() {
        let before = samples[i.saturating_sub(1)];
        let after = samples[(i + 1).min(last)];
        let (tx, ty) = (after.x - before.x, after.y - before.y);
        let length = tx.hypot(ty);
        // Doubled-back samples keep the previous normal.
        if length > f64::EPSILON {
            normal = (-ty / length, tx / length);
        }
        let side = if i % 2 == 0 { half } else { -half };
        out.push(Point::new(
            normal.0.mul_add(side, p.x),
            normal.1.mul_add(side, p.y),
        ));
    }

    Polyline::new(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(len: f64) -> Polyline {
        Polyline::new(vec![Point::new(0.0, 0.0), Point::new(len, 0.0)])
    }

    #[test]
    fn default_is_running() {
        assert_eq!(ContourStyle::default(), ContourStyle::Running);
    }

    #[test]
    fn running_just_resamples() {
        let path = ContourStyle::Running.render(&line(10.0), 5.0);
        assert_eq!(path.len(), 3);
    }

    #[test]
    fn satin_alternates_sides() {
        let column = satin_column(&line(40.0), 30.0, 10.0);
        assert_eq!(column.len(), 5);
        for (i, p) in column.points().iter().enumerate() {
            let expected = if i % 2 == 0 { 15.0 } else { -15.0 };
            assert!((p.y - expected).abs() < 1e-9, "sample {i} at {p:?}");
            assert!((p.x - 10.0 * f64::from(u32::try_from(i).unwrap_or(0))).abs() < 1e-9);
        }
    }

    #[test]
    fn satin_follows_corners() {
        let l = Polyline::new(vec![
            Point::new(0.0, 0.0),
            Point::new(20.0, 0.0),
            Point::new(20.0, 20.0),
        ]);
        let column = satin_column(&l, 4.0, 5.0);
        // The last sample sits on the vertical leg, offset horizontally.
        let end = column.points()[column.len() - 1];
        assert!((end.y - 20.0).abs() < 1e-9);
        assert!((end.x - 20.0).abs() > 1.0);
        assert!(!column.is_closed());
    }

    #[test]
    fn satin_of_a_point_is_the_point() {
        let dot = Polyline::new(vec![Point::new(3.0, 3.0)]);
        assert_eq!(satin_column(&dot, 10.0, 2.0).len(), 1);
    }

    #[test]
    fn validation() {
        assert!(ContourStyle::Running.validate().is_ok());
        assert!(
            ContourStyle::Satin {
                width: 30.0,
                spacing: 4.0
            }
            .validate()
            .is_ok()
        );
        for (width, spacing) in [(0.0, 4.0), (30.0, -1.0), (f64::NAN, 4.0)] {
            assert!(matches!(
                ContourStyle::Satin { width, spacing }.validate(),
                Err(PipelineError::InvalidConfig(_))
            ));
        }
    }
}
