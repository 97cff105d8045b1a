//! Path resampling and segment splitting.
//!
//! [`resample`] walks a polyline by arc length and places a point every
//! `step` units, so stitches along curved and straight edges come out
//! evenly spaced. [`split_segment`] works on the integer device grid and
//! breaks one over-long move into equal sub-steps that each stay within
//! the stitch-length limit after rounding.

use crate::types::{DevicePoint, Point, Polyline};

/// Segments shorter than this are skipped while walking a path.
const MIN_SEGMENT_LENGTH: f64 = 1e-6;

/// The original endpoint is appended when the last emitted point misses
/// it by more than this.
const ENDPOINT_TOLERANCE: f64 = 1e-3;

/// Resample `polyline` to points spaced `step` apart along its length.
///
/// The first point is always kept. Interior points are interpolated on
/// the original segments, and the original last point is appended if
/// the walk stops short of it. The closed flag is preserved.
///
/// Returns the polyline unchanged when `step` is non-positive or there
/// are fewer than 2 points.
///
/// # Examples
///
/// ```
/// use stitchkit_pipeline::{Point, Polyline};
/// use stitchkit_pipeline::resample::resample;
///
/// let line = Polyline::new(vec![Point::new(0.0, 0.0), Point::new(10.0, 0.0)]);
/// let result = resample(&line, 4.0);
/// // Points at x = 0, 4, 8, then the original end at 10.
/// assert_eq!(result.len(), 4);
/// ```
#[must_use]
pub fn resample(polyline: &Polyline, step: f64) -> Polyline {
    let points = polyline.points();
    let (Some(&first), Some(&last)) = (points.first(), points.last()) else {
        return polyline.clone();
    };
    if points.len() < 2 || step <= 0.0 {
        return polyline.clone();
    }

    let mut result = vec![first];
    let mut carried = 0.0;

    for window in points.windows(2) {
        let mut from = window[0];
        let to = window[1];
        let segment_length = from.distance(to);
        if segment_length < MIN_SEGMENT_LENGTH {
            continue;
        }
        let ux = (to.x - from.x) / segment_length;
        let uy = (to.y - from.y) / segment_length;

        let mut remaining = segment_length;
        while carried + remaining >= step {
            let advance = step - carried;
            let p = Point::new(ux.mul_add(advance, from.x), uy.mul_add(advance, from.y));
            result.push(p);
            remaining -= advance;
            from = p;
            carried = 0.0;
        }
        carried += remaining;
    }

    let miss = result.last().map_or(0.0, |p| p.distance(last));
    if miss > ENDPOINT_TOLERANCE || (result.len() == 1 && miss > 0.0) {
        result.push(last);
    }

    if polyline.is_closed() {
        Polyline::closed(result)
    } else {
        Polyline::new(result)
    }
}

/// Split the move `from → to` into the fewest equal sub-steps whose
/// rounded targets are all at most `max_length` apart.
///
/// Returns the targets after `from`, ending with `to`; empty when the
/// points coincide. Sub-steps stop growing once each axis advances by
/// at most one unit, so below a limit of √2 diagonal moves come out as
/// single grid steps.
#[must_use]
pub fn split_segment(from: DevicePoint, to: DevicePoint, max_length: f64) -> Vec<DevicePoint> {
    if from == to {
        return Vec::new();
    }
    let distance = from.distance(to);
    if distance <= max_length {
        return vec![to];
    }

    let dx = f64::from(to.x) - f64::from(from.x);
    let dy = f64::from(to.y) - f64::from(from.y);
    let axis_span = dx.abs().max(dy.abs());

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let mut n = (distance / max_length).ceil() as u32;
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let n_cap = axis_span.ceil() as u32;

    loop {
        let steps = subdivide(from, to, n);
        let fits = std::iter::once(from)
            .chain(steps.iter().copied())
            .zip(steps.iter().copied())
            .all(|(a, b)| a.distance(b) <= max_length);
        if fits || n >= n_cap {
            return steps;
        }
        n += 1;
    }
}

/// `n` evenly spaced rounded targets from `from` (exclusive) to `to`
/// (inclusive).
fn subdivide(from: DevicePoint, to: DevicePoint, n: u32) -> Vec<DevicePoint> {
    let a = from.to_point();
    let b = to.to_point();
    let n_f = f64::from(n);
    let mut out: Vec<DevicePoint> = (1..n)
        .map(|i| DevicePoint::round(a.lerp(b, f64::from(i) / n_f)))
        .collect();
    out.push(to);
    out
}
