//! Ramer-Douglas-Peucker point reduction.
//!
//! A vertex survives only if its perpendicular deviation from the chord
//! of the current simplified span exceeds `epsilon`. Closed loops are
//! handled by treating the repeated closing vertex as the chord's far
//! end, so the farthest vertex from the loop start is always retained.

use crate::types::{Point, Polyline};

/// Simplify a polyline, keeping its endpoints and closed flag.
///
/// An `epsilon` of 0.0 keeps every vertex that is not exactly collinear.
/// Polylines with fewer than 3 points are returned unchanged.
#[must_use = "returns the simplified polyline"]
pub fn simplify(polyline: &Polyline, epsilon: f64) -> Polyline {
    let kept = simplify_points(polyline.points(), epsilon);
    if polyline.is_closed() {
        Polyline::closed(kept)
    } else {
        Polyline::new(kept)
    }
}

/// Core RDP pass over a point slice.
#[must_use]
pub fn simplify_points(points: &[Point], epsilon: f64) -> Vec<Point> {
    if points.len() < 3 {
        return points.to_vec();
    }

    let last = points.len() - 1;
    let mut keep = vec![false; points.len()];
    keep[0] = true;
    keep[last] = true;

    // Iterative span stack instead of recursion: long traced contours
    // can have thousands of vertices.
    let mut spans = vec![(0, last)];
    while let Some((start, end)) = spans.pop() {
        if end <= start + 1 {
            continue;
        }
        let (index, deviation) = farthest_from_chord(points, start, end);
        if deviation > epsilon {
            keep[index] = true;
            spans.push((start, index));
            spans.push((index, end));
        }
    }

    points
        .iter()
        .zip(&keep)
        .filter_map(|(&p, &k)| k.then_some(p))
        .collect()
}

/// The interior vertex of `start..=end` farthest from the chord, with
/// its distance.
fn farthest_from_chord(points: &[Point], start: usize, end: usize) -> (usize, f64) {
    let mut best = (start, 0.0);
    for (offset, &p) in points[start + 1..end].iter().enumerate() {
        let d = perpendicular_distance(p, points[start], points[end]);
        if d > best.1 {
            best = (start + 1 + offset, d);
        }
    }
    best
}

/// Perpendicular distance from `p` to the line through `a` and `b`;
/// falls back to the distance to `a` when the chord is degenerate.
fn perpendicular_distance(p: Point, a: Point, b: Point) -> f64 {
    let dx = b.x - a.x;
    let dy = b.y - a.y;
    let length_sq = dx.mul_add(dx, dy * dy);

    if length_sq == 0.0 {
        return p.distance(a);
    }

    let cross = dx.mul_add(a.y - p.y, -(dy * (a.x - p.x)));
    cross.abs() / length_sq.sqrt()
}
