//! Path ordering within one region.
//!
//! The generated order (hatch rows top to bottom, then outlines) is
//! already travel-friendly for most shapes. [`PathOrder::NearestNeighbor`]
//! instead chains paths greedily by endpoint distance, reversing a path
//! when its far end is the closer one.

use serde::{Deserialize, Serialize};

use crate::types::{Point, Polyline};

/// Ordering of paths inside a region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PathOrder {
    /// Keep the order the planners produced.
    #[default]
    Generated,
    /// Greedy nearest-endpoint chaining from the first path.
    NearestNeighbor,
}

impl PathOrder {
    /// Reorder `paths`. Empty paths are dropped in either mode.
    #[must_use = "returns the reordered paths"]
    pub fn apply(self, paths: Vec<Polyline>) -> Vec<Polyline> {
        let paths: Vec<Polyline> = paths.into_iter().filter(|p| !p.is_empty()).collect();
        match self {
            Self::Generated => paths,
            Self::NearestNeighbor => nearest_neighbor(paths),
        }
    }
}

/// Greedy chaining. Ties go to the lower index and to the unreversed
/// orientation, which keeps the result deterministic.
fn nearest_neighbor(paths: Vec<Polyline>) -> Vec<Polyline> {
    let mut remaining: Vec<Option<Polyline>> = paths.into_iter().map(Some).collect();
    let mut ordered = Vec::with_capacity(remaining.len());

    let Some(first) = remaining.first_mut().and_then(Option::take) else {
        return ordered;
    };
    let mut cursor = end_of(&first);
    ordered.push(first);

    loop {
        let mut best: Option<(usize, bool, f64)> = None;
        for (index, slot) in remaining.iter().enumerate() {
            let Some(path) = slot else { continue };
            let forward = cursor.distance_squared(start_of(path));
            let backward = cursor.distance_squared(end_of(path));
            let (reverse, gap) = if backward < forward {
                (true, backward)
            } else {
                (false, forward)
            };
            if best.is_none_or(|(_, _, b)| gap < b) {
                best = Some((index, reverse, gap));
            }
        }

        let Some((index, reverse, _)) = best else {
            break;
        };
        let Some(path) = remaining[index].take() else {
            break;
        };
        let path = if reverse { path.reversed() } else { path };
        cursor = end_of(&path);
        ordered.push(path);
    }

    ordered
}

fn start_of(path: &Polyline) -> Point {
    path.first().copied().unwrap_or(Point::new(0.0, 0.0))
}

fn end_of(path: &Polyline) -> Point {
    path.last().copied().unwrap_or(Point::new(0.0, 0.0))
}
