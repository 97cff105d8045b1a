//! Colour segmentation: split an image into stitchable colour regions.
//!
//! This module defines the [`ColorSegmenter`] trait and the
//! [`SegmenterKind`] enum for selecting a strategy at runtime, mirroring
//! the contour tracer design.
//!
//! Both strategies are deterministic: identical pixels and configuration
//! always yield the same regions in the same order.

use image::{GrayImage, Luma, RgbImage};
use serde::{Deserialize, Serialize};

use crate::types::{Dimensions, PipelineConfig, Rgb, luma};

/// Maximum number of Lloyd iterations.
const KMEANS_MAX_ITERATIONS: usize = 24;

/// Images larger than this are clustered on a fixed-stride sample; the
/// final assignment still covers every pixel.
const KMEANS_MAX_TRAINING_PIXELS: usize = 65_536;

/// Mask value for pixels inside a region.
const INSIDE: u8 = 255;

/// Selects which segmentation strategy to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SegmenterKind {
    /// K-means clustering in RGB space, then dark/backing-layer filtering.
    #[default]
    KMeans,
    /// Single region of every pixel darker than
    /// [`PipelineConfig::threshold_level`]. Suited to dark logos on a
    /// light ground; no cluster filters are applied.
    Threshold,
}

/// Trait for segmentation strategies.
pub trait ColorSegmenter {
    /// Segment `image` into regions ordered by descending area.
    fn segment(&self, image: &RgbImage, config: &PipelineConfig) -> Vec<Region>;
}

impl ColorSegmenter for SegmenterKind {
    fn segment(&self, image: &RgbImage, config: &PipelineConfig) -> Vec<Region> {
        match *self {
            Self::KMeans => segment_kmeans(image, config),
            Self::Threshold => segment_threshold(image, config.threshold_level),
        }
    }
}

/// Inclusive pixel bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelBounds {
    /// Leftmost column.
    pub min_x: u32,
    /// Topmost row.
    pub min_y: u32,
    /// Rightmost column.
    pub max_x: u32,
    /// Bottom row.
    pub max_y: u32,
}

impl PixelBounds {
    /// Width in pixels.
    #[must_use]
    pub const fn width(self) -> u32 {
        self.max_x - self.min_x + 1
    }

    /// Height in pixels.
    #[must_use]
    pub const fn height(self) -> u32 {
        self.max_y - self.min_y + 1
    }

    /// Smallest box containing both.
    #[must_use]
    pub fn union(self, other: Self) -> Self {
        Self {
            min_x: self.min_x.min(other.min_x),
            min_y: self.min_y.min(other.min_y),
            max_x: self.max_x.max(other.max_x),
            max_y: self.max_y.max(other.max_y),
        }
    }
}

/// Boolean pixel grid marking one colour cluster.
///
/// Backed by a [`GrayImage`] holding 255 for member pixels and 0
/// elsewhere, so it can be handed straight to `imageproc`.
#[derive(Debug, Clone)]
pub struct RegionMask(GrayImage);

impl RegionMask {
    /// An empty mask.
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self(GrayImage::new(width, height))
    }

    /// Build a mask from a membership predicate.
    #[must_use]
    pub fn from_fn(width: u32, height: u32, inside: impl Fn(u32, u32) -> bool) -> Self {
        Self(GrayImage::from_fn(width, height, |x, y| {
            Luma([if inside(x, y) { INSIDE } else { 0 }])
        }))
    }

    /// Mark a pixel as inside.
    pub fn insert(&mut self, x: u32, y: u32) {
        self.0.put_pixel(x, y, Luma([INSIDE]));
    }

    /// Whether `(x, y)` belongs to the region. Out-of-range is outside.
    #[must_use]
    pub fn contains(&self, x: u32, y: u32) -> bool {
        x < self.0.width() && y < self.0.height() && self.0.get_pixel(x, y).0[0] != 0
    }

    /// Mask width in pixels.
    #[must_use]
    pub fn width(&self) -> u32 {
        self.0.width()
    }

    /// Mask height in pixels.
    #[must_use]
    pub fn height(&self) -> u32 {
        self.0.height()
    }

    /// Mask dimensions.
    #[must_use]
    pub fn dimensions(&self) -> Dimensions {
        Dimensions {
            width: self.0.width(),
            height: self.0.height(),
        }
    }

    /// Number of member pixels.
    #[must_use]
    pub fn pixel_count(&self) -> u64 {
        self.0.pixels().map(|p| u64::from(p.0[0] != 0)).sum()
    }

    /// Bounding box of member pixels, `None` for an empty mask.
    #[must_use]
    pub fn bounds(&self) -> Option<PixelBounds> {
        let mut bounds: Option<PixelBounds> = None;
        for (x, y, p) in self.0.enumerate_pixels() {
            if p.0[0] == 0 {
                continue;
            }
            let here = PixelBounds {
                min_x: x,
                min_y: y,
                max_x: x,
                max_y: y,
            };
            bounds = Some(bounds.map_or(here, |b| b.union(here)));
        }
        bounds
    }

    /// The underlying grayscale raster.
    #[must_use]
    pub const fn as_gray(&self) -> &GrayImage {
        &self.0
    }
}

/// One stitchable colour region.
#[derive(Debug, Clone)]
pub struct Region {
    /// Member pixels.
    pub mask: RegionMask,
    /// Mean colour of the member pixels.
    pub color: Rgb,
    /// Number of member pixels.
    pub pixel_count: u64,
    /// `pixel_count` divided by the image pixel count.
    pub area_fraction: f64,
}

/// Union bounding box of all region masks.
#[must_use]
pub fn regions_bounds(regions: &[Region]) -> Option<PixelBounds> {
    regions
        .iter()
        .filter_map(|r| r.mask.bounds())
        .reduce(PixelBounds::union)
}

/// Running colour sum for one cluster.
#[derive(Debug, Clone, Copy, Default)]
struct ColorSum {
    r: f64,
    g: f64,
    b: f64,
    count: u64,
}

impl ColorSum {
    fn add(&mut self, c: [f64; 3]) {
        self.r += c[0];
        self.g += c[1];
        self.b += c[2];
        self.count += 1;
    }

    #[allow(clippy::cast_precision_loss)]
    fn mean(&self) -> Option<[f64; 3]> {
        (self.count > 0).then(|| {
            let n = self.count as f64;
            [self.r / n, self.g / n, self.b / n]
        })
    }
}

fn channels(p: &image::Rgb<u8>) -> [f64; 3] {
    [f64::from(p.0[0]), f64::from(p.0[1]), f64::from(p.0[2])]
}

fn distance_squared(a: [f64; 3], b: [f64; 3]) -> f64 {
    let dr = a[0] - b[0];
    let dg = a[1] - b[1];
    let db = a[2] - b[2];
    dr.mul_add(dr, dg.mul_add(dg, db * db))
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn round_channel(v: f64) -> u8 {
    v.round().clamp(0.0, 255.0) as u8
}

fn to_rgb(c: [f64; 3]) -> Rgb {
    Rgb::new(round_channel(c[0]), round_channel(c[1]), round_channel(c[2]))
}

/// Index of the nearest centre; ties go to the lowest index.
fn nearest_center(pixel: [f64; 3], centers: &[[f64; 3]]) -> usize {
    let mut best = 0;
    let mut best_dist = f64::INFINITY;
    for (i, &c) in centers.iter().enumerate() {
        let d = distance_squared(pixel, c);
        if d < best_dist {
            best_dist = d;
            best = i;
        }
    }
    best
}

/// Deterministic seeding: the median-luma pixel first, then repeatedly
/// the pixel farthest from every chosen centre.
///
/// Stops early when the remaining pixels all coincide with a centre, so
/// images with fewer than `k` distinct colours get fewer centres.
fn seed_centers(pixels: &[[f64; 3]], k: usize) -> Vec<[f64; 3]> {
    let mut by_luma: Vec<(usize, f64)> = pixels
        .iter()
        .enumerate()
        .map(|(i, p)| (i, luma(p[0], p[1], p[2])))
        .collect();
    by_luma.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
    let first = pixels[by_luma[by_luma.len() / 2].0];

    let mut centers = vec![first];
    let mut min_dist: Vec<f64> = pixels.iter().map(|&p| distance_squared(p, first)).collect();

    while centers.len() < k {
        let mut best_idx = 0;
        let mut best_dist = 0.0;
        for (i, &d) in min_dist.iter().enumerate() {
            if d > best_dist {
                best_dist = d;
                best_idx = i;
            }
        }
        if best_dist <= 0.0 {
            break;
        }
        let center = pixels[best_idx];
        for (d, &p) in min_dist.iter_mut().zip(pixels) {
            *d = d.min(distance_squared(p, center));
        }
        centers.push(center);
    }
    centers
}

/// Lloyd's algorithm on `pixels` from deterministic seeds.
fn kmeans(pixels: &[[f64; 3]], k: usize) -> Vec<[f64; 3]> {
    let mut centers = seed_centers(pixels, k);
    let mut labels: Vec<usize> = vec![usize::MAX; pixels.len()];

    for _ in 0..KMEANS_MAX_ITERATIONS {
        let mut changed = false;
        for (label, &p) in labels.iter_mut().zip(pixels) {
            let nearest = nearest_center(p, &centers);
            if *label != nearest {
                *label = nearest;
                changed = true;
            }
        }
        if !changed {
            break;
        }

        let mut sums = vec![ColorSum::default(); centers.len()];
        for (&label, &p) in labels.iter().zip(pixels) {
            sums[label].add(p);
        }
        for (center, sum) in centers.iter_mut().zip(&sums) {
            // Empty clusters keep their previous centre.
            if let Some(mean) = sum.mean() {
                *center = mean;
            }
        }
    }
    centers
}

fn segment_kmeans(image: &RgbImage, config: &PipelineConfig) -> Vec<Region> {
    let pixels: Vec<[f64; 3]> = image.pixels().map(channels).collect();
    if pixels.is_empty() {
        return Vec::new();
    }

    let stride = pixels.len().div_ceil(KMEANS_MAX_TRAINING_PIXELS).max(1);
    let training: Vec<[f64; 3]> = pixels.iter().step_by(stride).copied().collect();
    let centers = kmeans(&training, config.cluster_count);

    // One label per pixel; masks are built only for surviving clusters.
    let labels: Vec<usize> = pixels.iter().map(|&c| nearest_center(c, &centers)).collect();
    let mut sums = vec![ColorSum::default(); centers.len()];
    for (&label, &c) in labels.iter().zip(&pixels) {
        sums[label].add(c);
    }

    #[allow(clippy::cast_precision_loss)]
    let total = pixels.len() as f64;
    let mut clusters: Vec<(usize, Region)> = Vec::new();

    for (index, sum) in sums.iter().enumerate() {
        let Some(mean) = sum.mean() else {
            continue;
        };
        let brightness = luma(mean[0], mean[1], mean[2]);
        #[allow(clippy::cast_precision_loss)]
        let area_fraction = sum.count as f64 / total;

        if brightness <= config.dark_threshold {
            tracing::debug!(cluster = index, brightness, "dropping dark cluster");
            continue;
        }
        if area_fraction >= config.max_area_fraction {
            tracing::debug!(cluster = index, area_fraction, "dropping backing-layer cluster");
            continue;
        }
        clusters.push((
            index,
            Region {
                mask: label_mask(image, &labels, index),
                color: to_rgb(mean),
                pixel_count: sum.count,
                area_fraction,
            },
        ));
    }

    clusters.sort_by(|a, b| {
        b.1.pixel_count
            .cmp(&a.1.pixel_count)
            .then(a.0.cmp(&b.0))
    });

    tracing::debug!(
        centers = centers.len(),
        kept = clusters.len(),
        "k-means segmentation finished"
    );
    clusters.into_iter().map(|(_, region)| region).collect()
}

/// Mask of every pixel assigned to `label`, in row-major order.
fn label_mask(image: &RgbImage, labels: &[usize], label: usize) -> RegionMask {
    let (width, height) = image.dimensions();
    let mut mask = RegionMask::new(width, height);
    for ((x, y, _), &l) in image.enumerate_pixels().zip(labels) {
        if l == label {
            mask.insert(x, y);
        }
    }
    mask
}

fn segment_threshold(image: &RgbImage, level: u8) -> Vec<Region> {
    let (width, height) = image.dimensions();
    let mut mask = RegionMask::new(width, height);
    let mut sum = ColorSum::default();

    for (x, y, p) in image.enumerate_pixels() {
        let c = channels(p);
        if luma(c[0], c[1], c[2]) < f64::from(level) {
            mask.insert(x, y);
            sum.add(c);
        }
    }

    let Some(mean) = sum.mean() else {
        return Vec::new();
    };
    let total = Dimensions { width, height }.pixel_count();
    #[allow(clippy::cast_precision_loss)]
    let area_fraction = sum.count as f64 / total as f64;
    vec![Region {
        mask,
        color: to_rgb(mean),
        pixel_count: sum.count,
        area_fraction,
    }]
}

#[cfg(test)]
mod tests {
    use super::*;

    /// White canvas with a filled rectangle of `color`.
    fn canvas_with_rect(
        size: u32,
        x0: u32,
        y0: u32,
        side: u32,
        color: [u8; 3],
    ) -> RgbImage {
        RgbImage::from_fn(size, size, |x, y| {
            if (x0..x0 + side).contains(&x) && (y0..y0 + side).contains(&y) {
                image::Rgb(color)
            } else {
                image::Rgb([255, 255, 255])
            }
        })
    }

    #[test]
    fn default_is_kmeans() {
        assert_eq!(SegmenterKind::default(), SegmenterKind::KMeans);
    }

    #[test]
    fn background_is_dropped_by_area_cap() {
        let img = canvas_with_rect(20, 5, 5, 10, [200, 30, 30]);
        let config = PipelineConfig {
            cluster_count: 2,
            ..PipelineConfig::default()
        };
        let regions = SegmenterKind::KMeans.segment(&img, &config);
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].pixel_count, 100);
        assert_eq!(regions[0].color, Rgb::new(200, 30, 30));
        assert!((regions[0].area_fraction - 0.25).abs() < 1e-12);
    }

    #[test]
    fn dark_cluster_is_dropped() {
        let img = canvas_with_rect(20, 5, 5, 10, [0, 0, 0]);
        let config = PipelineConfig {
            cluster_count: 2,
            ..PipelineConfig::default()
        };
        let regions = SegmenterKind::KMeans.segment(&img, &config);
        assert!(regions.is_empty(), "black square and white backing both filtered");
    }

    #[test]
    fn negative_dark_threshold_keeps_black() {
        let img = canvas_with_rect(20, 5, 5, 10, [0, 0, 0]);
        let config = PipelineConfig {
            cluster_count: 2,
            dark_threshold: -1.0,
            ..PipelineConfig::default()
        };
        let regions = SegmenterKind::KMeans.segment(&img, &config);
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].color, Rgb::new(0, 0, 0));
    }

    #[test]
    fn regions_ordered_by_descending_area() {
        let img = RgbImage::from_fn(30, 30, |x, y| {
            if x < 6 && y < 6 {
                image::Rgb([60, 60, 220])
            } else if x >= 15 && y >= 15 {
                image::Rgb([220, 0, 0])
            } else {
                image::Rgb([255, 255, 255])
            }
        });
        let config = PipelineConfig {
            cluster_count: 3,
            ..PipelineConfig::default()
        };
        let regions = SegmenterKind::KMeans.segment(&img, &config);
        assert_eq!(regions.len(), 2);
        assert_eq!(regions[0].color, Rgb::new(220, 0, 0));
        assert_eq!(regions[0].pixel_count, 225);
        assert_eq!(regions[1].color, Rgb::new(60, 60, 220));
        assert_eq!(regions[1].pixel_count, 36);
    }

    #[test]
    fn fewer_distinct_colours_than_k() {
        let img = canvas_with_rect(10, 2, 2, 4, [10, 200, 10]);
        let config = PipelineConfig {
            cluster_count: 8,
            ..PipelineConfig::default()
        };
        let regions = SegmenterKind::KMeans.segment(&img, &config);
        assert_eq!(regions.len(), 1);
    }

    #[test]
    fn segmentation_is_deterministic() {
        let img = RgbImage::from_fn(24, 24, |x, y| {
            image::Rgb([
                u8::try_from((x * 10) % 256).unwrap_or(0),
                u8::try_from((y * 10) % 256).unwrap_or(0),
                128,
            ])
        });
        let config = PipelineConfig {
            cluster_count: 4,
            dark_threshold: -1.0,
            max_area_fraction: 1.0,
            ..PipelineConfig::default()
        };
        let a = SegmenterKind::KMeans.segment(&img, &config);
        let b = SegmenterKind::KMeans.segment(&img, &config);
        assert_eq!(a.len(), b.len());
        for (ra, rb) in a.iter().zip(&b) {
            assert_eq!(ra.color, rb.color);
            assert_eq!(ra.mask.as_gray().as_raw(), rb.mask.as_gray().as_raw());
        }
    }

    #[test]
    fn empty_image_yields_no_regions() {
        let img = RgbImage::new(0, 0);
        let regions = SegmenterKind::KMeans.segment(&img, &PipelineConfig::default());
        assert!(regions.is_empty());
    }

    #[test]
    fn threshold_selects_dark_pixels() {
        let img = canvas_with_rect(20, 5, 5, 10, [0, 0, 0]);
        let regions = SegmenterKind::Threshold.segment(&img, &PipelineConfig::default());
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].pixel_count, 100);
        assert!(regions[0].mask.contains(5, 5));
        assert!(!regions[0].mask.contains(4, 5));
    }

    #[test]
    fn threshold_on_blank_image_is_empty() {
        let img = RgbImage::from_pixel(8, 8, image::Rgb([255, 255, 255]));
        let regions = SegmenterKind::Threshold.segment(&img, &PipelineConfig::default());
        assert!(regions.is_empty());
    }

    #[test]
    fn mask_bounds() {
        let mask = RegionMask::from_fn(10, 10, |x, y| (2..5).contains(&x) && (3..9).contains(&y));
        let b = mask.bounds();
        assert_eq!(
            b,
            Some(PixelBounds {
                min_x: 2,
                min_y: 3,
                max_x: 4,
                max_y: 8
            })
        );
        assert_eq!(mask.pixel_count(), 18);
        assert!(RegionMask::new(4, 4).bounds().is_none());
    }

    #[test]
    fn masks_cover_exactly_their_cluster_pixels() {
        let img = RgbImage::from_fn(30, 30, |x, y| {
            if x < 6 && y < 6 {
                image::Rgb([60, 60, 220])
            } else if x >= 15 && y >= 15 {
                image::Rgb([220, 0, 0])
            } else {
                image::Rgb([255, 255, 255])
            }
        });
        let config = PipelineConfig {
            cluster_count: 64,
            ..PipelineConfig::default()
        };
        let regions = SegmenterKind::KMeans.segment(&img, &config);
        assert_eq!(regions.len(), 2);
        for region in &regions {
            assert_eq!(region.mask.pixel_count(), region.pixel_count);
        }
        for (x, y, p) in img.enumerate_pixels() {
            let owners = regions.iter().filter(|r| r.mask.contains(x, y)).count();
            let expected = usize::from(p.0 != [255, 255, 255]);
            assert_eq!(owners, expected, "pixel ({x}, {y})");
        }
    }
}
