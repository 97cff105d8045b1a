//! stitchkit-export: Pure pattern serializers (sans-IO)
//!
//! Converts frozen stitch patterns into an SVG preview and a plain-text
//! command listing. Binary machine formats are out of scope.

pub mod listing;
pub mod svg;

pub use listing::{ListingMetadata, to_listing};
pub use svg::{SvgMetadata, SvgOptions, build_run_data, to_svg};
