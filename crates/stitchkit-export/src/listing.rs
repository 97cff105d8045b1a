//! Plain-text stitch listing.
//!
//! One command per line, absolute device coordinates (0.1 mm, `y` up):
//!
//! ```text
//! # stitchkit
//! # Thread 0: Red #D1101E
//! # Stitches: 2  Jumps: 1  Trims: 1  Stops: 0  Color changes: 0
//! JUMP 0 0
//! STITCH 0 0
//! STITCH 40 0
//! TRIM
//! END
//! ```
//!
//! Lines beginning with `#` are metadata comments.
//!
//! This is a pure function with no I/O: it returns a `String`.

use std::fmt::Write;

use stitchkit_pipeline::{Pattern, StitchCommand};

/// Metadata to embed as `#`-prefixed comment lines at the top of the
/// listing.
#[derive(Debug, Clone, Default)]
pub struct ListingMetadata<'a> {
    /// Source image filename, emitted as `# Source: <filename>`.
    pub title: Option<&'a str>,

    /// Human-readable pipeline parameters, emitted as a `#` comment.
    pub description: Option<&'a str>,

    /// Full `PipelineConfig` JSON, emitted as `# Config: <json>`.
    pub config_json: Option<&'a str>,
}

/// Keyword for one command.
const fn keyword(command: StitchCommand) -> &'static str {
    match command {
        StitchCommand::Jump(_) => "JUMP",
        StitchCommand::Stitch(_) => "STITCH",
        StitchCommand::Trim => "TRIM",
        StitchCommand::ColorChange => "COLOR_CHANGE",
        StitchCommand::Stop => "STOP",
        StitchCommand::End => "END",
    }
}

/// Serialize a pattern into a text listing.
///
/// # Examples
///
/// ```
/// use stitchkit_pipeline::stitch::PatternBuilder;
/// use stitchkit_export::listing::{ListingMetadata, to_listing};
///
/// let listing = to_listing(&PatternBuilder::new().finish(true), &ListingMetadata::default());
/// assert!(listing.starts_with("# stitchkit\n"));
/// assert!(listing.ends_with("END\n"));
/// ```
#[must_use]
pub fn to_listing(pattern: &Pattern, metadata: &ListingMetadata<'_>) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "# stitchkit");
    if let Some(title) = metadata.title {
        for line in title.lines() {
            let _ = writeln!(out, "# Source: {line}");
        }
    }
    if let Some(description) = metadata.description {
        for line in description.lines() {
            let _ = writeln!(out, "# {line}");
        }
    }
    if let Some(config_json) = metadata.config_json {
        for line in config_json.lines() {
            let _ = writeln!(out, "# Config: {line}");
        }
    }
    for (index, thread) in pattern.threads().iter().enumerate() {
        // Keep one comment line per thread whatever the name holds.
        let name = thread.name.lines().collect::<Vec<_>>().join(" ");
        let _ = writeln!(out, "# Thread {index}: {name} {}", thread.color.to_hex());
    }
    let _ = writeln!(
        out,
        "# Stitches: {}  Jumps: {}  Trims: {}  Stops: {}  Color changes: {}",
        pattern.stitch_count(),
        pattern.jump_count(),
        pattern.trim_count(),
        pattern.stop_count(),
        pattern.color_change_count(),
    );

    for &command in pattern.commands() {
        match command.target() {
            Some(p) => {
                let _ = writeln!(out, "{} {} {}", keyword(command), p.x, p.y);
            }
            None => {
                let _ = writeln!(out, "{}", keyword(command));
            }
        }
    }

    out
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use stitchkit_pipeline::stitch::PatternBuilder;
    use stitchkit_pipeline::{DevicePoint, Rgb, ThreadSpec};

    use super::*;

    fn no_meta() -> ListingMetadata<'static> {
        ListingMetadata::default()
    }

    fn body(listing: &str) -> Vec<&str> {
        listing.lines().filter(|l| !l.starts_with('#')).collect()
    }

    fn sample() -> Pattern {
        use StitchCommand::{ColorChange, Jump, Stitch, Stop, Trim};
        let mut b = PatternBuilder::new();
        b.push_thread(ThreadSpec::new("Red", Rgb::new(0xD1, 0x10, 0x1E)));
        for c in [
            Jump(DevicePoint::new(0, 0)),
            Stitch(DevicePoint::new(0, 0)),
            Stitch(DevicePoint::new(25, -5)),
            Trim,
            Stop,
            ColorChange,
        ] {
            b.push(c);
        }
        b.push_thread(ThreadSpec::new("Navy", Rgb::new(0x1B, 0x24, 0x5C)));
        b.push(Jump(DevicePoint::new(40, 0)));
        b.push(Stitch(DevicePoint::new(40, 0)));
        b.finish(false)
    }

    #[test]
    fn empty_pattern_lists_end_only() {
        let listing = to_listing(&PatternBuilder::new().finish(true), &no_meta());
        assert!(listing.starts_with("# stitchkit\n"));
        assert_eq!(body(&listing), vec!["END"]);
    }

    #[test]
    fn every_command_gets_a_line() {
        let listing = to_listing(&sample(), &no_meta());
        assert_eq!(
            body(&listing),
            vec![
                "JUMP 0 0",
                "STITCH 0 0",
                "STITCH 25 -5",
                "TRIM",
                "STOP",
                "COLOR_CHANGE",
                "JUMP 40 0",
                "STITCH 40 0",
                "END",
            ]
        );
    }

    #[test]
    fn header_lists_threads_and_counts() {
        let listing = to_listing(&sample(), &no_meta());
        assert!(listing.contains("# Thread 0: Red #D1101E\n"));
        assert!(listing.contains("# Thread 1: Navy #1B245C\n"));
        assert!(listing.contains("# Stitches: 3  Jumps: 2  Trims: 1  Stops: 1  Color changes: 1\n"));
    }

    #[test]
    fn metadata_emitted_in_order() {
        let meta = ListingMetadata {
            title: Some("logo.png"),
            description: Some("pitch=4\nstep=8"),
            config_json: Some("{}"),
        };
        let listing = to_listing(&sample(), &meta);
        let source = listing.find("# Source: logo.png").unwrap();
        let pitch = listing.find("# pitch=4").unwrap();
        let step = listing.find("# step=8").unwrap();
        let config = listing.find("# Config: {}").unwrap();
        assert!(source < pitch && pitch < step && step < config);
    }

    #[test]
    fn multi_line_thread_name_stays_in_one_comment() {
        let mut b = PatternBuilder::new();
        b.push_thread(ThreadSpec::new("Warm\nRed", Rgb::new(0xD1, 0x10, 0x1E)));
        b.push(StitchCommand::Jump(DevicePoint::new(0, 0)));
        b.push(StitchCommand::Stitch(DevicePoint::new(0, 0)));
        let listing = to_listing(&b.finish(false), &no_meta());
        assert!(listing.contains("# Thread 0: Warm Red #D1101E\n"));
        assert_eq!(body(&listing), vec!["JUMP 0 0", "STITCH 0 0", "END"]);
    }
}
