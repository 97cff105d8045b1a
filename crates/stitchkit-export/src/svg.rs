//! SVG stitch preview.
//!
//! Renders a frozen [`Pattern`] with the [`svg`] crate. Each connected
//! run of `Stitch` commands becomes one `<path>` stroked in its thread
//! colour; the line breaks at every `Jump`, `Trim`, `Stop`, and
//! `ColorChange`, the same places a machine lifts or cuts the thread.
//!
//! Device coordinates grow upward, so the preview flips the vertical
//! axis. The document is sized in millimetres (10 device units per mm)
//! with a small margin around the design.
//!
//! This is a pure function with no I/O: it returns a `String`.

use svg::Document;
use svg::node::element::path::Data;
use svg::node::element::{Description, Element, Group, Path, Title};
use svg::node::{Node, Text, Value};

use stitchkit_pipeline::{DevicePoint, Pattern, StitchCommand};

/// Device units per millimetre.
const UNITS_PER_MM: f64 = 10.0;

/// Stroke for threads missing from the pattern's thread list.
const FALLBACK_STROKE: &str = "#000000";

/// Stroke for travel lines.
const JUMP_STROKE: &str = "#9E9E9E";

/// Metadata to embed in the SVG document.
///
/// When present, a `<title>` and/or `<desc>` element is emitted right
/// after the opening `<svg>` tag. Text is XML-escaped by the `svg`
/// crate.
#[derive(Debug, Clone, Default)]
pub struct SvgMetadata<'a> {
    /// Document title, typically the source image filename.
    pub title: Option<&'a str>,

    /// Free-form description, typically the pipeline parameters.
    pub description: Option<&'a str>,

    /// Serialized `PipelineConfig`, embedded inside `<metadata>` so a
    /// preview carries the settings that produced it.
    pub config_json: Option<&'a str>,
}

/// Rendering switches.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SvgOptions {
    /// Draw needle-up travel as dashed grey lines.
    pub show_jumps: bool,
    /// Stroke width in device units.
    pub stroke_width: f64,
    /// Blank border around the design in device units.
    pub margin: i32,
}

impl Default for SvgOptions {
    fn default() -> Self {
        Self {
            show_jumps: false,
            stroke_width: 3.0,
            margin: 20,
        }
    }
}

/// Maps device points into the document's y-down coordinate space.
#[derive(Debug, Clone, Copy)]
struct Frame {
    left: i32,
    top: i32,
    width: i32,
    height: i32,
}

impl Frame {
    fn new(pattern: &Pattern, margin: i32) -> Self {
        let (lo, hi) = pattern
            .bounds()
            .unwrap_or((DevicePoint::default(), DevicePoint::default()));
        Self {
            left: lo.x - margin,
            top: hi.y + margin,
            width: hi.x - lo.x + 2 * margin,
            height: hi.y - lo.y + 2 * margin,
        }
    }

    fn map(self, p: DevicePoint) -> (f64, f64) {
        (f64::from(p.x - self.left), f64::from(self.top - p.y))
    }
}

/// Build an SVG path `d` attribute for consecutive needle positions.
///
/// Returns an empty string for fewer than 2 points.
///
/// # Examples
///
/// ```
/// use stitchkit_pipeline::DevicePoint;
/// use stitchkit_export::build_run_data;
///
/// let d = build_run_data(
///     &[DevicePoint::new(0, 0), DevicePoint::new(10, 5)],
///     |p| (f64::from(p.x), f64::from(-p.y)),
/// );
/// assert_eq!(d, "M0,0 L10,-5");
/// ```
#[must_use]
pub fn build_run_data(points: &[DevicePoint], map: impl Fn(DevicePoint) -> (f64, f64)) -> String {
    let Some((first, rest)) = points.split_first() else {
        return String::new();
    };
    if rest.is_empty() {
        return String::new();
    }

    let mut data = Data::new().move_to(map(*first));
    for &p in rest {
        data = data.line_to(map(p));
    }
    String::from(Value::from(data))
}

/// Travel moves as `(from, to)` pairs: each `Jump` paired with the
/// needle position it left.
fn jump_moves(pattern: &Pattern) -> Vec<(DevicePoint, DevicePoint)> {
    let mut needle: Option<DevicePoint> = None;
    let mut moves = Vec::new();
    for command in pattern.commands() {
        match *command {
            StitchCommand::Jump(to) => {
                if let Some(from) = needle
                    && from != to
                {
                    moves.push((from, to));
                }
                needle = Some(to);
            }
            StitchCommand::Stitch(p) => needle = Some(p),
            StitchCommand::Trim
            | StitchCommand::Stop
            | StitchCommand::ColorChange
            | StitchCommand::End => {}
        }
    }
    moves
}

/// Serialize a pattern into an SVG preview document.
///
/// Runs with a single stitch are skipped since they draw nothing. An
/// empty pattern yields a valid, empty document.
///
/// # Examples
///
/// ```
/// use stitchkit_pipeline::{DevicePoint, Rgb, StitchCommand, ThreadSpec};
/// use stitchkit_pipeline::stitch::PatternBuilder;
/// use stitchkit_export::{SvgMetadata, SvgOptions, to_svg};
///
/// let mut builder = PatternBuilder::new();
/// builder.push_thread(ThreadSpec::new("Red", Rgb::new(0xD1, 0x10, 0x1E)));
/// builder.push(StitchCommand::Jump(DevicePoint::new(0, 0)));
/// builder.push(StitchCommand::Stitch(DevicePoint::new(0, 0)));
/// builder.push(StitchCommand::Stitch(DevicePoint::new(40, 0)));
/// let pattern = builder.finish(false);
///
/// let metadata = SvgMetadata {
///     title: Some("logo"),
///     ..SvgMetadata::default()
/// };
/// let svg = to_svg(&pattern, &metadata, &SvgOptions::default());
/// assert!(svg.contains("<title>logo</title>"));
/// assert!(svg.contains(r##"stroke="#D1101E""##));
/// ```
#[must_use]
pub fn to_svg(pattern: &Pattern, metadata: &SvgMetadata<'_>, options: &SvgOptions) -> String {
    let frame = Frame::new(pattern, options.margin);
    let map = |p: DevicePoint| frame.map(p);

    let mut doc = Document::new()
        .set(
            "width",
            format!("{}mm", f64::from(frame.width) / UNITS_PER_MM),
        )
        .set(
            "height",
            format!("{}mm", f64::from(frame.height) / UNITS_PER_MM),
        )
        .set("viewBox", format!("0 0 {} {}", frame.width, frame.height));

    if let Some(title) = metadata.title {
        doc = doc.add(Title::new(title));
    }
    if let Some(description) = metadata.description {
        doc = doc.add(Description::new().add(Text::new(description)));
    }
    if let Some(config_json) = metadata.config_json {
        let mut pipeline_el = Element::new("stitchkit:pipeline");
        pipeline_el.assign("xmlns:stitchkit", "https://stitchkit.dev/ns/1");
        pipeline_el.append(Text::new(config_json));
        let mut metadata_el = Element::new("metadata");
        metadata_el.append(pipeline_el);
        doc = doc.add(metadata_el);
    }

    let threads = pattern.threads();
    let mut block: Option<(usize, Group)> = None;
    for run in pattern.stitch_runs() {
        let d = build_run_data(&run.points, map);
        if d.is_empty() {
            continue;
        }
        if block.as_ref().is_some_and(|(index, _)| *index != run.thread_index)
            && let Some((_, group)) = block.take()
        {
            doc = doc.add(group);
        }
        let (_, group) = block.get_or_insert_with(|| {
            let stroke = threads
                .get(run.thread_index)
                .map_or_else(|| FALLBACK_STROKE.to_string(), |t| t.color.to_hex());
            let mut group = Group::new()
                .set("id", format!("thread-{}", run.thread_index))
                .set("fill", "none")
                .set("stroke", stroke)
                .set("stroke-width", options.stroke_width)
                .set("stroke-linejoin", "round");
            if let Some(thread) = threads.get(run.thread_index) {
                group = group.set("data-thread", thread.name.as_str());
            }
            (run.thread_index, group)
        });
        group.append(Path::new().set("d", d));
    }
    if let Some((_, group)) = block {
        doc = doc.add(group);
    }

    if options.show_jumps {
        let moves = jump_moves(pattern);
        if !moves.is_empty() {
            let mut group = Group::new()
                .set("id", "jumps")
                .set("fill", "none")
                .set("stroke", JUMP_STROKE)
                .set("stroke-width", options.stroke_width / 2.0)
                .set("stroke-dasharray", "6 4");
            for (from, to) in moves {
                group.append(Path::new().set("d", build_run_data(&[from, to], map)));
            }
            doc = doc.add(group);
        }
    }

    // The svg crate omits the XML declaration, so we prepend it.
    format!("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n{doc}\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use stitchkit_pipeline::stitch::PatternBuilder;
    use stitchkit_pipeline::{Rgb, ThreadSpec};

    fn p(x: i32, y: i32) -> DevicePoint {
        DevicePoint::new(x, y)
    }

    fn no_meta() -> SvgMetadata<'static> {
        SvgMetadata::default()
    }

    /// Two colour blocks: a red L-shape, then a blue line after a change.
    fn two_block_pattern() -> Pattern {
        use StitchCommand::{ColorChange, Jump, Stitch, Stop, Trim};
        let mut b = PatternBuilder::new();
        b.push_thread(ThreadSpec::new("Red", Rgb::new(0xD1, 0x10, 0x1E)));
        for c in [
            Jump(p(0, 0)),
            Stitch(p(0, 0)),
            Stitch(p(30, 0)),
            Stitch(p(30, 30)),
            Trim,
            Stop,
            ColorChange,
        ] {
            b.push(c);
        }
        b.push_thread(ThreadSpec::new("Royal Blue", Rgb::new(0x1F, 0x4E, 0xB4)));
        for c in [Jump(p(60, 0)), Stitch(p(60, 0)), Stitch(p(60, 40)), Trim] {
            b.push(c);
        }
        b.finish(false)
    }

    // --- build_run_data ---

    #[test]
    fn run_data_needs_two_points() {
        let id = |q: DevicePoint| (f64::from(q.x), f64::from(q.y));
        assert_eq!(build_run_data(&[], id), "");
        assert_eq!(build_run_data(&[p(1, 1)], id), "");
        assert_eq!(build_run_data(&[p(1, 2), p(3, 4), p(5, 6)], id), "M1,2 L3,4 L5,6");
    }

    // --- document structure ---

    #[test]
    fn empty_pattern_is_valid_document() {
        let pattern = PatternBuilder::new().finish(true);
        let svg = to_svg(&pattern, &no_meta(), &SvgOptions::default());
        assert!(svg.starts_with(r#"<?xml version="1.0" encoding="UTF-8"?>"#));
        assert!(svg.contains(r#"viewBox="0 0 40 40""#));
        assert!(!svg.contains("<path"));
    }

    #[test]
    fn document_is_sized_in_millimetres() {
        let svg = to_svg(&two_block_pattern(), &no_meta(), &SvgOptions::default());
        // 60 x 40 units plus a 20-unit margin on each side.
        assert!(svg.contains(r#"width="10mm""#), "{svg}");
        assert!(svg.contains(r#"height="8mm""#), "{svg}");
        assert!(svg.contains(r#"viewBox="0 0 100 80""#), "{svg}");
    }

    #[test]
    fn y_axis_is_flipped() {
        let options = SvgOptions {
            margin: 0,
            ..SvgOptions::default()
        };
        let svg = to_svg(&two_block_pattern(), &no_meta(), &options);
        // Device (30, 30) is the top of a 40-unit-tall design: y = 10.
        assert!(svg.contains("M0,40 L30,40 L30,10"), "{svg}");
        assert!(svg.contains("M60,40 L60,0"), "{svg}");
    }

    #[test]
    fn each_block_uses_its_thread_colour() {
        let svg = to_svg(&two_block_pattern(), &no_meta(), &SvgOptions::default());
        assert!(svg.contains(r##"stroke="#D1101E""##));
        assert!(svg.contains(r##"stroke="#1F4EB4""##));
        assert!(svg.contains(r#"id="thread-0""#));
        assert!(svg.contains(r#"id="thread-1""#));
        assert!(svg.contains(r#"data-thread="Royal Blue""#));
        assert_eq!(svg.matches("<path").count(), 2);
    }

    #[test]
    fn lines_break_at_trim_and_jump() {
        use StitchCommand::{Jump, Stitch, Trim};
        let mut b = PatternBuilder::new();
        b.push_thread(ThreadSpec::new("Black", Rgb::new(0, 0, 0)));
        for c in [
            Jump(p(0, 0)),
            Stitch(p(0, 0)),
            Stitch(p(10, 0)),
            Trim,
            Jump(p(50, 0)),
            Stitch(p(50, 0)),
            Stitch(p(60, 0)),
        ] {
            b.push(c);
        }
        let svg = to_svg(&b.finish(false), &no_meta(), &SvgOptions::default());
        assert_eq!(svg.matches("<path").count(), 2);
        assert!(!svg.contains("stroke-dasharray"));
    }

    #[test]
    fn jumps_are_dashed_when_enabled() {
        let options = SvgOptions {
            show_jumps: true,
            margin: 0,
            ..SvgOptions::default()
        };
        let svg = to_svg(&two_block_pattern(), &no_meta(), &options);
        assert!(svg.contains(r#"id="jumps""#));
        assert!(svg.contains("stroke-dasharray"));
        // Travel from (30, 30) to (60, 0).
        assert!(svg.contains("M30,10 L60,40"), "{svg}");
    }

    #[test]
    fn jump_moves_skip_the_first_jump() {
        let moves = jump_moves(&two_block_pattern());
        assert_eq!(moves, vec![(p(30, 30), p(60, 0))]);
    }

    #[test]
    fn single_stitch_runs_are_skipped() {
        use StitchCommand::{Jump, Stitch};
        let mut b = PatternBuilder::new();
        b.push_thread(ThreadSpec::new("Black", Rgb::new(0, 0, 0)));
        b.push(Jump(p(5, 5)));
        b.push(Stitch(p(5, 5)));
        let svg = to_svg(&b.finish(false), &no_meta(), &SvgOptions::default());
        assert!(!svg.contains("<path"));
    }

    // --- metadata ---

    #[test]
    fn metadata_is_embedded_and_escaped() {
        let metadata = SvgMetadata {
            title: Some("a<b"),
            description: Some("pitch=4 & step=8"),
            config_json: Some(r#"{"cluster_count":3}"#),
        };
        let svg = to_svg(&two_block_pattern(), &metadata, &SvgOptions::default());
        assert!(svg.contains("<title>a&lt;b</title>"));
        assert!(svg.contains("<desc>pitch=4 &amp; step=8</desc>"));
        assert!(svg.contains("<metadata>"));
        assert!(svg.contains("stitchkit:pipeline"));
        assert!(svg.contains("cluster_count"));
    }

    #[test]
    fn no_metadata_no_title() {
        let svg = to_svg(&two_block_pattern(), &no_meta(), &SvgOptions::default());
        assert!(!svg.contains("<title>"));
        assert!(!svg.contains("<desc>"));
        assert!(!svg.contains("<metadata>"));
    }
}
