//! stitchkit-bench: CLI tool for converting images to stitch patterns and
//! experimenting with pipeline parameters.
//!
//! Runs the embroidery pipeline on a given image file with configurable
//! parameters, printing per-stage diagnostics. Useful for:
//!
//! - Comparing segmentation strategies (`kmeans` vs `threshold`)
//! - Tuning hatch pitch, resampling step, and stitch limits
//! - Measuring per-stage durations to identify bottlenecks
//! - Checking that repeated runs produce identical command sequences
//!
//! # Usage
//!
//! ```text
//! cargo run --release --bin stitchkit-bench -- [OPTIONS] <IMAGE_PATH>
//! ```
//!
//! Log output goes to stderr; set `RUST_LOG=stitchkit_pipeline=debug`
//! for per-stage detail.

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::{Duration, Instant};

use clap::{Parser, ValueEnum};
use stitchkit_pipeline::diagnostics::{Clock, PipelineDiagnostics};
use stitchkit_pipeline::{
    ContourStyle, FillDirection, PathOrder, PipelineConfig, ProcessResult, SegmenterKind,
    StopPolicy, TargetSize,
};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

/// Embroidery pattern synthesis and diagnostics for stitchkit.
///
/// Converts an image into a stitch pattern with configurable parameters
/// and prints per-stage timing and count diagnostics. Distances are in
/// device units (0.1 mm) unless marked as pixels.
#[derive(Parser)]
#[command(name = "stitchkit-bench", version)]
#[allow(clippy::struct_excessive_bools)]
struct Cli {
    /// Path to the input image (PNG, JPEG, BMP, WebP).
    image_path: PathBuf,

    /// Colour segmentation strategy.
    #[arg(long, value_enum, default_value_t = Segmenter::Kmeans)]
    segmenter: Segmenter,

    /// Number of k-means clusters.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_CLUSTER_COUNT, value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..))]
    clusters: usize,

    /// Luma cut-off for threshold segmentation.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_THRESHOLD_LEVEL)]
    threshold_level: u8,

    /// Drop clusters at or below this mean luma (negative disables).
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_DARK_THRESHOLD, allow_hyphen_values = true)]
    dark_threshold: f64,

    /// Drop clusters covering at least this fraction of the image.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_MAX_AREA_FRACTION)]
    max_area_fraction: f64,

    /// Disable hatch fill (outlines only).
    #[arg(long)]
    no_fill: bool,

    /// Hatch row spacing in pixels.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_FILL_PITCH)]
    fill_pitch: f64,

    /// Hatch scan orientation.
    #[arg(long, value_enum, default_value_t = Direction::Horizontal)]
    fill_direction: Direction,

    /// Stitch outlines as satin columns of this width.
    #[arg(long)]
    satin_width: Option<f64>,

    /// Distance between satin needle swings.
    #[arg(long, default_value_t = 4.0)]
    satin_spacing: f64,

    /// Device units per source pixel.
    #[arg(long, default_value_t = 1.0)]
    units_per_pixel: f64,

    /// Fit the design into WIDTHxHEIGHT device units (e.g. `1000x800`).
    #[arg(long, value_parser = parse_target)]
    target: Option<TargetSize>,

    /// Arc-length resampling step.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_RESAMPLE_STEP)]
    resample_step: f64,

    /// Hard maximum stitch length.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_MAX_STITCH_LENGTH)]
    max_stitch_length: f64,

    /// Tie-in/tie-out anchor length (0 disables).
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_TIE_STEP)]
    tie_step: f64,

    /// Sew through gaps up to this length instead of trimming.
    #[arg(long, default_value_t = 0.0)]
    jump_threshold: f64,

    /// RDP simplification tolerance in pixels.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_SIMPLIFY_EPSILON)]
    simplify_epsilon: f64,

    /// Discard traced contours with fewer points.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_MIN_POLYGON_VERTICES)]
    min_polygon_vertices: usize,

    /// Path ordering inside each region.
    #[arg(long, value_enum, default_value_t = Order::Generated)]
    path_order: Order,

    /// Do not emit a Stop before each colour change.
    #[arg(long)]
    no_stops: bool,

    /// Keep device coordinates instead of centring on the origin.
    #[arg(long)]
    no_center: bool,

    /// Write an SVG preview to file.
    #[arg(long)]
    svg: Option<PathBuf>,

    /// Draw jumps as dashed lines in the SVG preview.
    #[arg(long)]
    show_jumps: bool,

    /// Write the serialized pattern as JSON to file.
    #[arg(long)]
    pattern_json: Option<PathBuf>,

    /// Write a plain-text command listing to file.
    #[arg(long)]
    listing: Option<PathBuf>,

    /// Number of runs for averaging and determinism checking.
    #[arg(long, default_value_t = 1, value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..))]
    runs: usize,

    /// Output diagnostics as JSON instead of human-readable report.
    #[arg(long)]
    json: bool,

    /// Full pipeline config as a JSON string.
    ///
    /// When provided, all other pipeline parameter flags are ignored.
    /// Missing fields take their defaults.
    #[arg(long)]
    config_json: Option<String>,
}

/// Segmentation strategy selection.
#[derive(Clone, Copy, ValueEnum)]
enum Segmenter {
    /// K-means colour clustering.
    Kmeans,
    /// Single region of dark pixels.
    Threshold,
}

/// Hatch orientation selection.
#[derive(Clone, Copy, ValueEnum)]
enum Direction {
    /// Rows.
    Horizontal,
    /// Columns.
    Vertical,
}

/// Path ordering selection.
#[derive(Clone, Copy, ValueEnum)]
enum Order {
    /// Planner order.
    Generated,
    /// Greedy nearest-endpoint chaining.
    Nearest,
}

fn parse_target(s: &str) -> Result<TargetSize, String> {
    let (w, h) = s
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got {s:?}"))?;
    let width = w.trim().parse().map_err(|e| format!("bad width {w:?}: {e}"))?;
    let height = h.trim().parse().map_err(|e| format!("bad height {h:?}: {e}"))?;
    Ok(TargetSize { width, height })
}

/// Build a [`PipelineConfig`] from CLI arguments.
///
/// If `--config-json` is provided, the JSON is parsed directly and all
/// individual parameter flags are ignored. Either way the result is
/// validated.
fn config_from_cli(cli: &Cli) -> Result<PipelineConfig, String> {
    let config = if let Some(ref json) = cli.config_json {
        serde_json::from_str(json).map_err(|e| format!("Error parsing --config-json: {e}"))?
    } else {
        PipelineConfig {
            segmenter: match cli.segmenter {
                Segmenter::Kmeans => SegmenterKind::KMeans,
                Segmenter::Threshold => SegmenterKind::Threshold,
            },
            cluster_count: cli.clusters,
            threshold_level: cli.threshold_level,
            dark_threshold: cli.dark_threshold,
            max_area_fraction: cli.max_area_fraction,
            fill_enabled: !cli.no_fill,
            fill_pitch: cli.fill_pitch,
            fill_direction: match cli.fill_direction {
                Direction::Horizontal => FillDirection::Horizontal,
                Direction::Vertical => FillDirection::Vertical,
            },
            contour_style: cli
                .satin_width
                .map_or(ContourStyle::Running, |width| ContourStyle::Satin {
                    width,
                    spacing: cli.satin_spacing,
                }),
            units_per_pixel: cli.units_per_pixel,
            target_size: cli.target,
            resample_step: cli.resample_step,
            max_stitch_length: cli.max_stitch_length,
            tie_step: cli.tie_step,
            jump_threshold: cli.jump_threshold,
            simplify_epsilon: cli.simplify_epsilon,
            min_polygon_vertices: cli.min_polygon_vertices,
            path_order: match cli.path_order {
                Order::Generated => PathOrder::Generated,
                Order::Nearest => PathOrder::NearestNeighbor,
            },
            stop_policy: if cli.no_stops {
                StopPolicy::Never
            } else {
                StopPolicy::BeforeColorChange
            },
            center_origin: !cli.no_center,
            ..PipelineConfig::default()
        }
    };
    config.validate().map_err(|e| e.to_string())?;
    Ok(config)
}

fn init_logging() {
    let filter = EnvFilter::builder()
        .with_default_directive(tracing::Level::INFO.into())
        .from_env_lossy();
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging();

    let config = match config_from_cli(&cli) {
        Ok(c) => c,
        Err(msg) => {
            eprintln!("{msg}");
            return ExitCode::FAILURE;
        }
    };

    let image_bytes = match std::fs::read(&cli.image_path) {
        Ok(bytes) => bytes,
        Err(e) => {
            eprintln!("Error reading {}: {e}", cli.image_path.display());
            return ExitCode::FAILURE;
        }
    };

    eprintln!(
        "Image: {} ({} bytes)",
        cli.image_path.display(),
        image_bytes.len(),
    );
    eprintln!("Config: {config:#?}");
    eprintln!("Runs: {}", cli.runs);
    eprintln!();

    let mut all_diagnostics = Vec::with_capacity(cli.runs);
    let mut first: Option<ProcessResult> = None;

    for run in 0..cli.runs {
        if cli.runs > 1 {
            eprintln!("--- Run {}/{} ---", run + 1, cli.runs);
        }

        match stitchkit_pipeline::process_with_diagnostics(&image_bytes, &config, &StdClock) {
            Ok((result, diagnostics)) => {
                if cli.json {
                    match serde_json::to_string_pretty(&diagnostics) {
                        Ok(json) => println!("{json}"),
                        Err(e) => {
                            eprintln!("Error serializing diagnostics: {e}");
                            return ExitCode::FAILURE;
                        }
                    }
                } else {
                    println!("{}", diagnostics.report());
                }

                match first {
                    None => {
                        for warning in &result.warnings {
                            eprintln!("warning: {warning}");
                        }
                        if let Err(msg) = write_outputs(&cli, &config, &result) {
                            eprintln!("{msg}");
                            return ExitCode::FAILURE;
                        }
                        first = Some(result);
                    }
                    Some(ref baseline) => {
                        if baseline.pattern.commands() != result.pattern.commands() {
                            eprintln!(
                                "Determinism violation: run {} produced a different command sequence",
                                run + 1,
                            );
                            return ExitCode::FAILURE;
                        }
                    }
                }

                all_diagnostics.push(diagnostics);
            }
            Err(e) => {
                eprintln!("Pipeline error: {e}");
                return ExitCode::FAILURE;
            }
        }

        if cli.runs > 1 {
            eprintln!();
        }
    }

    if cli.runs > 1 {
        print_multi_run_summary(&all_diagnostics);
    }

    ExitCode::SUCCESS
}

/// Write every requested output file from the first run's result.
fn write_outputs(cli: &Cli, config: &PipelineConfig, result: &ProcessResult) -> Result<(), String> {
    let title = cli
        .image_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("bench");
    let config_json = serde_json::to_string(config)
        .map_err(|e| format!("Error serializing config: {e}"))?;
    let desc = format!(
        "{} stitches, {} threads, {} warnings",
        result.pattern.stitch_count(),
        result.pattern.threads().len(),
        result.warnings.len(),
    );

    if let Some(ref path) = cli.svg {
        let metadata = stitchkit_export::SvgMetadata {
            title: Some(title),
            description: Some(&desc),
            config_json: Some(&config_json),
        };
        let options = stitchkit_export::SvgOptions {
            show_jumps: cli.show_jumps,
            ..stitchkit_export::SvgOptions::default()
        };
        write_file("SVG", path, &stitchkit_export::to_svg(&result.pattern, &metadata, &options))?;
    }

    if let Some(ref path) = cli.pattern_json {
        let json = serde_json::to_string_pretty(&result.pattern)
            .map_err(|e| format!("Error serializing pattern: {e}"))?;
        write_file("Pattern JSON", path, &json)?;
    }

    if let Some(ref path) = cli.listing {
        let metadata = stitchkit_export::ListingMetadata {
            title: Some(title),
            description: Some(&desc),
            config_json: Some(&config_json),
        };
        write_file("Listing", path, &stitchkit_export::to_listing(&result.pattern, &metadata))?;
    }

    Ok(())
}

fn write_file(kind: &str, path: &Path, contents: &str) -> Result<(), String> {
    std::fs::write(path, contents)
        .map_err(|e| format!("Error writing {kind} to {}: {e}", path.display()))?;
    eprintln!(
        "{kind} written to {} ({} bytes)",
        path.display(),
        contents.len(),
    );
    Ok(())
}

/// [`Clock`] implementation backed by [`std::time::Instant`].
struct StdClock;

impl Clock for StdClock {
    type Instant = Instant;

    fn now(&self) -> Instant {
        Instant::now()
    }

    fn elapsed(&self, since: &Instant) -> Duration {
        since.elapsed()
    }
}

/// Print aggregated statistics across multiple runs.
#[allow(clippy::cast_precision_loss)]
fn print_multi_run_summary(all_diagnostics: &[PipelineDiagnostics]) {
    println!();
    println!(
        "Summary ({} runs)\n{}",
        all_diagnostics.len(),
        "=".repeat(60),
    );

    if all_diagnostics.is_empty() {
        println!("Warning: no diagnostics to summarize");
        return;
    }

    let durations: Vec<f64> = all_diagnostics
        .iter()
        .map(|d| d.total_duration.as_secs_f64() * 1000.0)
        .collect();

    let min = durations.iter().copied().reduce(f64::min).unwrap_or(0.0);
    let max = durations.iter().copied().reduce(f64::max).unwrap_or(0.0);
    let mean = durations.iter().sum::<f64>() / durations.len() as f64;

    println!("Total duration: min={min:.3}ms  mean={mean:.3}ms  max={max:.3}ms");
    println!("Command sequences identical across all runs.");

    println!();
    println!("{:<24} {:>12}", "Stage", "Mean (ms)");
    println!("{}", "-".repeat(40));

    // Stage lists match across runs of one config; use the first as the key.
    let names: Vec<&str> = all_diagnostics[0]
        .stages()
        .into_iter()
        .map(|(name, _)| name)
        .collect();

    for name in names {
        let stage_durations: Vec<f64> = all_diagnostics
            .iter()
            .filter_map(|d| {
                d.stages()
                    .into_iter()
                    .find(|(n, _)| *n == name)
                    .map(|(_, s)| s.duration.as_secs_f64() * 1000.0)
            })
            .collect();

        if stage_durations.is_empty() {
            continue;
        }

        let stage_mean = stage_durations.iter().sum::<f64>() / stage_durations.len() as f64;
        println!("{name:<24} {stage_mean:>10.3}ms");
    }
}
