//! Stitch planning: turn resampled paths into machine commands.
//!
//! [`StitchPlanner`] is a two-state machine. While idle it waits for a
//! path; starting one emits a `Jump`, a tie-in anchor, and then stitches
//! that never exceed the configured maximum length. Leaving a path emits
//! a tie-out anchor and a `Trim`. Thread changes happen only between
//! paths, as `Stop` (per [`StopPolicy`]) plus `ColorChange`.
//!
//! Commands accumulate in a [`PatternBuilder`] owned by the planner and
//! come out as an immutable [`Pattern`] from [`StitchPlanner::finish`].

use serde::{Deserialize, Serialize};

use crate::resample::split_segment;
use crate::types::{
    ConversionWarning, DevicePoint, Pattern, PipelineConfig, PipelineError, Point, Polyline,
    StitchCommand, ThreadSpec,
};

/// Whether a `Stop` precedes each `ColorChange`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum StopPolicy {
    /// Pause the machine before every thread change.
    #[default]
    BeforeColorChange,
    /// Emit `ColorChange` alone.
    Never,
}

/// Check `max_stitch_length` and `tie_step`.
///
/// The maximum must be positive and the tie anchor non-negative. A
/// `tie_step` above half the maximum is accepted and clamped by the
/// planner.
///
/// # Errors
///
/// Returns [`PipelineError::InvalidConfig`] naming the offending value.
pub fn validate_stitch_limits(max_stitch_length: f64, tie_step: f64) -> Result<(), PipelineError> {
    if !(max_stitch_length.is_finite() && max_stitch_length > 0.0) {
        return Err(PipelineError::InvalidConfig(format!(
            "max_stitch_length must be positive, got {max_stitch_length}"
        )));
    }
    if !(tie_step.is_finite() && tie_step >= 0.0) {
        return Err(PipelineError::InvalidConfig(format!(
            "tie_step must be non-negative, got {tie_step}"
        )));
    }
    Ok(())
}

/// Append-only command buffer.
///
/// Exclusively owned by one planning run; [`finish`](Self::finish)
/// consumes it and yields the frozen [`Pattern`].
#[derive(Debug, Clone, Default)]
pub struct PatternBuilder {
    commands: Vec<StitchCommand>,
    threads: Vec<ThreadSpec>,
}

impl PatternBuilder {
    /// An empty buffer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one command. `End` is reserved for [`finish`](Self::finish)
    /// and ignored here.
    pub fn push(&mut self, command: StitchCommand) {
        if command != StitchCommand::End {
            self.commands.push(command);
        }
    }

    /// Register the thread for the next colour block.
    pub fn push_thread(&mut self, thread: ThreadSpec) {
        self.threads.push(thread);
    }

    /// Commands so far.
    #[must_use]
    pub fn commands(&self) -> &[StitchCommand] {
        &self.commands
    }

    /// Threads so far.
    #[must_use]
    pub fn threads(&self) -> &[ThreadSpec] {
        &self.threads
    }

    /// Terminate with `End` and freeze.
    ///
    /// With `center_origin`, every movement target is shifted by one
    /// integer offset so the bounding box is centred on `(0, 0)`.
    #[must_use]
    pub fn finish(mut self, center_origin: bool) -> Pattern {
        if center_origin {
            self.center();
        }
        self.commands.push(StitchCommand::End);
        Pattern::from_parts(self.commands, self.threads)
    }

    fn center(&mut self) {
        let mut targets = self.commands.iter().filter_map(|c| c.target());
        let Some(first) = targets.next() else {
            return;
        };
        let (lo, hi) = targets.fold((first, first), |(lo, hi), p| {
            (
                DevicePoint::new(lo.x.min(p.x), lo.y.min(p.y)),
                DevicePoint::new(hi.x.max(p.x), hi.y.max(p.y)),
            )
        });
        let dx = -(lo.x + hi.x).div_euclid(2);
        let dy = -(lo.y + hi.y).div_euclid(2);
        for command in &mut self.commands {
            *command = match *command {
                StitchCommand::Jump(p) => StitchCommand::Jump(p.offset(dx, dy)),
                StitchCommand::Stitch(p) => StitchCommand::Stitch(p.offset(dx, dy)),
                other => other,
            };
        }
    }
}

/// Where the needle is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PlannerState {
    Idle,
    InPath {
        /// Current needle position.
        needle: DevicePoint,
        /// Last distinct target before the needle, for the tie-out.
        previous: Option<DevicePoint>,
    },
}

/// The stitch emission state machine.
#[derive(Debug, Clone)]
pub struct StitchPlanner {
    max_stitch_length: f64,
    tie_step: f64,
    jump_threshold: f64,
    stop_policy: StopPolicy,
    builder: PatternBuilder,
    state: PlannerState,
    current_thread: Option<ThreadSpec>,
    pending_thread: Option<ThreadSpec>,
    region: usize,
    warnings: Vec<ConversionWarning>,
}

impl StitchPlanner {
    /// Planner with the limits and policies from `config`.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] if the stitch limits are
    /// unusable.
    pub fn new(config: &PipelineConfig) -> Result<Self, PipelineError> {
        validate_stitch_limits(config.max_stitch_length, config.tie_step)?;
        if config.max_stitch_length <= std::f64::consts::SQRT_2 {
            // Diagonal grid moves cannot be split below √2.
            tracing::warn!(
                max_stitch_length = config.max_stitch_length,
                "maximum stitch length is below the device grid diagonal"
            );
        }
        Ok(Self {
            max_stitch_length: config.max_stitch_length,
            tie_step: config.tie_step.min(config.max_stitch_length / 2.0),
            jump_threshold: config.jump_threshold,
            stop_policy: config.stop_policy,
            builder: PatternBuilder::new(),
            state: PlannerState::Idle,
            current_thread: None,
            pending_thread: None,
            region: 0,
            warnings: Vec::new(),
        })
    }

    /// Start a region sewn with `thread`.
    ///
    /// The thread takes effect at the region's first stitchable path, so
    /// a region whose paths are all skipped leaves no trace.
    pub fn begin_region(&mut self, region: usize, thread: ThreadSpec) {
        self.end_path();
        self.region = region;
        self.pending_thread = Some(thread);
    }

    /// Close the current region.
    pub fn end_region(&mut self) {
        self.end_path();
        self.pending_thread = None;
    }

    /// Sew one path of the current region.
    ///
    /// Paths that collapse to a single device point are skipped with a
    /// [`ConversionWarning::DegeneratePath`].
    pub fn sew(&mut self, path: &Polyline) {
        let targets = device_targets(path.points());
        let [start, rest @ ..] = targets.as_slice() else {
            self.skip_degenerate();
            return;
        };
        if rest.is_empty() {
            self.skip_degenerate();
            return;
        }

        match self.state {
            PlannerState::InPath { needle, .. }
                if self.jump_threshold > 0.0
                    && needle.distance(*start) <= self.jump_threshold =>
            {
                // Short gap inside one region: sew straight across.
                self.stitch_to(*start);
            }
            PlannerState::InPath { .. } => {
                self.end_path();
                self.start_path(*start, rest[0]);
            }
            PlannerState::Idle => {
                self.apply_pending_thread();
                self.start_path(*start, rest[0]);
            }
        }

        for &p in rest {
            self.stitch_to(p);
        }
    }

    /// Commands emitted so far.
    #[must_use]
    pub fn commands(&self) -> &[StitchCommand] {
        self.builder.commands()
    }

    /// Finish any open path and freeze the pattern.
    #[must_use]
    pub fn finish(mut self, center_origin: bool) -> (Pattern, Vec<ConversionWarning>) {
        self.end_path();
        (self.builder.finish(center_origin), self.warnings)
    }

    fn skip_degenerate(&mut self) {
        tracing::debug!(region = self.region, "skipping zero-length path");
        self.warnings.push(ConversionWarning::DegeneratePath {
            region: self.region,
        });
    }

    /// Thread bookkeeping between paths: a new colour block gets
    /// `[Stop,] ColorChange` and a thread entry; the same thread again
    /// continues the current block.
    fn apply_pending_thread(&mut self) {
        let Some(thread) = self.pending_thread.take() else {
            return;
        };
        match &self.current_thread {
            Some(current) if *current == thread => return,
            Some(_) => {
                if self.stop_policy == StopPolicy::BeforeColorChange {
                    self.builder.push(StitchCommand::Stop);
                }
                self.builder.push(StitchCommand::ColorChange);
            }
            None => {}
        }
        self.builder.push_thread(thread.clone());
        self.current_thread = Some(thread);
    }

    /// `Idle → InPath`: jump, then the tie-in anchor toward `toward`.
    fn start_path(&mut self, start: DevicePoint, toward: DevicePoint) {
        self.builder.push(StitchCommand::Jump(start));
        self.builder.push(StitchCommand::Stitch(start));
        let anchor = self.anchor(start, toward);
        if anchor != start {
            self.builder.push(StitchCommand::Stitch(anchor));
            self.builder.push(StitchCommand::Stitch(start));
        }
        self.state = PlannerState::InPath {
            needle: start,
            previous: None,
        };
    }

    /// `InPath → Idle`: tie-out back along the path, then `Trim`.
    fn end_path(&mut self) {
        let PlannerState::InPath { needle, previous } = self.state else {
            return;
        };
        if let Some(previous) = previous {
            let anchor = self.anchor(needle, previous);
            if anchor != needle {
                self.builder.push(StitchCommand::Stitch(anchor));
                self.builder.push(StitchCommand::Stitch(needle));
            }
        }
        self.builder.push(StitchCommand::Trim);
        self.state = PlannerState::Idle;
    }

    /// Stitch from the needle to `target`, splitting over-long moves.
    fn stitch_to(&mut self, target: DevicePoint) {
        let PlannerState::InPath { needle, previous } = self.state else {
            return;
        };
        if target == needle {
            return;
        }
        let steps = split_segment(needle, target, self.max_stitch_length);
        let before_last = steps
            .len()
            .checked_sub(2)
            .map_or(Some(needle), |i| steps.get(i).copied());
        for &step in &steps {
            self.builder.push(StitchCommand::Stitch(step));
        }
        self.state = PlannerState::InPath {
            needle: target,
            previous: before_last.or(previous),
        };
    }

    /// `from` moved `tie_step` units toward `toward`, on the device grid.
    ///
    /// An anchor that rounds past the stitch limit is dropped.
    fn anchor(&self, from: DevicePoint, toward: DevicePoint) -> DevicePoint {
        let distance = from.distance(toward);
        if self.tie_step <= 0.0 || distance == 0.0 {
            return from;
        }
        let t = self.tie_step / distance;
        let a = from.to_point();
        let b = toward.to_point();
        let anchor = DevicePoint::round(Point::new(
            (b.x - a.x).mul_add(t, a.x),
            (b.y - a.y).mul_add(t, a.y),
        ));
        if anchor.distance(from) > self.max_stitch_length {
            return from;
        }
        anchor
    }
}

/// Round to the device grid and drop consecutive duplicates.
fn device_targets(points: &[Point]) -> Vec<DevicePoint> {
    let mut out: Vec<DevicePoint> = Vec::with_capacity(points.len());
    for &p in points {
        let d = DevicePoint::round(p);
        if out.last() != Some(&d) {
            out.push(d);
        }
    }
    out
}
