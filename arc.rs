//! Arc segmentation.
//!
//! Turns a G2 (and optionally G3) arc given by I/J center offsets into a run
//! of straight G1 moves spaced evenly along the arc.

use std::io::Write;
use log::debug;
use serde::Deserialize;

use crate::error::LineError;
use crate::gcode::{Block, ToolPosition};
use crate::quick_math::{angle_of, distance_2d, normalize_sweep, segment_count};

/// Step length used when none is configured.
pub const DEFAULT_TOLERANCE: f64 = 0.05;

/// Decimal places of emitted coordinates.
pub const DEFAULT_PRECISION: usize = 3;

// Below this radius an arc has no usable geometry
const MIN_RADIUS: f64 = 1e-9;

/// Largest number of steps a single arc may be broken into.
pub const MAX_SEGMENTS: usize = 10_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Clockwise,
    CounterClockwise,
}

/// What to do with an arc whose center sits on its start point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DegenerateArcPolicy {
    /// Abort the run.
    #[default]
    Fail,
    /// Emit a single move to the arc's target.
    Point,
}

/// Handling of G3 lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CounterClockwisePolicy {
    /// Leave G3 lines untouched.
    #[default]
    PassThrough,
    /// Break G3 arcs into lines like G2 arcs.
    Expand,
}

/// Parsed arc line anchored at the position before the line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ArcCommand {
    pub start: ToolPosition,
    pub end_x: f64,
    pub end_y: f64,
    pub end_z: Option<f64>,
    pub i: f64,
    pub j: f64,
    pub direction: Direction,
}

impl ArcCommand {
    /// Reads the arc words from a block. I, J, X and Y are required.
    pub fn from_block(block: &Block, start: ToolPosition, direction: Direction) -> Result<Self, LineError> {
        let i = block.require('I')?;
        let j = block.require('J')?;
        let end_x = block.require('X')?;
        let end_y = block.require('Y')?;

        Ok(ArcCommand {
            start,
            end_x,
            end_y,
            end_z: block.get('Z'),
            i,
            j,
            direction,
        })
    }

    pub fn center(&self) -> (f64, f64) {
        (self.start.x + self.i, self.start.y + self.j)
    }

    pub fn radius(&self) -> f64 {
        (self.i * self.i + self.j * self.j).sqrt()
    }

    /// Distance from the center to the target point.
    pub fn end_radius(&self) -> f64 {
        distance_2d(self.center(), (self.end_x, self.end_y))
    }

    /// How far the target lies off the circle through the start point.
    pub fn radius_drift(&self) -> f64 {
        (self.end_radius() - self.radius()).abs()
    }

    pub fn start_angle(&self) -> f64 {
        angle_of(-self.i, -self.j)
    }

    pub fn end_angle(&self) -> f64 {
        let (cx, cy) = self.center();
        angle_of(self.end_x - cx, self.end_y - cy)
    }

    /// Angle travelled in the arc's direction, in (0, 2π].
    ///
    /// Coincident start and end points describe a full circle.
    pub fn sweep_angle(&self) -> f64 {
        let raw = match self.direction {
            Direction::Clockwise => self.start_angle() - self.end_angle(),
            Direction::CounterClockwise => self.end_angle() - self.start_angle(),
        };
        normalize_sweep(raw)
    }

    pub fn arc_length(&self) -> f64 {
        self.radius() * self.sweep_angle()
    }

    pub fn z_travel(&self) -> f64 {
        self.end_z.map_or(0.0, |z| z - self.start.z)
    }

    /// Lazily generated points from start to end, both included.
    pub fn segments(&self, tolerance: f64) -> Segments {
        let count = segment_count(self.arc_length(), tolerance);
        Segments {
            arc: *self,
            center: self.center(),
            radius: self.radius(),
            start_angle: self.start_angle(),
            end_angle: self.end_angle(),
            sweep: self.sweep_angle(),
            z_travel: self.z_travel(),
            count,
            next: 0,
        }
    }

    /// A single move straight to the target.
    pub fn target_only(&self) -> Segments {
        Segments {
            arc: *self,
            center: self.center(),
            radius: 0.0,
            start_angle: 0.0,
            end_angle: 0.0,
            sweep: 0.0,
            z_travel: self.z_travel(),
            count: 1,
            next: 1,
        }
    }
}

/// One straight move of an arc's approximation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearSegment {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl LinearSegment {
    pub fn to_gcode(&self, precision: usize) -> String {
        format!(
            "G1 X{} Y{} Z{}",
            format_axis(self.x, precision),
            format_axis(self.y, precision),
            format_axis(self.z, precision)
        )
    }
}

// Fixed decimals, without a sign on values that round to zero
fn format_axis(value: f64, precision: usize) -> String {
    let text = format!("{:.p$}", value, p = precision);
    match text.strip_prefix('-') {
        Some(unsigned) if unsigned.bytes().all(|b| b == b'0' || b == b'.') => unsigned.to_string(),
        _ => text,
    }
}

/// Iterator over the points of an arc, see [`ArcCommand::segments`].
#[derive(Debug, Clone)]
pub struct Segments {
    arc: ArcCommand,
    center: (f64, f64),
    radius: f64,
    start_angle: f64,
    end_angle: f64,
    sweep: f64,
    z_travel: f64,
    count: usize,
    next: usize,
}

impl Segments {
    /// Number of steps; the iterator yields one more point than this.
    pub fn segment_count(&self) -> usize {
        self.count
    }
}

impl Iterator for Segments {
    type Item = LinearSegment;

    fn next(&mut self) -> Option<LinearSegment> {
        if self.next > self.count {
            return None;
        }
        let k = self.next;
        self.next += 1;

        let n = self.count as f64;
        let frac = k as f64 / n;
        let z = self.arc.start.z + self.z_travel * frac;

        // Endpoints are emitted exactly as commanded
        let (x, y) = if k == 0 {
            (self.arc.start.x, self.arc.start.y)
        } else if k == self.count {
            (self.arc.end_x, self.arc.end_y)
        } else {
            let angle = match self.arc.direction {
                Direction::Clockwise => self.end_angle + self.sweep * (self.count - k) as f64 / n,
                Direction::CounterClockwise => self.start_angle + self.sweep * frac,
            };
            (
                self.center.0 + self.radius * angle.cos(),
                self.center.1 + self.radius * angle.sin(),
            )
        };

        Some(LinearSegment { x, y, z })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.count.saturating_add(1).saturating_sub(self.next);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Segments {}

/// Classifies lines and breaks arcs into straight moves.
#[derive(Debug, Clone)]
pub struct ArcSegmenter {
    tolerance: f64,
    precision: usize,
    degenerate: DegenerateArcPolicy,
    counter_clockwise: CounterClockwisePolicy,
}

impl ArcSegmenter {
    pub fn new(tolerance: f64) -> Self {
        ArcSegmenter {
            tolerance,
            precision: DEFAULT_PRECISION,
            degenerate: DegenerateArcPolicy::default(),
            counter_clockwise: CounterClockwisePolicy::default(),
        }
    }

    pub fn with_precision(mut self, precision: usize) -> Self {
        self.precision = precision;
        self
    }

    pub fn with_degenerate_policy(mut self, policy: DegenerateArcPolicy) -> Self {
        self.degenerate = policy;
        self
    }

    pub fn with_counter_clockwise(mut self, policy: CounterClockwisePolicy) -> Self {
        self.counter_clockwise = policy;
        self
    }

    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    /// Direction of the arc this block commands, if it is one we expand.
    pub fn classify(&self, block: &Block) -> Option<Direction> {
        if block.is_g(2) {
            Some(Direction::Clockwise)
        } else if block.is_g(3) && self.counter_clockwise == CounterClockwisePolicy::Expand {
            Some(Direction::CounterClockwise)
        } else {
            None
        }
    }

    /// Parses the block as an arc when it is classified as one.
    pub fn parse(&self, block: &Block, start: ToolPosition) -> Result<Option<ArcCommand>, LineError> {
        match self.classify(block) {
            Some(direction) => ArcCommand::from_block(block, start, direction).map(Some),
            None => Ok(None),
        }
    }

    /// Points approximating the arc, or the configured degenerate handling.
    pub fn expand(&self, arc: &ArcCommand) -> Result<Segments, LineError> {
        if arc.radius() < MIN_RADIUS {
            return match self.degenerate {
                DegenerateArcPolicy::Fail => Err(LineError::DegenerateArc),
                DegenerateArcPolicy::Point => {
                    debug!("Zero radius arc replaced by a single move");
                    Ok(arc.target_only())
                },
            };
        }

        let length = arc.arc_length();
        let steps = length / self.tolerance;
        if !steps.is_finite() || !arc.z_travel().is_finite() || steps > MAX_SEGMENTS as f64 {
            return Err(LineError::OversizedArc { length });
        }

        Ok(arc.segments(self.tolerance))
    }

    /// Writes the G1 lines for an arc and returns how many were written.
    pub fn write_segments<W: Write>(&self, segments: Segments, out: &mut W) -> std::io::Result<usize> {
        let mut written = 0;
        for segment in segments {
            writeln!(out, "{}", segment.to_gcode(self.precision))?;
            written += 1;
        }
        Ok(written)
    }
}

impl Default for ArcSegmenter {
    fn default() -> Self {
        Self::new(DEFAULT_TOLERANCE)
    }
}
