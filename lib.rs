//! # ArcBreaker
//!
//! Rewrites G-code programs so that circular moves (G2, optionally G3) become
//! runs of short G1 moves, for controllers and streaming firmware that do not
//! handle arcs well.
//!
//! ```no_run
//! use arcbreaker::{convert_str, Config};
//!
//! let output = convert_str(&Config::default(), "G2 X10 Y0 I5 J0\n").unwrap();
//! assert!(output.contains("G1 X10.000 Y0.000 Z0.000"));
//! ```

pub mod arc;
pub mod config;
pub mod convert;
pub mod error;
pub mod gcode;
pub mod passes;
pub mod quick_math;

pub use arc::{ArcCommand, ArcSegmenter, CounterClockwisePolicy, DegenerateArcPolicy, Direction, LinearSegment};
pub use config::{read_config, Config};
pub use convert::{convert_file, convert_str, ArcBreaker, ConversionStats};
pub use error::{Error, LineError, Result};
pub use gcode::{Block, PositionTracker, ToolPosition};
