//! G-code Toolpath
//!
//! Interprets 3D-printer G-code line by line into a machine state, an event
//! stream and a layer-indexed set of toolpath segments.
//!
//! This library provides:
//! - A tolerant line lexer and a static command table
//! - Machine state transitions (absolute/relative modes, offsets, homing, units)
//! - Trapezoidal move timing
//! - A layer index with a fading viewer cursor
//! - Configuration management and the `gcode-tp` command line

pub mod cli;
pub mod config;
pub mod diagnostics;
pub mod dispatch;
pub mod error;
pub mod kinematics;
pub mod layers;
pub mod machine;
pub mod parser;
pub mod pipeline;

// Re-exports for a compact public API
pub use config::{Config, PipelineConfig};
pub use diagnostics::{Warning, WarningKind};
pub use error::{ConfigError, PipelineError};
pub use layers::{ArcSegment, LayerIndex, LayerView, Segment};
pub use machine::{Axis, AxisSet, MachineState, Vec3, Vec4};
pub use parser::{Command, CommandKind, lex, parse_line};
pub use pipeline::{
    CancelToken, Event, EventSink, FeedOutcome, HighlightMark, LineOutcome, Pipeline,
    StateSnapshot,
};
