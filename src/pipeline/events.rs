//! Pipeline output: per-line outcomes and the ordered event stream

use serde::Serialize;

use crate::diagnostics::WarningKind;
use crate::dispatch::TemperatureChannel;
use crate::layers::{ArcSegment, Segment};
use crate::machine::{AxisSet, HomeKind};
use crate::parser::CommandKind;

/// Something a host may want to react to, in input order
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Event {
    Segment(Segment),
    Arc(ArcSegment),
    /// Sent before the segment or arc that created the layer
    LayerAdded { z: f64 },
    ModeChanged { relative: bool, e_relative: bool },
    Home { axes: AxisSet, kind: HomeKind },
    /// G92 replaced the offset of these axes
    OffsetReset { axes: AxisSet },
    Temperature {
        target_c: f64,
        channel: TemperatureChannel,
        blocking: bool,
    },
    Fan { on: bool, speed: u8 },
    ToolChange { index: u8 },
    /// A command with no meaning to the interpreter
    Passthrough { kind: CommandKind, number: Option<u32> },
    Warning {
        line_number: u64,
        kind: WarningKind,
        message: String,
    },
}

/// What feeding one line produced
#[derive(Debug, Clone, PartialEq)]
pub enum LineOutcome {
    /// Blank, comment-only, or not a command
    Ignored,
    /// State changed (or not) but nothing visible happened
    StateOnly,
    Segment(Segment),
    Arc(ArcSegment),
    /// An extruding segment or arc opened this layer
    NewLayer(f64),
    Event(Event),
}

/// Receiver for pipeline events
pub trait EventSink: Send + Sync {
    fn on_event(&mut self, event: &Event);
}

impl<F> EventSink for F
where
    F: FnMut(&Event) + Send + Sync,
{
    fn on_event(&mut self, event: &Event) {
        self(event)
    }
}
