//! Interpreter Pipeline
//!
//! Feeds lines through lexer, command table and machine state, then times
//! the resulting moves and indexes them by layer. Never aborts on bad input:
//! problems become warnings in a bounded log.

pub mod events;
pub mod highlight;
pub mod snapshot;

use std::fmt;
use std::io::BufRead;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::config::PipelineConfig;
use crate::diagnostics::{Issue, Warning, WarningKind, WarningLog};
use crate::dispatch::{Action, classify};
use crate::error::{ConfigError, PipelineError};
use crate::kinematics::{TimingModel, travel_distance};
use crate::layers::{ArcSegment, LayerIndex, LayerInsert, Segment};
use crate::machine::{MachineState, Motion, Transition};
use crate::parser::{Command, CommandKind, Lexed, parse_line};

pub use events::{Event, EventSink, LineOutcome};
pub use highlight::{Highlight, HighlightMark};
pub use snapshot::{Bounds, StateSnapshot};

/// Shared flag a host sets to stop [`Pipeline::feed_all`] between lines
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// How [`Pipeline::feed_all`] stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedOutcome {
    /// Input ran out after this many lines
    Completed { lines: u64 },
    /// The token was cancelled after this many lines; state is valid
    Cancelled { lines: u64 },
}

impl FeedOutcome {
    pub fn lines(&self) -> u64 {
        match self {
            Self::Completed { lines } | Self::Cancelled { lines } => *lines,
        }
    }
}

pub struct Pipeline {
    config: PipelineConfig,
    state: MachineState,
    layers: LayerIndex,
    highlight: Highlight,
    timing: TimingModel,
    warnings: WarningLog,
    sink: Option<Box<dyn EventSink>>,
    line_number: u64,
    emax: f64,
    total_duration: f64,
    /// Feedrate the next move starts from
    initial_feedrate: f64,
    /// Net E travelled across resets
    extruded: f64,
    filament_length: f64,
    bounds: Option<Bounds>,
    arc_notice_logged: bool,
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("config", &self.config)
            .field("state", &self.state)
            .field("layers", &self.layers.len())
            .field("highlights", &self.highlight.marks().len())
            .field("warnings", &self.warnings.total())
            .field("line_number", &self.line_number)
            .field("has_sink", &self.sink.is_some())
            .finish()
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::build(PipelineConfig::default())
    }
}

impl Pipeline {
    /// Create a pipeline; fails only for out-of-range configuration
    pub fn new(config: PipelineConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        log::debug!("Creating pipeline with {:?}", config);
        Ok(Self::build(config))
    }

    fn build(config: PipelineConfig) -> Self {
        Self {
            state: MachineState::new(&config),
            layers: LayerIndex::new(config.fade_window, config.layer_tolerance),
            highlight: Highlight::new(MachineState::new(&config)),
            timing: TimingModel::new(config.acceleration, config.move_overhead),
            warnings: WarningLog::new(config.warning_capacity),
            sink: None,
            line_number: 0,
            emax: 0.0,
            total_duration: 0.0,
            initial_feedrate: 0.0,
            extruded: 0.0,
            filament_length: 0.0,
            bounds: None,
            arc_notice_logged: false,
            config,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Receive every event from now on, replacing any previous sink
    pub fn set_event_sink(&mut self, sink: impl EventSink + 'static) {
        self.sink = Some(Box::new(sink));
    }

    pub fn clear_event_sink(&mut self) {
        self.sink = None;
    }

    /// Back to a freshly constructed state; the event sink is kept
    pub fn reset(&mut self) {
        log::debug!("Resetting pipeline after {} lines", self.line_number);
        let sink = self.sink.take();
        *self = Self::build(self.config.clone());
        self.sink = sink;
    }

    /// Interpret one line
    pub fn feed_line(&mut self, line: &str) -> LineOutcome {
        self.line_number += 1;

        let Lexed { command, issues } = parse_line(line);
        for issue in issues {
            self.record(issue);
        }

        let outcome = match command {
            Some(command) => self.execute(&command),
            None => LineOutcome::Ignored,
        };

        self.emax = self.emax.max(self.state.pos.e);
        outcome
    }

    /// Interpret lines in order, returning how many were fed
    pub fn feed_lines<I, S>(&mut self, lines: I) -> u64
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut count = 0;
        for line in lines {
            self.feed_line(line.as_ref());
            count += 1;
        }
        count
    }

    /// Drain a reader line by line, checking `cancel` before each line
    ///
    /// Bytes that are not UTF-8 are replaced, never rejected.
    pub fn feed_all<R: BufRead>(
        &mut self,
        mut reader: R,
        cancel: &CancelToken,
    ) -> Result<FeedOutcome, PipelineError> {
        let mut buf = Vec::new();
        let mut lines = 0;

        loop {
            if cancel.is_cancelled() {
                log::info!("Feeding cancelled after {} lines", lines);
                return Ok(FeedOutcome::Cancelled { lines });
            }

            buf.clear();
            if reader.read_until(b'\n', &mut buf)? == 0 {
                return Ok(FeedOutcome::Completed { lines });
            }

            let line = String::from_utf8_lossy(&buf);
            self.feed_line(&line);
            lines += 1;
        }
    }

    pub fn snapshot(&self) -> StateSnapshot {
        let state = &self.state;
        StateSnapshot {
            pos: state.pos,
            last: state.last,
            offset: state.offset,
            feedrate: state.feedrate,
            relative: state.relative,
            e_relative: state.e_relative,
            layer_z: state.layer_z,
            emax: self.emax,
            total_duration: self.total_duration,
            units: state.units,
            tool: state.tool,
            filament_length: self.filament_length,
            bounds: self.bounds,
            lines: self.line_number,
            layer_count: self.layers.len(),
        }
    }

    pub fn state(&self) -> &MachineState {
        &self.state
    }

    pub fn layer_index(&self) -> &LayerIndex {
        &self.layers
    }

    /// Mutable access for viewers moving the cursor
    pub fn layer_index_mut(&mut self) -> &mut LayerIndex {
        &mut self.layers
    }

    /// Retained warnings, oldest first
    pub fn warnings(&self) -> impl ExactSizeIterator<Item = &Warning> {
        self.warnings.iter()
    }

    /// Every warning ever recorded, including evicted ones
    pub fn warning_total(&self) -> u64 {
        self.warnings.total()
    }

    pub fn total_duration(&self) -> f64 {
        self.total_duration
    }

    /// Mark a line the printer has executed on the progress overlay
    ///
    /// The overlay keeps its own position; interpreted state and layers are
    /// left alone.
    pub fn highlight_line(&mut self, line: &str) -> Option<HighlightMark> {
        self.highlight.feed_line(line)
    }

    pub fn highlights(&self) -> &[HighlightMark] {
        self.highlight.marks()
    }

    /// Drop the overlay and restart it from the interpreted position
    pub fn clear_highlights(&mut self) {
        self.highlight.restart(&self.state);
    }

    fn emit(&mut self, event: &Event) {
        if let Some(sink) = self.sink.as_mut() {
            sink.on_event(event);
        }
    }

    fn record(&mut self, issue: Issue) {
        let warning = Warning {
            line_number: self.line_number,
            kind: issue.kind,
            message: issue.message,
        };
        log::debug!("{}", warning);

        if self.sink.is_some() {
            self.emit(&Event::Warning {
                line_number: warning.line_number,
                kind: warning.kind,
                message: warning.message.clone(),
            });
        }
        self.warnings.push(warning);
    }

    /// Emit an event and report it as the line's outcome
    fn event(&mut self, event: Event) -> LineOutcome {
        self.emit(&event);
        LineOutcome::Event(event)
    }

    fn execute(&mut self, command: &Command) -> LineOutcome {
        if command.kind == CommandKind::Unknown {
            self.record(Issue::new(
                WarningKind::UnknownCommand,
                format!("unusable command head in '{}'", command.raw_line.trim()),
            ));
            return LineOutcome::Ignored;
        }

        let action = classify(command);
        let mut issues = Vec::new();
        let transition = self.state.apply(action, command, &mut issues);
        for issue in issues {
            self.record(issue);
        }

        match transition {
            Transition::Motion(motion) => self.motion(motion),
            Transition::Homed { axes, kind } => self.event(Event::Home { axes, kind }),
            Transition::PositionSet { axes } if !axes.is_empty() => {
                self.event(Event::OffsetReset { axes })
            }
            Transition::ModeChanged {
                relative,
                e_relative,
            } => self.event(Event::ModeChanged {
                relative,
                e_relative,
            }),
            Transition::Dwell { seconds } => {
                if self.config.compute_duration {
                    self.total_duration += seconds;
                }
                LineOutcome::StateOnly
            }
            Transition::ToolSelected(index) => self.event(Event::ToolChange { index }),
            Transition::Unchanged => self.side_effect(action, command),
            Transition::PositionSet { .. } | Transition::UnitsChanged(_) => LineOutcome::StateOnly,
        }
    }

    /// Commands that leave motion state alone
    fn side_effect(&mut self, action: Action, command: &Command) -> LineOutcome {
        let params = &command.params;
        match action {
            Action::Temperature { channel, blocking } => {
                let target_c = params.get('S').or_else(|| params.get('R')).unwrap_or(0.0);
                self.event(Event::Temperature {
                    target_c,
                    channel,
                    blocking,
                })
            }
            Action::Fan { on: true } => {
                let speed = params.get('S').map_or(255.0, |s| s.clamp(0.0, 255.0));
                let speed = if speed.is_finite() { speed.round() as u8 } else { 0 };
                self.event(Event::Fan {
                    on: speed > 0,
                    speed,
                })
            }
            Action::Fan { on: false } => self.event(Event::Fan {
                on: false,
                speed: 0,
            }),
            Action::Other => self.event(Event::Passthrough {
                kind: command.kind,
                number: command.number,
            }),
            _ => LineOutcome::StateOnly,
        }
    }

    fn motion(&mut self, motion: Motion) -> LineOutcome {
        let distance = travel_distance(&motion.from, &motion.to);
        // a full circle ends where it started but is still drawn
        if distance == 0.0 && motion.arc.is_none() {
            return LineOutcome::StateOnly;
        }

        self.extruded += motion.to.e - motion.from.e;
        self.filament_length = self.filament_length.max(self.extruded);

        // pure Z hops and pure E primes or retractions draw nothing
        let visible = motion.moves_xy() || motion.arc.is_some();
        if motion.extruding && visible {
            let bounds = self
                .bounds
                .get_or_insert_with(|| Bounds::new(motion.from.xyz()));
            bounds.include(motion.from.xyz());
            bounds.include(motion.to.xyz());
        }

        let duration = self.config.compute_duration.then(|| {
            if distance > 0.0 {
                self.timing
                    .segment_duration(distance, motion.feedrate, self.initial_feedrate)
            } else {
                0.0
            }
        });
        if distance > 0.0 {
            if let Some(seconds) = duration {
                self.total_duration += seconds + self.timing.move_overhead();
            }
            self.initial_feedrate = motion.feedrate;
        }

        if !visible {
            return LineOutcome::StateOnly;
        }

        // travel is only drawn over a layer that already exists
        let indexed = motion.extruding || self.layers.contains_layer(motion.layer_z);

        if let Some(path) = motion.arc {
            if self.config.tessellate_arcs && !self.arc_notice_logged {
                log::debug!("Arc tessellation requested but not supported; keeping arcs as circles");
                self.arc_notice_logged = true;
            }

            let arc = ArcSegment::new(&motion, path, duration);
            let mut new_layer = None;
            if indexed {
                let landed = self.layers.insert_arc(motion.layer_z, arc);
                new_layer = self.announce(landed);
            }

            self.emit(&Event::Arc(arc));
            return match new_layer {
                Some(z) => LineOutcome::NewLayer(z),
                None => LineOutcome::Arc(arc),
            };
        }

        let segment = Segment::new(&motion, duration);
        let mut new_layer = None;
        if indexed {
            let landed = self.layers.insert(motion.layer_z, segment);
            new_layer = self.announce(landed);
        }

        self.emit(&Event::Segment(segment));
        match new_layer {
            Some(z) => LineOutcome::NewLayer(z),
            None => LineOutcome::Segment(segment),
        }
    }

    /// Emit `LayerAdded` if the insert opened a layer
    fn announce(&mut self, landed: LayerInsert) -> Option<f64> {
        if !landed.new_layer {
            return None;
        }
        log::debug!("New layer at z={} (line {})", landed.z, self.line_number);
        self.emit(&Event::LayerAdded { z: landed.z });
        Some(landed.z)
    }
}
