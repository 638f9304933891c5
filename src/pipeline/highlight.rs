//! Progress overlay
//!
//! Follows the printer's current position with its own machine state, so
//! marking what a printer has done never touches the layer index.

use serde::Serialize;

use crate::dispatch::classify;
use crate::layers::{ArcSegment, Segment};
use crate::machine::{MachineState, Transition, Vec4};
use crate::parser::{CommandKind, Lexed, parse_line};

/// One drawn piece of the overlay
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "mark", rename_all = "snake_case")]
pub enum HighlightMark {
    Line(Segment),
    Arc(ArcSegment),
}

#[derive(Debug, Clone, Default)]
pub struct Highlight {
    state: MachineState,
    marks: Vec<HighlightMark>,
}

impl Highlight {
    pub fn new(state: MachineState) -> Self {
        Self {
            state,
            marks: Vec::new(),
        }
    }

    /// Interpret a line sent to the printer; moves in XY and arcs leave a mark
    pub fn feed_line(&mut self, line: &str) -> Option<HighlightMark> {
        let Lexed { command, issues } = parse_line(line);
        for issue in issues {
            log::debug!("Highlight: {}", issue.message);
        }

        let command = command?;
        if command.kind == CommandKind::Unknown {
            return None;
        }

        let mut issues = Vec::new();
        let transition = self.state.apply(classify(&command), &command, &mut issues);
        for issue in issues {
            log::debug!("Highlight: {}", issue.message);
        }

        let Transition::Motion(motion) = transition else {
            return None;
        };
        let mark = match motion.arc {
            Some(path) => HighlightMark::Arc(ArcSegment::new(&motion, path, None)),
            None if motion.moves_xy() => HighlightMark::Line(Segment::new(&motion, None)),
            None => return None,
        };
        self.marks.push(mark);
        Some(mark)
    }

    pub fn marks(&self) -> &[HighlightMark] {
        &self.marks
    }

    pub fn position(&self) -> Vec4 {
        self.state.pos
    }

    /// Drop every mark and carry on from `state`
    pub fn restart(&mut self, state: &MachineState) {
        self.state = state.clone();
        self.marks.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_visible_moves_leave_marks() {
        let mut highlight = Highlight::default();

        assert!(highlight.feed_line("G1 Z0.2").is_none());
        assert!(highlight.feed_line("G1 E1").is_none());
        assert!(highlight.feed_line("M104 S200").is_none());
        assert!(matches!(
            highlight.feed_line("G1 X5 E2"),
            Some(HighlightMark::Line(_))
        ));
        assert!(matches!(
            highlight.feed_line("G2 X10 I2.5"),
            Some(HighlightMark::Arc(arc)) if arc.clockwise
        ));

        assert_eq!(highlight.marks().len(), 2);
        assert_eq!(highlight.position(), Vec4::new(10.0, 0.0, 0.2, 2.0));
    }

    #[test]
    fn test_restart_follows_given_state() {
        let mut highlight = Highlight::default();
        highlight.feed_line("G1 X5");

        let mut state = MachineState::default();
        state.pos = Vec4::new(1.0, 2.0, 0.4, 0.0);
        highlight.restart(&state);
        assert!(highlight.marks().is_empty());

        let Some(HighlightMark::Line(line)) = highlight.feed_line("G1 X3") else {
            panic!("expected a line mark");
        };
        assert_eq!(line.from, Vec4::new(1.0, 2.0, 0.4, 0.0));
        assert_eq!(line.to, Vec4::new(3.0, 2.0, 0.4, 0.0));
    }
}
