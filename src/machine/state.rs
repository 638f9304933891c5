//! Machine motion state and its transitions
//!
//! [`MachineState::apply`] is the only way the state changes. It reports what
//! happened as a [`Transition`]; timing and layer bookkeeping live elsewhere.

use serde::Serialize;

use crate::config::PipelineConfig;
use crate::diagnostics::{Issue, WarningKind};
use crate::dispatch::Action;
use crate::machine::geometry::{Axis, AxisSet, Vec2, Vec3, Vec4};
use crate::parser::{Command, Params};

/// Length unit of incoming coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Units {
    Millimetres,
    Inches,
}

impl Units {
    /// Scale from input units to millimetres
    pub fn factor(self) -> f64 {
        match self {
            Units::Millimetres => 1.0,
            Units::Inches => 25.4,
        }
    }
}

/// Which end of travel a homing command targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HomeKind {
    Min,
    Max,
}

/// A resolved move from `last` to `pos`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Motion {
    pub from: Vec4,
    pub to: Vec4,
    pub feedrate: f64,
    pub extruding: bool,
    /// Print layer after the move was applied
    pub layer_z: f64,
    /// Set for G2/G3
    pub arc: Option<ArcPath>,
}

/// Circle a G2/G3 move follows from `from` to `to`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ArcPath {
    /// Start point plus the I/J offsets
    pub center: Vec2,
    pub clockwise: bool,
}

impl Motion {
    pub fn moves_xy(&self) -> bool {
        self.from.x != self.to.x || self.from.y != self.to.y
    }
}

/// What a command did to the state
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Transition {
    Motion(Motion),
    Homed { axes: AxisSet, kind: HomeKind },
    PositionSet { axes: AxisSet },
    ModeChanged { relative: bool, e_relative: bool },
    UnitsChanged(Units),
    Dwell { seconds: f64 },
    ToolSelected(u8),
    /// Nothing motion-related changed
    Unchanged,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MachineState {
    pub pos: Vec4,
    pub last: Vec4,
    pub offset: Vec4,
    pub feedrate: f64,
    pub relative: bool,
    pub e_relative: bool,
    pub home: Vec3,
    pub max: Vec3,
    /// Z of the most recent extruding move; travels do not change it
    pub layer_z: f64,
    pub units: Units,
    pub tool: u8,
    strict_compat: bool,
    g91_sets_extruder: bool,
}

impl Default for MachineState {
    fn default() -> Self {
        Self::new(&PipelineConfig::default())
    }
}

impl MachineState {
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            pos: Vec4::ZERO,
            last: Vec4::ZERO,
            offset: Vec4::ZERO,
            feedrate: config.default_feedrate,
            relative: false,
            e_relative: false,
            home: config.home,
            max: config.max,
            layer_z: 0.0,
            units: Units::Millimetres,
            tool: 0,
            strict_compat: config.strict_compat,
            g91_sets_extruder: config.g91_sets_extruder,
        }
    }

    /// Apply a classified command, pushing any recoverable problems to `issues`
    pub fn apply(&mut self, action: Action, command: &Command, issues: &mut Vec<Issue>) -> Transition {
        let params = &command.params;

        match action {
            Action::Move => self.apply_move(params, None, issues),
            Action::Arc { clockwise } => self.apply_move(params, Some(clockwise), issues),
            Action::HomeMin => self.apply_home(params, HomeKind::Min),
            Action::HomeMax => self.apply_home(params, HomeKind::Max),
            Action::SetPosition => self.apply_set_position(params, issues),
            Action::SetAbsolute => {
                self.relative = false;
                if self.g91_sets_extruder {
                    self.e_relative = false;
                }
                self.mode_changed()
            }
            Action::SetRelative => {
                self.relative = true;
                if self.g91_sets_extruder {
                    self.e_relative = true;
                }
                self.mode_changed()
            }
            Action::SetExtruderAbsolute => {
                self.e_relative = false;
                self.mode_changed()
            }
            Action::SetExtruderRelative => {
                self.e_relative = true;
                self.mode_changed()
            }
            Action::SetUnits(units) => {
                self.units = units;
                Transition::UnitsChanged(units)
            }
            Action::Dwell => apply_dwell(params, issues),
            Action::ToolChange => self.apply_tool_change(command.number, issues),
            Action::Temperature { .. } | Action::Fan { .. } | Action::Other => Transition::Unchanged,
        }
    }

    fn mode_changed(&self) -> Transition {
        Transition::ModeChanged {
            relative: self.relative,
            e_relative: self.e_relative,
        }
    }

    /// Write `value` to `axis` of `pos`, keeping the old value if it is not finite
    fn assign(&mut self, axis: Axis, value: f64, issues: &mut Vec<Issue>) {
        if value.is_finite() {
            self.pos.set(axis, value);
        } else {
            issues.push(Issue::new(
                WarningKind::NumericOverflow,
                format!("{} position is not finite; keeping {}", axis.letter(), self.pos.get(axis)),
            ));
        }
    }

    fn apply_move(
        &mut self,
        params: &Params,
        clockwise: Option<bool>,
        issues: &mut Vec<Issue>,
    ) -> Transition {
        let scale = self.units.factor();

        if let Some(feedrate) = params.get('F') {
            let feedrate = feedrate * scale;
            if feedrate.is_finite() && feedrate > 0.0 {
                self.feedrate = feedrate;
            } else {
                issues.push(Issue::new(
                    WarningKind::InvalidValue,
                    format!("ignoring feedrate {feedrate}; keeping {}", self.feedrate),
                ));
            }
        }

        self.last = self.pos;

        let names_axis = Axis::ALL.iter().any(|axis| params.contains(axis.letter()));
        if self.relative && !names_axis {
            issues.push(Issue::new(
                WarningKind::InconsistentMove,
                "relative move names no axis",
            ));
        }

        for axis in Axis::LINEAR {
            if let Some(value) = params.get(axis.letter()) {
                let value = value * scale;
                let target = if self.relative {
                    self.pos.get(axis) + value
                } else {
                    self.offset.get(axis) + value
                };
                self.assign(axis, target, issues);
            }
        }

        if let Some(value) = params.get('E') {
            let value = value * scale;
            let target = if self.e_relative {
                self.pos.e + value
            } else {
                self.offset.e + value
            };
            self.assign(Axis::E, target, issues);
        }

        let arc = clockwise.map(|clockwise| ArcPath {
            center: self.arc_center(params, issues),
            clockwise,
        });

        let extruding = self.pos.e > self.last.e;
        let moves_xy = self.pos.x != self.last.x || self.pos.y != self.last.y;
        if extruding && (moves_xy || arc.is_some()) {
            self.layer_z = self.pos.z;
        }

        Transition::Motion(Motion {
            from: self.last,
            to: self.pos,
            feedrate: self.feedrate,
            extruding,
            layer_z: self.layer_z,
            arc,
        })
    }

    /// I/J are always relative to the start point, whatever the XYZ mode
    fn arc_center(&self, params: &Params, issues: &mut Vec<Issue>) -> Vec2 {
        let scale = self.units.factor();
        let mut offset = |letter: char| {
            let value = params.get(letter).unwrap_or(0.0) * scale;
            if value.is_finite() {
                value
            } else {
                issues.push(Issue::new(
                    WarningKind::NumericOverflow,
                    format!("arc offset {letter} is not finite; using 0"),
                ));
                0.0
            }
        };
        let (i, j) = (offset('I'), offset('J'));
        Vec2::new(self.last.x + i, self.last.y + j)
    }

    fn apply_home(&mut self, params: &Params, kind: HomeKind) -> Transition {
        let candidates: &[Axis] = match kind {
            HomeKind::Min => &Axis::ALL,
            HomeKind::Max => &Axis::LINEAR,
        };

        let mut axes = AxisSet::from_axes(
            &candidates
                .iter()
                .copied()
                .filter(|axis| params.contains(axis.letter()))
                .collect::<Vec<_>>(),
        );
        if axes.is_empty() {
            axes = AxisSet::from_axes(candidates);
        }

        for axis in Axis::ALL.into_iter().filter(|axis| axes.contains(*axis)) {
            let target = match kind {
                HomeKind::Min => self.home.axis(axis),
                HomeKind::Max => self.max.axis(axis),
            };
            self.offset.set(axis, 0.0);
            self.pos.set(axis, target);
        }

        Transition::Homed { axes, kind }
    }

    fn apply_set_position(&mut self, params: &Params, issues: &mut Vec<Issue>) -> Transition {
        let scale = self.units.factor();
        let mut axes = AxisSet::EMPTY;

        for axis in Axis::ALL {
            let Some(value) = params.get(axis.letter()) else {
                continue;
            };
            let offset = self.pos.get(axis) - value * scale;
            if !offset.is_finite() {
                issues.push(Issue::new(
                    WarningKind::NumericOverflow,
                    format!("{} offset is not finite; keeping {}", axis.letter(), self.offset.get(axis)),
                ));
                continue;
            }

            if axis == Axis::E && self.strict_compat {
                // Historical analyzers stored the E offset into X
                self.offset.x = offset;
                self.pos.e = self.offset.e;
            } else {
                self.offset.set(axis, offset);
                self.pos.set(axis, offset);
            }
            axes.insert(axis);
        }

        Transition::PositionSet { axes }
    }

    fn apply_tool_change(&mut self, number: Option<u32>, issues: &mut Vec<Issue>) -> Transition {
        let number = number.unwrap_or(0);
        match u8::try_from(number) {
            Ok(tool) => {
                self.tool = tool;
                Transition::ToolSelected(tool)
            }
            Err(_) => {
                issues.push(Issue::new(
                    WarningKind::InvalidValue,
                    format!("tool index {number} is out of range"),
                ));
                Transition::Unchanged
            }
        }
    }
}

/// G4 waits `P` milliseconds or `S` seconds, whichever is longer
fn apply_dwell(params: &Params, issues: &mut Vec<Issue>) -> Transition {
    let millis = params.get('P').unwrap_or(0.0) / 1000.0;
    let secs = params.get('S').unwrap_or(0.0);
    let seconds = millis.max(secs);

    if !seconds.is_finite() {
        issues.push(Issue::new(WarningKind::NumericOverflow, "dwell time is not finite"));
        return Transition::Dwell { seconds: 0.0 };
    }

    Transition::Dwell {
        seconds: seconds.max(0.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::classify;
    use crate::parser::lex;

    fn feed(state: &mut MachineState, line: &str) -> (Transition, Vec<Issue>) {
        let command = lex(line).expect("command");
        let mut issues = Vec::new();
        let transition = state.apply(classify(&command), &command, &mut issues);
        (transition, issues)
    }

    fn motion(transition: Transition) -> Motion {
        match transition {
            Transition::Motion(motion) => motion,
            other => panic!("expected motion, got {other:?}"),
        }
    }

    #[test]
    fn test_absolute_move_applies_offset() {
        let mut state = MachineState::default();
        state.offset.x = 5.0;

        let m = motion(feed(&mut state, "G1 X10 Y2 F1200").0);

        assert_eq!(m.to, Vec4::new(15.0, 2.0, 0.0, 0.0));
        assert_eq!(m.from, Vec4::ZERO);
        assert_eq!(state.feedrate, 1200.0);
        assert!(!m.extruding);
    }

    #[test]
    fn test_relative_move_accumulates() {
        let mut state = MachineState::default();
        feed(&mut state, "G91");
        feed(&mut state, "G1 X10");
        feed(&mut state, "G1 X-4 Y1");

        assert_eq!(state.pos.xy(), crate::machine::Vec2::new(6.0, 1.0));
        assert_eq!(state.last.x, 10.0);
    }

    #[test]
    fn test_extruder_mode_is_independent() {
        let mut state = MachineState::default();
        feed(&mut state, "M83");
        feed(&mut state, "G1 X1 E0.5");
        let m = motion(feed(&mut state, "G1 X2 E0.5").0);

        assert_eq!(state.pos.e, 1.0);
        assert!(m.extruding);
        assert!(!state.relative);
    }

    #[test]
    fn test_layer_z_sticks_on_travel() {
        let mut state = MachineState::default();
        feed(&mut state, "G1 Z0.3");
        feed(&mut state, "G1 X5 E1");
        assert_eq!(state.layer_z, 0.3);

        feed(&mut state, "G1 Z5 X0");
        assert_eq!(state.layer_z, 0.3);
    }

    #[test]
    fn test_retraction_is_not_extruding() {
        let mut state = MachineState::default();
        feed(&mut state, "G1 X5 E2");
        let m = motion(feed(&mut state, "G1 E1").0);

        assert!(!m.extruding);
        assert!(!m.moves_xy());
    }

    #[test]
    fn test_arc_center_is_relative_to_start() {
        let mut state = MachineState::default();
        feed(&mut state, "G1 X10 Y10");
        let m = motion(feed(&mut state, "G3 X20 Y10 I5 J0 E1").0);

        let arc = m.arc.unwrap();
        assert_eq!(arc.center, Vec2::new(15.0, 10.0));
        assert!(!arc.clockwise);
        assert!(m.extruding);

        feed(&mut state, "G20");
        let m = motion(feed(&mut state, "G2 X1 Y0 J-1").0);
        let arc = m.arc.unwrap();
        assert!(arc.clockwise);
        assert!((arc.center.y - (10.0 - 25.4)).abs() < 1e-9);
        assert_eq!(arc.center.x, 20.0);
    }

    #[test]
    fn test_plain_move_has_no_arc() {
        let mut state = MachineState::default();
        assert_eq!(motion(feed(&mut state, "G1 X1 I5").0).arc, None);
    }

    #[test]
    fn test_invalid_feedrate_is_kept() {
        let mut state = MachineState::default();
        let (_, issues) = feed(&mut state, "G1 X1 F0");

        assert_eq!(state.feedrate, 1000.0);
        assert_eq!(issues[0].kind, WarningKind::InvalidValue);
    }

    #[test]
    fn test_relative_move_without_axes_is_inconsistent() {
        let mut state = MachineState::default();
        feed(&mut state, "G91");
        let (transition, issues) = feed(&mut state, "G1 F300");

        assert_eq!(issues[0].kind, WarningKind::InconsistentMove);
        assert_eq!(motion(transition).from, motion(transition).to);
        assert_eq!(state.feedrate, 300.0);
    }

    #[test]
    fn test_non_finite_coordinate_is_clamped() {
        let mut state = MachineState::default();
        feed(&mut state, "G1 X3");
        let huge = format!("G1 X{}", "9".repeat(400));
        let (_, issues) = feed(&mut state, &huge);

        assert_eq!(state.pos.x, 3.0);
        assert_eq!(issues[0].kind, WarningKind::NumericOverflow);
    }

    #[test]
    fn test_home_all_resets_offsets() {
        let mut state = MachineState::default();
        feed(&mut state, "G1 X10 Y10 Z10 E3");
        feed(&mut state, "G92 X0 Y0");

        let (transition, _) = feed(&mut state, "G28");

        assert_eq!(
            transition,
            Transition::Homed {
                axes: AxisSet::all(),
                kind: HomeKind::Min
            }
        );
        assert_eq!(state.pos, Vec4::ZERO);
        assert_eq!(state.offset, Vec4::ZERO);
    }

    #[test]
    fn test_home_max_ignores_extruder() {
        let mut config = PipelineConfig::default();
        config.max = Vec3::new(200.0, 210.0, 220.0);
        let mut state = MachineState::new(&config);
        feed(&mut state, "G1 E4");

        feed(&mut state, "G162 X");

        assert_eq!(state.pos, Vec4::new(200.0, 0.0, 0.0, 4.0));
    }

    #[test]
    fn test_set_position_follows_offset_rule() {
        let mut state = MachineState::default();
        feed(&mut state, "G1 X10 E5");
        let (transition, _) = feed(&mut state, "G92 X4 E5");

        assert_eq!(state.offset.x, 6.0);
        assert_eq!(state.pos.x, 6.0);
        assert_eq!(state.offset.e, 0.0);
        assert_eq!(state.pos.e, 0.0);
        assert_eq!(
            transition,
            Transition::PositionSet {
                axes: AxisSet::EMPTY.with(Axis::X).with(Axis::E)
            }
        );
    }

    #[test]
    fn test_set_position_strict_compat_writes_x_offset() {
        let mut config = PipelineConfig::default();
        config.strict_compat = true;
        let mut state = MachineState::new(&config);
        feed(&mut state, "G1 E5");

        feed(&mut state, "G92 E2");

        assert_eq!(state.offset.x, 3.0);
        assert_eq!(state.offset.e, 0.0);
        assert_eq!(state.pos.e, 0.0);
    }

    #[test]
    fn test_inches_scale_inputs() {
        let mut state = MachineState::default();
        feed(&mut state, "G20");
        feed(&mut state, "G1 X1 F10");

        assert_eq!(state.pos.x, 25.4);
        assert!((state.feedrate - 254.0).abs() < 1e-9);

        feed(&mut state, "G21");
        feed(&mut state, "G1 X1");
        assert_eq!(state.pos.x, 1.0);
    }

    #[test]
    fn test_g91_can_switch_extruder_mode() {
        let mut config = PipelineConfig::default();
        config.g91_sets_extruder = true;
        let mut state = MachineState::new(&config);

        assert_eq!(
            feed(&mut state, "G91").0,
            Transition::ModeChanged {
                relative: true,
                e_relative: true
            }
        );
        feed(&mut state, "G90");
        assert!(!state.e_relative);
    }

    #[test]
    fn test_dwell_takes_longer_of_p_and_s() {
        let mut state = MachineState::default();
        assert_eq!(feed(&mut state, "G4 P1500").0, Transition::Dwell { seconds: 1.5 });
        assert_eq!(feed(&mut state, "G4 P500 S2").0, Transition::Dwell { seconds: 2.0 });
    }

    #[test]
    fn test_tool_change() {
        let mut state = MachineState::default();
        assert_eq!(feed(&mut state, "T3").0, Transition::ToolSelected(3));
        assert_eq!(state.tool, 3);

        let (transition, issues) = feed(&mut state, "T300");
        assert_eq!(transition, Transition::Unchanged);
        assert_eq!(issues.len(), 1);
        assert_eq!(state.tool, 3);
    }
}
