//! Command table
//!
//! Pure metadata mapping `(kind, number)` to what the interpreter does with
//! a command. Anything not listed is [`Action::Other`].

use serde::Serialize;

use crate::machine::Units;
use crate::parser::{Command, CommandKind};

/// Heater a temperature command addresses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TemperatureChannel {
    Hotend,
    Bed,
}

/// What a classified command does
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// G0/G1: travel or extrude, told apart by the E delta
    Move,
    /// G2/G3: treated as a move to the endpoint
    Arc { clockwise: bool },
    Dwell,
    SetUnits(Units),
    /// G28/G161
    HomeMin,
    /// G162
    HomeMax,
    SetAbsolute,
    SetRelative,
    SetExtruderAbsolute,
    SetExtruderRelative,
    /// G92
    SetPosition,
    Temperature {
        channel: TemperatureChannel,
        blocking: bool,
    },
    Fan { on: bool },
    ToolChange,
    Other,
}

/// One row of the command table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableEntry {
    pub kind: CommandKind,
    pub number: u32,
    pub action: Action,
}

const fn entry(kind: CommandKind, number: u32, action: Action) -> TableEntry {
    TableEntry {
        kind,
        number,
        action,
    }
}

static COMMAND_TABLE: &[TableEntry] = &[
    entry(CommandKind::G, 0, Action::Move),
    entry(CommandKind::G, 1, Action::Move),
    entry(CommandKind::G, 2, Action::Arc { clockwise: true }),
    entry(CommandKind::G, 3, Action::Arc { clockwise: false }),
    entry(CommandKind::G, 4, Action::Dwell),
    entry(CommandKind::G, 20, Action::SetUnits(Units::Inches)),
    entry(CommandKind::G, 21, Action::SetUnits(Units::Millimetres)),
    entry(CommandKind::G, 28, Action::HomeMin),
    entry(CommandKind::G, 90, Action::SetAbsolute),
    entry(CommandKind::G, 91, Action::SetRelative),
    entry(CommandKind::G, 92, Action::SetPosition),
    entry(CommandKind::G, 161, Action::HomeMin),
    entry(CommandKind::G, 162, Action::HomeMax),
    entry(CommandKind::M, 82, Action::SetExtruderAbsolute),
    entry(CommandKind::M, 83, Action::SetExtruderRelative),
    entry(
        CommandKind::M,
        104,
        Action::Temperature {
            channel: TemperatureChannel::Hotend,
            blocking: false,
        },
    ),
    entry(
        CommandKind::M,
        109,
        Action::Temperature {
            channel: TemperatureChannel::Hotend,
            blocking: true,
        },
    ),
    entry(
        CommandKind::M,
        140,
        Action::Temperature {
            channel: TemperatureChannel::Bed,
            blocking: false,
        },
    ),
    entry(
        CommandKind::M,
        190,
        Action::Temperature {
            channel: TemperatureChannel::Bed,
            blocking: true,
        },
    ),
    entry(CommandKind::M, 106, Action::Fan { on: true }),
    entry(CommandKind::M, 107, Action::Fan { on: false }),
];

/// The full table, for hosts that want to show what is understood
pub fn command_table() -> &'static [TableEntry] {
    COMMAND_TABLE
}

/// Classify a command; every `T` code is a tool change
pub fn classify(command: &Command) -> Action {
    if command.kind == CommandKind::T {
        return Action::ToolChange;
    }

    let Some(number) = command.number else {
        return Action::Other;
    };

    COMMAND_TABLE
        .iter()
        .find(|row| row.kind == command.kind && row.number == number)
        .map_or(Action::Other, |row| row.action)
}
