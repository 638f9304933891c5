//! Diagnostics
//!
//! Non-fatal problems found while interpreting input. The interpreter never
//! aborts on bad G-code; it records a [`Warning`] and moves on.

use std::collections::VecDeque;
use std::fmt;

use serde::Serialize;

/// Default number of warnings retained by a [`WarningLog`]
pub const DEFAULT_WARNING_CAPACITY: usize = 256;

/// Category of a non-fatal input problem
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    /// A parameter word could not be interpreted and was dropped
    MalformedToken,
    /// The same parameter letter appeared twice; the later value wins
    DuplicateParameter,
    /// The command head was not a usable G/M/T code
    UnknownCommand,
    /// A move that cannot do anything, such as a relative move naming no axis
    InconsistentMove,
    /// A computed value was not finite and the previous one was kept
    NumericOverflow,
    /// A value was finite but outside what the command accepts
    InvalidValue,
}

impl fmt::Display for WarningKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::MalformedToken => "malformed token",
            Self::DuplicateParameter => "duplicate parameter",
            Self::UnknownCommand => "unknown command",
            Self::InconsistentMove => "inconsistent move",
            Self::NumericOverflow => "numeric overflow",
            Self::InvalidValue => "invalid value",
        };
        f.write_str(name)
    }
}

/// A problem reported by the lexer or the machine state, before it is
/// attributed to a line
#[derive(Debug, Clone, PartialEq)]
pub struct Issue {
    pub kind: WarningKind,
    pub message: String,
}

impl Issue {
    pub fn new(kind: WarningKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

/// A recorded warning with the 1-based line it came from
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Warning {
    pub line_number: u64,
    pub kind: WarningKind,
    pub message: String,
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {}: {}", self.line_number, self.kind, self.message)
    }
}

/// Bounded ring buffer of warnings
///
/// Once full, the oldest entry is evicted. `total()` keeps counting evicted
/// entries so callers can tell whether anything was ever reported.
#[derive(Debug, Clone)]
pub struct WarningLog {
    entries: VecDeque<Warning>,
    capacity: usize,
    total: u64,
}

impl WarningLog {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity.min(DEFAULT_WARNING_CAPACITY)),
            capacity,
            total: 0,
        }
    }

    pub fn push(&mut self, warning: Warning) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(warning);
        self.total += 1;
    }

    /// Retained warnings, oldest first
    pub fn iter(&self) -> impl ExactSizeIterator<Item = &Warning> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of warnings ever pushed, including evicted ones
    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.total = 0;
    }
}

impl Default for WarningLog {
    fn default() -> Self {
        Self::new(DEFAULT_WARNING_CAPACITY)
    }
}
