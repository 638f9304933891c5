//! Parsed G-code commands
//!
//! Turns lexer fragments into a [`Command`]: a G/M/T head plus a fixed-size
//! table of numeric parameters.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::diagnostics::{Issue, WarningKind};
use crate::parser::lexer::{Token, TokenKind};

/// Parameter letters the interpreter gives meaning to
pub const PARAMETER_LETTERS: [char; 12] =
    ['X', 'Y', 'Z', 'E', 'F', 'I', 'J', 'K', 'R', 'S', 'P', 'T'];

/// One letter+number group; fragments may pack several of these (`G1X10Y10`)
static WORD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([A-Za-z])([-+]?[0-9]*\.?[0-9]*)").expect("word pattern is a valid regex")
});

/// Command family of the head word
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum CommandKind {
    G,
    M,
    T,
    /// A G/M head whose number is missing or not an integer
    Unknown,
}

impl CommandKind {
    fn from_letter(letter: char) -> Option<Self> {
        match letter {
            'G' => Some(Self::G),
            'M' => Some(Self::M),
            'T' => Some(Self::T),
            _ => None,
        }
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let letter = match self {
            Self::G => "G",
            Self::M => "M",
            Self::T => "T",
            Self::Unknown => "?",
        };
        f.write_str(letter)
    }
}

/// Parameter values keyed by letter
///
/// Stored as one slot per ASCII letter so lookups never allocate.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Params {
    values: [Option<f64>; 26],
}

fn slot(letter: char) -> Option<usize> {
    let upper = letter.to_ascii_uppercase();
    upper
        .is_ascii_uppercase()
        .then(|| usize::from(upper as u8 - b'A'))
}

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, letter: char) -> Option<f64> {
        slot(letter).and_then(|idx| self.values[idx])
    }

    pub fn contains(&self, letter: char) -> bool {
        self.get(letter).is_some()
    }

    /// Store a value, returning the one it replaced
    pub fn set(&mut self, letter: char, value: f64) -> Option<f64> {
        let idx = slot(letter)?;
        self.values[idx].replace(value)
    }

    pub fn remove(&mut self, letter: char) -> Option<f64> {
        slot(letter).and_then(|idx| self.values[idx].take())
    }

    pub fn len(&self) -> usize {
        self.values.iter().filter(|v| v.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.values.iter().all(Option::is_none)
    }

    /// Present parameters in alphabetical order
    pub fn iter(&self) -> impl Iterator<Item = (char, f64)> + '_ {
        self.values
            .iter()
            .enumerate()
            .filter_map(|(idx, value)| value.map(|v| (char::from(b'A' + idx as u8), v)))
    }
}

/// A G-code command like "G1 X10 Y20"
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    pub kind: CommandKind,
    /// Absent for a bare `T` or an unusable head
    pub number: Option<u32>,
    pub params: Params,
    /// The original text, kept for diagnostics
    pub raw_line: String,
}

impl Command {
    pub fn is(&self, kind: CommandKind, number: u32) -> bool {
        self.kind == kind && self.number == Some(number)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.number {
            Some(number) => write!(f, "{}{}", self.kind, number),
            None => write!(f, "{}", self.kind),
        }
    }
}

/// Result of lexing one line: the command, if any, and what went wrong on the way
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Lexed {
    pub command: Option<Command>,
    pub issues: Vec<Issue>,
}

/// A single letter+number group inside a fragment
#[derive(Debug, Clone, Copy, PartialEq)]
struct Word<'a> {
    letter: char,
    text: &'a str,
}

impl Word<'_> {
    fn has_digits(&self) -> bool {
        self.text.bytes().any(|b| b.is_ascii_digit())
    }

    /// Numeric value; a bare letter (or a lone sign) reads as 0.0
    fn value(&self) -> Option<f64> {
        if !self.has_digits() {
            return Some(0.0);
        }
        self.text.parse().ok()
    }

    fn integer(&self) -> Option<u32> {
        if self.text.is_empty() || !self.text.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        self.text.parse().ok()
    }

    fn is_line_number(&self) -> bool {
        self.letter == 'N' && self.integer().is_some()
    }
}

/// Split a fragment into consecutive words
///
/// Returns None when characters are left over, or when a value-less group is
/// glued to the next one under a letter that carries no meaning (`Xabc`).
fn split_fragment(fragment: &str) -> Option<Vec<Word<'_>>> {
    let mut words = Vec::new();
    let mut cursor = 0;

    for caps in WORD_RE.captures_iter(fragment) {
        let whole = caps.get(0)?;
        if whole.start() != cursor {
            return None;
        }
        cursor = whole.end();

        let letter = caps.get(1)?.as_str().chars().next()?.to_ascii_uppercase();
        let text = caps.get(2).map_or("", |m| m.as_str());
        words.push(Word { letter, text });
    }

    if words.is_empty() || cursor != fragment.len() {
        return None;
    }

    let glued_garbage = words
        .windows(2)
        .any(|pair| !pair[0].has_digits() && !PARAMETER_LETTERS.contains(&pair[0].letter));
    if glued_garbage {
        return None;
    }

    Some(words)
}

/// Commands whose arguments are free text (messages, file names)
fn takes_text_argument(kind: CommandKind, number: Option<u32>) -> bool {
    kind == CommandKind::M && matches!(number, Some(23 | 28 | 30 | 32 | 117 | 118))
}

fn assign(params: &mut Params, issues: &mut Vec<Issue>, word: &Word<'_>) {
    let Some(value) = word.value() else {
        issues.push(Issue::new(
            WarningKind::MalformedToken,
            format!("cannot read '{}{}' as a number", word.letter, word.text),
        ));
        return;
    };

    if params.set(word.letter, value).is_some() {
        issues.push(Issue::new(
            WarningKind::DuplicateParameter,
            format!("parameter '{}' given more than once", word.letter),
        ));
    }
}

/// Convert tokens into a command
///
/// The first fragment (after an optional `N` line number) must start with a
/// G, M or T word, otherwise the line is not a command and nothing is returned.
pub fn tokens_to_command(tokens: &[Token<'_>], raw_line: &str) -> Lexed {
    let mut fragments = tokens
        .iter()
        .filter(|t| t.kind == TokenKind::Fragment)
        .map(|t| t.text);

    let Some(mut words) = fragments.next().and_then(split_fragment).map(Vec::into_iter) else {
        return Lexed::default();
    };

    let mut head = words.next();
    if head.as_ref().is_some_and(Word::is_line_number) {
        head = words.next();
        if head.is_none() {
            let Some(next) = fragments.next().and_then(split_fragment) else {
                return Lexed::default();
            };
            words = next.into_iter();
            head = words.next();
        }
    }

    let Some(head) = head else {
        return Lexed::default();
    };
    let Some(kind) = CommandKind::from_letter(head.letter) else {
        return Lexed::default();
    };

    let number = head.integer();
    let kind = match number {
        Some(_) => kind,
        None if kind == CommandKind::T && head.text.is_empty() => kind,
        None => CommandKind::Unknown,
    };

    let mut command = Command {
        kind,
        number,
        params: Params::new(),
        raw_line: raw_line.trim_end_matches(['\r', '\n']).to_string(),
    };
    let mut issues = Vec::new();

    if kind == CommandKind::Unknown || takes_text_argument(kind, number) {
        return Lexed {
            command: Some(command),
            issues,
        };
    }

    for word in words {
        assign(&mut command.params, &mut issues, &word);
    }

    for fragment in fragments {
        match split_fragment(fragment) {
            Some(found) => {
                for word in &found {
                    assign(&mut command.params, &mut issues, word);
                }
            }
            None => issues.push(Issue::new(
                WarningKind::MalformedToken,
                format!("dropped unreadable token '{fragment}'"),
            )),
        }
    }

    Lexed {
        command: Some(command),
        issues,
    }
}
