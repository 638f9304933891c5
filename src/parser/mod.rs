//! G-code Parser
//!
//! Line-at-a-time lexing into [`Command`] values. Never fails: garbage
//! yields no command, and recoverable problems come back as issues.

pub mod ast;
pub mod lexer;

pub use ast::{Command, CommandKind, Lexed, PARAMETER_LETTERS, Params};
pub use lexer::{Token, TokenKind, tokenize_line};

/// Parse a single line of G-code, keeping any issues found on the way
pub fn parse_line(line: &str) -> Lexed {
    let tokens = lexer::tokenize_line(line);
    ast::tokens_to_command(&tokens, line)
}

/// Parse a single line of G-code, discarding issues
pub fn lex(line: &str) -> Option<Command> {
    parse_line(line).command
}
