//! G-code Lexer
//!
//! Fast, simple tokenization of G-code lines.
//! Comments and checksums are split off here; word parsing happens in `ast`.

/// Token types in a G-code line
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TokenKind {
    /// Run of text between whitespace and comments, e.g. "G1" or "X10Y10"
    Fragment,
    /// Comment (semicolon or parenthetical)
    Comment,
    /// Checksum suffix such as "*57"
    Checksum,
}

/// A token borrowing its text from the line
#[derive(Debug, Clone, PartialEq)]
pub struct Token<'a> {
    pub kind: TokenKind,
    pub text: &'a str,
}

/// Tokenize a line of G-code
///
/// A parenthetical comment acts as whitespace, so `X10(note)Y10` yields two
/// fragments. An unbalanced `(` swallows the rest of the line.
pub fn tokenize_line(line: &str) -> Vec<Token<'_>> {
    let mut tokens = Vec::new();
    let mut chars = line.char_indices().peekable();

    while let Some((start_idx, ch)) = chars.next() {
        match ch {
            c if c.is_ascii_whitespace() => continue,

            // Semicolon comment: consume rest of line
            ';' => {
                tokens.push(Token {
                    kind: TokenKind::Comment,
                    text: &line[start_idx..],
                });
                break;
            }

            // Host checksum: nothing after it belongs to the command
            '*' => {
                tokens.push(Token {
                    kind: TokenKind::Checksum,
                    text: &line[start_idx..],
                });
                break;
            }

            // Parenthetical comment
            '(' => {
                let mut end_idx = line.len();

                for (idx, ch) in chars.by_ref() {
                    if ch == ')' {
                        end_idx = idx + 1;
                        break;
                    }
                }

                tokens.push(Token {
                    kind: TokenKind::Comment,
                    text: &line[start_idx..end_idx],
                });
            }

            _ => {
                let mut end_idx = start_idx + ch.len_utf8();

                while let Some(&(idx, next_ch)) = chars.peek() {
                    if next_ch.is_ascii_whitespace() || matches!(next_ch, ';' | '(' | '*') {
                        break;
                    }
                    end_idx = idx + next_ch.len_utf8();
                    chars.next();
                }

                tokens.push(Token {
                    kind: TokenKind::Fragment,
                    text: &line[start_idx..end_idx],
                });
            }
        }
    }

    tokens
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fragments<'a>(tokens: &[Token<'a>]) -> Vec<&'a str> {
        tokens
            .iter()
            .filter(|t| t.kind == TokenKind::Fragment)
            .map(|t| t.text)
            .collect()
    }

    #[test]
    fn test_tokenize_simple_command() {
        let tokens = tokenize_line("G1 X10 Y20");

        assert_eq!(tokens.len(), 3);
        assert_eq!(tokens[0].kind, TokenKind::Fragment);
        assert_eq!(tokens[0].text, "G1");
        assert_eq!(tokens[2].text, "Y20");
    }

    #[test]
    fn test_tokenize_with_semicolon_comment() {
        let tokens = tokenize_line("G1 X10 ; move to X10");

        assert_eq!(tokens.len(), 3);
        assert_eq!(tokens[2].kind, TokenKind::Comment);
        assert_eq!(tokens[2].text, "; move to X10");
    }

    #[test]
    fn test_paren_comment_separates_glued_words() {
        let tokens = tokenize_line("G1 X10(rapid move)Y10");

        assert_eq!(fragments(&tokens), vec!["G1", "X10", "Y10"]);
        assert_eq!(tokens[2].kind, TokenKind::Comment);
        assert_eq!(tokens[2].text, "(rapid move)");
    }

    #[test]
    fn test_unbalanced_paren_discards_rest() {
        let tokens = tokenize_line("G1 X10 (never closed Y20");

        assert_eq!(fragments(&tokens), vec!["G1", "X10"]);
        assert_eq!(tokens.last().unwrap().text, "(never closed Y20");
    }

    #[test]
    fn test_semicolon_inside_paren_is_part_of_comment() {
        let tokens = tokenize_line("G1 (a;b) X5");
        assert_eq!(fragments(&tokens), vec!["G1", "X5"]);
    }

    #[test]
    fn test_checksum_ends_line() {
        let tokens = tokenize_line("N12 G1 X5*87");

        assert_eq!(fragments(&tokens), vec!["N12", "G1", "X5"]);
        assert_eq!(tokens.last().unwrap().kind, TokenKind::Checksum);
    }

    #[test]
    fn test_tokenize_empty_and_crlf_lines() {
        assert!(tokenize_line("   ").is_empty());
        assert_eq!(fragments(&tokenize_line("G28\r\n")), vec!["G28"]);
    }
}
