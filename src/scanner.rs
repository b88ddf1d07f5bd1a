//! Lexical scanner for Alda source text.
//!
//! Scanning runs in one of two modes, switched by a shared paren-depth
//! counter: *normal* mode recognizes notes, rests, octave/rhythm syntax,
//! and structural punctuation; *Lisp* mode (entered on `(` and left on the
//! matching `)`) recognizes whitespace-separated symbols, numbers, and
//! strings for S-expression attribute calls such as `(tempo 60)`.

use crate::error::{AldaError, Result};
use crate::token::{Position, Token, TokenKind};
use log::trace;

pub struct Scanner<'a> {
    chars: Vec<char>,
    pos: usize,
    line: usize,
    column: usize,
    filename: Option<&'a str>,
    paren_depth: u32,
}

impl<'a> Scanner<'a> {
    pub fn new(source: &'a str, filename: Option<&'a str>) -> Self {
        Self {
            chars: source.chars().collect(),
            pos: 0,
            line: 1,
            column: 1,
            filename,
            paren_depth: 0,
        }
    }

    fn position(&self) -> Position {
        Position::new(self.line, self.column, self.filename.map(|s| s.to_string()))
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.chars.get(self.pos).copied()?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn error(&self, message: impl Into<String>) -> AldaError {
        AldaError::scan(self.line, self.column, message)
    }

    /// Runs the scanner to completion, returning the token stream terminated
    /// by an `Eof` token. Returns the first lexical error encountered and
    /// halts there, consistent with the rest of the pipeline's
    /// first-error-wins policy.
    pub fn scan(mut self) -> Result<Vec<Token>> {
        let mut tokens = Vec::new();
        loop {
            self.skip_whitespace_and_comments();
            let Some(c) = self.peek() else {
                tokens.push(Token::new(TokenKind::Eof, "", self.position()));
                break;
            };
            let start = self.position();
            let token = if self.paren_depth > 0 {
                self.scan_lisp_token(start)?
            } else {
                self.scan_normal_token(start)?
            };
            trace!("scanned {:?}", token.kind);
            tokens.push(token);
        }
        Ok(tokens)
    }

    fn skip_whitespace_and_comments(&mut self) {
        loop {
            match self.peek() {
                Some(' ') | Some('\t') | Some('\r') => {
                    self.advance();
                }
                Some('#') => {
                    while let Some(c) = self.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.advance();
                    }
                }
                _ => break,
            }
        }
    }

    fn scan_normal_token(&mut self, start: Position) -> Result<Token> {
        let c = self.advance().expect("checked by caller");
        match c {
            '\n' => Ok(Token::new(TokenKind::Newline, "\n", start)),
            '|' => Ok(Token::new(TokenKind::Barline, "|", start)),
            '/' => Ok(Token::new(TokenKind::Slash, "/", start)),
            '+' => Ok(Token::new(TokenKind::Sharp, "+", start)),
            '-' => Ok(Token::new(TokenKind::Flat, "-", start)),
            '_' => Ok(Token::new(TokenKind::Natural, "_", start)),
            '>' => Ok(Token::new(TokenKind::OctaveUp, ">", start)),
            '<' => Ok(Token::new(TokenKind::OctaveDown, "<", start)),
            '.' => Ok(Token::new(TokenKind::Dot, ".", start)),
            '~' => Ok(Token::new(TokenKind::Tie, "~", start)),
            ':' => Ok(Token::new(TokenKind::Colon, ":", start)),
            '=' => Ok(Token::new(TokenKind::Equals, "=", start)),
            '{' => Ok(Token::new(TokenKind::LCram, "{", start)),
            '}' => Ok(Token::new(TokenKind::RCram, "}", start)),
            '[' => Ok(Token::new(TokenKind::LBracket, "[", start)),
            ']' => Ok(Token::new(TokenKind::RBracket, "]", start)),
            '(' => {
                self.paren_depth += 1;
                Ok(Token::new(TokenKind::LParen, "(", start))
            }
            ')' => {
                Err(self.error("unmatched ')' in normal mode"))
            }
            '"' => self.scan_alias(start),
            '%' => self.scan_name_after_sigil(start, true),
            '@' => self.scan_name_after_sigil(start, false),
            '*' => self.scan_repeat(start),
            '\'' => self.scan_repetitions(start),
            'V' if self.peek().is_some_and(|c| c.is_ascii_digit()) => self.scan_voice(start),
            'r' if !self.peek().is_some_and(|c| c.is_alphabetic()) => {
                Ok(Token::new(TokenKind::Rest, "r", start))
            }
            'o' if self.peek().is_some_and(|c| c.is_ascii_digit()) => self.scan_octave_set(start),
            'a'..='g' if !self.peek().is_some_and(|c| c.is_alphabetic()) => {
                Ok(Token::new(TokenKind::NoteLetter(c), c.to_string(), start))
            }
            c if c.is_ascii_digit() => self.scan_number(c, start),
            c if c.is_alphabetic() || c == '_' => self.scan_name(c, start),
            other => Err(self.error(format!("unexpected character '{other}'"))),
        }
    }

    fn scan_alias(&mut self, start: Position) -> Result<Token> {
        let mut s = String::new();
        loop {
            match self.advance() {
                Some('"') => return Ok(Token::new(TokenKind::Alias(s.clone()), s, start)),
                Some(c) => s.push(c),
                None => return Err(self.error("unterminated string")),
            }
        }
    }

    fn scan_name_after_sigil(&mut self, start: Position, is_marker: bool) -> Result<Token> {
        let mut name = String::new();
        while let Some(c) = self.peek() {
            if c.is_alphanumeric() || c == '_' || c == '-' {
                name.push(c);
                self.advance();
            } else {
                break;
            }
        }
        if name.is_empty() {
            return Err(self.error(format!(
                "expected a name after '{}'",
                if is_marker { '%' } else { '@' }
            )));
        }
        let kind = if is_marker {
            TokenKind::Marker(name.clone())
        } else {
            TokenKind::AtMarker(name.clone())
        };
        Ok(Token::new(kind, name, start))
    }

    fn scan_repeat(&mut self, start: Position) -> Result<Token> {
        let mut digits = String::new();
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() {
                digits.push(c);
                self.advance();
            } else {
                break;
            }
        }
        if digits.is_empty() {
            return Err(self.error("expected a repeat count after '*'"));
        }
        let n: u32 = digits
            .parse()
            .map_err(|_| self.error("repeat count out of range"))?;
        Ok(Token::new(TokenKind::Repeat(n), digits, start))
    }

    fn scan_repetitions(&mut self, start: Position) -> Result<Token> {
        let mut spec = String::new();
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() || c == ',' || c == '-' {
                spec.push(c);
                self.advance();
            } else {
                break;
            }
        }
        if spec.is_empty() {
            return Err(self.error("expected a repetition specifier after '''"));
        }
        Ok(Token::new(TokenKind::Repetitions(spec.clone()), spec, start))
    }

    fn scan_voice(&mut self, start: Position) -> Result<Token> {
        let mut digits = String::new();
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() {
                digits.push(c);
                self.advance();
            } else {
                break;
            }
        }
        if self.peek() == Some(':') {
            self.advance();
        }
        let n: u32 = digits
            .parse()
            .map_err(|_| self.error("voice number out of range"))?;
        Ok(Token::new(TokenKind::Voice(n), format!("V{digits}"), start))
    }

    fn scan_octave_set(&mut self, start: Position) -> Result<Token> {
        let mut digits = String::new();
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() {
                digits.push(c);
                self.advance();
            } else {
                break;
            }
        }
        let n: u32 = digits
            .parse()
            .map_err(|_| self.error("octave value out of range"))?;
        Ok(Token::new(TokenKind::OctaveSet(n), format!("o{digits}"), start))
    }

    fn scan_number(&mut self, first: char, start: Position) -> Result<Token> {
        let mut digits = String::new();
        digits.push(first);
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() {
                digits.push(c);
                self.advance();
            } else {
                break;
            }
        }
        // A trailing "ms" or "s" (not itself followed by another letter)
        // upgrades this length token to an explicit-duration one.
        if self.peek() == Some('m') && self.peek_at(1) == Some('s') && !self.followed_by_alpha(2) {
            self.advance();
            self.advance();
            let n: u32 = digits
                .parse()
                .map_err(|_| self.error("millisecond length out of range"))?;
            return Ok(Token::new(TokenKind::NumberMs(n), format!("{digits}ms"), start));
        }
        if self.peek() == Some('s') && !self.followed_by_alpha(1) {
            self.advance();
            let n: f64 = digits
                .parse()
                .map_err(|_| self.error("second length out of range"))?;
            return Ok(Token::new(TokenKind::NumberS(n), format!("{digits}s"), start));
        }
        let n: u32 = digits
            .parse()
            .map_err(|_| self.error("number out of range"))?;
        Ok(Token::new(TokenKind::Number(n), digits, start))
    }

    fn followed_by_alpha(&self, offset: usize) -> bool {
        self.peek_at(offset).is_some_and(|c| c.is_alphanumeric())
    }

    fn scan_name(&mut self, first: char, start: Position) -> Result<Token> {
        let mut name = String::new();
        name.push(first);
        while let Some(c) = self.peek() {
            if c.is_alphanumeric() || c == '_' || c == '-' {
                name.push(c);
                self.advance();
            } else {
                break;
            }
        }
        Ok(Token::new(TokenKind::Name(name.clone()), name, start))
    }

    fn scan_lisp_token(&mut self, start: Position) -> Result<Token> {
        let c = self.advance().expect("checked by caller");
        match c {
            '\n' => Ok(Token::new(TokenKind::Newline, "\n", start)),
            '(' => {
                self.paren_depth += 1;
                Ok(Token::new(TokenKind::LParen, "(", start))
            }
            ')' => {
                self.paren_depth -= 1;
                Ok(Token::new(TokenKind::RParen, ")", start))
            }
            '"' => {
                let mut s = String::new();
                loop {
                    match self.advance() {
                        Some('\\') => match self.advance() {
                            Some('n') => s.push('\n'),
                            Some('t') => s.push('\t'),
                            Some(other) => s.push(other),
                            None => return Err(self.error("unterminated string")),
                        },
                        Some('"') => return Ok(Token::new(TokenKind::LispString(s.clone()), s, start)),
                        Some(other) => s.push(other),
                        None => return Err(self.error("unterminated string")),
                    }
                }
            }
            '-' if self.peek().is_some_and(|c| c.is_ascii_digit()) => {
                self.scan_lisp_number(true, start)
            }
            c if c.is_ascii_digit() => {
                self.pos -= 1;
                self.column -= 1;
                self.scan_lisp_number(false, start)
            }
            c if is_symbol_char(c) => {
                let mut sym = String::new();
                sym.push(c);
                while let Some(c) = self.peek() {
                    if is_symbol_char(c) || c.is_ascii_digit() {
                        sym.push(c);
                        self.advance();
                    } else {
                        break;
                    }
                }
                Ok(Token::new(TokenKind::Symbol(sym.clone()), sym, start))
            }
            other => Err(self.error(format!("unexpected character '{other}' in S-expression"))),
        }
    }

    fn scan_lisp_number(&mut self, negative: bool, start: Position) -> Result<Token> {
        let mut text = String::new();
        if negative {
            text.push('-');
            self.advance();
        }
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() {
                text.push(c);
                self.advance();
            } else {
                break;
            }
        }
        if self.peek() == Some('.') && self.peek_at(1).is_some_and(|c| c.is_ascii_digit()) {
            text.push('.');
            self.advance();
            while let Some(c) = self.peek() {
                if c.is_ascii_digit() {
                    text.push(c);
                    self.advance();
                } else {
                    break;
                }
            }
        }
        let n: f64 = text
            .parse()
            .map_err(|_| self.error("malformed number in S-expression"))?;
        Ok(Token::new(TokenKind::LispNumber(n), text, start))
    }
}

fn is_symbol_char(c: char) -> bool {
    c.is_alphabetic() || "!?+-*/_<>=.:".contains(c)
}

/// Scans `source` to a token stream. See [`Scanner`] for the two-mode
/// lexing rules.
pub fn scan(source: &str, filename: Option<&str>) -> Result<Vec<Token>> {
    Scanner::new(source, filename).scan()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        scan(source, None)
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn test_simple_notes() {
        let ks = kinds("c d e");
        assert_eq!(
            ks,
            vec![
                TokenKind::NoteLetter('c'),
                TokenKind::NoteLetter('d'),
                TokenKind::NoteLetter('e'),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_rest_and_accidentals() {
        let ks = kinds("r4 c+ d-");
        assert_eq!(
            ks,
            vec![
                TokenKind::Rest,
                TokenKind::Number(4),
                TokenKind::NoteLetter('c'),
                TokenKind::Sharp,
                TokenKind::NoteLetter('d'),
                TokenKind::Flat,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_part_decl() {
        let ks = kinds("piano:");
        assert_eq!(
            ks,
            vec![TokenKind::Name("piano".into()), TokenKind::Colon, TokenKind::Eof]
        );
    }

    #[test]
    fn test_ms_and_s_lengths() {
        let ks = kinds("c500ms d2s");
        assert_eq!(
            ks,
            vec![
                TokenKind::NoteLetter('c'),
                TokenKind::NumberMs(500),
                TokenKind::NoteLetter('d'),
                TokenKind::NumberS(2.0),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_sexp_mode() {
        let ks = kinds("(tempo 60)");
        assert_eq!(
            ks,
            vec![
                TokenKind::LParen,
                TokenKind::Symbol("tempo".into()),
                TokenKind::LispNumber(60.0),
                TokenKind::RParen,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_negative_sexp_number() {
        let ks = kinds("(panning -1)");
        assert_eq!(
            ks,
            vec![
                TokenKind::LParen,
                TokenKind::Symbol("panning".into()),
                TokenKind::LispNumber(-1.0),
                TokenKind::RParen,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_marker_and_at_marker() {
        let ks = kinds("%here @here");
        assert_eq!(
            ks,
            vec![
                TokenKind::Marker("here".into()),
                TokenKind::AtMarker("here".into()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_bracket_repeat_and_repetitions() {
        let ks = kinds("[c d]*3'1-2");
        assert_eq!(
            ks,
            vec![
                TokenKind::LBracket,
                TokenKind::NoteLetter('c'),
                TokenKind::NoteLetter('d'),
                TokenKind::RBracket,
                TokenKind::Repeat(3),
                TokenKind::Repetitions("1-2".into()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_comment_is_skipped() {
        let ks = kinds("c # a comment\nd");
        assert_eq!(
            ks,
            vec![
                TokenKind::NoteLetter('c'),
                TokenKind::Newline,
                TokenKind::NoteLetter('d'),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_unterminated_string_errors() {
        let err = scan("\"oops", None).unwrap_err();
        match err {
            AldaError::ScanError { message, .. } => assert!(message.contains("unterminated")),
            other => panic!("expected ScanError, got {other:?}"),
        }
    }
}
