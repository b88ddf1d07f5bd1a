use std::fmt;

/// A line/column/filename triple identifying where a token or AST node came
/// from in the source text. Lines and columns are 1-based.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Position {
    pub line: usize,
    pub column: usize,
    pub filename: Option<String>,
}

impl Position {
    pub fn new(line: usize, column: usize, filename: Option<String>) -> Self {
        Self {
            line,
            column,
            filename,
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.filename {
            Some(name) => write!(f, "{name}:{}:{}", self.line, self.column),
            None => write!(f, "{}:{}", self.line, self.column),
        }
    }
}

/// The token alphabet (spec §4.1). Tokens carry their raw lexeme only when
/// the lexeme isn't fully determined by the kind (names, strings, numbers).
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    NoteLetter(char),  // a-g
    Rest,              // r
    Sharp,             // +
    Flat,              // -
    Natural,           // _
    OctaveSet(u32),    // o<digits>
    OctaveUp,          // >
    OctaveDown,        // <
    Number(u32),       // bare digits
    NumberMs(u32),     // digits followed by "ms"
    NumberS(f64),      // digits (optionally with a fraction) followed by "s"
    Dot,               // .
    Tie,               // ~
    Barline,           // |
    Slash,             // /
    Name(String),      // identifier
    Alias(String),     // "quoted name"
    Colon,             // :
    Equals,            // =
    LParen,            // (
    RParen,            // )
    Symbol(String),    // Lisp-mode symbol
    LispNumber(f64),   // Lisp-mode number
    LispString(String), // Lisp-mode string
    Marker(String),    // %name
    AtMarker(String),  // @name
    Voice(u32),        // V<digits>
    LCram,             // {
    RCram,             // }
    LBracket,          // [
    RBracket,          // ]
    Repeat(u32),       // *<digits>
    Repetitions(String), // '<spec>  (raw spec text, parsed by the parser)
    Newline,
    Eof,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub lexeme: String,
    pub position: Position,
}

impl Token {
    pub fn new(kind: TokenKind, lexeme: impl Into<String>, position: Position) -> Self {
        Self {
            kind,
            lexeme: lexeme.into(),
            position,
        }
    }
}
