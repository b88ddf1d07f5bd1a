use thiserror::Error;

/// Errors produced by any stage of the scan → parse → generate → write/read
/// pipeline. Each variant carries the context needed to format a
/// caller-facing diagnostic without re-deriving it from the source text.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AldaError {
    /// A lexical error: an unterminated string or an unexpected character.
    ///
    /// ```
    /// use alda::AldaError;
    /// let err = AldaError::ScanError { line: 3, column: 5, message: "unexpected character '$'".into() };
    /// assert_eq!(err.to_string(), "scan error at line 3, column 5: unexpected character '$'");
    /// ```
    #[error("scan error at line {line}, column {column}: {message}")]
    ScanError {
        line: usize,
        column: usize,
        message: String,
    },

    /// A grammar-level error: unexpected token, missing closing delimiter,
    /// malformed part declaration.
    ///
    /// ```
    /// use alda::AldaError;
    /// let err = AldaError::SyntaxError { line: 1, column: 1, message: "expected ':' after part name".into() };
    /// assert_eq!(err.to_string(), "syntax error at line 1, column 1: expected ':' after part name");
    /// ```
    #[error("syntax error at line {line}, column {column}: {message}")]
    SyntaxError {
        line: usize,
        column: usize,
        message: String,
    },

    /// A semantic error raised while lowering the AST to MIDI events:
    /// undefined variable/marker, unknown instrument or attribute, a pitch
    /// or octave outside the representable range.
    ///
    /// ```
    /// use alda::AldaError;
    /// let err = AldaError::GenerationError { line: 4, column: 10, message: "undefined variable 'theme'".into() };
    /// assert_eq!(err.to_string(), "generation error at line 4, column 10: undefined variable 'theme'");
    /// ```
    #[error("generation error at line {line}, column {column}: {message}")]
    GenerationError {
        line: usize,
        column: usize,
        message: String,
    },

    /// A malformed Standard MIDI File: truncated stream, bad chunk id, bad
    /// length, or a track that overflowed the 2^31 byte length limit.
    #[error("SMF error: {0}")]
    SmfError(String),

    /// A resource failure with no recovery path (e.g. allocation failure
    /// surfaced by an underlying allocation-fallible API).
    #[error("resource error: {0}")]
    ResourceError(String),
}

impl AldaError {
    pub fn scan(line: usize, column: usize, message: impl Into<String>) -> Self {
        AldaError::ScanError {
            line,
            column,
            message: message.into(),
        }
    }

    pub fn syntax(line: usize, column: usize, message: impl Into<String>) -> Self {
        AldaError::SyntaxError {
            line,
            column,
            message: message.into(),
        }
    }

    pub fn generation(line: usize, column: usize, message: impl Into<String>) -> Self {
        AldaError::GenerationError {
            line,
            column,
            message: message.into(),
        }
    }

    pub fn smf(message: impl Into<String>) -> Self {
        AldaError::SmfError(message.into())
    }

    /// Renders a single-line source excerpt with a caret under the offending
    /// column, for display underneath the error's own message. Computed on
    /// demand rather than stored, so error construction at throw sites stays
    /// cheap.
    pub fn caret_excerpt(&self, source: &str) -> Option<String> {
        let (line, column) = match self {
            AldaError::ScanError { line, column, .. }
            | AldaError::SyntaxError { line, column, .. }
            | AldaError::GenerationError { line, column, .. } => (*line, *column),
            AldaError::SmfError(_) | AldaError::ResourceError(_) => return None,
        };
        let excerpt = source.lines().nth(line.saturating_sub(1))?;
        let caret_col = column.saturating_sub(1);
        let mut caret_line = " ".repeat(caret_col);
        caret_line.push('^');
        Some(format!("{excerpt}\n{caret_line}"))
    }
}

pub type Result<T> = std::result::Result<T, AldaError>;
