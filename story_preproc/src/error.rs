//! Error types for evaluation and compression.
//!
//! None of these escape a pass: callers turn them into author log entries.

use thiserror::Error;

/// Failure while tokenizing, parsing or evaluating an expression.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    #[error("empty expression")]
    Empty,

    #[error("unexpected character '{0}'")]
    UnexpectedChar(char),

    #[error("unterminated string literal")]
    UnterminatedString,

    #[error("unexpected token '{0}'")]
    UnexpectedToken(String),

    #[error("unexpected end of expression")]
    UnexpectedEnd,

    #[error("unknown symbol '{0}'")]
    UnknownSymbol(String),

    #[error("expression nested deeper than {0} levels")]
    TooDeep(usize),

    #[error("expression longer than {0} tokens")]
    TooLong(usize),

    #[error("invalid regular expression: {0}")]
    InvalidRegex(String),
}

impl From<regex::Error> for EvalError {
    fn from(err: regex::Error) -> Self {
        EvalError::InvalidRegex(err.to_string())
    }
}

/// Failure while decompressing `LZ()` input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LzError {
    #[error("text is not compressed (missing header)")]
    MissingHeader,

    #[error("compressed text is corrupt at code {0}")]
    Corrupt(usize),

    #[error("decompressed data is not valid UTF-16")]
    InvalidUtf16,
}
