//! Error kinds for the intrinsic-function subsystem.
//!
//! All three kinds are fatal to the payload-template evaluation that
//! triggered them; the engine converts them into an execution error.

use thiserror::Error;

use crate::token::Token;

/// The scanner hit something it cannot tokenize. Offsets are character
/// positions into the single-line source.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ScanError {
    #[error("unterminated string at {offset}")]
    UnterminatedString { offset: usize },

    #[error("unterminated selector at {offset}, expected ']'")]
    UnterminatedSelector { offset: usize },

    #[error("member name must begin with a letter or underscore at {offset}")]
    InvalidMemberName { offset: usize },

    #[error("wildcard selector must be '[*]' at {offset}")]
    MalformedWildcard { offset: usize },

    #[error("number at {offset} exceeds the supported precision")]
    InvalidNumber { offset: usize },

    #[error("unrecognized character '{character}' at {offset}")]
    UnrecognizedCharacter { character: char, offset: usize },
}

/// The parser encountered an unrecoverable error at `token`.
#[derive(Debug, Clone, Error, PartialEq)]
#[error("{message} (at '{}', offset {})", token.lexeme, token.start)]
pub struct ParseError {
    pub token: Token,
    pub message: String,
}

impl ParseError {
    pub fn new(token: Token, message: impl Into<String>) -> Self {
        Self {
            token,
            message: message.into(),
        }
    }
}

/// Evaluation failed. Carries the offending token when one is known.
#[derive(Debug, Clone, Error, PartialEq)]
#[error("{message}{}", token.as_ref().map(|t| format!(" (at '{}', offset {})", t.lexeme, t.start)).unwrap_or_default())]
pub struct RuntimeError {
    pub token: Option<Token>,
    pub message: String,
}

impl RuntimeError {
    pub fn new(token: Token, message: impl Into<String>) -> Self {
        Self {
            token: Some(token),
            message: message.into(),
        }
    }

    /// A runtime error raised inside a built-in, with no source position.
    pub fn bare(message: impl Into<String>) -> Self {
        Self {
            token: None,
            message: message.into(),
        }
    }
}

/// Any failure while scanning, parsing, or interpreting an intrinsic call.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum IntrinsicError {
    #[error(transparent)]
    Scan(#[from] ScanError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Runtime(#[from] RuntimeError),

    #[error("expected an expression, found nothing")]
    EmptySource,
}
