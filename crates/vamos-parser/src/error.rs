//! Parser error types

use thiserror::Error;
use vamos_core::Span;

#[derive(Debug, Error, Clone)]
pub enum ParseError {
    #[error("Unexpected token at position {position}: expected {expected}, found {found}")]
    UnexpectedToken {
        position: usize,
        expected: String,
        found: String,
    },

    #[error("Unexpected end of input")]
    UnexpectedEof,

    #[error("Unsubstituted placeholder '@{name}' at position {position}")]
    UnsubstitutedPlaceholder { position: usize, name: String },

    #[error("Invalid integer literal: {0}")]
    InvalidInteger(String),

    #[error("{message}")]
    Custom { span: Span, message: String },
}

impl ParseError {
    pub fn custom(span: Span, message: impl Into<String>) -> Self {
        ParseError::Custom {
            span,
            message: message.into(),
        }
    }

    /// Byte offset the error points at, when one is known.
    pub fn position(&self) -> Option<usize> {
        match self {
            ParseError::UnexpectedToken { position, .. } => Some(*position),
            ParseError::UnsubstitutedPlaceholder { position, .. } => Some(*position),
            ParseError::Custom { span, .. } => Some(span.start),
            _ => None,
        }
    }
}

pub type ParseResult<T> = Result<T, ParseError>;
