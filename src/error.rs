//! Typed errors raised by the conversion engine and the output validator.

use thiserror::Error;

/// Failure that aborts the conversion of a single file.
#[derive(Debug, Error)]
pub enum ConversionError {
    /// Source structure the block parser cannot recover from
    #[error("parse error at line {line}: {message}")]
    Parse { line: usize, message: String },

    /// A tree pass was scheduled after the unit was rendered to text
    #[error("pass '{pass}' requires the block tree, but the unit is already rendered")]
    PassOrder { pass: String },

    /// A rewriting rule failed to build
    #[error("invalid rule '{rule}': {message}")]
    Rule { rule: String, message: String },

    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl ConversionError {
    pub fn parse(line: usize, message: impl Into<String>) -> Self {
        ConversionError::Parse {
            line,
            message: message.into(),
        }
    }
}

/// Converted output that does not parse as target code.
#[derive(Debug, Error)]
#[error("line {line}: {message}")]
pub struct ValidationError {
    pub line: usize,
    pub message: String,
}

impl ValidationError {
    pub fn new(line: usize, message: impl Into<String>) -> Self {
        Self {
            line,
            message: message.into(),
        }
    }
}
