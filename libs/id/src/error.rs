//! Error types for identifier parsing and validation.

use thiserror::Error;

/// Errors that can occur when parsing or validating identifiers.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IdError {
    /// The identifier string is empty.
    #[error("{kind} cannot be empty")]
    Empty { kind: &'static str },

    /// The identifier contains a path separator.
    #[error("{kind} '{value}' must not contain '/'")]
    PathSeparator { kind: &'static str, value: String },
}

impl IdError {
    /// Returns true if this error indicates the input was empty.
    pub fn is_empty(&self) -> bool {
        matches!(self, IdError::Empty { .. })
    }
}
