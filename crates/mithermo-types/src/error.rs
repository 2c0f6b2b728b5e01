//! Error types for data parsing in mithermo-types.

use thiserror::Error;

/// Errors that can occur when parsing thermometer data.
///
/// This error type is platform-agnostic and does not include
/// BLE-specific errors (those belong in mithermo-core).
///
/// This enum is marked `#[non_exhaustive]` to allow adding new error variants
/// in future versions without breaking downstream code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ParseError {
    /// The payload is shorter than the format requires.
    #[error("Insufficient bytes: requires {expected} bytes, got {actual}")]
    InsufficientBytes {
        /// Minimum number of bytes the format needs.
        expected: usize,
        /// Number of bytes actually received.
        actual: usize,
    },

    /// A field holds a value that cannot be represented.
    #[error("Invalid value: {0}")]
    InvalidValue(String),
}

impl ParseError {
    /// Create an insufficient bytes error.
    pub fn insufficient(expected: usize, actual: usize) -> Self {
        Self::InsufficientBytes { expected, actual }
    }
}

/// Result type alias using mithermo-types' ParseError type.
pub type ParseResult<T> = std::result::Result<T, ParseError>;
