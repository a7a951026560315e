//! Common error types for OpenHedge

use thiserror::Error;

/// Common error type used across OpenHedge crates
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Invalid input was provided
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A key could not be parsed
    #[error("Invalid key '{0}': expected 64 hex characters")]
    InvalidKey(String),

    /// Arithmetic left the representable range of u64 minor units
    #[error("Arithmetic overflow: {0}")]
    Overflow(String),
}

/// Result type alias using the common Error type
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create an invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create an overflow error
    pub fn overflow(msg: impl Into<String>) -> Self {
        Self::Overflow(msg.into())
    }
}
