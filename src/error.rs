//! Error types for the Lexgate service.

use thiserror::Error;

/// Main error type for Lexgate operations.
#[derive(Error, Debug)]
pub enum LexgateError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Subscription store errors
    #[error("Subscription store error: {0}")]
    Store(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<config::ConfigError> for LexgateError {
    fn from(err: config::ConfigError) -> Self {
        LexgateError::Config(err.to_string())
    }
}

/// Result type alias for Lexgate operations.
pub type Result<T> = std::result::Result<T, LexgateError>;
