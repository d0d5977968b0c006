//! Error types for the Throttlegate service.

use thiserror::Error;

use crate::store::StoreError;

/// Main error type for Throttlegate operations.
#[derive(Error, Debug)]
pub enum ThrottleError {
    /// Limiter settings rejected at construction time
    #[error("invalid configuration values: {0}")]
    InvalidConfiguration(String),

    /// A limit class name that maps to no configured quota
    #[error("unknown limit type: {0}")]
    UnknownLimitClass(String),

    /// Failure talking to the shared counter store
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Configuration loading errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for Throttlegate operations.
pub type Result<T> = std::result::Result<T, ThrottleError>;
