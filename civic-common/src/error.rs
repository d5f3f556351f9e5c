//! Common error types for the civic services

use thiserror::Error;

/// Common result type for civic operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across the civic services
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[cfg(feature = "sqlx")]
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Requested resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid user input or request parameter.
    ///
    /// Raised before any state is mutated.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Actor lacks the privilege or ownership required for the action
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}
