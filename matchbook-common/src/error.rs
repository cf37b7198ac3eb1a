//! Common error types for Matchbook

use thiserror::Error;

/// Common result type for Matchbook operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across the capture pipeline
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Captured payload did not have the expected shape
    #[error("Classification error: {0}")]
    Classification(String),

    /// A work item reached a worker with no registered handler
    #[error("Dispatch error: no handler registered for `{0}`")]
    Dispatch(String),

    /// Network, status or validation failure while fetching a photo asset
    #[error("Fetch error: {0}")]
    Fetch(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}
