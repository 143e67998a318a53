//! Crate-wide error and result types

use thiserror::Error;

/// Errors produced by waymark components
#[derive(Debug, Error)]
pub enum WaymarkError {
    /// Invalid or missing configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// MongoDB connection or query failure
    #[error("Database error: {0}")]
    Database(String),

    /// Credential issuance or validation failure
    #[error("Authentication error: {0}")]
    Auth(String),

    /// HTTP request handling failure
    #[error("HTTP error: {0}")]
    Http(String),

    /// Underlying I/O failure (listener bind, socket accept)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result alias
pub type Result<T> = std::result::Result<T, WaymarkError>;
