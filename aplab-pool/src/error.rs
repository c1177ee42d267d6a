//! Error types for aplab-pool
//!
//! Control-surface errors only. Expected media outcomes (a rejected play, a
//! missing element) are values, see [`crate::playback::media::PlayRejection`]
//! and the pool's outcome enums; they become run state and log entries.

use thiserror::Error;

/// Main error type for aplab-pool
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration file loading or validation errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Control call not allowed in the current run state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Invalid control parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// HTTP server errors
    #[error("HTTP server error: {0}")]
    Http(String),

    /// Errors bubbled up from aplab-common
    #[error(transparent)]
    Common(#[from] aplab_common::Error),
}

/// Convenience Result type using aplab-pool Error
pub type Result<T> = std::result::Result<T, Error>;
