//! Error types for fragstats-core

use thiserror::Error;

/// Main error type for the fragstats-core library
#[derive(Error, Debug)]
pub enum Error {
    /// Database error
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Timestamp embedded in a matched log line failed to parse
    #[error("invalid log timestamp {value:?}: {message}")]
    Timestamp { value: String, message: String },

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Server referenced by an event does not exist
    #[error("server not found: {0}")]
    ServerNotFound(i64),

    /// Event payload is missing required fields
    #[error("invalid event payload: {0}")]
    InvalidEvent(String),

    /// Kill feed delivery error
    #[error("feed error: {0}")]
    Feed(String),
}

/// Result type alias for fragstats-core
pub type Result<T> = std::result::Result<T, Error>;
