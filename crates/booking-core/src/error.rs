//! Error Types

use thiserror::Error;

/// Result type alias for core booking operations
pub type Result<T> = std::result::Result<T, BookingError>;

/// Core booking errors
#[derive(Error, Debug)]
pub enum BookingError {
    /// Record store failure (lock poisoned, corrupt document, ...)
    #[error("Storage error: {0}")]
    Storage(String),

    /// Reservation could not be encoded or decoded from a provider channel
    #[error("Codec error: {0}")]
    Codec(String),

    /// A notification channel failed to deliver
    #[error("Notification error: {0}")]
    Notification(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Filesystem error from the durable store
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
