//! Notification Error Types

use booking_core::BookingError;
use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, NotifyError>;

/// Notification channel errors
#[derive(Error, Debug)]
pub enum NotifyError {
    /// Channel credentials missing or invalid
    #[error("Configuration error: {0}")]
    Config(String),

    /// Transport failure
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The service answered but refused the message
    #[error("{service} rejected message: {detail}")]
    Rejected { service: &'static str, detail: String },
}

impl From<NotifyError> for BookingError {
    fn from(err: NotifyError) -> Self {
        match err {
            NotifyError::Config(msg) => Self::Config(msg),
            other => Self::Notification(other.to_string()),
        }
    }
}

/// Read a required, non-blank variable
pub(crate) fn required(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Result<String> {
    lookup(name)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| NotifyError::Config(format!("{name} is not set")))
}
