//! Payment Error Types

use booking_core::BookingError;
use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, PaymentError>;

/// Payment-related errors
#[derive(Error, Debug)]
pub enum PaymentError {
    /// Missing or malformed request fields
    #[error("Validation error: {0}")]
    Validation(String),

    /// Webhook signature missing or wrong
    #[error("Webhook signature invalid: {0}")]
    Authentication(String),

    /// No pending checkout for the event's session key
    #[error("No pending reservation for session {0}")]
    CorrelationMiss(String),

    /// Event type outside the handled set
    #[error("Unrecognized event type: {0}")]
    UnrecognizedEvent(String),

    /// Payment provider call failed
    #[error("Upstream error: {0}")]
    Upstream(String),

    /// Record store failure
    #[error("Storage error: {0}")]
    Storage(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl PaymentError {
    /// Whether the caller sent something we refuse (4xx)
    pub const fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::Validation(_)
                | Self::Authentication(_)
                | Self::CorrelationMiss(_)
                | Self::UnrecognizedEvent(_)
        )
    }

    /// Get user-friendly message.
    ///
    /// Never exposes provider or signature details.
    pub fn user_message(&self) -> &str {
        match self {
            Self::Validation(msg) => msg,
            Self::Authentication(_) => "Invalid signature",
            Self::CorrelationMiss(_) => "Reservation details not found.",
            Self::UnrecognizedEvent(_) => "Invalid event type",
            Self::Upstream(_) => "Error creating checkout. Please try again later.",
            Self::Config(_) => "Service configuration error.",
            Self::Storage(_) => "An error occurred processing your request.",
        }
    }
}

impl From<BookingError> for PaymentError {
    fn from(err: BookingError) -> Self {
        match err {
            BookingError::Codec(msg) => Self::Validation(msg),
            BookingError::Config(msg) => Self::Config(msg),
            BookingError::Notification(msg) => Self::Upstream(msg),
            other => Self::Storage(other.to_string()),
        }
    }
}
