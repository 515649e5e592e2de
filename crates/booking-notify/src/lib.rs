//! # booking-notify
//!
//! Notification channels for confirmed ride reservations.
//!
//! ## Channels
//!
//! - **Email**: Brevo transactional email with an `.ics` invite attached
//! - **SMS**: Vonage one-line summary
//! - **Log**: tracing output, used when nothing else is configured
//!
//! ## Usage
//!
//! ```rust,ignore
//! use booking_notify::{EmailNotifier, SmsNotifier};
//!
//! let dispatcher = Dispatcher::new()
//!     .with(Arc::new(EmailNotifier::from_env()?))
//!     .with(Arc::new(SmsNotifier::from_env()?));
//! ```

pub mod calendar;
pub mod email;
pub mod error;
pub mod log;
pub mod sms;

pub use calendar::CalendarInvite;
pub use email::{BrevoConfig, EmailNotifier};
pub use error::{NotifyError, Result};
pub use log::LogNotifier;
pub use sms::{SmsNotifier, VonageConfig};
