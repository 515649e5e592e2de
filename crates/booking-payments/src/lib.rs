//! # booking-payments
//!
//! Hosted checkout and payment webhooks for ride-booking.
//!
//! ## Flow
//!
//! ```text
//! ┌─────────────┐  create   ┌─────────────────┐  pays   ┌─────────────┐
//! │ Booking page│──────────▶│ Provider hosted │────────▶│  Provider   │
//! │ (price +    │ checkout  │  checkout page  │         │  webhook    │
//! │ reservation)│           └─────────────────┘         └──────┬──────┘
//! └──────┬──────┘                                              │
//!        │ put(session key → reservation)                      │ signed event
//!        ▼                                                     ▼
//! ┌─────────────┐        take(session key), exactly once ┌─────────────┐
//! │ Reservation │◀───────────────────────────────────────│  Webhook    │
//! │    store    │                                        │  processor  │
//! └─────────────┘                                        └──────┬──────┘
//!                                                               │ dispatch
//!                                                               ▼
//!                                                        email / SMS / log
//! ```
//!
//! Two providers are supported:
//!
//! - **Stripe Checkout**: reservation travels in session metadata
//!   (lossless), webhooks signed with `stripe-signature`.
//! - **Square payment links**: reservation travels in the payment note
//!   (`Label: value, ...`), webhooks signed with
//!   `x-square-hmacsha256-signature`.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use booking_payments::{CheckoutInitiator, CheckoutRequest, StripeConfig, StripeProvider};
//!
//! let provider = Arc::new(StripeProvider::new(&StripeConfig::from_env()?));
//! let initiator = CheckoutInitiator::new(provider, store.clone());
//!
//! let session = initiator.create_checkout(request).await?;
//!
//! // Redirect the customer to: session.checkout_url
//! ```

mod checkout;
mod error;
mod event;
mod providers;
mod signature;
mod webhook;

pub use checkout::{CheckoutInitiator, CheckoutRequest, CheckoutSession, DEFAULT_CURRENCY, to_minor_units};
pub use error::{PaymentError, Result};
pub use event::{EmbeddedReservation, EventKind, PaymentEvent};
pub use providers::{
    CheckoutOrder, LINE_ITEM_NAME, MockPaymentProvider, PaymentProvider, ProviderSession,
    SquareConfig, SquareProvider, StripeConfig, StripeProvider,
};
pub use signature::{
    DEFAULT_TOLERANCE_SECS, SQUARE_SIGNATURE_HEADER, STRIPE_SIGNATURE_HEADER, SignatureScheme,
    WebhookAuthenticator,
};
pub use webhook::{PaymentCorrelator, WebhookOutcome, WebhookProcessor};
