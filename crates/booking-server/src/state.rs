//! Application State

use std::sync::Arc;

use booking_core::ReservationStore;
use booking_payments::{CheckoutInitiator, WebhookProcessor};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Checkout creation (provider + store)
    pub checkout: Arc<CheckoutInitiator>,

    /// Signature check, correlation and dispatch
    pub webhooks: Arc<WebhookProcessor>,

    /// Pending checkouts, for health output
    pub store: Arc<dyn ReservationStore>,
}
