//! Payment Provider Strategy Pattern
//!
//! A common interface over hosted-checkout providers (Stripe Checkout,
//! Square payment links). The checkout initiator only talks to this trait.

mod mock;
mod square;
mod stripe;

pub use self::mock::MockPaymentProvider;
pub use self::square::{SquareConfig, SquareProvider};
pub use self::stripe::{StripeConfig, StripeProvider};

use std::collections::HashMap;

use async_trait::async_trait;
use booking_core::{ReservationChannel, ReservationPayload};

use crate::error::Result;

/// Name of the single line item on every checkout
pub const LINE_ITEM_NAME: &str = "Ride Booking";

/// What we ask the provider to charge for
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CheckoutOrder {
    /// Line item name
    pub item_name: String,

    /// Amount in minor currency units
    pub amount_minor: i64,

    /// ISO currency code
    pub currency: String,

    /// Forwarded to the provider's own idempotency mechanism
    pub idempotency_key: Option<String>,

    /// Reservation encoded for metadata-capable providers
    pub metadata: HashMap<String, String>,

    /// Reservation encoded for note-only providers
    pub note: Option<String>,

    /// Customer email, prefilled on the hosted page when known
    pub customer_email: Option<String>,
}

impl CheckoutOrder {
    pub fn new(amount_minor: i64, currency: impl Into<String>) -> Self {
        Self {
            item_name: LINE_ITEM_NAME.to_string(),
            amount_minor,
            currency: currency.into(),
            idempotency_key: None,
            metadata: HashMap::new(),
            note: None,
            customer_email: None,
        }
    }

    /// Attach the reservation in the given channel's encoding.
    ///
    /// Returns the labels of fields the provider copy could not represent.
    pub fn attach_reservation(
        &mut self,
        reservation: &ReservationPayload,
        channel: ReservationChannel,
    ) -> Result<Vec<&'static str>> {
        self.customer_email.clone_from(&reservation.customer_email);
        match channel {
            ReservationChannel::Metadata => {
                let encoded = booking_core::codec::encode_metadata(reservation)?;
                self.metadata = encoded.metadata;
                Ok(encoded.lossy_fields)
            }
            ReservationChannel::Note => {
                let encoded = booking_core::codec::encode_note(reservation);
                self.note = Some(encoded.note);
                Ok(encoded.lossy_fields)
            }
        }
    }
}

/// Provider-issued checkout session
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProviderSession {
    /// Session id (Stripe) or order id (Square); webhooks carry it back
    pub session_key: String,

    /// Hosted checkout page to redirect the customer to
    pub checkout_url: String,
}

/// Strategy trait for payment providers
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    /// Provider name (e.g., "stripe", "square")
    fn name(&self) -> &str;

    /// How this provider carries the reservation back in its webhooks
    fn reservation_channel(&self) -> ReservationChannel;

    /// Mint a hosted checkout session for one order
    async fn create_checkout_session(&self, order: &CheckoutOrder) -> Result<ProviderSession>;
}
