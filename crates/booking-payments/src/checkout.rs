//! Checkout Session Initiator
//!
//! Turns a price and a reservation into a hosted checkout session and
//! remembers which reservation the session belongs to. The store write
//! happens before the checkout URL is handed back, so a webhook racing the
//! browser redirect always finds its reservation.
//!
//! Providers answer a repeated idempotency key with the session they already
//! issued. That session is not stored again: it may already have been paid
//! and claimed, and re-arming it would let a late webhook retry notify twice.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use booking_core::{PendingCheckout, ReservationPayload, ReservationStore};
use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::error::{PaymentError, Result};
use crate::providers::{CheckoutOrder, PaymentProvider};

/// Longest idempotency key every supported provider accepts
const MAX_IDEMPOTENCY_KEY_LEN: usize = 192;

/// How long providers honour an idempotency key
const IDEMPOTENCY_WINDOW_HOURS: i64 = 24;

/// Default checkout currency
pub const DEFAULT_CURRENCY: &str = "USD";

/// Request to create a checkout session, as posted by the booking page
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
    /// Price in major units (e.g. `45.00`)
    #[serde(default)]
    pub price: Option<Decimal>,

    /// Caller-supplied retry token
    #[serde(default)]
    pub idempotency_key: Option<String>,

    #[serde(default, rename = "reservationDetails")]
    pub reservation: Option<ReservationPayload>,
}

/// Result of creating a checkout session
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutSession {
    /// Provider session key
    pub session_key: String,

    /// URL to redirect the customer to
    pub checkout_url: String,

    /// Charged amount, minor units
    pub amount_minor: i64,

    pub currency: String,
}

/// Convert a major-unit price to minor units: `round(price * 100)`, halves
/// away from zero.
///
/// Anything below a cent is lost. Providers round the same way, so the
/// amount they confirm matches the one we stored.
pub fn to_minor_units(price: Decimal) -> Result<i64> {
    if price <= Decimal::ZERO {
        return Err(PaymentError::Validation("Price must be greater than zero".into()));
    }

    let minor = price
        .checked_mul(Decimal::ONE_HUNDRED)
        .map(|cents| cents.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero))
        .and_then(|cents| cents.to_i64())
        .ok_or_else(|| PaymentError::Validation("Price is out of range".into()))?;

    if minor == 0 {
        return Err(PaymentError::Validation("Price must be at least one cent".into()));
    }
    Ok(minor)
}

impl CheckoutRequest {
    /// Check required fields before anything leaves the process
    fn validate(self) -> Result<(i64, ReservationPayload, Option<String>)> {
        let (Some(price), Some(reservation)) = (self.price, self.reservation) else {
            return Err(PaymentError::Validation(
                "Missing required fields: price or reservationDetails".into(),
            ));
        };
        if reservation.is_empty() {
            return Err(PaymentError::Validation(
                "Missing required fields: reservationDetails is empty".into(),
            ));
        }

        let amount_minor = to_minor_units(price)?;

        let idempotency_key = self
            .idempotency_key
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty());
        if idempotency_key
            .as_ref()
            .is_some_and(|k| k.len() > MAX_IDEMPOTENCY_KEY_LEN)
        {
            return Err(PaymentError::Validation("idempotencyKey is too long".into()));
        }

        Ok((amount_minor, reservation, idempotency_key))
    }
}

/// Creates checkout sessions and records their reservations
pub struct CheckoutInitiator {
    provider: Arc<dyn PaymentProvider>,
    store: Arc<dyn ReservationStore>,
    currency: String,
    /// Session keys stored for idempotent requests, by issue time
    issued: Mutex<HashMap<String, DateTime<Utc>>>,
}

impl CheckoutInitiator {
    pub fn new(provider: Arc<dyn PaymentProvider>, store: Arc<dyn ReservationStore>) -> Self {
        Self {
            provider,
            store,
            currency: DEFAULT_CURRENCY.to_string(),
            issued: Mutex::new(HashMap::new()),
        }
    }

    /// Charge in another currency
    #[must_use]
    pub fn with_currency(mut self, currency: impl Into<String>) -> Self {
        self.currency = currency.into();
        self
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Create a hosted checkout session for a reservation.
    ///
    /// Nothing is stored when the provider call fails.
    pub async fn create_checkout(&self, request: CheckoutRequest) -> Result<CheckoutSession> {
        let (amount_minor, reservation, idempotency_key) = request.validate()?;

        let mut order = CheckoutOrder::new(amount_minor, self.currency.clone());
        order.idempotency_key = idempotency_key;

        let lossy = order.attach_reservation(&reservation, self.provider.reservation_channel())?;
        if !lossy.is_empty() {
            tracing::warn!(
                fields = ?lossy,
                provider = self.provider.name(),
                "Reservation fields do not fit the provider copy; the stored reservation will be used"
            );
        }

        let session = self
            .provider
            .create_checkout_session(&order)
            .await
            .inspect_err(|e| {
                tracing::error!(provider = self.provider.name(), error = %e, "Checkout creation failed");
            })?;

        let idempotent = order.idempotency_key.is_some();
        if idempotent && self.already_issued(&session.session_key)? {
            tracing::info!(
                session_key = %session.session_key,
                provider = self.provider.name(),
                "Provider replayed an existing session; reservation not stored again"
            );
        } else {
            self.store
                .put(PendingCheckout::new(
                    session.session_key.clone(),
                    reservation,
                    amount_minor,
                    self.currency.clone(),
                ))
                .await?;
            if idempotent {
                self.mark_issued(&session.session_key)?;
            }

            tracing::info!(
                session_key = %session.session_key,
                amount_minor,
                provider = self.provider.name(),
                "Stored reservation for checkout session"
            );
        }

        Ok(CheckoutSession {
            session_key: session.session_key,
            checkout_url: session.checkout_url,
            amount_minor,
            currency: self.currency.clone(),
        })
    }

    fn issued(&self) -> Result<MutexGuard<'_, HashMap<String, DateTime<Utc>>>> {
        let mut issued = self
            .issued
            .lock()
            .map_err(|_| PaymentError::Storage("issued session lock poisoned".into()))?;

        let now = Utc::now();
        let window = chrono::Duration::hours(IDEMPOTENCY_WINDOW_HOURS);
        issued.retain(|_, at| now - *at < window);
        Ok(issued)
    }

    /// Whether this session was already stored for an idempotent request
    fn already_issued(&self, session_key: &str) -> Result<bool> {
        Ok(self.issued()?.contains_key(session_key))
    }

    fn mark_issued(&self, session_key: &str) -> Result<()> {
        self.issued()?.insert(session_key.to_string(), Utc::now());
        Ok(())
    }
}
