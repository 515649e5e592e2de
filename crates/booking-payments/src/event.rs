//! Payment Events
//!
//! Parses verified webhook bodies into one provider-neutral [`PaymentEvent`].
//!
//! ```text
//! Stripe: { type: "checkout.session.completed",
//!           data: { object: { id, metadata, amount_total, currency,
//!                             payment_intent, payment_status } } }
//! Square: { type: "payment.created",
//!           data: { object: { payment: { id, order_id, note, status,
//!                                        buyer_email_address, amount_money } } } }
//! ```

use std::collections::HashMap;

use booking_core::ReservationPayload;
use booking_core::codec::{decode_metadata, decode_note};
use serde::Deserialize;

use crate::error::{PaymentError, Result};

/// Event types we act on
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EventKind {
    /// Stripe hosted checkout finished
    CheckoutCompleted,

    /// Stripe delayed payment method (bank debit, voucher) settled after checkout
    AsyncPaymentSucceeded,

    /// Square payment created for a payment link order
    PaymentCreated,

    /// Connectivity check from the provider dashboard; acknowledged, no effect
    TestNotification,
}

impl EventKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "checkout.session.completed" => Some(Self::CheckoutCompleted),
            "checkout.session.async_payment_succeeded" => Some(Self::AsyncPaymentSucceeded),
            "payment.created" => Some(Self::PaymentCreated),
            "test.notification" => Some(Self::TestNotification),
            _ => None,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CheckoutCompleted => "checkout.session.completed",
            Self::AsyncPaymentSucceeded => "checkout.session.async_payment_succeeded",
            Self::PaymentCreated => "payment.created",
            Self::TestNotification => "test.notification",
        }
    }

    /// Whether this type confirms a payment
    pub const fn is_payment(self) -> bool {
        matches!(
            self,
            Self::CheckoutCompleted | Self::AsyncPaymentSucceeded | Self::PaymentCreated
        )
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reservation carried inside the event itself
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EmbeddedReservation {
    /// Lossless JSON blob from session metadata
    Metadata(ReservationPayload),

    /// Best-effort parse of the payment note
    Note(ReservationPayload),
}

/// Provider-neutral view of a verified webhook
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PaymentEvent {
    /// Provider event id, for logs
    pub event_id: Option<String>,

    pub kind: EventKind,

    /// Stripe session id or Square order id
    pub session_key: Option<String>,

    pub payment_status: Option<String>,

    pub amount_minor: Option<i64>,

    pub currency: Option<String>,

    /// Payment intent id (Stripe) or payment id (Square)
    pub payment_reference: Option<String>,

    pub buyer_email: Option<String>,

    pub embedded: Option<EmbeddedReservation>,
}

#[derive(Deserialize)]
struct RawEvent {
    #[serde(rename = "type", alias = "event_type")]
    kind: Option<String>,
    #[serde(alias = "event_id")]
    id: Option<String>,
    data: Option<RawData>,
}

#[derive(Deserialize)]
struct RawData {
    object: Option<RawObject>,
}

/// Union of the Stripe checkout session and the Square payment wrapper
#[derive(Deserialize)]
struct RawObject {
    id: Option<String>,
    metadata: Option<HashMap<String, String>>,
    amount_total: Option<i64>,
    currency: Option<String>,
    payment_intent: Option<serde_json::Value>,
    payment_status: Option<String>,
    customer_email: Option<String>,
    customer_details: Option<RawCustomerDetails>,
    payment: Option<RawPayment>,
}

#[derive(Deserialize)]
struct RawCustomerDetails {
    email: Option<String>,
}

#[derive(Deserialize)]
struct RawPayment {
    id: Option<String>,
    order_id: Option<String>,
    note: Option<String>,
    status: Option<String>,
    buyer_email_address: Option<String>,
    amount_money: Option<RawMoney>,
}

#[derive(Deserialize)]
struct RawMoney {
    amount: Option<i64>,
    currency: Option<String>,
}

impl PaymentEvent {
    /// Parse a webhook body.
    ///
    /// The type gate runs first: an unknown type is rejected without looking
    /// at the rest of the payload.
    pub fn from_slice(raw: &[u8]) -> Result<Self> {
        let event: RawEvent = serde_json::from_slice(raw)
            .map_err(|e| PaymentError::Validation(format!("Malformed webhook payload: {e}")))?;

        let kind_name = event
            .kind
            .ok_or_else(|| PaymentError::Validation("Webhook payload has no event type".into()))?;
        let kind = EventKind::parse(&kind_name)
            .ok_or_else(|| PaymentError::UnrecognizedEvent(kind_name.clone()))?;

        let mut parsed = Self {
            event_id: event.id,
            kind,
            session_key: None,
            payment_status: None,
            amount_minor: None,
            currency: None,
            payment_reference: None,
            buyer_email: None,
            embedded: None,
        };

        if !kind.is_payment() {
            return Ok(parsed);
        }

        let object = event
            .data
            .and_then(|d| d.object)
            .ok_or_else(|| PaymentError::Validation("Invalid payment data received.".into()))?;

        match kind {
            EventKind::CheckoutCompleted | EventKind::AsyncPaymentSucceeded => {
                parsed.fill_from_session(object);
            }
            EventKind::PaymentCreated => parsed.fill_from_payment(object)?,
            EventKind::TestNotification => {}
        }

        Ok(parsed)
    }

    /// Checkout finished but a delayed payment method has not settled yet.
    ///
    /// Stripe follows up with `checkout.session.async_payment_succeeded`.
    pub fn awaits_payment(&self) -> bool {
        self.kind == EventKind::CheckoutCompleted && self.payment_status.as_deref() == Some("unpaid")
    }

    fn fill_from_session(&mut self, session: RawObject) {
        self.session_key = session.id;
        self.payment_status = session.payment_status;
        self.amount_minor = session.amount_total;
        self.currency = session.currency;
        self.payment_reference = session.payment_intent.and_then(|pi| match pi {
            serde_json::Value::String(id) => Some(id),
            serde_json::Value::Object(obj) => obj.get("id").and_then(|v| v.as_str()).map(String::from),
            _ => None,
        });
        self.buyer_email = session
            .customer_details
            .and_then(|d| d.email)
            .or(session.customer_email);

        if let Some(metadata) = session.metadata {
            match decode_metadata(&metadata) {
                Ok(Some(reservation)) => self.embedded = Some(EmbeddedReservation::Metadata(reservation)),
                Ok(None) => {}
                Err(e) => tracing::warn!(error = %e, "Ignoring undecodable reservation metadata"),
            }
        }
    }

    fn fill_from_payment(&mut self, object: RawObject) -> Result<()> {
        let payment = object
            .payment
            .ok_or_else(|| PaymentError::Validation("Invalid payment data received.".into()))?;

        self.session_key = payment.order_id;
        self.payment_status = payment.status;
        self.payment_reference = payment.id;
        self.buyer_email = payment.buyer_email_address;
        if let Some(money) = payment.amount_money {
            self.amount_minor = money.amount;
            self.currency = money.currency;
        }

        if let Some(note) = payment.note.filter(|n| !n.trim().is_empty()) {
            let reservation = decode_note(&note);
            if !reservation.is_empty() {
                self.embedded = Some(EmbeddedReservation::Note(reservation));
            }
        }
        Ok(())
    }
}
