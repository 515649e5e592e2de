//! Payment Webhook Handling
//!
//! Turns a verified payment webhook into exactly one notification.
//!
//! ```text
//! raw body + signature
//!        │
//!        ▼
//! ┌───────────────┐  reject: Authentication (no store access)
//! │ authenticate  │
//! └──────┬────────┘
//!        ▼
//! ┌───────────────┐  test.notification: ack
//! │  type gate    │  anything unknown: UnrecognizedEvent
//! └──────┬────────┘
//!        ▼
//! ┌───────────────┐  checkout done, payment unsettled: ack, entry kept
//! │ payment gate  │
//! └──────┬────────┘
//!        ▼
//! ┌───────────────┐  miss: CorrelationMiss (replays end here)
//! │ claim (take)  │
//! └──────┬────────┘
//!        ▼
//!    dispatch (spawned, failures only logged)
//! ```

use std::sync::Arc;

use booking_core::{ConfirmedReservation, Dispatcher, PendingCheckout, ReservationPayload, ReservationStore};

use crate::error::{PaymentError, Result};
use crate::event::{EmbeddedReservation, EventKind, PaymentEvent};
use crate::signature::WebhookAuthenticator;

/// What happened to an accepted webhook
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WebhookOutcome {
    /// Valid event that needs no action
    Acknowledged { kind: EventKind },

    /// Checkout finished with a payment still settling; nothing claimed
    AwaitingPayment { session_key: String },

    /// Reservation claimed and handed to the notification channels
    Dispatched { session_key: String },
}

impl WebhookOutcome {
    /// Response text for the provider
    pub const fn message(&self) -> &'static str {
        match self {
            Self::Acknowledged { .. } => "Test notification received and logged.",
            Self::AwaitingPayment { .. } => "Payment pending; awaiting confirmation",
            Self::Dispatched { .. } => "Payment confirmation received",
        }
    }
}

/// Maps payment events back to pending checkouts
pub struct PaymentCorrelator {
    store: Arc<dyn ReservationStore>,
    dispatcher: Dispatcher,
}

impl PaymentCorrelator {
    pub fn new(store: Arc<dyn ReservationStore>, dispatcher: Dispatcher) -> Self {
        Self { store, dispatcher }
    }

    pub const fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Claim the event's pending checkout and dispatch it.
    ///
    /// The claim is a single `take`, so a second delivery of the same event
    /// (or any other event for the same session) is a correlation miss.
    pub async fn correlate(&self, event: PaymentEvent) -> Result<WebhookOutcome> {
        if !event.kind.is_payment() {
            tracing::info!(event_type = %event.kind, event_id = ?event.event_id, "Acknowledged webhook");
            return Ok(WebhookOutcome::Acknowledged { kind: event.kind });
        }

        let session_key = event
            .session_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| PaymentError::Validation("Invalid payment data received.".into()))?;

        if event.awaits_payment() {
            tracing::info!(
                session_key = %session_key,
                payment_status = ?event.payment_status,
                event_id = ?event.event_id,
                "Checkout completed with payment pending; keeping reservation"
            );
            return Ok(WebhookOutcome::AwaitingPayment { session_key });
        }

        let Some(pending) = self.store.take(&session_key).await? else {
            tracing::warn!(
                session_key = %session_key,
                event_type = %event.kind,
                event_id = ?event.event_id,
                "No pending reservation for payment event"
            );
            return Err(PaymentError::CorrelationMiss(session_key));
        };

        let confirmed = resolve(event, pending);
        tracing::info!(
            session_key = %confirmed.session_key,
            amount = ?confirmed.amount_display(),
            payment_status = ?confirmed.payment_status,
            "Payment correlated"
        );

        self.dispatcher.dispatch(confirmed);
        Ok(WebhookOutcome::Dispatched { session_key })
    }
}

/// Pick the reservation and amounts to notify with
fn resolve(event: PaymentEvent, pending: PendingCheckout) -> ConfirmedReservation {
    let mut reservation = match event.embedded {
        Some(EmbeddedReservation::Metadata(from_metadata)) => from_metadata,
        Some(EmbeddedReservation::Note(from_note)) => {
            let differing = differing_fields(&from_note, &pending.reservation);
            if !differing.is_empty() {
                tracing::warn!(
                    session_key = %pending.session_key,
                    fields = ?differing,
                    "Payment note disagrees with stored reservation; using stored values"
                );
            }
            pending.reservation
        }
        None => pending.reservation,
    };

    if reservation.customer_email.is_none() {
        reservation.customer_email = event.buyer_email;
    }

    if event.amount_minor.is_some_and(|amount| amount != pending.amount_minor) {
        tracing::warn!(
            session_key = %pending.session_key,
            expected = pending.amount_minor,
            confirmed = ?event.amount_minor,
            "Confirmed amount differs from checkout amount"
        );
    }

    ConfirmedReservation {
        session_key: pending.session_key,
        reservation,
        amount_minor: event.amount_minor.or(Some(pending.amount_minor)),
        currency: event.currency.or(Some(pending.currency)),
        payment_status: event.payment_status,
        payment_reference: event.payment_reference,
    }
}

/// Labels of fields present in the note whose value differs from the stored one.
///
/// Fields absent from the note are not differences; the note drops them when
/// they carry the delimiter.
fn differing_fields(note: &ReservationPayload, stored: &ReservationPayload) -> Vec<&'static str> {
    let pairs = [
        ("pickupLocation", &note.pickup_location, &stored.pickup_location),
        ("dropoffLocation", &note.dropoff_location, &stored.dropoff_location),
        ("dropoffLocation2", &note.dropoff_location_2, &stored.dropoff_location_2),
        ("pickupDate", &note.pickup_date, &stored.pickup_date),
        ("pickupTime", &note.pickup_time, &stored.pickup_time),
        ("numPassengers", &note.num_passengers, &stored.num_passengers),
        ("rideChoice", &note.ride_choice, &stored.ride_choice),
        ("flightNumber", &note.flight_number, &stored.flight_number),
        ("serviceHours", &note.service_hours, &stored.service_hours),
        ("customerFirstName", &note.customer_first_name, &stored.customer_first_name),
        ("customerLastName", &note.customer_last_name, &stored.customer_last_name),
        ("customerPhoneNumber", &note.customer_phone_number, &stored.customer_phone_number),
        ("customerEmail", &note.customer_email, &stored.customer_email),
    ];

    pairs
        .into_iter()
        .filter(|(_, from_note, from_store)| from_note.is_some() && from_note != from_store)
        .map(|(label, _, _)| label)
        .collect()
}

/// Full webhook pipeline: authenticate, parse, correlate
pub struct WebhookProcessor {
    authenticator: WebhookAuthenticator,
    correlator: PaymentCorrelator,
}

impl WebhookProcessor {
    pub const fn new(authenticator: WebhookAuthenticator, correlator: PaymentCorrelator) -> Self {
        Self {
            authenticator,
            correlator,
        }
    }

    /// Header the signature is read from
    pub const fn header_name(&self) -> &'static str {
        self.authenticator.header_name()
    }

    pub const fn correlator(&self) -> &PaymentCorrelator {
        &self.correlator
    }

    /// Process one delivery. `body` must be the untouched request bytes.
    pub async fn process(&self, body: &[u8], signature: Option<&str>) -> Result<WebhookOutcome> {
        self.authenticator.verify(body, signature).inspect_err(|e| {
            tracing::warn!(error = %e, "Rejected webhook signature");
        })?;

        let event = PaymentEvent::from_slice(body)?;
        self.correlator.correlate(event).await
    }
}
