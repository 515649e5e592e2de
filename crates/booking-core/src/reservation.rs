//! Reservation Model
//!
//! The ride request submitted by the customer and the records built around it
//! while a checkout is pending and once it is confirmed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Placeholder rendered for fields the customer left empty
pub const NOT_PROVIDED: &str = "Not provided";

/// Ride request as submitted by the booking form.
///
/// Every field is optional and opaque: the core only round-trips it and
/// interpolates it into notifications. Numeric JSON values (passenger count,
/// service hours) are kept as their decimal text.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReservationPayload {
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub pickup_location: Option<String>,

    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub dropoff_location: Option<String>,

    /// Second dropoff for round trips
    #[serde(
        default,
        rename = "dropoffLocation2",
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub dropoff_location_2: Option<String>,

    /// Calendar date, `YYYY-MM-DD`
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub pickup_date: Option<String>,

    /// Time of day, `HH:MM`
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub pickup_time: Option<String>,

    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub num_passengers: Option<String>,

    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub ride_choice: Option<String>,

    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub flight_number: Option<String>,

    /// Hourly bookings only
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub service_hours: Option<String>,

    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub customer_first_name: Option<String>,

    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub customer_last_name: Option<String>,

    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub customer_phone_number: Option<String>,

    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub customer_email: Option<String>,
}

impl ReservationPayload {
    /// Render an optional field, falling back to [`NOT_PROVIDED`]
    pub fn display(field: Option<&String>) -> &str {
        field.map_or(NOT_PROVIDED, String::as_str)
    }

    /// Customer full name, or the placeholder when both parts are missing
    pub fn customer_name(&self) -> String {
        match (&self.customer_first_name, &self.customer_last_name) {
            (Some(first), Some(last)) => format!("{first} {last}"),
            (Some(name), None) | (None, Some(name)) => name.clone(),
            (None, None) => NOT_PROVIDED.to_string(),
        }
    }

    /// Whether the customer submitted nothing at all
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Accept strings, numbers and booleans; map `null` and blank strings to `None`.
fn lenient_string<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) if !s.trim().is_empty() => Some(s),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        Some(serde_json::Value::Bool(b)) => Some(b.to_string()),
        _ => None,
    })
}

/// Reservation waiting for its payment webhook, keyed by session key
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingCheckout {
    /// Provider-issued session key (Stripe session id, Square order id)
    pub session_key: String,

    /// What the customer asked for
    pub reservation: ReservationPayload,

    /// Charged amount in minor currency units
    pub amount_minor: i64,

    /// ISO currency code
    pub currency: String,

    pub created_at: DateTime<Utc>,
}

impl PendingCheckout {
    pub fn new(
        session_key: impl Into<String>,
        reservation: ReservationPayload,
        amount_minor: i64,
        currency: impl Into<String>,
    ) -> Self {
        Self {
            session_key: session_key.into(),
            reservation,
            amount_minor,
            currency: currency.into(),
            created_at: Utc::now(),
        }
    }

    /// Whether the entry outlived `ttl` at `now`
    pub fn is_expired(&self, now: DateTime<Utc>, ttl: chrono::Duration) -> bool {
        now - self.created_at > ttl
    }
}

/// A correlated, paid reservation handed to the notification channels
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmedReservation {
    pub session_key: String,

    pub reservation: ReservationPayload,

    /// Amount confirmed by the provider, minor units
    pub amount_minor: Option<i64>,

    pub currency: Option<String>,

    /// Provider payment status (`paid`, `COMPLETED`, ...)
    pub payment_status: Option<String>,

    /// Payment intent id or payment id, for audit
    pub payment_reference: Option<String>,
}

impl ConfirmedReservation {
    /// Amount in major units as text, e.g. `45.00`
    pub fn amount_display(&self) -> Option<String> {
        self.amount_minor.map(|minor| {
            let sign = if minor < 0 { "-" } else { "" };
            let abs = minor.unsigned_abs();
            format!("{sign}{}.{:02}", abs / 100, abs % 100)
        })
    }
}
