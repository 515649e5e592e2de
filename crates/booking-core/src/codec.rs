//! Reservation Codecs
//!
//! Providers carry the reservation back to us in one of two channels:
//!
//! - **Metadata**: a key-value map on the checkout session. The payload is a
//!   JSON blob under [`METADATA_KEY`], continued under `reservationDetails_1`,
//!   `reservationDetails_2`, ... when it exceeds [`MAX_PROVIDER_VALUE_LEN`].
//! - **Note**: a free-text note on the payment, `Label: value, Label: value`.
//!   Values are read up to the next comma, so any value containing a comma
//!   cannot be represented. Fields that would push the note past
//!   [`MAX_PROVIDER_VALUE_LEN`] are left out. The encoder reports both kinds
//!   instead of dropping them silently.
//!
//! The stored pending checkout always holds the full payload, so a lossy
//! encoding only costs the provider-side copy.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::{BookingError, Result};
use crate::reservation::ReservationPayload;

/// Metadata key holding the JSON-encoded reservation
pub const METADATA_KEY: &str = "reservationDetails";

/// Longest value Stripe metadata and Square payment notes accept, in characters
pub const MAX_PROVIDER_VALUE_LEN: usize = 500;

/// Stripe allows 50 metadata keys; leave room for the caller's own
const MAX_METADATA_CHUNKS: usize = 40;

const NOTE_DELIMITER: &str = ", ";

static NOTE_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:^|, )([A-Za-z][A-Za-z0-9 ]*?): ([^,]*)").expect("note token pattern is valid")
});

/// Channel a provider uses to carry the reservation
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReservationChannel {
    Metadata,
    Note,
}

/// Metadata map plus whether the reservation had to be left out
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncodedMetadata {
    pub metadata: HashMap<String, String>,

    /// Labels of anything that did not fit ([`METADATA_KEY`] when the blob was too long)
    pub lossy_fields: Vec<&'static str>,
}

fn chunk_key(index: usize) -> String {
    if index == 0 {
        METADATA_KEY.to_string()
    } else {
        format!("{METADATA_KEY}_{index}")
    }
}

/// Encode the reservation as provider metadata.
///
/// The JSON blob is split on character boundaries into values of at most
/// [`MAX_PROVIDER_VALUE_LEN`] characters. A blob too long even for that is
/// omitted and reported.
pub fn encode_metadata(payload: &ReservationPayload) -> Result<EncodedMetadata> {
    let blob = serde_json::to_string(payload)?;

    let chars: Vec<char> = blob.chars().collect();
    let chunks: Vec<String> = chars
        .chunks(MAX_PROVIDER_VALUE_LEN)
        .map(|chunk| chunk.iter().collect())
        .collect();

    if chunks.len() > MAX_METADATA_CHUNKS {
        return Ok(EncodedMetadata {
            metadata: HashMap::new(),
            lossy_fields: vec![METADATA_KEY],
        });
    }

    let metadata = chunks
        .into_iter()
        .enumerate()
        .map(|(index, chunk)| (chunk_key(index), chunk))
        .collect();

    Ok(EncodedMetadata {
        metadata,
        lossy_fields: Vec::new(),
    })
}

/// Decode the reservation from provider metadata.
///
/// Continuation keys are read in order until one is missing. Returns
/// `Ok(None)` when the map carries no reservation.
pub fn decode_metadata(metadata: &HashMap<String, String>) -> Result<Option<ReservationPayload>> {
    let Some(first) = metadata.get(METADATA_KEY) else {
        return Ok(None);
    };

    let mut blob = first.clone();
    for index in 1.. {
        match metadata.get(&chunk_key(index)) {
            Some(chunk) => blob.push_str(chunk),
            None => break,
        }
    }

    serde_json::from_str(&blob)
        .map(Some)
        .map_err(|e| BookingError::Codec(format!("invalid {METADATA_KEY} metadata: {e}")))
}

/// Note string plus the fields it could not carry faithfully
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncodedNote {
    pub note: String,

    /// Labels of fields whose value contains the delimiter or did not fit
    pub lossy_fields: Vec<&'static str>,
}

fn note_fields(payload: &ReservationPayload) -> [(&'static str, Option<&String>); 13] {
    [
        ("Pickup Location", payload.pickup_location.as_ref()),
        ("Dropoff Location", payload.dropoff_location.as_ref()),
        ("Second Dropoff", payload.dropoff_location_2.as_ref()),
        ("Pickup Date", payload.pickup_date.as_ref()),
        ("Pickup Time", payload.pickup_time.as_ref()),
        ("Passengers", payload.num_passengers.as_ref()),
        ("Ride Choice", payload.ride_choice.as_ref()),
        ("Flight Number", payload.flight_number.as_ref()),
        ("Hours", payload.service_hours.as_ref()),
        ("First Name", payload.customer_first_name.as_ref()),
        ("Last Name", payload.customer_last_name.as_ref()),
        ("Phone", payload.customer_phone_number.as_ref()),
        ("Email", payload.customer_email.as_ref()),
    ]
}

fn note_field_mut<'a>(payload: &'a mut ReservationPayload, label: &str) -> Option<&'a mut Option<String>> {
    Some(match label {
        "Pickup Location" => &mut payload.pickup_location,
        "Dropoff Location" => &mut payload.dropoff_location,
        "Second Dropoff" => &mut payload.dropoff_location_2,
        "Pickup Date" => &mut payload.pickup_date,
        "Pickup Time" => &mut payload.pickup_time,
        "Passengers" => &mut payload.num_passengers,
        "Ride Choice" => &mut payload.ride_choice,
        "Flight Number" => &mut payload.flight_number,
        "Hours" => &mut payload.service_hours,
        "First Name" => &mut payload.customer_first_name,
        "Last Name" => &mut payload.customer_last_name,
        "Phone" => &mut payload.customer_phone_number,
        "Email" => &mut payload.customer_email,
        _ => return None,
    })
}

/// Encode the reservation as a delimited note string.
///
/// Missing fields are left out of the note, as is any field that would push
/// it past [`MAX_PROVIDER_VALUE_LEN`] characters.
pub fn encode_note(payload: &ReservationPayload) -> EncodedNote {
    let mut note = String::new();
    let mut note_len = 0;
    let mut lossy_fields = Vec::new();

    for (label, value) in note_fields(payload) {
        let Some(value) = value else { continue };

        let part = format!("{label}: {value}");
        let separator = if note.is_empty() { "" } else { NOTE_DELIMITER };
        let added = separator.len() + part.chars().count();
        if note_len + added > MAX_PROVIDER_VALUE_LEN {
            lossy_fields.push(label);
            continue;
        }

        if value.contains(',') {
            lossy_fields.push(label);
        }
        note.push_str(separator);
        note.push_str(&part);
        note_len += added;
    }

    EncodedNote { note, lossy_fields }
}

/// Rebuild a reservation from a note string.
///
/// Unknown labels are ignored; the first occurrence of a label wins.
pub fn decode_note(note: &str) -> ReservationPayload {
    let mut payload = ReservationPayload::default();

    for captures in NOTE_TOKEN.captures_iter(note) {
        let (Some(label), Some(value)) = (captures.get(1), captures.get(2)) else {
            continue;
        };
        let Some(slot) = note_field_mut(&mut payload, label.as_str()) else {
            continue;
        };
        if slot.is_none() && !value.as_str().is_empty() {
            *slot = Some(value.as_str().to_string());
        }
    }

    payload
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_payload() -> ReservationPayload {
        ReservationPayload {
            pickup_location: Some("Airport".into()),
            dropoff_location: Some("Downtown".into()),
            dropoff_location_2: Some("Harbor Hotel".into()),
            pickup_date: Some("2024-06-01".into()),
            pickup_time: Some("14:30".into()),
            num_passengers: Some("3".into()),
            ride_choice: Some("SUV".into()),
            flight_number: Some("AA 123".into()),
            service_hours: Some("2".into()),
            customer_first_name: Some("Ana".into()),
            customer_last_name: Some("Lima".into()),
            customer_phone_number: Some("555-0100".into()),
            customer_email: Some("ana@example.com".into()),
        }
    }

    fn long_payload() -> ReservationPayload {
        ReservationPayload {
            pickup_location: Some(
                "Hartsfield-Jackson Atlanta International Airport, Domestic Terminal North, 6000 N Terminal Pkwy, Atlanta, GA 30320".into(),
            ),
            dropoff_location: Some(
                "The Ritz-Carlton, Buckhead, 3434 Peachtree Road Northeast, Atlanta, GA 30326".into(),
            ),
            dropoff_location_2: Some(
                "Mercedes-Benz Stadium, Gate 1 Rideshare Pickup, 1 AMB Drive Northwest, Atlanta, GA 30313".into(),
            ),
            pickup_date: Some("2024-06-01".into()),
            pickup_time: Some("14:30".into()),
            num_passengers: Some("6".into()),
            ride_choice: Some("Executive Sprinter Van".into()),
            flight_number: Some("DL 2417".into()),
            service_hours: Some("4".into()),
            customer_first_name: Some("Maria Fernanda".into()),
            customer_last_name: Some("Albuquerque de Oliveira".into()),
            customer_phone_number: Some("+1 (404) 555-0187".into()),
            customer_email: Some("maria.fernanda.albuquerque@example-corporate-travel.com".into()),
        }
    }

    #[test]
    fn test_metadata_round_trip() {
        let payload = full_payload();
        let encoded = encode_metadata(&payload).unwrap();

        assert!(encoded.lossy_fields.is_empty());
        assert_eq!(encoded.metadata.len(), 1);
        assert_eq!(decode_metadata(&encoded.metadata).unwrap(), Some(payload));
    }

    #[test]
    fn test_metadata_keeps_delimiters() {
        let payload = ReservationPayload {
            pickup_location: Some("1 Main St, Suite 4".into()),
            ..Default::default()
        };
        let encoded = encode_metadata(&payload).unwrap();
        assert_eq!(decode_metadata(&encoded.metadata).unwrap(), Some(payload));
    }

    #[test]
    fn test_long_metadata_is_split_under_value_cap() {
        let payload = long_payload();
        let encoded = encode_metadata(&payload).unwrap();

        assert!(encoded.lossy_fields.is_empty());
        assert!(encoded.metadata.len() > 1);
        assert!(encoded.metadata.contains_key("reservationDetails_1"));
        for (key, value) in &encoded.metadata {
            assert!(value.chars().count() <= MAX_PROVIDER_VALUE_LEN, "{key} is {} chars", value.chars().count());
        }
        assert_eq!(decode_metadata(&encoded.metadata).unwrap(), Some(payload));
    }

    #[test]
    fn test_metadata_split_respects_multibyte_chars() {
        let payload = ReservationPayload {
            pickup_location: Some("Estação São Bento, ".repeat(40)),
            ..Default::default()
        };
        let encoded = encode_metadata(&payload).unwrap();

        for value in encoded.metadata.values() {
            assert!(value.chars().count() <= MAX_PROVIDER_VALUE_LEN);
        }
        assert_eq!(decode_metadata(&encoded.metadata).unwrap(), Some(payload));
    }

    #[test]
    fn test_oversized_metadata_is_reported_not_sent() {
        let payload = ReservationPayload {
            pickup_location: Some("x".repeat(MAX_PROVIDER_VALUE_LEN * MAX_METADATA_CHUNKS)),
            ..Default::default()
        };
        let encoded = encode_metadata(&payload).unwrap();

        assert!(encoded.metadata.is_empty());
        assert_eq!(encoded.lossy_fields, vec![METADATA_KEY]);
        assert_eq!(decode_metadata(&encoded.metadata).unwrap(), None);
    }

    #[test]
    fn test_metadata_without_reservation() {
        assert_eq!(decode_metadata(&HashMap::new()).unwrap(), None);
    }

    #[test]
    fn test_metadata_garbage_is_codec_error() {
        let mut metadata = HashMap::new();
        metadata.insert(METADATA_KEY.to_string(), "{not json".to_string());
        assert!(matches!(decode_metadata(&metadata), Err(BookingError::Codec(_))));
    }

    #[test]
    fn test_note_round_trip() {
        let payload = full_payload();
        let encoded = encode_note(&payload);

        assert!(encoded.lossy_fields.is_empty());
        assert_eq!(decode_note(&encoded.note), payload);
    }

    #[test]
    fn test_note_format_matches_booking_form() {
        let payload = ReservationPayload {
            pickup_location: Some("Airport".into()),
            pickup_time: Some("14:30".into()),
            customer_first_name: Some("Ana".into()),
            ..Default::default()
        };
        assert_eq!(
            encode_note(&payload).note,
            "Pickup Location: Airport, Pickup Time: 14:30, First Name: Ana"
        );
    }

    #[test]
    fn test_note_reports_lossy_fields() {
        let payload = ReservationPayload {
            pickup_location: Some("1 Main St, Suite 4".into()),
            dropoff_location: Some("Downtown".into()),
            ..Default::default()
        };
        let encoded = encode_note(&payload);

        assert_eq!(encoded.lossy_fields, vec!["Pickup Location"]);
        let decoded = decode_note(&encoded.note);
        assert_eq!(decoded.pickup_location.as_deref(), Some("1 Main St"));
        assert_eq!(decoded.dropoff_location.as_deref(), Some("Downtown"));
    }

    #[test]
    fn test_long_note_stays_under_value_cap() {
        let payload = long_payload();
        let encoded = encode_note(&payload);

        assert!(encoded.note.chars().count() <= MAX_PROVIDER_VALUE_LEN);
        assert!(encoded.lossy_fields.contains(&"Pickup Location"));
        // Trailing fields that no longer fit are reported
        assert!(encoded.lossy_fields.contains(&"Email"));

        let decoded = decode_note(&encoded.note);
        assert_eq!(decoded.pickup_date.as_deref(), Some("2024-06-01"));
        assert_eq!(decoded.customer_email, None);
    }

    #[test]
    fn test_decode_note_ignores_unknown_labels() {
        let decoded = decode_note("Coupon: SPRING, Phone: 555-0100");
        assert_eq!(decoded.customer_phone_number.as_deref(), Some("555-0100"));
        assert_eq!(decoded.pickup_location, None);
    }

    #[test]
    fn test_decode_empty_note() {
        assert!(decode_note("").is_empty());
    }
}
