//! Calendar Invites
//!
//! Minimal iCalendar (RFC 5545) `VEVENT` for a booked ride. Times are
//! floating local times: the booking form collects wall-clock pickup times
//! without a zone.

use booking_core::ConfirmedReservation;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime, TimeDelta, Utc};

/// Attachment file name
pub const INVITE_FILE_NAME: &str = "reservation.ics";

const DATE_TIME_FORMAT: &str = "%Y%m%dT%H%M%S";

/// Longest content line in octets, excluding the CRLF
const MAX_LINE_OCTETS: usize = 75;

/// One-hour calendar event for a ride pickup
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CalendarInvite {
    pub uid: String,
    pub start: NaiveDateTime,
    pub duration: TimeDelta,
    pub summary: String,
    pub description: String,
    pub location: Option<String>,
    pub organizer_name: String,
    pub organizer_email: String,
    pub attendee_email: Option<String>,
}

impl CalendarInvite {
    /// Build an invite when the pickup date and time parse
    pub fn for_reservation(
        confirmed: &ConfirmedReservation,
        organizer_name: &str,
        organizer_email: &str,
    ) -> Option<Self> {
        let reservation = &confirmed.reservation;
        let date = parse_date(reservation.pickup_date.as_deref()?)?;
        let time = parse_time(reservation.pickup_time.as_deref()?)?;

        Some(Self {
            uid: format!("{}@ride-booking", confirmed.session_key),
            start: date.and_time(time),
            duration: TimeDelta::hours(1),
            summary: "Ride Reservation".into(),
            description: "Your booked ride reservation.".into(),
            location: reservation.pickup_location.clone(),
            organizer_name: organizer_name.into(),
            organizer_email: organizer_email.into(),
            attendee_email: reservation.customer_email.clone(),
        })
    }

    /// Render as an `.ics` document with CRLF line endings
    pub fn to_ics(&self) -> String {
        let end = self.start + self.duration;
        let mut lines = vec![
            "BEGIN:VCALENDAR".to_string(),
            "VERSION:2.0".to_string(),
            "PRODID:-//ride-booking//EN".to_string(),
            "METHOD:REQUEST".to_string(),
            "BEGIN:VEVENT".to_string(),
            format!("UID:{}", self.uid),
            format!("DTSTAMP:{}Z", Utc::now().format(DATE_TIME_FORMAT)),
            format!("DTSTART:{}", self.start.format(DATE_TIME_FORMAT)),
            format!("DTEND:{}", end.format(DATE_TIME_FORMAT)),
            format!("SUMMARY:{}", escape_text(&self.summary)),
            format!("DESCRIPTION:{}", escape_text(&self.description)),
        ];
        if let Some(location) = &self.location {
            lines.push(format!("LOCATION:{}", escape_text(location)));
        }
        lines.push("STATUS:CONFIRMED".into());
        lines.push(format!(
            "ORGANIZER;CN={}:mailto:{}",
            escape_param(&self.organizer_name),
            address(&self.organizer_email)
        ));
        if let Some(attendee) = &self.attendee_email {
            lines.push(format!("ATTENDEE;CN=Customer;RSVP=TRUE:mailto:{}", address(attendee)));
        }
        lines.push("END:VEVENT".into());
        lines.push("END:VCALENDAR".into());

        let mut ics = String::new();
        for line in &lines {
            ics.push_str(&fold(line));
            ics.push_str("\r\n");
        }
        ics
    }
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").ok()
}

/// `14:30`, `14:30:00` or `2:30 PM`
fn parse_time(raw: &str) -> Option<NaiveTime> {
    let raw = raw.trim();
    ["%H:%M", "%H:%M:%S", "%I:%M %p"]
        .iter()
        .find_map(|format| NaiveTime::parse_from_str(raw, format).ok())
}

fn escape_text(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            ';' => escaped.push_str("\\;"),
            ',' => escaped.push_str("\\,"),
            '\n' => escaped.push_str("\\n"),
            c if c.is_control() => {}
            c => escaped.push(c),
        }
    }
    escaped
}

fn escape_param(value: &str) -> String {
    let value: String = value.chars().filter(|c| !c.is_control() && *c != '"').collect();
    if value.contains([':', ';', ',']) {
        format!("\"{value}\"")
    } else {
        value
    }
}

/// Mail address for a `mailto:` value; control characters and spaces dropped
fn address(value: &str) -> String {
    value
        .chars()
        .filter(|c| !c.is_control() && !c.is_whitespace())
        .collect()
}

/// Fold a content line at [`MAX_LINE_OCTETS`], continuing with CRLF + space
fn fold(line: &str) -> String {
    let mut folded = String::with_capacity(line.len() + line.len() / MAX_LINE_OCTETS * 3);
    let mut used = 0;

    for c in line.chars() {
        if used + c.len_utf8() > MAX_LINE_OCTETS {
            folded.push_str("\r\n ");
            used = 1;
        }
        folded.push(c);
        used += c.len_utf8();
    }
    folded
}
