//! Brevo Email Channel
//!
//! Sends the reservation to the operator through Brevo's transactional
//! email API, with a calendar invite attached when the pickup time parses.

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use booking_core::{ConfirmedReservation, Notifier, ReservationPayload};
use serde::Serialize;

use crate::calendar::{CalendarInvite, INVITE_FILE_NAME};
use crate::error::{NotifyError, Result, required};

/// Production API root
pub const BREVO_API_URL: &str = "https://api.brevo.com";

/// Subject line of operator notifications
pub const SUBJECT: &str = "New SilverFox Reservation!!";

const DEFAULT_SENDER_NAME: &str = "SilverFox";

/// Brevo credentials and addressing
#[derive(Clone)]
pub struct BrevoConfig {
    pub api_key: String,

    /// Verified sender address, also the invite organizer
    pub sender_email: String,

    pub sender_name: String,

    /// Operator inbox
    pub recipient: String,

    pub base_url: String,
}

impl BrevoConfig {
    /// Load from `BREVO_API_KEY`, `EMAIL_USER`, `EMAIL_SENDER_NAME`, `NOTIFICATION_EMAIL`
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        Ok(Self {
            api_key: required(&lookup, "BREVO_API_KEY")?,
            sender_email: required(&lookup, "EMAIL_USER")?,
            sender_name: lookup("EMAIL_SENDER_NAME")
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_SENDER_NAME.into()),
            recipient: required(&lookup, "NOTIFICATION_EMAIL")?,
            base_url: BREVO_API_URL.into(),
        })
    }
}

impl std::fmt::Debug for BrevoConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BrevoConfig")
            .field("api_key", &"***")
            .field("sender_email", &self.sender_email)
            .field("sender_name", &self.sender_name)
            .field("recipient", &self.recipient)
            .field("base_url", &self.base_url)
            .finish()
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SendEmailRequest<'a> {
    sender: Contact<'a>,
    to: Vec<Contact<'a>>,
    subject: &'a str,
    html_content: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    attachment: Vec<Attachment>,
}

#[derive(Serialize)]
struct Contact<'a> {
    email: &'a str,
    name: &'a str,
}

#[derive(Serialize)]
struct Attachment {
    name: &'static str,
    /// Base64 file content
    content: String,
}

/// Operator email notifications via Brevo
pub struct EmailNotifier {
    client: reqwest::Client,
    config: BrevoConfig,
}

impl EmailNotifier {
    pub fn new(config: BrevoConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    pub fn from_env() -> Result<Self> {
        Ok(Self::new(BrevoConfig::from_env()?))
    }

    async fn send(&self, confirmed: &ConfirmedReservation) -> Result<()> {
        let reservation = &confirmed.reservation;
        let recipient_name = reservation
            .customer_first_name
            .as_deref()
            .unwrap_or(&self.config.sender_name);

        let attachment = CalendarInvite::for_reservation(
            confirmed,
            &self.config.sender_name,
            &self.config.sender_email,
        )
        .map(|invite| Attachment {
            name: INVITE_FILE_NAME,
            content: BASE64.encode(invite.to_ics()),
        })
        .into_iter()
        .collect();

        let request = SendEmailRequest {
            sender: Contact {
                email: &self.config.sender_email,
                name: &self.config.sender_name,
            },
            to: vec![Contact {
                email: &self.config.recipient,
                name: recipient_name,
            }],
            subject: SUBJECT,
            html_content: render_html(confirmed),
            attachment,
        };

        let response = self
            .client
            .post(format!("{}/v3/smtp/email", self.config.base_url.trim_end_matches('/')))
            .header("api-key", &self.config.api_key)
            .header(reqwest::header::ACCEPT, "application/json")
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(NotifyError::Rejected {
                service: "brevo",
                detail: format!("{status}: {body}"),
            });
        }

        tracing::debug!(recipient = %self.config.recipient, "Brevo accepted email");
        Ok(())
    }
}

#[async_trait]
impl Notifier for EmailNotifier {
    fn name(&self) -> &str {
        "email"
    }

    async fn notify(&self, confirmed: &ConfirmedReservation) -> booking_core::Result<()> {
        Ok(self.send(confirmed).await?)
    }
}

/// Reservation summary for the operator.
///
/// Round-trip and flight lines only appear when set. All customer input is
/// HTML-escaped.
pub fn render_html(confirmed: &ConfirmedReservation) -> String {
    let r = &confirmed.reservation;
    let field = |value: &Option<String>| escape_html(ReservationPayload::display(value.as_ref()));

    let mut lines = vec![
        "Reservation Details:".to_string(),
        format!("First Name: {}", field(&r.customer_first_name)),
        format!("Last Name: {}", field(&r.customer_last_name)),
        format!("Phone Number: {}", field(&r.customer_phone_number)),
        format!("Pickup Location: {}", field(&r.pickup_location)),
        format!("Dropoff Location: {}", field(&r.dropoff_location)),
    ];
    if let Some(second) = &r.dropoff_location_2 {
        lines.push(format!(
            "Next dropoff location for round trip: {}",
            escape_html(second)
        ));
    }
    lines.extend([
        format!("Pickup Date: {}", field(&r.pickup_date)),
        format!("Pickup Time: {}", field(&r.pickup_time)),
        format!("Customer Email: {}", field(&r.customer_email)),
        format!("Number of passengers: {}", field(&r.num_passengers)),
        format!("Ride choice: {}", field(&r.ride_choice)),
    ]);
    if let Some(flight) = &r.flight_number {
        lines.push(format!("Flight Number: {}", escape_html(flight)));
    }
    if let Some(hours) = &r.service_hours {
        lines.push(format!("Service hours: {}", escape_html(hours)));
    }

    let amount = confirmed.amount_display().map_or_else(
        || booking_core::reservation::NOT_PROVIDED.to_string(),
        |amount| match &confirmed.currency {
            Some(currency) => format!("{amount} {}", currency.to_uppercase()),
            None => amount,
        },
    );
    lines.push(format!("Amount total: {}", escape_html(&amount)));
    lines.push(format!("Payment reference: {}", field(&confirmed.payment_reference)));
    lines.push(format!("Payment status: {}", field(&confirmed.payment_status)));

    let mut html = lines.join("<br/>\n");
    html.push_str("<br/>");
    html
}

fn escape_html(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            c => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn config(base_url: String) -> BrevoConfig {
        BrevoConfig {
            api_key: "xkeysib-test".into(),
            sender_email: "rides@example.com".into(),
            sender_name: "SilverFox".into(),
            recipient: "ops@example.com".into(),
            base_url,
        }
    }

    fn confirmed() -> ConfirmedReservation {
        ConfirmedReservation {
            session_key: "S1".into(),
            reservation: ReservationPayload {
                pickup_location: Some("Airport".into()),
                dropoff_location: Some("Downtown".into()),
                pickup_date: Some("2024-06-01".into()),
                pickup_time: Some("14:30".into()),
                customer_first_name: Some("Ana".into()),
                ..Default::default()
            },
            amount_minor: Some(4500),
            currency: Some("usd".into()),
            payment_status: Some("paid".into()),
            payment_reference: Some("pi_1".into()),
        }
    }

    #[test]
    fn test_render_contains_reservation() {
        let html = render_html(&confirmed());

        for expected in [
            "Pickup Location: Airport",
            "Dropoff Location: Downtown",
            "Pickup Date: 2024-06-01",
            "Pickup Time: 14:30",
            "First Name: Ana",
            "Last Name: Not provided",
            "Amount total: 45.00 USD",
            "Payment reference: pi_1",
            "Payment status: paid",
        ] {
            assert!(html.contains(expected), "missing {expected:?} in {html}");
        }
        assert!(!html.contains("round trip"));
        assert!(!html.contains("Flight Number"));
    }

    #[test]
    fn test_render_escapes_input() {
        let mut confirmed = confirmed();
        confirmed.reservation.flight_number = Some("<script>alert(1)</script>".into());

        let html = render_html(&confirmed);

        assert!(html.contains("Flight Number: &lt;script&gt;alert(1)&lt;/script&gt;"));
        assert!(!html.contains("<script>"));
    }

    #[test]
    fn test_config_requires_credentials() {
        let err = BrevoConfig::from_lookup(|key| match key {
            "BREVO_API_KEY" => Some("k".into()),
            _ => None,
        })
        .unwrap_err();
        assert!(err.to_string().contains("EMAIL_USER"));

        let config = BrevoConfig::from_lookup(|key| match key {
            "BREVO_API_KEY" => Some("k".into()),
            "EMAIL_USER" => Some("rides@example.com".into()),
            "NOTIFICATION_EMAIL" => Some("ops@example.com".into()),
            _ => None,
        })
        .unwrap();
        assert_eq!(config.sender_name, "SilverFox");
        assert!(!format!("{config:?}").contains("\"k\""));
    }

    #[tokio::test]
    async fn test_sends_email_with_invite() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v3/smtp/email"))
            .and(header("api-key", "xkeysib-test"))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
                "messageId": "<1@smtp-relay.mailin.fr>"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let notifier = EmailNotifier::new(config(server.uri()));
        notifier.notify(&confirmed()).await.unwrap();

        let requests = server.received_requests().await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
        assert_eq!(body["subject"], SUBJECT);
        assert_eq!(body["to"][0]["email"], "ops@example.com");
        assert_eq!(body["to"][0]["name"], "Ana");
        assert_eq!(body["attachment"][0]["name"], "reservation.ics");

        let ics = BASE64
            .decode(body["attachment"][0]["content"].as_str().unwrap())
            .unwrap();
        assert!(String::from_utf8(ics).unwrap().contains("DTSTART:20240601T143000"));
    }

    #[tokio::test]
    async fn test_no_attachment_without_pickup_time() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(201))
            .mount(&server)
            .await;

        let mut confirmed = confirmed();
        confirmed.reservation.pickup_time = None;
        EmailNotifier::new(config(server.uri()))
            .notify(&confirmed)
            .await
            .unwrap();

        let requests = server.received_requests().await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
        assert!(body.get("attachment").is_none());
    }

    #[tokio::test]
    async fn test_rejected_email_is_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("Key not found"))
            .mount(&server)
            .await;

        let err = EmailNotifier::new(config(server.uri()))
            .notify(&confirmed())
            .await
            .unwrap_err();

        assert!(err.to_string().contains("Key not found"));
    }
}
