//! Vonage SMS Channel

use async_trait::async_trait;
use booking_core::{ConfirmedReservation, Notifier, ReservationPayload};
use serde::Deserialize;

use crate::error::{NotifyError, Result, required};

/// Production API root
pub const VONAGE_API_URL: &str = "https://rest.nexmo.com";

/// Vonage credentials and numbers
#[derive(Clone)]
pub struct VonageConfig {
    pub api_key: String,
    pub api_secret: String,
    /// Sender number or alphanumeric id
    pub from: String,
    /// Operator phone
    pub to: String,
    pub base_url: String,
}

impl VonageConfig {
    /// Load from `VONAGE_API_KEY`, `VONAGE_API_SECRET`, `VONAGE_PHONE_NUMBER`, `NOTIFICATION_PHONE`
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        Ok(Self {
            api_key: required(&lookup, "VONAGE_API_KEY")?,
            api_secret: required(&lookup, "VONAGE_API_SECRET")?,
            from: required(&lookup, "VONAGE_PHONE_NUMBER")?,
            to: required(&lookup, "NOTIFICATION_PHONE")?,
            base_url: VONAGE_API_URL.into(),
        })
    }
}

impl std::fmt::Debug for VonageConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VonageConfig")
            .field("api_key", &self.api_key)
            .field("api_secret", &"***")
            .field("from", &self.from)
            .field("to", &self.to)
            .field("base_url", &self.base_url)
            .finish()
    }
}

#[derive(Deserialize)]
struct SmsResponse {
    #[serde(default)]
    messages: Vec<SmsStatus>,
}

#[derive(Deserialize)]
struct SmsStatus {
    status: String,
    #[serde(rename = "error-text")]
    error_text: Option<String>,
}

/// Operator SMS notifications via Vonage
pub struct SmsNotifier {
    client: reqwest::Client,
    config: VonageConfig,
}

impl SmsNotifier {
    pub fn new(config: VonageConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    pub fn from_env() -> Result<Self> {
        Ok(Self::new(VonageConfig::from_env()?))
    }

    async fn send(&self, confirmed: &ConfirmedReservation) -> Result<()> {
        let text = render_text(&confirmed.reservation);
        let form = [
            ("api_key", self.config.api_key.as_str()),
            ("api_secret", self.config.api_secret.as_str()),
            ("from", self.config.from.as_str()),
            ("to", self.config.to.as_str()),
            ("text", text.as_str()),
        ];

        let response: SmsResponse = self
            .client
            .post(format!("{}/sms/json", self.config.base_url.trim_end_matches('/')))
            .form(&form)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        // Vonage answers 200 even for refused messages; the status is per message
        match response.messages.first() {
            Some(message) if message.status == "0" => Ok(()),
            Some(message) => Err(NotifyError::Rejected {
                service: "vonage",
                detail: message
                    .error_text
                    .clone()
                    .unwrap_or_else(|| format!("status {}", message.status)),
            }),
            None => Err(NotifyError::Rejected {
                service: "vonage",
                detail: "empty response".into(),
            }),
        }
    }
}

#[async_trait]
impl Notifier for SmsNotifier {
    fn name(&self) -> &str {
        "sms"
    }

    async fn notify(&self, confirmed: &ConfirmedReservation) -> booking_core::Result<()> {
        Ok(self.send(confirmed).await?)
    }
}

/// One-line summary: `New Reservation: <first> <last> - Pickup: <pickup> at <date> <time>`
pub fn render_text(reservation: &ReservationPayload) -> String {
    let field = |value: &Option<String>| ReservationPayload::display(value.as_ref()).to_string();
    format!(
        "New Reservation: {} {} - Pickup: {} at {} {}",
        field(&reservation.customer_first_name),
        field(&reservation.customer_last_name),
        field(&reservation.pickup_location),
        field(&reservation.pickup_date),
        field(&reservation.pickup_time),
    )
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn config(base_url: String) -> VonageConfig {
        VonageConfig {
            api_key: "key".into(),
            api_secret: "secret".into(),
            from: "15550001111".into(),
            to: "15550002222".into(),
            base_url,
        }
    }

    fn confirmed() -> ConfirmedReservation {
        ConfirmedReservation {
            session_key: "S1".into(),
            reservation: ReservationPayload {
                pickup_location: Some("Airport".into()),
                pickup_date: Some("2024-06-01".into()),
                pickup_time: Some("14:30".into()),
                customer_first_name: Some("Ana".into()),
                customer_last_name: Some("Lopez".into()),
                ..Default::default()
            },
            amount_minor: Some(4500),
            currency: None,
            payment_status: None,
            payment_reference: None,
        }
    }

    #[test]
    fn test_render_text() {
        assert_eq!(
            render_text(&confirmed().reservation),
            "New Reservation: Ana Lopez - Pickup: Airport at 2024-06-01 14:30"
        );
    }

    #[tokio::test]
    async fn test_sends_sms() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/sms/json"))
            .and(body_string_contains("api_key=key"))
            .and(body_string_contains("to=15550002222"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "message-count": "1",
                "messages": [{"status": "0", "message-id": "abc"}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        SmsNotifier::new(config(server.uri()))
            .notify(&confirmed())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_nonzero_status_is_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "message-count": "1",
                "messages": [{"status": "4", "error-text": "Bad Credentials"}]
            })))
            .mount(&server)
            .await;

        let err = SmsNotifier::new(config(server.uri()))
            .notify(&confirmed())
            .await
            .unwrap_err();

        assert!(err.to_string().contains("Bad Credentials"));
    }
}
