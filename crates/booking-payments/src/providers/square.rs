//! Square Payment Links Integration
//!
//! Square has no metadata on payment links, so the reservation travels in
//! the payment note and comes back on `payment.created` as
//! `data.object.payment.note`. The order id is the session key.

use async_trait::async_trait;
use booking_core::ReservationChannel;
use serde::{Deserialize, Serialize};

use crate::error::{PaymentError, Result};
use super::{CheckoutOrder, PaymentProvider, ProviderSession};

const PRODUCTION_BASE_URL: &str = "https://connect.squareup.com";
const SANDBOX_BASE_URL: &str = "https://connect.squareupsandbox.com";
const SQUARE_VERSION: &str = "2024-06-04";

/// Square credentials
#[derive(Clone)]
pub struct SquareConfig {
    pub access_token: String,
    pub location_id: String,
    pub webhook_signature_key: String,
    /// Public URL Square posts webhooks to; part of the signed content
    pub webhook_url: String,
    pub base_url: String,
}

impl SquareConfig {
    /// Create from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Create from any variable source
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let require = |name: &str| {
            lookup(name)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| PaymentError::Config(format!("{name} not set")))
        };

        let base_url = match lookup("SQUARE_ENVIRONMENT").as_deref() {
            None | Some("production") => PRODUCTION_BASE_URL,
            Some("sandbox") => SANDBOX_BASE_URL,
            Some(other) => {
                return Err(PaymentError::Config(format!(
                    "SQUARE_ENVIRONMENT must be production or sandbox, got {other}"
                )));
            }
        };

        Ok(Self {
            access_token: require("SQUARE_ACCESS_TOKEN")?,
            location_id: require("SQUARE_LOCATION_ID")?,
            webhook_signature_key: require("SQUARE_WEBHOOK_SIGNATURE_KEY")?,
            webhook_url: require("SQUARE_WEBHOOK_URL")?,
            base_url: base_url.to_string(),
        })
    }
}

impl std::fmt::Debug for SquareConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SquareConfig")
            .field("location_id", &self.location_id)
            .field("webhook_url", &self.webhook_url)
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

#[derive(Serialize)]
struct CreatePaymentLinkRequest<'a> {
    idempotency_key: String,
    order: SquareOrder<'a>,
    #[serde(skip_serializing_if = "Option::is_none")]
    payment_note: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pre_populated_data: Option<PrePopulatedData<'a>>,
}

#[derive(Serialize)]
struct SquareOrder<'a> {
    location_id: &'a str,
    line_items: Vec<SquareLineItem<'a>>,
}

#[derive(Serialize)]
struct SquareLineItem<'a> {
    name: &'a str,
    quantity: &'static str,
    base_price_money: SquareMoney<'a>,
}

#[derive(Serialize)]
struct SquareMoney<'a> {
    amount: i64,
    currency: &'a str,
}

#[derive(Serialize)]
struct PrePopulatedData<'a> {
    buyer_email: &'a str,
}

#[derive(Deserialize)]
struct CreatePaymentLinkResponse {
    payment_link: Option<PaymentLink>,
    #[serde(default)]
    errors: Vec<SquareApiError>,
}

#[derive(Deserialize)]
struct PaymentLink {
    url: String,
    order_id: Option<String>,
}

#[derive(Deserialize)]
struct SquareApiError {
    code: Option<String>,
    detail: Option<String>,
}

/// Square REST client for payment links
pub struct SquareProvider {
    http: reqwest::Client,
    config: SquareConfig,
}

impl SquareProvider {
    pub fn new(config: SquareConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }
}

#[async_trait]
impl PaymentProvider for SquareProvider {
    fn name(&self) -> &str {
        "square"
    }

    fn reservation_channel(&self) -> ReservationChannel {
        ReservationChannel::Note
    }

    async fn create_checkout_session(&self, order: &CheckoutOrder) -> Result<ProviderSession> {
        // Square requires a key on every call
        let idempotency_key = order
            .idempotency_key
            .clone()
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        let body = CreatePaymentLinkRequest {
            idempotency_key,
            order: SquareOrder {
                location_id: &self.config.location_id,
                line_items: vec![SquareLineItem {
                    name: &order.item_name,
                    quantity: "1",
                    base_price_money: SquareMoney {
                        amount: order.amount_minor,
                        currency: &order.currency,
                    },
                }],
            },
            payment_note: order.note.as_deref(),
            pre_populated_data: order
                .customer_email
                .as_deref()
                .map(|buyer_email| PrePopulatedData { buyer_email }),
        };

        let url = format!("{}/v2/online-checkout/payment-links", self.config.base_url);
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.config.access_token)
            .header("Square-Version", SQUARE_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(|e| PaymentError::Upstream(format!("square: {e}")))?;

        let status = response.status();
        let parsed: CreatePaymentLinkResponse = response
            .json()
            .await
            .map_err(|e| PaymentError::Upstream(format!("square: invalid response ({status}): {e}")))?;

        if !status.is_success() || !parsed.errors.is_empty() {
            let detail = parsed
                .errors
                .iter()
                .map(|e| {
                    format!(
                        "{}: {}",
                        e.code.as_deref().unwrap_or("UNKNOWN"),
                        e.detail.as_deref().unwrap_or("")
                    )
                })
                .collect::<Vec<_>>()
                .join("; ");
            return Err(PaymentError::Upstream(format!("square ({status}): {detail}")));
        }

        let link = parsed
            .payment_link
            .ok_or_else(|| PaymentError::Upstream("square: no payment link returned".into()))?;
        let session_key = link
            .order_id
            .ok_or_else(|| PaymentError::Upstream("square: payment link has no order id".into()))?;

        Ok(ProviderSession {
            session_key,
            checkout_url: link.url,
        })
    }
}
