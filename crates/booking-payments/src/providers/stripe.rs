//! Stripe Checkout Integration
//!
//! Implements the "Stripe Checkout (Hosted)" approach: one-off payment mode,
//! reservation carried in session metadata.

use async_trait::async_trait;
use booking_core::ReservationChannel;
use stripe::{
    CheckoutSession as StripeCheckoutSession, CheckoutSessionMode, Client,
    CreateCheckoutSession, CreateCheckoutSessionLineItems,
    CreateCheckoutSessionLineItemsPriceData,
    CreateCheckoutSessionLineItemsPriceDataProductData, Currency, RequestStrategy,
};

use crate::error::{PaymentError, Result};
use super::{CheckoutOrder, PaymentProvider, ProviderSession};

/// Stripe credentials and redirect targets
#[derive(Clone)]
pub struct StripeConfig {
    pub secret_key: String,
    pub webhook_secret: String,
    pub success_url: String,
    pub cancel_url: String,
}

impl StripeConfig {
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

        Ok(Self {
            secret_key: require("STRIPE_SECRET_KEY")?,
            webhook_secret: require("STRIPE_WEBHOOK_SECRET")?,
            success_url: require("CHECKOUT_SUCCESS_URL")?,
            cancel_url: require("CHECKOUT_CANCEL_URL")?,
        })
    }
}

impl std::fmt::Debug for StripeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StripeConfig")
            .field("success_url", &self.success_url)
            .field("cancel_url", &self.cancel_url)
            .finish_non_exhaustive()
    }
}

/// Stripe client wrapper
pub struct StripeProvider {
    client: Client,
    success_url: String,
    cancel_url: String,
}

impl StripeProvider {
    /// Create a new Stripe provider
    pub fn new(config: &StripeConfig) -> Self {
        Self {
            client: Client::new(&config.secret_key),
            success_url: config.success_url.clone(),
            cancel_url: config.cancel_url.clone(),
        }
    }
}

fn stripe_currency(code: &str) -> Result<Currency> {
    match code.to_ascii_lowercase().as_str() {
        "usd" => Ok(Currency::USD),
        "cad" => Ok(Currency::CAD),
        "eur" => Ok(Currency::EUR),
        "gbp" => Ok(Currency::GBP),
        other => Err(PaymentError::Config(format!("unsupported currency {other}"))),
    }
}

#[async_trait]
impl PaymentProvider for StripeProvider {
    fn name(&self) -> &str {
        "stripe"
    }

    fn reservation_channel(&self) -> ReservationChannel {
        ReservationChannel::Metadata
    }

    async fn create_checkout_session(&self, order: &CheckoutOrder) -> Result<ProviderSession> {
        let mut params = CreateCheckoutSession::new();
        params.success_url = Some(&self.success_url);
        params.cancel_url = Some(&self.cancel_url);
        params.mode = Some(CheckoutSessionMode::Payment);
        params.customer_email = order.customer_email.as_deref();
        params.metadata = Some(order.metadata.clone());

        params.line_items = Some(vec![CreateCheckoutSessionLineItems {
            quantity: Some(1),
            price_data: Some(CreateCheckoutSessionLineItemsPriceData {
                currency: stripe_currency(&order.currency)?,
                unit_amount: Some(order.amount_minor),
                product_data: Some(CreateCheckoutSessionLineItemsPriceDataProductData {
                    name: order.item_name.clone(),
                    ..Default::default()
                }),
                ..Default::default()
            }),
            ..Default::default()
        }]);

        // Same key on retry → Stripe replays the original session
        let client = match &order.idempotency_key {
            Some(key) => self
                .client
                .clone()
                .with_strategy(RequestStrategy::Idempotent(key.clone())),
            None => self.client.clone(),
        };

        let session = StripeCheckoutSession::create(&client, params)
            .await
            .map_err(|e| PaymentError::Upstream(format!("stripe: {e}")))?;

        let checkout_url = session
            .url
            .ok_or_else(|| PaymentError::Upstream("stripe: no checkout URL returned".into()))?;

        Ok(ProviderSession {
            session_key: session.id.to_string(),
            checkout_url,
        })
    }
}
