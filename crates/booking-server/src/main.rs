//! ride-booking HTTP Server
//!
//! Axum server for the booking page: creates hosted checkouts and turns
//! payment webhooks into operator notifications.

mod config;
mod handlers;
mod router;
mod state;

use std::sync::Arc;

use booking_core::{
    Dispatcher, ExpiryPolicy, FileReservationStore, MemoryReservationStore, ReservationStore,
};
use booking_notify::{EmailNotifier, LogNotifier, SmsNotifier};
use booking_payments::{
    CheckoutInitiator, MockPaymentProvider, PaymentCorrelator, PaymentProvider, SignatureScheme,
    SquareConfig, SquareProvider, StripeConfig, StripeProvider, WebhookAuthenticator,
    WebhookProcessor,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{ProviderKind, ServerConfig, StoreKind};
use crate::router::{RouterOptions, router};
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load environment
    dotenvy::dotenv().ok();

    let config = ServerConfig::from_env()?;

    // Payment provider; missing credentials stop the server here
    let (provider, authenticator) = payment_provider(config.provider)?;
    tracing::info!("✓ Payment provider: {}", provider.name());

    // Pending checkout store
    let policy = ExpiryPolicy::from_secs(config.reservation_ttl_secs);
    let store: Arc<dyn ReservationStore> = match &config.store {
        StoreKind::Memory => Arc::new(MemoryReservationStore::with_policy(policy)),
        StoreKind::File(path) => Arc::new(FileReservationStore::open(path, policy).await?),
    };
    tracing::info!(
        "✓ Reservation store: {} ({} pending, ttl {}s)",
        store.name(),
        store.len().await?,
        config.reservation_ttl_secs
    );

    let dispatcher = notification_channels();

    let state = AppState {
        checkout: Arc::new(
            CheckoutInitiator::new(provider, store.clone()).with_currency(config.currency.clone()),
        ),
        webhooks: Arc::new(WebhookProcessor::new(
            authenticator,
            PaymentCorrelator::new(store.clone(), dispatcher),
        )),
        store,
    };

    let app = router(
        state,
        &RouterOptions {
            allowed_origins: config.allowed_origins.as_deref(),
            static_dir: &config.static_dir,
            request_timeout: config.request_timeout,
        },
    );

    // Start server
    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;

    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("🚀 ride-booking server running on http://{}", config.bind_addr);
    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("");
    tracing::info!("Endpoints:");
    tracing::info!("  GET  /health                   - Health check");
    tracing::info!("  POST /api/create-checkout      - Create hosted checkout");
    tracing::info!("  POST /api/payment-confirmation - Payment webhook");
    tracing::info!("  GET  /*                        - Static files from {}", config.static_dir.display());
    tracing::info!("");

    axum::serve(listener, app).await?;

    Ok(())
}

/// Build the configured provider and the matching webhook authenticator
fn payment_provider(
    kind: ProviderKind,
) -> anyhow::Result<(Arc<dyn PaymentProvider>, WebhookAuthenticator)> {
    Ok(match kind {
        ProviderKind::Stripe => {
            let stripe = StripeConfig::from_env()?;
            let authenticator =
                WebhookAuthenticator::new(SignatureScheme::stripe(stripe.webhook_secret.clone()))?;
            let provider: Arc<dyn PaymentProvider> = Arc::new(StripeProvider::new(&stripe));
            (provider, authenticator)
        }
        ProviderKind::Square => {
            let square = SquareConfig::from_env()?;
            let authenticator = WebhookAuthenticator::new(SignatureScheme::square(
                square.webhook_signature_key.clone(),
                square.webhook_url.clone(),
            ))?;
            let provider: Arc<dyn PaymentProvider> = Arc::new(SquareProvider::new(square));
            (provider, authenticator)
        }
        ProviderKind::Mock => {
            tracing::warn!("⚠ Using mock payment provider - no real charges");
            let secret = std::env::var("STRIPE_WEBHOOK_SECRET").unwrap_or_default();
            let authenticator = WebhookAuthenticator::new(SignatureScheme::stripe(secret))?;
            let provider: Arc<dyn PaymentProvider> = Arc::new(MockPaymentProvider::new());
            (provider, authenticator)
        }
    })
}

/// Register every configured channel; log-only when none are
fn notification_channels() -> Dispatcher {
    let mut dispatcher = Dispatcher::new();

    match EmailNotifier::from_env() {
        Ok(email) => {
            tracing::info!("✓ Email notifications enabled");
            dispatcher.register(Arc::new(email));
        }
        Err(e) => tracing::warn!("⚠ Email notifications disabled: {}", e),
    }

    match SmsNotifier::from_env() {
        Ok(sms) => {
            tracing::info!("✓ SMS notifications enabled");
            dispatcher.register(Arc::new(sms));
        }
        Err(e) => tracing::warn!("⚠ SMS notifications disabled: {}", e),
    }

    if dispatcher.is_empty() {
        tracing::warn!("⚠ No notification transport configured - reservations only reach the log");
        dispatcher.register(Arc::new(LogNotifier));
    }

    dispatcher
}
