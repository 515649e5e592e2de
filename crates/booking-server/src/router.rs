//! Router
//!
//! ```text
//! POST /api/create-checkout       (alias /create-checkout)
//! POST /api/payment-confirmation  (alias /payment-confirmation)
//! GET  /health
//! *    static files
//! ```

use std::path::Path;
use std::time::Duration;

use axum::{
    BoxError, Json, Router,
    error_handling::HandleErrorLayer,
    http::{HeaderValue, StatusCode},
    routing::{get, post},
};
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};

use crate::handlers::{ErrorResponse, create_checkout, health_check, payment_confirmation};
use crate::state::AppState;

/// Cross-cutting HTTP settings
#[derive(Clone, Debug)]
pub struct RouterOptions<'a> {
    pub allowed_origins: Option<&'a [String]>,
    pub static_dir: &'a Path,
    pub request_timeout: Duration,
}

pub fn router(state: AppState, options: &RouterOptions<'_>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(allow_origin(options.allowed_origins))
        .allow_methods(Any)
        .allow_headers(Any);

    let timeout = ServiceBuilder::new()
        .layer(HandleErrorLayer::new(handle_timeout))
        .timeout(options.request_timeout);

    Router::new()
        // Health
        .route("/health", get(health_check))
        // Checkout
        .route("/api/create-checkout", post(create_checkout))
        .route("/create-checkout", post(create_checkout))
        // Payment webhooks
        .route("/api/payment-confirmation", post(payment_confirmation))
        .route("/payment-confirmation", post(payment_confirmation))
        // Booking page
        .fallback_service(ServeDir::new(options.static_dir))
        .layer(timeout)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn allow_origin(origins: Option<&[String]>) -> AllowOrigin {
    let Some(origins) = origins else {
        return AllowOrigin::from(Any);
    };

    let parsed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    AllowOrigin::list(parsed)
}

async fn handle_timeout(err: BoxError) -> (StatusCode, Json<ErrorResponse>) {
    if err.is::<tower::timeout::error::Elapsed>() {
        tracing::error!("Request timed out");
        (
            StatusCode::GATEWAY_TIMEOUT,
            Json(ErrorResponse {
                error: "Request timed out".into(),
                code: "TIMEOUT".into(),
            }),
        )
    } else {
        tracing::error!(error = %err, "Unhandled middleware error");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse {
                error: "Internal server error".into(),
                code: "INTERNAL_ERROR".into(),
            }),
        )
    }
}
