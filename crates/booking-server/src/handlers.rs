//! HTTP Handlers

use axum::{
    Json,
    body::Bytes,
    extract::{State, rejection::JsonRejection},
    http::{HeaderMap, StatusCode},
};
use serde::Serialize;

use booking_payments::{CheckoutRequest, PaymentError};

use crate::state::AppState;

// ============================================================================
// Response Types
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub provider: String,
    pub pending_checkouts: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutResponse {
    pub checkout_url: String,
}

/// Webhook responses use `message` for both success and failure
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

// ============================================================================
// Error Mapping
// ============================================================================

const fn status_code(err: &PaymentError) -> StatusCode {
    if err.is_client_error() {
        StatusCode::BAD_REQUEST
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    }
}

const fn error_code(err: &PaymentError) -> &'static str {
    match err {
        PaymentError::Validation(_) => "INVALID_REQUEST",
        PaymentError::Authentication(_) => "INVALID_SIGNATURE",
        PaymentError::CorrelationMiss(_) => "RESERVATION_NOT_FOUND",
        PaymentError::UnrecognizedEvent(_) => "INVALID_EVENT_TYPE",
        PaymentError::Upstream(_) => "CHECKOUT_ERROR",
        PaymentError::Storage(_) => "STORAGE_ERROR",
        PaymentError::Config(_) => "CONFIG_ERROR",
    }
}

/// Log at the level the error deserves and return its status
fn report(err: &PaymentError, route: &'static str) -> StatusCode {
    let status = status_code(err);
    if status.is_client_error() {
        tracing::warn!(route, error = %err, "Request rejected");
    } else {
        tracing::error!(route, error = %err, "Request failed");
    }
    status
}

// ============================================================================
// Handlers
// ============================================================================

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let pending_checkouts = match state.store.len().await {
        Ok(n) => Some(n),
        Err(e) => {
            tracing::error!(store = state.store.name(), error = %e, "Store unavailable");
            None
        }
    };

    Json(HealthResponse {
        status: if pending_checkouts.is_some() { "healthy" } else { "degraded" },
        version: env!("CARGO_PKG_VERSION"),
        provider: state.checkout.provider_name().to_string(),
        pending_checkouts,
    })
}

/// Create a hosted checkout session for a reservation
pub async fn create_checkout(
    State(state): State<AppState>,
    payload: Result<Json<CheckoutRequest>, JsonRejection>,
) -> Result<Json<CheckoutResponse>, (StatusCode, Json<ErrorResponse>)> {
    let Json(request) = payload.map_err(|rejection| {
        tracing::warn!(error = %rejection.body_text(), "Malformed checkout request");
        (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: "Invalid request body".into(),
                code: "INVALID_JSON".into(),
            }),
        )
    })?;

    let session = state.checkout.create_checkout(request).await.map_err(|e| {
        (
            report(&e, "create-checkout"),
            Json(ErrorResponse {
                error: e.user_message().into(),
                code: error_code(&e).into(),
            }),
        )
    })?;

    Ok(Json(CheckoutResponse {
        checkout_url: session.checkout_url,
    }))
}

/// Payment provider webhook.
///
/// Takes the body as raw bytes: the signature covers the exact bytes sent.
pub async fn payment_confirmation(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, Json<MessageResponse>) {
    let signature = headers
        .get(state.webhooks.header_name())
        .and_then(|v| v.to_str().ok());

    match state.webhooks.process(&body, signature).await {
        Ok(outcome) => (
            StatusCode::OK,
            Json(MessageResponse {
                message: outcome.message().into(),
            }),
        ),
        Err(e) => (
            report(&e, "payment-confirmation"),
            Json(MessageResponse {
                message: e.user_message().into(),
            }),
        ),
    }
}
