//! Mock Payment Provider
//!
//! For testing and local runs. Issues sequential session keys (`S1`, `S2`,
//! ...) and honours idempotency keys the way real providers do.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use booking_core::ReservationChannel;

use crate::error::{PaymentError, Result};
use super::{CheckoutOrder, PaymentProvider, ProviderSession};

/// In-process provider that never leaves the machine
pub struct MockPaymentProvider {
    channel: ReservationChannel,
    next_id: AtomicUsize,
    failing: AtomicBool,
    orders: Mutex<Vec<CheckoutOrder>>,
    by_idempotency_key: Mutex<HashMap<String, ProviderSession>>,
}

impl Default for MockPaymentProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MockPaymentProvider {
    /// Metadata-channel mock (Stripe-like)
    pub fn new() -> Self {
        Self::with_channel(ReservationChannel::Metadata)
    }

    /// Mock carrying the reservation in the given channel
    pub fn with_channel(channel: ReservationChannel) -> Self {
        Self {
            channel,
            next_id: AtomicUsize::new(1),
            failing: AtomicBool::new(false),
            orders: Mutex::new(Vec::new()),
            by_idempotency_key: Mutex::new(HashMap::new()),
        }
    }

    /// Make every following call fail like an unreachable provider
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Orders received so far, oldest first
    pub fn orders(&self) -> Vec<CheckoutOrder> {
        self.orders.lock().map(|o| o.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl PaymentProvider for MockPaymentProvider {
    fn name(&self) -> &str {
        "mock"
    }

    fn reservation_channel(&self) -> ReservationChannel {
        self.channel
    }

    async fn create_checkout_session(&self, order: &CheckoutOrder) -> Result<ProviderSession> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(PaymentError::Upstream("mock provider unavailable".into()));
        }

        let mut by_key = self
            .by_idempotency_key
            .lock()
            .map_err(|_| PaymentError::Upstream("mock provider lock poisoned".into()))?;

        if let Some(existing) = order.idempotency_key.as_ref().and_then(|k| by_key.get(k)) {
            return Ok(existing.clone());
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let session = ProviderSession {
            session_key: format!("S{id}"),
            checkout_url: format!("https://checkout.mock.invalid/pay/S{id}"),
        };

        if let Some(key) = &order.idempotency_key {
            by_key.insert(key.clone(), session.clone());
        }
        if let Ok(mut orders) = self.orders.lock() {
            orders.push(order.clone());
        }

        Ok(session)
    }
}
