//! Log Channel
//!
//! Writes confirmed reservations to the tracing log. The fallback when no
//! transport is configured, so a paid booking is never silently lost.

use async_trait::async_trait;
use booking_core::{ConfirmedReservation, Notifier, Result};

use crate::sms::render_text;

#[derive(Clone, Copy, Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    fn name(&self) -> &str {
        "log"
    }

    async fn notify(&self, confirmed: &ConfirmedReservation) -> Result<()> {
        tracing::info!(
            session_key = %confirmed.session_key,
            amount = ?confirmed.amount_display(),
            payment_status = ?confirmed.payment_status,
            reservation = %serde_json::to_string(&confirmed.reservation)?,
            "{}",
            render_text(&confirmed.reservation)
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use booking_core::ReservationPayload;

    use super::*;

    #[tokio::test]
    async fn test_log_channel_never_fails() {
        let confirmed = ConfirmedReservation {
            session_key: "S1".into(),
            reservation: ReservationPayload::default(),
            amount_minor: None,
            currency: None,
            payment_status: None,
            payment_reference: None,
        };

        LogNotifier.notify(&confirmed).await.unwrap();
        assert_eq!(LogNotifier.name(), "log");
    }
}
