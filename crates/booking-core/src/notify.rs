//! Notification Dispatch
//!
//! Channels (email, SMS, ...) implement [`Notifier`]. The [`Dispatcher`]
//! hands a confirmed reservation to every channel on a spawned task and
//! returns immediately; channel failures only reach the log.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::task::JoinHandle;

use crate::error::Result;
use crate::reservation::ConfirmedReservation;

/// A notification channel
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Channel name for logs
    fn name(&self) -> &str;

    /// Deliver one notification for a confirmed reservation
    async fn notify(&self, confirmed: &ConfirmedReservation) -> Result<()>;
}

/// Fan-out of a confirmed reservation to all registered channels
#[derive(Clone, Default)]
pub struct Dispatcher {
    channels: Vec<Arc<dyn Notifier>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a channel
    pub fn register(&mut self, channel: Arc<dyn Notifier>) {
        self.channels.push(channel);
    }

    /// Builder-style [`register`](Self::register)
    #[must_use]
    pub fn with(mut self, channel: Arc<dyn Notifier>) -> Self {
        self.register(channel);
        self
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Channel names, in dispatch order
    pub fn names(&self) -> Vec<&str> {
        self.channels.iter().map(|c| c.name()).collect()
    }

    /// Hand the reservation off to every channel without waiting.
    ///
    /// Must be called from inside a Tokio runtime. The returned handle is
    /// only useful to tests; production callers drop it.
    pub fn dispatch(&self, confirmed: ConfirmedReservation) -> JoinHandle<()> {
        let channels = self.channels.clone();

        tokio::spawn(async move {
            for channel in &channels {
                match channel.notify(&confirmed).await {
                    Ok(()) => tracing::info!(
                        channel = channel.name(),
                        session_key = %confirmed.session_key,
                        "Notification sent"
                    ),
                    Err(e) => tracing::error!(
                        channel = channel.name(),
                        session_key = %confirmed.session_key,
                        error = %e,
                        "Notification failed"
                    ),
                }
            }
        })
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("channels", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::error::BookingError;
    use crate::reservation::ReservationPayload;

    struct Counting(AtomicUsize);

    #[async_trait]
    impl Notifier for Counting {
        fn name(&self) -> &str {
            "counting"
        }

        async fn notify(&self, _confirmed: &ConfirmedReservation) -> Result<()> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct Failing;

    #[async_trait]
    impl Notifier for Failing {
        fn name(&self) -> &str {
            "failing"
        }

        async fn notify(&self, _confirmed: &ConfirmedReservation) -> Result<()> {
            Err(BookingError::Notification("transport down".into()))
        }
    }

    fn confirmed() -> ConfirmedReservation {
        ConfirmedReservation {
            session_key: "S1".into(),
            reservation: ReservationPayload::default(),
            amount_minor: Some(4500),
            currency: Some("usd".into()),
            payment_status: Some("paid".into()),
            payment_reference: None,
        }
    }

    #[tokio::test]
    async fn test_failing_channel_does_not_stop_others() {
        let counting = Arc::new(Counting(AtomicUsize::new(0)));
        let dispatcher = Dispatcher::new()
            .with(Arc::new(Failing))
            .with(counting.clone());

        dispatcher.dispatch(confirmed()).await.unwrap();

        assert_eq!(counting.0.load(Ordering::SeqCst), 1);
        assert_eq!(dispatcher.names(), vec!["failing", "counting"]);
    }

    #[tokio::test]
    async fn test_empty_dispatcher_is_noop() {
        let dispatcher = Dispatcher::new();
        assert!(dispatcher.is_empty());
        dispatcher.dispatch(confirmed()).await.unwrap();
    }
}
