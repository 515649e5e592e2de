//! In-memory reservation store (volatile, lost on restart)

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;

use super::{ExpiryPolicy, ReservationStore, claim, live_count, sweep};
use crate::error::{BookingError, Result};
use crate::reservation::PendingCheckout;

/// Process-memory store
pub struct MemoryReservationStore {
    checkouts: Mutex<HashMap<String, PendingCheckout>>,
    policy: ExpiryPolicy,
}

impl Default for MemoryReservationStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryReservationStore {
    pub fn new() -> Self {
        Self::with_policy(ExpiryPolicy::default())
    }

    pub fn with_policy(policy: ExpiryPolicy) -> Self {
        Self {
            checkouts: Mutex::new(HashMap::new()),
            policy,
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, PendingCheckout>>> {
        self.checkouts
            .lock()
            .map_err(|_| BookingError::Storage("reservation store lock poisoned".into()))
    }

    /// Whether a live entry exists for `session_key`
    pub fn contains(&self, session_key: &str) -> Result<bool> {
        let checkouts = self.lock()?;
        Ok(checkouts
            .get(session_key)
            .is_some_and(|pending| !pending.is_expired(Utc::now(), self.policy.ttl)))
    }
}

#[async_trait]
impl ReservationStore for MemoryReservationStore {
    async fn put(&self, pending: PendingCheckout) -> Result<()> {
        let mut checkouts = self.lock()?;
        sweep(&mut checkouts, self.policy, Utc::now());
        if checkouts.insert(pending.session_key.clone(), pending).is_some() {
            tracing::debug!("Replaced existing pending checkout");
        }
        Ok(())
    }

    async fn take(&self, session_key: &str) -> Result<Option<PendingCheckout>> {
        let mut checkouts = self.lock()?;
        Ok(claim(&mut checkouts, session_key, self.policy, Utc::now()))
    }

    async fn len(&self) -> Result<usize> {
        let checkouts = self.lock()?;
        Ok(live_count(&checkouts, self.policy, Utc::now()))
    }

    async fn purge_expired(&self) -> Result<usize> {
        let mut checkouts = self.lock()?;
        Ok(sweep(&mut checkouts, self.policy, Utc::now()))
    }

    fn name(&self) -> &str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::reservation::ReservationPayload;

    fn pending(key: &str) -> PendingCheckout {
        let reservation = ReservationPayload {
            pickup_location: Some("Airport".into()),
            ..Default::default()
        };
        PendingCheckout::new(key, reservation, 4500, "USD")
    }

    #[tokio::test]
    async fn test_put_then_take_once() {
        let store = MemoryReservationStore::new();
        store.put(pending("S1")).await.unwrap();

        assert!(store.contains("S1").unwrap());
        let taken = store.take("S1").await.unwrap().unwrap();
        assert_eq!(taken.amount_minor, 4500);

        assert!(store.take("S1").await.unwrap().is_none());
        assert!(!store.contains("S1").unwrap());
    }

    #[tokio::test]
    async fn test_take_unknown_key() {
        let store = MemoryReservationStore::new();
        assert!(store.take("never-registered").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_expired_entries_are_absent() {
        let store = MemoryReservationStore::with_policy(ExpiryPolicy::from_secs(60));
        let mut old = pending("S1");
        old.created_at -= chrono::Duration::minutes(5);
        store.put(old).await.unwrap();

        assert_eq!(store.len().await.unwrap(), 0);
        assert!(store.take("S1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_put_sweeps_expired() {
        let store = MemoryReservationStore::with_policy(ExpiryPolicy::from_secs(60));
        let mut old = pending("old");
        old.created_at -= chrono::Duration::minutes(5);
        store.put(old).await.unwrap();
        store.put(pending("new")).await.unwrap();

        assert_eq!(store.purge_expired().await.unwrap(), 0);
        assert_eq!(store.len().await.unwrap(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_takes_have_one_winner() {
        let store = Arc::new(MemoryReservationStore::new());
        store.put(pending("S1")).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..16 {
            let store = store.clone();
            handles.push(tokio::spawn(async move { store.take("S1").await.unwrap() }));
        }

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap().is_some() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }
}
