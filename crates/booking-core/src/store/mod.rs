//! Reservation Record Store
//!
//! Maps a checkout session key to the reservation that started it. The
//! checkout initiator is the only writer; the payment correlator is the only
//! consumer, through [`ReservationStore::take`], which must be atomic: two
//! concurrent takes of one key yield one `Some` and one `None`.
//!
//! Unclaimed entries expire after [`ExpiryPolicy::ttl`]. Expired entries are
//! invisible to `take` and swept on every `put`; there is no background task.

mod file;
mod memory;

pub use file::FileReservationStore;
pub use memory::MemoryReservationStore;

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::reservation::PendingCheckout;

/// Default lifetime of an unclaimed checkout
pub const DEFAULT_TTL_SECS: i64 = 24 * 60 * 60;

/// How long unclaimed checkouts are kept
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ExpiryPolicy {
    pub ttl: chrono::Duration,
}

impl ExpiryPolicy {
    pub const fn new(ttl: chrono::Duration) -> Self {
        Self { ttl }
    }

    pub fn from_secs(secs: i64) -> Self {
        Self::new(chrono::Duration::seconds(secs))
    }
}

impl Default for ExpiryPolicy {
    fn default() -> Self {
        Self::from_secs(DEFAULT_TTL_SECS)
    }
}

/// Storage for pending checkouts (Strategy pattern)
///
/// Implemented by the volatile [`MemoryReservationStore`] and the durable
/// [`FileReservationStore`].
#[async_trait]
pub trait ReservationStore: Send + Sync {
    /// Associate a session key with its pending checkout, replacing any
    /// previous entry for that key
    async fn put(&self, pending: PendingCheckout) -> Result<()>;

    /// Atomically remove and return the entry for `session_key`.
    ///
    /// Expired entries are removed and reported as absent.
    async fn take(&self, session_key: &str) -> Result<Option<PendingCheckout>>;

    /// Number of live (unexpired) entries
    async fn len(&self) -> Result<usize>;

    /// Drop expired entries, returning how many were removed
    async fn purge_expired(&self) -> Result<usize>;

    /// Store name for logs and health output
    fn name(&self) -> &str;
}

/// Remove every entry older than the policy allows
fn sweep(
    checkouts: &mut HashMap<String, PendingCheckout>,
    policy: ExpiryPolicy,
    now: DateTime<Utc>,
) -> usize {
    let before = checkouts.len();
    checkouts.retain(|_, pending| !pending.is_expired(now, policy.ttl));
    let removed = before - checkouts.len();
    if removed > 0 {
        tracing::info!(removed, "Swept expired pending checkouts");
    }
    removed
}

/// Remove `session_key`, treating an expired entry as absent
fn claim(
    checkouts: &mut HashMap<String, PendingCheckout>,
    session_key: &str,
    policy: ExpiryPolicy,
    now: DateTime<Utc>,
) -> Option<PendingCheckout> {
    let pending = checkouts.remove(session_key)?;
    if pending.is_expired(now, policy.ttl) {
        tracing::warn!(session_key = %session_key, "Pending checkout expired before payment");
        return None;
    }
    Some(pending)
}

fn live_count(checkouts: &HashMap<String, PendingCheckout>, policy: ExpiryPolicy, now: DateTime<Utc>) -> usize {
    checkouts
        .values()
        .filter(|pending| !pending.is_expired(now, policy.ttl))
        .count()
}
