//! Durable reservation store backed by a JSON document on disk.
//!
//! The whole document is cached in memory and rewritten on every mutation
//! (write to a sibling temp file, then rename). The async mutex is held for
//! the full read-modify-write so `take` stays atomic across tasks.
//!
//! Mutations are applied to a staged copy and only committed to the cache
//! once the document is on disk. A failed or cancelled write leaves the cache
//! as it was, so a retried delivery can still claim its entry.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use super::{ExpiryPolicy, ReservationStore, claim, live_count, sweep};
use crate::error::{BookingError, Result};
use crate::reservation::PendingCheckout;

const DOCUMENT_VERSION: u32 = 1;

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreDocument {
    version: u32,
    checkouts: HashMap<String, PendingCheckout>,
}

/// File-backed store, survives restarts
pub struct FileReservationStore {
    path: PathBuf,
    checkouts: Mutex<HashMap<String, PendingCheckout>>,
    policy: ExpiryPolicy,
}

impl FileReservationStore {
    /// Open the document at `path`, creating an empty store if it does not exist
    pub async fn open(path: impl AsRef<Path>, policy: ExpiryPolicy) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let checkouts = match tokio::fs::read(&path).await {
            Ok(bytes) => {
                let document: StoreDocument = serde_json::from_slice(&bytes).map_err(|e| {
                    BookingError::Storage(format!("corrupt store document {}: {e}", path.display()))
                })?;
                if document.version != DOCUMENT_VERSION {
                    return Err(BookingError::Storage(format!(
                        "unsupported store document version {}",
                        document.version
                    )));
                }
                document.checkouts
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => return Err(e.into()),
        };

        tracing::info!(
            path = %path.display(),
            entries = checkouts.len(),
            "Opened reservation store"
        );

        Ok(Self {
            path,
            checkouts: Mutex::new(checkouts),
            policy,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn persist(&self, checkouts: &HashMap<String, PendingCheckout>) -> Result<()> {
        let document = StoreDocument {
            version: DOCUMENT_VERSION,
            checkouts: checkouts.clone(),
        };
        let bytes = serde_json::to_vec_pretty(&document)?;

        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl ReservationStore for FileReservationStore {
    async fn put(&self, pending: PendingCheckout) -> Result<()> {
        let mut checkouts = self.checkouts.lock().await;

        let mut staged = checkouts.clone();
        sweep(&mut staged, self.policy, Utc::now());
        staged.insert(pending.session_key.clone(), pending);

        self.persist(&staged).await?;
        *checkouts = staged;
        Ok(())
    }

    async fn take(&self, session_key: &str) -> Result<Option<PendingCheckout>> {
        let mut checkouts = self.checkouts.lock().await;
        if !checkouts.contains_key(session_key) {
            return Ok(None);
        }

        let mut staged = checkouts.clone();
        let claimed = claim(&mut staged, session_key, self.policy, Utc::now());

        self.persist(&staged).await?;
        *checkouts = staged;
        Ok(claimed)
    }

    async fn len(&self) -> Result<usize> {
        let checkouts = self.checkouts.lock().await;
        Ok(live_count(&checkouts, self.policy, Utc::now()))
    }

    async fn purge_expired(&self) -> Result<usize> {
        let mut checkouts = self.checkouts.lock().await;

        let mut staged = checkouts.clone();
        let removed = sweep(&mut staged, self.policy, Utc::now());
        if removed > 0 {
            self.persist(&staged).await?;
            *checkouts = staged;
        }
        Ok(removed)
    }

    fn name(&self) -> &str {
        "file"
    }
}
