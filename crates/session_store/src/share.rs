use std::fmt;
use std::sync::Arc;

use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use crate::error::{ShareError, StoreError};
use crate::schema::{SessionSnapshot, SharedSessionRecord};
use crate::store::KvStore;

/// Share and rehydrate bookkeeping over a [`KvStore`].
///
/// Every write (initial share, re-share, visit) stores the record under its
/// content key with `ttl_seconds`, so each visit restarts the expiry window.
#[derive(Clone)]
pub struct SharedSessions {
    store: Arc<dyn KvStore>,
    ttl_seconds: u64,
}

impl fmt::Debug for SharedSessions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedSessions")
            .field("ttl_seconds", &self.ttl_seconds)
            .finish_non_exhaustive()
    }
}

impl SharedSessions {
    #[must_use]
    pub fn new(store: Arc<dyn KvStore>, ttl_seconds: u64) -> Self {
        Self { store, ttl_seconds }
    }

    #[must_use]
    pub fn ttl_seconds(&self) -> u64 {
        self.ttl_seconds
    }

    /// Reachability check; true when the store answers a size query.
    pub fn probe(&self) -> Result<u64, StoreError> {
        self.store.size()
    }

    /// Writes `snapshot` under its content key.
    ///
    /// Sharing identical content again rewrites the same key and keeps the
    /// existing access count and creation time. A stored record that fails to
    /// decode is replaced by a fresh one.
    pub fn share(&self, snapshot: &SessionSnapshot) -> Result<SharedSessionRecord, ShareError> {
        let key = snapshot.content_key()?;

        let existing = match self.store.get(&key)? {
            Some(raw) => match SharedSessionRecord::decode(&key, &raw) {
                Ok(record) => Some(record),
                Err(error) => {
                    tracing::warn!(key = %key, error = %error, "replacing unreadable shared session record");
                    None
                }
            },
            None => None,
        };

        let record = match existing {
            Some(mut record) => {
                record.ttl_seconds = self.ttl_seconds;
                record.snapshot = snapshot.clone();
                record
            }
            None => SharedSessionRecord::v1(
                key.clone(),
                self.ttl_seconds,
                utc_now_rfc3339()?,
                snapshot.clone(),
            ),
        };

        self.store.set(&key, &record.encode()?, self.ttl_seconds)?;
        tracing::info!(
            key = %key,
            access_count = record.access_count,
            ttl_seconds = self.ttl_seconds,
            "shared session stored"
        );
        Ok(record)
    }

    /// Reads and validates the record stored under `key` without touching it.
    pub fn fetch(&self, key: &str) -> Result<SharedSessionRecord, ShareError> {
        let raw = self
            .store
            .get(key)?
            .ok_or_else(|| ShareError::not_found(key))?;
        SharedSessionRecord::decode(key, &raw)
    }

    /// Counts one rehydration of `record` and refreshes its TTL.
    ///
    /// Returns the record as written. On failure nothing was written and the
    /// caller's copy is unchanged.
    pub fn record_visit(
        &self,
        record: &SharedSessionRecord,
    ) -> Result<SharedSessionRecord, ShareError> {
        let mut visited = record.clone();
        visited.access_count = visited.access_count.saturating_add(1);
        visited.last_accessed_at = Some(utc_now_rfc3339()?);
        visited.ttl_seconds = self.ttl_seconds;

        self.store
            .set(&visited.key, &visited.encode()?, self.ttl_seconds)?;
        tracing::debug!(
            key = %visited.key,
            access_count = visited.access_count,
            "shared session visited"
        );
        Ok(visited)
    }

    /// Fetches `key` and records the visit in one step.
    pub fn rehydrate(&self, key: &str) -> Result<SharedSessionRecord, ShareError> {
        let record = self.fetch(key)?;
        self.record_visit(&record)
    }
}

fn utc_now_rfc3339() -> Result<String, ShareError> {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .map_err(ShareError::ClockFormat)
}
