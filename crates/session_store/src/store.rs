use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use crate::error::StoreError;

/// Flat string key-value store with per-key expiry.
///
/// Both operations are assumed atomic. Expired keys read as absent.
pub trait KvStore: Send + Sync {
    fn set(&self, key: &str, value: &str, ttl_seconds: u64) -> Result<(), StoreError>;

    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Number of live keys; used as a reachability probe.
    fn size(&self) -> Result<u64, StoreError>;
}

#[derive(Debug, Clone)]
struct MemoryEntry {
    value: String,
    ttl_seconds: u64,
    expires_at: Instant,
}

/// In-process store with TTL expiry and a manually advanceable clock.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, MemoryEntry>>,
    clock_offset: Mutex<Duration>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Moves the store clock forward, expiring entries whose TTL elapsed.
    pub fn advance(&self, by: Duration) {
        let mut offset = lock_unpoisoned(&self.clock_offset);
        *offset = offset.saturating_add(by);
    }

    /// TTL used by the last write of a live key.
    #[must_use]
    pub fn ttl_seconds(&self, key: &str) -> Option<u64> {
        let now = self.now();
        lock_unpoisoned(&self.entries)
            .get(key)
            .filter(|entry| entry.expires_at > now)
            .map(|entry| entry.ttl_seconds)
    }

    /// Remaining lifetime of a live key.
    #[must_use]
    pub fn remaining(&self, key: &str) -> Option<Duration> {
        let now = self.now();
        lock_unpoisoned(&self.entries)
            .get(key)
            .and_then(|entry| entry.expires_at.checked_duration_since(now))
            .filter(|remaining| !remaining.is_zero())
    }

    fn now(&self) -> Instant {
        Instant::now() + *lock_unpoisoned(&self.clock_offset)
    }
}

impl KvStore for MemoryStore {
    fn set(&self, key: &str, value: &str, ttl_seconds: u64) -> Result<(), StoreError> {
        let expires_at = self
            .now()
            .checked_add(Duration::from_secs(ttl_seconds))
            .ok_or_else(|| StoreError::Command(format!("ttl {ttl_seconds}s is out of range")))?;
        lock_unpoisoned(&self.entries).insert(
            key.to_string(),
            MemoryEntry {
                value: value.to_string(),
                ttl_seconds,
                expires_at,
            },
        );
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let now = self.now();
        let mut entries = lock_unpoisoned(&self.entries);
        match entries.get(key) {
            Some(entry) if entry.expires_at > now => Ok(Some(entry.value.clone())),
            Some(_) => {
                entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    fn size(&self) -> Result<u64, StoreError> {
        let now = self.now();
        let mut entries = lock_unpoisoned(&self.entries);
        entries.retain(|_, entry| entry.expires_at > now);
        Ok(entries.len() as u64)
    }
}

fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
