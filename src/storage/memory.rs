//! In-memory store with per-key expiry

use crate::storage::{KvStore, ScanPage, StorageError};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Instant,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at > now
    }
}

/// Process-local store. Expired keys are dropped when read and swept on every write.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<BTreeMap<String, Entry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Expire a key immediately, as if its TTL had run out
    pub fn force_expire(&self, key: &str) {
        if let Some(entry) = self.entries.lock().get_mut(key) {
            entry.expires_at = Instant::now();
        }
    }

    /// Remaining lifetime of a live key
    pub fn ttl(&self, key: &str) -> Option<Duration> {
        let now = Instant::now();
        self.entries
            .lock()
            .get(key)
            .filter(|e| e.is_live(now))
            .map(|e| e.expires_at - now)
    }

    /// Number of live keys
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries.lock().values().filter(|e| e.is_live(now)).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Write a raw value without going through a codec (for seeding tests)
    pub fn insert_raw(&self, key: &str, value: &str, ttl: Duration) {
        self.entries.lock().insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: Instant::now() + ttl,
            },
        );
    }
}

#[async_trait]
impl KvStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let now = Instant::now();
        let mut entries = self.entries.lock();

        match entries.get(key) {
            Some(entry) if entry.is_live(now) => Ok(Some(entry.value.clone())),
            Some(_) => {
                entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StorageError> {
        let now = Instant::now();
        let mut entries = self.entries.lock();

        // Keys that are never read again would otherwise stay forever
        entries.retain(|_, e| e.is_live(now));
        entries.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: now + ttl,
            },
        );
        Ok(())
    }

    async fn take(&self, key: &str) -> Result<Option<String>, StorageError> {
        let now = Instant::now();
        // Removal happens under the lock, so only one caller can observe the value
        let removed = self.entries.lock().remove(key);
        Ok(removed.filter(|e| e.is_live(now)).map(|e| e.value))
    }

    async fn delete(&self, key: &str) -> Result<bool, StorageError> {
        let now = Instant::now();
        let removed = self.entries.lock().remove(key);
        Ok(removed.is_some_and(|e| e.is_live(now)))
    }

    async fn scan(
        &self,
        cursor: u64,
        prefix: &str,
        count: usize,
    ) -> Result<ScanPage, StorageError> {
        let now = Instant::now();
        let count = count.max(1);
        let entries = self.entries.lock();

        // Like Redis, the cursor walks the whole keyspace and the prefix filters each batch
        let start = cursor as usize;
        let batch: Vec<(&String, &Entry)> = entries.iter().skip(start).take(count).collect();

        let keys = batch
            .iter()
            .filter(|(k, e)| k.starts_with(prefix) && e.is_live(now))
            .map(|(k, _)| (*k).clone())
            .collect();

        let next = start + batch.len();
        let cursor = if next >= entries.len() { 0 } else { next as u64 };

        Ok(ScanPage { cursor, keys })
    }
}
