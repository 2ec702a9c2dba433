//! Key-value store backends
//!
//! - Redis: shared store used by every service instance
//! - Memory: in-process store with per-key expiry (tests, local development)
//!
//! All cross-request coordination goes through this trait; nothing is shared
//! in-process between requests.

mod memory;
mod redis;

pub use self::memory::MemoryStore;
pub use self::redis::RedisStore;

pub use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Storage errors
#[derive(Debug, Clone, Error)]
pub enum StorageError {
    #[error("store error: {0}")]
    Backend(String),
}

/// One batch of a cursor scan
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanPage {
    /// Cursor for the next call; `0` once the scan is complete
    pub cursor: u64,
    /// Keys matching the prefix in this batch (possibly empty)
    pub keys: Vec<String>,
}

/// Atomic key-value operations with expiry
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Read a value, `None` if absent or expired
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Write a value, replacing any previous one, expiring after `ttl`
    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StorageError>;

    /// Atomically read and remove a value.
    ///
    /// Of several concurrent callers on the same key, at most one sees `Some`.
    async fn take(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Remove a key, returns whether anything was removed
    async fn delete(&self, key: &str) -> Result<bool, StorageError>;

    /// Resumable scan over keys starting with `prefix`.
    ///
    /// Start with cursor `0`; keep calling with the returned cursor until it is `0` again.
    async fn scan(&self, cursor: u64, prefix: &str, count: usize)
        -> Result<ScanPage, StorageError>;
}
