//! Key-value store contract shared by the session store and the cache-aside layer.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

/// Failure talking to the key-value store.
///
/// A missing key is never an error; lookups return `Ok(None)` instead.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum KvError {
    #[error("key-value store unavailable: {0}")]
    Unavailable(String),
    #[error("key-value store call timed out after {0:?}")]
    Timeout(Duration),
}

impl KvError {
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable(message.into())
    }
}

/// Remote (or in-process) map from string keys to byte values with per-entry expiry.
///
/// Implementations must be safe to share across tasks. Single-key operations are atomic;
/// nothing is promised across keys.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Returns the live value for `key`, or `None` when absent or expired.
    async fn get(&self, key: &str) -> Result<Option<Bytes>, KvError>;

    /// Stores `value` under `key`, replacing any previous value and resetting its expiry.
    async fn set_with_ttl(&self, key: &str, value: Bytes, ttl: Duration) -> Result<(), KvError>;

    /// Removes `key`. Deleting an absent key succeeds.
    async fn delete(&self, key: &str) -> Result<(), KvError>;

    /// Round-trips to the store; used by startup and the health endpoint.
    async fn ping(&self) -> Result<(), KvError>;
}
