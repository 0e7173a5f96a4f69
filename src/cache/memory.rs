//! In-process [`KvStore`] used for single-node deployments (`memory://`) and tests.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use tokio::time::Instant;

use super::kv::{KvError, KvStore};

#[derive(Debug, Clone)]
struct Entry {
    value: Bytes,
    expires_at: Instant,
}

/// Concurrent map with lazy expiry: expired entries are dropped when next read.
#[derive(Debug, Default)]
pub struct InMemoryKvStore {
    entries: DashMap<String, Entry>,
}

impl InMemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries, including expired ones not yet observed.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl KvStore for InMemoryKvStore {
    async fn get(&self, key: &str) -> Result<Option<Bytes>, KvError> {
        let now = Instant::now();
        match self.entries.get(key) {
            Some(entry) if entry.expires_at > now => return Ok(Some(entry.value.clone())),
            Some(_) => {}
            None => return Ok(None),
        }

        self.entries
            .remove_if(key, |_, entry| entry.expires_at <= now);
        Ok(None)
    }

    async fn set_with_ttl(&self, key: &str, value: Bytes, ttl: Duration) -> Result<(), KvError> {
        let expires_at = Instant::now() + ttl;
        self.entries
            .insert(key.to_string(), Entry { value, expires_at });
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), KvError> {
        self.entries.remove(key);
        Ok(())
    }

    async fn ping(&self) -> Result<(), KvError> {
        Ok(())
    }
}
