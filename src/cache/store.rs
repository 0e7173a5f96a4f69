//! Cache-aside reads over a [`KvStore`].
//!
//! A lookup that hits returns the stored value and never touches the backing store.
//! A miss runs the supplied computation under admission control and a deadline, then
//! populates the key on a best-effort basis. Writers call [`CacheAside::invalidate`]
//! after committing; nothing here coordinates concurrent writers.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{debug, warn};

use super::admission::{AdmissionController, AdmissionRejected};
use super::config::CacheConfig;
use super::keys::namespaced;
use super::kv::{KvError, KvStore};

const SOURCE: &str = "lectern::cache::store";

/// Failure writing an entry.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error(transparent)]
    Kv(#[from] KvError),
    #[error("failed to encode cache value: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Failure of [`CacheAside::fetch_or_compute`].
///
/// Key-value store trouble never shows up here: a failed lookup is a miss and a failed
/// populate is logged.
#[derive(Debug, Error)]
pub enum FetchError<E> {
    #[error(transparent)]
    Overloaded(#[from] AdmissionRejected),
    #[error("backing store call timed out after {0:?}")]
    Timeout(Duration),
    #[error(transparent)]
    Source(E),
}

/// Serialized view of one namespace of the key-value store.
#[derive(Clone)]
pub struct CacheAside {
    kv: Arc<dyn KvStore>,
    namespace: Arc<str>,
    enabled: bool,
    backend_timeout: Duration,
}

impl CacheAside {
    pub fn new(kv: Arc<dyn KvStore>, config: &CacheConfig, backend_timeout: Duration) -> Self {
        Self {
            kv,
            namespace: Arc::from(config.namespace.as_str()),
            enabled: config.enabled,
            backend_timeout,
        }
    }

    /// Same store under another namespace, always enabled. Used for sessions.
    pub fn scoped(&self, namespace: &str) -> Self {
        Self {
            kv: Arc::clone(&self.kv),
            namespace: Arc::from(namespace),
            enabled: true,
            backend_timeout: self.backend_timeout,
        }
    }

    fn full_key(&self, key: &str) -> String {
        namespaced(&self.namespace, key)
    }

    /// Returns the decoded value under `key`.
    ///
    /// An entry that no longer decodes as `V` is reported as absent.
    pub async fn lookup<V>(&self, key: &str) -> Result<Option<V>, KvError>
    where
        V: DeserializeOwned,
    {
        let full_key = self.full_key(key);
        let Some(bytes) = self.kv.get(&full_key).await? else {
            return Ok(None);
        };

        match serde_json::from_slice(&bytes) {
            Ok(value) => Ok(Some(value)),
            Err(err) => {
                debug!(target = SOURCE, key = %full_key, error = %err, "discarding undecodable entry");
                Ok(None)
            }
        }
    }

    /// Writes `value` under `key` with the given lifetime.
    pub async fn store<V>(&self, key: &str, value: &V, ttl: Duration) -> Result<(), CacheError>
    where
        V: Serialize + ?Sized,
    {
        let encoded = serde_json::to_vec(value)?;
        self.kv
            .set_with_ttl(&self.full_key(key), Bytes::from(encoded), ttl)
            .await?;
        Ok(())
    }

    /// Removes `key`; removing an absent key succeeds.
    pub async fn invalidate(&self, key: &str) -> Result<(), KvError> {
        self.kv.delete(&self.full_key(key)).await
    }

    /// Read-through lookup.
    ///
    /// On a hit the stored value is returned. On a miss `compute` runs inside `gate` and the
    /// configured deadline; its error is returned as [`FetchError::Source`] and nothing is
    /// cached. A successful result is written back before returning.
    pub async fn fetch_or_compute<V, E, F, Fut>(
        &self,
        key: &str,
        ttl: Duration,
        gate: &AdmissionController,
        compute: F,
    ) -> Result<V, FetchError<E>>
    where
        V: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        if self.enabled {
            match self.lookup::<V>(key).await {
                Ok(Some(value)) => {
                    metrics::counter!("lectern_cache_hit_total").increment(1);
                    debug!(target = SOURCE, key, "cache hit");
                    return Ok(value);
                }
                Ok(None) => debug!(target = SOURCE, key, "cache miss"),
                Err(err) => {
                    warn!(target = SOURCE, key, error = %err, "cache lookup failed; treating as miss");
                }
            }
            metrics::counter!("lectern_cache_miss_total").increment(1);
        }

        let deadline = self.backend_timeout;
        let value = gate
            .admit(move || async move { tokio::time::timeout(deadline, compute()).await })
            .await?
            .map_err(|_| FetchError::Timeout(deadline))?
            .map_err(FetchError::Source)?;

        if self.enabled {
            if let Err(err) = self.store(key, &value, ttl).await {
                metrics::counter!("lectern_cache_populate_failed_total").increment(1);
                warn!(target = SOURCE, key, error = %err, "failed to populate cache entry");
            }
        }

        Ok(value)
    }
}
