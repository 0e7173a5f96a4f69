//! Key-value store adapters selected by configuration.

mod redis;

pub use self::redis::RedisKvStore;

use std::sync::Arc;

use tracing::info;

use crate::cache::{InMemoryKvStore, KvError, KvStore};
use crate::config::{KvBackend, KvSettings};

/// Builds the configured store and checks that it answers.
pub async fn connect(settings: &KvSettings) -> Result<Arc<dyn KvStore>, KvError> {
    let store: Arc<dyn KvStore> = match &settings.backend {
        KvBackend::Redis(url) => Arc::new(RedisKvStore::open(url, settings.timeout)?),
        KvBackend::Memory => Arc::new(InMemoryKvStore::new()),
    };

    store.ping().await?;
    info!(
        target = "lectern::infra::kv",
        backend = match settings.backend {
            KvBackend::Redis(_) => "redis",
            KvBackend::Memory => "memory",
        },
        "key-value store reachable"
    );

    Ok(store)
}
