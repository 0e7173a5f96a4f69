//! Redis-backed [`KvStore`].

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use redis::{Client, RedisResult, aio::ConnectionManager};
use tokio::sync::OnceCell;
use tracing::trace;

use crate::cache::{KvError, KvStore};

/// Lazily connected Redis client. Every call is bounded by `timeout`.
pub struct RedisKvStore {
    client: Client,
    connection: OnceCell<ConnectionManager>,
    timeout: Duration,
}

impl RedisKvStore {
    pub fn open(url: &str, timeout: Duration) -> Result<Self, KvError> {
        let client = Client::open(url).map_err(|err| KvError::unavailable(err.to_string()))?;
        Ok(Self {
            client,
            connection: OnceCell::new(),
            timeout,
        })
    }

    async fn connection(&self) -> Result<ConnectionManager, KvError> {
        let manager = self
            .connection
            .get_or_try_init(|| {
                trace!(target = "lectern::infra::kv", "initializing redis connection manager");
                self.bounded(self.client.get_connection_manager())
            })
            .await?;
        Ok(manager.clone())
    }

    async fn bounded<T, Fut>(&self, call: Fut) -> Result<T, KvError>
    where
        Fut: Future<Output = RedisResult<T>>,
    {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(err)) => Err(KvError::unavailable(err.to_string())),
            Err(_) => Err(KvError::Timeout(self.timeout)),
        }
    }
}

#[async_trait]
impl KvStore for RedisKvStore {
    async fn get(&self, key: &str) -> Result<Option<Bytes>, KvError> {
        let mut con = self.connection().await?;
        let mut cmd = redis::cmd("GET");
        cmd.arg(key);
        let value: Option<Vec<u8>> = self.bounded(cmd.query_async(&mut con)).await?;
        Ok(value.map(Bytes::from))
    }

    async fn set_with_ttl(&self, key: &str, value: Bytes, ttl: Duration) -> Result<(), KvError> {
        let mut con = self.connection().await?;
        let millis = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1);
        let mut cmd = redis::cmd("SET");
        cmd.arg(key).arg(value.as_ref()).arg("PX").arg(millis);
        self.bounded(cmd.query_async::<()>(&mut con)).await
    }

    async fn delete(&self, key: &str) -> Result<(), KvError> {
        let mut con = self.connection().await?;
        let mut cmd = redis::cmd("DEL");
        cmd.arg(key);
        let _deleted: i64 = self.bounded(cmd.query_async(&mut con)).await?;
        Ok(())
    }

    async fn ping(&self) -> Result<(), KvError> {
        let mut con = self.connection().await?;
        let cmd = redis::cmd("PING");
        let _pong: String = self.bounded(cmd.query_async(&mut con)).await?;
        Ok(())
    }
}
