//! Postgres-backed repository implementations.

mod posts;
mod users;
mod util;

pub use util::map_sqlx_error;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use sqlx::{
    Postgres, Transaction,
    postgres::{PgPool, PgPoolOptions},
    query,
};
use tracing::warn;

use crate::application::repos::{HealthRepo, RepoError};
use crate::config::DatabaseSettings;
use crate::infra::error::InfraError;

const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(3);

#[derive(Clone)]
pub struct PostgresRepositories {
    pool: Arc<PgPool>,
}

impl PostgresRepositories {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn begin(&self) -> Result<Transaction<'_, Postgres>, sqlx::Error> {
        self.pool.begin().await
    }

    pub async fn connect(url: &str, max_connections: u32) -> Result<PgPool, sqlx::Error> {
        PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(ACQUIRE_TIMEOUT)
            .connect(url)
            .await
    }

    /// Connects, retrying a fixed number of times while the database comes up.
    pub async fn connect_with_retry(settings: &DatabaseSettings) -> Result<PgPool, InfraError> {
        let url = settings
            .url
            .as_deref()
            .ok_or_else(|| InfraError::configuration("database.url is not set"))?;
        let attempts = settings.connect_attempts.get();

        let mut attempt = 1;
        loop {
            match Self::connect(url, settings.max_connections.get()).await {
                Ok(pool) => return Ok(pool),
                Err(err) if attempt < attempts => {
                    warn!(
                        target = "lectern::infra::db",
                        attempt,
                        attempts,
                        error = %err,
                        "database connection failed; retrying"
                    );
                    tokio::time::sleep(settings.connect_retry).await;
                    attempt += 1;
                }
                Err(err) => {
                    return Err(InfraError::database(format!(
                        "failed to connect after {attempts} attempts: {err}"
                    )));
                }
            }
        }
    }

    pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
        sqlx::migrate!("./migrations")
            .run(pool)
            .await
            .map_err(Into::into)
    }
}

#[async_trait]
impl HealthRepo for PostgresRepositories {
    async fn health_check(&self) -> Result<(), RepoError> {
        query("SELECT 1")
            .execute(self.pool())
            .await
            .map(|_| ())
            .map_err(map_sqlx_error)
    }
}
