use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::{error, info};

use crate::application::repos::{RepoError, UsersRepo, with_deadline};
use crate::cache::{Admission, AdmissionClass, AdmissionRejected, CacheAside, CacheKey, FetchError};
use crate::domain::entities::UserInfo;
use crate::domain::error::DomainError;
use crate::domain::types::Rank;
use crate::domain::users::is_admin;

const SOURCE: &str = "lectern::application::users";

#[derive(Debug, Error)]
pub enum UserServiceError {
    #[error("user `{0}` not found")]
    NotFound(String),
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Overloaded(#[from] AdmissionRejected),
    #[error("backing store call timed out after {0:?}")]
    Timeout(Duration),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

#[derive(Clone)]
pub struct UserService {
    users: Arc<dyn UsersRepo>,
    cache: CacheAside,
    admission: Arc<Admission>,
    ttl: Duration,
    backend_timeout: Duration,
}

impl UserService {
    pub fn new(
        users: Arc<dyn UsersRepo>,
        cache: CacheAside,
        admission: Arc<Admission>,
        ttl: Duration,
        backend_timeout: Duration,
    ) -> Self {
        Self {
            users,
            cache,
            admission,
            ttl,
            backend_timeout,
        }
    }

    pub async fn rank(&self, username: &str) -> Result<Rank, UserServiceError> {
        let users = Arc::clone(&self.users);
        let name = username.to_string();
        self.cache
            .fetch_or_compute(
                &CacheKey::UserRank(username.to_string()).to_string(),
                self.ttl,
                self.admission.controller(AdmissionClass::UserRead),
                || async move {
                    users
                        .find_user(&name)
                        .await?
                        .map(|user| user.rank)
                        .ok_or(RepoError::NotFound)
                },
            )
            .await
            .map_err(|err| match err {
                FetchError::Overloaded(rejected) => UserServiceError::Overloaded(rejected),
                FetchError::Timeout(limit) => UserServiceError::Timeout(limit),
                FetchError::Source(RepoError::NotFound) => {
                    UserServiceError::NotFound(username.to_string())
                }
                FetchError::Source(err) => UserServiceError::Repo(err),
            })
    }

    /// Every account with its rank. Admin only; never cached.
    pub async fn list_users(&self, actor: &str) -> Result<Vec<UserInfo>, UserServiceError> {
        require_admin(actor, "list users")?;

        let users = Arc::clone(&self.users);
        let deadline = self.backend_timeout;
        let listed = self
            .admission
            .controller(AdmissionClass::UserRead)
            .admit(|| async move { with_deadline(deadline, users.list_users()).await })
            .await??;
        Ok(listed)
    }

    /// Applies all rank changes in one transaction, then drops the cached ranks.
    pub async fn set_ranks(
        &self,
        actor: &str,
        changes: &[UserInfo],
    ) -> Result<(), UserServiceError> {
        require_admin(actor, "change ranks")?;
        if changes.is_empty() {
            return Ok(());
        }

        with_deadline(self.backend_timeout, self.users.update_ranks(changes)).await?;

        for change in changes {
            let key = CacheKey::UserRank(change.username.clone());
            if let Err(err) = self.cache.invalidate(&key.to_string()).await {
                error!(target = SOURCE, key = %key, error = %err, "failed to invalidate cache entry");
            }
        }
        info!(target = SOURCE, actor, count = changes.len(), "ranks updated");

        Ok(())
    }
}

fn require_admin(actor: &str, action: &'static str) -> Result<(), DomainError> {
    if is_admin(actor) {
        Ok(())
    } else {
        Err(DomainError::forbidden(actor, action))
    }
}
