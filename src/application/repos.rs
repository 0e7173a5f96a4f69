//! Repository traits describing persistence adapters.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::entities::{PostInfo, PostRecord, UserInfo, UserRecord};
use crate::domain::types::{Rank, Star};

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("duplicate record violates unique constraint `{constraint}`")]
    Duplicate { constraint: String },
    #[error("resource not found")]
    NotFound,
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("integrity error: {message}")]
    Integrity { message: String },
    #[error("database timeout")]
    Timeout,
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }
}

/// Bounds a repository call by `limit`, reporting [`RepoError::Timeout`] when it elapses.
pub async fn with_deadline<T, Fut>(limit: Duration, call: Fut) -> Result<T, RepoError>
where
    Fut: Future<Output = Result<T, RepoError>>,
{
    tokio::time::timeout(limit, call)
        .await
        .map_err(|_| RepoError::Timeout)?
}

#[derive(Debug, Clone)]
pub struct CreatePostParams {
    pub title: String,
    pub author: String,
    pub body: String,
}

#[derive(Debug, Clone)]
pub struct UpdatePostParams {
    pub id: i64,
    pub title: String,
    pub body: String,
}

#[derive(Debug, Clone)]
pub struct CreateUserParams {
    pub username: String,
    pub password_hash: String,
    pub rank: Rank,
}

#[async_trait]
pub trait PostsRepo: Send + Sync {
    async fn find_post(&self, id: i64) -> Result<Option<PostRecord>, RepoError>;

    async fn find_post_info(&self, id: i64) -> Result<Option<PostInfo>, RepoError>;

    async fn list_post_infos(&self) -> Result<Vec<PostInfo>, RepoError>;

    async fn list_authors(&self) -> Result<Vec<String>, RepoError>;
}

#[async_trait]
pub trait PostsWriteRepo: Send + Sync {
    async fn create_post(&self, params: CreatePostParams) -> Result<PostRecord, RepoError>;

    /// Fails with [`RepoError::NotFound`] when the post does not exist.
    async fn update_post(&self, params: UpdatePostParams) -> Result<PostRecord, RepoError>;

    async fn delete_post(&self, id: i64) -> Result<(), RepoError>;

    /// Adds one vote with `star` stars, creating the statistics row when absent.
    async fn record_vote(&self, post_id: i64, star: Star) -> Result<(), RepoError>;
}

#[async_trait]
pub trait UsersRepo: Send + Sync {
    async fn find_user(&self, username: &str) -> Result<Option<UserRecord>, RepoError>;

    /// Fails with [`RepoError::Duplicate`] when the username is taken.
    async fn create_user(&self, params: CreateUserParams) -> Result<(), RepoError>;

    async fn list_users(&self) -> Result<Vec<UserInfo>, RepoError>;

    /// Applies every rank change or none of them.
    async fn update_ranks(&self, changes: &[UserInfo]) -> Result<(), RepoError>;
}

#[async_trait]
pub trait HealthRepo: Send + Sync {
    /// Succeeds when the backing store answers a trivial query.
    async fn health_check(&self) -> Result<(), RepoError>;
}
