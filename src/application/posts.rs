//! Post reads through the cache, and writes that invalidate what they change.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tracing::{error, info};

use crate::application::repos::{
    CreatePostParams, PostsRepo, PostsWriteRepo, RepoError, UpdatePostParams, with_deadline,
};
use crate::cache::{Admission, AdmissionClass, AdmissionRejected, CacheAside, CacheKey, FetchError};
use crate::domain::entities::{PostInfo, PostRecord};
use crate::domain::error::DomainError;
use crate::domain::posts::{
    Permissions, VoteSummary, creation_permissions, post_permissions, validate_title,
};
use crate::domain::types::Star;
use crate::domain::users::validate_username;

const SOURCE: &str = "lectern::application::posts";

#[derive(Debug, Error)]
pub enum PostServiceError {
    #[error("post {0} not found")]
    NotFound(i64),
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Overloaded(#[from] AdmissionRejected),
    #[error("backing store call timed out after {0:?}")]
    Timeout(Duration),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

impl From<FetchError<RepoError>> for PostServiceError {
    fn from(err: FetchError<RepoError>) -> Self {
        match err {
            FetchError::Overloaded(rejected) => Self::Overloaded(rejected),
            FetchError::Timeout(limit) => Self::Timeout(limit),
            FetchError::Source(err) => Self::Repo(err),
        }
    }
}

fn not_found_as(id: i64) -> impl FnOnce(FetchError<RepoError>) -> PostServiceError {
    move |err| match err {
        FetchError::Source(RepoError::NotFound) => PostServiceError::NotFound(id),
        other => other.into(),
    }
}

#[derive(Debug, Clone)]
pub struct SavePostCommand {
    /// Zero creates a new post.
    pub id: i64,
    pub title: String,
    pub body: String,
}

/// A post as presented to one viewer.
#[derive(Debug, Clone, Serialize)]
pub struct PostView {
    #[serde(flatten)]
    pub info: PostInfo,
    pub votes: VoteSummary,
    pub permissions: Permissions,
}

#[derive(Clone)]
pub struct PostService {
    reader: Arc<dyn PostsRepo>,
    writer: Arc<dyn PostsWriteRepo>,
    cache: CacheAside,
    admission: Arc<Admission>,
    ttl: Duration,
    backend_timeout: Duration,
}

impl PostService {
    pub fn new(
        reader: Arc<dyn PostsRepo>,
        writer: Arc<dyn PostsWriteRepo>,
        cache: CacheAside,
        admission: Arc<Admission>,
        ttl: Duration,
        backend_timeout: Duration,
    ) -> Self {
        Self {
            reader,
            writer,
            cache,
            admission,
            ttl,
            backend_timeout,
        }
    }

    pub async fn post(&self, id: i64) -> Result<PostRecord, PostServiceError> {
        let reader = Arc::clone(&self.reader);
        self.cache
            .fetch_or_compute(
                &CacheKey::Post(id).to_string(),
                self.ttl,
                self.admission.controller(AdmissionClass::PostRead),
                || async move { reader.find_post(id).await?.ok_or(RepoError::NotFound) },
            )
            .await
            .map_err(not_found_as(id))
    }

    pub async fn post_info(&self, id: i64) -> Result<PostInfo, PostServiceError> {
        let reader = Arc::clone(&self.reader);
        self.cache
            .fetch_or_compute(
                &CacheKey::PostInfo(id).to_string(),
                self.ttl,
                self.admission.controller(AdmissionClass::PostRead),
                || async move { reader.find_post_info(id).await?.ok_or(RepoError::NotFound) },
            )
            .await
            .map_err(not_found_as(id))
    }

    pub async fn post_infos(&self) -> Result<Vec<PostInfo>, PostServiceError> {
        let reader = Arc::clone(&self.reader);
        let infos = self
            .cache
            .fetch_or_compute(
                &CacheKey::PostInfos.to_string(),
                self.ttl,
                self.admission.controller(AdmissionClass::PostList),
                || async move { reader.list_post_infos().await },
            )
            .await?;
        Ok(infos)
    }

    pub async fn authors(&self) -> Result<Vec<String>, PostServiceError> {
        let reader = Arc::clone(&self.reader);
        let authors = self
            .cache
            .fetch_or_compute(
                &CacheKey::Authors.to_string(),
                self.ttl,
                self.admission.controller(AdmissionClass::PostList),
                || async move { reader.list_authors().await },
            )
            .await?;
        Ok(authors)
    }

    /// What `username` may do with post `id`; zero means a post not yet created.
    pub async fn permissions(
        &self,
        username: &str,
        id: i64,
    ) -> Result<Permissions, PostServiceError> {
        if id < 0 {
            return Ok(Permissions::NONE);
        }
        if id == 0 {
            return Ok(creation_permissions(username));
        }

        let post = self.post(id).await?;
        Ok(post_permissions(username, &post))
    }

    /// Only existing posts can be viewed; ids that never name a stored post are not found.
    pub async fn view(&self, username: &str, id: i64) -> Result<PostView, PostServiceError> {
        if id <= 0 {
            return Err(PostServiceError::NotFound(id));
        }

        let permissions = self.permissions(username, id).await?;
        if !permissions.view {
            return Err(DomainError::forbidden(username, "view this post").into());
        }

        let info = self.post_info(id).await?;
        let votes = info.statistics.summary();
        Ok(PostView {
            info,
            votes,
            permissions,
        })
    }

    pub async fn save(
        &self,
        username: &str,
        command: SavePostCommand,
    ) -> Result<PostRecord, PostServiceError> {
        validate_title(&command.title)?;
        validate_username(username)?;

        let permissions = self.permissions(username, command.id).await?;
        if !permissions.edit {
            return Err(DomainError::forbidden(username, "edit this post").into());
        }

        let record = if command.id == 0 {
            let params = CreatePostParams {
                title: command.title.trim().to_string(),
                author: username.to_string(),
                body: command.body,
            };
            with_deadline(self.backend_timeout, self.writer.create_post(params)).await?
        } else {
            let params = UpdatePostParams {
                id: command.id,
                title: command.title.trim().to_string(),
                body: command.body,
            };
            with_deadline(self.backend_timeout, self.writer.update_post(params))
                .await
                .map_err(|err| match err {
                    RepoError::NotFound => PostServiceError::NotFound(command.id),
                    other => other.into(),
                })?
        };

        self.invalidate(&CacheKey::dependents_of_post(record.id))
            .await;
        info!(target = SOURCE, post_id = record.id, author = %record.author, "post saved");

        Ok(record)
    }

    pub async fn delete(&self, username: &str, id: i64) -> Result<(), PostServiceError> {
        let permissions = self.permissions(username, id).await?;
        if !permissions.delete {
            return Err(DomainError::forbidden(username, "delete this post").into());
        }

        with_deadline(self.backend_timeout, self.writer.delete_post(id)).await?;
        self.invalidate(&CacheKey::dependents_of_post(id)).await;
        info!(target = SOURCE, post_id = id, actor = username, "post deleted");

        Ok(())
    }

    pub async fn vote(&self, id: i64, star: Star) -> Result<(), PostServiceError> {
        self.post(id).await?;

        with_deadline(self.backend_timeout, self.writer.record_vote(id, star)).await?;
        self.invalidate(&[CacheKey::PostInfo(id), CacheKey::PostInfos])
            .await;

        Ok(())
    }

    /// Runs after the write has committed; a failure leaves the entry to expire on its own.
    async fn invalidate(&self, keys: &[CacheKey]) {
        for key in keys {
            if let Err(err) = self.cache.invalidate(&key.to_string()).await {
                error!(
                    target = SOURCE,
                    key = %key,
                    error = %err,
                    "failed to invalidate cache entry"
                );
            }
        }
    }
}
