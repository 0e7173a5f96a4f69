//! Session issuance and validation.
//!
//! A session maps a subject (username) to one opaque token in the key-value store, under the
//! session namespace, with a fixed lifetime. Signing in again replaces the token, so the
//! previous session stops validating. The client presents both the subject and the token;
//! they are accepted only when the store holds exactly that token for that subject.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;
use thiserror::Error;
use time::OffsetDateTime;
use tracing::{debug, info};
use uuid::Uuid;

use crate::application::passwords::verify_password;
use crate::application::repos::{RepoError, UsersRepo, with_deadline};
use crate::cache::{CacheAside, CacheError, KvError};
use crate::domain::error::DomainError;
use crate::domain::users::{Credentials, validate_username};

const SOURCE: &str = "lectern::application::session";

/// Default session lifetime: 30 days.
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(30 * 24 * 60 * 60);

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session markers are missing")]
    MissingMarkers,
    #[error("no live session for `{subject}`")]
    NoSession { subject: String },
    #[error("presented token does not match the session for `{subject}`")]
    Mismatched { subject: String },
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("session store failure: {0}")]
    Store(#[from] CacheError),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

impl From<KvError> for SessionError {
    fn from(err: KvError) -> Self {
        Self::Store(CacheError::Kv(err))
    }
}

impl SessionError {
    /// The client must authenticate again; anything else is a server-side failure.
    pub fn is_unauthenticated(&self) -> bool {
        matches!(
            self,
            SessionError::MissingMarkers
                | SessionError::NoSession { .. }
                | SessionError::Mismatched { .. }
                | SessionError::InvalidCredentials
        )
    }

    /// The client's markers name a subject whose live session carries a different token.
    pub fn clears_markers(&self) -> bool {
        matches!(self, SessionError::Mismatched { .. })
    }
}

/// A freshly issued session, handed to the client as two markers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub subject: String,
    pub token: String,
    pub ttl: Duration,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SessionRecord {
    token: String,
    #[serde(with = "time::serde::rfc3339")]
    issued_at: OffsetDateTime,
}

#[derive(Clone)]
pub struct SessionManager {
    sessions: CacheAside,
    users: Arc<dyn UsersRepo>,
    ttl: Duration,
    backend_timeout: Duration,
}

impl SessionManager {
    /// `sessions` must be scoped to the session namespace.
    pub fn new(
        sessions: CacheAside,
        users: Arc<dyn UsersRepo>,
        ttl: Duration,
        backend_timeout: Duration,
    ) -> Self {
        Self {
            sessions,
            users,
            ttl,
            backend_timeout,
        }
    }

    /// Verifies credentials and issues a new token, replacing any existing session.
    pub async fn sign_in(&self, credentials: &Credentials) -> Result<Session, SessionError> {
        validate_username(&credentials.username)?;

        let user = with_deadline(
            self.backend_timeout,
            self.users.find_user(&credentials.username),
        )
        .await?
        .ok_or(SessionError::InvalidCredentials)?;

        if !verify_password(&credentials.password, &user.password_hash) {
            debug!(target = SOURCE, subject = %user.username, "password rejected");
            return Err(SessionError::InvalidCredentials);
        }

        let token = generate_token();
        let record = SessionRecord {
            token: token.clone(),
            issued_at: OffsetDateTime::now_utc(),
        };
        self.sessions
            .store(&user.username, &record, self.ttl)
            .await?;

        info!(target = SOURCE, subject = %user.username, "session issued");

        Ok(Session {
            subject: user.username,
            token,
            ttl: self.ttl,
        })
    }

    /// Returns the subject when `token` is the live token for `subject`.
    ///
    /// Empty markers count as absent.
    pub async fn validate(
        &self,
        token: Option<&str>,
        subject: Option<&str>,
    ) -> Result<String, SessionError> {
        let (Some(token), Some(subject)) = (
            token.filter(|value| !value.is_empty()),
            subject.filter(|value| !value.is_empty()),
        ) else {
            return Err(SessionError::MissingMarkers);
        };

        let record = self
            .sessions
            .lookup::<SessionRecord>(subject)
            .await?
            .ok_or_else(|| SessionError::NoSession {
                subject: subject.to_string(),
            })?;

        if !bool::from(record.token.as_bytes().ct_eq(token.as_bytes())) {
            debug!(target = SOURCE, subject, "stale session token presented");
            return Err(SessionError::Mismatched {
                subject: subject.to_string(),
            });
        }

        Ok(subject.to_string())
    }

    /// Ends the session for `subject`. Signing out twice succeeds.
    pub async fn sign_out(&self, subject: &str) -> Result<(), SessionError> {
        self.sessions.invalidate(subject).await?;
        info!(target = SOURCE, subject, "session ended");
        Ok(())
    }
}

fn generate_token() -> String {
    let first = Uuid::new_v4().simple();
    let second = Uuid::new_v4().simple();
    format!("{first}{second}")
}
