use std::error::Error as StdError;
use std::time::Duration;

use axum::{
    Json,
    http::{HeaderValue, StatusCode, header::RETRY_AFTER},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::application::accounts::AccountError;
use crate::application::posts::PostServiceError;
use crate::application::repos::RepoError;
use crate::application::session::SessionError;
use crate::application::users::UserServiceError;
use crate::cache::{AdmissionRejected, KvError};
use crate::domain::error::DomainError;
use crate::infra::error::InfraError;

/// Seconds a client is asked to wait after an admission rejection.
const RETRY_AFTER_SECS: u64 = 1;

pub mod codes {
    pub const BAD_REQUEST: &str = "bad_request";
    pub const UNAUTHORIZED: &str = "unauthorized";
    pub const FORBIDDEN: &str = "forbidden";
    pub const NOT_FOUND: &str = "not_found";
    pub const CONFLICT: &str = "conflict";
    pub const OVERLOADED: &str = "overloaded";
    pub const TIMEOUT: &str = "timeout";
    pub const INTERNAL: &str = "internal";
}

#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub source: &'static str,
    pub status: StatusCode,
    pub messages: Vec<String>,
}

impl ErrorReport {
    pub fn from_error(source: &'static str, status: StatusCode, error: &dyn StdError) -> Self {
        let mut messages = vec![error.to_string()];
        let mut current = error.source();
        while let Some(inner) = current {
            messages.push(inner.to_string());
            current = inner.source();
        }
        Self {
            source,
            status,
            messages,
        }
    }

    pub fn attach(self, response: &mut Response) {
        response.extensions_mut().insert(self);
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub success: bool,
    pub code: &'static str,
    pub message: &'static str,
}

/// Client-facing failure: a fixed public message plus a detailed report for the log.
#[derive(Debug)]
pub struct HttpError {
    status: StatusCode,
    code: &'static str,
    public_message: &'static str,
    retry_after: Option<Duration>,
    report: ErrorReport,
}

impl HttpError {
    pub fn from_error(
        source: &'static str,
        status: StatusCode,
        code: &'static str,
        public_message: &'static str,
        error: &dyn StdError,
    ) -> Self {
        Self {
            status,
            code,
            public_message,
            retry_after: None,
            report: ErrorReport::from_error(source, status, error),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    fn with_retry_after(mut self, wait: Duration) -> Self {
        self.retry_after = Some(wait);
        self
    }

    fn internal(source: &'static str, error: &dyn StdError) -> Self {
        Self::from_error(
            source,
            StatusCode::INTERNAL_SERVER_ERROR,
            codes::INTERNAL,
            "Internal server error",
            error,
        )
    }

    fn overloaded(source: &'static str, error: &AdmissionRejected) -> Self {
        Self::from_error(
            source,
            StatusCode::SERVICE_UNAVAILABLE,
            codes::OVERLOADED,
            "Server is busy, try again shortly",
            error,
        )
        .with_retry_after(Duration::from_secs(RETRY_AFTER_SECS))
    }

    fn timeout(source: &'static str, error: &dyn StdError) -> Self {
        Self::from_error(
            source,
            StatusCode::SERVICE_UNAVAILABLE,
            codes::TIMEOUT,
            "Service temporarily unavailable",
            error,
        )
    }

    fn domain(source: &'static str, error: &DomainError) -> Self {
        match error {
            DomainError::NotFound { .. } => Self::from_error(
                source,
                StatusCode::NOT_FOUND,
                codes::NOT_FOUND,
                "Resource not found",
                error,
            ),
            DomainError::Validation { .. } => Self::from_error(
                source,
                StatusCode::BAD_REQUEST,
                codes::BAD_REQUEST,
                "Request could not be processed",
                error,
            ),
            DomainError::Forbidden { .. } => Self::from_error(
                source,
                StatusCode::FORBIDDEN,
                codes::FORBIDDEN,
                "Operation not permitted",
                error,
            ),
        }
    }

    fn repo(source: &'static str, error: &RepoError) -> Self {
        match error {
            RepoError::Timeout => Self::timeout(source, error),
            RepoError::NotFound => Self::from_error(
                source,
                StatusCode::NOT_FOUND,
                codes::NOT_FOUND,
                "Resource not found",
                error,
            ),
            _ => Self::internal(source, error),
        }
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            success: false,
            code: self.code,
            message: self.public_message,
        };
        let mut response = (self.status, Json(body)).into_response();
        if let Some(wait) = self.retry_after
            && let Ok(value) = HeaderValue::from_str(&wait.as_secs().to_string())
        {
            response.headers_mut().insert(RETRY_AFTER, value);
        }
        self.report.attach(&mut response);
        response
    }
}

impl From<SessionError> for HttpError {
    fn from(error: SessionError) -> Self {
        const SOURCE: &str = "infra::http::session_error_to_http_error";
        if error.is_unauthenticated() {
            let message = match error {
                SessionError::InvalidCredentials => "Invalid username or password",
                _ => "Sign in required",
            };
            return Self::from_error(
                SOURCE,
                StatusCode::UNAUTHORIZED,
                codes::UNAUTHORIZED,
                message,
                &error,
            );
        }

        match &error {
            SessionError::Store(crate::cache::CacheError::Kv(KvError::Timeout(_))) => {
                Self::timeout(SOURCE, &error)
            }
            SessionError::Domain(domain) => Self::domain(SOURCE, domain),
            SessionError::Repo(repo) => Self::repo(SOURCE, repo),
            _ => Self::internal(SOURCE, &error),
        }
    }
}

impl From<AccountError> for HttpError {
    fn from(error: AccountError) -> Self {
        const SOURCE: &str = "infra::http::account_error_to_http_error";
        match &error {
            AccountError::Domain(domain) => Self::domain(SOURCE, domain),
            AccountError::UsernameTaken(_) => Self::from_error(
                SOURCE,
                StatusCode::CONFLICT,
                codes::CONFLICT,
                "Username is already taken",
                &error,
            ),
            AccountError::Hashing(_) => Self::internal(SOURCE, &error),
            AccountError::Repo(repo) => Self::repo(SOURCE, repo),
        }
    }
}

impl From<PostServiceError> for HttpError {
    fn from(error: PostServiceError) -> Self {
        const SOURCE: &str = "infra::http::post_error_to_http_error";
        match &error {
            PostServiceError::NotFound(_) => Self::from_error(
                SOURCE,
                StatusCode::NOT_FOUND,
                codes::NOT_FOUND,
                "Post not found",
                &error,
            ),
            PostServiceError::Domain(domain) => Self::domain(SOURCE, domain),
            PostServiceError::Overloaded(rejected) => Self::overloaded(SOURCE, rejected),
            PostServiceError::Timeout(_) => Self::timeout(SOURCE, &error),
            PostServiceError::Repo(repo) => Self::repo(SOURCE, repo),
        }
    }
}

impl From<UserServiceError> for HttpError {
    fn from(error: UserServiceError) -> Self {
        const SOURCE: &str = "infra::http::user_error_to_http_error";
        match &error {
            UserServiceError::NotFound(_) => Self::from_error(
                SOURCE,
                StatusCode::NOT_FOUND,
                codes::NOT_FOUND,
                "User not found",
                &error,
            ),
            UserServiceError::Domain(domain) => Self::domain(SOURCE, domain),
            UserServiceError::Overloaded(rejected) => Self::overloaded(SOURCE, rejected),
            UserServiceError::Timeout(_) => Self::timeout(SOURCE, &error),
            UserServiceError::Repo(repo) => Self::repo(SOURCE, repo),
        }
    }
}

/// Failures that stop the process before or while serving.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error(transparent)]
    Config(#[from] crate::config::LoadError),
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl AppError {
    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected(message.into())
    }
}
