use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::info;

use crate::application::passwords::{PasswordHashError, hash_password};
use crate::application::repos::{CreateUserParams, RepoError, UsersRepo, with_deadline};
use crate::domain::entities::UserInfo;
use crate::domain::error::DomainError;
use crate::domain::types::Rank;
use crate::domain::users::{Credentials, validate_username};

#[derive(Debug, Error)]
pub enum AccountError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("username `{0}` is already taken")]
    UsernameTaken(String),
    #[error(transparent)]
    Hashing(#[from] PasswordHashError),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

#[derive(Clone)]
pub struct AccountService {
    users: Arc<dyn UsersRepo>,
    backend_timeout: Duration,
}

impl AccountService {
    pub fn new(users: Arc<dyn UsersRepo>, backend_timeout: Duration) -> Self {
        Self {
            users,
            backend_timeout,
        }
    }

    /// Registers a new bronze-ranked account. Does not sign the user in.
    pub async fn sign_up(&self, credentials: &Credentials) -> Result<UserInfo, AccountError> {
        validate_username(&credentials.username)?;
        if credentials.password.is_empty() {
            return Err(DomainError::validation("password must not be empty").into());
        }

        let params = CreateUserParams {
            username: credentials.username.clone(),
            password_hash: hash_password(&credentials.password)?,
            rank: Rank::Bronze,
        };

        match with_deadline(self.backend_timeout, self.users.create_user(params)).await {
            Ok(()) => {}
            Err(RepoError::Duplicate { .. }) => {
                return Err(AccountError::UsernameTaken(credentials.username.clone()));
            }
            Err(err) => return Err(err.into()),
        }

        info!(
            target = "lectern::application::accounts",
            username = %credentials.username,
            "account created"
        );

        Ok(UserInfo {
            username: credentials.username.clone(),
            rank: Rank::Bronze,
        })
    }
}
