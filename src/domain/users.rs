//! Account rules shared by sign-up, sign-in, and administration.

use std::fmt;

use serde::Deserialize;

use super::error::DomainError;

pub const SUPERADMIN: &str = "superadmin";
pub const ADMIN: &str = "admin";

const USERNAME_MIN_LEN: usize = 3;
const USERNAME_MAX_LEN: usize = 10;

/// Usernames are 3 to 10 ASCII letters or digits.
pub fn validate_username(username: &str) -> Result<(), DomainError> {
    let len = username.len();
    if !(USERNAME_MIN_LEN..=USERNAME_MAX_LEN).contains(&len) {
        return Err(DomainError::validation(format!(
            "username must be {USERNAME_MIN_LEN} to {USERNAME_MAX_LEN} characters"
        )));
    }
    if !username.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(DomainError::validation(
            "username may only contain ASCII letters and digits",
        ));
    }
    Ok(())
}

pub fn is_admin(username: &str) -> bool {
    username == ADMIN || username == SUPERADMIN
}

/// Username and password as submitted by a client.
#[derive(Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}
