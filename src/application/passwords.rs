//! One-way password storage using bcrypt.

use thiserror::Error;

/// Work factor for new hashes.
const COST: u32 = 8;

#[derive(Debug, Error)]
#[error("failed to hash password: {0}")]
pub struct PasswordHashError(#[from] bcrypt::BcryptError);

/// Hashes `password` under a fresh random salt.
pub fn hash_password(password: &str) -> Result<String, PasswordHashError> {
    Ok(bcrypt::hash(password, COST)?)
}

/// Checks `password` against a value produced by [`hash_password`].
///
/// Malformed stored values never verify.
pub fn verify_password(password: &str, stored: &str) -> bool {
    bcrypt::verify(password, stored).unwrap_or(false)
}
