//! Credential primitives: password hashing and signed session tokens.
//!
//! Passwords are stored as Argon2 PHC strings. Session tokens are HS256 JWTs
//! carrying the username and the admin flag as seen at login time. The flag
//! in a token is informational only; callers must reload the user before
//! making an authorization decision.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Length of passwords generated for admin resets
pub const GENERATED_PASSWORD_LENGTH: usize = 12;

/// Characters used by [`generate_password`]; look-alikes (0/O, 1/l/I) left out.
const PASSWORD_CHARSET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz23456789!@#$%&*";

#[derive(Error, Debug)]
pub enum CredentialError {
    #[error("failed to hash password: {0}")]
    Hash(String),

    #[error("failed to sign token: {0}")]
    Sign(#[source] jsonwebtoken::errors::Error),

    #[error("invalid or expired token")]
    InvalidToken(#[source] jsonwebtoken::errors::Error),
}

/// Hash a password using Argon2
pub fn hash_password(password: &str) -> Result<String, CredentialError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| CredentialError::Hash(e.to_string()))
}

/// Verify a password against a hash
pub fn verify_password(password: &str, hash: &str) -> bool {
    let parsed_hash = match PasswordHash::new(hash) {
        Ok(h) => h,
        Err(_) => return false,
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok()
}

/// Token payload
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    /// Username
    pub name: String,
    /// Admin flag at issue time
    pub admin: bool,
    /// Expiry (Unix timestamp)
    pub exp: i64,
}

pub fn issue_token(
    secret: &str,
    username: &str,
    is_admin: bool,
    ttl_hours: i64,
) -> Result<String, CredentialError> {
    let claims = Claims {
        name: username.to_string(),
        admin: is_admin,
        exp: (Utc::now() + Duration::hours(ttl_hours)).timestamp(),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(CredentialError::Sign)
}

/// Check signature and expiry and return the claims.
pub fn verify_token(secret: &str, token: &str) -> Result<Claims, CredentialError> {
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(CredentialError::InvalidToken)?;
    Ok(data.claims)
}

/// Random password drawn from [`PASSWORD_CHARSET`].
pub fn generate_password(len: usize) -> String {
    let mut rng = rand::rng();
    (0..len)
        .map(|_| PASSWORD_CHARSET[rng.random_range(0..PASSWORD_CHARSET.len())] as char)
        .collect()
}
