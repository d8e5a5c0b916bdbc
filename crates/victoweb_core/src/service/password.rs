//! Password hashing and strength rules.
//!
//! # Invariants
//! - Stored hashes are argon2id PHC strings with a random 16-byte salt.
//! - Verification never errors: malformed hashes simply fail to verify.

use crate::model::validation::ValidationError;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use rand::Rng;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub const MIN_PASSWORD_LENGTH: usize = 8;

const COMMON_PASSWORDS: &[&str] = &[
    "password",
    "password1",
    "password123",
    "passw0rd",
    "12345678",
    "123456789",
    "1234567890",
    "qwerty123",
    "qwertyuiop",
    "iloveyou",
    "sunshine",
    "princess",
    "football",
    "baseball",
    "welcome1",
    "letmein1",
    "trustno1",
    "superman",
    "starwars",
    "dragon123",
    "monkey123",
    "abc12345",
    "admin123",
    "changeme",
    "whatever",
    "computer",
    "michelle",
    "jennifer",
    "11111111",
    "00000000",
];

/// Hashing backend failure.
#[derive(Debug)]
pub struct PasswordHashError(String);

impl Display for PasswordHashError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "password hashing failed: {}", self.0)
    }
}

impl Error for PasswordHashError {}

pub fn hash_password(password: &str) -> Result<String, PasswordHashError> {
    let salt_bytes: [u8; 16] = rand::thread_rng().gen();
    let salt = SaltString::encode_b64(&salt_bytes)
        .map_err(|err| PasswordHashError(err.to_string()))?;
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|err| PasswordHashError(err.to_string()))?;
    Ok(hash.to_string())
}

pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    match PasswordHash::new(stored_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

/// Applies the strength rules; the first failing rule is reported.
pub fn validate_password(
    field: &'static str,
    password: &str,
    username: &str,
) -> Result<(), ValidationError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(ValidationError::new(
            field,
            format!(
                "This password is too short. It must contain at least {MIN_PASSWORD_LENGTH} characters."
            ),
        ));
    }
    if password.chars().all(|ch| ch.is_ascii_digit()) {
        return Err(ValidationError::new(field, "This password is entirely numeric."));
    }
    let lowered = password.to_lowercase();
    if COMMON_PASSWORDS.contains(&lowered.trim()) {
        return Err(ValidationError::new(field, "This password is too common."));
    }
    let username = username.trim().to_lowercase();
    if username.chars().count() >= 3 && lowered.contains(username.as_str()) {
        return Err(ValidationError::new(
            field,
            "The password is too similar to the username.",
        ));
    }
    Ok(())
}
