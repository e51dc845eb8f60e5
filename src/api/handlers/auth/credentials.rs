//! Password hashing primitives.

use anyhow::{Result, anyhow};
use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};

/// Minimum accepted password length, enforced by the flows before hashing.
pub const MIN_PASSWORD_LENGTH: usize = 8;

pub(super) fn acceptable_password(plain: &str) -> bool {
    plain.chars().count() >= MIN_PASSWORD_LENGTH
}

/// Argon2id password hashing with per-password salts.
#[derive(Clone, Copy, Debug, Default)]
pub struct CredentialHasher;

impl CredentialHasher {
    /// Hash a plaintext password into a PHC-format digest.
    ///
    /// # Errors
    /// Returns an error if hashing fails.
    pub fn hash(&self, plain: &str) -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(plain.as_bytes(), &salt)
            .map(|digest| digest.to_string())
            .map_err(|err| anyhow!("failed to hash password: {err}"))
    }

    /// Verify a plaintext password against a stored digest.
    ///
    /// Malformed digests verify as false rather than erroring, so a corrupt
    /// row cannot be distinguished from a wrong password by the caller.
    #[must_use]
    pub fn verify(&self, plain: &str, digest: &str) -> bool {
        PasswordHash::new(digest).is_ok_and(|parsed| {
            Argon2::default()
                .verify_password(plain.as_bytes(), &parsed)
                .is_ok()
        })
    }
}
