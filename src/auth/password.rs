//! Argon2 hashing for every secret kept at rest: staff passwords and the
//! one-time codes issued for password resets.

use argon2::{
    password_hash::{self, rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use tracing::error;

fn hash_failure(stage: &'static str, e: password_hash::Error) -> anyhow::Error {
    error!(error = %e, stage, "argon2 failure");
    anyhow::anyhow!("argon2 {stage}: {e}")
}

pub fn hash_secret(secret: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(secret.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| hash_failure("hash", e))
}

/// `Ok(false)` on mismatch. A stored value that is not a PHC string is an error,
/// since it means the row was written by something other than `hash_secret`.
pub fn verify_secret(candidate: &str, stored: &str) -> anyhow::Result<bool> {
    let parsed = PasswordHash::new(stored).map_err(|e| hash_failure("parse", e))?;
    match Argon2::default().verify_password(candidate.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(password_hash::Error::Password) => Ok(false),
        Err(e) => Err(hash_failure("verify", e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_matches_its_hash() {
        let hash = hash_secret("kale-and-quinoa").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_secret("kale-and-quinoa", &hash).unwrap());
        assert!(!verify_secret("kale-and-quinoa ", &hash).unwrap());
    }

    #[test]
    fn otp_codes_differ_by_one_digit() {
        let hash = hash_secret("482913").unwrap();
        assert!(!verify_secret("482914", &hash).unwrap());
    }

    #[test]
    fn same_secret_gets_fresh_salt() {
        assert_ne!(hash_secret("123456").unwrap(), hash_secret("123456").unwrap());
    }

    #[test]
    fn plaintext_in_the_column_is_an_error() {
        assert!(verify_secret("anything", "not-a-valid-hash").is_err());
    }
}
