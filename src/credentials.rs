//! Password hashing and opaque token generation.
//!
//! Passwords are stored as Argon2id PHC strings. Session, verification and
//! reset tokens are 32 random bytes, base64url-encoded; reset tokens are only
//! kept at rest as their SHA-256 hex digest.

use std::sync::LazyLock;

use argon2::Argon2;
use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use sha2::{Digest, Sha256};

pub const MIN_PASSWORD_LENGTH: usize = 6;

pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default().hash_password(password.as_bytes(), &salt)?;
    Ok(hash.to_string())
}

/// `Ok(false)` on mismatch; `Err` only when the stored hash is unreadable.
pub fn verify_password(password: &str, hash: &str) -> Result<bool, argon2::password_hash::Error> {
    let parsed = PasswordHash::new(hash)?;
    match Argon2::default().verify_password(password.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(e),
    }
}

/// A hash of a random secret nobody knows, built on first use.
static DECOY_HASH: LazyLock<Option<String>> = LazyLock::new(|| hash_password(&random_token()).ok());

/// Runs one verification against [`DECOY_HASH`], so a lookup that found no
/// account costs the same as a wrong password. Always false.
pub fn verify_against_decoy(password: &str) -> bool {
    DECOY_HASH
        .as_deref()
        .is_some_and(|hash| verify_password(password, hash).unwrap_or(false))
}

pub fn validate_password_strength(password: &str) -> Result<(), String> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(format!(
            "Password must be at least {MIN_PASSWORD_LENGTH} characters long"
        ));
    }
    Ok(())
}

/// 256 bits from the thread RNG, URL-safe without padding.
pub fn random_token() -> String {
    let bytes: [u8; 32] = rand::random();
    URL_SAFE_NO_PAD.encode(bytes)
}

pub fn digest_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_then_verify() {
        let hash = hash_password("admin123").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("admin123", &hash).unwrap());
        assert!(!verify_password("admin124", &hash).unwrap());
    }

    #[test]
    fn decoy_never_matches() {
        assert!(!verify_against_decoy("admin123"));
        assert!(!verify_against_decoy(""));
        assert!(DECOY_HASH.as_deref().is_some_and(|h| h.starts_with("$argon2id$")));
    }

    #[test]
    fn short_passwords_are_rejected() {
        let err = validate_password_strength("abc").unwrap_err();
        assert!(err.contains("at least 6 characters"));
        assert!(validate_password_strength("abcdef").is_ok());
    }

    #[test]
    fn tokens_are_unique_and_url_safe() {
        let a = random_token();
        let b = random_token();
        assert_ne!(a, b);
        assert_eq!(a.len(), 43);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn digest_is_hex_sha256() {
        assert_eq!(
            digest_token("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
