//! Password Verifier
//! Mission: Slow, salted one-way hashing for stored secrets

use anyhow::{Context, Result};
use tracing::debug;

/// Minimum bcrypt work factor accepted for production configuration.
pub const MIN_PRODUCTION_COST: u32 = 12;

/// Hash a plaintext password with bcrypt at the given cost.
pub fn hash_password(plaintext: &str, cost: u32) -> Result<String> {
    bcrypt::hash(plaintext, cost).context("Failed to hash password")
}

/// Check a plaintext password against a stored digest.
///
/// A malformed or truncated digest is a mismatch, not an error. bcrypt's
/// comparison of the derived hash is constant-time.
pub fn verify_password(plaintext: &str, digest: &str) -> bool {
    match bcrypt::verify(plaintext, digest) {
        Ok(valid) => valid,
        Err(e) => {
            debug!("Password digest rejected: {}", e);
            false
        }
    }
}

/// A valid digest of an unguessable value, verified against when the username
/// is unknown so both login failure paths cost one bcrypt run.
pub fn dummy_digest(cost: u32) -> Result<String> {
    let filler = hex::encode(rand::random::<[u8; 16]>());
    hash_password(&filler, cost)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_COST: u32 = 4;

    #[test]
    fn test_hash_and_verify() {
        let digest = hash_password("correct horse", TEST_COST).unwrap();
        assert!(digest.starts_with("$2"));
        assert!(verify_password("correct horse", &digest));
        assert!(!verify_password("wrong horse", &digest));
    }

    #[test]
    fn test_hash_is_salted() {
        let a = hash_password("same", TEST_COST).unwrap();
        let b = hash_password("same", TEST_COST).unwrap();
        assert_ne!(a, b);
        assert!(verify_password("same", &a));
        assert!(verify_password("same", &b));
    }

    #[test]
    fn test_malformed_digest_is_false_not_error() {
        assert!(!verify_password("anything", ""));
        assert!(!verify_password("anything", "not-a-bcrypt-hash"));
        assert!(!verify_password("anything", "$2b$12$tooshort"));
    }

    #[test]
    fn test_dummy_digest_rejects_common_passwords() {
        let digest = dummy_digest(TEST_COST).unwrap();
        assert!(!verify_password("", &digest));
        assert!(!verify_password("password", &digest));
    }
}
