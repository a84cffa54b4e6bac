/*
 * SPDX-FileCopyrightText: 2026 Bramble Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

//! Argon2 password hashing. Plaintext never leaves this module; callers
//! hold only the PHC-format hash string.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};

use crate::error::{CoreError, CoreResult};

/// Hashes a plaintext password with a fresh random salt. Two identities with
/// the same plaintext end up with different hashes.
pub fn hash_password(plaintext: &str) -> CoreResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(plaintext.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| CoreError::Internal(format!("password hashing failed: {e}")))
}

/// Recomputes and compares; the argon2 verifier is constant-time over the
/// digest. An unparseable stored hash verifies as false, never panics.
pub fn verify_password(plaintext: &str, stored_hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(stored_hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(plaintext.as_bytes(), &parsed)
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verifies_correct_password() {
        let hash = hash_password("cat").unwrap();
        assert!(verify_password("cat", &hash));
        assert!(!verify_password("dog", &hash));
    }

    #[test]
    fn salts_are_random() {
        let a = hash_password("cat").unwrap();
        let b = hash_password("cat").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn garbage_hash_never_verifies() {
        assert!(!verify_password("cat", "not-a-phc-string"));
    }
}
