//! Account passwords
//!
//! Registration passwords are checked against a small policy before being
//! stored as Argon2id PHC strings in the user table.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};

use crate::error::{Error, Result};

/// Shortest password accepted at registration, in characters
pub const MIN_PASSWORD_LEN: usize = 8;

/// Longest password accepted, in bytes. Bounds the hashing cost per request.
pub const MAX_PASSWORD_LEN: usize = 1024;

/// Reject passwords that are too short, too long or blank
pub fn check_password_policy(password: &str) -> Result<()> {
    if password.trim().is_empty() {
        return Err(Error::InvalidInput("password must not be blank".into()));
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(Error::InvalidInput(format!(
            "password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }
    if password.len() > MAX_PASSWORD_LEN {
        return Err(Error::InvalidInput(format!(
            "password must be at most {} bytes",
            MAX_PASSWORD_LEN
        )));
    }
    Ok(())
}

/// Check the policy and hash a new account password
pub fn hash_password(password: &str) -> Result<String> {
    check_password_policy(password)?;

    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| Error::Internal(format!("Failed to hash password: {}", e)))
}

/// Compare a login attempt with the hash stored for the account.
/// A stored value that is not a PHC string is a user store fault.
pub fn verify_password(password: &str, stored: &str) -> Result<bool> {
    if password.len() > MAX_PASSWORD_LEN {
        return Ok(false);
    }

    let parsed = PasswordHash::new(stored)
        .map_err(|e| Error::UserStore(format!("Stored password hash is corrupt: {}", e)))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registration_password_roundtrip() {
        let stored = hash_password("hunter22").unwrap();
        assert!(stored.starts_with("$argon2id$"));
        assert!(verify_password("hunter22", &stored).unwrap());
        assert!(!verify_password("hunter23", &stored).unwrap());
        assert_ne!(stored, hash_password("hunter22").unwrap());
    }

    #[test]
    fn test_policy_rejects_short_and_blank() {
        for password in ["", "short", "1234567", "          "] {
            assert!(
                matches!(hash_password(password), Err(Error::InvalidInput(_))),
                "{:?} should be rejected",
                password
            );
        }
        assert!(check_password_policy("12345678").is_ok());
    }

    #[test]
    fn test_policy_counts_characters() {
        // Four 2-byte characters are too short despite eight bytes
        assert!(check_password_policy("éééé").is_err());
        assert!(check_password_policy("éééééééé").is_ok());
    }

    #[test]
    fn test_oversized_password() {
        let long = "a".repeat(MAX_PASSWORD_LEN + 1);
        assert!(matches!(check_password_policy(&long), Err(Error::InvalidInput(_))));

        let stored = hash_password("hunter22").unwrap();
        assert!(!verify_password(&long, &stored).unwrap());
    }

    #[test]
    fn test_corrupt_stored_hash() {
        assert!(matches!(
            verify_password("hunter22", "plaintext"),
            Err(Error::UserStore(_))
        ));
    }
}
