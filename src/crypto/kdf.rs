//! Password-based key derivation using PBKDF2-HMAC-SHA256.
//!
//! The salt and iteration count are public and stored next to the
//! ciphertext.  The same password + salt + iterations always produce the
//! same key, which is what makes "try again with another password" work:
//! a wrong password is only noticed later, when decryption fails.

use pbkdf2::pbkdf2_hmac;
use rand::RngCore;
use sha2::Sha256;
use tracing::debug;

use super::keys::{DerivedKey, KEY_LEN};
use crate::errors::{LockboxError, Result};

/// Identifier written into every vault record.
pub const KDF_IDENTIFIER: &str = "PBKDF2-HMAC-SHA256";

/// Default work factor for new vaults.
pub const DEFAULT_ITERATIONS: u32 = 200_000;

/// Length of freshly generated salts in bytes (128 bits).
pub const SALT_LEN: usize = 16;

/// Shortest salt accepted when reading an existing vault.
pub const MIN_SALT_LEN: usize = 8;

/// Derive a 32-byte key from a password, salt and iteration count.
///
/// Fails with `InvalidInput` for an empty password, a salt shorter than
/// `MIN_SALT_LEN`, or zero iterations.  Never fails for a password that
/// is merely wrong.
pub fn derive_key(password: &[u8], salt: &[u8], iterations: u32) -> Result<DerivedKey> {
    if password.is_empty() {
        return Err(LockboxError::InvalidInput("password cannot be empty".into()));
    }
    if salt.len() < MIN_SALT_LEN {
        return Err(LockboxError::InvalidInput(format!(
            "salt must be at least {MIN_SALT_LEN} bytes (got {})",
            salt.len()
        )));
    }
    if iterations == 0 {
        return Err(LockboxError::InvalidInput(
            "iterations must be at least 1".into(),
        ));
    }

    debug!(iterations, salt_len = salt.len(), "deriving key");

    let mut key = DerivedKey::new([0u8; KEY_LEN]);
    pbkdf2_hmac::<Sha256>(password, salt, iterations, key.as_mut_bytes());
    Ok(key)
}

/// Generate a cryptographically random 16-byte salt.
pub fn generate_salt() -> [u8; SALT_LEN] {
    let mut salt = [0u8; SALT_LEN];
    rand::rng().fill_bytes(&mut salt);
    salt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_known_vector() {
        // PBKDF2-HMAC-SHA256, c = 4096, first 32 bytes of the 40-byte output.
        let key = derive_key(
            b"passwordPASSWORDpassword",
            b"saltSALTsaltSALTsaltSALTsaltSALTsalt",
            4096,
        )
        .unwrap();
        let expected: [u8; KEY_LEN] = [
            0x34, 0x8c, 0x89, 0xdb, 0xcb, 0xd3, 0x2b, 0x2f, 0x32, 0xd8, 0x14, 0xb8, 0x11, 0x6e,
            0x84, 0xcf, 0x2b, 0x17, 0x34, 0x7e, 0xbc, 0x18, 0x00, 0x18, 0x1c, 0x4e, 0x2a, 0x1f,
            0xb8, 0xdd, 0x53, 0xe1,
        ];
        assert_eq!(key.as_bytes(), &expected);
    }

    #[test]
    fn same_inputs_same_key() {
        let salt = [9u8; 16];
        let a = derive_key(b"hunter2", &salt, 50).unwrap();
        let b = derive_key(b"hunter2", &salt, 50).unwrap();
        assert_eq!(a.as_bytes(), b.as_bytes());
    }

    #[test]
    fn rejects_empty_password() {
        let err = derive_key(b"", &[7u8; 16], 10).unwrap_err();
        assert!(matches!(err, LockboxError::InvalidInput(_)));
    }

    #[test]
    fn rejects_short_salt() {
        let err = derive_key(b"pw", &[7u8; 7], 10).unwrap_err();
        assert!(matches!(err, LockboxError::InvalidInput(_)));

        // Exactly the minimum is fine.
        assert!(derive_key(b"pw", &[7u8; MIN_SALT_LEN], 10).is_ok());
    }

    #[test]
    fn rejects_zero_iterations() {
        let err = derive_key(b"pw", &[7u8; 16], 0).unwrap_err();
        assert!(matches!(err, LockboxError::InvalidInput(_)));
    }

    #[test]
    fn iterations_change_the_key() {
        let salt = [3u8; 16];
        let a = derive_key(b"pw", &salt, 10).unwrap();
        let b = derive_key(b"pw", &salt, 11).unwrap();
        assert_ne!(a.as_bytes(), b.as_bytes());
    }

    #[test]
    fn generate_salt_is_random() {
        assert_ne!(generate_salt(), generate_salt());
    }
}
