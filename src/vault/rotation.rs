//! Pieces of the password-rotation protocol shared by both storage forms.
//!
//! Rotation always runs in the same order:
//!
//! 1. decrypt everything under the old key (abort on the first failure),
//! 2. validate the new password,
//! 3. derive a new key from a fresh salt,
//! 4. re-encrypt and commit everything in one durable step.
//!
//! Steps 1 and 4 depend on the storage layout and live in `document.rs`
//! and `table.rs`.  Nothing is written before step 4, and step 4 either
//! lands completely or not at all.

use subtle::ConstantTimeEq;

use crate::crypto::kdf::{derive_key, generate_salt, SALT_LEN};
use crate::crypto::keys::DerivedKey;
use crate::errors::{LockboxError, Result};

/// A fresh salt and the key derived from it.
pub struct FreshKey {
    pub salt: [u8; SALT_LEN],
    pub iterations: u32,
    pub key: DerivedKey,
}

/// Check the new password before any key material is generated.
///
/// `confirmation`, when the caller collected one, must match exactly.
/// The comparison is constant-time.
pub fn validate_new_password(new_password: &str, confirmation: Option<&str>) -> Result<()> {
    if new_password.is_empty() {
        return Err(LockboxError::InvalidInput(
            "new password cannot be empty".into(),
        ));
    }

    if let Some(confirmation) = confirmation {
        let matches: bool = new_password
            .as_bytes()
            .ct_eq(confirmation.as_bytes())
            .into();
        if !matches {
            return Err(LockboxError::InvalidInput(
                "new password and confirmation do not match".into(),
            ));
        }
    }

    Ok(())
}

/// Generate a new salt and derive the replacement key from it.
pub fn fresh_key(new_password: &str, iterations: u32) -> Result<FreshKey> {
    let salt = generate_salt();
    let key = derive_key(new_password.as_bytes(), &salt, iterations)?;
    Ok(FreshKey {
        salt,
        iterations,
        key,
    })
}
