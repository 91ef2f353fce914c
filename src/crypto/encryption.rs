//! AES-256-GCM authenticated encryption.
//!
//! Each call to `encrypt` generates a fresh random 12-byte nonce and
//! prepends it to the ciphertext, so a token carries everything needed to
//! decrypt it.  The `_with_aad` variants additionally bind associated data
//! (a record header, a row name) into the authentication tag.
//!
//! Layout of a token:
//!   [ 12-byte nonce | ciphertext + 16-byte auth tag ]

use aes_gcm::aead::{Aead, KeyInit, OsRng, Payload};
use aes_gcm::{AeadCore, Aes256Gcm, Nonce};

use super::keys::DerivedKey;
use crate::errors::{LockboxError, Result};

/// Size of the AES-256-GCM nonce in bytes.
pub const NONCE_LEN: usize = 12;

/// Size of the AES-256-GCM authentication tag in bytes.
pub const TAG_LEN: usize = 16;

/// Encrypt `plaintext` under `key` with no associated data.
pub fn encrypt(key: &DerivedKey, plaintext: &[u8]) -> Result<Vec<u8>> {
    encrypt_with_aad(key, plaintext, &[])
}

/// Decrypt a token produced by `encrypt`.
pub fn decrypt(key: &DerivedKey, token: &[u8]) -> Result<Vec<u8>> {
    decrypt_with_aad(key, token, &[])
}

/// Encrypt `plaintext`, binding `aad` into the tag.
///
/// Returns the nonce prepended to the ciphertext (nonce || ciphertext).
pub fn encrypt_with_aad(key: &DerivedKey, plaintext: &[u8], aad: &[u8]) -> Result<Vec<u8>> {
    let cipher = Aes256Gcm::new_from_slice(key.as_bytes())
        .map_err(|e| LockboxError::InvalidInput(format!("invalid key length: {e}")))?;

    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);

    let ciphertext = cipher
        .encrypt(
            &nonce,
            Payload {
                msg: plaintext,
                aad,
            },
        )
        .map_err(|e| LockboxError::InvalidInput(format!("plaintext too large: {e}")))?;

    let mut token = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    token.extend_from_slice(&nonce);
    token.extend_from_slice(&ciphertext);
    Ok(token)
}

/// Decrypt a token produced by `encrypt_with_aad` with the same `aad`.
///
/// Every failure (short token, wrong key, flipped bit, different `aad`)
/// is reported as `AuthenticationFailure`.
pub fn decrypt_with_aad(key: &DerivedKey, token: &[u8], aad: &[u8]) -> Result<Vec<u8>> {
    if token.len() < NONCE_LEN + TAG_LEN {
        return Err(LockboxError::AuthenticationFailure);
    }

    let (nonce_bytes, ciphertext) = token.split_at(NONCE_LEN);
    let nonce = Nonce::from_slice(nonce_bytes);

    let cipher = Aes256Gcm::new_from_slice(key.as_bytes())
        .map_err(|_| LockboxError::AuthenticationFailure)?;

    cipher
        .decrypt(
            nonce,
            Payload {
                msg: ciphertext,
                aad,
            },
        )
        .map_err(|_| LockboxError::AuthenticationFailure)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(byte: u8) -> DerivedKey {
        DerivedKey::new([byte; 32])
    }

    #[test]
    fn token_length_is_nonce_plus_plaintext_plus_tag() {
        let token = encrypt(&key(1), b"abc").unwrap();
        assert_eq!(token.len(), NONCE_LEN + 3 + TAG_LEN);
    }

    #[test]
    fn empty_plaintext_roundtrips() {
        let token = encrypt(&key(2), b"").unwrap();
        assert_eq!(decrypt(&key(2), &token).unwrap(), b"");
    }

    #[test]
    fn aad_mismatch_is_authentication_failure() {
        let token = encrypt_with_aad(&key(3), b"secret", b"github").unwrap();
        assert_eq!(
            decrypt_with_aad(&key(3), &token, b"github").unwrap(),
            b"secret"
        );

        let err = decrypt_with_aad(&key(3), &token, b"gitlab").unwrap_err();
        assert!(matches!(err, LockboxError::AuthenticationFailure));
    }

    #[test]
    fn every_single_bit_flip_is_detected() {
        let k = key(4);
        let token = encrypt(&k, b"ghp_abc123").unwrap();

        for i in 0..token.len() {
            for bit in 0..8 {
                let mut tampered = token.clone();
                tampered[i] ^= 1 << bit;
                assert!(
                    matches!(
                        decrypt(&k, &tampered),
                        Err(LockboxError::AuthenticationFailure)
                    ),
                    "flip of bit {bit} in byte {i} went undetected"
                );
            }
        }
    }
}
