//! Plaintext encoding of vault contents.
//!
//! The document form encrypts the whole entry set as one JSON object
//! (`{"github": "ghp_...", ...}`); the tabular form encrypts each
//! credential on its own as raw UTF-8.  A `BTreeMap` keeps the JSON keys
//! in sorted order, so the same set always encodes to the same bytes.
//!
//! Decoding only ever runs on bytes that already passed authentication,
//! so a failure here means a format mismatch rather than tampering.

use std::collections::BTreeMap;

use zeroize::{Zeroize, Zeroizing};

use crate::errors::{LockboxError, Result};

/// The logical secret set: name -> credential.
pub type SecretEntries = BTreeMap<String, String>;

/// Validate a caller-supplied entry name.
///
/// Names are case-sensitive and otherwise free-form; the only rule is
/// that they are not empty.
pub fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(LockboxError::InvalidInput(
            "secret name cannot be empty".into(),
        ));
    }
    Ok(())
}

/// Encode a full entry set to canonical JSON bytes.
pub fn encode_entries(entries: &SecretEntries) -> Result<Zeroizing<Vec<u8>>> {
    serde_json::to_vec(entries)
        .map(Zeroizing::new)
        .map_err(|e| LockboxError::MalformedPayload(format!("entry set: {e}")))
}

/// Decode bytes produced by `encode_entries`.
pub fn decode_entries(bytes: &[u8]) -> Result<SecretEntries> {
    let entries: SecretEntries = serde_json::from_slice(bytes)
        .map_err(|e| LockboxError::MalformedPayload(format!("entry set JSON: {e}")))?;

    if entries.keys().any(String::is_empty) {
        return Err(LockboxError::MalformedPayload(
            "entry set contains an empty name".into(),
        ));
    }

    Ok(entries)
}

/// Encode a single credential for a tabular row.
pub fn encode_credential(credential: &str) -> Zeroizing<Vec<u8>> {
    Zeroizing::new(credential.as_bytes().to_vec())
}

/// Decode a single credential, wiping the bytes if they are not UTF-8.
pub fn decode_credential(bytes: Vec<u8>) -> Result<Zeroizing<String>> {
    String::from_utf8(bytes).map(Zeroizing::new).map_err(|e| {
        let mut bad_bytes = e.into_bytes();
        bad_bytes.zeroize();
        LockboxError::MalformedPayload("credential is not valid UTF-8".into())
    })
}
