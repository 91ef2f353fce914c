//! On-disk record for the document form.
//!
//! A document vault is a single pretty-printed JSON file:
//!
//! ```text
//! {
//!   "version": 1,
//!   "kdf": "PBKDF2-HMAC-SHA256",
//!   "iterations": 200000,
//!   "salt": "<base64>",
//!   "ciphertext": "<base64 token>",
//!   "created_at": "2026-01-01T00:00:00Z"
//! }
//! ```
//!
//! Only `ciphertext` is secret.  The KDF parameters stay in cleartext so
//! the key can be re-derived, but they are bound into the AEAD tag via
//! `VaultDocument::associated_data`, so editing them is caught at decrypt
//! time just like editing the ciphertext.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::crypto::kdf::{KDF_IDENTIFIER, MIN_SALT_LEN};
use crate::errors::{LockboxError, Result};

/// Current record format version.
pub const CURRENT_VERSION: u32 = 1;

/// The persisted document record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VaultDocument {
    /// Format version.
    pub version: u32,

    /// Which KDF produced the key (always `PBKDF2-HMAC-SHA256` today).
    pub kdf: String,

    /// KDF work factor.
    pub iterations: u32,

    /// KDF salt (base64 in JSON).
    #[serde(serialize_with = "base64_encode", deserialize_with = "base64_decode")]
    pub salt: Vec<u8>,

    /// AEAD token over the encoded entry set (base64 in JSON).
    #[serde(serialize_with = "base64_encode", deserialize_with = "base64_decode")]
    pub ciphertext: Vec<u8>,

    /// When this vault was first created.  Absent in older records.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl VaultDocument {
    /// Bytes bound into the AEAD tag alongside the ciphertext.
    pub fn associated_data(&self) -> Vec<u8> {
        format!(
            "lockbox-document|v{}|{}|{}|{}",
            self.version,
            self.kdf,
            self.iterations,
            BASE64.encode(&self.salt)
        )
        .into_bytes()
    }

    /// Reject records whose cleartext fields cannot possibly be valid.
    fn validate(&self) -> Result<()> {
        if self.version != CURRENT_VERSION {
            return Err(LockboxError::MalformedVault(format!(
                "unsupported version {}, expected {CURRENT_VERSION}",
                self.version
            )));
        }
        if self.kdf != KDF_IDENTIFIER {
            return Err(LockboxError::MalformedVault(format!(
                "unsupported kdf '{}'",
                self.kdf
            )));
        }
        if self.iterations == 0 {
            return Err(LockboxError::MalformedVault(
                "iterations must be positive".into(),
            ));
        }
        if self.salt.len() < MIN_SALT_LEN {
            return Err(LockboxError::MalformedVault(format!(
                "salt is {} bytes, need at least {MIN_SALT_LEN}",
                self.salt.len()
            )));
        }
        Ok(())
    }
}

/// Read and parse the record at `path`.
///
/// Returns `Ok(None)` when no file exists yet, which callers treat as
/// "initialize a new vault" rather than an error.
pub fn read_document(path: &Path) -> Result<Option<VaultDocument>> {
    let data = match fs::read(path) {
        Ok(data) => data,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    let doc: VaultDocument = serde_json::from_slice(&data)
        .map_err(|e| LockboxError::MalformedVault(format!("record JSON: {e}")))?;
    doc.validate()?;

    debug!(path = %path.display(), iterations = doc.iterations, "read vault record");
    Ok(Some(doc))
}

/// Write the record to disk **atomically**.
///
/// 1. Serialize to pretty JSON.
/// 2. Write to a staging file in the same directory (owner-only on unix)
///    and fsync it.
/// 3. Rename the staging file over the target path and sync the
///    directory.  A failed rename removes the staging file.
///
/// Readers see either the old record or the new one, never a mix.
pub fn write_document(path: &Path, doc: &VaultDocument) -> Result<()> {
    let bytes = serde_json::to_vec_pretty(doc)
        .map_err(|e| LockboxError::StorageFailure(format!("serialize record: {e}")))?;

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent)?;
        }
    }

    let tmp_path = staging_path(path);
    if let Err(e) = write_synced(&tmp_path, &bytes) {
        let _ = fs::remove_file(&tmp_path);
        return Err(e.into());
    }
    if let Err(e) = fs::rename(&tmp_path, path) {
        let _ = fs::remove_file(&tmp_path);
        return Err(e.into());
    }
    sync_parent(path)?;

    debug!(path = %path.display(), "wrote vault record");
    Ok(())
}

/// The staging file used by `write_document` for `path`.
///
/// Example: `secrets/vault.enc.json` -> `secrets/.vault.enc.json.tmp`
pub fn staging_path(path: &Path) -> PathBuf {
    let parent = path.parent().unwrap_or(Path::new("."));
    parent.join(format!(
        ".{}.tmp",
        path.file_name().unwrap_or_default().to_string_lossy()
    ))
}

/// Flush the directory entry so the rename survives a crash.
#[cfg(unix)]
fn sync_parent(path: &Path) -> io::Result<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::File::open(parent)?.sync_all()
}

#[cfg(not(unix))]
fn sync_parent(_path: &Path) -> io::Result<()> {
    Ok(())
}

fn write_synced(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options.open(path)?;
    file.write_all(bytes)?;
    file.sync_all()
}

// ---------------------------------------------------------------------------
// Serde helpers for base64-encoded Vec<u8> fields
// ---------------------------------------------------------------------------

fn base64_encode<S>(data: &[u8], serializer: S) -> std::result::Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_str(&BASE64.encode(data))
}

fn base64_decode<'de, D>(deserializer: D) -> std::result::Result<Vec<u8>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    BASE64.decode(&s).map_err(serde::de::Error::custom)
}
