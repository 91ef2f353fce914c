//! Document-form vault: the whole entry set encrypted as one blob.
//!
//! `DocumentVault` is the session handle for this form.  It keeps the
//! decrypted entries and the derived key in memory and rewrites the
//! entire record on every change.  Every write goes through
//! `format::write_document`, which replaces the file atomically.

use std::fmt;
use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::{debug, info, warn};
use zeroize::{Zeroize, Zeroizing};

use crate::crypto::encryption::{decrypt_with_aad, encrypt_with_aad};
use crate::crypto::kdf::{derive_key, generate_salt, KDF_IDENTIFIER};
use crate::crypto::keys::DerivedKey;
use crate::errors::{LockboxError, Result};

use super::codec::{self, SecretEntries};
use super::format::{self, VaultDocument, CURRENT_VERSION};
use super::options::VaultOptions;
use super::rotation;

/// An unlocked document vault.
pub struct DocumentVault {
    /// Path to the record on disk.
    path: PathBuf,

    /// The record as last written (header fields + ciphertext).
    record: VaultDocument,

    /// Decrypted entries, kept in sync with `record`.
    entries: SecretEntries,

    /// The session key (zeroized on drop).
    key: DerivedKey,

    /// Work factor used for rotation.
    options: VaultOptions,
}

impl DocumentVault {
    // ------------------------------------------------------------------
    // Construction
    // ------------------------------------------------------------------

    /// Open the vault at `path`, creating an empty one if none exists.
    ///
    /// A new vault gets a fresh salt and `options.iterations`; an existing
    /// one is unlocked with the salt and iterations stored in its record.
    pub fn open(path: &Path, password: &str, options: &VaultOptions) -> Result<Self> {
        options.validate()?;
        if password.is_empty() {
            return Err(LockboxError::InvalidInput("password cannot be empty".into()));
        }

        match format::read_document(path)? {
            None => Self::create(path, password, options),
            Some(record) => Self::unlock(path, record, password, options),
        }
    }

    fn create(path: &Path, password: &str, options: &VaultOptions) -> Result<Self> {
        let salt = generate_salt();
        let key = derive_key(password.as_bytes(), &salt, options.iterations)?;

        let header = VaultDocument {
            version: CURRENT_VERSION,
            kdf: KDF_IDENTIFIER.to_string(),
            iterations: options.iterations,
            salt: salt.to_vec(),
            ciphertext: Vec::new(),
            created_at: Some(Utc::now()),
        };
        let entries = SecretEntries::new();
        let record = seal(&key, header, &entries)?;
        format::write_document(path, &record)?;

        info!(path = %path.display(), iterations = options.iterations, "created document vault");

        Ok(Self {
            path: path.to_path_buf(),
            record,
            entries,
            key,
            options: *options,
        })
    }

    fn unlock(
        path: &Path,
        record: VaultDocument,
        password: &str,
        options: &VaultOptions,
    ) -> Result<Self> {
        let key = derive_key(password.as_bytes(), &record.salt, record.iterations)?;
        let entries = open_entries(&key, &record)?;

        debug!(path = %path.display(), entries = entries.len(), "unlocked document vault");

        Ok(Self {
            path: path.to_path_buf(),
            record,
            entries,
            key,
            options: *options,
        })
    }

    // ------------------------------------------------------------------
    // Secret operations
    // ------------------------------------------------------------------

    /// Add or replace a credential and persist the vault.
    ///
    /// If the write fails, the in-memory set is restored so it still
    /// matches what is on disk.
    pub fn put(&mut self, name: &str, credential: &str) -> Result<()> {
        codec::validate_name(name)?;

        let previous = self
            .entries
            .insert(name.to_string(), credential.to_string());

        if let Err(e) = self.persist() {
            warn!(error = %e, "persist failed, rolling back put");
            let mut rejected = match previous {
                Some(old) => self.entries.insert(name.to_string(), old),
                None => self.entries.remove(name),
            };
            rejected.zeroize();
            return Err(e);
        }

        if let Some(mut old) = previous {
            old.zeroize();
        }
        Ok(())
    }

    /// Return a copy of the credential stored under `name`.
    pub fn get(&self, name: &str) -> Result<Zeroizing<String>> {
        codec::validate_name(name)?;
        self.entries
            .get(name)
            .map(|value| Zeroizing::new(value.clone()))
            .ok_or_else(|| LockboxError::NotFound(name.to_string()))
    }

    /// All stored names, sorted.
    pub fn list(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    /// Remove `name` and persist.  Returns `false` if it was not stored.
    pub fn delete(&mut self, name: &str) -> Result<bool> {
        codec::validate_name(name)?;

        let Some(old) = self.entries.remove(name) else {
            return Ok(false);
        };

        if let Err(e) = self.persist() {
            warn!(error = %e, "persist failed, rolling back delete");
            self.entries.insert(name.to_string(), old);
            return Err(e);
        }

        let mut old = old;
        old.zeroize();
        Ok(true)
    }

    /// Change the master password.
    ///
    /// Re-reads the record from disk and decrypts it with the current key,
    /// then writes the entries back under a key derived from
    /// `new_password` and a fresh salt.  On any error the file and this
    /// handle are left exactly as they were.
    pub fn rotate(&mut self, new_password: &str, confirmation: Option<&str>) -> Result<()> {
        // 1. Decrypt everything currently persisted under the old key.
        let current = format::read_document(&self.path)?.ok_or_else(|| {
            LockboxError::StorageFailure(format!(
                "vault record disappeared from {}",
                self.path.display()
            ))
        })?;
        let entries = open_entries(&self.key, &current)?;

        // 2. Validate the new password.
        rotation::validate_new_password(new_password, confirmation)?;

        // 3. Fresh salt, new key.
        let fresh = rotation::fresh_key(new_password, self.options.iterations)?;

        // 4. Re-encrypt and replace the record in one rename.
        let header = VaultDocument {
            version: CURRENT_VERSION,
            kdf: KDF_IDENTIFIER.to_string(),
            iterations: fresh.iterations,
            salt: fresh.salt.to_vec(),
            ciphertext: Vec::new(),
            created_at: current.created_at,
        };
        let record = seal(&fresh.key, header, &entries)?;
        format::write_document(&self.path, &record).map_err(|e| {
            warn!(error = %e, "rotation aborted, vault unchanged");
            e
        })?;

        // Old key is wiped when it is replaced.
        self.key = fresh.key;
        self.record = record;
        let mut stale = std::mem::replace(&mut self.entries, entries);
        stale.values_mut().for_each(Zeroize::zeroize);

        info!(entries = self.entries.len(), "rotated document vault password");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Persistence
    // ------------------------------------------------------------------

    /// Encrypt the full entry set and overwrite the record.
    ///
    /// Salt and iterations are preserved; only the ciphertext changes.
    pub fn persist(&mut self) -> Result<()> {
        let record = seal(&self.key, self.record.clone(), &self.entries)?;
        format::write_document(&self.path, &record)?;
        self.record = record;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    /// Returns the path to the record on disk.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the record as last written.
    pub fn record(&self) -> &VaultDocument {
        &self.record
    }

    /// Returns the number of stored entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the vault holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for DocumentVault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocumentVault")
            .field("path", &self.path)
            .field("names", &self.entries.keys().collect::<Vec<_>>())
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}

impl Drop for DocumentVault {
    fn drop(&mut self) {
        self.entries.values_mut().for_each(Zeroize::zeroize);
    }
}

/// Encrypt `entries` under `key`, returning `header` with the new ciphertext.
fn seal(key: &DerivedKey, mut header: VaultDocument, entries: &SecretEntries) -> Result<VaultDocument> {
    let plaintext = codec::encode_entries(entries)?;
    header.ciphertext = encrypt_with_aad(key, &plaintext, &header.associated_data())?;
    Ok(header)
}

/// Decrypt and decode the entry set held in `record`.
fn open_entries(key: &DerivedKey, record: &VaultDocument) -> Result<SecretEntries> {
    let plaintext = Zeroizing::new(decrypt_with_aad(
        key,
        &record.ciphertext,
        &record.associated_data(),
    )?);
    codec::decode_entries(&plaintext)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn fast() -> VaultOptions {
        VaultOptions::with_iterations(1_000)
    }

    #[test]
    fn first_open_writes_an_empty_record() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("vault.enc.json");

        let vault = DocumentVault::open(&path, "hunter2", &fast()).unwrap();
        assert!(vault.is_empty());
        assert!(path.exists());
        assert_eq!(vault.record().iterations, 1_000);
        assert_eq!(vault.record().salt.len(), 16);
    }

    #[test]
    fn persist_preserves_salt_and_iterations() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("vault.enc.json");

        let mut vault = DocumentVault::open(&path, "hunter2", &fast()).unwrap();
        let salt = vault.record().salt.clone();
        let first_ciphertext = vault.record().ciphertext.clone();

        vault.put("github", "ghp_abc123").unwrap();

        let on_disk = format::read_document(&path).unwrap().unwrap();
        assert_eq!(on_disk.salt, salt);
        assert_eq!(on_disk.iterations, 1_000);
        assert_ne!(on_disk.ciphertext, first_ciphertext);
    }

    #[test]
    fn existing_vault_keeps_its_own_iterations() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("vault.enc.json");
        DocumentVault::open(&path, "pw", &fast()).unwrap();

        // Different options on reopen do not change the stored work factor.
        let vault =
            DocumentVault::open(&path, "pw", &VaultOptions::with_iterations(2_000)).unwrap();
        assert_eq!(vault.record().iterations, 1_000);
    }

    #[test]
    fn empty_password_is_rejected_before_touching_disk() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("vault.enc.json");

        let err = DocumentVault::open(&path, "", &fast()).unwrap_err();
        assert!(matches!(err, LockboxError::InvalidInput(_)));
        assert!(!path.exists());
    }

    #[test]
    fn debug_output_hides_credentials() {
        let dir = TempDir::new().unwrap();
        let mut vault =
            DocumentVault::open(&dir.path().join("vault.enc.json"), "pw", &fast()).unwrap();
        vault.put("github", "ghp_supersecret").unwrap();

        let debug = format!("{vault:?}");
        assert!(debug.contains("github"));
        assert!(debug.contains("REDACTED"));
        assert!(!debug.contains("ghp_supersecret"));
    }

    #[test]
    fn failed_put_rolls_back_memory() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("vault.enc.json");
        let mut vault = DocumentVault::open(&path, "pw", &fast()).unwrap();
        vault.put("keep", "1").unwrap();

        // A directory squatting on the staging path makes the write fail.
        std::fs::create_dir(format::staging_path(&path)).unwrap();

        let err = vault.put("new", "2").unwrap_err();
        assert!(matches!(err, LockboxError::StorageFailure(_)));
        assert_eq!(vault.list(), vec!["keep".to_string()]);

        let err = vault.put("keep", "changed").unwrap_err();
        assert!(matches!(err, LockboxError::StorageFailure(_)));
        assert_eq!(vault.get("keep").unwrap().as_str(), "1");

        let err = vault.delete("keep").unwrap_err();
        assert!(matches!(err, LockboxError::StorageFailure(_)));
        assert_eq!(vault.len(), 1);
    }
}
