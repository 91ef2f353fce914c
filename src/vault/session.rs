//! The handle collaborators (the CLI, tests, embedding programs) use.
//!
//! A `Session` is opened with a master password against one of the two
//! storage forms and owns the derived key until it is closed or dropped.
//! Both forms expose the same operations with the same semantics.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

#[cfg(feature = "sqlite-store")]
use crate::crypto::keys::DerivedKey;
use crate::errors::{LockboxError, Result};

use super::document::DocumentVault;
use super::options::VaultOptions;
#[cfg(feature = "sqlite-store")]
use super::table::TableStore;

/// Persistence layout of a vault.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum StorageForm {
    /// One encrypted JSON document holding every entry.
    Document,
    /// One encrypted SQLite row per entry; names in cleartext.
    Table,
}

impl fmt::Display for StorageForm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Document => f.write_str("document"),
            Self::Table => f.write_str("table"),
        }
    }
}

impl FromStr for StorageForm {
    type Err = LockboxError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "document" => Ok(Self::Document),
            "table" => Ok(Self::Table),
            other => Err(LockboxError::InvalidInput(format!(
                "unknown storage form '{other}' (expected 'document' or 'table')"
            ))),
        }
    }
}

/// Where a vault lives and in which layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VaultLocation {
    pub path: PathBuf,
    pub form: StorageForm,
}

impl VaultLocation {
    pub fn new(path: impl Into<PathBuf>, form: StorageForm) -> Self {
        Self {
            path: path.into(),
            form,
        }
    }

    /// Returns `true` if the backing file already exists.
    pub fn exists(&self) -> bool {
        self.path.exists()
    }
}

/// An unlocked vault.
pub enum Session {
    Document(DocumentVault),
    #[cfg(feature = "sqlite-store")]
    Table { store: TableStore, key: DerivedKey },
}

impl Session {
    /// Unlock the vault at `location`, initializing it if it does not exist.
    ///
    /// Fails with `AuthenticationFailure` on a wrong password (or a
    /// tampered vault), `MalformedVault` if the stored structure cannot be
    /// parsed, and `InvalidInput` for an empty password.
    pub fn open_or_init(
        location: &VaultLocation,
        password: &str,
        options: &VaultOptions,
    ) -> Result<Self> {
        if password.is_empty() {
            return Err(LockboxError::InvalidInput("password cannot be empty".into()));
        }

        match location.form {
            StorageForm::Document => Ok(Self::Document(DocumentVault::open(
                &location.path,
                password,
                options,
            )?)),
            StorageForm::Table => open_table(&location.path, password, options),
        }
    }

    /// Store `credential` under `name`, replacing any previous value.
    pub fn put(&mut self, name: &str, credential: &str) -> Result<()> {
        match self {
            Self::Document(vault) => vault.put(name, credential),
            #[cfg(feature = "sqlite-store")]
            Self::Table { store, key } => store.put(key, name, credential),
        }
    }

    /// Retrieve the credential stored under `name`.
    pub fn get(&self, name: &str) -> Result<Zeroizing<String>> {
        match self {
            Self::Document(vault) => vault.get(name),
            #[cfg(feature = "sqlite-store")]
            Self::Table { store, key } => store.get(key, name),
        }
    }

    /// All stored names, sorted.
    pub fn list(&self) -> Result<Vec<String>> {
        match self {
            Self::Document(vault) => Ok(vault.list()),
            #[cfg(feature = "sqlite-store")]
            Self::Table { store, .. } => store.list(),
        }
    }

    /// Remove `name`.  Returns `false` if nothing was stored under it.
    pub fn delete(&mut self, name: &str) -> Result<bool> {
        match self {
            Self::Document(vault) => vault.delete(name),
            #[cfg(feature = "sqlite-store")]
            Self::Table { store, .. } => store.delete(name),
        }
    }

    /// Change the master password; the session keeps working afterwards.
    pub fn rotate(&mut self, new_password: &str, confirmation: Option<&str>) -> Result<()> {
        match self {
            Self::Document(vault) => vault.rotate(new_password, confirmation),
            #[cfg(feature = "sqlite-store")]
            Self::Table { store, key } => {
                // Assigning drops (and wipes) the old key.
                *key = store.rotate(key, new_password, confirmation)?;
                Ok(())
            }
        }
    }

    /// Which layout this session is backed by.
    pub fn storage_form(&self) -> StorageForm {
        match self {
            Self::Document(_) => StorageForm::Document,
            #[cfg(feature = "sqlite-store")]
            Self::Table { .. } => StorageForm::Table,
        }
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        match self {
            Self::Document(vault) => vault.path(),
            #[cfg(feature = "sqlite-store")]
            Self::Table { store, .. } => store.path(),
        }
    }

    /// End the session, wiping the key and any decrypted entries.
    pub fn close(self) {
        drop(self);
    }
}

#[cfg(feature = "sqlite-store")]
fn open_table(path: &Path, password: &str, options: &VaultOptions) -> Result<Session> {
    let store = TableStore::open(path, options)?;
    let key = store.unlock(password)?;
    Ok(Session::Table { store, key })
}

#[cfg(not(feature = "sqlite-store"))]
fn open_table(_path: &Path, _password: &str, _options: &VaultOptions) -> Result<Session> {
    Err(LockboxError::InvalidInput(
        "table storage requires the `sqlite-store` feature".into(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_form_parses_and_displays() {
        assert_eq!("document".parse::<StorageForm>().unwrap(), StorageForm::Document);
        assert_eq!("table".parse::<StorageForm>().unwrap(), StorageForm::Table);
        assert!("Table".parse::<StorageForm>().is_err());
        assert_eq!(StorageForm::Table.to_string(), "table");
    }

    #[test]
    fn empty_password_rejected_for_both_forms() {
        let dir = tempfile::TempDir::new().unwrap();
        for form in [StorageForm::Document, StorageForm::Table] {
            let location = VaultLocation::new(dir.path().join(format!("v-{form}")), form);
            let err = Session::open_or_init(&location, "", &VaultOptions::default())
                .err()
                .unwrap();
            assert!(matches!(err, LockboxError::InvalidInput(_)));
            assert!(!location.exists());
        }
    }
}
