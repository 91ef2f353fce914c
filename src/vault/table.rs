//! Tabular-form vault: one encrypted row per entry in SQLite.
//!
//! Two tables live in the database file:
//!
//! ```text
//! meta    (key TEXT PRIMARY KEY, value TEXT NOT NULL)
//! secrets (name TEXT PRIMARY KEY, ciphertext BLOB NOT NULL)
//! ```
//!
//! `meta` holds the cleartext KDF parameters (`salt` as base64,
//! `iterations`, `kdf`, `version`, `created_at`) and a `verifier` token
//! used to confirm a password at unlock time.  Names are stored in
//! cleartext so they can be listed without the key; each credential is
//! encrypted on its own with the row name bound in as associated data,
//! so a ciphertext copied into another row will not decrypt.
//!
//! Opening the store needs no password.  The key is obtained separately
//! with `unlock` and passed to every per-row operation.

use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

use crate::crypto::encryption::{decrypt_with_aad, encrypt_with_aad};
use crate::crypto::kdf::{derive_key, generate_salt, KDF_IDENTIFIER, MIN_SALT_LEN};
use crate::crypto::keys::DerivedKey;
use crate::errors::{LockboxError, Result};

use super::codec;
use super::options::VaultOptions;
use super::rotation;

/// Current schema version written to `meta`.
pub const SCHEMA_VERSION: u32 = 1;

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS meta (
        key   TEXT PRIMARY KEY,
        value TEXT NOT NULL
    );
    CREATE TABLE IF NOT EXISTS secrets (
        name       TEXT PRIMARY KEY,
        ciphertext BLOB NOT NULL
    );";

const VERIFIER_PLAINTEXT: &[u8] = b"lockbox-verifier";
const VERIFIER_AAD: &[u8] = b"meta:verifier";

/// Cleartext KDF parameters read from `meta`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KdfParams {
    pub salt: Vec<u8>,
    pub iterations: u32,
}

/// An open tabular vault.
pub struct TableStore {
    conn: Connection,
    path: PathBuf,
    options: VaultOptions,
}

impl TableStore {
    /// Open (or create) the database at `path`.
    ///
    /// On first creation a salt is generated and the KDF parameters are
    /// written to `meta` in one transaction.  No password is needed.
    ///
    /// Metadata is only written into a database with no `meta` and no
    /// `secrets` rows.  A store that has rows but damaged metadata is
    /// rejected with `MalformedVault` and left untouched.
    pub fn open(path: &Path, options: &VaultOptions) -> Result<Self> {
        options.validate()?;

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let mut conn = Connection::open(path)?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = FULL;",
        )?;
        conn.execute_batch(SCHEMA)?;

        let tx = conn.transaction()?;
        if is_blank(&tx)? {
            let salt = generate_salt();
            set_meta(&tx, "salt", &BASE64.encode(salt))?;
            set_meta(&tx, "iterations", &options.iterations.to_string())?;
            set_meta(&tx, "kdf", KDF_IDENTIFIER)?;
            set_meta(&tx, "version", &SCHEMA_VERSION.to_string())?;
            set_meta(&tx, "created_at", &Utc::now().to_rfc3339())?;
            info!(path = %path.display(), iterations = options.iterations, "created tabular vault");
        }
        tx.commit()?;

        let store = Self {
            conn,
            path: path.to_path_buf(),
            options: *options,
        };
        store.kdf_params()?;

        // Restrict the database to the owner.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o600);
            std::fs::set_permissions(path, perms)?;
        }

        Ok(store)
    }

    /// Derive the session key from `password` and the stored parameters.
    ///
    /// If a verifier token exists it must decrypt under the derived key,
    /// otherwise `AuthenticationFailure` is returned.  The first unlock of
    /// a new store writes the verifier.
    pub fn unlock(&self, password: &str) -> Result<DerivedKey> {
        let params = self.kdf_params()?;
        let key = derive_key(password.as_bytes(), &params.salt, params.iterations)?;

        match meta_value(&self.conn, "verifier")? {
            Some(encoded) => {
                let token = BASE64.decode(encoded).map_err(|e| {
                    LockboxError::MalformedVault(format!("verifier is not base64: {e}"))
                })?;
                decrypt_with_aad(&key, &token, VERIFIER_AAD)?;
            }
            None => {
                // Rows without a verifier: the key must at least open one of them.
                let first: Option<(String, Vec<u8>)> = self
                    .conn
                    .query_row(
                        "SELECT name, ciphertext FROM secrets ORDER BY name LIMIT 1",
                        [],
                        |row| Ok((row.get(0)?, row.get(1)?)),
                    )
                    .optional()?;
                if let Some((name, token)) = first {
                    decrypt_with_aad(&key, &token, name.as_bytes())?;
                }

                let verifier = encrypt_with_aad(&key, VERIFIER_PLAINTEXT, VERIFIER_AAD)?;
                set_meta(&self.conn, "verifier", &BASE64.encode(verifier))?;
                debug!("wrote password verifier");
            }
        }

        Ok(key)
    }

    // ------------------------------------------------------------------
    // Row operations
    // ------------------------------------------------------------------

    /// Encrypt `credential` and insert or replace the row for `name`.
    pub fn put(&self, key: &DerivedKey, name: &str, credential: &str) -> Result<()> {
        codec::validate_name(name)?;

        let plaintext = codec::encode_credential(credential);
        let token = encrypt_with_aad(key, &plaintext, name.as_bytes())?;

        self.conn.execute(
            "INSERT INTO secrets (name, ciphertext) VALUES (?1, ?2)
             ON CONFLICT(name) DO UPDATE SET ciphertext = excluded.ciphertext",
            params![name, token],
        )?;
        debug!(entry = name, "stored row");
        Ok(())
    }

    /// Decrypt the credential stored under `name`.
    pub fn get(&self, key: &DerivedKey, name: &str) -> Result<Zeroizing<String>> {
        codec::validate_name(name)?;

        let token: Vec<u8> = self
            .conn
            .query_row(
                "SELECT ciphertext FROM secrets WHERE name = ?1",
                params![name],
                |row| row.get(0),
            )
            .optional()?
            .ok_or_else(|| LockboxError::NotFound(name.to_string()))?;

        let plaintext = decrypt_with_aad(key, &token, name.as_bytes())?;
        codec::decode_credential(plaintext)
    }

    /// All stored names in ascending byte order.  Needs no key.
    pub fn list(&self) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT name FROM secrets ORDER BY name ASC")?;
        let names = stmt
            .query_map([], |row| row.get(0))?
            .collect::<std::result::Result<Vec<String>, _>>()?;
        Ok(names)
    }

    /// Remove the row for `name`.  Returns whether a row was removed.
    pub fn delete(&self, name: &str) -> Result<bool> {
        codec::validate_name(name)?;
        let removed = self
            .conn
            .execute("DELETE FROM secrets WHERE name = ?1", params![name])?;
        Ok(removed > 0)
    }

    /// Number of stored rows.
    pub fn len(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM secrets", [], |row| row.get(0))?;
        usize::try_from(count)
            .map_err(|_| LockboxError::MalformedVault(format!("negative row count {count}")))
    }

    /// Returns `true` if no rows are stored.
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    // ------------------------------------------------------------------
    // Rotation
    // ------------------------------------------------------------------

    /// Re-encrypt every row under a key derived from `new_password`.
    ///
    /// All rows and the new salt, iterations and verifier are written in
    /// a single SQLite transaction.  If any step fails the transaction is
    /// rolled back and `old_key` remains valid for every row.
    pub fn rotate(
        &mut self,
        old_key: &DerivedKey,
        new_password: &str,
        confirmation: Option<&str>,
    ) -> Result<DerivedKey> {
        // 1. Decrypt everything under the old key.
        if let Some(encoded) = meta_value(&self.conn, "verifier")? {
            let token = BASE64.decode(encoded).map_err(|e| {
                LockboxError::MalformedVault(format!("verifier is not base64: {e}"))
            })?;
            decrypt_with_aad(old_key, &token, VERIFIER_AAD)?;
        }

        let rows = self.all_rows()?;
        let mut plaintexts = Vec::with_capacity(rows.len());
        for (name, token) in rows {
            let plaintext = decrypt_with_aad(old_key, &token, name.as_bytes()).map_err(|e| {
                warn!("row did not decrypt under the current key, rotation aborted");
                debug!(entry = %name, "undecryptable row");
                e
            })?;
            plaintexts.push((name, Zeroizing::new(plaintext)));
        }

        // 2. Validate the new password.
        rotation::validate_new_password(new_password, confirmation)?;

        // 3. Fresh salt, new key.
        let fresh = rotation::fresh_key(new_password, self.options.iterations)?;

        // 4. Re-encrypt, then commit rows and metadata together.
        let mut sealed = Vec::with_capacity(plaintexts.len());
        for (name, plaintext) in &plaintexts {
            sealed.push((name, encrypt_with_aad(&fresh.key, plaintext, name.as_bytes())?));
        }
        let verifier = encrypt_with_aad(&fresh.key, VERIFIER_PLAINTEXT, VERIFIER_AAD)?;

        self.commit_rotation(&sealed, &fresh.salt, fresh.iterations, &verifier)
            .map_err(|e| {
                warn!(error = %e, "rotation rolled back, vault unchanged");
                e
            })?;

        info!(rows = sealed.len(), "rotated tabular vault password");
        Ok(fresh.key)
    }

    fn all_rows(&self) -> Result<Vec<(String, Vec<u8>)>> {
        let mut stmt = self
            .conn
            .prepare("SELECT name, ciphertext FROM secrets ORDER BY name ASC")?;
        let rows = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn commit_rotation(
        &mut self,
        sealed: &[(&String, Vec<u8>)],
        salt: &[u8],
        iterations: u32,
        verifier: &[u8],
    ) -> Result<()> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare("UPDATE secrets SET ciphertext = ?1 WHERE name = ?2")?;
            for (name, token) in sealed {
                stmt.execute(params![token, name])?;
            }
        }
        set_meta(&tx, "salt", &BASE64.encode(salt))?;
        set_meta(&tx, "iterations", &iterations.to_string())?;
        set_meta(&tx, "kdf", KDF_IDENTIFIER)?;
        set_meta(&tx, "verifier", &BASE64.encode(verifier))?;
        tx.commit()?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    /// Read and validate the cleartext KDF parameters.
    pub fn kdf_params(&self) -> Result<KdfParams> {
        let salt_b64 = meta_value(&self.conn, "salt")?
            .ok_or_else(|| LockboxError::MalformedVault("vault missing salt".into()))?;
        let salt = BASE64
            .decode(salt_b64)
            .map_err(|e| LockboxError::MalformedVault(format!("salt is not base64: {e}")))?;
        if salt.len() < MIN_SALT_LEN {
            return Err(LockboxError::MalformedVault(format!(
                "salt is {} bytes, need at least {MIN_SALT_LEN}",
                salt.len()
            )));
        }

        let iterations = meta_value(&self.conn, "iterations")?
            .ok_or_else(|| LockboxError::MalformedVault("vault missing iterations".into()))?
            .trim()
            .parse::<u32>()
            .map_err(|e| LockboxError::MalformedVault(format!("bad iterations: {e}")))?;
        if iterations == 0 {
            return Err(LockboxError::MalformedVault(
                "iterations must be positive".into(),
            ));
        }

        if let Some(version) = meta_value(&self.conn, "version")? {
            if version.trim().parse::<u32>().ok() != Some(SCHEMA_VERSION) {
                return Err(LockboxError::MalformedVault(format!(
                    "unsupported version '{version}', expected {SCHEMA_VERSION}"
                )));
            }
        }

        if let Some(kdf) = meta_value(&self.conn, "kdf")? {
            if kdf != KDF_IDENTIFIER {
                return Err(LockboxError::MalformedVault(format!(
                    "unsupported kdf '{kdf}'"
                )));
            }
        }

        Ok(KdfParams { salt, iterations })
    }

    /// Returns the path to the database file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// `true` for a database nothing has been written to yet.
fn is_blank(conn: &Connection) -> Result<bool> {
    let rows: i64 = conn.query_row(
        "SELECT (SELECT COUNT(*) FROM meta) + (SELECT COUNT(*) FROM secrets)",
        [],
        |row| row.get(0),
    )?;
    Ok(rows == 0)
}

fn meta_value(conn: &Connection, key: &str) -> Result<Option<String>> {
    let value = conn
        .query_row(
            "SELECT value FROM meta WHERE key = ?1",
            params![key],
            |row| row.get(0),
        )
        .optional()?;
    Ok(value)
}

fn set_meta(conn: &Connection, key: &str, value: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO meta (key, value) VALUES (?1, ?2)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        params![key, value],
    )?;
    Ok(())
}
