use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::crypto::kdf::DEFAULT_ITERATIONS;
use crate::errors::{LockboxError, Result};
use crate::vault::{StorageForm, VaultLocation, VaultOptions};

/// Project-level configuration, loaded from `.lockbox.toml`.
///
/// Every field has a sensible default so Lockbox works out-of-the-box
/// without any config file at all.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Vault file, relative to the project directory unless absolute.
    #[serde(default = "default_vault_path")]
    pub vault_path: String,

    /// Persistence layout: `document` or `table`.
    #[serde(default = "default_storage")]
    pub storage: StorageForm,

    /// PBKDF2 iteration count for new vaults and rotations.
    #[serde(default = "default_kdf_iterations")]
    pub kdf_iterations: u32,

    /// Shortest master password the CLI accepts when choosing one.
    #[serde(default = "default_min_password_len")]
    pub min_password_len: usize,
}

// ── Serde default helpers ────────────────────────────────────────────

fn default_vault_path() -> String {
    "vault.enc.json".to_string()
}

fn default_storage() -> StorageForm {
    StorageForm::Document
}

fn default_kdf_iterations() -> u32 {
    DEFAULT_ITERATIONS
}

fn default_min_password_len() -> usize {
    8
}

// ── Implementation ───────────────────────────────────────────────────

impl Default for Settings {
    fn default() -> Self {
        Self {
            vault_path: default_vault_path(),
            storage: default_storage(),
            kdf_iterations: default_kdf_iterations(),
            min_password_len: default_min_password_len(),
        }
    }
}

impl Settings {
    /// Name of the config file we look for in the project root.
    const FILE_NAME: &'static str = ".lockbox.toml";

    /// Load settings from `<project_dir>/.lockbox.toml`.
    ///
    /// If the file does not exist, sensible defaults are returned.
    /// If the file exists but cannot be parsed, an error is returned.
    pub fn load(project_dir: &Path) -> Result<Self> {
        let config_path = project_dir.join(Self::FILE_NAME);

        if !config_path.exists() {
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(&config_path)?;

        let settings: Settings = toml::from_str(&contents).map_err(|e| {
            LockboxError::ConfigError(format!("Failed to parse {}: {e}", config_path.display()))
        })?;

        if settings.kdf_iterations == 0 {
            return Err(LockboxError::ConfigError(format!(
                "kdf_iterations in {} must be at least 1",
                config_path.display()
            )));
        }

        Ok(settings)
    }

    /// Resolve the vault location relative to `project_dir`.
    pub fn location(&self, project_dir: &Path) -> VaultLocation {
        VaultLocation::new(resolve(project_dir, &self.vault_path), self.storage)
    }

    /// Convert the KDF settings into engine options.
    pub fn vault_options(&self) -> VaultOptions {
        VaultOptions::with_iterations(self.kdf_iterations)
    }
}

fn resolve(project_dir: &Path, path: &str) -> PathBuf {
    let path = Path::new(path);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        project_dir.join(path)
    }
}

// ── Tests ────────────────────────────────────────────────────────────
