//! CLI module — Clap argument parser, output helpers, and command implementations.
//!
//! This layer only collects passwords, credentials and confirmations and
//! forwards them to `vault::Session`.  All vault invariants live below it.

pub mod commands;
pub mod output;

use std::path::PathBuf;

use clap::Parser;
use zeroize::Zeroizing;

use crate::config::Settings;
use crate::errors::{LockboxError, Result};
use crate::vault::{Session, StorageForm, VaultLocation};

/// Environment variable holding the master password (CI/scripting).
pub const PASSWORD_ENV: &str = "LOCKBOX_PASSWORD";

/// Environment variable holding the replacement password for `rotate`.
pub const NEW_PASSWORD_ENV: &str = "LOCKBOX_NEW_PASSWORD";

/// Lockbox CLI: encrypted single-user secret vault.
#[derive(Parser)]
#[command(
    name = "lockbox",
    about = "Encrypted single-user secret vault",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Vault file (default: `vault_path` from .lockbox.toml)
    #[arg(long, global = true, env = "LOCKBOX_VAULT")]
    pub vault: Option<String>,

    /// Storage layout (default: `storage` from .lockbox.toml)
    #[arg(long, value_enum, global = true)]
    pub storage: Option<StorageForm>,
}

/// All available subcommands.
#[derive(clap::Subcommand)]
pub enum Commands {
    /// Store a credential (add or replace)
    Set {
        /// Entry name (e.g. github)
        name: String,
        /// Credential value (omit for interactive prompt or stdin)
        value: Option<String>,
    },

    /// Print a stored credential
    Get {
        /// Entry name
        name: String,
    },

    /// List entry names
    List,

    /// Delete an entry
    Delete {
        /// Entry name
        name: String,
        /// Skip confirmation prompt
        #[arg(short, long)]
        force: bool,
    },

    /// Change the master password and re-encrypt every entry
    Rotate {
        /// Skip confirmation prompt
        #[arg(short, long)]
        force: bool,
    },
}

// ---------------------------------------------------------------------------
// Shared helpers used by multiple commands
// ---------------------------------------------------------------------------

/// Load `.lockbox.toml` from the working directory and apply CLI overrides.
pub fn resolve_location(cli: &Cli) -> Result<(Settings, VaultLocation)> {
    let cwd = std::env::current_dir()?;
    let settings = Settings::load(&cwd)?;

    let mut location = settings.location(&cwd);
    if let Some(path) = &cli.vault {
        location.path = cwd.join(PathBuf::from(path));
    }
    if let Some(form) = cli.storage {
        location.form = form;
    }

    Ok((settings, location))
}

/// Unlock the configured vault, creating it on first use.
///
/// A missing vault prompts for a new password with confirmation; an
/// existing one prompts once.
pub fn open_session(cli: &Cli) -> Result<Session> {
    let (settings, location) = resolve_location(cli)?;

    let password = if location.exists() {
        prompt_password()?
    } else {
        output::info(&format!(
            "No vault at {} — creating a new {} vault.",
            location.path.display(),
            location.form
        ));
        prompt_new_password(settings.min_password_len)?
    };

    Session::open_or_init(&location, &password, &settings.vault_options())
}

/// Get the vault password, trying in order:
/// 1. `LOCKBOX_PASSWORD` env var
/// 2. Interactive masked prompt
///
/// Returns `Zeroizing<String>` so the password is wiped from memory on drop.
pub fn prompt_password() -> Result<Zeroizing<String>> {
    if let Some(pw) = password_from_env(PASSWORD_ENV) {
        return Ok(pw);
    }

    let pw = dialoguer::Password::new()
        .with_prompt("Master password")
        .interact()
        .map_err(|e| LockboxError::CommandFailed(format!("password prompt: {e}")))?;
    Ok(Zeroizing::new(pw))
}

/// Prompt for a new password with confirmation (used on first open).
///
/// Also respects `LOCKBOX_PASSWORD` for scripted usage.
pub fn prompt_new_password(min_len: usize) -> Result<Zeroizing<String>> {
    if let Some(pw) = password_from_env(PASSWORD_ENV) {
        check_length(&pw, min_len)?;
        return Ok(pw);
    }

    loop {
        let password = dialoguer::Password::new()
            .with_prompt("Choose master password")
            .with_confirmation(
                "Confirm master password",
                "Passwords do not match, try again",
            )
            .interact()
            .map_err(|e| LockboxError::CommandFailed(format!("password prompt: {e}")))?;

        if password.chars().count() < min_len {
            output::warning(&format!(
                "Password must be at least {min_len} characters. Try again."
            ));
            continue;
        }

        return Ok(Zeroizing::new(password));
    }
}

/// Collect the replacement password and its confirmation for `rotate`.
///
/// The two values are returned separately; the vault itself checks that
/// they match.
pub fn prompt_rotation_password(
    min_len: usize,
) -> Result<(Zeroizing<String>, Zeroizing<String>)> {
    if let Some(pw) = password_from_env(NEW_PASSWORD_ENV) {
        check_length(&pw, min_len)?;
        let confirmation = pw.clone();
        return Ok((pw, confirmation));
    }

    let password = dialoguer::Password::new()
        .with_prompt("New master password")
        .interact()
        .map_err(|e| LockboxError::CommandFailed(format!("password prompt: {e}")))?;
    let password = Zeroizing::new(password);
    check_length(&password, min_len)?;

    let confirmation = dialoguer::Password::new()
        .with_prompt("Re-enter new master password")
        .interact()
        .map_err(|e| LockboxError::CommandFailed(format!("password prompt: {e}")))?;

    Ok((password, Zeroizing::new(confirmation)))
}

fn password_from_env(var: &str) -> Option<Zeroizing<String>> {
    std::env::var(var)
        .ok()
        .filter(|pw| !pw.is_empty())
        .map(Zeroizing::new)
}

fn check_length(password: &str, min_len: usize) -> Result<()> {
    if password.chars().count() < min_len {
        return Err(LockboxError::InvalidInput(format!(
            "password must be at least {min_len} characters"
        )));
    }
    Ok(())
}

/// Ask a yes/no question, defaulting to "no".
pub fn confirm(prompt: &str) -> Result<bool> {
    dialoguer::Confirm::new()
        .with_prompt(prompt)
        .default(false)
        .interact()
        .map_err(|e| LockboxError::CommandFailed(format!("confirm prompt: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn length_is_counted_in_characters() {
        assert!(check_length("ключ-ключ", 8).is_ok());
        assert!(check_length("short", 8).is_err());
        assert!(check_length("", 0).is_ok());
    }

    #[test]
    fn cli_parses_global_overrides() {
        let cli = Cli::try_parse_from([
            "lockbox", "--vault", "v.sqlite", "--storage", "table", "get", "github",
        ])
        .unwrap();
        assert_eq!(cli.vault.as_deref(), Some("v.sqlite"));
        assert_eq!(cli.storage, Some(StorageForm::Table));
        assert!(matches!(cli.command, Commands::Get { ref name } if name == "github"));
    }

    #[test]
    fn cli_rejects_unknown_storage() {
        assert!(Cli::try_parse_from(["lockbox", "--storage", "cloud", "list"]).is_err());
    }
}
