//! `lockbox rotate` — change the vault master password.
//!
//! Unlocks with the current password, then re-encrypts every entry under
//! a key derived from the new password and a fresh salt.  The vault on
//! disk switches over in one step or not at all.

use crate::cli::output;
use crate::cli::{confirm, open_session, prompt_rotation_password, resolve_location, Cli};
use crate::errors::{LockboxError, Result};

/// Execute the `rotate` command.
pub fn execute(cli: &Cli, force: bool) -> Result<()> {
    let (settings, location) = resolve_location(cli)?;
    if !location.exists() {
        return Err(LockboxError::CommandFailed(format!(
            "no vault at {} (run `lockbox set` to create one)",
            location.path.display()
        )));
    }

    if !force && !confirm("Re-encrypt every entry under a new master password?")? {
        output::info("Cancelled.");
        return Ok(());
    }

    output::info("Enter your current vault password.");
    let mut session = open_session(cli)?;

    output::info("Choose your new vault password.");
    let (new_password, confirmation) = prompt_rotation_password(settings.min_password_len)?;

    session.rotate(&new_password, Some(confirmation.as_str()))?;

    output::success(&format!(
        "Master password rotated for {} ({} entries re-encrypted)",
        session.path().display(),
        session.list()?.len()
    ));
    output::tip("The old password no longer unlocks this vault.");

    Ok(())
}
