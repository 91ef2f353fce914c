//! `lockbox delete` — remove an entry from the vault.

use crate::cli::output;
use crate::cli::{confirm, open_session, Cli};
use crate::errors::Result;

/// Execute the `delete` command.
pub fn execute(cli: &Cli, name: &str, force: bool) -> Result<()> {
    // Unless --force is set, ask for confirmation before deleting.
    if !force && !confirm(&format!("Delete entry '{name}'?"))? {
        output::info("Cancelled.");
        return Ok(());
    }

    let mut session = open_session(cli)?;

    if session.delete(name)? {
        output::success(&format!("Deleted entry '{name}'"));
    } else {
        output::warning(&format!("No entry named '{name}'; nothing deleted."));
    }

    Ok(())
}
