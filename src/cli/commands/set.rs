//! `lockbox set` — add or replace a credential.

use std::io::{self, IsTerminal, Read};

use zeroize::Zeroizing;

use crate::cli::output;
use crate::cli::{open_session, Cli};
use crate::errors::{LockboxError, Result};
use crate::vault::codec::validate_name;

/// Execute the `set` command.
pub fn execute(cli: &Cli, name: &str, value: Option<&str>) -> Result<()> {
    // Reject an empty name before prompting for anything.
    validate_name(name)?;

    // Determine the credential from one of three sources.
    let credential = if let Some(v) = value {
        output::warning("Value provided on command line — it may appear in shell history.");
        Zeroizing::new(v.to_string())
    } else if !io::stdin().is_terminal() {
        let mut buf = Zeroizing::new(String::new());
        io::stdin().read_to_string(&mut buf)?;
        let trimmed_len = buf.trim_end_matches(['\r', '\n']).len();
        buf.truncate(trimmed_len);
        buf
    } else {
        let v = dialoguer::Password::new()
            .with_prompt(format!("Credential for {name}"))
            .with_confirmation(
                format!("Re-enter credential for {name}"),
                "Credentials do not match, try again",
            )
            .allow_empty_password(true)
            .interact()
            .map_err(|e| LockboxError::CommandFailed(format!("input prompt: {e}")))?;
        Zeroizing::new(v)
    };

    let mut session = open_session(cli)?;

    let existed = session.list()?.iter().any(|n| n == name);
    session.put(name, &credential)?;
    let total = session.list()?.len();

    let verb = if existed { "updated" } else { "added" };
    output::success(&format!("Entry '{name}' {verb} ({total} total)"));

    Ok(())
}
