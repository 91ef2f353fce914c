//! `lockbox get` — retrieve and print a single credential.

use crate::cli::{open_session, Cli};
use crate::errors::Result;

/// Execute the `get` command.
pub fn execute(cli: &Cli, name: &str) -> Result<()> {
    let session = open_session(cli)?;

    // Decrypted value goes to stdout only; everything else is on stderr.
    let value = session.get(name)?;
    println!("{}", value.as_str());

    Ok(())
}
