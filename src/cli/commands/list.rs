//! `lockbox list` — display all entry names in a table.

use crate::cli::output;
use crate::cli::{open_session, Cli};
use crate::errors::Result;

/// Execute the `list` command.
pub fn execute(cli: &Cli) -> Result<()> {
    let session = open_session(cli)?;
    let names = session.list()?;

    output::info(&format!(
        "{} vault at {} — {} entr{}",
        session.storage_form(),
        session.path().display(),
        names.len(),
        if names.len() == 1 { "y" } else { "ies" }
    ));

    output::print_names_table(&names);

    Ok(())
}
