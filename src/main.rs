use clap::Parser;
use lockbox::cli::{Cli, Commands};
use tracing_subscriber::EnvFilter;

fn main() {
    init_tracing();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Set {
            ref name,
            ref value,
        } => lockbox::cli::commands::set::execute(&cli, name, value.as_deref()),
        Commands::Get { ref name } => lockbox::cli::commands::get::execute(&cli, name),
        Commands::List => lockbox::cli::commands::list::execute(&cli),
        Commands::Delete { ref name, force } => {
            lockbox::cli::commands::delete::execute(&cli, name, force)
        }
        Commands::Rotate { force } => lockbox::cli::commands::rotate::execute(&cli, force),
    };

    if let Err(e) = result {
        lockbox::cli::output::error(&e.to_string());
        std::process::exit(1);
    }
}

/// Diagnostics go to stderr, filtered by `LOCKBOX_LOG` (default `warn`).
fn init_tracing() {
    let filter = EnvFilter::try_from_env("LOCKBOX_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
