//! Keyswitch - encrypted credential profiles for developers.

use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use keyswitch::cli::output;
use keyswitch::cli::{execute, Cli};
use keyswitch::core::constants::LOG_ENV;

fn main() {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("keyswitch=debug")
        } else {
            EnvFilter::new("keyswitch=warn")
        }
    });

    // Logs go to stderr; stdout belongs to command output and `run` children.
    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .without_time(),
        )
        .init();

    match execute(cli.command) {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            output::error(&e.to_string());
            if let Some(hint) = e.hint() {
                output::hint(hint);
            }
            std::process::exit(1);
        }
    }
}
