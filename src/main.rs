//! uniquejobs: operator CLI for unique-job locks.
//!
//! This is the main entry point for the `uniquejobs` binary. It installs the
//! log subscriber, parses arguments, dispatches to the appropriate command
//! handler, and handles errors with proper exit codes.

use std::process::ExitCode;
use tracing_subscriber::EnvFilter;
use unique_jobs::cli::Cli;
use unique_jobs::{commands, exit_codes};

/// Environment variable holding the log filter (e.g. `unique_jobs=debug`).
const LOG_ENV_VAR: &str = "UNIQUE_JOBS_LOG";

fn main() -> ExitCode {
    let filter = EnvFilter::try_from_env(LOG_ENV_VAR).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let cli = Cli::parse_args();

    match commands::dispatch(cli) {
        Ok(()) => ExitCode::from(exit_codes::SUCCESS as u8),
        Err(err) => {
            // Print user-actionable error message to stderr
            eprintln!("Error: {}", err);

            // Return appropriate exit code
            ExitCode::from(err.exit_code() as u8)
        }
    }
}
