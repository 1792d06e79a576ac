//! CLI argument parsing for uniquejobs.
//!
//! Uses clap derive macros for declarative argument definitions.
//! This module defines the command structure; actual implementations
//! are in the `commands` module.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// uniquejobs: inspect and maintain unique-job locks.
///
/// Operates on a file-backed coordination store shared by job workers:
/// - List and clear lock digests
/// - Run an orphan reaper pass
/// - Read the lock changelog
#[derive(Parser, Debug)]
#[command(name = "uniquejobs")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Store directory (default: $UNIQUE_JOBS_STORE or ./.unique_jobs).
    #[arg(long, global = true, value_name = "DIR")]
    pub store: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands for uniquejobs.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Manage lock digests.
    Locks(LockCommand),

    /// Run one orphan reaper pass.
    ///
    /// Deletes digests whose holders are in no pending queue, schedule,
    /// retry set or working set.
    Reap(ReapArgs),

    /// Show recent lock changelog entries, newest first.
    Changelog(ChangelogArgs),

    /// Print the digest a job would lock on.
    ///
    /// Uses the worker's lock options from the store config.
    Digest(DigestArgs),
}

/// Lock subcommands.
#[derive(Parser, Debug)]
pub struct LockCommand {
    #[command(subcommand)]
    pub action: LockAction,
}

/// Available lock actions.
#[derive(Subcommand, Debug)]
pub enum LockAction {
    /// List indexed locks with their holders.
    List(LockListArgs),

    /// Clear a specific lock.
    ///
    /// Requires --force flag to prevent accidental clearing.
    Clear(LockClearArgs),
}

/// Arguments for the `locks list` command.
#[derive(Parser, Debug)]
pub struct LockListArgs {
    /// Glob over digests (e.g. "uniquejobs:*").
    #[arg(long, short)]
    pub pattern: Option<String>,

    /// Maximum number of locks to show.
    #[arg(long, short, default_value_t = 100)]
    pub count: usize,
}

/// Arguments for the `locks clear` command.
#[derive(Parser, Debug)]
pub struct LockClearArgs {
    /// Digest to clear.
    pub digest: String,

    /// Force clearing the lock (required for safety).
    #[arg(long)]
    pub force: bool,
}

/// Arguments for the `reap` command.
#[derive(Parser, Debug)]
pub struct ReapArgs {
    /// Maximum digests to inspect (default: reaper_count from config).
    #[arg(long, short)]
    pub count: Option<usize>,
}

/// Arguments for the `changelog` command.
#[derive(Parser, Debug)]
pub struct ChangelogArgs {
    /// Number of entries to show.
    #[arg(long, short, default_value_t = 20)]
    pub count: usize,

    /// Print entries as NDJSON.
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `digest` command.
#[derive(Parser, Debug)]
pub struct DigestArgs {
    /// Worker class name.
    pub class: String,

    /// Job arguments as a JSON array.
    #[arg(default_value = "[]")]
    pub args: String,

    /// Queue the job would be pushed to.
    #[arg(long, short, default_value = "default")]
    pub queue: String,
}

impl Cli {
    /// Parse command line arguments.
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
