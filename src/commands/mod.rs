//! Command implementations for uniquejobs.
//!
//! This module provides the dispatcher that routes CLI commands to their
//! implementations. Every command resolves the store context, loads the
//! store's config and opens the file store before doing its work.

mod changelog;
mod digest;
mod locks;
mod reap;

use crate::cli::{Cli, Command, LockAction};
use crate::config::Config;
use crate::context::StoreContext;
use crate::error::Result;
use crate::store::FileStore;
use std::path::Path;

/// An opened store with its config.
pub(crate) struct Session {
    pub ctx: StoreContext,
    pub config: Config,
    pub store: FileStore,
}

impl Session {
    pub(crate) fn open(explicit: Option<&Path>) -> Result<Self> {
        let ctx = StoreContext::resolve(explicit)?;
        let config = ctx.load_config()?;
        let store = ctx.open_store(&config)?;
        Ok(Self { ctx, config, store })
    }
}

/// Dispatch a command to its implementation.
///
/// This is the main entry point for command execution. Each command
/// is routed to its handler function.
pub fn dispatch(cli: Cli) -> Result<()> {
    let store = cli.store.as_deref();
    match cli.command {
        Command::Locks(lock_cmd) => match lock_cmd.action {
            LockAction::List(args) => locks::cmd_locks_list(&Session::open(store)?, args),
            LockAction::Clear(args) => locks::cmd_locks_clear(Session::open(store)?, args),
        },
        Command::Reap(args) => reap::cmd_reap(Session::open(store)?, args),
        Command::Changelog(args) => changelog::cmd_changelog(&Session::open(store)?, args),
        Command::Digest(args) => digest::cmd_digest(&StoreContext::resolve(store)?, args),
    }
}
