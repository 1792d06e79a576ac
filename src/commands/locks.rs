//! Implementation of the `uniquejobs locks` commands.

use super::Session;
use crate::cli::{LockClearArgs, LockListArgs};
use crate::engine::LockEngine;
use crate::error::{Result, UniqueJobsError};
use crate::locks::{self, LockInfo};

pub fn cmd_locks_list(session: &Session, args: LockListArgs) -> Result<()> {
    let locks = locks::list_locks(&session.store, args.pattern.as_deref(), args.count)?;
    print!("{}", render_lock_list(&locks));
    Ok(())
}

pub fn cmd_locks_clear(session: Session, args: LockClearArgs) -> Result<()> {
    if !args.force {
        return Err(UniqueJobsError::UserError(format!(
            "refusing to clear lock without --force flag.\n\n\
             Clearing a lock lets a duplicate of a still-running job start.\n\
             Only clear locks whose holders you know are gone.\n\n\
             To clear the lock, run:\n  uniquejobs locks clear {} --force",
            args.digest
        )));
    }

    let engine = LockEngine::new(session.store, session.config);
    let cleared = locks::clear_lock(&engine, &args.digest)?;

    println!("Cleared lock: {}", cleared.digest);
    println!();
    println!("Lock details:");
    println!("  {}", cleared);
    Ok(())
}

fn render_lock_list(locks: &[LockInfo]) -> String {
    if locks.is_empty() {
        return "No active locks.\n".to_string();
    }

    let mut out = format!("Active locks ({}):\n\n", locks.len());
    for lock in locks {
        out.push_str(&format!("  {}\n", lock));
    }

    let unheld = locks.iter().filter(|l| l.live_holders() == 0).count();
    if unheld > 0 {
        out.push_str(&format!(
            "\nNote: {} lock(s) have no live holder. Run `uniquejobs reap` to clean up orphans.\n",
            unheld
        ));
    }
    out
}
