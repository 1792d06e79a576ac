//! Implementation of the `uniquejobs reap` command.

use super::Session;
use crate::cli::ReapArgs;
use crate::error::{Result, UniqueJobsError};
use crate::reaper::Reaper;

pub fn cmd_reap(session: Session, args: ReapArgs) -> Result<()> {
    let store_dir = session.ctx.store_dir.clone();
    let mut reaper = Reaper::from_config(session.store, &session.config);
    if let Some(count) = args.count {
        if count == 0 {
            return Err(UniqueJobsError::UserError(
                "--count must be at least 1".to_string(),
            ));
        }
        reaper = reaper.with_count(count);
    }

    let report = reaper.run_once()?;
    println!("Reaper pass on {}: {}", store_dir.display(), report);
    Ok(())
}
