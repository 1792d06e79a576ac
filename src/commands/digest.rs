//! Implementation of the `uniquejobs digest` command.

use crate::cli::DigestArgs;
use crate::config::{Config, LockKind};
use crate::context::StoreContext;
use crate::digest::{compute_digest, run_digest};
use crate::error::{Result, UniqueJobsError};
use crate::job::JobItem;
use serde_json::Value;

pub fn cmd_digest(ctx: &StoreContext, args: DigestArgs) -> Result<()> {
    let config = ctx.load_config()?;
    for line in digest_lines(&config, &args)? {
        println!("{}", line);
    }
    Ok(())
}

/// The lock digest for the job, plus the run digest when the worker's kind
/// takes one.
fn digest_lines(config: &Config, args: &DigestArgs) -> Result<Vec<String>> {
    let job_args: Vec<Value> = serde_json::from_str(&args.args).map_err(|e| {
        UniqueJobsError::UserError(format!(
            "job arguments must be a JSON array, got '{}': {}",
            args.args, e
        ))
    })?;

    let options = config.options_for(&args.class);
    let item = JobItem::new(args.class.as_str(), job_args).with_queue(args.queue.as_str());
    let digest = compute_digest(&config.lock_prefix, &item, &options)?;

    let mut lines = vec![digest.clone()];
    if options.lock == LockKind::UntilAndWhileExecuting {
        lines.push(run_digest(&digest));
    }
    Ok(lines)
}
