//! Lock listing and clearing.

use super::types::LockInfo;
use crate::engine::LockEngine;
use crate::error::{Result, UniqueJobsError};
use crate::scripts::{ListLocks, LockSummary};
use crate::store::CoordinationStore;
use globset::Glob;

/// List indexed locks.
///
/// # Arguments
///
/// * `store` - The coordination store
/// * `pattern` - Optional glob over digests (e.g. `uniquejobs:*`)
/// * `count` - Maximum number of locks returned
///
/// # Returns
///
/// Locks in digest order.
pub fn list_locks<S: CoordinationStore>(
    store: &S,
    pattern: Option<&str>,
    count: usize,
) -> Result<Vec<LockInfo>> {
    let matcher = pattern
        .map(|p| {
            Glob::new(p)
                .map(|g| g.compile_matcher())
                .map_err(|e| UniqueJobsError::UserError(format!("invalid pattern '{}': {}", p, e)))
        })
        .transpose()?;

    let summaries = store.eval(&ListLocks { matcher, count })?;
    let now = store.now_ms();

    Ok(summaries
        .into_iter()
        .map(|summary| LockInfo::from_summary(summary, now))
        .collect())
}

/// Clear a lock regardless of its holders.
///
/// # Returns
///
/// * `Ok(LockInfo)` - The cleared lock as it was (for audit purposes)
/// * `Err(UniqueJobsError::UserError)` - The digest is not indexed or held
pub fn clear_lock<S: CoordinationStore>(engine: &LockEngine<S>, digest: &str) -> Result<LockInfo> {
    let keys = engine.store().snapshot()?;
    let score = keys.digest_score(digest);
    if score.is_none() && keys.lock(digest).is_none() {
        return Err(UniqueJobsError::UserError(format!(
            "lock '{}' does not exist",
            digest
        )));
    }

    let now = engine.store().now_ms();
    let record = engine.delete(digest)?;
    Ok(LockInfo::from_summary(
        LockSummary {
            digest: digest.to_string(),
            score: score.unwrap_or(now),
            record,
        },
        now,
    ))
}
