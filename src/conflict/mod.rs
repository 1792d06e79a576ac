//! Conflict strategies.
//!
//! When an acquire finds the limit saturated the engine hands the duplicate to
//! a [`ConflictStrategy`]. The configured [`OnConflict`] value picks one of the
//! built-in [`Strategy`] variants; callers with their own needs can implement
//! the trait and drive the engine with it.

use crate::changelog::ChangelogPolicy;
use crate::clock::{Millis, duration_ms};
use crate::config::{Config, LockKind, OnConflict};
use crate::error::{Result, UniqueJobsError};
use crate::job::JobItem;
use crate::scripts::{RejectJob, ReplaceDigest, RescheduleJob};
use crate::store::CoordinationStore;
use std::time::Duration;
use tracing::{debug, info, warn};


/// Lifecycle point at which the conflict happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictPhase {
    Submit,
    ExecuteStart,
}

/// Everything a strategy may look at.
#[derive(Debug)]
pub struct ConflictContext<'a> {
    pub digest: &'a str,
    pub item: &'a JobItem,
    pub kind: LockKind,
    pub phase: ConflictPhase,
    /// Job ids holding the lock when the acquire failed.
    pub holders: &'a [String],
    pub changelog: &'a ChangelogPolicy,
}

/// What the engine should do with the duplicate next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConflictResolution {
    /// Do not enqueue or run it.
    Dropped,
    /// Placed on the schedule for `at`; do not enqueue or run it now.
    Rescheduled { at: Millis },
    /// The way was cleared; try the acquire once more.
    Retry,
}

pub trait ConflictStrategy {
    fn name(&self) -> &'static str;

    fn call<S: CoordinationStore>(
        &self,
        store: &S,
        ctx: &ConflictContext<'_>,
    ) -> Result<ConflictResolution>;
}

/// The built-in strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Skip,
    Log,
    Raise,
    Reject,
    Reschedule { delay: Duration },
    Replace,
}

impl Strategy {
    /// Pick the strategy for a configured value at a lifecycle point.
    ///
    /// `replace` is only honored on submit; a running holder is never evicted,
    /// so at execution start it behaves like `log`.
    ///
    /// `reschedule` is only honored at execution start, where the job comes
    /// back through execution start (and its lock check) when it is due. A
    /// submit-time duplicate would reach the queue from the schedule without
    /// passing the submit lock again, so on submit it behaves like `log`.
    pub fn resolve(on_conflict: OnConflict, config: &Config, phase: ConflictPhase) -> Self {
        match on_conflict {
            OnConflict::Skip => Strategy::Skip,
            OnConflict::Log => Strategy::Log,
            OnConflict::Raise => Strategy::Raise,
            OnConflict::Reject => Strategy::Reject,
            OnConflict::Reschedule if phase == ConflictPhase::ExecuteStart => {
                Strategy::Reschedule {
                    delay: config.reschedule_delay(),
                }
            }
            OnConflict::Reschedule => Strategy::Log,
            OnConflict::Replace if phase == ConflictPhase::Submit => Strategy::Replace,
            OnConflict::Replace => Strategy::Log,
        }
    }
}

impl ConflictStrategy for Strategy {
    fn name(&self) -> &'static str {
        match self {
            Strategy::Skip => "skip",
            Strategy::Log => "log",
            Strategy::Raise => "raise",
            Strategy::Reject => "reject",
            Strategy::Reschedule { .. } => "reschedule",
            Strategy::Replace => "replace",
        }
    }

    fn call<S: CoordinationStore>(
        &self,
        store: &S,
        ctx: &ConflictContext<'_>,
    ) -> Result<ConflictResolution> {
        match self {
            Strategy::Skip => {
                debug!(digest = ctx.digest, job_id = %ctx.item.jid, "duplicate skipped");
                Ok(ConflictResolution::Dropped)
            }
            Strategy::Log => {
                info!(
                    digest = ctx.digest,
                    job_id = %ctx.item.jid,
                    class = %ctx.item.class,
                    holders = ?ctx.holders,
                    "duplicate dropped"
                );
                Ok(ConflictResolution::Dropped)
            }
            Strategy::Raise => Err(UniqueJobsError::LockConflict {
                digest: ctx.digest.to_string(),
                job_id: ctx.item.jid.clone(),
            }),
            Strategy::Reject => {
                store.eval(&RejectJob {
                    digest: ctx.digest,
                    item: ctx.item,
                    changelog: ctx.changelog,
                })?;
                warn!(digest = ctx.digest, job_id = %ctx.item.jid, "duplicate moved to dead set");
                Ok(ConflictResolution::Dropped)
            }
            Strategy::Reschedule { delay } => {
                let at = store.now_ms().saturating_add(duration_ms(*delay));
                store.eval(&RescheduleJob {
                    digest: ctx.digest,
                    item: ctx.item,
                    at,
                    changelog: ctx.changelog,
                })?;
                debug!(digest = ctx.digest, job_id = %ctx.item.jid, at, "duplicate rescheduled");
                Ok(ConflictResolution::Rescheduled { at })
            }
            Strategy::Replace => {
                let removed = store.eval(&ReplaceDigest {
                    digest: ctx.digest,
                    changelog: ctx.changelog,
                })?;
                info!(
                    digest = ctx.digest,
                    job_id = %ctx.item.jid,
                    removed = ?removed,
                    "queued jobs replaced by duplicate"
                );
                Ok(ConflictResolution::Retry)
            }
        }
    }
}
