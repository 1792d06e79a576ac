//! The lock engine.
//!
//! [`LockEngine`] turns acquire/release/extend calls into atomic scripts on a
//! [`CoordinationStore`] and interprets their replies. Each call is a single
//! script execution; nothing here retries or blocks waiting for a lock.
//!
//! The lifecycle hooks in [`lifecycle`] drive the lock kinds on top of these
//! primitives.

mod lifecycle;
mod types;


pub use types::{AcquireOutcome, Decision, ExtendOutcome, ReleaseOutcome};

use crate::changelog::ChangelogPolicy;
use crate::config::{Config, LockKind, LockOptions};
use crate::digest::compute_digest;
use crate::error::{Result, UniqueJobsError};
use crate::job::JobItem;
use crate::scripts::{
    Acquire, AcquireReply, DeleteDigest, Extend, ExtendReply, LockRequest, ReadHolders, Release,
};
use crate::store::{CoordinationStore, LockRecord};
use std::time::Duration;
use tracing::{debug, warn};

/// Acquires, releases and extends locks against a shared store.
#[derive(Debug)]
pub struct LockEngine<S> {
    store: S,
    config: Config,
    changelog: ChangelogPolicy,
}

impl<S: CoordinationStore> LockEngine<S> {
    pub fn new(store: S, config: Config) -> Self {
        let changelog = ChangelogPolicy::new(config.changelog_capacity());
        Self {
            store,
            config,
            changelog,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn changelog_policy(&self) -> &ChangelogPolicy {
        &self.changelog
    }

    /// The digest identifying `item` under `options`.
    pub fn digest_for(&self, item: &JobItem, options: &LockOptions) -> Result<String> {
        compute_digest(&self.config.lock_prefix, item, options)
    }

    /// Take a holder slot on `digest` for `job_id`.
    ///
    /// Calling again while holding refreshes the expiry without taking a
    /// second slot.
    pub fn acquire(
        &self,
        digest: &str,
        job_id: &str,
        kind: LockKind,
        limit: u32,
        ttl: Option<Duration>,
    ) -> Result<AcquireOutcome> {
        let request = LockRequest::new(digest, job_id, kind)
            .with_limit(limit)
            .with_ttl(ttl);
        self.acquire_request(&request)
    }

    /// Acquire with full metadata (worker, lock args).
    pub fn acquire_request(&self, request: &LockRequest) -> Result<AcquireOutcome> {
        validate_request(request)?;

        let reply = self.store.eval(&Acquire {
            request,
            changelog: &self.changelog,
        })?;

        match reply {
            AcquireReply::Acquired {
                refreshed,
                expires_at,
            } => {
                debug!(
                    digest = %request.digest,
                    job_id = %request.job_id,
                    kind = %request.kind,
                    refreshed,
                    "lock acquired"
                );
                Ok(AcquireOutcome::Acquired {
                    expires_at,
                    refreshed,
                })
            }
            AcquireReply::Conflict { holders } => {
                warn!(
                    digest = %request.digest,
                    job_id = %request.job_id,
                    kind = %request.kind,
                    limit = request.limit,
                    holders = ?holders,
                    "lock conflict"
                );
                Ok(AcquireOutcome::Conflict { holders })
            }
        }
    }

    /// Remove `job_id` from the holders of `digest`.
    pub fn release(&self, digest: &str, job_id: &str) -> Result<ReleaseOutcome> {
        let reply = self.store.eval(&Release {
            digest,
            job_id,
            changelog: &self.changelog,
        })?;

        if reply.released {
            debug!(digest, job_id, remaining = reply.remaining, "lock released");
            Ok(ReleaseOutcome::Released {
                remaining: reply.remaining,
            })
        } else {
            debug!(digest, job_id, "release by non-holder");
            Ok(ReleaseOutcome::NotHeld)
        }
    }

    /// Move the expiry of a held lock to now + `ttl` (`None` = never).
    ///
    /// Locks whose kind is released only by TTL refuse `None` with
    /// [`UniqueJobsError::UserError`].
    pub fn extend(
        &self,
        digest: &str,
        job_id: &str,
        ttl: Option<Duration>,
    ) -> Result<ExtendOutcome> {
        let extended = self.store.eval(&Extend {
            digest,
            job_id,
            ttl,
            changelog: &self.changelog,
        })?;

        match extended {
            ExtendReply::Extended { expires_at } => {
                debug!(digest, job_id, expires_at, "lock extended");
                Ok(ExtendOutcome::Extended { expires_at })
            }
            ExtendReply::NotHeld => {
                debug!(digest, job_id, "extend by non-holder");
                Ok(ExtendOutcome::NotHeld)
            }
            ExtendReply::TtlRequired { kind } => Err(UniqueJobsError::UserError(format!(
                "{} lock '{}' must keep a TTL; extend it with a duration",
                kind, digest
            ))),
        }
    }

    /// Job ids currently holding `digest`.
    pub fn holders(&self, digest: &str) -> Result<Vec<String>> {
        let holders = self.store.eval(&ReadHolders { digest })?;
        Ok(holders.into_iter().map(|(jid, _)| jid).collect())
    }

    /// Force-remove a digest regardless of holders.
    pub fn delete(&self, digest: &str) -> Result<Option<LockRecord>> {
        let deleted = self.store.eval(&DeleteDigest {
            digest,
            changelog: &self.changelog,
        })?;
        if deleted.is_some() {
            warn!(digest, "lock deleted");
        }
        Ok(deleted)
    }
}

fn validate_request(request: &LockRequest) -> Result<()> {
    if request.digest.is_empty() {
        return Err(UniqueJobsError::UserError("digest must not be empty".to_string()));
    }
    if request.job_id.is_empty() {
        return Err(UniqueJobsError::UserError("job id must not be empty".to_string()));
    }
    if request.limit == 0 {
        return Err(UniqueJobsError::UserError(format!(
            "lock limit for '{}' must be positive",
            request.digest
        )));
    }
    if request.kind.requires_ttl() && request.ttl.is_none() {
        return Err(UniqueJobsError::UserError(format!(
            "{} lock on '{}' requires a ttl",
            request.kind, request.digest
        )));
    }
    Ok(())
}
