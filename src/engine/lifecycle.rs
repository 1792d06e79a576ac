//! Lock kinds as a state machine over the job lifecycle.
//!
//! | kind                        | submit         | execution start            | execution end   |
//! |-----------------------------|----------------|----------------------------|-----------------|
//! | `until_executing`           | acquire        | release                    |                 |
//! | `while_executing`           |                | acquire                    | release         |
//! | `until_and_while_executing` | acquire        | acquire `:RUN`, release    | release `:RUN`  |
//! | `until_expired`             | acquire (ttl)  |                            |                 |
//! | `until_timeout`             | acquire        | release                    |                 |
//!
//! A conflict at either acquire point is handed to the configured strategy.

use super::{AcquireOutcome, Decision, LockEngine};
use crate::conflict::{
    ConflictContext, ConflictPhase, ConflictResolution, ConflictStrategy, Strategy,
};
use crate::config::{LockKind, LockOptions, RunLockPolicy};
use crate::digest::{lock_args, run_digest};
use crate::error::Result;
use crate::job::JobItem;
use crate::scripts::LockRequest;
use crate::store::CoordinationStore;
use tracing::{debug, warn};

impl<S: CoordinationStore> LockEngine<S> {
    /// Called before a job is enqueued.
    ///
    /// Stamps the job with its digest. For kinds that lock on submit, takes the
    /// lock; on conflict the configured strategy decides the job's fate.
    pub fn on_submit(&self, item: &mut JobItem, options: &LockOptions) -> Result<Decision> {
        let strategy =
            Strategy::resolve(options.on_conflict, self.config(), ConflictPhase::Submit);
        self.on_submit_with(item, options, &strategy)
    }

    /// [`on_submit`](Self::on_submit) with a caller-supplied conflict strategy.
    pub fn on_submit_with<C: ConflictStrategy>(
        &self,
        item: &mut JobItem,
        options: &LockOptions,
        strategy: &C,
    ) -> Result<Decision> {
        let digest = self.digest_for(item, options)?;
        item.lock_digest = Some(digest.clone());

        if !options.lock.locks_on_submit() {
            return Ok(Decision::Proceed);
        }

        let request = self.request_for(item, options, &digest)?;
        self.acquire_or_resolve(item, &request, ConflictPhase::Submit, strategy)
    }

    /// Called when a worker is about to run a job.
    pub fn on_execute_start(&self, item: &JobItem, options: &LockOptions) -> Result<Decision> {
        let strategy = Strategy::resolve(
            options.on_conflict,
            self.config(),
            ConflictPhase::ExecuteStart,
        );
        self.on_execute_start_with(item, options, &strategy)
    }

    /// [`on_execute_start`](Self::on_execute_start) with a caller-supplied
    /// conflict strategy.
    pub fn on_execute_start_with<C: ConflictStrategy>(
        &self,
        item: &JobItem,
        options: &LockOptions,
        strategy: &C,
    ) -> Result<Decision> {
        let digest = self.digest_of(item, options)?;

        match options.lock {
            LockKind::UntilExecuting | LockKind::UntilTimeout => {
                self.release(&digest, &item.jid)?;
                Ok(Decision::Proceed)
            }
            LockKind::UntilExpired => Ok(Decision::Proceed),
            LockKind::WhileExecuting => {
                let request = self.request_for(item, options, &digest)?;
                self.acquire_or_resolve(item, &request, ConflictPhase::ExecuteStart, strategy)
            }
            LockKind::UntilAndWhileExecuting => {
                if options.run_lock_policy == RunLockPolicy::RequireUntilLock
                    && !self.holders(&digest)?.contains(&item.jid)
                {
                    warn!(
                        digest = %digest,
                        job_id = %item.jid,
                        "until lock no longer held; not taking the run lock"
                    );
                    return Ok(Decision::Dropped);
                }

                let run = run_digest(&digest);
                let request = self.request_for(item, options, &run)?;
                let decision =
                    self.acquire_or_resolve(item, &request, ConflictPhase::ExecuteStart, strategy)?;
                if decision.proceeds() {
                    self.release(&digest, &item.jid)?;
                }
                Ok(decision)
            }
        }
    }

    /// Called after a job finished, successfully or not.
    pub fn on_execute_end(&self, item: &JobItem, options: &LockOptions) -> Result<()> {
        let digest = self.digest_of(item, options)?;

        match options.lock {
            LockKind::WhileExecuting => {
                self.release(&digest, &item.jid)?;
            }
            LockKind::UntilAndWhileExecuting => {
                self.release(&run_digest(&digest), &item.jid)?;
            }
            LockKind::UntilExecuting | LockKind::UntilExpired | LockKind::UntilTimeout => {}
        }
        Ok(())
    }

    /// The digest stamped on submit, or a fresh computation.
    fn digest_of(&self, item: &JobItem, options: &LockOptions) -> Result<String> {
        match &item.lock_digest {
            Some(digest) => Ok(digest.clone()),
            None => self.digest_for(item, options),
        }
    }

    fn request_for(
        &self,
        item: &JobItem,
        options: &LockOptions,
        digest: &str,
    ) -> Result<LockRequest> {
        let mut request = LockRequest::new(digest, item.jid.as_str(), options.lock)
            .with_limit(options.limit)
            .with_ttl(options.ttl());
        request.worker = Some(item.class.clone());
        request.lock_args = lock_args(item, options)?;
        Ok(request)
    }

    fn acquire_or_resolve<C: ConflictStrategy>(
        &self,
        item: &JobItem,
        request: &LockRequest,
        phase: ConflictPhase,
        strategy: &C,
    ) -> Result<Decision> {
        let holders = match self.acquire_request(request)? {
            AcquireOutcome::Acquired { .. } => return Ok(Decision::Proceed),
            AcquireOutcome::Conflict { holders } => holders,
        };

        let ctx = ConflictContext {
            digest: &request.digest,
            item,
            kind: request.kind,
            phase,
            holders: &holders,
            changelog: self.changelog_policy(),
        };

        match strategy.call(self.store(), &ctx)? {
            ConflictResolution::Dropped => Ok(Decision::Dropped),
            ConflictResolution::Rescheduled { at } => Ok(Decision::Rescheduled { at }),
            ConflictResolution::Retry => {
                if self.acquire_request(request)?.is_acquired() {
                    debug!(
                        digest = %request.digest,
                        job_id = %item.jid,
                        strategy = strategy.name(),
                        "lock acquired after conflict"
                    );
                    Ok(Decision::Proceed)
                } else {
                    Ok(Decision::Dropped)
                }
            }
        }
    }
}
