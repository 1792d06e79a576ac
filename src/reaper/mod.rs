//! Orphan reaper.
//!
//! Lock state outlives its job when a process crashes between acquire and
//! release, or when a job is deleted from a queue by hand. The reaper sweeps
//! the oldest indexed digests and deletes those whose holders are in none of
//! the live job collections (pending queues, schedule, retry, working).
//!
//! A pass is advisory: a store error ends it early and leaves everything for
//! the next pass. Digests younger than the grace period are never looked at,
//! since an until-lock is taken before its job reaches a queue. Running two
//! reapers at once is safe; each deletion re-checks liveness atomically.

use crate::changelog::ChangelogPolicy;
use crate::clock::duration_ms;
use crate::config::Config;
use crate::error::{Result, UniqueJobsError};
use crate::scripts::{ReapDigest, ReapVerdict, ScanOrphans};
use crate::store::CoordinationStore;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info, warn};


/// Counts from one reaper pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReapReport {
    /// Index entries read.
    pub scanned: usize,
    /// Entries that looked orphaned on the scan.
    pub orphans: usize,
    /// Digests deleted.
    pub reaped: usize,
    /// Orphans spared by the atomic re-check.
    pub spared: usize,
}

impl std::fmt::Display for ReapReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "scanned {}, orphaned {}, reaped {}, spared {}",
            self.scanned, self.orphans, self.reaped, self.spared
        )
    }
}

/// Deletes lock state that no live job refers to.
#[derive(Debug)]
pub struct Reaper<S> {
    store: S,
    count: usize,
    grace: Duration,
    changelog: ChangelogPolicy,
}

impl<S: CoordinationStore> Reaper<S> {
    pub fn new(store: S, count: usize, grace: Duration, changelog: ChangelogPolicy) -> Self {
        Self {
            store,
            count,
            grace,
            changelog,
        }
    }

    pub fn from_config(store: S, config: &Config) -> Self {
        Self::new(
            store,
            config.reaper_count,
            config.reaper_grace(),
            ChangelogPolicy::new(config.changelog_capacity()),
        )
    }

    /// Override the number of digests inspected per pass.
    pub fn with_count(mut self, count: usize) -> Self {
        self.count = count;
        self
    }

    /// Run a single pass.
    pub fn run_once(&self) -> Result<ReapReport> {
        let cutoff = self.store.now_ms().saturating_sub(duration_ms(self.grace));
        let (scanned, candidates) = self.store.eval(&ScanOrphans {
            cutoff,
            count: self.count,
        })?;

        let mut report = ReapReport {
            scanned,
            orphans: candidates.len(),
            ..ReapReport::default()
        };

        for candidate in &candidates {
            let verdict = self.store.eval(&ReapDigest {
                digest: &candidate.digest,
                cutoff,
                changelog: &self.changelog,
            })?;

            match verdict {
                ReapVerdict::Reaped { holders } => {
                    info!(digest = %candidate.digest, holders = ?holders, "reaped orphaned lock");
                    report.reaped += 1;
                }
                ReapVerdict::Live { job_id } => {
                    debug!(digest = %candidate.digest, job_id = %job_id, "holder became live");
                    report.spared += 1;
                }
                ReapVerdict::Fresh => {
                    debug!(digest = %candidate.digest, "lock re-acquired during pass");
                    report.spared += 1;
                }
                ReapVerdict::Missing => {}
            }
        }

        debug!(%report, "reaper pass finished");
        Ok(report)
    }
}

impl<S: CoordinationStore + 'static> Reaper<S> {
    /// Run passes every `interval` on a background thread until stopped.
    pub fn spawn(self, interval: Duration) -> Result<ReaperHandle> {
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let passes = Arc::new(AtomicU64::new(0));
        let counter = passes.clone();

        let thread = thread::Builder::new()
            .name("unique-jobs-reaper".to_string())
            .spawn(move || {
                loop {
                    if let Err(e) = self.run_once() {
                        warn!(error = %e, "reaper pass failed");
                    }
                    counter.fetch_add(1, Ordering::SeqCst);

                    match stop_rx.recv_timeout(interval) {
                        Err(RecvTimeoutError::Timeout) => continue,
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                debug!("reaper stopped");
            })
            .map_err(|e| UniqueJobsError::UserError(format!("failed to start reaper: {}", e)))?;

        Ok(ReaperHandle {
            stop_tx: Some(stop_tx),
            thread: Some(thread),
            passes,
        })
    }
}

/// Stops the background reaper when told to or when dropped.
#[derive(Debug)]
pub struct ReaperHandle {
    stop_tx: Option<mpsc::Sender<()>>,
    thread: Option<JoinHandle<()>>,
    passes: Arc<AtomicU64>,
}

impl ReaperHandle {
    /// Passes completed so far, successful or not.
    pub fn passes(&self) -> u64 {
        self.passes.load(Ordering::SeqCst)
    }

    /// Stop the reaper and wait for the running pass to finish.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for ReaperHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}
