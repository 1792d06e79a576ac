//! unique-jobs: digest-based unique locks for background jobs.
//!
//! Jobs are identified by a digest of their worker, queue and arguments.
//! Locks on those digests live in a shared coordination store and are
//! changed only through atomic scripts, so any number of processes can
//! submit and execute jobs against the same store. An orphan reaper removes
//! lock state whose holders are no longer in any live job collection.
//!
//! The `uniquejobs` binary is a thin operator CLI over this library.

pub mod changelog;
pub mod cli;
pub mod clock;
pub mod commands;
pub mod config;
pub mod conflict;
pub mod context;
pub mod digest;
pub mod engine;
pub mod error;
pub mod exit_codes;
pub mod fs;
pub mod job;
pub mod locks;
pub mod queue;
pub mod reaper;
pub mod scripts;
pub mod store;

#[cfg(test)]
mod test_support;

pub use clock::{Clock, ManualClock, Millis, SystemClock};
pub use config::{Config, LockKind, LockOptions, OnConflict};
pub use conflict::{ConflictStrategy, Strategy};
pub use digest::compute_digest;
pub use engine::{AcquireOutcome, Decision, LockEngine, ReleaseOutcome};
pub use error::{Result, UniqueJobsError};
pub use job::JobItem;
pub use reaper::{ReapReport, Reaper, ReaperHandle};
pub use store::{CoordinationStore, FileStore, MemoryStore};
