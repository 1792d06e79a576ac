//! Configuration types and defaults for unique-jobs.
//!
//! This module defines the per-worker lock options, their enums, and the
//! default value functions used by the Config struct.

use serde::{Deserialize, Serialize};

/// When a lock is acquired and released relative to the job lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LockKind {
    /// Locked on submit, released when execution starts.
    #[default]
    UntilExecuting,
    /// Locked when execution starts, released when it ends.
    WhileExecuting,
    /// Both of the above, as two records (`<digest>` and `<digest>:RUN`).
    UntilAndWhileExecuting,
    /// Locked on submit, released only by TTL expiry.
    UntilExpired,
    /// Locked on submit, released on execution start or TTL, whichever first.
    UntilTimeout,
}

impl LockKind {
    /// Stable name used in metadata and the changelog.
    pub fn as_str(&self) -> &'static str {
        match self {
            LockKind::UntilExecuting => "until_executing",
            LockKind::WhileExecuting => "while_executing",
            LockKind::UntilAndWhileExecuting => "until_and_while_executing",
            LockKind::UntilExpired => "until_expired",
            LockKind::UntilTimeout => "until_timeout",
        }
    }

    /// Parse a lock kind from a string.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "until_executing" => Some(Self::UntilExecuting),
            "while_executing" => Some(Self::WhileExecuting),
            "until_and_while_executing" => Some(Self::UntilAndWhileExecuting),
            "until_expired" => Some(Self::UntilExpired),
            "until_timeout" => Some(Self::UntilTimeout),
            _ => None,
        }
    }

    /// Whether this kind takes a lock when the job is submitted.
    pub fn locks_on_submit(&self) -> bool {
        !matches!(self, LockKind::WhileExecuting)
    }

    /// Whether this kind requires a TTL to ever be released.
    pub fn requires_ttl(&self) -> bool {
        matches!(self, LockKind::UntilExpired)
    }
}

impl std::fmt::Display for LockKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What to do when a lock cannot be acquired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OnConflict {
    /// Drop the duplicate silently.
    #[default]
    Skip,
    /// Log the duplicate and drop it.
    Log,
    /// Fail the caller with a `LockConflict` error.
    Raise,
    /// Move the duplicate payload to the dead set.
    Reject,
    /// Schedule the duplicate to be tried again later.
    Reschedule,
    /// Remove queued jobs holding the digest and take the lock instead.
    Replace,
}

/// Which job arguments participate in the digest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LockArgs {
    /// Every argument.
    #[default]
    All,
    /// No arguments; one lock per worker (and queue).
    None,
    /// Positional arguments at these indices.
    Indices(Vec<usize>),
    /// Keys of the first argument when it is an object.
    Keys(Vec<String>),
}

/// Whether the run lock of `until_and_while_executing` depends on the until lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RunLockPolicy {
    /// The run lock is taken regardless of the until lock's state.
    #[default]
    Independent,
    /// Execution only takes the run lock while this job still holds the until lock.
    RequireUntilLock,
}

/// Lock configuration for one worker type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LockOptions {
    /// Lock kind.
    pub lock: LockKind,

    /// Concurrent holders allowed per digest.
    #[serde(default = "default_limit")]
    pub limit: u32,

    /// Holder TTL in seconds (absent = hold until released).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ttl_secs: Option<u64>,

    /// Which arguments participate in the digest.
    pub lock_args: LockArgs,

    /// Strategy invoked on conflict.
    pub on_conflict: OnConflict,

    /// Leave the queue name out of the digest.
    pub unique_across_queues: bool,

    /// Leave the worker name out of the digest.
    pub unique_across_workers: bool,

    /// Bucket scheduled jobs by due time (seconds); jobs in different buckets never collide.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_bucket_secs: Option<u64>,

    /// Run lock policy for `until_and_while_executing`.
    pub run_lock_policy: RunLockPolicy,
}

impl Default for LockOptions {
    fn default() -> Self {
        Self {
            lock: LockKind::default(),
            limit: default_limit(),
            ttl_secs: None,
            lock_args: LockArgs::default(),
            on_conflict: OnConflict::default(),
            unique_across_queues: false,
            unique_across_workers: false,
            time_bucket_secs: None,
            run_lock_policy: RunLockPolicy::default(),
        }
    }
}

impl LockOptions {
    /// Options with the given kind and defaults elsewhere.
    pub fn new(lock: LockKind) -> Self {
        Self {
            lock,
            ..Self::default()
        }
    }

    /// Set the concurrency limit.
    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = limit;
        self
    }

    /// Set the TTL in seconds.
    pub fn with_ttl_secs(mut self, ttl_secs: u64) -> Self {
        self.ttl_secs = Some(ttl_secs);
        self
    }

    /// Set the conflict strategy.
    pub fn with_on_conflict(mut self, on_conflict: OnConflict) -> Self {
        self.on_conflict = on_conflict;
        self
    }

    /// Set the digest argument scope.
    pub fn with_lock_args(mut self, lock_args: LockArgs) -> Self {
        self.lock_args = lock_args;
        self
    }

    /// TTL as a std duration.
    pub fn ttl(&self) -> Option<std::time::Duration> {
        self.ttl_secs.map(std::time::Duration::from_secs)
    }
}

pub fn default_lock_prefix() -> String {
    "uniquejobs".to_string()
}

pub fn default_limit() -> u32 {
    1
}

pub fn default_max_history() -> usize {
    1_000
}

pub fn default_reaper_count() -> usize {
    1_000
}

pub fn default_reaper_interval_secs() -> u64 {
    600
}

pub fn default_reaper_grace_secs() -> u64 {
    0
}

pub fn default_store_lock_timeout_ms() -> u64 {
    5_000
}

pub fn default_reschedule_delay_secs() -> u64 {
    5
}

pub fn default_true() -> bool {
    true
}
