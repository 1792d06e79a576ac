//! Lock changelog.
//!
//! An append-only audit trail of lock state changes, kept inside the
//! coordination store itself. Entries are written by the same atomic script
//! that performs the change, so the log and the lock state always move
//! together. The log is bounded: the newest `capacity` entries are kept and
//! older ones fall off.
//!
//! # Entry Format
//!
//! - `ts`: epoch milliseconds (store clock)
//! - `action`: locked, unlocked, extended, expired, reaped, ...
//! - `actor`: the owner string of the writing process (e.g. `user@HOST`)
//! - `digest`: the lock digest
//! - `job_id`: optional job id
//! - `details`: freeform object with action-specific details

use crate::clock::{Millis, format_millis};
use crate::error::{Result, UniqueJobsError};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Actions recorded in the changelog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangelogAction {
    /// Holder added to a lock
    Locked,
    /// Holder removed by an explicit release
    Unlocked,
    /// Holder expiry refreshed
    Extended,
    /// Holder purged because its TTL elapsed
    Expired,
    /// Digest removed by the orphan reaper
    Reaped,
    /// Digest removed by an operator or the replace strategy
    Deleted,
    /// Duplicate moved to the dead set
    Rejected,
    /// Duplicate scheduled for later
    Rescheduled,
    /// Queued jobs removed to make room for a duplicate
    Replaced,
}

impl std::fmt::Display for ChangelogAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ChangelogAction::Locked => "locked",
            ChangelogAction::Unlocked => "unlocked",
            ChangelogAction::Extended => "extended",
            ChangelogAction::Expired => "expired",
            ChangelogAction::Reaped => "reaped",
            ChangelogAction::Deleted => "deleted",
            ChangelogAction::Rejected => "rejected",
            ChangelogAction::Rescheduled => "rescheduled",
            ChangelogAction::Replaced => "replaced",
        };
        f.write_str(name)
    }
}

/// One changelog record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangelogEntry {
    pub ts: Millis,
    pub action: ChangelogAction,
    pub actor: String,
    pub digest: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub details: Value,
}

impl ChangelogEntry {
    /// Serialize the entry to a single-line JSON string.
    pub fn to_ndjson_line(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| {
            UniqueJobsError::UserError(format!("failed to serialize changelog entry: {}", e))
        })
    }
}

impl std::fmt::Display for ChangelogEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {:<11} {} job={} by {}",
            format_millis(self.ts),
            self.action.to_string(),
            self.digest,
            self.job_id.as_deref().unwrap_or("-"),
            self.actor
        )?;
        if !self.details.is_null() {
            write!(f, " {}", self.details)?;
        }
        Ok(())
    }
}

/// Who writes entries and how many are kept. Carried by every mutating script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangelogPolicy {
    pub actor: String,
    pub capacity: usize,
}

impl ChangelogPolicy {
    pub fn new(capacity: usize) -> Self {
        Self {
            actor: actor_string(),
            capacity,
        }
    }

    /// A policy that records nothing.
    pub fn disabled() -> Self {
        Self {
            actor: String::new(),
            capacity: 0,
        }
    }

    /// Build an entry stamped with this policy's actor.
    pub fn entry(
        &self,
        now: Millis,
        action: ChangelogAction,
        digest: &str,
        job_id: Option<&str>,
        details: Value,
    ) -> ChangelogEntry {
        ChangelogEntry {
            ts: now,
            action,
            actor: self.actor.clone(),
            digest: digest.to_string(),
            job_id: job_id.map(str::to_string),
            details,
        }
    }
}

/// Owner string for changelog entries (`user@host`).
pub fn actor_string() -> String {
    let user = std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "unknown".to_string());

    let host = hostname::get()
        .map(|h| h.to_string_lossy().to_string())
        .unwrap_or_else(|_| "unknown".to_string());

    format!("{}@{}", user, host)
}
