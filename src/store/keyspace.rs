//! The data held by a coordination store.
//!
//! A [`Keyspace`] is the whole shared state: the global digest index, one
//! lock record per digest, the queue collections owned by the job queue, and
//! the changelog. Scripts receive `&mut Keyspace`; every mutating method marks
//! it dirty so stores can skip writing back when a script only read.

use crate::changelog::ChangelogEntry;
use crate::clock::{Millis, NO_EXPIRY};
use crate::config::LockKind;
use crate::job::JobItem;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, VecDeque};

/// One holder of a lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Holder {
    pub acquired_at: Millis,
    pub expires_at: Millis,
}

impl Holder {
    pub fn is_expired(&self, now: Millis) -> bool {
        self.expires_at < now
    }

    pub fn never_expires(&self) -> bool {
        self.expires_at == NO_EXPIRY
    }
}

/// Metadata written on the first acquire of a digest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LockMetadata {
    pub kind: LockKind,
    pub limit: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl_ms: Option<Millis>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub worker: Option<String>,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub lock_args: Value,
    pub created_at: Millis,
}

/// Lock state for one digest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LockRecord {
    pub metadata: LockMetadata,
    #[serde(default)]
    pub holders: BTreeMap<String, Holder>,
}

/// A job in a time-scored collection (schedule, retry, dead).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredJob {
    pub score: Millis,
    pub item: JobItem,
}

/// The complete shared state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Keyspace {
    /// Global digest index: digest -> score of first acquire.
    pub(crate) digests: BTreeMap<String, Millis>,
    /// Lock records keyed by digest.
    pub(crate) locks: BTreeMap<String, LockRecord>,
    /// Pending queues keyed by queue name, oldest first.
    pub(crate) queues: BTreeMap<String, VecDeque<JobItem>>,
    /// Scheduled jobs keyed by job id.
    pub(crate) schedule: BTreeMap<String, ScoredJob>,
    /// Jobs awaiting retry keyed by job id.
    pub(crate) retry: BTreeMap<String, ScoredJob>,
    /// Jobs currently executing keyed by job id.
    pub(crate) working: BTreeMap<String, JobItem>,
    /// Rejected jobs keyed by job id.
    pub(crate) dead: BTreeMap<String, ScoredJob>,
    /// Newest first.
    pub(crate) changelog: VecDeque<ChangelogEntry>,
    #[serde(skip)]
    dirty: bool,
}

impl Keyspace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a mutating method ran since the last call, and reset the flag.
    pub fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    pub(crate) fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    // =========================================================================
    // Digest index
    // =========================================================================

    /// Score of an indexed digest.
    pub fn digest_score(&self, digest: &str) -> Option<Millis> {
        self.digests.get(digest).copied()
    }

    pub fn digest_count(&self) -> usize {
        self.digests.len()
    }

    /// Add a digest to the index, keeping the score of an existing entry.
    pub fn index_digest(&mut self, digest: &str, score: Millis) {
        if !self.digests.contains_key(digest) {
            self.digests.insert(digest.to_string(), score);
            self.mark_dirty();
        }
    }

    pub fn unindex_digest(&mut self, digest: &str) -> bool {
        let removed = self.digests.remove(digest).is_some();
        if removed {
            self.mark_dirty();
        }
        removed
    }

    /// Up to `count` indexed digests scored at or before `cutoff`, oldest first.
    pub fn digests_scored_before(&self, cutoff: Millis, count: usize) -> Vec<(String, Millis)> {
        let mut entries: Vec<(String, Millis)> = self
            .digests
            .iter()
            .filter(|(_, score)| **score <= cutoff)
            .map(|(digest, score)| (digest.clone(), *score))
            .collect();
        entries.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(&b.0)));
        entries.truncate(count);
        entries
    }

    /// All indexed digests in key order.
    pub fn indexed_digests(&self) -> impl Iterator<Item = (&str, Millis)> {
        self.digests.iter().map(|(d, s)| (d.as_str(), *s))
    }

    // =========================================================================
    // Lock records
    // =========================================================================

    pub fn lock(&self, digest: &str) -> Option<&LockRecord> {
        self.locks.get(digest)
    }

    pub fn holder(&self, digest: &str, job_id: &str) -> Option<&Holder> {
        self.locks.get(digest).and_then(|r| r.holders.get(job_id))
    }

    pub fn holder_count(&self, digest: &str) -> usize {
        self.locks.get(digest).map_or(0, |r| r.holders.len())
    }

    /// Remove holders whose expiry is before `now`, returning their job ids.
    pub fn purge_expired(&mut self, digest: &str, now: Millis) -> Vec<String> {
        let expired: Vec<String> = match self.locks.get(digest) {
            Some(record) => record
                .holders
                .iter()
                .filter(|(_, h)| h.is_expired(now))
                .map(|(jid, _)| jid.clone())
                .collect(),
            None => return Vec::new(),
        };

        if !expired.is_empty()
            && let Some(record) = self.locks.get_mut(digest)
        {
            for jid in &expired {
                record.holders.remove(jid);
            }
            self.dirty = true;
        }
        expired
    }

    /// Insert or replace a holder, creating the record with `metadata` if needed.
    pub fn put_holder(
        &mut self,
        digest: &str,
        job_id: &str,
        holder: Holder,
        metadata: impl FnOnce() -> LockMetadata,
    ) {
        let record = self
            .locks
            .entry(digest.to_string())
            .or_insert_with(|| LockRecord {
                metadata: metadata(),
                holders: BTreeMap::new(),
            });
        record.holders.insert(job_id.to_string(), holder);
        self.dirty = true;
    }

    /// Set a holder's expiry. Returns false if the holder does not exist.
    pub fn set_holder_expiry(&mut self, digest: &str, job_id: &str, expires_at: Millis) -> bool {
        let Some(holder) = self
            .locks
            .get_mut(digest)
            .and_then(|r| r.holders.get_mut(job_id))
        else {
            return false;
        };
        holder.expires_at = expires_at;
        self.dirty = true;
        true
    }

    /// Remove one holder. Returns false if it was not present.
    pub fn remove_holder(&mut self, digest: &str, job_id: &str) -> bool {
        let removed = self
            .locks
            .get_mut(digest)
            .is_some_and(|r| r.holders.remove(job_id).is_some());
        if removed {
            self.dirty = true;
        }
        removed
    }

    /// Drop the record and index entry of a digest if it has no holders left.
    pub fn drop_if_unheld(&mut self, digest: &str) -> bool {
        if self.holder_count(digest) > 0 {
            return false;
        }
        let had_record = self.locks.remove(digest).is_some();
        let had_index = self.unindex_digest(digest);
        if had_record {
            self.dirty = true;
        }
        had_record || had_index
    }

    /// Delete a digest's record and index entry unconditionally.
    pub fn delete_lock(&mut self, digest: &str) -> Option<LockRecord> {
        let record = self.locks.remove(digest);
        let had_index = self.unindex_digest(digest);
        if record.is_some() || had_index {
            self.dirty = true;
        }
        record
    }

    // =========================================================================
    // Changelog
    // =========================================================================

    /// Record an entry, keeping at most `capacity` entries. No-op at capacity 0.
    pub fn record_change(&mut self, entry: ChangelogEntry, capacity: usize) {
        if capacity == 0 {
            return;
        }
        self.changelog.push_front(entry);
        self.changelog.truncate(capacity);
        self.dirty = true;
    }

    /// The newest `count` changelog entries.
    pub fn changelog(&self, count: usize) -> Vec<ChangelogEntry> {
        self.changelog.iter().take(count).cloned().collect()
    }
}
