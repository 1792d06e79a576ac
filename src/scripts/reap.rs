//! Orphan reaping scripts.
//!
//! The reaper works in two steps. [`ScanOrphans`] is a read-only pass over the
//! oldest indexed digests that reports which look orphaned. [`ReapDigest`]
//! then re-checks one candidate and deletes it in the same atomic step, so a
//! job pushed or a holder taken between the scan and the delete is honored.

use super::purge_expired;
use crate::changelog::{ChangelogAction, ChangelogPolicy};
use crate::clock::Millis;
use crate::config::LockKind;
use crate::store::{Keyspace, LockRecord, Script};
use serde_json::json;

/// A digest the scan found with no live holder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrphanCandidate {
    pub digest: String,
    pub score: Millis,
    pub holders: Vec<String>,
}

/// Read the oldest `count` digests indexed at or before `cutoff` and return
/// those whose holders are all absent from the live job collections.
///
/// Digests of `until_expired` locks are skipped while a holder's TTL is still
/// running; that TTL releases them.
#[derive(Debug, Clone, Copy)]
pub struct ScanOrphans {
    pub cutoff: Millis,
    pub count: usize,
}

impl Script for ScanOrphans {
    type Output = (usize, Vec<OrphanCandidate>);

    fn name(&self) -> &'static str {
        "scan_orphans"
    }

    fn run(&self, keys: &mut Keyspace, now: Millis) -> (usize, Vec<OrphanCandidate>) {
        let scanned = keys.digests_scored_before(self.cutoff, self.count);
        let live = keys.live_job_ids();

        let candidates = scanned
            .iter()
            .filter_map(|(digest, score)| {
                let holders: Vec<String> = match keys.lock(digest) {
                    Some(record) if awaits_ttl(record, now) => return None,
                    Some(record) => record.holders.keys().cloned().collect(),
                    None => Vec::new(),
                };
                if holders.iter().any(|jid| live.contains(jid.as_str())) {
                    return None;
                }
                Some(OrphanCandidate {
                    digest: digest.clone(),
                    score: *score,
                    holders,
                })
            })
            .collect();

        (scanned.len(), candidates)
    }
}

/// Outcome of reaping one digest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReapVerdict {
    /// Record and index entry deleted.
    Reaped { holders: Vec<String> },
    /// A holder's job is live again.
    Live { job_id: String },
    /// A holder was acquired after the cutoff.
    Fresh,
    /// The digest is gone already.
    Missing,
}

/// Re-validate a candidate and delete it if it is still orphaned.
#[derive(Debug)]
pub struct ReapDigest<'a> {
    pub digest: &'a str,
    pub cutoff: Millis,
    pub changelog: &'a ChangelogPolicy,
}

impl Script for ReapDigest<'_> {
    type Output = ReapVerdict;

    fn name(&self) -> &'static str {
        "reap_digest"
    }

    fn run(&self, keys: &mut Keyspace, now: Millis) -> ReapVerdict {
        if keys.digest_score(self.digest).is_none() && keys.lock(self.digest).is_none() {
            return ReapVerdict::Missing;
        }

        if let Some(record) = keys.lock(self.digest) {
            if awaits_ttl(record, now) {
                return ReapVerdict::Fresh;
            }
            if record.holders.values().any(|h| h.acquired_at > self.cutoff) {
                return ReapVerdict::Fresh;
            }
            if let Some(jid) = record.holders.keys().find(|jid| keys.is_job_live(jid)) {
                return ReapVerdict::Live {
                    job_id: jid.clone(),
                };
            }
        }

        purge_expired(keys, self.digest, now, self.changelog);
        let holders: Vec<String> = keys
            .delete_lock(self.digest)
            .map(|record| record.holders.into_keys().collect())
            .unwrap_or_default();

        let entry = self.changelog.entry(
            now,
            ChangelogAction::Reaped,
            self.digest,
            None,
            json!({"holders": holders}),
        );
        keys.record_change(entry, self.changelog.capacity);

        ReapVerdict::Reaped { holders }
    }
}

/// An `until_expired` lock with an unexpired holder.
fn awaits_ttl(record: &LockRecord, now: Millis) -> bool {
    record.metadata.kind == LockKind::UntilExpired
        && record.holders.values().any(|h| !h.is_expired(now))
}
