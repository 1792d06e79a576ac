//! Operator scripts: listing, deleting and reading history.

use crate::changelog::{ChangelogAction, ChangelogEntry, ChangelogPolicy};
use crate::clock::Millis;
use crate::store::{Holder, Keyspace, LockRecord, Script};
use globset::GlobMatcher;
use serde_json::json;

/// An indexed digest together with its record, if one exists.
#[derive(Debug, Clone, PartialEq)]
pub struct LockSummary {
    pub digest: String,
    pub score: Millis,
    pub record: Option<LockRecord>,
}

/// List indexed digests in key order, optionally filtered by a glob.
#[derive(Debug, Clone)]
pub struct ListLocks {
    pub matcher: Option<GlobMatcher>,
    pub count: usize,
}

impl Script for ListLocks {
    type Output = Vec<LockSummary>;

    fn name(&self) -> &'static str {
        "list_locks"
    }

    fn run(&self, keys: &mut Keyspace, _now: Millis) -> Vec<LockSummary> {
        keys.indexed_digests()
            .filter(|(digest, _)| self.matcher.as_ref().is_none_or(|m| m.is_match(digest)))
            .take(self.count)
            .map(|(digest, score)| LockSummary {
                digest: digest.to_string(),
                score,
                record: keys.lock(digest).cloned(),
            })
            .collect()
    }
}

/// Unexpired holders of one digest, by job id.
#[derive(Debug, Clone, Copy)]
pub struct ReadHolders<'a> {
    pub digest: &'a str,
}

impl Script for ReadHolders<'_> {
    type Output = Vec<(String, Holder)>;

    fn name(&self) -> &'static str {
        "read_holders"
    }

    fn run(&self, keys: &mut Keyspace, now: Millis) -> Vec<(String, Holder)> {
        keys.lock(self.digest)
            .map(|record| {
                record
                    .holders
                    .iter()
                    .filter(|(_, h)| !h.is_expired(now))
                    .map(|(jid, h)| (jid.clone(), *h))
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Newest `count` changelog entries.
#[derive(Debug, Clone, Copy)]
pub struct ReadChangelog {
    pub count: usize,
}

impl Script for ReadChangelog {
    type Output = Vec<ChangelogEntry>;

    fn name(&self) -> &'static str {
        "read_changelog"
    }

    fn run(&self, keys: &mut Keyspace, _now: Millis) -> Vec<ChangelogEntry> {
        keys.changelog(self.count)
    }
}

/// Delete a digest's record and index entry regardless of holders.
#[derive(Debug)]
pub struct DeleteDigest<'a> {
    pub digest: &'a str,
    pub changelog: &'a ChangelogPolicy,
}

impl Script for DeleteDigest<'_> {
    type Output = Option<LockRecord>;

    fn name(&self) -> &'static str {
        "delete_digest"
    }

    fn run(&self, keys: &mut Keyspace, now: Millis) -> Option<LockRecord> {
        let indexed = keys.digest_score(self.digest).is_some();
        let record = keys.delete_lock(self.digest);
        if record.is_none() && !indexed {
            return None;
        }

        let holders: Vec<&str> = record
            .iter()
            .flat_map(|r| r.holders.keys().map(String::as_str))
            .collect();
        let entry = self.changelog.entry(
            now,
            ChangelogAction::Deleted,
            self.digest,
            None,
            json!({"holders": holders}),
        );
        keys.record_change(entry, self.changelog.capacity);
        record
    }
}
