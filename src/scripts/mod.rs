//! Atomic scripts over the keyspace.
//!
//! Every change to lock records, the digest index or the changelog happens in
//! one of these scripts. Each script:
//! - purges expired holders of the digest it touches before deciding anything
//! - treats a missing digest as zero holders
//! - writes nothing on its refusal paths (conflict, not held, still live)
//!
//! Scripts are plain structs implementing [`Script`](crate::store::Script);
//! the store decides how to make them indivisible.

mod acquire;
mod admin;
mod conflict;
mod extend;
mod reap;
mod release;

#[cfg(test)]
mod tests;

pub use acquire::{Acquire, AcquireReply, LockRequest};
pub use admin::{DeleteDigest, ListLocks, LockSummary, ReadChangelog, ReadHolders};
pub use conflict::{RejectJob, ReplaceDigest, RescheduleJob};
pub use extend::{Extend, ExtendReply};
pub use reap::{OrphanCandidate, ReapDigest, ReapVerdict, ScanOrphans};
pub use release::{Release, ReleaseReply};

use crate::changelog::{ChangelogAction, ChangelogPolicy};
use crate::clock::Millis;
use crate::store::Keyspace;
use serde_json::Value;

/// Purge expired holders of `digest`, logging each one. A record left with
/// no holders is dropped along with its index entry, so the next acquire
/// starts a fresh record.
fn purge_expired(
    keys: &mut Keyspace,
    digest: &str,
    now: Millis,
    changelog: &ChangelogPolicy,
) -> usize {
    let expired = keys.purge_expired(digest, now);
    for jid in &expired {
        let entry = changelog.entry(
            now,
            ChangelogAction::Expired,
            digest,
            Some(jid.as_str()),
            Value::Null,
        );
        keys.record_change(entry, changelog.capacity);
    }
    if !expired.is_empty() {
        keys.drop_if_unheld(digest);
    }
    expired.len()
}
