//! Release script.

use super::purge_expired;
use crate::changelog::{ChangelogAction, ChangelogPolicy};
use crate::clock::Millis;
use crate::store::{Keyspace, Script};
use serde_json::json;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReleaseReply {
    /// Whether this job's holder entry was removed.
    pub released: bool,
    /// Live holders left on the digest.
    pub remaining: usize,
}

/// Remove a holder; drop the record and index entry once nobody holds it.
#[derive(Debug)]
pub struct Release<'a> {
    pub digest: &'a str,
    pub job_id: &'a str,
    pub changelog: &'a ChangelogPolicy,
}

impl Script for Release<'_> {
    type Output = ReleaseReply;

    fn name(&self) -> &'static str {
        "release"
    }

    fn run(&self, keys: &mut Keyspace, now: Millis) -> ReleaseReply {
        purge_expired(keys, self.digest, now, self.changelog);
        let released = keys.remove_holder(self.digest, self.job_id);
        let remaining = keys.holder_count(self.digest);

        if released {
            let entry = self.changelog.entry(
                now,
                ChangelogAction::Unlocked,
                self.digest,
                Some(self.job_id),
                json!({"remaining": remaining}),
            );
            keys.record_change(entry, self.changelog.capacity);
        }

        if released && remaining == 0 {
            keys.drop_if_unheld(self.digest);
        }

        ReleaseReply {
            released,
            remaining,
        }
    }
}
