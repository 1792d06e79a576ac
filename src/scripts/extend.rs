//! Extend script.

use super::purge_expired;
use crate::changelog::{ChangelogAction, ChangelogPolicy};
use crate::clock::{Millis, expiry_score, format_millis};
use crate::config::LockKind;
use crate::store::{Keyspace, Script};
use serde_json::json;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtendReply {
    /// The holder now expires at `expires_at`.
    Extended { expires_at: Millis },
    /// The job does not hold the digest.
    NotHeld,
    /// The lock's kind is only ever released by its TTL, so it cannot be
    /// extended to "never".
    TtlRequired { kind: LockKind },
}

/// Move a live holder's expiry to `now + ttl` (`None` = never).
#[derive(Debug)]
pub struct Extend<'a> {
    pub digest: &'a str,
    pub job_id: &'a str,
    pub ttl: Option<Duration>,
    pub changelog: &'a ChangelogPolicy,
}

impl Script for Extend<'_> {
    type Output = ExtendReply;

    fn name(&self) -> &'static str {
        "extend"
    }

    fn run(&self, keys: &mut Keyspace, now: Millis) -> ExtendReply {
        purge_expired(keys, self.digest, now, self.changelog);

        let Some(record) = keys.lock(self.digest) else {
            return ExtendReply::NotHeld;
        };
        if !record.holders.contains_key(self.job_id) {
            return ExtendReply::NotHeld;
        }
        if self.ttl.is_none() && record.metadata.kind.requires_ttl() {
            return ExtendReply::TtlRequired {
                kind: record.metadata.kind,
            };
        }

        let expires_at = expiry_score(now, self.ttl);
        keys.set_holder_expiry(self.digest, self.job_id, expires_at);

        let entry = self.changelog.entry(
            now,
            ChangelogAction::Extended,
            self.digest,
            Some(self.job_id),
            json!({"expires_at": format_millis(expires_at)}),
        );
        keys.record_change(entry, self.changelog.capacity);
        ExtendReply::Extended { expires_at }
    }
}
