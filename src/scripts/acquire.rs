//! Acquire script.

use super::purge_expired;
use crate::changelog::{ChangelogAction, ChangelogPolicy};
use crate::clock::{Millis, duration_ms, expiry_score};
use crate::config::LockKind;
use crate::store::{Holder, Keyspace, LockMetadata, Script};
use serde_json::{Value, json};
use std::time::Duration;

/// Everything needed to take one holder slot on a digest.
#[derive(Debug, Clone, PartialEq)]
pub struct LockRequest {
    pub digest: String,
    pub job_id: String,
    pub kind: LockKind,
    pub limit: u32,
    pub ttl: Option<Duration>,
    /// Worker class, recorded in the lock metadata.
    pub worker: Option<String>,
    /// Arguments that formed the digest, recorded in the lock metadata.
    pub lock_args: Value,
}

impl LockRequest {
    pub fn new(digest: impl Into<String>, job_id: impl Into<String>, kind: LockKind) -> Self {
        Self {
            digest: digest.into(),
            job_id: job_id.into(),
            kind,
            limit: 1,
            ttl: None,
            worker: None,
            lock_args: Value::Null,
        }
    }

    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_ttl(mut self, ttl: Option<Duration>) -> Self {
        self.ttl = ttl;
        self
    }

    fn metadata(&self, now: Millis) -> LockMetadata {
        LockMetadata {
            kind: self.kind,
            limit: self.limit,
            ttl_ms: self.ttl.map(duration_ms),
            worker: self.worker.clone(),
            lock_args: self.lock_args.clone(),
            created_at: now,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AcquireReply {
    /// The job holds the lock. `refreshed` is true if it already did.
    Acquired { refreshed: bool, expires_at: Millis },
    /// The limit is saturated by these live holders.
    Conflict { holders: Vec<String> },
}

/// Purge expired holders; if a slot is free (or the job already holds one)
/// take it, index the digest and write metadata on first acquire.
#[derive(Debug)]
pub struct Acquire<'a> {
    pub request: &'a LockRequest,
    pub changelog: &'a ChangelogPolicy,
}

impl Script for Acquire<'_> {
    type Output = AcquireReply;

    fn name(&self) -> &'static str {
        "acquire"
    }

    fn run(&self, keys: &mut Keyspace, now: Millis) -> AcquireReply {
        let req = self.request;
        purge_expired(keys, &req.digest, now, self.changelog);

        let expires_at = expiry_score(now, req.ttl);

        if keys.holder(&req.digest, &req.job_id).is_some() {
            keys.set_holder_expiry(&req.digest, &req.job_id, expires_at);
            keys.index_digest(&req.digest, now);
            let entry = self.changelog.entry(
                now,
                ChangelogAction::Locked,
                &req.digest,
                Some(req.job_id.as_str()),
                json!({"refreshed": true}),
            );
            keys.record_change(entry, self.changelog.capacity);
            return AcquireReply::Acquired {
                refreshed: true,
                expires_at,
            };
        }

        let holders = keys
            .lock(&req.digest)
            .map(|record| record.holders.keys().cloned().collect::<Vec<_>>())
            .unwrap_or_default();
        if holders.len() >= req.limit as usize {
            return AcquireReply::Conflict { holders };
        }

        keys.put_holder(
            &req.digest,
            &req.job_id,
            Holder {
                acquired_at: now,
                expires_at,
            },
            || req.metadata(now),
        );
        keys.index_digest(&req.digest, now);

        let entry = self.changelog.entry(
            now,
            ChangelogAction::Locked,
            &req.digest,
            Some(req.job_id.as_str()),
            json!({"kind": req.kind, "limit": req.limit, "holders": holders.len() + 1}),
        );
        keys.record_change(entry, self.changelog.capacity);

        AcquireReply::Acquired {
            refreshed: false,
            expires_at,
        }
    }
}
