//! Tests for the atomic scripts, run directly against a keyspace.

use super::*;
use crate::changelog::{ChangelogAction, ChangelogPolicy};
use crate::clock::NO_EXPIRY;
use crate::config::LockKind;
use crate::job::JobItem;
use crate::store::{Keyspace, Script};
use globset::Glob;
use serde_json::json;
use std::time::Duration;

fn policy() -> ChangelogPolicy {
    ChangelogPolicy::new(100)
}

fn request(digest: &str, job_id: &str) -> LockRequest {
    LockRequest::new(digest, job_id, LockKind::UntilExecuting)
}

fn acquire(keys: &mut Keyspace, req: &LockRequest, now: i64) -> AcquireReply {
    Acquire {
        request: req,
        changelog: &policy(),
    }
    .run(keys, now)
}

fn release(keys: &mut Keyspace, digest: &str, job_id: &str, now: i64) -> ReleaseReply {
    Release {
        digest,
        job_id,
        changelog: &policy(),
    }
    .run(keys, now)
}

fn job(jid: &str, digest: &str) -> JobItem {
    let mut item = JobItem::new("MyWorker", vec![json!(1)]).with_jid(jid);
    item.lock_digest = Some(digest.to_string());
    item
}

// =============================================================================
// acquire
// =============================================================================

#[test]
fn acquire_writes_holder_index_and_metadata() {
    let mut keys = Keyspace::new();
    let mut req = request("d", "j1").with_ttl(Some(Duration::from_secs(60)));
    req.worker = Some("MyWorker".to_string());

    let reply = acquire(&mut keys, &req, 1_000);

    assert_eq!(
        reply,
        AcquireReply::Acquired {
            refreshed: false,
            expires_at: 61_000
        }
    );
    assert_eq!(keys.digest_score("d"), Some(1_000));
    let record = keys.lock("d").unwrap();
    assert_eq!(record.metadata.kind, LockKind::UntilExecuting);
    assert_eq!(record.metadata.ttl_ms, Some(60_000));
    assert_eq!(record.metadata.worker.as_deref(), Some("MyWorker"));
    assert_eq!(keys.changelog(1)[0].action, ChangelogAction::Locked);
}

#[test]
fn conflict_writes_nothing() {
    let mut keys = Keyspace::new();
    acquire(&mut keys, &request("d", "j1"), 0);
    keys.take_dirty();
    let before = keys.clone();

    let reply = acquire(&mut keys, &request("d", "j2"), 10);

    assert_eq!(
        reply,
        AcquireReply::Conflict {
            holders: vec!["j1".to_string()]
        }
    );
    assert!(!keys.take_dirty());
    assert_eq!(keys, before);
}

#[test]
fn acquire_by_holder_refreshes_expiry() {
    let mut keys = Keyspace::new();
    let req = request("d", "j1").with_ttl(Some(Duration::from_secs(10)));
    acquire(&mut keys, &req, 0);

    let reply = acquire(&mut keys, &req, 5_000);

    assert_eq!(
        reply,
        AcquireReply::Acquired {
            refreshed: true,
            expires_at: 15_000
        }
    );
    assert_eq!(keys.holder_count("d"), 1);
    assert_eq!(keys.holder("d", "j1").unwrap().acquired_at, 0);
    assert_eq!(keys.digest_score("d"), Some(0));
}

#[test]
fn limit_allows_that_many_holders() {
    let mut keys = Keyspace::new();
    for jid in ["a", "b"] {
        let reply = acquire(&mut keys, &request("d", jid).with_limit(2), 0);
        assert!(matches!(reply, AcquireReply::Acquired { .. }));
    }

    let reply = acquire(&mut keys, &request("d", "c").with_limit(2), 0);
    assert!(matches!(reply, AcquireReply::Conflict { holders } if holders.len() == 2));
}

#[test]
fn expired_holder_is_purged_before_counting() {
    let mut keys = Keyspace::new();
    let ttl = Some(Duration::from_secs(60));
    acquire(&mut keys, &request("d", "j1").with_ttl(ttl), 0);

    let at_expiry = acquire(&mut keys, &request("d", "j2").with_ttl(ttl), 60_000);
    assert!(matches!(at_expiry, AcquireReply::Conflict { .. }));

    let after = acquire(&mut keys, &request("d", "j2").with_ttl(ttl), 61_000);
    assert!(matches!(after, AcquireReply::Acquired { refreshed: false, .. }));
    assert!(keys.holder("d", "j1").is_none());

    let actions: Vec<ChangelogAction> = keys.changelog(2).iter().map(|e| e.action).collect();
    assert_eq!(actions, vec![ChangelogAction::Locked, ChangelogAction::Expired]);
}

#[test]
fn purge_of_last_holder_drops_record_before_new_acquire() {
    let mut keys = Keyspace::new();
    let expiring = LockRequest::new("d", "j1", LockKind::UntilExpired)
        .with_ttl(Some(Duration::from_secs(60)));
    acquire(&mut keys, &expiring, 0);

    let running = LockRequest::new("d", "j2", LockKind::WhileExecuting).with_limit(2);
    acquire(&mut keys, &running, 120_000);

    let record = keys.lock("d").unwrap();
    assert_eq!(record.metadata.kind, LockKind::WhileExecuting);
    assert_eq!(record.metadata.limit, 2);
    assert_eq!(record.metadata.ttl_ms, None);
    assert_eq!(record.metadata.created_at, 120_000);
    assert_eq!(keys.digest_score("d"), Some(120_000));

    let (_, candidates) = ScanOrphans {
        cutoff: 120_000,
        count: 10,
    }
    .run(&mut keys, 120_000);
    assert_eq!(candidates.len(), 1);
    assert_eq!(candidates[0].holders, vec!["j2".to_string()]);
}

#[test]
fn no_ttl_never_expires() {
    let mut keys = Keyspace::new();
    acquire(&mut keys, &request("d", "j1"), 0);
    assert_eq!(keys.holder("d", "j1").unwrap().expires_at, NO_EXPIRY);

    let reply = acquire(&mut keys, &request("d", "j2"), i64::MAX - 1);
    assert!(matches!(reply, AcquireReply::Conflict { .. }));
}

// =============================================================================
// release / extend
// =============================================================================

#[test]
fn release_last_holder_drops_record_and_index() {
    let mut keys = Keyspace::new();
    acquire(&mut keys, &request("d", "j1"), 0);

    let reply = release(&mut keys, "d", "j1", 5);

    assert_eq!(
        reply,
        ReleaseReply {
            released: true,
            remaining: 0
        }
    );
    assert!(keys.lock("d").is_none());
    assert!(keys.digest_score("d").is_none());
    assert_eq!(keys.changelog(1)[0].action, ChangelogAction::Unlocked);
}

#[test]
fn release_keeps_record_while_others_hold() {
    let mut keys = Keyspace::new();
    acquire(&mut keys, &request("d", "a").with_limit(2), 0);
    acquire(&mut keys, &request("d", "b").with_limit(2), 0);

    let reply = release(&mut keys, "d", "a", 5);

    assert_eq!(reply.remaining, 1);
    assert_eq!(keys.digest_score("d"), Some(0));
}

#[test]
fn release_by_non_holder_changes_nothing() {
    let mut keys = Keyspace::new();
    acquire(&mut keys, &request("d", "j1"), 0);
    keys.take_dirty();
    let before = keys.clone();

    let reply = release(&mut keys, "d", "stranger", 5);

    assert!(!reply.released);
    assert_eq!(reply.remaining, 1);
    assert!(!keys.take_dirty());
    assert_eq!(keys, before);

    let missing = release(&mut keys, "nope", "j1", 5);
    assert!(!missing.released);
    assert!(!keys.take_dirty());
}

#[test]
fn extend_moves_expiry_of_live_holder() {
    let mut keys = Keyspace::new();
    acquire(
        &mut keys,
        &request("d", "j1").with_ttl(Some(Duration::from_secs(10))),
        0,
    );

    let extended = Extend {
        digest: "d",
        job_id: "j1",
        ttl: Some(Duration::from_secs(30)),
        changelog: &policy(),
    }
    .run(&mut keys, 5_000);

    assert_eq!(extended, ExtendReply::Extended { expires_at: 35_000 });
    assert_eq!(keys.holder("d", "j1").unwrap().expires_at, 35_000);
}

#[test]
fn extend_after_expiry_is_not_held() {
    let mut keys = Keyspace::new();
    acquire(
        &mut keys,
        &request("d", "j1").with_ttl(Some(Duration::from_secs(10))),
        0,
    );

    let extended = Extend {
        digest: "d",
        job_id: "j1",
        ttl: Some(Duration::from_secs(30)),
        changelog: &policy(),
    }
    .run(&mut keys, 20_000);

    assert_eq!(extended, ExtendReply::NotHeld);
    assert!(keys.lock("d").is_none());
    assert!(keys.digest_score("d").is_none());
}

#[test]
fn extend_to_never_refused_for_ttl_only_kind() {
    let mut keys = Keyspace::new();
    let expiring = LockRequest::new("d", "j1", LockKind::UntilExpired)
        .with_ttl(Some(Duration::from_secs(60)));
    acquire(&mut keys, &expiring, 0);
    assert!(keys.take_dirty());

    let extended = Extend {
        digest: "d",
        job_id: "j1",
        ttl: None,
        changelog: &policy(),
    }
    .run(&mut keys, 1_000);

    assert_eq!(
        extended,
        ExtendReply::TtlRequired {
            kind: LockKind::UntilExpired
        }
    );
    assert_eq!(keys.holder("d", "j1").unwrap().expires_at, 60_000);
    assert!(!keys.take_dirty());
}

// =============================================================================
// reaping
// =============================================================================

#[test]
fn scan_includes_until_expired_once_every_holder_expired() {
    let mut keys = Keyspace::new();
    let expiring = LockRequest::new("ttl", "t1", LockKind::UntilExpired)
        .with_ttl(Some(Duration::from_secs(10)));
    acquire(&mut keys, &expiring, 0);

    let (_, candidates) = ScanOrphans {
        cutoff: 20_000,
        count: 10,
    }
    .run(&mut keys, 20_000);
    assert_eq!(candidates.len(), 1);

    let verdict = ReapDigest {
        digest: "ttl",
        cutoff: 20_000,
        changelog: &policy(),
    }
    .run(&mut keys, 20_000);
    assert!(matches!(verdict, ReapVerdict::Reaped { .. }));
    assert!(keys.lock("ttl").is_none());
    assert!(keys.digest_score("ttl").is_none());
}

#[test]
fn scan_reports_only_orphans() {
    let mut keys = Keyspace::new();
    acquire(&mut keys, &request("orphan", "gone"), 0);
    acquire(&mut keys, &request("queued", "q1"), 0);
    keys.push_job(job("q1", "queued"));
    acquire(&mut keys, &request("fresh", "f1"), 500);
    let expiring = LockRequest::new("ttl", "t1", LockKind::UntilExpired)
        .with_ttl(Some(Duration::from_secs(3_600)));
    acquire(&mut keys, &expiring, 0);

    let (scanned, candidates) = ScanOrphans {
        cutoff: 100,
        count: 10,
    }
    .run(&mut keys, 1_000);

    assert_eq!(scanned, 3);
    assert_eq!(
        candidates,
        vec![OrphanCandidate {
            digest: "orphan".to_string(),
            score: 0,
            holders: vec!["gone".to_string()]
        }]
    );
}

#[test]
fn reap_deletes_orphan_and_logs() {
    let mut keys = Keyspace::new();
    acquire(&mut keys, &request("d", "gone"), 0);

    let verdict = ReapDigest {
        digest: "d",
        cutoff: 100,
        changelog: &policy(),
    }
    .run(&mut keys, 1_000);

    assert_eq!(
        verdict,
        ReapVerdict::Reaped {
            holders: vec!["gone".to_string()]
        }
    );
    assert!(keys.lock("d").is_none());
    assert!(keys.digest_score("d").is_none());
    assert_eq!(keys.changelog(1)[0].action, ChangelogAction::Reaped);
}

#[test]
fn reap_revalidates_liveness() {
    let mut keys = Keyspace::new();
    acquire(&mut keys, &request("d", "j1"), 0);
    keys.retry_job(job("j1", "d"), 0);

    let verdict = ReapDigest {
        digest: "d",
        cutoff: 100,
        changelog: &policy(),
    }
    .run(&mut keys, 1_000);

    assert_eq!(
        verdict,
        ReapVerdict::Live {
            job_id: "j1".to_string()
        }
    );
    assert_eq!(keys.holder_count("d"), 1);
}

#[test]
fn reap_spares_holder_acquired_after_cutoff() {
    let mut keys = Keyspace::new();
    acquire(&mut keys, &request("d", "a").with_limit(2), 0);
    acquire(&mut keys, &request("d", "b").with_limit(2), 500);

    let verdict = ReapDigest {
        digest: "d",
        cutoff: 100,
        changelog: &policy(),
    }
    .run(&mut keys, 1_000);

    assert_eq!(verdict, ReapVerdict::Fresh);
    assert_eq!(keys.holder_count("d"), 2);
}

#[test]
fn reap_missing_digest() {
    let mut keys = Keyspace::new();
    let verdict = ReapDigest {
        digest: "d",
        cutoff: 100,
        changelog: &policy(),
    }
    .run(&mut keys, 1_000);
    assert_eq!(verdict, ReapVerdict::Missing);
    assert!(!keys.take_dirty());
}

// =============================================================================
// admin and conflict side effects
// =============================================================================

#[test]
fn list_locks_filters_by_glob() {
    let mut keys = Keyspace::new();
    acquire(&mut keys, &request("uniquejobs:aaa", "1"), 0);
    acquire(&mut keys, &request("uniquejobs:bbb", "2"), 0);
    acquire(&mut keys, &request("other:ccc", "3"), 0);

    let all = ListLocks {
        matcher: None,
        count: 10,
    }
    .run(&mut keys, 0);
    assert_eq!(all.len(), 3);

    let matcher = Glob::new("uniquejobs:*").unwrap().compile_matcher();
    let filtered = ListLocks {
        matcher: Some(matcher),
        count: 1,
    }
    .run(&mut keys, 0);
    assert_eq!(filtered.len(), 1);
    assert_eq!(filtered[0].digest, "uniquejobs:aaa");
    assert!(filtered[0].record.is_some());
}

#[test]
fn read_holders_skips_expired() {
    let mut keys = Keyspace::new();
    let short = request("d", "old")
        .with_limit(2)
        .with_ttl(Some(Duration::from_secs(1)));
    acquire(&mut keys, &short, 0);
    acquire(&mut keys, &request("d", "new").with_limit(2), 0);

    let holders = ReadHolders { digest: "d" }.run(&mut keys, 5_000);
    let jids: Vec<&str> = holders.iter().map(|(jid, _)| jid.as_str()).collect();
    assert_eq!(jids, vec!["new"]);
    assert!(!keys.take_dirty());
}

#[test]
fn delete_digest_removes_held_lock() {
    let mut keys = Keyspace::new();
    acquire(&mut keys, &request("d", "j1"), 0);

    let deleted = DeleteDigest {
        digest: "d",
        changelog: &policy(),
    }
    .run(&mut keys, 10);

    assert!(deleted.is_some());
    assert!(keys.lock("d").is_none());
    assert_eq!(keys.changelog(1)[0].action, ChangelogAction::Deleted);

    let again = DeleteDigest {
        digest: "d",
        changelog: &policy(),
    }
    .run(&mut keys, 10);
    assert!(again.is_none());
    assert_eq!(keys.changelog(1)[0].action, ChangelogAction::Deleted);
    assert_eq!(ReadChangelog { count: 10 }.run(&mut keys, 0).len(), 2);
}

#[test]
fn reject_and_reschedule_move_the_duplicate() {
    let mut keys = Keyspace::new();
    let dup = job("dup", "d");

    RejectJob {
        digest: "d",
        item: &dup,
        changelog: &policy(),
    }
    .run(&mut keys, 10);
    assert!(keys.dead("dup").is_some());

    RescheduleJob {
        digest: "d",
        item: &dup,
        at: 5_000,
        changelog: &policy(),
    }
    .run(&mut keys, 10);
    let scheduled = keys.scheduled("dup").unwrap();
    assert_eq!(scheduled.score, 5_000);
    assert_eq!(scheduled.item.at, Some(5_000));
}

#[test]
fn replace_clears_queued_jobs_and_lock() {
    let mut keys = Keyspace::new();
    acquire(&mut keys, &request("d", "old"), 0);
    keys.push_job(job("old", "d"));

    let removed = ReplaceDigest {
        digest: "d",
        changelog: &policy(),
    }
    .run(&mut keys, 10);

    assert_eq!(removed, vec!["old".to_string()]);
    assert!(keys.lock("d").is_none());
    assert_eq!(keys.queue_len("default"), 0);
    assert!(matches!(
        acquire(&mut keys, &request("d", "new"), 20),
        AcquireReply::Acquired { .. }
    ));
}
