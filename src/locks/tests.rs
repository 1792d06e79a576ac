//! Tests for the operator lock view.

use super::*;
use crate::clock::NO_EXPIRY;
use crate::config::LockKind;
use crate::error::UniqueJobsError;
use crate::test_support::memory_engine;
use std::time::Duration;

#[test]
fn test_list_locks_empty() {
    let (_, store, _) = memory_engine(0);
    let locks = list_locks(&store, None, 100).unwrap();
    assert!(locks.is_empty());
}

#[test]
fn test_list_locks_reports_holders_and_age() {
    let (engine, store, clock) = memory_engine(0);
    engine
        .acquire("uniquejobs:a", "j1", LockKind::UntilExecuting, 2, None)
        .unwrap();
    engine
        .acquire(
            "uniquejobs:a",
            "j2",
            LockKind::UntilExecuting,
            2,
            Some(Duration::from_secs(60)),
        )
        .unwrap();
    clock.set(90 * 60_000);

    let locks = list_locks(&store, None, 100).unwrap();

    assert_eq!(locks.len(), 1);
    let info = &locks[0];
    assert_eq!(info.kind, Some(LockKind::UntilExecuting));
    assert_eq!(info.limit, Some(2));
    assert_eq!(info.holders.len(), 2);
    assert_eq!(info.holders[0].expires_at, NO_EXPIRY);
    assert!(info.holders[1].expired);
    assert_eq!(info.live_holders(), 1);

    let display = info.to_string();
    assert!(display.starts_with("uniquejobs:a (kind: until_executing, holders: 1/2, age: 1h 30m"));
    assert!(display.contains("j1 (held until released)"));
    assert!(display.contains("EXPIRED"));
}

#[test]
fn test_list_locks_pattern_and_count() {
    let (engine, store, _) = memory_engine(0);
    for digest in ["uniquejobs:a", "uniquejobs:b", "other:c"] {
        engine
            .acquire(digest, "j", LockKind::UntilExecuting, 1, None)
            .unwrap();
    }

    let matched = list_locks(&store, Some("uniquejobs:*"), 100).unwrap();
    let digests: Vec<&str> = matched.iter().map(|l| l.digest.as_str()).collect();
    assert_eq!(digests, vec!["uniquejobs:a", "uniquejobs:b"]);

    assert_eq!(list_locks(&store, None, 2).unwrap().len(), 2);
}

#[test]
fn test_list_locks_invalid_pattern() {
    let (_, store, _) = memory_engine(0);
    let err = list_locks(&store, Some("[unclosed"), 10).unwrap_err();
    assert!(matches!(err, UniqueJobsError::UserError(_)));
}

#[test]
fn test_clear_lock() {
    let (engine, store, _) = memory_engine(0);
    engine
        .acquire("uniquejobs:a", "j1", LockKind::UntilExecuting, 1, None)
        .unwrap();

    let cleared = clear_lock(&engine, "uniquejobs:a").unwrap();

    assert_eq!(cleared.digest, "uniquejobs:a");
    assert_eq!(cleared.holders[0].job_id, "j1");
    assert!(list_locks(&store, None, 10).unwrap().is_empty());
    assert!(engine
        .acquire("uniquejobs:a", "j2", LockKind::UntilExecuting, 1, None)
        .unwrap()
        .is_acquired());
}

#[test]
fn test_clear_nonexistent_lock() {
    let (engine, _, _) = memory_engine(0);
    let result = clear_lock(&engine, "uniquejobs:missing");
    assert!(matches!(result, Err(UniqueJobsError::UserError(_))));
}

#[test]
fn test_age_string() {
    assert_eq!(age_string(5_000), "5s");
    assert_eq!(age_string(3 * 60_000), "3m");
    assert_eq!(age_string(2 * 3_600_000 + 5 * 60_000), "2h 5m");
    assert_eq!(age_string(26 * 3_600_000), "1d 2h");
}
