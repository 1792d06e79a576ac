//! Lock digest computation.
//!
//! A digest is `<prefix>:<sha256 hex>` over a canonical JSON rendering of the
//! job's uniqueness scope: worker class, queue, the selected arguments and,
//! for bucketed scheduled jobs, the due-time bucket. Object keys are sorted
//! recursively before hashing so that logically equal arguments always hash
//! the same, in any process.

use crate::config::{LockArgs, LockOptions};
use crate::error::{Result, UniqueJobsError};
use crate::job::{JobItem, RUN_SUFFIX};
use serde_json::{Map, Value, json};
use sha2::{Digest, Sha256};

/// Compute the lock digest for a job.
pub fn compute_digest(prefix: &str, item: &JobItem, options: &LockOptions) -> Result<String> {
    let scope = uniqueness_scope(item, options)?;
    let canonical = serde_json::to_string(&scope).map_err(|e| {
        UniqueJobsError::UserError(format!("failed to serialize digest scope: {}", e))
    })?;

    let hash = Sha256::digest(canonical.as_bytes());
    Ok(format!("{}:{}", prefix, hex::encode(hash)))
}

/// The normalized arguments that participate in a job's digest.
pub fn lock_args(item: &JobItem, options: &LockOptions) -> Result<Value> {
    select_args(item, &options.lock_args).map(normalize)
}

/// The digest of the run lock paired with an until lock.
pub fn run_digest(digest: &str) -> String {
    format!("{}{}", digest, RUN_SUFFIX)
}

/// Build the normalized value that identifies a job for locking purposes.
fn uniqueness_scope(item: &JobItem, options: &LockOptions) -> Result<Value> {
    let mut scope = Map::new();

    if !options.unique_across_workers {
        scope.insert("class".to_string(), json!(item.class));
    }
    if !options.unique_across_queues {
        scope.insert("queue".to_string(), json!(item.queue));
    }
    scope.insert("lock_args".to_string(), select_args(item, &options.lock_args)?);

    if let (Some(bucket_secs), Some(at)) = (options.time_bucket_secs, item.at)
        && bucket_secs > 0
    {
        let bucket_ms = i64::try_from(bucket_secs.saturating_mul(1_000)).unwrap_or(i64::MAX);
        scope.insert("bucket".to_string(), json!(at.div_euclid(bucket_ms)));
    }

    Ok(normalize(Value::Object(scope)))
}

fn select_args(item: &JobItem, lock_args: &LockArgs) -> Result<Value> {
    match lock_args {
        LockArgs::All => Ok(Value::Array(item.args.clone())),
        LockArgs::None => Ok(Value::Array(Vec::new())),
        LockArgs::Indices(indices) => Ok(Value::Array(
            indices
                .iter()
                .map(|&i| item.args.get(i).cloned().unwrap_or(Value::Null))
                .collect(),
        )),
        LockArgs::Keys(keys) => {
            let Some(Value::Object(first)) = item.args.first() else {
                return Err(UniqueJobsError::UserError(format!(
                    "lock_args keys for '{}' require an object as the first argument",
                    item.class
                )));
            };
            let selected: Map<String, Value> = keys
                .iter()
                .map(|key| (key.clone(), first.get(key).cloned().unwrap_or(Value::Null)))
                .collect();
            Ok(Value::Object(selected))
        }
    }
}

/// Recursively rebuild objects with sorted keys.
fn normalize(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            Value::Object(
                entries
                    .into_iter()
                    .map(|(k, v)| (k, normalize(v)))
                    .collect(),
            )
        }
        Value::Array(items) => Value::Array(items.into_iter().map(normalize).collect()),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LockKind;
    use proptest::prelude::*;

    fn item(class: &str, args: Vec<Value>) -> JobItem {
        JobItem::new(class, args)
    }

    fn options() -> LockOptions {
        LockOptions::new(LockKind::UntilExecuting)
    }

    #[test]
    fn digest_has_prefix_and_fixed_length() {
        let digest = compute_digest("uniquejobs", &item("MyWorker", vec![json!(1)]), &options())
            .unwrap();
        assert!(digest.starts_with("uniquejobs:"));
        assert_eq!(digest.len(), "uniquejobs:".len() + 64);
    }

    #[test]
    fn job_id_does_not_affect_digest() {
        let a = item("MyWorker", vec![json!("x")]).with_jid("a");
        let b = item("MyWorker", vec![json!("x")]).with_jid("b");
        assert_eq!(
            compute_digest("p", &a, &options()).unwrap(),
            compute_digest("p", &b, &options()).unwrap()
        );
    }

    #[test]
    fn object_key_order_does_not_affect_digest() {
        let a: Value = serde_json::from_str(r#"{"b": 2, "a": {"y": 1, "x": 0}}"#).unwrap();
        let b: Value = serde_json::from_str(r#"{"a": {"x": 0, "y": 1}, "b": 2}"#).unwrap();
        assert_eq!(
            compute_digest("p", &item("W", vec![a]), &options()).unwrap(),
            compute_digest("p", &item("W", vec![b]), &options()).unwrap()
        );
    }

    #[test]
    fn class_queue_and_args_distinguish_digests() {
        let base = item("W", vec![json!(1)]);
        let digest = compute_digest("p", &base, &options()).unwrap();

        let other_class = item("V", vec![json!(1)]);
        let other_queue = item("W", vec![json!(1)]).with_queue("critical");
        let other_args = item("W", vec![json!(2)]);

        for other in [other_class, other_queue, other_args] {
            assert_ne!(digest, compute_digest("p", &other, &options()).unwrap());
        }
    }

    #[test]
    fn unique_across_queues_and_workers() {
        let mut opts = options();
        opts.unique_across_queues = true;
        opts.unique_across_workers = true;

        let a = item("W", vec![json!(1)]);
        let b = item("V", vec![json!(1)]).with_queue("critical");
        assert_eq!(
            compute_digest("p", &a, &opts).unwrap(),
            compute_digest("p", &b, &opts).unwrap()
        );
    }

    #[test]
    fn lock_args_indices_select_positions() {
        let opts = options().with_lock_args(LockArgs::Indices(vec![0]));
        let a = item("W", vec![json!(1), json!("ignored")]);
        let b = item("W", vec![json!(1), json!("different")]);
        let c = item("W", vec![json!(2), json!("ignored")]);

        let da = compute_digest("p", &a, &opts).unwrap();
        assert_eq!(da, compute_digest("p", &b, &opts).unwrap());
        assert_ne!(da, compute_digest("p", &c, &opts).unwrap());
    }

    #[test]
    fn lock_args_keys_select_fields() {
        let opts = options().with_lock_args(LockArgs::Keys(vec!["user_id".to_string()]));
        let a = item("W", vec![json!({"user_id": 7, "at": 1})]);
        let b = item("W", vec![json!({"user_id": 7, "at": 2})]);
        assert_eq!(
            compute_digest("p", &a, &opts).unwrap(),
            compute_digest("p", &b, &opts).unwrap()
        );

        let not_object = item("W", vec![json!(7)]);
        assert!(compute_digest("p", &not_object, &opts).is_err());
    }

    #[test]
    fn lock_args_none_ignores_arguments() {
        let opts = options().with_lock_args(LockArgs::None);
        assert_eq!(
            compute_digest("p", &item("W", vec![json!(1)]), &opts).unwrap(),
            compute_digest("p", &item("W", vec![json!(2)]), &opts).unwrap()
        );
    }

    #[test]
    fn time_bucket_separates_scheduled_jobs() {
        let mut opts = options();
        opts.time_bucket_secs = Some(3_600);

        let early = item("W", vec![]).scheduled_at(1_000);
        let same_hour = item("W", vec![]).scheduled_at(3_000_000);
        let next_hour = item("W", vec![]).scheduled_at(3_700_000);

        let d = compute_digest("p", &early, &opts).unwrap();
        assert_eq!(d, compute_digest("p", &same_hour, &opts).unwrap());
        assert_ne!(d, compute_digest("p", &next_hour, &opts).unwrap());
    }

    #[test]
    fn run_digest_appends_suffix() {
        assert_eq!(run_digest("p:abc"), "p:abc:RUN");
    }

    proptest! {
        #[test]
        fn digest_is_deterministic(class in "[A-Z][a-zA-Z]{0,12}", n in any::<i64>(), s in ".{0,16}") {
            let args = vec![json!(n), json!({"k": s.clone(), "n": n})];
            let first = compute_digest("p", &item(&class, args.clone()), &options()).unwrap();
            let second = compute_digest("p", &item(&class, args), &options()).unwrap();
            prop_assert_eq!(first, second);
        }
    }
}
