//! Side effects of conflict strategies that touch the queue collections.

use crate::changelog::{ChangelogAction, ChangelogPolicy};
use crate::clock::{Millis, format_millis};
use crate::job::JobItem;
use crate::store::{Keyspace, Script};
use serde_json::json;

/// Move a duplicate job to the dead set.
#[derive(Debug)]
pub struct RejectJob<'a> {
    pub digest: &'a str,
    pub item: &'a JobItem,
    pub changelog: &'a ChangelogPolicy,
}

impl Script for RejectJob<'_> {
    type Output = ();

    fn name(&self) -> &'static str {
        "reject_job"
    }

    fn run(&self, keys: &mut Keyspace, now: Millis) {
        keys.kill_job(self.item.clone(), now);
        let entry = self.changelog.entry(
            now,
            ChangelogAction::Rejected,
            self.digest,
            Some(self.item.jid.as_str()),
            json!({"class": self.item.class, "queue": self.item.queue}),
        );
        keys.record_change(entry, self.changelog.capacity);
    }
}

/// Put a duplicate job on the schedule for `at`.
#[derive(Debug)]
pub struct RescheduleJob<'a> {
    pub digest: &'a str,
    pub item: &'a JobItem,
    pub at: Millis,
    pub changelog: &'a ChangelogPolicy,
}

impl Script for RescheduleJob<'_> {
    type Output = ();

    fn name(&self) -> &'static str {
        "reschedule_job"
    }

    fn run(&self, keys: &mut Keyspace, now: Millis) {
        let item = self.item.clone().scheduled_at(self.at);
        keys.schedule_job(item, self.at);
        let entry = self.changelog.entry(
            now,
            ChangelogAction::Rescheduled,
            self.digest,
            Some(self.item.jid.as_str()),
            json!({"at": format_millis(self.at)}),
        );
        keys.record_change(entry, self.changelog.capacity);
    }
}

/// Remove queued jobs bearing a digest and delete its lock, so the incoming
/// duplicate can take it. Returns the removed job ids.
#[derive(Debug)]
pub struct ReplaceDigest<'a> {
    pub digest: &'a str,
    pub changelog: &'a ChangelogPolicy,
}

impl Script for ReplaceDigest<'_> {
    type Output = Vec<String>;

    fn name(&self) -> &'static str {
        "replace_digest"
    }

    fn run(&self, keys: &mut Keyspace, now: Millis) -> Vec<String> {
        let removed: Vec<String> = keys
            .remove_jobs_with_digest(self.digest)
            .into_iter()
            .map(|job| job.jid)
            .collect();
        keys.delete_lock(self.digest);

        let entry = self.changelog.entry(
            now,
            ChangelogAction::Replaced,
            self.digest,
            None,
            json!({"removed": removed}),
        );
        keys.record_change(entry, self.changelog.capacity);
        removed
    }
}
