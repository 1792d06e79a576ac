//! Job queue collections.
//!
//! The queue subsystem stores jobs in four places inside the keyspace:
//! pending queues (by name), the scheduled set, the retry set and the working
//! set of executing jobs. Finished or purged jobs are in none of them.
//!
//! Lock code only asks membership questions here. The mutating commands in
//! [`QueueCommand`] are the queue subsystem's side of the contract; they run
//! as scripts so the reaper's liveness checks see a consistent picture.

use crate::clock::Millis;
use crate::job::JobItem;
use crate::store::{Keyspace, Script, ScoredJob};
use std::collections::HashSet;

/// Where a live job currently is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobLocation {
    Pending { queue: String },
    Scheduled { at: Millis },
    Retry { at: Millis },
    Working,
}

impl Keyspace {
    /// Find a job by id in the live collections.
    pub fn job_location(&self, jid: &str) -> Option<JobLocation> {
        if self.working.contains_key(jid) {
            return Some(JobLocation::Working);
        }
        if let Some(job) = self.schedule.get(jid) {
            return Some(JobLocation::Scheduled { at: job.score });
        }
        if let Some(job) = self.retry.get(jid) {
            return Some(JobLocation::Retry { at: job.score });
        }
        self.queues.iter().find_map(|(queue, jobs)| {
            jobs.iter().any(|job| job.jid == jid).then(|| JobLocation::Pending {
                queue: queue.clone(),
            })
        })
    }

    /// Whether a job id is in any live collection.
    pub fn is_job_live(&self, jid: &str) -> bool {
        self.job_location(jid).is_some()
    }

    /// Every job id in any live collection.
    pub fn live_job_ids(&self) -> HashSet<&str> {
        self.queues
            .values()
            .flatten()
            .map(|job| job.jid.as_str())
            .chain(self.schedule.keys().map(String::as_str))
            .chain(self.retry.keys().map(String::as_str))
            .chain(self.working.keys().map(String::as_str))
            .collect()
    }

    pub fn queue_len(&self, queue: &str) -> usize {
        self.queues.get(queue).map_or(0, |q| q.len())
    }

    pub fn scheduled(&self, jid: &str) -> Option<&ScoredJob> {
        self.schedule.get(jid)
    }

    pub fn dead(&self, jid: &str) -> Option<&ScoredJob> {
        self.dead.get(jid)
    }

    /// Append a job to its pending queue.
    pub fn push_job(&mut self, item: JobItem) {
        self.queues
            .entry(item.queue.clone())
            .or_default()
            .push_back(item);
        self.mark_dirty();
    }

    /// Add (or move) a job to the scheduled set.
    pub fn schedule_job(&mut self, item: JobItem, at: Millis) {
        self.schedule
            .insert(item.jid.clone(), ScoredJob { score: at, item });
        self.mark_dirty();
    }

    /// Add (or move) a job to the retry set.
    pub fn retry_job(&mut self, item: JobItem, at: Millis) {
        self.retry
            .insert(item.jid.clone(), ScoredJob { score: at, item });
        self.mark_dirty();
    }

    /// Add a job to the dead set.
    pub fn kill_job(&mut self, item: JobItem, now: Millis) {
        self.dead
            .insert(item.jid.clone(), ScoredJob { score: now, item });
        self.mark_dirty();
    }

    /// Pop the oldest job of a pending queue into the working set.
    pub fn start_next(&mut self, queue: &str) -> Option<JobItem> {
        let item = self.queues.get_mut(queue)?.pop_front()?;
        self.working.insert(item.jid.clone(), item.clone());
        self.mark_dirty();
        Some(item)
    }

    /// Remove a job from the working set.
    pub fn finish_job(&mut self, jid: &str) -> Option<JobItem> {
        let item = self.working.remove(jid)?;
        self.mark_dirty();
        Some(item)
    }

    /// Move scheduled and retry jobs due at or before `now` onto their queues.
    pub fn enqueue_due(&mut self, now: Millis) -> usize {
        let due: Vec<String> = self
            .schedule
            .iter()
            .chain(self.retry.iter())
            .filter(|(_, job)| job.score <= now)
            .map(|(jid, _)| jid.clone())
            .collect();

        for jid in &due {
            if let Some(job) = self.schedule.remove(jid).or_else(|| self.retry.remove(jid)) {
                self.push_job(job.item);
            }
        }
        due.len()
    }

    /// Remove pending, scheduled and retry jobs bearing `digest`.
    ///
    /// Working jobs are left alone.
    pub fn remove_jobs_with_digest(&mut self, digest: &str) -> Vec<JobItem> {
        let mut removed = Vec::new();

        for jobs in self.queues.values_mut() {
            let (bearing, kept): (Vec<JobItem>, Vec<JobItem>) =
                jobs.drain(..).partition(|job| job.bears_digest(digest));
            jobs.extend(kept);
            removed.extend(bearing);
        }
        for set in [&mut self.schedule, &mut self.retry] {
            let jids: Vec<String> = set
                .iter()
                .filter(|(_, job)| job.item.bears_digest(digest))
                .map(|(jid, _)| jid.clone())
                .collect();
            for jid in jids {
                if let Some(job) = set.remove(&jid) {
                    removed.push(job.item);
                }
            }
        }

        if !removed.is_empty() {
            self.mark_dirty();
        }
        removed
    }
}

/// Queue-side mutations, executed atomically.
#[derive(Debug, Clone)]
pub enum QueueCommand {
    Push(JobItem),
    Schedule { item: JobItem, at: Millis },
    Retry { item: JobItem, at: Millis },
    StartNext { queue: String },
    Finish { jid: String },
    EnqueueDue,
}

/// Result of a [`QueueCommand`].
#[derive(Debug, Clone, PartialEq)]
pub enum QueueReply {
    Done,
    Job(Option<JobItem>),
    Moved(usize),
}

impl Script for QueueCommand {
    type Output = QueueReply;

    fn name(&self) -> &'static str {
        match self {
            QueueCommand::Push(_) => "queue_push",
            QueueCommand::Schedule { .. } => "queue_schedule",
            QueueCommand::Retry { .. } => "queue_retry",
            QueueCommand::StartNext { .. } => "queue_start_next",
            QueueCommand::Finish { .. } => "queue_finish",
            QueueCommand::EnqueueDue => "queue_enqueue_due",
        }
    }

    fn run(&self, keys: &mut Keyspace, now: Millis) -> QueueReply {
        match self {
            QueueCommand::Push(item) => {
                keys.push_job(item.clone());
                QueueReply::Done
            }
            QueueCommand::Schedule { item, at } => {
                keys.schedule_job(item.clone(), *at);
                QueueReply::Done
            }
            QueueCommand::Retry { item, at } => {
                keys.retry_job(item.clone(), *at);
                QueueReply::Done
            }
            QueueCommand::StartNext { queue } => QueueReply::Job(keys.start_next(queue)),
            QueueCommand::Finish { jid } => QueueReply::Job(keys.finish_job(jid)),
            QueueCommand::EnqueueDue => QueueReply::Moved(keys.enqueue_due(now)),
        }
    }
}
