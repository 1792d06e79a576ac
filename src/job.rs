//! Job payloads as stored in the queue collections.
//!
//! The queue subsystem owns these records. Lock code reads them to compute
//! digests and to answer "is this job still alive" during reaping.

use crate::clock::Millis;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Queue used when a payload does not name one.
pub const DEFAULT_QUEUE: &str = "default";

/// A job payload carrying its lock digest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobItem {
    /// Job id, unique per enqueued job.
    pub jid: String,

    /// Worker class name.
    pub class: String,

    /// Queue the job is pushed to.
    #[serde(default = "default_queue")]
    pub queue: String,

    /// Positional arguments.
    #[serde(default)]
    pub args: Vec<Value>,

    /// Due time for scheduled jobs (epoch milliseconds).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub at: Option<Millis>,

    /// Digest of the lock this job holds or waits on.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lock_digest: Option<String>,

    /// Number of times the job has been retried.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_count: Option<u32>,
}

fn default_queue() -> String {
    DEFAULT_QUEUE.to_string()
}

impl JobItem {
    /// Create a payload with a fresh job id on the default queue.
    pub fn new(class: impl Into<String>, args: Vec<Value>) -> Self {
        Self {
            jid: generate_jid(),
            class: class.into(),
            queue: default_queue(),
            args,
            at: None,
            lock_digest: None,
            retry_count: None,
        }
    }

    /// Set the job id.
    pub fn with_jid(mut self, jid: impl Into<String>) -> Self {
        self.jid = jid.into();
        self
    }

    /// Set the queue.
    pub fn with_queue(mut self, queue: impl Into<String>) -> Self {
        self.queue = queue.into();
        self
    }

    /// Set the due time.
    pub fn scheduled_at(mut self, at: Millis) -> Self {
        self.at = Some(at);
        self
    }

    /// Whether this payload bears the given digest (either the until or run lock).
    pub fn bears_digest(&self, digest: &str) -> bool {
        match &self.lock_digest {
            Some(own) => own == digest || digest.strip_suffix(RUN_SUFFIX) == Some(own.as_str()),
            None => false,
        }
    }
}

/// Suffix distinguishing the run lock of `until_and_while_executing`.
pub const RUN_SUFFIX: &str = ":RUN";

/// Generate a random (v4) job id as 32 hex characters.
pub fn generate_jid() -> String {
    Uuid::new_v4().simple().to_string()
}
