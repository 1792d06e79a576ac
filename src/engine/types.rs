//! Outcome types returned by the lock engine.

use crate::clock::Millis;

/// Result of an acquire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AcquireOutcome {
    /// The job holds the lock until `expires_at`.
    Acquired { expires_at: Millis, refreshed: bool },
    /// The lock's limit is saturated by `holders`.
    Conflict { holders: Vec<String> },
}

impl AcquireOutcome {
    pub fn is_acquired(&self) -> bool {
        matches!(self, AcquireOutcome::Acquired { .. })
    }
}

/// Result of a release.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseOutcome {
    Released { remaining: usize },
    NotHeld,
}

/// Result of an extend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtendOutcome {
    Extended { expires_at: Millis },
    NotHeld,
}

/// What the caller should do with a job after a lifecycle hook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Enqueue (on submit) or run (on execution start) the job.
    Proceed,
    /// Discard the job; a conflict strategy has dealt with it.
    Dropped,
    /// The job was put on the schedule for `at`; do not enqueue or run it now.
    Rescheduled { at: Millis },
}

impl Decision {
    pub fn proceeds(&self) -> bool {
        matches!(self, Decision::Proceed)
    }
}
