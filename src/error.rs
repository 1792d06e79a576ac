//! Error types for unique-jobs.
//!
//! Duplicate detection and releasing an absent holder are not errors: the
//! engine reports them as ordinary outcomes. Only infrastructure faults,
//! invalid input and an explicit `raise` strategy end up here.

use crate::exit_codes;
use thiserror::Error;

/// Main error type for unique-jobs operations.
#[derive(Error, Debug)]
pub enum UniqueJobsError {
    /// Invalid arguments, config or payloads.
    #[error("{0}")]
    UserError(String),

    /// The coordination store could not be read, locked or written.
    ///
    /// Callers must treat this as "unknown", never as "lock available".
    #[error("Coordination store unavailable: {0}")]
    StoreUnavailable(String),

    /// A duplicate job was detected and the `raise` strategy was configured.
    #[error("Lock conflict: job {job_id} is a duplicate of {digest}")]
    LockConflict { digest: String, job_id: String },
}

impl UniqueJobsError {
    /// Returns the appropriate exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            UniqueJobsError::UserError(_) => exit_codes::USER_ERROR,
            UniqueJobsError::StoreUnavailable(_) => exit_codes::STORE_FAILURE,
            UniqueJobsError::LockConflict { .. } => exit_codes::LOCK_CONFLICT,
        }
    }

    /// Whether this error is a transient store fault.
    pub fn is_store_unavailable(&self) -> bool {
        matches!(self, UniqueJobsError::StoreUnavailable(_))
    }
}

/// Result type alias for unique-jobs operations.
pub type Result<T> = std::result::Result<T, UniqueJobsError>;
