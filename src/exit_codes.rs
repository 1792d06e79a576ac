//! Exit code constants for the uniquejobs CLI.
//!
//! - 0: Success
//! - 1: User error (bad args, invalid config)
//! - 3: Coordination store unavailable
//! - 4: Lock conflict raised by the `raise` strategy

/// Successful execution.
pub const SUCCESS: i32 = 0;

/// User error: bad arguments, invalid config or unreadable payloads.
pub const USER_ERROR: i32 = 1;

/// The coordination store could not be reached, locked or written.
pub const STORE_FAILURE: i32 = 3;

/// A duplicate job was detected and the conflict strategy asked to fail.
pub const LOCK_CONFLICT: i32 = 4;
