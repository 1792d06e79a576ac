//! Operator view of lock state.
//!
//! This module backs the `locks` CLI commands:
//! - listing indexed digests with their holders, optionally filtered by glob
//! - clearing a digest by hand
//!
//! # Lock Info
//!
//! Each listed lock carries:
//! - `digest`: the lock digest
//! - `kind` / `limit` / `worker`: from the metadata written on first acquire
//! - `holders`: job ids with their expiry
//! - `age`: time since the digest was indexed
//!
//! Clearing is forced: holders are dropped regardless of whether their jobs
//! are still live. The changelog records who did it.

mod operations;
mod types;

#[cfg(test)]
mod tests;

// Re-export public API
pub use operations::{clear_lock, list_locks};
pub use types::{HolderInfo, LockInfo, age_string};
