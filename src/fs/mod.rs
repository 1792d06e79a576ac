//! Filesystem utilities for unique-jobs.
//!
//! Atomic writes used by the file-backed coordination store.

pub mod atomic;

pub use atomic::atomic_write;
