//! Coordination store abstraction.
//!
//! A store holds one [`Keyspace`] shared by every process and executes
//! [`Script`]s against it as indivisible units: no other script observes or
//! interleaves with a running one. Lock state, the digest index and the
//! changelog are only ever written from inside a script.
//!
//! Two implementations are provided:
//! - [`MemoryStore`]: a mutex-guarded keyspace shared by threads of one process.
//! - [`FileStore`]: a JSON keyspace on disk, serialized across processes by an
//!   exclusive OS file lock and committed with an atomic rename.

mod file;
mod keyspace;
mod memory;

pub use file::FileStore;
pub use keyspace::{Holder, Keyspace, LockMetadata, LockRecord, ScoredJob};
pub use memory::MemoryStore;

use crate::clock::Millis;
use crate::error::Result;
use std::sync::Arc;

/// A unit of work executed atomically by a store.
///
/// `run` must derive everything from the keyspace and `now`: it may be
/// executed in another process's view of time but never partially.
pub trait Script {
    type Output;

    /// Short name used in diagnostics.
    fn name(&self) -> &'static str;

    fn run(&self, keys: &mut Keyspace, now: Millis) -> Self::Output;
}

/// A shared key-value store offering atomic script execution.
pub trait CoordinationStore: Send + Sync {
    /// Run a script as one indivisible unit and return its output.
    ///
    /// Fails with `StoreUnavailable` if the store cannot be reached, locked
    /// or written; in that case none of the script's writes are visible.
    fn eval<S: Script>(&self, script: &S) -> Result<S::Output>;

    /// The store's notion of the current time.
    fn now_ms(&self) -> Millis;

    /// A consistent copy of the whole keyspace.
    fn snapshot(&self) -> Result<Keyspace> {
        self.eval(&Snapshot)
    }
}

/// Read-only script cloning the keyspace.
#[derive(Debug, Clone, Copy)]
pub struct Snapshot;

impl Script for Snapshot {
    type Output = Keyspace;

    fn name(&self) -> &'static str {
        "snapshot"
    }

    fn run(&self, keys: &mut Keyspace, _now: Millis) -> Keyspace {
        keys.clone()
    }
}

impl<T: CoordinationStore + ?Sized> CoordinationStore for Arc<T> {
    fn eval<S: Script>(&self, script: &S) -> Result<S::Output> {
        (**self).eval(script)
    }

    fn now_ms(&self) -> Millis {
        (**self).now_ms()
    }
}

impl<T: CoordinationStore + ?Sized> CoordinationStore for &T {
    fn eval<S: Script>(&self, script: &S) -> Result<S::Output> {
        (**self).eval(script)
    }

    fn now_ms(&self) -> Millis {
        (**self).now_ms()
    }
}
