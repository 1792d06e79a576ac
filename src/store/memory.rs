//! In-process coordination store.

use super::{CoordinationStore, Keyspace, Script};
use crate::clock::{Clock, Millis, SystemClock};
use crate::error::{Result, UniqueJobsError};
use std::sync::{Arc, Mutex};
use tracing::trace;

/// A keyspace behind a mutex. Scripts run while the mutex is held.
#[derive(Debug)]
pub struct MemoryStore {
    keyspace: Mutex<Keyspace>,
    clock: Arc<dyn Clock>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            keyspace: Mutex::new(Keyspace::new()),
            clock,
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CoordinationStore for MemoryStore {
    fn eval<S: Script>(&self, script: &S) -> Result<S::Output> {
        // Poisoned means a script panicked midway and may have left partial writes.
        let mut keys = self.keyspace.lock().map_err(|_| {
            UniqueJobsError::StoreUnavailable(format!(
                "memory store poisoned before script '{}'",
                script.name()
            ))
        })?;

        let now = self.clock.now_ms();
        let output = script.run(&mut keys, now);
        let wrote = keys.take_dirty();
        trace!(script = script.name(), wrote, "memory script executed");
        Ok(output)
    }

    fn now_ms(&self) -> Millis {
        self.clock.now_ms()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    struct CountDigests;

    impl Script for CountDigests {
        type Output = (usize, Millis);

        fn name(&self) -> &'static str {
            "count_digests"
        }

        fn run(&self, keys: &mut Keyspace, now: Millis) -> Self::Output {
            (keys.digest_count(), now)
        }
    }

    struct IndexDigest(&'static str);

    impl Script for IndexDigest {
        type Output = ();

        fn name(&self) -> &'static str {
            "index_digest"
        }

        fn run(&self, keys: &mut Keyspace, now: Millis) {
            keys.index_digest(self.0, now);
        }
    }

    #[test]
    fn scripts_see_store_clock() {
        let clock = ManualClock::new(42);
        let store = MemoryStore::with_clock(Arc::new(clock.clone()));

        store.eval(&IndexDigest("d")).unwrap();
        assert_eq!(store.eval(&CountDigests).unwrap(), (1, 42));
        assert_eq!(store.now_ms(), 42);
    }

    #[test]
    fn store_is_shared_through_arc() {
        let store = Arc::new(MemoryStore::new());
        let handles: Vec<_> = ["a", "b", "c", "d"]
            .into_iter()
            .map(|digest| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || store.eval(&IndexDigest(digest)).unwrap())
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(store.eval(&CountDigests).unwrap().0, 4);
    }
}
