//! File-backed coordination store.
//!
//! The keyspace lives in `keyspace.json` inside the store directory. Every
//! script execution:
//! 1. Takes an exclusive OS lock (`flock`/`LockFileEx` via fs2) on `store.lock`
//! 2. Loads the keyspace (missing file = empty keyspace)
//! 3. Runs the script
//! 4. If the script wrote anything, replaces `keyspace.json` atomically
//!
//! The OS releases the lock when the holding process dies, so a crashed
//! process never wedges the store. Waiting for the lock is bounded; a store
//! that stays locked past the timeout is reported as unavailable.

use super::{CoordinationStore, Keyspace, Script};
use crate::clock::{Clock, Millis, SystemClock};
use crate::error::{Result, UniqueJobsError};
use crate::fs::atomic_write;
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, trace};

/// Name of the keyspace file inside the store directory.
pub const KEYSPACE_FILE: &str = "keyspace.json";

/// Name of the lock file inside the store directory.
pub const LOCK_FILE: &str = "store.lock";

const LOCK_POLL_INTERVAL: Duration = Duration::from_millis(5);

/// A keyspace persisted in a directory shared by cooperating processes.
#[derive(Debug)]
pub struct FileStore {
    root: PathBuf,
    lock_timeout: Duration,
    clock: Arc<dyn Clock>,
}

/// Holds the exclusive store lock until dropped.
struct StoreLockGuard {
    file: File,
}

impl Drop for StoreLockGuard {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

impl FileStore {
    /// Open (and create if needed) a store rooted at `root`.
    pub fn open<P: AsRef<Path>>(root: P, lock_timeout: Duration) -> Result<Self> {
        Self::open_with_clock(root, lock_timeout, Arc::new(SystemClock))
    }

    pub fn open_with_clock<P: AsRef<Path>>(
        root: P,
        lock_timeout: Duration,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).map_err(|e| {
            UniqueJobsError::StoreUnavailable(format!(
                "failed to create store directory '{}': {}",
                root.display(),
                e
            ))
        })?;

        Ok(Self {
            root,
            lock_timeout,
            clock,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn keyspace_path(&self) -> PathBuf {
        self.root.join(KEYSPACE_FILE)
    }

    pub fn lock_path(&self) -> PathBuf {
        self.root.join(LOCK_FILE)
    }

    fn lock_exclusive(&self, script: &str) -> Result<StoreLockGuard> {
        let lock_path = self.lock_path();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)
            .map_err(|e| {
                UniqueJobsError::StoreUnavailable(format!(
                    "failed to open store lock '{}': {}",
                    lock_path.display(),
                    e
                ))
            })?;

        let deadline = Instant::now() + self.lock_timeout;
        let contended = fs2::lock_contended_error().kind();
        loop {
            match file.try_lock_exclusive() {
                Ok(()) => return Ok(StoreLockGuard { file }),
                Err(e) if e.kind() == contended || e.kind() == ErrorKind::WouldBlock => {
                    if Instant::now() >= deadline {
                        debug!(script, lock = %lock_path.display(), "store lock wait timed out");
                        return Err(UniqueJobsError::StoreUnavailable(format!(
                            "timed out after {}ms waiting for store lock '{}'",
                            self.lock_timeout.as_millis(),
                            lock_path.display()
                        )));
                    }
                    thread::sleep(LOCK_POLL_INTERVAL);
                }
                Err(e) => {
                    return Err(UniqueJobsError::StoreUnavailable(format!(
                        "failed to lock store '{}': {}",
                        lock_path.display(),
                        e
                    )));
                }
            }
        }
    }

    fn load(&self) -> Result<Keyspace> {
        let path = self.keyspace_path();
        let content = match fs::read(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Keyspace::new()),
            Err(e) => {
                return Err(UniqueJobsError::StoreUnavailable(format!(
                    "failed to read keyspace '{}': {}",
                    path.display(),
                    e
                )));
            }
        };

        serde_json::from_slice(&content).map_err(|e| {
            UniqueJobsError::StoreUnavailable(format!(
                "failed to parse keyspace '{}': {}",
                path.display(),
                e
            ))
        })
    }

    fn persist(&self, keys: &Keyspace) -> Result<()> {
        let json = serde_json::to_vec(keys).map_err(|e| {
            UniqueJobsError::StoreUnavailable(format!("failed to serialize keyspace: {}", e))
        })?;
        atomic_write(self.keyspace_path(), &json)
    }
}

impl CoordinationStore for FileStore {
    fn eval<S: Script>(&self, script: &S) -> Result<S::Output> {
        let _guard = self.lock_exclusive(script.name())?;

        let mut keys = self.load()?;
        let now = self.clock.now_ms();
        let output = script.run(&mut keys, now);

        let wrote = keys.take_dirty();
        if wrote {
            self.persist(&keys)?;
        }
        trace!(script = script.name(), wrote, "file script executed");
        Ok(output)
    }

    fn now_ms(&self) -> Millis {
        self.clock.now_ms()
    }
}
