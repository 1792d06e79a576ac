use crate::clock::{ManualClock, Millis};
use crate::config::Config;
use crate::engine::LockEngine;
use crate::job::JobItem;
use crate::store::{FileStore, MemoryStore};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock, Mutex, MutexGuard};
use std::time::Duration;

static CWD_LOCK: LazyLock<Mutex<()>> = LazyLock::new(|| Mutex::new(()));

pub(crate) struct DirGuard {
    original: PathBuf,
    _lock: MutexGuard<'static, ()>,
}

impl DirGuard {
    pub(crate) fn new(new_dir: &Path) -> Self {
        // Changing the process current working directory is global and not thread-safe.
        // Lock it so tests don't race even if a #[serial] annotation is missed.
        let lock = CWD_LOCK.lock().unwrap_or_else(|poison| poison.into_inner());
        let original = std::env::current_dir().unwrap();
        std::env::set_current_dir(new_dir).unwrap();
        Self {
            original,
            _lock: lock,
        }
    }
}

impl Drop for DirGuard {
    fn drop(&mut self) {
        let _ = std::env::set_current_dir(&self.original);
    }
}

/// An engine over a shared in-memory store whose clock the test controls.
pub(crate) fn memory_engine(
    start: Millis,
) -> (LockEngine<Arc<MemoryStore>>, Arc<MemoryStore>, Arc<ManualClock>) {
    memory_engine_with(start, Config::default())
}

pub(crate) fn memory_engine_with(
    start: Millis,
    config: Config,
) -> (LockEngine<Arc<MemoryStore>>, Arc<MemoryStore>, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(start));
    let store = Arc::new(MemoryStore::with_clock(clock.clone()));
    (LockEngine::new(store.clone(), config), store, clock)
}

/// An engine over a file store in `dir`, using the system clock.
pub(crate) fn file_engine(dir: &Path) -> LockEngine<FileStore> {
    let store = FileStore::open(dir, Duration::from_secs(10)).unwrap();
    LockEngine::new(store, Config::default())
}

pub(crate) fn job(jid: &str, class: &str, args: Vec<Value>) -> JobItem {
    JobItem::new(class, args).with_jid(jid)
}
