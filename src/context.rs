//! Store context resolution for unique-jobs.
//!
//! This module is the "environment resolution" layer of the CLI: it decides
//! which store directory to operate on and where its config lives.
//!
//! The store directory is, in order of precedence:
//! 1. An explicit path (`--store`)
//! 2. The `UNIQUE_JOBS_STORE` environment variable
//! 3. `.unique_jobs/` under the current working directory

use crate::config::Config;
use crate::error::{Result, UniqueJobsError};
use crate::store::FileStore;
use std::env;
use std::path::{Path, PathBuf};

/// Environment variable naming the store directory.
pub const STORE_ENV_VAR: &str = "UNIQUE_JOBS_STORE";

/// Default store directory relative to the working directory.
pub const DEFAULT_STORE_DIR: &str = ".unique_jobs";

/// Config file name inside the store directory.
pub const CONFIG_FILE: &str = "config.yaml";

/// Resolved paths for a store.
///
/// All paths are absolute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreContext {
    /// The store directory (holds `keyspace.json` and `store.lock`).
    pub store_dir: PathBuf,

    /// The config file (default: `{store_dir}/config.yaml`).
    pub config_path: PathBuf,
}

impl StoreContext {
    /// Resolve the store context from the current working directory.
    ///
    /// # Returns
    ///
    /// * `Ok(StoreContext)` - Successfully resolved context
    /// * `Err(UniqueJobsError::UserError)` - If the working directory is unreadable
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        let cwd = env::current_dir().map_err(|e| {
            UniqueJobsError::UserError(format!("failed to get current working directory: {}", e))
        })?;

        Self::resolve_from(&cwd, explicit)
    }

    /// Resolve the store context relative to a specific directory.
    pub fn resolve_from<P: AsRef<Path>>(cwd: P, explicit: Option<&Path>) -> Result<Self> {
        let cwd = cwd.as_ref();

        let store_dir = match explicit {
            Some(path) => path.to_path_buf(),
            None => match env::var_os(STORE_ENV_VAR) {
                Some(value) if !value.is_empty() => PathBuf::from(value),
                _ => PathBuf::from(DEFAULT_STORE_DIR),
            },
        };

        let store_dir = if store_dir.is_absolute() {
            store_dir
        } else {
            cwd.join(store_dir)
        };
        let config_path = store_dir.join(CONFIG_FILE);

        Ok(Self {
            store_dir,
            config_path,
        })
    }

    /// Load the store's config, or defaults if it has none.
    pub fn load_config(&self) -> Result<Config> {
        Config::load_or_default(&self.config_path)
    }

    /// Open the file store using the config's lock timeout.
    pub fn open_store(&self, config: &Config) -> Result<FileStore> {
        FileStore::open(&self.store_dir, config.store_lock_timeout())
    }
}
