//! Config struct definition and default implementation.

use super::types::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Configuration for unique-jobs.
///
/// This struct represents the contents of `config.yaml` in the store
/// directory. Unknown fields in the YAML are ignored for forward compatibility.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    // =========================================================================
    // Digest settings
    // =========================================================================
    /// Prefix of every digest (default: "uniquejobs").
    #[serde(default = "default_lock_prefix")]
    pub lock_prefix: String,

    // =========================================================================
    // Lock defaults
    // =========================================================================
    /// Concurrency limit for workers without their own `jobs` entry.
    #[serde(default = "default_limit")]
    pub default_limit: u32,

    /// TTL in seconds for workers without their own `jobs` entry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_ttl_secs: Option<u64>,

    /// Per-worker lock options, keyed by worker class name.
    #[serde(default)]
    pub jobs: BTreeMap<String, LockOptions>,

    // =========================================================================
    // Changelog settings
    // =========================================================================
    /// Whether lock events are recorded in the store changelog.
    #[serde(default = "default_true")]
    pub changelog_enabled: bool,

    /// Maximum number of changelog entries kept in the store.
    #[serde(default = "default_max_history")]
    pub max_history: usize,

    // =========================================================================
    // Reaper settings
    // =========================================================================
    /// Whether the reaper runs at all.
    #[serde(default = "default_true")]
    pub reaper_enabled: bool,

    /// Maximum digests inspected per reaper pass.
    #[serde(default = "default_reaper_count")]
    pub reaper_count: usize,

    /// Seconds between reaper passes.
    #[serde(default = "default_reaper_interval_secs")]
    pub reaper_interval_secs: u64,

    /// Digests younger than this (seconds) are left for a later pass. 0 = off.
    #[serde(default = "default_reaper_grace_secs")]
    pub reaper_grace_secs: u64,

    // =========================================================================
    // Store settings
    // =========================================================================
    /// How long a script may wait for the file store lock, in milliseconds.
    #[serde(default = "default_store_lock_timeout_ms")]
    pub store_lock_timeout_ms: u64,

    /// Delay applied by the `reschedule` conflict strategy, in seconds.
    #[serde(default = "default_reschedule_delay_secs")]
    pub reschedule_delay_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            lock_prefix: default_lock_prefix(),
            default_limit: default_limit(),
            default_ttl_secs: None,
            jobs: BTreeMap::new(),
            changelog_enabled: default_true(),
            max_history: default_max_history(),
            reaper_enabled: default_true(),
            reaper_count: default_reaper_count(),
            reaper_interval_secs: default_reaper_interval_secs(),
            reaper_grace_secs: default_reaper_grace_secs(),
            store_lock_timeout_ms: default_store_lock_timeout_ms(),
            reschedule_delay_secs: default_reschedule_delay_secs(),
        }
    }
}
