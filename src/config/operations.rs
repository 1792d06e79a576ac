//! Config loading, validation, and lookup operations.

use super::model::Config;
use super::types::{LockKind, LockOptions};
use crate::error::{Result, UniqueJobsError};
use std::path::Path;
use std::time::Duration;

impl Config {
    /// Load config from a YAML file.
    ///
    /// Unknown fields in the YAML are silently ignored for forward compatibility.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path).map_err(|e| {
            UniqueJobsError::UserError(format!(
                "failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;

        Self::from_yaml(&content)
    }

    /// Load config from a YAML file, falling back to defaults when it does not exist.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Parse config from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml).map_err(|e| {
            UniqueJobsError::UserError(format!("failed to parse config YAML: {}", e))
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Serialize config to YAML string.
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(|e| {
            UniqueJobsError::UserError(format!("failed to serialize config to YAML: {}", e))
        })
    }

    /// Validate config values and return error on invalid values.
    ///
    /// Validation rules:
    /// - `lock_prefix` must be non-empty and contain no whitespace
    /// - `default_limit`, `reaper_count`, `reaper_interval_secs` and
    ///   `store_lock_timeout_ms` must be positive
    /// - every `jobs` entry must have a positive limit, and `until_expired`
    ///   entries must carry a TTL
    pub fn validate(&self) -> Result<()> {
        if self.lock_prefix.is_empty() || self.lock_prefix.chars().any(char::is_whitespace) {
            return Err(invalid(
                "lock_prefix must be non-empty and contain no whitespace",
            ));
        }

        if self.default_limit == 0 {
            return Err(invalid("default_limit must be greater than 0"));
        }

        if self.reaper_count == 0 {
            return Err(invalid("reaper_count must be greater than 0"));
        }

        if self.reaper_interval_secs == 0 {
            return Err(invalid("reaper_interval_secs must be greater than 0"));
        }

        if self.store_lock_timeout_ms == 0 {
            return Err(invalid("store_lock_timeout_ms must be greater than 0"));
        }

        for (worker, options) in &self.jobs {
            if options.limit == 0 {
                return Err(invalid(&format!(
                    "jobs.{}.limit must be greater than 0",
                    worker
                )));
            }
            if options.lock.requires_ttl() && options.ttl_secs.is_none() {
                return Err(invalid(&format!(
                    "jobs.{} uses {} and must set ttl_secs",
                    worker,
                    LockKind::UntilExpired
                )));
            }
        }

        Ok(())
    }

    /// Lock options for a worker, falling back to the configured defaults.
    pub fn options_for(&self, worker: &str) -> LockOptions {
        self.jobs.get(worker).cloned().unwrap_or_else(|| LockOptions {
            limit: self.default_limit,
            ttl_secs: self.default_ttl_secs,
            ..LockOptions::default()
        })
    }

    /// Interval between reaper passes.
    pub fn reaper_interval(&self) -> Duration {
        Duration::from_secs(self.reaper_interval_secs)
    }

    /// Minimum age of a digest before the reaper may consider it.
    pub fn reaper_grace(&self) -> Duration {
        Duration::from_secs(self.reaper_grace_secs)
    }

    /// Maximum wait for the file store lock.
    pub fn store_lock_timeout(&self) -> Duration {
        Duration::from_millis(self.store_lock_timeout_ms)
    }

    /// Delay used by the `reschedule` strategy.
    pub fn reschedule_delay(&self) -> Duration {
        Duration::from_secs(self.reschedule_delay_secs)
    }

    /// Changelog capacity, zero when the changelog is disabled.
    pub fn changelog_capacity(&self) -> usize {
        if self.changelog_enabled {
            self.max_history
        } else {
            0
        }
    }
}

fn invalid(message: &str) -> UniqueJobsError {
    UniqueJobsError::UserError(format!("config validation failed: {}", message))
}
