//! Lock information structures.

use crate::clock::{Millis, NO_EXPIRY, format_millis};
use crate::config::LockKind;
use crate::scripts::LockSummary;
use chrono::Duration;

/// One holder of a listed lock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HolderInfo {
    pub job_id: String,
    pub expires_at: Millis,
    /// Whether the holder's TTL has already elapsed (purged on next access).
    pub expired: bool,
}

/// Information about an indexed lock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockInfo {
    /// The lock digest.
    pub digest: String,

    /// Lock kind, if a record exists.
    pub kind: Option<LockKind>,

    /// Concurrency limit, if a record exists.
    pub limit: Option<u32>,

    /// Worker class recorded on first acquire.
    pub worker: Option<String>,

    /// Holders in job id order.
    pub holders: Vec<HolderInfo>,

    /// Time since the digest was indexed.
    pub age_ms: Millis,
}

impl LockInfo {
    pub(crate) fn from_summary(summary: LockSummary, now: Millis) -> Self {
        let age_ms = now.saturating_sub(summary.score).max(0);
        match summary.record {
            Some(record) => Self {
                digest: summary.digest,
                kind: Some(record.metadata.kind),
                limit: Some(record.metadata.limit),
                worker: record.metadata.worker,
                holders: record
                    .holders
                    .into_iter()
                    .map(|(job_id, h)| HolderInfo {
                        job_id,
                        expires_at: h.expires_at,
                        expired: h.is_expired(now),
                    })
                    .collect(),
                age_ms,
            },
            None => Self {
                digest: summary.digest,
                kind: None,
                limit: None,
                worker: None,
                holders: Vec::new(),
                age_ms,
            },
        }
    }

    /// Holders whose TTL has not elapsed.
    pub fn live_holders(&self) -> usize {
        self.holders.iter().filter(|h| !h.expired).count()
    }
}

impl std::fmt::Display for LockInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = self.kind.map_or("-", |k| k.as_str());
        let limit = self.limit.map_or_else(|| "-".to_string(), |l| l.to_string());
        write!(
            f,
            "{} (kind: {}, holders: {}/{}, age: {}",
            self.digest,
            kind,
            self.live_holders(),
            limit,
            age_string(self.age_ms)
        )?;
        if let Some(worker) = &self.worker {
            write!(f, ", worker: {}", worker)?;
        }
        write!(f, ")")?;

        for holder in &self.holders {
            let until = if holder.expires_at == NO_EXPIRY {
                "held until released".to_string()
            } else {
                format!("expires {}", format_millis(holder.expires_at))
            };
            write!(
                f,
                "\n  - {} ({}{})",
                holder.job_id,
                until,
                if holder.expired { ", EXPIRED" } else { "" }
            )?;
        }
        Ok(())
    }
}

/// Format a duration in milliseconds as a human-readable age.
pub fn age_string(age_ms: Millis) -> String {
    let age = Duration::milliseconds(age_ms);
    let minutes = age.num_minutes();
    let hours = age.num_hours();
    let days = age.num_days();

    if days > 0 {
        format!("{}d {}h", days, hours % 24)
    } else if hours > 0 {
        format!("{}h {}m", hours, minutes % 60)
    } else if minutes > 0 {
        format!("{}m", minutes)
    } else {
        format!("{}s", age.num_seconds())
    }
}
