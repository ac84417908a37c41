//! Scheduler timings.

use serde::{Deserialize, Serialize};

/// What happens to an apply request that arrives while a pass is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecheckPolicy {
    /// Drop automatic requests; the next mutation or tick re-triggers.
    /// Forced requests are still kept as the single post-pass re-check.
    #[default]
    Drop,
    /// Remember one re-check of any kind and schedule it when the pass finishes.
    Coalesce,
}

/// Timings in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SchedulerConfig {
    /// Quiet period after the last structural mutation.
    pub debounce_ms: u64,
    /// Container re-resolution interval.
    pub rebind_ms: u64,
    /// Upper bound on waiting for an idle slot.
    pub idle_fallback_ms: u64,
    /// Suspension after a single manual expand.
    pub expand_suspend_ms: u64,
    /// Suspension after expand-all.
    pub expand_all_suspend_ms: u64,
    /// Stats publication interval.
    pub stats_ms: u64,
    /// Soft-hide wait between attempts while no items exist.
    pub soft_hide_retry_ms: u64,
    /// Soft-hide attempts before giving up.
    pub soft_hide_attempts: u32,
    /// Requests arriving mid-pass.
    pub recheck: RecheckPolicy,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 150,
            rebind_ms: 1000,
            idle_fallback_ms: 1000,
            expand_suspend_ms: 1500,
            expand_all_suspend_ms: 10_000,
            stats_ms: 2000,
            soft_hide_retry_ms: 250,
            soft_hide_attempts: 8,
            recheck: RecheckPolicy::Drop,
        }
    }
}
