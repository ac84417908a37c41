//! Recency-based retention policy.
//!
//! Pure: decides which indices to collapse, never touches the tree. The
//! window executes the plan through the placeholder registry.

use serde::Serialize;
use slim_types::{ApplyMode, RetentionConfig};

use crate::visibility::VisibilityFlags;

/// What the policy needs to know about one located item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RetentionCandidate {
    /// Already owned by a placeholder.
    pub collapsed: bool,
    /// Current flags.
    pub flags: VisibilityFlags,
}

/// Outcome of one policy evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct RetentionPlan {
    /// Items located.
    pub total: usize,
    /// Effective keep-count (`>= 1`).
    pub keep: usize,
    /// First index that is never touched.
    pub cutoff: usize,
    /// Indices to collapse, ascending.
    pub to_collapse: Vec<usize>,
    /// Indices below the cutoff left alone because they are selected.
    pub skipped_selected: Vec<usize>,
    /// Indices below the cutoff left alone because they are pinned.
    pub skipped_pinned: Vec<usize>,
    /// Indices below the cutoff that were already collapsed.
    pub already_collapsed: usize,
}

/// `max(0, total - keep)`.
#[must_use]
pub fn cutoff(total: usize, keep: usize) -> usize {
    total.saturating_sub(keep.max(1))
}

/// Evaluate the policy over items in discovery order.
#[must_use]
pub fn plan(
    candidates: &[RetentionCandidate],
    config: &RetentionConfig,
    mode: ApplyMode,
) -> RetentionPlan {
    let total = candidates.len();
    let keep = config.keep();
    let cutoff = cutoff(total, keep);
    let mut plan = RetentionPlan {
        total,
        keep,
        cutoff,
        ..RetentionPlan::default()
    };

    for (index, candidate) in candidates.iter().enumerate().take(cutoff) {
        if candidate.collapsed {
            plan.already_collapsed += 1;
        } else if candidate.flags.selected {
            plan.skipped_selected.push(index);
        } else if candidate.flags.pinned && !mode.ignores_pin() {
            plan.skipped_pinned.push(index);
        } else {
            plan.to_collapse.push(index);
        }
    }
    plan
}
