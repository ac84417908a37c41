//! Confirmation gate for destructive operations.

use serde::Serialize;

/// Asks the user before content is removed for good.
pub trait Confirm {
    /// Return `true` to proceed.
    fn confirm(&mut self, prompt: &str) -> bool;
}

impl<F> Confirm for F
where
    F: FnMut(&str) -> bool,
{
    fn confirm(&mut self, prompt: &str) -> bool {
        self(prompt)
    }
}

/// Result of a hard purge request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum PurgeOutcome {
    /// Nothing older than the keep window.
    NothingToPurge,
    /// The user declined; the tree is untouched.
    Declined {
        /// Items that would have been removed.
        candidates: usize,
    },
    /// Items removed from the tree.
    Purged {
        /// Items removed.
        removed: usize,
    },
}
