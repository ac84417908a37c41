//! Derived counts for display.

use serde::{Deserialize, Serialize};

/// Counts over one locator pass. Holds no state of its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WindowStats {
    /// Items located.
    pub total: usize,
    /// Items with full content in the tree.
    pub realized: usize,
    /// Items behind a placeholder.
    pub collapsed: usize,
    /// Code regions in realized items (queried live).
    pub realized_code_blocks: usize,
    /// Code regions in collapsed items (collapse-time snapshot).
    pub collapsed_code_blocks: usize,
    /// Items flagged selected.
    pub selected: usize,
    /// Items flagged pinned.
    pub pinned: usize,
}

impl WindowStats {
    /// Code regions across all items.
    #[must_use]
    pub fn code_blocks(&self) -> usize {
        self.realized_code_blocks + self.collapsed_code_blocks
    }
}

impl std::fmt::Display for WindowStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} turns: {} visible, {} collapsed, {} code blocks",
            self.total,
            self.realized,
            self.collapsed,
            self.code_blocks()
        )
    }
}
