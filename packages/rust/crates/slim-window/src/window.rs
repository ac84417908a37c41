//! Window: the visibility manager over one host tree.

use std::collections::HashSet;

use serde::Serialize;
use slim_host::{HostTree, PlaceholderView, code_regions, detect_role, preview};
use slim_types::{ApplyMode, ItemId, NodeId, RetentionConfig, TokenId};
use tracing::{debug, info};

use crate::item::{Item, ItemKey, ItemSlot, MESSAGE_ID_ATTR};
use crate::locator::{self, Located};
use crate::purge::{Confirm, PurgeOutcome};
use crate::registry::PlaceholderRegistry;
use crate::retention::{self, RetentionCandidate};
use crate::stats::WindowStats;
use crate::visibility::{VisibilityFlags, VisibilityTable};

/// Characters of text kept in a placeholder preview.
const PREVIEW_CHARS: usize = 80;

/// Overlay attributes written onto realized items.
const SELECT_OVERLAY_ATTR: &str = "data-slim-select";
const SELECTED_ATTR: &str = "data-slim-selected";

/// Result of one apply pass.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct ApplyReport {
    /// Mode the pass ran in.
    pub mode: ApplyMode,
    /// Items located.
    pub total: usize,
    /// Effective keep-count.
    pub keep: usize,
    /// First untouched index.
    pub cutoff: usize,
    /// Indices collapsed by this pass.
    pub collapsed: Vec<usize>,
    /// Indices exempt because selected.
    pub skipped_selected: Vec<usize>,
    /// Indices exempt because pinned (normal mode only).
    pub skipped_pinned: Vec<usize>,
    /// Stale placeholders dropped before the pass.
    pub reconciled: usize,
}

impl ApplyReport {
    /// Whether the pass changed the tree.
    #[must_use]
    pub fn changed(&self) -> bool {
        !self.collapsed.is_empty() || self.reconciled > 0
    }
}

/// Result of an expand request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum ExpandOutcome {
    /// The item is back in the tree and now pinned.
    Expanded {
        /// Restored item.
        item: ItemId,
        /// Its content node.
        node: NodeId,
    },
    /// Unknown or stale token; nothing changed.
    Stale,
}

/// Visibility manager for one host tree.
///
/// Holds only bookkeeping; the tree is passed into every call so the host
/// keeps ownership. Every operation degrades to a no-op when its target has
/// vanished.
#[derive(Debug, Default)]
pub struct Window {
    table: VisibilityTable,
    registry: PlaceholderRegistry,
}

impl Window {
    /// Empty window.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Placeholder registry (read-only).
    #[must_use]
    pub fn registry(&self) -> &PlaceholderRegistry {
        &self.registry
    }

    /// Flags of an item.
    #[must_use]
    pub fn flags(&self, item: ItemId) -> VisibilityFlags {
        self.table.flags(item)
    }

    /// Discover items in document order. Never mutates the tree.
    pub fn locate<T: HostTree + ?Sized>(&mut self, tree: &T) -> Vec<Item> {
        let mut seen = HashSet::new();
        let mut items = Vec::new();
        for located in locator::locate(tree, &self.registry) {
            let Some(item) = self.resolve(tree, located) else {
                continue;
            };
            if !seen.insert(item.id) {
                continue;
            }
            items.push(Item {
                index: items.len(),
                ..item
            });
        }
        items
    }

    fn resolve<T: HostTree + ?Sized>(&mut self, tree: &T, located: Located) -> Option<Item> {
        match located {
            Located::Realized(node) => {
                let key = tree
                    .attr(node, MESSAGE_ID_ATTR)
                    .filter(|id| !id.is_empty())
                    .map_or(ItemKey::Node(node), |id| ItemKey::MessageId(id.to_string()));
                Some(Item {
                    id: self.table.identify(key),
                    index: 0,
                    node,
                    role: detect_role(tree, node),
                    code_count: code_regions(tree, node).len(),
                    slot: ItemSlot::Realized,
                })
            }
            Located::Placeholder(token) => {
                let entry = self.registry.get(token)?;
                Some(Item {
                    id: entry.item,
                    index: 0,
                    node: entry.item_node,
                    role: entry.view.role,
                    code_count: entry.view.code_count,
                    slot: ItemSlot::Collapsed {
                        token,
                        placeholder: entry.placeholder,
                    },
                })
            }
        }
    }

    /// Run the retention policy once.
    ///
    /// Items below the cutoff are collapsed unless already collapsed,
    /// selected, or (in normal mode) pinned. Items at or above the cutoff are
    /// never touched.
    pub fn apply<T: HostTree + ?Sized>(
        &mut self,
        tree: &mut T,
        config: &RetentionConfig,
        mode: ApplyMode,
    ) -> ApplyReport {
        let reconciled = self.reconcile(tree);
        let items = self.locate(&*tree);
        if items.is_empty() {
            return ApplyReport {
                mode,
                keep: config.keep(),
                reconciled,
                ..ApplyReport::default()
            };
        }

        let candidates: Vec<RetentionCandidate> = items
            .iter()
            .map(|item| RetentionCandidate {
                collapsed: item.is_collapsed(),
                flags: self.table.flags(item.id),
            })
            .collect();
        let plan = retention::plan(&candidates, config, mode);

        let total = items.len();
        let mut collapsed = Vec::with_capacity(plan.to_collapse.len());
        for index in plan.to_collapse {
            if self.collapse(tree, &items[index], index + 1, total) {
                collapsed.push(index);
            }
        }
        debug!(
            ?mode,
            total,
            cutoff = plan.cutoff,
            collapsed = collapsed.len(),
            "apply pass"
        );
        ApplyReport {
            mode,
            total,
            keep: plan.keep,
            cutoff: plan.cutoff,
            collapsed,
            skipped_selected: plan.skipped_selected,
            skipped_pinned: plan.skipped_pinned,
            reconciled,
        }
    }

    /// Collapse one realized item. `false` when already collapsed or detached.
    pub fn collapse<T: HostTree + ?Sized>(
        &mut self,
        tree: &mut T,
        item: &Item,
        ordinal: usize,
        total: usize,
    ) -> bool {
        if item.is_collapsed() || self.registry.token_for_item(item.id).is_some() {
            return false;
        }
        let view = PlaceholderView {
            ordinal,
            total,
            role: item.role,
            code_count: item.code_count,
            preview: preview(&*tree, item.node, PREVIEW_CHARS),
        };
        let Some(token) = self.registry.collapse(tree, item.id, item.node, view) else {
            return false;
        };
        self.table.mark_collapsed(item.id, token);
        true
    }

    /// Restore a collapsed item and pin it.
    pub fn expand<T: HostTree + ?Sized>(&mut self, tree: &mut T, token: TokenId) -> ExpandOutcome {
        let owner = self.registry.get(token).map(|entry| entry.item);
        match self.registry.expand(tree, token) {
            Some(entry) => {
                self.table.mark_realized(entry.item);
                self.table.set_pinned(entry.item, true);
                ExpandOutcome::Expanded {
                    item: entry.item,
                    node: entry.item_node,
                }
            }
            None => {
                // A stale token may have been released; its item is no longer collapsed.
                if let Some(item) = owner {
                    if self.registry.token_for_item(item).is_none() {
                        self.table.mark_realized(item);
                    }
                }
                ExpandOutcome::Stale
            }
        }
    }

    /// Restore the item behind a placeholder node (the click affordance).
    pub fn expand_placeholder<T: HostTree + ?Sized>(
        &mut self,
        tree: &mut T,
        placeholder: NodeId,
    ) -> ExpandOutcome {
        match self.registry.token_for_placeholder(placeholder) {
            Some(token) => self.expand(tree, token),
            None => ExpandOutcome::Stale,
        }
    }

    /// Restore every collapsed item. Returns how many came back.
    pub fn expand_all<T: HostTree + ?Sized>(&mut self, tree: &mut T) -> usize {
        let expanded = self
            .registry
            .tokens()
            .into_iter()
            .filter(|token| matches!(self.expand(tree, *token), ExpandOutcome::Expanded { .. }))
            .count();
        if expanded > 0 {
            info!(expanded, "expanded all collapsed items");
        }
        expanded
    }

    /// Set or clear the selected flag. Returns the previous value.
    pub fn set_selected(&mut self, item: ItemId, selected: bool) -> bool {
        self.table.set_selected(item, selected)
    }

    /// Select every realized item. Returns how many were newly selected.
    pub fn select_all_visible<T: HostTree + ?Sized>(&mut self, tree: &T) -> usize {
        self.locate(tree)
            .into_iter()
            .filter(|item| !item.is_collapsed())
            .filter(|item| !self.table.set_selected(item.id, true))
            .count()
    }

    /// Clear every selection. Returns how many were cleared.
    pub fn select_none(&mut self) -> usize {
        self.table.clear_selection()
    }

    /// Items for export: selected ones in discovery order, or the last
    /// `keep` items when nothing is selected.
    pub fn selected_items<T: HostTree + ?Sized>(
        &mut self,
        tree: &T,
        config: &RetentionConfig,
    ) -> Vec<Item> {
        let items = self.locate(tree);
        let selected: Vec<Item> = items
            .iter()
            .filter(|item| self.table.flags(item.id).selected)
            .cloned()
            .collect();
        if !selected.is_empty() {
            return selected;
        }
        let start = items.len().saturating_sub(config.keep());
        items.into_iter().skip(start).collect()
    }

    /// Counts for display. Never mutates the tree.
    pub fn stats<T: HostTree + ?Sized>(&mut self, tree: &T) -> WindowStats {
        let mut stats = WindowStats::default();
        for item in self.locate(tree) {
            stats.total += 1;
            if item.is_collapsed() {
                stats.collapsed += 1;
                stats.collapsed_code_blocks += item.code_count;
            } else {
                stats.realized += 1;
                stats.realized_code_blocks += item.code_count;
            }
            let flags = self.table.flags(item.id);
            stats.selected += usize::from(flags.selected);
            stats.pinned += usize::from(flags.pinned);
        }
        stats
    }

    /// Write selection overlay attributes onto realized items.
    ///
    /// With `selection_mode` off, overlays are removed. Attribute writes are
    /// not structural, so this never re-triggers the scheduler.
    pub fn refresh_overlays<T: HostTree + ?Sized>(
        &mut self,
        tree: &mut T,
        selection_mode: bool,
    ) -> usize {
        let items = self.locate(&*tree);
        let mut touched = 0;
        for item in items.iter().filter(|item| !item.is_collapsed()) {
            let selected = self.table.flags(item.id).selected;
            let (overlay, mark) = if selection_mode {
                (Some("on"), selected.then_some("true"))
            } else {
                (None, None)
            };
            tree.set_attr(item.node, SELECT_OVERLAY_ATTR, overlay);
            tree.set_attr(item.node, SELECTED_ATTR, mark);
            touched += 1;
        }
        touched
    }

    /// Drop placeholders the host re-rendered around.
    ///
    /// When the host re-inserts fresh content for an item we hold collapsed
    /// (same message id), the placeholder is removed so the item appears once.
    /// Tokens whose placeholder left the tree are released, and node-keyed
    /// items whose node was destroyed are forgotten.
    pub fn reconcile<T: HostTree + ?Sized>(&mut self, tree: &mut T) -> usize {
        let mut dropped = self.prune_detached(tree);
        let located = locator::locate(&*tree, &self.registry);
        let live: HashSet<ItemId> = located
            .iter()
            .filter_map(|l| match l {
                Located::Realized(node) => tree
                    .attr(*node, MESSAGE_ID_ATTR)
                    .filter(|id| !id.is_empty())
                    .map(|id| self.table.identify(ItemKey::MessageId(id.to_string()))),
                Located::Placeholder(_) => None,
            })
            .collect();
        for token in self.registry.tokens() {
            let Some(entry) = self.registry.get(token) else {
                continue;
            };
            if !live.contains(&entry.item) {
                continue;
            }
            let (item, placeholder, item_node) = (entry.item, entry.placeholder, entry.item_node);
            debug!(%item, "host re-rendered a collapsed item; dropping placeholder");
            tree.remove(placeholder);
            tree.remove(item_node);
            self.registry.release(token);
            self.table.mark_realized(item);
            dropped += 1;
        }
        let forgotten = self.table.prune_dead_nodes(|node| tree.contains(node));
        if forgotten > 0 {
            debug!(forgotten, "forgot items whose node was destroyed");
        }
        dropped
    }

    /// Release tokens whose placeholder is no longer in the tree (host
    /// navigation or re-render removed it). Returns how many were released.
    ///
    /// The owned content is destroyed and the item reads as realized again.
    /// Flags stay with message-id identities, so a host that re-renders the
    /// same messages gets its selections and pins back.
    pub fn prune_detached<T: HostTree + ?Sized>(&mut self, tree: &mut T) -> usize {
        let stale: Vec<TokenId> = self
            .registry
            .tokens()
            .into_iter()
            .filter(|token| {
                self.registry
                    .get(*token)
                    .is_some_and(|entry| !tree.is_attached(entry.placeholder))
            })
            .collect();
        for token in &stale {
            let Some(entry) = self.registry.release(*token) else {
                continue;
            };
            tree.remove(entry.placeholder);
            tree.remove(entry.item_node);
            self.table.mark_realized(entry.item);
            if matches!(self.table.key(entry.item), Some(ItemKey::Node(_))) {
                self.table.forget(entry.item);
            }
        }
        if !stale.is_empty() {
            debug!(released = stale.len(), "released detached placeholders");
        }
        stale.len()
    }

    /// Permanently remove items older than the keep window, after confirmation.
    ///
    /// Selected items are exempt. Declining leaves everything untouched.
    pub fn hard_purge<T: HostTree + ?Sized>(
        &mut self,
        tree: &mut T,
        config: &RetentionConfig,
        confirm: &mut dyn Confirm,
    ) -> PurgeOutcome {
        let items = self.locate(&*tree);
        let cutoff = retention::cutoff(items.len(), config.keep());
        let doomed: Vec<&Item> = items
            .iter()
            .take(cutoff)
            .filter(|item| !self.table.flags(item.id).selected)
            .collect();
        if doomed.is_empty() {
            return PurgeOutcome::NothingToPurge;
        }
        let prompt = format!(
            "Hard purge will remove {} older items from the page until reload. Continue?",
            doomed.len()
        );
        if !confirm.confirm(&prompt) {
            return PurgeOutcome::Declined {
                candidates: doomed.len(),
            };
        }

        let mut removed = 0;
        for item in doomed {
            if let Some(token) = item.token() {
                if let Some(entry) = self.registry.release(token) {
                    tree.remove(entry.placeholder);
                }
            }
            if tree.remove(item.node) {
                removed += 1;
            }
            self.table.forget(item.id);
        }
        info!(removed, "hard purge");
        PurgeOutcome::Purged { removed }
    }
}
