//! Per-item visibility state and flags, keyed by stable identity.

use std::collections::HashMap;

use serde::Serialize;
use slim_types::{ItemId, NodeId, TokenId};

use crate::item::ItemKey;

/// Realized or collapsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum Visibility {
    /// Full content present.
    #[default]
    Realized,
    /// Owned by the given placeholder token.
    Collapsed(TokenId),
}

/// User-controlled flags; they outlive any single collapse/expand cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct VisibilityFlags {
    /// Manually restored; ordinary passes leave it alone.
    pub pinned: bool,
    /// Marked for export; no pass ever collapses it.
    pub selected: bool,
}

#[derive(Debug, Clone)]
struct ItemRecord {
    key: ItemKey,
    visibility: Visibility,
    flags: VisibilityFlags,
}

/// Identity map plus state machine for every item seen this session.
///
/// Records are created lazily on first reference and never persisted.
#[derive(Debug, Default)]
pub struct VisibilityTable {
    identities: HashMap<ItemKey, ItemId>,
    records: HashMap<ItemId, ItemRecord>,
    next_id: u64,
}

impl VisibilityTable {
    /// Empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stable id for `key`, assigning one on first sight.
    pub fn identify(&mut self, key: ItemKey) -> ItemId {
        if let Some(id) = self.identities.get(&key) {
            return *id;
        }
        self.next_id += 1;
        let id = ItemId(self.next_id);
        self.identities.insert(key.clone(), id);
        self.records.insert(
            id,
            ItemRecord {
                key,
                visibility: Visibility::Realized,
                flags: VisibilityFlags::default(),
            },
        );
        id
    }

    /// Number of items known this session.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether no item has been seen yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Current visibility; unknown items read as realized.
    #[must_use]
    pub fn visibility(&self, id: ItemId) -> Visibility {
        self.records
            .get(&id)
            .map_or(Visibility::Realized, |r| r.visibility)
    }

    /// Current flags; unknown items read as unflagged.
    #[must_use]
    pub fn flags(&self, id: ItemId) -> VisibilityFlags {
        self.records.get(&id).map(|r| r.flags).unwrap_or_default()
    }

    /// Set the selected flag. Returns the previous value.
    pub fn set_selected(&mut self, id: ItemId, selected: bool) -> bool {
        self.records.get_mut(&id).is_some_and(|r| {
            let previous = r.flags.selected;
            r.flags.selected = selected;
            previous
        })
    }

    /// Set the pinned flag.
    pub fn set_pinned(&mut self, id: ItemId, pinned: bool) {
        if let Some(record) = self.records.get_mut(&id) {
            record.flags.pinned = pinned;
        }
    }

    /// Clear `selected` on every item. Returns how many were selected.
    pub fn clear_selection(&mut self) -> usize {
        let mut cleared = 0;
        for record in self.records.values_mut() {
            if record.flags.selected {
                record.flags.selected = false;
                cleared += 1;
            }
        }
        cleared
    }

    /// Realized -> Collapsed. Refused when already collapsed.
    pub fn mark_collapsed(&mut self, id: ItemId, token: TokenId) -> bool {
        match self.records.get_mut(&id) {
            Some(record) if record.visibility == Visibility::Realized => {
                record.visibility = Visibility::Collapsed(token);
                true
            }
            _ => false,
        }
    }

    /// Collapsed -> Realized. Refused when already realized.
    pub fn mark_realized(&mut self, id: ItemId) -> bool {
        match self.records.get_mut(&id) {
            Some(record) if record.visibility != Visibility::Realized => {
                record.visibility = Visibility::Realized;
                true
            }
            _ => false,
        }
    }

    /// Identity key behind `id`.
    #[must_use]
    pub fn key(&self, id: ItemId) -> Option<&ItemKey> {
        self.records.get(&id).map(|r| &r.key)
    }

    /// Drop an item permanently (hard purge).
    pub fn forget(&mut self, id: ItemId) {
        if let Some(record) = self.records.remove(&id) {
            self.identities.remove(&record.key);
        }
    }

    /// Forget node-keyed items whose node no longer exists. A destroyed node
    /// never comes back, so its identity can never be looked up again.
    /// Message-id identities are kept. Returns how many were dropped.
    pub fn prune_dead_nodes(&mut self, exists: impl Fn(NodeId) -> bool) -> usize {
        let dead: Vec<ItemId> = self
            .records
            .iter()
            .filter(|(_, record)| matches!(record.key, ItemKey::Node(node) if !exists(node)))
            .map(|(id, _)| *id)
            .collect();
        for id in &dead {
            self.forget(*id);
        }
        dead.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identify_is_stable_per_key() {
        let mut table = VisibilityTable::new();
        let a = table.identify(ItemKey::MessageId("m1".into()));
        let b = table.identify(ItemKey::Node(NodeId(5)));
        assert_ne!(a, b);
        assert_eq!(table.identify(ItemKey::MessageId("m1".into())), a);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_state_transitions_are_guarded() {
        let mut table = VisibilityTable::new();
        let id = table.identify(ItemKey::Node(NodeId(1)));
        assert!(!table.mark_realized(id));
        assert!(table.mark_collapsed(id, TokenId(1)));
        assert!(!table.mark_collapsed(id, TokenId(2)));
        assert_eq!(table.visibility(id), Visibility::Collapsed(TokenId(1)));
        assert!(table.mark_realized(id));
        assert_eq!(table.visibility(id), Visibility::Realized);
    }

    #[test]
    fn test_flags_survive_transitions() {
        let mut table = VisibilityTable::new();
        let id = table.identify(ItemKey::Node(NodeId(1)));
        table.set_selected(id, true);
        table.mark_collapsed(id, TokenId(9));
        table.mark_realized(id);
        assert!(table.flags(id).selected);
    }

    #[test]
    fn test_forget_releases_identity() {
        let mut table = VisibilityTable::new();
        let key = ItemKey::MessageId("gone".into());
        let id = table.identify(key.clone());
        table.set_selected(id, true);
        table.forget(id);
        assert!(table.is_empty());
        let fresh = table.identify(key);
        assert_ne!(fresh, id);
        assert!(!table.flags(fresh).selected);
    }

    #[test]
    fn test_prune_dead_nodes_keeps_message_ids() {
        let mut table = VisibilityTable::new();
        let kept = table.identify(ItemKey::MessageId("m1".into()));
        let live = table.identify(ItemKey::Node(NodeId(2)));
        let dead = table.identify(ItemKey::Node(NodeId(3)));
        table.set_selected(kept, true);

        assert_eq!(table.prune_dead_nodes(|node| node == NodeId(2)), 1);
        assert_eq!(table.len(), 2);
        assert!(table.key(dead).is_none());
        assert_eq!(table.key(live), Some(&ItemKey::Node(NodeId(2))));
        assert!(table.flags(kept).selected);
    }
}
