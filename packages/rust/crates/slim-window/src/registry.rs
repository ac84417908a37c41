//! Placeholder registry: which token owns which item while it is collapsed.

use std::collections::HashMap;

use slim_host::{HostTree, PlaceholderView};
use slim_types::{ItemId, NodeId, TokenId};
use tracing::debug;

/// A live placeholder and the item it owns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaceholderToken {
    /// Token handle.
    pub id: TokenId,
    /// Owned item.
    pub item: ItemId,
    /// The item's content node, detached while the token lives.
    pub item_node: NodeId,
    /// Placeholder node occupying the item's position.
    pub placeholder: NodeId,
    /// Preview, role and code-count snapshot taken at collapse time.
    pub view: PlaceholderView,
}

/// Token -> item ownership with eager release.
///
/// Every token is indexed three ways (by id, placeholder node, item) and all
/// three entries are dropped together in [`PlaceholderRegistry::release`].
#[derive(Debug, Default)]
pub struct PlaceholderRegistry {
    next_id: u64,
    tokens: HashMap<TokenId, PlaceholderToken>,
    by_placeholder: HashMap<NodeId, TokenId>,
    by_item: HashMap<ItemId, TokenId>,
}

impl PlaceholderRegistry {
    /// Empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Swap a placeholder into `item_node`'s position and take ownership of the item.
    ///
    /// `None` when the item is already owned or its node is no longer attached.
    pub fn collapse<T: HostTree + ?Sized>(
        &mut self,
        tree: &mut T,
        item: ItemId,
        item_node: NodeId,
        view: PlaceholderView,
    ) -> Option<TokenId> {
        if self.by_item.contains_key(&item) {
            return None;
        }
        if !tree.is_attached(item_node) {
            debug!(%item, node = %item_node, "collapse skipped: node detached");
            return None;
        }
        let placeholder = tree.create_placeholder(&view);
        if !tree.replace_with(item_node, placeholder) {
            tree.remove(placeholder);
            return None;
        }
        self.next_id += 1;
        let id = TokenId(self.next_id);
        self.tokens.insert(
            id,
            PlaceholderToken {
                id,
                item,
                item_node,
                placeholder,
                view,
            },
        );
        self.by_placeholder.insert(placeholder, id);
        self.by_item.insert(item, id);
        Some(id)
    }

    /// Swap the owned item back into the placeholder's position and release the token.
    ///
    /// `None` for unknown tokens. A token whose placeholder the host already
    /// dropped is released without touching the tree.
    pub fn expand<T: HostTree + ?Sized>(
        &mut self,
        tree: &mut T,
        token: TokenId,
    ) -> Option<PlaceholderToken> {
        let entry = self.tokens.get(&token)?;
        if !tree.is_attached(entry.placeholder) {
            debug!(%token, "expand on stale placeholder; releasing");
            self.release(token);
            return None;
        }
        let (placeholder, item_node) = (entry.placeholder, entry.item_node);
        if !tree.replace_with(placeholder, item_node) {
            return None;
        }
        tree.remove(placeholder);
        self.release(token)
    }

    /// Forget a token, returning its entry.
    pub fn release(&mut self, token: TokenId) -> Option<PlaceholderToken> {
        let entry = self.tokens.remove(&token)?;
        self.by_placeholder.remove(&entry.placeholder);
        self.by_item.remove(&entry.item);
        Some(entry)
    }

    /// Token entry.
    #[must_use]
    pub fn get(&self, token: TokenId) -> Option<&PlaceholderToken> {
        self.tokens.get(&token)
    }

    /// Token whose placeholder is `node`.
    #[must_use]
    pub fn token_for_placeholder(&self, node: NodeId) -> Option<TokenId> {
        self.by_placeholder.get(&node).copied()
    }

    /// Token currently owning `item`.
    #[must_use]
    pub fn token_for_item(&self, item: ItemId) -> Option<TokenId> {
        self.by_item.get(&item).copied()
    }

    /// All live tokens, ordered by handle.
    #[must_use]
    pub fn tokens(&self) -> Vec<TokenId> {
        let mut ids: Vec<TokenId> = self.tokens.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Number of live tokens.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// Whether nothing is collapsed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slim_host::{MemoryTree, TurnSpec};
    use slim_types::Role;

    fn view() -> PlaceholderView {
        PlaceholderView {
            ordinal: 1,
            total: 1,
            role: Role::User,
            code_count: 0,
            preview: String::new(),
        }
    }

    #[test]
    fn test_collapse_then_expand_round_trip() {
        let mut tree = MemoryTree::new();
        let main = tree.mount_main();
        let node = tree.push_turn(main, &TurnSpec::user("hi"));
        let mut registry = PlaceholderRegistry::new();

        let token = registry
            .collapse(&mut tree, ItemId(1), node, view())
            .unwrap();
        assert!(!tree.is_attached(node));
        assert_eq!(registry.token_for_item(ItemId(1)), Some(token));
        assert!(registry.collapse(&mut tree, ItemId(1), node, view()).is_none());

        let entry = registry.expand(&mut tree, token).unwrap();
        assert_eq!(entry.item_node, node);
        assert!(tree.is_attached(node));
        assert!(!tree.contains(entry.placeholder));
        assert!(registry.is_empty());
        assert!(registry.expand(&mut tree, token).is_none());
    }

    #[test]
    fn test_expand_releases_stale_token() {
        let mut tree = MemoryTree::new();
        let main = tree.mount_main();
        let node = tree.push_turn(main, &TurnSpec::user("hi"));
        let mut registry = PlaceholderRegistry::new();
        let token = registry
            .collapse(&mut tree, ItemId(1), node, view())
            .unwrap();
        let placeholder = registry.get(token).unwrap().placeholder;
        tree.remove(placeholder);

        assert!(registry.expand(&mut tree, token).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_collapse_detached_node_is_noop() {
        let mut tree = MemoryTree::new();
        let loose = tree.element("article", &[]);
        let mut registry = PlaceholderRegistry::new();
        assert!(registry.collapse(&mut tree, ItemId(1), loose, view()).is_none());
        assert!(registry.is_empty());
    }
}
