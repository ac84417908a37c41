//! Item discovery over the live container.

use slim_host::{HostTree, ItemQuery, matches_item_query};
use slim_types::{NodeId, TokenId};

use crate::registry::PlaceholderRegistry;

/// A node found by one locator walk, before identity resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Located {
    /// Item content present in the tree.
    Realized(NodeId),
    /// One of our placeholders.
    Placeholder(TokenId),
}

/// Walk the current container in document order.
///
/// Placeholders we own are reported in place of their items. Primary matches
/// that are not laid out are dropped; if the primary walk finds nothing the
/// looser fallback query runs without the layout filter. Matched subtrees are
/// not descended into.
pub(crate) fn locate<T: HostTree + ?Sized>(
    tree: &T,
    registry: &PlaceholderRegistry,
) -> Vec<Located> {
    let Some(root) = tree.container() else {
        return Vec::new();
    };
    let primary = walk(tree, registry, root, ItemQuery::Primary);
    if !primary.is_empty() {
        return primary;
    }
    walk(tree, registry, root, ItemQuery::Fallback)
}

fn walk<T: HostTree + ?Sized>(
    tree: &T,
    registry: &PlaceholderRegistry,
    root: NodeId,
    query: ItemQuery,
) -> Vec<Located> {
    let mut out = Vec::new();
    let mut stack: Vec<NodeId> = tree.children(root).iter().rev().copied().collect();
    while let Some(node) = stack.pop() {
        if let Some(token) = registry.token_for_placeholder(node) {
            out.push(Located::Placeholder(token));
            continue;
        }
        if matches_item_query(tree, node, query) {
            if query == ItemQuery::Fallback || tree.is_laid_out(node) {
                out.push(Located::Realized(node));
            }
            continue;
        }
        stack.extend(tree.children(node).iter().rev().copied());
    }
    out
}
