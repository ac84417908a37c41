//! Read-only helpers over any [`HostTree`].

use slim_types::{NodeId, Role};

use crate::tree::HostTree;

/// Which selector family the locator is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemQuery {
    /// Conversation turns rendered as `article` elements.
    Primary,
    /// Legacy layout: blocks carrying the `text-base` class.
    Fallback,
}

/// Whether `node` is a candidate item for `query`.
pub fn matches_item_query<T: HostTree + ?Sized>(tree: &T, node: NodeId, query: ItemQuery) -> bool {
    match query {
        ItemQuery::Primary => tree.tag(node) == Some("article"),
        ItemQuery::Fallback => tree.has_class(node, "text-base"),
    }
}

/// All nodes under `root` in document (pre-)order, excluding `root`.
pub fn descendants<T: HostTree + ?Sized>(tree: &T, root: NodeId) -> Vec<NodeId> {
    let mut out = Vec::new();
    let mut stack: Vec<NodeId> = tree.children(root).iter().rev().copied().collect();
    while let Some(node) = stack.pop() {
        out.push(node);
        stack.extend(tree.children(node).iter().rev().copied());
    }
    out
}

/// First node under `root` (or `root` itself) matching `pred`, in document order.
pub fn find_first<T, F>(tree: &T, root: NodeId, pred: F) -> Option<NodeId>
where
    T: HostTree + ?Sized,
    F: Fn(NodeId) -> bool,
{
    if pred(root) {
        return Some(root);
    }
    descendants(tree, root).into_iter().find(|node| pred(*node))
}

/// Text of `node` and its subtree; non-empty pieces joined by newlines.
pub fn text_content<T: HostTree + ?Sized>(tree: &T, node: NodeId) -> String {
    let mut parts: Vec<&str> = Vec::new();
    let own = tree.own_text(node);
    if !own.is_empty() {
        parts.push(own);
    }
    for child in descendants(tree, node) {
        let text = tree.own_text(child);
        if !text.is_empty() {
            parts.push(text);
        }
    }
    parts.join("\n")
}

/// Heuristic author role of an item node.
///
/// Role attribute on the node, then on the first descendant carrying one;
/// otherwise anything with code or rendered markdown counts as an assistant turn.
pub fn detect_role<T: HostTree + ?Sized>(tree: &T, node: NodeId) -> Role {
    const ROLE_ATTR: &str = "data-message-author-role";

    let attributed = find_first(tree, node, |n| tree.attr(n, ROLE_ATTR).is_some())
        .and_then(|n| tree.attr(n, ROLE_ATTR))
        .and_then(Role::from_attr);
    if let Some(role) = attributed {
        return role;
    }
    let looks_generated = find_first(tree, node, |n| {
        matches!(tree.tag(n), Some("pre" | "code")) || tree.has_class(n, "markdown")
    })
    .is_some();
    if looks_generated {
        Role::Assistant
    } else {
        Role::User
    }
}

/// Rendered code regions (`pre` elements) inside `node`, including `node` itself.
pub fn code_regions<T: HostTree + ?Sized>(tree: &T, node: NodeId) -> Vec<NodeId> {
    let mut out = Vec::new();
    if tree.tag(node) == Some("pre") {
        out.push(node);
    }
    out.extend(
        descendants(tree, node)
            .into_iter()
            .filter(|n| tree.tag(*n) == Some("pre")),
    );
    out
}

/// Whitespace-collapsed text preview, truncated to `max_chars` with an ellipsis.
pub fn preview<T: HostTree + ?Sized>(tree: &T, node: NodeId, max_chars: usize) -> String {
    let text = text_content(tree, node);
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() <= max_chars {
        return collapsed;
    }
    let mut out: String = collapsed.chars().take(max_chars).collect();
    out.push('…');
    out
}
