//! The host tree contract.

use slim_types::{NodeId, Role, SubscriptionId};

/// Class carried by placeholder nodes created through [`HostTree::create_placeholder`].
pub const PLACEHOLDER_CLASS: &str = "slim-placeholder";

/// One batch entry of structural change under an observed root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationRecord {
    /// Node whose child list changed.
    pub target: NodeId,
    /// Children inserted under `target`.
    pub added: Vec<NodeId>,
    /// Children removed from `target`.
    pub removed: Vec<NodeId>,
}

impl MutationRecord {
    /// Whether any child was inserted or removed.
    #[must_use]
    pub fn is_structural(&self) -> bool {
        !self.added.is_empty() || !self.removed.is_empty()
    }
}

/// What a placeholder shows while its item is collapsed.
///
/// Captured at collapse time; never live-updated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaceholderView {
    /// 1-based position of the item in the pass that collapsed it.
    pub ordinal: usize,
    /// Item count of that pass.
    pub total: usize,
    /// Role badge.
    pub role: Role,
    /// Code-region badge.
    pub code_count: usize,
    /// Short text preview of the hidden content.
    pub preview: String,
}

impl PlaceholderView {
    /// Restore-affordance label.
    #[must_use]
    pub fn label(&self) -> String {
        let mut label = format!(
            "Collapsed {} turn ({}/{})",
            self.role.as_str(),
            self.ordinal,
            self.total
        );
        if self.code_count > 0 {
            label.push_str(&format!(" [{} code]", self.code_count));
        }
        label.push_str(" - click to expand");
        label
    }
}

/// A live, externally mutated content tree.
///
/// Reads must be cheap and side-effect free. Every mutating call returns
/// `false` (or does nothing) when its target vanished; callers treat that as a
/// no-op, never as an error.
pub trait HostTree {
    /// Current content container, if the host has mounted one.
    fn container(&self) -> Option<NodeId>;

    /// Whether the handle refers to a node that still exists (attached or not).
    fn contains(&self, node: NodeId) -> bool;

    /// Child nodes in document order.
    fn children(&self, node: NodeId) -> &[NodeId];

    /// Parent node, `None` for roots and detached nodes.
    fn parent(&self, node: NodeId) -> Option<NodeId>;

    /// Lowercase element tag.
    fn tag(&self, node: NodeId) -> Option<&str>;

    /// Attribute value.
    fn attr(&self, node: NodeId, name: &str) -> Option<&str>;

    /// Class list.
    fn classes(&self, node: NodeId) -> &[String];

    /// Whether the class list contains `class`.
    fn has_class(&self, node: NodeId, class: &str) -> bool {
        self.classes(node).iter().any(|c| c == class)
    }

    /// Text owned directly by this node, excluding children.
    fn own_text(&self, node: NodeId) -> &str;

    /// Whether the node currently takes up layout space.
    fn is_laid_out(&self, node: NodeId) -> bool;

    /// Rendered height in pixels, `0` when unknown or not laid out.
    fn rendered_height(&self, node: NodeId) -> u32;

    /// Whether the node is connected to the document.
    fn is_attached(&self, node: NodeId) -> bool;

    /// Build a detached placeholder node for a collapsed item.
    fn create_placeholder(&mut self, view: &PlaceholderView) -> NodeId;

    /// Put `new` at the exact position of `old`, detaching `old` but keeping it alive.
    fn replace_with(&mut self, old: NodeId, new: NodeId) -> bool;

    /// Detach and destroy `node` and its subtree.
    fn remove(&mut self, node: NodeId) -> bool;

    /// Set (`Some`) or clear (`None`) an attribute. Not a structural mutation.
    fn set_attr(&mut self, node: NodeId, name: &str, value: Option<&str>) -> bool;

    /// Start recording child-list mutations anywhere under `root`.
    fn observe(&mut self, root: NodeId) -> SubscriptionId;

    /// Stop recording for `subscription`. Unknown handles are ignored.
    fn disconnect(&mut self, subscription: SubscriptionId);

    /// Drain pending records for `subscription`.
    fn take_records(&mut self, subscription: SubscriptionId) -> Vec<MutationRecord>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholder_label() {
        let view = PlaceholderView {
            ordinal: 3,
            total: 10,
            role: Role::Assistant,
            code_count: 2,
            preview: "fn main".to_string(),
        };
        assert_eq!(
            view.label(),
            "Collapsed assistant turn (3/10) [2 code] - click to expand"
        );
    }

    #[test]
    fn test_record_structural() {
        let record = MutationRecord {
            target: NodeId(1),
            added: vec![],
            removed: vec![],
        };
        assert!(!record.is_structural());
    }
}
