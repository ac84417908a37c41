//! One discovered conversation item.

use serde::Serialize;
use slim_types::{ItemId, NodeId, Role, TokenId};

/// Host attribute carrying a message id that survives re-renders.
pub(crate) const MESSAGE_ID_ATTR: &str = "data-message-id";

/// Identity key used to map host nodes onto stable [`ItemId`]s.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ItemKey {
    /// Host-provided message id; survives node replacement.
    MessageId(String),
    /// Node handle; only as stable as the node itself.
    Node(NodeId),
}

/// Where an item's content currently lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "state")]
pub enum ItemSlot {
    /// Full content is in the tree.
    Realized,
    /// A placeholder stands in the item's position.
    Collapsed {
        /// Token owning the item.
        token: TokenId,
        /// Placeholder node in the tree.
        placeholder: NodeId,
    },
}

/// A conversation item as seen by one locator pass.
///
/// `index` is only meaningful within the pass that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[must_use]
pub struct Item {
    /// Stable identity.
    pub id: ItemId,
    /// Position in discovery order.
    pub index: usize,
    /// The item's own content node (detached while collapsed).
    pub node: NodeId,
    /// Detected author role.
    pub role: Role,
    /// Embedded code regions; a collapse-time snapshot for collapsed items.
    pub code_count: usize,
    /// Realized or collapsed.
    pub slot: ItemSlot,
}

impl Item {
    /// Whether a placeholder currently stands in for this item.
    #[must_use]
    pub fn is_collapsed(&self) -> bool {
        matches!(self.slot, ItemSlot::Collapsed { .. })
    }

    /// Owning token, when collapsed.
    #[must_use]
    pub fn token(&self) -> Option<TokenId> {
        match self.slot {
            ItemSlot::Collapsed { token, .. } => Some(token),
            ItemSlot::Realized => None,
        }
    }

    /// Node occupying the item's position in the tree.
    #[must_use]
    pub fn tree_node(&self) -> NodeId {
        match self.slot {
            ItemSlot::Collapsed { placeholder, .. } => placeholder,
            ItemSlot::Realized => self.node,
        }
    }
}
