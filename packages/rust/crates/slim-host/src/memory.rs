//! Arena-backed in-memory host tree.

use std::collections::{BTreeMap, HashMap};

use slim_types::{NodeId, SubscriptionId};
use tracing::trace;

use crate::inspect::find_first;
use crate::transcript::{Transcript, TurnSpec};
use crate::tree::{HostTree, MutationRecord, PLACEHOLDER_CLASS, PlaceholderView};

/// Pixel height assumed per line of code when a region gives none.
const LINE_HEIGHT_PX: u32 = 20;

#[derive(Debug, Clone, Default)]
struct NodeData {
    tag: String,
    attrs: BTreeMap<String, String>,
    classes: Vec<String>,
    text: String,
    children: Vec<NodeId>,
    parent: Option<NodeId>,
    laid_out: bool,
    height: u32,
}

#[derive(Debug, Clone)]
struct Observer {
    root: NodeId,
    records: Vec<MutationRecord>,
}

/// In-memory document: a `body` root, element nodes keyed by [`NodeId`],
/// and child-list observers that see every insertion/removal in their subtree.
///
/// Detached nodes stay in the arena until [`HostTree::remove`] destroys them,
/// which is what lets a collapsed item be re-inserted unchanged.
#[derive(Debug, Clone)]
pub struct MemoryTree {
    nodes: HashMap<NodeId, NodeData>,
    next_node: u64,
    body: Option<NodeId>,
    observers: BTreeMap<SubscriptionId, Observer>,
    next_subscription: u64,
    turns_pushed: usize,
}

impl Default for MemoryTree {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryTree {
    /// Document with an empty `body`.
    #[must_use]
    pub fn new() -> Self {
        let mut tree = Self::empty();
        let body = tree.element("body", &[]);
        tree.body = Some(body);
        tree
    }

    /// Document with no body at all, so there is no container to find.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            nodes: HashMap::new(),
            next_node: 1,
            body: None,
            observers: BTreeMap::new(),
            next_subscription: 1,
            turns_pushed: 0,
        }
    }

    /// Build a document with a `main` container holding every transcript turn.
    #[must_use]
    pub fn from_transcript(transcript: &Transcript) -> Self {
        let mut tree = Self::new();
        let main = tree.mount_main();
        for turn in &transcript.turns {
            tree.push_turn(main, turn);
        }
        tree
    }

    /// The `body` node, if the document has one.
    #[must_use]
    pub fn body(&self) -> Option<NodeId> {
        self.body
    }

    /// Number of nodes alive in the arena, attached or not.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Create a detached element.
    pub fn element(&mut self, tag: &str, classes: &[&str]) -> NodeId {
        let id = NodeId(self.next_node);
        self.next_node += 1;
        self.nodes.insert(
            id,
            NodeData {
                tag: tag.to_ascii_lowercase(),
                classes: classes.iter().map(|c| (*c).to_string()).collect(),
                laid_out: true,
                ..NodeData::default()
            },
        );
        id
    }

    /// Replace the node's own text.
    pub fn set_text(&mut self, node: NodeId, text: &str) {
        if let Some(data) = self.nodes.get_mut(&node) {
            data.text = text.to_string();
        }
    }

    /// Mark a node as (not) taking layout space.
    pub fn set_laid_out(&mut self, node: NodeId, laid_out: bool) {
        if let Some(data) = self.nodes.get_mut(&node) {
            data.laid_out = laid_out;
        }
    }

    /// Set the rendered height reported for a node.
    pub fn set_height(&mut self, node: NodeId, height: u32) {
        if let Some(data) = self.nodes.get_mut(&node) {
            data.height = height;
        }
    }

    /// Append `child` as last child of `parent`, moving it if already placed.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> bool {
        let len = self.children(parent).len();
        self.insert_child(parent, len, child)
    }

    /// Insert `child` at `index` under `parent`, moving it if already placed.
    pub fn insert_child(&mut self, parent: NodeId, index: usize, child: NodeId) -> bool {
        if parent == child || !self.contains(parent) || !self.contains(child) {
            return false;
        }
        if self.is_ancestor(child, parent) {
            return false;
        }
        self.detach(child);
        let Some(data) = self.nodes.get_mut(&parent) else {
            return false;
        };
        let index = index.min(data.children.len());
        data.children.insert(index, child);
        if let Some(child_data) = self.nodes.get_mut(&child) {
            child_data.parent = Some(parent);
        }
        self.record(parent, vec![child], vec![]);
        true
    }

    /// Detach `node` from its parent, keeping it alive. Returns `false` if it had no parent.
    pub fn detach(&mut self, node: NodeId) -> bool {
        let Some(parent) = self.parent(node) else {
            return false;
        };
        if let Some(data) = self.nodes.get_mut(&parent) {
            data.children.retain(|c| *c != node);
        }
        if let Some(data) = self.nodes.get_mut(&node) {
            data.parent = None;
        }
        self.record(parent, vec![], vec![node]);
        true
    }

    /// Create and append a `main` container to the body.
    pub fn mount_main(&mut self) -> NodeId {
        let main = self.element("main", &[]);
        if let Some(body) = self.body {
            self.append_child(body, main);
        }
        main
    }

    /// Swap the current `main` container for a fresh, empty one, as a host
    /// navigation does. Returns the new container.
    pub fn remount_main(&mut self) -> NodeId {
        if let Some(body) = self.body {
            if let Some(old) = find_first(self, body, |n| self.tag(n) == Some("main")) {
                self.remove(old);
            }
        }
        self.mount_main()
    }

    /// Append a rendered conversation turn under `parent`.
    ///
    /// Layout: `article[data-message-id][data-testid] > div[data-message-author-role]
    /// > (h3?, div.markdown > (p*, pre > code.language-*)*)`.
    pub fn push_turn(&mut self, parent: NodeId, spec: &TurnSpec) -> NodeId {
        self.turns_pushed += 1;
        let article = self.element("article", &["text-base"]);
        let message_id = spec
            .id
            .clone()
            .unwrap_or_else(|| format!("msg-{}", self.turns_pushed));
        self.put_attr(article, "data-message-id", &message_id);
        self.put_attr(
            article,
            "data-testid",
            &format!("conversation-turn-{}", self.turns_pushed),
        );

        let body = self.element("div", &[]);
        self.put_attr(body, "data-message-author-role", spec.role.as_str());
        self.attach_quiet(article, body);

        if let Some(heading) = &spec.heading {
            let h = self.element("h3", &[]);
            self.set_text(h, heading);
            self.attach_quiet(body, h);
        }

        let markdown = self.element("div", &["markdown"]);
        self.attach_quiet(body, markdown);
        for paragraph in &spec.paragraphs {
            let p = self.element("p", &[]);
            self.set_text(p, paragraph);
            self.attach_quiet(markdown, p);
        }
        for code in &spec.code {
            let pre = self.element("pre", &[]);
            let language_class = format!("language-{}", code.language);
            let classes: Vec<&str> = if code.language.is_empty() {
                Vec::new()
            } else {
                vec![language_class.as_str()]
            };
            let code_node = self.element("code", &classes);
            self.set_text(code_node, &code.text);
            let lines = u32::try_from(code.text.lines().count()).unwrap_or(u32::MAX);
            let height = code
                .height
                .unwrap_or_else(|| lines.saturating_mul(LINE_HEIGHT_PX));
            self.set_height(pre, height);
            self.attach_quiet(pre, code_node);
            self.attach_quiet(markdown, pre);
        }

        if spec.hidden {
            self.set_laid_out(article, false);
        }
        self.append_child(parent, article);
        article
    }

    /// Link a detached subtree without emitting records; used while building
    /// a turn before it is inserted as one unit.
    fn attach_quiet(&mut self, parent: NodeId, child: NodeId) {
        if let Some(data) = self.nodes.get_mut(&parent) {
            data.children.push(child);
        }
        if let Some(data) = self.nodes.get_mut(&child) {
            data.parent = Some(parent);
        }
    }

    fn put_attr(&mut self, node: NodeId, name: &str, value: &str) {
        if let Some(data) = self.nodes.get_mut(&node) {
            data.attrs.insert(name.to_string(), value.to_string());
        }
    }

    fn is_ancestor(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut cursor = self.parent(node);
        while let Some(current) = cursor {
            if current == ancestor {
                return true;
            }
            cursor = self.parent(current);
        }
        false
    }

    fn record(&mut self, target: NodeId, added: Vec<NodeId>, removed: Vec<NodeId>) {
        let watching: Vec<SubscriptionId> = self
            .observers
            .iter()
            .filter(|(_, obs)| obs.root == target || self.is_ancestor(obs.root, target))
            .map(|(id, _)| *id)
            .collect();
        if watching.is_empty() {
            return;
        }
        let record = MutationRecord {
            target,
            added,
            removed,
        };
        trace!(node = %record.target, subscribers = watching.len(), "child list mutation");
        for id in watching {
            if let Some(obs) = self.observers.get_mut(&id) {
                obs.records.push(record.clone());
            }
        }
    }

    fn destroy_subtree(&mut self, node: NodeId) {
        let mut stack = vec![node];
        while let Some(current) = stack.pop() {
            if let Some(data) = self.nodes.remove(&current) {
                stack.extend(data.children);
            }
        }
    }
}

impl HostTree for MemoryTree {
    fn container(&self) -> Option<NodeId> {
        let body = self.body?;
        find_first(self, body, |n| self.tag(n) == Some("main")).or(Some(body))
    }

    fn contains(&self, node: NodeId) -> bool {
        self.nodes.contains_key(&node)
    }

    fn children(&self, node: NodeId) -> &[NodeId] {
        self.nodes
            .get(&node)
            .map(|d| d.children.as_slice())
            .unwrap_or(&[])
    }

    fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes.get(&node).and_then(|d| d.parent)
    }

    fn tag(&self, node: NodeId) -> Option<&str> {
        self.nodes.get(&node).map(|d| d.tag.as_str())
    }

    fn attr(&self, node: NodeId, name: &str) -> Option<&str> {
        self.nodes
            .get(&node)
            .and_then(|d| d.attrs.get(name))
            .map(String::as_str)
    }

    fn classes(&self, node: NodeId) -> &[String] {
        self.nodes
            .get(&node)
            .map(|d| d.classes.as_slice())
            .unwrap_or(&[])
    }

    fn own_text(&self, node: NodeId) -> &str {
        self.nodes.get(&node).map_or("", |d| d.text.as_str())
    }

    fn is_laid_out(&self, node: NodeId) -> bool {
        if !self.is_attached(node) {
            return false;
        }
        let mut cursor = Some(node);
        while let Some(current) = cursor {
            if !self.nodes.get(&current).is_some_and(|d| d.laid_out) {
                return false;
            }
            cursor = self.parent(current);
        }
        true
    }

    fn rendered_height(&self, node: NodeId) -> u32 {
        if !self.is_laid_out(node) {
            return 0;
        }
        self.nodes.get(&node).map_or(0, |d| d.height)
    }

    fn is_attached(&self, node: NodeId) -> bool {
        let Some(body) = self.body else {
            return false;
        };
        node == body || (self.contains(node) && self.is_ancestor(body, node))
    }

    fn create_placeholder(&mut self, view: &PlaceholderView) -> NodeId {
        let node = self.element("div", &[PLACEHOLDER_CLASS]);
        self.put_attr(node, "role", "button");
        self.put_attr(node, "tabindex", "0");
        self.put_attr(node, "data-role", view.role.as_str());
        self.put_attr(node, "data-code-count", &view.code_count.to_string());
        self.put_attr(node, "title", &view.preview);
        self.set_text(node, &view.label());
        node
    }

    fn replace_with(&mut self, old: NodeId, new: NodeId) -> bool {
        if old == new || !self.contains(new) {
            return false;
        }
        let Some(parent) = self.parent(old) else {
            return false;
        };
        if self.is_ancestor(new, parent) || new == parent {
            return false;
        }
        self.detach(new);
        let Some(data) = self.nodes.get_mut(&parent) else {
            return false;
        };
        let Some(index) = data.children.iter().position(|c| *c == old) else {
            return false;
        };
        data.children[index] = new;
        if let Some(old_data) = self.nodes.get_mut(&old) {
            old_data.parent = None;
        }
        if let Some(new_data) = self.nodes.get_mut(&new) {
            new_data.parent = Some(parent);
        }
        self.record(parent, vec![new], vec![old]);
        true
    }

    fn remove(&mut self, node: NodeId) -> bool {
        if !self.contains(node) {
            return false;
        }
        if Some(node) == self.body {
            return false;
        }
        self.detach(node);
        self.destroy_subtree(node);
        true
    }

    fn set_attr(&mut self, node: NodeId, name: &str, value: Option<&str>) -> bool {
        let Some(data) = self.nodes.get_mut(&node) else {
            return false;
        };
        match value {
            Some(value) => {
                data.attrs.insert(name.to_string(), value.to_string());
            }
            None => {
                data.attrs.remove(name);
            }
        }
        true
    }

    fn observe(&mut self, root: NodeId) -> SubscriptionId {
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        self.observers.insert(
            id,
            Observer {
                root,
                records: Vec::new(),
            },
        );
        id
    }

    fn disconnect(&mut self, subscription: SubscriptionId) {
        self.observers.remove(&subscription);
    }

    fn take_records(&mut self, subscription: SubscriptionId) -> Vec<MutationRecord> {
        self.observers
            .get_mut(&subscription)
            .map(|obs| std::mem::take(&mut obs.records))
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slim_types::Role;

    fn placeholder_view() -> PlaceholderView {
        PlaceholderView {
            ordinal: 1,
            total: 2,
            role: Role::User,
            code_count: 0,
            preview: "hi".to_string(),
        }
    }

    #[test]
    fn test_container_prefers_main() {
        let mut tree = MemoryTree::new();
        assert_eq!(tree.container(), tree.body());
        let main = tree.mount_main();
        assert_eq!(tree.container(), Some(main));
    }

    #[test]
    fn test_empty_document_has_no_container() {
        assert_eq!(MemoryTree::empty().container(), None);
    }

    #[test]
    fn test_replace_with_keeps_position_and_old_node() {
        let mut tree = MemoryTree::new();
        let main = tree.mount_main();
        let first = tree.push_turn(main, &TurnSpec::user("one"));
        let second = tree.push_turn(main, &TurnSpec::user("two"));
        let ph = tree.create_placeholder(&placeholder_view());

        assert!(tree.replace_with(first, ph));
        assert_eq!(tree.children(main), &[ph, second]);
        assert!(tree.contains(first));
        assert!(!tree.is_attached(first));

        assert!(tree.replace_with(ph, first));
        assert_eq!(tree.children(main), &[first, second]);
        assert!(tree.is_attached(first));
    }

    #[test]
    fn test_replace_detached_is_noop() {
        let mut tree = MemoryTree::new();
        let loose = tree.element("article", &[]);
        let ph = tree.create_placeholder(&placeholder_view());
        assert!(!tree.replace_with(loose, ph));
    }

    #[test]
    fn test_observer_sees_subtree_mutations_only() {
        let mut tree = MemoryTree::new();
        let main = tree.mount_main();
        let sub = tree.observe(main);

        tree.push_turn(main, &TurnSpec::user("hello"));
        let records = tree.take_records(sub);
        assert_eq!(records.len(), 1);
        assert!(records[0].is_structural());
        assert!(tree.take_records(sub).is_empty());

        // Sibling of main is outside the observed subtree.
        let body = tree.body().unwrap();
        let aside = tree.element("aside", &[]);
        tree.append_child(body, aside);
        assert!(tree.take_records(sub).is_empty());

        tree.disconnect(sub);
        tree.push_turn(main, &TurnSpec::user("again"));
        assert!(tree.take_records(sub).is_empty());
    }

    #[test]
    fn test_hidden_turn_not_laid_out() {
        let mut tree = MemoryTree::new();
        let main = tree.mount_main();
        let turn = tree.push_turn(main, &TurnSpec::user("x").hidden());
        assert!(tree.is_attached(turn));
        assert!(!tree.is_laid_out(turn));
    }

    #[test]
    fn test_remount_main_replaces_container() {
        let mut tree = MemoryTree::new();
        let first = tree.mount_main();
        let turn = tree.push_turn(first, &TurnSpec::user("x"));
        let second = tree.remount_main();
        assert_ne!(first, second);
        assert_eq!(tree.container(), Some(second));
        assert!(!tree.contains(turn));
    }

    #[test]
    fn test_remove_destroys_subtree() {
        let mut tree = MemoryTree::new();
        let main = tree.mount_main();
        let before = tree.node_count();
        let turn = tree.push_turn(main, &TurnSpec::assistant("x"));
        assert!(tree.node_count() > before);
        assert!(tree.remove(turn));
        assert_eq!(tree.node_count(), before);
        assert!(!tree.remove(turn));
    }
}
