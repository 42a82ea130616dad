// SPDX-License-Identifier: MIT

//! Arena-allocated data trees (§3 "Data tree", §9 "Cyclic references").
//!
//! Parent/child links would be reciprocal owning pointers in a naive tree;
//! instead each node lives in a flat arena and refers to others by index,
//! so a child's parent pointer is just a `NodeId`, not a strong reference.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use sysrepo_core::Value;

/// Index handle into a [`DataTree`]'s arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeId(pub usize);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeNode {
    pub parent: Option<NodeId>,
    pub name: String,
    /// For keyed list instances: the key leaf name/value pairs that
    /// identify this instance among its siblings.
    pub keys: Vec<(String, String)>,
    pub value: Value,
    pub children: Vec<NodeId>,
}

/// A rooted ordered tree for a single module (§3). Node 0 is a synthetic,
/// invisible root whose children are the module's top-level nodes; this
/// keeps path navigation uniform (no special-casing "no parent").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataTree {
    pub module: String,
    arena: Vec<TreeNode>,
}

const ROOT: NodeId = NodeId(0);

impl DataTree {
    pub fn new(module: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            arena: vec![TreeNode {
                parent: None,
                name: String::new(),
                keys: Vec::new(),
                value: Value::Container,
                children: Vec::new(),
            }],
        }
    }

    pub fn root(&self) -> NodeId {
        ROOT
    }

    pub fn node(&self, id: NodeId) -> &TreeNode {
        &self.arena[id.0]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut TreeNode {
        &mut self.arena[id.0]
    }

    pub fn is_empty(&self) -> bool {
        self.arena[ROOT.0].children.is_empty()
    }

    /// Find a direct child of `parent` by name and, for list instances, key
    /// tuple. `keys` is ignored (matches any instance's keys) when empty and
    /// the child isn't a list, or when the caller wants "the first child by
    /// name" during ancestor auto-creation.
    pub fn find_child(&self, parent: NodeId, name: &str, keys: &[(String, String)]) -> Option<NodeId> {
        self.arena[parent.0]
            .children
            .iter()
            .copied()
            .find(|&c| {
                let node = &self.arena[c.0];
                node.name == name && (keys.is_empty() || node.keys == keys)
            })
    }

    pub fn children(&self, parent: NodeId) -> &[NodeId] {
        &self.arena[parent.0].children
    }

    /// Find all direct children matching `name` (every instance of a list).
    pub fn children_named<'a>(&'a self, parent: NodeId, name: &'a str) -> impl Iterator<Item = NodeId> + 'a {
        self.arena[parent.0].children.iter().copied().filter(move |&c| self.arena[c.0].name == name)
    }

    /// Append a new child under `parent`, returning its id.
    pub fn insert_child(
        &mut self,
        parent: NodeId,
        name: impl Into<String>,
        keys: Vec<(String, String)>,
        value: Value,
    ) -> NodeId {
        let id = NodeId(self.arena.len());
        self.arena.push(TreeNode { parent: Some(parent), name: name.into(), keys, value, children: Vec::new() });
        self.arena[parent.0].children.push(id);
        id
    }

    /// Remove `id` and its entire subtree from its parent's child list.
    /// Arena slots are left as tombstones (never reused) to keep existing
    /// `NodeId`s elsewhere in the tree valid.
    pub fn remove(&mut self, id: NodeId) {
        if let Some(parent) = self.arena[id.0].parent {
            self.arena[parent.0].children.retain(|&c| c != id);
        }
        let mut stack = self.arena[id.0].children.clone();
        self.arena[id.0].children.clear();
        while let Some(n) = stack.pop() {
            stack.extend(self.arena[n.0].children.iter().copied());
            self.arena[n.0].parent = None;
        }
    }

    /// Move a child within its parent's ordering (user-ordered lists, §4.3 `move_list`).
    pub fn move_within_parent(&mut self, id: NodeId, to_index: usize) {
        let Some(parent) = self.arena[id.0].parent else { return };
        let siblings = &mut self.arena[parent.0].children;
        let Some(pos) = siblings.iter().position(|&c| c == id) else { return };
        let item = siblings.remove(pos);
        let to_index = to_index.min(siblings.len());
        siblings.insert(to_index, item);
    }

    /// Render every leaf/leaf-list under `parent` (inclusive) as
    /// `(path_suffix_segments, value)` pairs, depth-first, preserving order.
    pub fn walk(&self, start: NodeId) -> Vec<(Vec<NodeId>, &TreeNode)> {
        let mut out = Vec::new();
        self.walk_inner(start, &mut Vec::new(), &mut out);
        out
    }

    fn walk_inner<'a>(&'a self, id: NodeId, path: &mut Vec<NodeId>, out: &mut Vec<(Vec<NodeId>, &'a TreeNode)>) {
        path.push(id);
        out.push((path.clone(), &self.arena[id.0]));
        for &child in &self.arena[id.0].children {
            self.walk_inner(child, path, out);
        }
        path.pop();
    }

    pub fn key_map(&self, id: NodeId) -> IndexMap<String, String> {
        self.arena[id.0].keys.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_and_find_child_round_trips() {
        let mut tree = DataTree::new("test-module");
        let root = tree.root();
        let container = tree.insert_child(root, "location", vec![], Value::Container);
        tree.insert_child(container, "name", vec![], Value::String("Banska Bystrica".into()));
        let found = tree.find_child(container, "name", &[]).unwrap();
        assert_eq!(tree.node(found).value, Value::String("Banska Bystrica".into()));
    }

    #[test]
    fn list_instances_distinguished_by_keys() {
        let mut tree = DataTree::new("test-module");
        let root = tree.root();
        let a = tree.insert_child(root, "user", vec![("name".into(), "A".into())], Value::List);
        let b = tree.insert_child(root, "user", vec![("name".into(), "B".into())], Value::List);
        assert_ne!(a, b);
        assert_eq!(tree.children_named(root, "user").count(), 2);
        assert_eq!(tree.find_child(root, "user", &[("name".into(), "B".into())]), Some(b));
    }

    #[test]
    fn remove_detaches_from_parent_children_list() {
        let mut tree = DataTree::new("test-module");
        let root = tree.root();
        let a = tree.insert_child(root, "leaf", vec![], Value::String("x".into()));
        tree.remove(a);
        assert!(tree.children(root).is_empty());
    }

    #[test]
    fn move_within_parent_reorders_siblings() {
        let mut tree = DataTree::new("test-module");
        let root = tree.root();
        let a = tree.insert_child(root, "user", vec![("name".into(), "A".into())], Value::List);
        let b = tree.insert_child(root, "user", vec![("name".into(), "B".into())], Value::List);
        let c = tree.insert_child(root, "user", vec![("name".into(), "C".into())], Value::List);
        // A down one (swap with B): B, A, C
        tree.move_within_parent(a, 1);
        assert_eq!(tree.children(root).to_vec(), vec![b, a, c]);
        // C up one: B, C, A
        tree.move_within_parent(c, 1);
        assert_eq!(tree.children(root).to_vec(), vec![b, c, a]);
    }
}
