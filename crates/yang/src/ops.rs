// SPDX-License-Identifier: MIT

//! Path-driven tree operations: `get_item`, `set_item`, `delete_item`,
//! `move_list` (§4.3).

use crate::schema::{Module, NodeKind, SchemaNode};
use crate::tree::{DataTree, NodeId};
use sysrepo_core::{DataPath, EditFlags, ErrorCode, PathSegment, SrError, Value};

/// Walk `segments` against the schema tree rooted at `module`, erroring
/// `BAD_ELEMENT` at the first step with no matching schema node. Returns the
/// matched schema nodes in order, one per segment.
fn schema_path<'m>(module: &'m Module, segments: &[PathSegment]) -> Result<Vec<&'m SchemaNode>, SrError> {
    let mut matched = Vec::with_capacity(segments.len());
    let mut accumulated = String::new();
    let mut current_children: Option<&indexmap::IndexMap<String, SchemaNode>> = None;
    for (i, seg) in segments.iter().enumerate() {
        accumulated.push('/');
        if i == 0 {
            if let Some(m) = &seg.module {
                accumulated.push_str(m);
                accumulated.push(':');
            }
        }
        accumulated.push_str(&seg.name);

        let found = match current_children {
            None => module.nodes.get(&seg.name),
            Some(children) => children.get(&seg.name),
        };
        let Some(node) = found else {
            return Err(SrError::with_path(ErrorCode::BadElement, "unknown schema node", accumulated));
        };
        matched.push(node);
        current_children = Some(&node.children);
    }
    Ok(matched)
}

/// Whether `seg`'s name is a key leaf of the *parent* list segment — such
/// leaves cannot be set or deleted directly (§4.3).
fn is_list_key_step(nodes: &[&SchemaNode], index: usize) -> bool {
    if index == 0 {
        return false;
    }
    let parent = nodes[index - 1];
    parent.kind == NodeKind::List && parent.keys.iter().any(|k| k == &nodes[index].name)
}

/// Find every data node addressed by `path`, returning the full root-to-node
/// chain for each match. An unkeyed list segment (e.g. `/m:list` with no
/// `[key='v']` predicate) matches *every* instance of that list rather than
/// just the first — `get_item`'s single-match behaviour stays the right
/// shape for a fully-keyed lookup, but `get_items`/`get_items_iter` need
/// every instance enumerated. Schema-invalid paths fail with `BAD_ELEMENT`;
/// schema-valid paths with no corresponding data return an empty vec.
pub fn get_item_paths(module: &Module, tree: &DataTree, path: &DataPath) -> Result<Vec<Vec<NodeId>>, SrError> {
    let segments = path.segments().map_err(|e| SrError::with_message(ErrorCode::InvalArg, e.to_string()))?;
    if segments.is_empty() {
        return Ok(vec![vec![tree.root()]]);
    }
    schema_path(module, &segments)?;
    let mut chains: Vec<Vec<NodeId>> = vec![vec![tree.root()]];
    for seg in &segments {
        let keys: Vec<(String, String)> = seg.keys.clone();
        let mut next_chains = Vec::new();
        for chain in &chains {
            let current = *chain.last().expect("chain always has a root");
            if keys.is_empty() {
                for child in tree.children_named(current, &seg.name) {
                    let mut next = chain.clone();
                    next.push(child);
                    next_chains.push(next);
                }
            } else if let Some(child) = tree.find_child(current, &seg.name, &keys) {
                let mut next = chain.clone();
                next.push(child);
                next_chains.push(next);
            }
        }
        chains = next_chains;
        if chains.is_empty() {
            return Ok(Vec::new());
        }
    }
    Ok(chains)
}

/// Find the data node addressed by `path`, if any. Schema-invalid paths
/// fail with `BAD_ELEMENT`; schema-valid paths with no corresponding data
/// return `Ok(None)`.
pub fn get_item(module: &Module, tree: &DataTree, path: &DataPath) -> Result<Option<NodeId>, SrError> {
    let segments = path.segments().map_err(|e| SrError::with_message(ErrorCode::InvalArg, e.to_string()))?;
    if segments.is_empty() {
        return Ok(Some(tree.root()));
    }
    schema_path(module, &segments)?;
    let mut current = tree.root();
    for seg in &segments {
        let keys: Vec<(String, String)> = seg.keys.clone();
        match tree.find_child(current, &seg.name, &keys) {
            Some(next) => current = next,
            None => return Ok(None),
        }
    }
    Ok(Some(current))
}

/// Create or update the node at `path` (§4.3 `set_item`).
pub fn set_item(
    module: &Module,
    tree: &mut DataTree,
    path: &DataPath,
    value: Option<Value>,
    flags: EditFlags,
) -> Result<NodeId, SrError> {
    let segments = path.segments().map_err(|e| SrError::with_message(ErrorCode::InvalArg, e.to_string()))?;
    if segments.is_empty() {
        return Err(SrError::with_message(ErrorCode::InvalArg, "cannot set the tree root"));
    }
    let schema_nodes = schema_path(module, &segments)?;
    if is_list_key_step(&schema_nodes, segments.len() - 1) {
        return Err(SrError::with_path(
            ErrorCode::BadElement,
            "list key leaves cannot be set directly; set the full keyed path",
            path.as_str(),
        ));
    }

    let mut current = tree.root();
    for (i, seg) in segments.iter().enumerate() {
        let is_last = i == segments.len() - 1;
        let keys: Vec<(String, String)> = seg.keys.clone();
        if let Some(next) = tree.find_child(current, &seg.name, &keys) {
            if is_last && flags.contains(EditFlags::STRICT) {
                return Err(SrError::with_path(ErrorCode::DataExists, "node already exists", path.as_str()));
            }
            current = next;
            continue;
        }
        if !is_last && flags.contains(EditFlags::NON_RECURSIVE) {
            return Err(SrError::with_path(
                ErrorCode::DataMissing,
                "missing ancestor and NON_RECURSIVE was set",
                path.as_str(),
            ));
        }
        let schema_node = schema_nodes[i];
        let node_value = if is_last {
            match (schema_node.kind, &value) {
                (NodeKind::Leaf, Some(v)) | (NodeKind::LeafList, Some(v)) => v.clone(),
                (NodeKind::PresenceContainer, _) | (NodeKind::Container, _) => Value::Container,
                (NodeKind::List, _) => Value::List,
                (NodeKind::Leaf, None) | (NodeKind::LeafList, None) => {
                    return Err(SrError::with_path(ErrorCode::InvalArg, "leaf requires a value", path.as_str()))
                }
                (NodeKind::Choice, _) => Value::Container,
            }
        } else {
            match schema_node.kind {
                NodeKind::List => Value::List,
                _ => Value::Container,
            }
        };
        current = tree.insert_child(current, seg.name.clone(), keys.clone(), node_value);
        if is_last && schema_node.kind == NodeKind::List {
            for (k, v) in &keys {
                if let Some(key_schema) = schema_node.children.get(k) {
                    let kv = Value::parse_as(key_schema.type_spec.kind_name().unwrap_or("STRING"), v, 0)
                        .unwrap_or_else(|_| Value::String(v.clone()));
                    tree.insert_child(current, k.clone(), Vec::new(), kv);
                }
            }
        }
    }
    Ok(current)
}

/// Delete the node(s) at `path` (§4.3 `delete_item`).
pub fn delete_item(module: &Module, tree: &mut DataTree, path: &DataPath, flags: EditFlags) -> Result<(), SrError> {
    let segments = path.segments().map_err(|e| SrError::with_message(ErrorCode::InvalArg, e.to_string()))?;
    if segments.is_empty() {
        return Err(SrError::with_message(ErrorCode::InvalArg, "cannot delete the tree root"));
    }
    let schema_nodes = schema_path(module, &segments)?;
    if is_list_key_step(&schema_nodes, segments.len() - 1) {
        return Err(SrError::with_path(
            ErrorCode::BadElement,
            "deleting a list key directly is forbidden; delete the full list instance",
            path.as_str(),
        ));
    }
    match get_item(module, tree, path)? {
        Some(id) => {
            tree.remove(id);
            Ok(())
        }
        None => {
            if flags.contains(EditFlags::STRICT) {
                Err(SrError::with_path(ErrorCode::DataMissing, "node does not exist", path.as_str()))
            } else {
                Ok(())
            }
        }
    }
}

/// Direction for `move_list` on a user-ordered list instance (§4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveDirection {
    Up,
    Down,
    First,
    Last,
}

/// Reorder a user-ordered list instance relative to its siblings.
pub fn move_list(
    module: &Module,
    tree: &mut DataTree,
    path: &DataPath,
    direction: MoveDirection,
) -> Result<(), SrError> {
    let segments = path.segments().map_err(|e| SrError::with_message(ErrorCode::InvalArg, e.to_string()))?;
    let schema_nodes = schema_path(module, &segments)?;
    let Some(last_schema) = schema_nodes.last() else {
        return Err(SrError::with_message(ErrorCode::InvalArg, "move_list requires a list-instance path"));
    };
    if last_schema.kind != NodeKind::List || !last_schema.user_ordered {
        return Err(SrError::with_path(
            ErrorCode::InvalArg,
            "move_list requires a user-ordered list instance",
            path.as_str(),
        ));
    }
    let id = get_item(module, tree, path)?
        .ok_or_else(|| SrError::with_path(ErrorCode::DataMissing, "list instance not found", path.as_str()))?;
    let parent = tree.node(id).parent.expect("list instance always has a parent");
    let siblings = tree.children(parent).to_vec();
    let pos = siblings.iter().position(|&c| c == id).expect("node found via get_item is in its parent's children");
    let to_index = match direction {
        MoveDirection::Up => pos.saturating_sub(1),
        MoveDirection::Down => pos + 1,
        MoveDirection::First => 0,
        MoveDirection::Last => siblings.len(),
    };
    tree.move_within_parent(id, to_index);
    Ok(())
}
