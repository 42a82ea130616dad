// SPDX-License-Identifier: MIT

//! Full-tree validation (§4.3 `validate`): mandatory leaves present, list
//! keys unique among siblings, leaf values conform to their declared type.

use crate::schema::{Module, NodeKind, SchemaNode};
use crate::tree::{DataTree, NodeId};
use std::collections::HashSet;
use sysrepo_core::{ErrorCode, SrError};

/// Validate `tree` against `module`'s schema, starting from the module's
/// top-level nodes. Returns every violation found (not just the first), so
/// callers can report the complete set (§8 scenario 2: "listing `latitude`
/// and `longitude` as missing").
pub fn validate(module: &Module, tree: &DataTree) -> Vec<SrError> {
    let mut errors = Vec::new();
    let root = tree.root();
    for (name, schema_node) in &module.nodes {
        validate_node(schema_node, tree, root, &format!("/{}:{}", module.name, name), &mut errors);
    }
    errors
}

fn validate_node(schema: &SchemaNode, tree: &DataTree, parent: NodeId, path: &str, errors: &mut Vec<SrError>) {
    let instances: Vec<NodeId> = tree.children_named(parent, &schema.name).collect();

    if instances.is_empty() {
        return;
    }

    if schema.kind == NodeKind::List {
        let mut seen = HashSet::new();
        for &inst in &instances {
            let keys = tree.key_map(inst);
            let key_tuple: Vec<String> = schema.keys.iter().map(|k| keys.get(k).cloned().unwrap_or_default()).collect();
            if !seen.insert(key_tuple.clone()) {
                errors.push(SrError::with_path(
                    ErrorCode::ValidationFailed,
                    format!("duplicate list key {:?}", key_tuple),
                    path.to_string(),
                ));
            }
        }
    }

    for &inst in &instances {
        for (child_name, child_schema) in &schema.children {
            if schema.kind == NodeKind::List && schema.keys.iter().any(|k| k == child_name) {
                continue;
            }
            let child_path = format!("{path}/{child_name}");
            if child_schema.mandatory && tree.find_child(inst, child_name, &[]).is_none() {
                errors.push(SrError::with_path(
                    ErrorCode::ValidationFailed,
                    format!("mandatory leaf {child_name:?} missing"),
                    child_path.clone(),
                ));
            }
            validate_node(child_schema, tree, inst, &child_path, errors);
        }
        if schema.kind == NodeKind::Leaf || schema.kind == NodeKind::LeafList {
            let value = &tree.node(inst).value;
            if !schema.type_spec.accepts(value) {
                errors.push(SrError::with_path(
                    ErrorCode::ValidationFailed,
                    format!("value does not conform to declared type for {:?}", schema.name),
                    path.to_string(),
                ));
            }
        }
    }
}
