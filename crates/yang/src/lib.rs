// SPDX-License-Identifier: MIT

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! sysrepo-yang: the minimal schema model, arena-allocated data tree, and
//! path-driven operations the Data Manager builds on.
//!
//! This crate deliberately does not parse YANG/YIN source text — the engine
//! spec treats the YANG/XPath library as an external black box. What it
//! provides instead is the concrete schema and tree representation that
//! black box would hand back: modules are registered programmatically (or
//! via [`context::SchemaContext`]'s JSON schema-description format).

pub mod context;
pub mod ops;
pub mod schema;
pub mod tree;
pub mod validate;

pub use context::{SchemaContext, SchemaInfo};
pub use ops::{delete_item, get_item, get_item_paths, move_list, set_item, MoveDirection};
pub use schema::{Module, NodeKind, SchemaFormat, SchemaNode, TypeSpec};
pub use tree::{DataTree, NodeId, TreeNode};
pub use validate::validate;
