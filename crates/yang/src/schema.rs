// SPDX-License-Identifier: MIT

//! In-memory schema model: modules, schema nodes, and their types.
//!
//! This crate does not parse YANG/YIN source text — per the engine's
//! external-collaborator boundary, that belongs to a real schema library.
//! Modules are registered programmatically (or loaded from the small JSON
//! schema-description format this crate defines) and retained for the
//! lifetime of the schema context.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use sysrepo_core::Value;

/// The kind of a schema node, restricted to what §3's Data tree glossary
/// names: container, presence container, list, leaf, leaf-list, choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeKind {
    Container,
    PresenceContainer,
    List,
    Leaf,
    LeafList,
    Choice,
}

/// A node's declared type, used for coercion (`Value::parse_as`) and
/// validation. Mirrors `sysrepo_core::Value`'s discriminants one-to-one for
/// scalar kinds; containers/lists carry no type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TypeSpec {
    None,
    String,
    Binary,
    Enum(Vec<String>),
    Bits(Vec<String>),
    Bool,
    Empty,
    IdentityRef,
    InstanceId,
    Int8,
    Int16,
    Int32,
    Int64,
    Uint8,
    Uint16,
    Uint32,
    Uint64,
    Decimal64 { fraction_digits: u8 },
}

impl TypeSpec {
    /// The `Value::kind_name()` string this type coerces to, or `None` for
    /// container/list nodes which carry no scalar value.
    pub fn kind_name(&self) -> Option<&'static str> {
        Some(match self {
            TypeSpec::None => return None,
            TypeSpec::String => "STRING",
            TypeSpec::Binary => "BINARY",
            TypeSpec::Enum(_) => "ENUM",
            TypeSpec::Bits(_) => "BITS",
            TypeSpec::Bool => "BOOL",
            TypeSpec::Empty => "EMPTY",
            TypeSpec::IdentityRef => "IDENTITYREF",
            TypeSpec::InstanceId => "INSTANCE_ID",
            TypeSpec::Int8 => "INT8",
            TypeSpec::Int16 => "INT16",
            TypeSpec::Int32 => "INT32",
            TypeSpec::Int64 => "INT64",
            TypeSpec::Uint8 => "UINT8",
            TypeSpec::Uint16 => "UINT16",
            TypeSpec::Uint32 => "UINT32",
            TypeSpec::Uint64 => "UINT64",
            TypeSpec::Decimal64 { .. } => "DECIMAL64",
        })
    }

    pub fn fraction_digits(&self) -> u8 {
        match self {
            TypeSpec::Decimal64 { fraction_digits } => *fraction_digits,
            _ => 0,
        }
    }

    /// Whether `value` conforms to this type (§3 data tree invariant (i)).
    pub fn accepts(&self, value: &Value) -> bool {
        match (self, value) {
            (TypeSpec::None, Value::Container | Value::List) => true,
            (TypeSpec::String, Value::String(_)) => true,
            (TypeSpec::Binary, Value::Binary(_)) => true,
            (TypeSpec::Enum(variants), Value::Enum(v)) => variants.iter().any(|x| x == v),
            (TypeSpec::Bits(allowed), Value::Bits(bits)) => bits.iter().all(|b| allowed.contains(b)),
            (TypeSpec::Bool, Value::Bool(_)) => true,
            (TypeSpec::Empty, Value::Empty) => true,
            (TypeSpec::IdentityRef, Value::IdentityRef(_)) => true,
            (TypeSpec::InstanceId, Value::InstanceId(_)) => true,
            (TypeSpec::Int8, Value::Int8(_)) => true,
            (TypeSpec::Int16, Value::Int16(_)) => true,
            (TypeSpec::Int32, Value::Int32(_)) => true,
            (TypeSpec::Int64, Value::Int64(_)) => true,
            (TypeSpec::Uint8, Value::Uint8(_)) => true,
            (TypeSpec::Uint16, Value::Uint16(_)) => true,
            (TypeSpec::Uint32, Value::Uint32(_)) => true,
            (TypeSpec::Uint64, Value::Uint64(_)) => true,
            (TypeSpec::Decimal64 { fraction_digits }, Value::Decimal64 { scale, .. }) => scale == fraction_digits,
            _ => false,
        }
    }
}

/// A single node in a module's schema tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaNode {
    pub name: String,
    pub kind: NodeKind,
    #[serde(default)]
    pub type_spec: TypeSpec,
    pub mandatory: bool,
    /// For `List` nodes: the ordered names of the key leaves.
    #[serde(default)]
    pub keys: Vec<String>,
    /// For `List`/`LeafList` nodes: whether insertion order is semantically
    /// meaningful (`ordered-by user`) vs free for the store to reorder.
    #[serde(default)]
    pub user_ordered: bool,
    #[serde(default)]
    pub children: IndexMap<String, SchemaNode>,
}

impl Default for TypeSpec {
    fn default() -> Self {
        TypeSpec::None
    }
}

impl SchemaNode {
    pub fn leaf(name: impl Into<String>, type_spec: TypeSpec, mandatory: bool) -> Self {
        Self {
            name: name.into(),
            kind: NodeKind::Leaf,
            type_spec,
            mandatory,
            keys: Vec::new(),
            user_ordered: false,
            children: IndexMap::new(),
        }
    }

    pub fn container(name: impl Into<String>, children: impl IntoIterator<Item = SchemaNode>) -> Self {
        Self {
            name: name.into(),
            kind: NodeKind::Container,
            type_spec: TypeSpec::None,
            mandatory: false,
            keys: Vec::new(),
            user_ordered: false,
            children: children.into_iter().map(|c| (c.name.clone(), c)).collect(),
        }
    }

    pub fn list(
        name: impl Into<String>,
        keys: Vec<String>,
        user_ordered: bool,
        children: impl IntoIterator<Item = SchemaNode>,
    ) -> Self {
        Self {
            name: name.into(),
            kind: NodeKind::List,
            type_spec: TypeSpec::None,
            mandatory: false,
            keys,
            user_ordered,
            children: children.into_iter().map(|c| (c.name.clone(), c)).collect(),
        }
    }

    pub fn child(&self, name: &str) -> Option<&SchemaNode> {
        self.children.get(name)
    }
}

/// A registered YANG module: namespace/prefix metadata plus its root nodes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Module {
    pub name: String,
    pub namespace: String,
    pub prefix: String,
    pub revision: Option<String>,
    #[serde(default)]
    pub submodules: Vec<String>,
    #[serde(default)]
    pub yang_path: Option<String>,
    #[serde(default)]
    pub yin_path: Option<String>,
    #[serde(default)]
    pub nodes: IndexMap<String, SchemaNode>,
    /// Features declared by this module that can be toggled on/off
    /// (`module_install`/`feature_enable`, §4.6).
    #[serde(default)]
    pub features: IndexMap<String, bool>,
}

impl Module {
    pub fn root(&self, name: &str) -> Option<&SchemaNode> {
        self.nodes.get(name)
    }

    /// A YANG/YIN source rendering sufficient for `get_schema` — this is a
    /// descriptive summary, not round-trippable YANG grammar, since actual
    /// YANG generation belongs to the external schema library.
    pub fn render(&self, format: SchemaFormat) -> String {
        match format {
            SchemaFormat::Yang => format!(
                "module {} {{\n  namespace \"{}\";\n  prefix \"{}\";\n}}\n",
                self.name, self.namespace, self.prefix
            ),
            SchemaFormat::Yin => format!(
                "<module name=\"{}\"><namespace uri=\"{}\"/><prefix value=\"{}\"/></module>\n",
                self.name, self.namespace, self.prefix
            ),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaFormat {
    Yang,
    Yin,
}
