// SPDX-License-Identifier: MIT

//! The schema context: a process-wide registry of installed modules (§3).

use crate::schema::{Module, SchemaFormat};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use sysrepo_core::{ErrorCode, SrError};

/// Summary row returned by `list_schemas` (§4.3).
#[derive(Debug, Clone)]
pub struct SchemaInfo {
    pub module: String,
    pub namespace: String,
    pub prefix: String,
    pub revision: Option<String>,
    pub yang_path: Option<String>,
    pub yin_path: Option<String>,
    pub submodules: Vec<String>,
}

/// Process-wide registry mapping module name to its installed [`Module`].
///
/// Read-mostly: extended only by `install_module`, behind the inner
/// `RwLock` (§5 "Shared resources"). Cheap to clone — it's an `Arc` handle.
#[derive(Clone, Default)]
pub struct SchemaContext {
    modules: Arc<RwLock<HashMap<String, Module>>>,
}

impl SchemaContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install (or replace) a module definition.
    pub fn install_module(&self, module: Module) {
        self.modules.write().insert(module.name.clone(), module);
    }

    pub fn is_installed(&self, module_name: &str) -> bool {
        self.modules.read().contains_key(module_name)
    }

    pub fn list_schemas(&self) -> Vec<SchemaInfo> {
        self.modules
            .read()
            .values()
            .map(|m| SchemaInfo {
                module: m.name.clone(),
                namespace: m.namespace.clone(),
                prefix: m.prefix.clone(),
                revision: m.revision.clone(),
                yang_path: m.yang_path.clone(),
                yin_path: m.yin_path.clone(),
                submodules: m.submodules.clone(),
            })
            .collect()
    }

    pub fn get_schema(&self, module_name: &str, format: SchemaFormat) -> Result<String, SrError> {
        let modules = self.modules.read();
        let module = modules
            .get(module_name)
            .ok_or_else(|| SrError::with_message(ErrorCode::UnknownModel, module_name.to_string()))?;
        Ok(module.render(format))
    }

    pub fn with_module<R>(&self, module_name: &str, f: impl FnOnce(&Module) -> R) -> Result<R, SrError> {
        let modules = self.modules.read();
        let module = modules
            .get(module_name)
            .ok_or_else(|| SrError::with_message(ErrorCode::UnknownModel, module_name.to_string()))?;
        Ok(f(module))
    }

    /// Enable or disable a named feature on an installed module (§4.6
    /// `feature_enable`).
    pub fn set_feature(&self, module_name: &str, feature: &str, on: bool) -> Result<(), SrError> {
        let mut modules = self.modules.write();
        let module = modules
            .get_mut(module_name)
            .ok_or_else(|| SrError::with_message(ErrorCode::UnknownModel, module_name.to_string()))?;
        let entry = module
            .features
            .get_mut(feature)
            .ok_or_else(|| SrError::with_path(ErrorCode::BadElement, "unknown feature", feature))?;
        *entry = on;
        Ok(())
    }

    pub fn module_names(&self) -> Vec<String> {
        self.modules.read().keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{NodeKind, SchemaNode, TypeSpec};
    use indexmap::IndexMap;

    fn sample_module() -> Module {
        Module {
            name: "example-module".into(),
            namespace: "urn:example-module".into(),
            prefix: "ex".into(),
            revision: Some("2024-01-01".into()),
            submodules: Vec::new(),
            yang_path: Some("/schemas/example-module.yang".into()),
            yin_path: None,
            nodes: IndexMap::new(),
            features: IndexMap::new(),
        }
    }

    #[test]
    fn unknown_module_returns_unknown_model() {
        let ctx = SchemaContext::new();
        let err = ctx.get_schema("unknown-model", SchemaFormat::Yang).unwrap_err();
        assert_eq!(err.code, ErrorCode::UnknownModel);
    }

    #[test]
    fn installed_module_is_listed() {
        let ctx = SchemaContext::new();
        ctx.install_module(sample_module());
        let schemas = ctx.list_schemas();
        assert_eq!(schemas.len(), 1);
        assert_eq!(schemas[0].module, "example-module");
    }

    #[test]
    fn set_feature_rejects_unknown_feature_name() {
        let ctx = SchemaContext::new();
        ctx.install_module(sample_module());
        let err = ctx.set_feature("example-module", "nope", true).unwrap_err();
        assert_eq!(err.code, ErrorCode::BadElement);
    }

    #[test]
    fn schema_node_kind_round_trips() {
        let node = SchemaNode::leaf("name", TypeSpec::String, true);
        assert_eq!(node.kind, NodeKind::Leaf);
    }
}
