//! JSON content files
//!
//! ```json
//! {
//!   "definitions": {
//!     "default": "COPY",
//!     "properties": { "secret": "ABORT" },
//!     "children": { "cache": "IGNORE" }
//!   },
//!   "nodes": [
//!     {
//!       "name": "doc",
//!       "type": "nt:unstructured",
//!       "mixins": ["mix:versionable"],
//!       "properties": {
//!         "title": "Hello",
//!         "count": 3,
//!         "tags": ["a", "b"],
//!         "published": { "type": "Date", "value": "2024-01-01T00:00:00Z" }
//!       },
//!       "children": []
//!     }
//!   ]
//! }
//! ```
//!
//! Plain JSON strings, integers, floats and booleans map to STRING, LONG,
//! DOUBLE and BOOLEAN. Objects carry an explicit `type` and `value`.
//! Arrays become multi-valued properties.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::Deserialize;
use serde_json::{Map, Value as JsonValue};

use crate::item::{
    NodeId, OnParentVersionAction, PropertyState, PropertyType, QName, Value, MIX_VERSIONABLE,
    NT_UNSTRUCTURED,
};
use crate::live::StaticDefinitions;
use crate::session::Session;

use super::errors::{CliError, CliResult};

/// Name-based OnParentVersion rules.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DefinitionRules {
    /// Action for items without a rule (default COPY)
    pub default: Option<OnParentVersionAction>,
    pub properties: BTreeMap<String, OnParentVersionAction>,
    pub children: BTreeMap<String, OnParentVersionAction>,
}

/// One node of a content file.
#[derive(Debug, Clone, Deserialize)]
pub struct ContentNode {
    pub name: QName,
    #[serde(rename = "type", default = "default_node_type")]
    pub node_type: QName,
    #[serde(default)]
    pub mixins: Vec<QName>,
    /// Properties in document order
    #[serde(default)]
    pub properties: Map<String, JsonValue>,
    #[serde(default)]
    pub children: Vec<ContentNode>,
}

fn default_node_type() -> QName {
    NT_UNSTRUCTURED
}

/// A content file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Content {
    #[serde(default)]
    pub definitions: DefinitionRules,
    #[serde(default)]
    pub nodes: Vec<ContentNode>,
}

impl Content {
    pub fn load(path: &Path) -> CliResult<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|e| CliError::content_error(format!("Failed to read content: {}", e)))?;
        Self::parse(&raw)
    }

    pub fn parse(raw: &str) -> CliResult<Self> {
        serde_json::from_str(raw)
            .map_err(|e| CliError::content_error(format!("Invalid content JSON: {}", e)))
    }

    /// Built-in definitions extended with the file's rules.
    pub fn definitions(&self) -> CliResult<StaticDefinitions> {
        let rules = &self.definitions;
        let mut definitions = StaticDefinitions::builtin();
        if let Some(default) = rules.default {
            definitions = definitions.with_default_action(default);
        }
        for (name, action) in &rules.properties {
            definitions = definitions.with_property_rule(QName::parse(name)?, *action);
        }
        for (name, action) in &rules.children {
            definitions = definitions.with_child_rule(QName::parse(name)?, *action);
        }
        Ok(definitions)
    }
}

/// Adds `nodes` below `parent` in the session. Returns the new ids in
/// document order, parents before children. Nothing is saved.
pub fn import(session: &mut Session, parent: NodeId, nodes: &[ContentNode]) -> CliResult<Vec<NodeId>> {
    let mut created = Vec::new();
    for node in nodes {
        import_node(session, parent, node, &mut created)?;
    }
    Ok(created)
}

fn import_node(
    session: &mut Session,
    parent: NodeId,
    node: &ContentNode,
    created: &mut Vec<NodeId>,
) -> CliResult<()> {
    let id = session.add_node(parent, node.name.clone(), node.node_type.clone())?;
    created.push(id);
    for mixin in &node.mixins {
        session.add_mixin(id, mixin.clone())?;
    }
    for (name, raw) in &node.properties {
        session.set_property(id, property_state(QName::parse(name)?, raw)?)?;
    }
    for child in &node.children {
        import_node(session, id, child, created)?;
    }
    Ok(())
}

/// Creates version histories for the versionable nodes among `ids`.
/// The nodes must be saved.
pub fn create_version_histories(session: &mut Session, ids: &[NodeId]) -> CliResult<usize> {
    let mut count = 0;
    for id in ids {
        let record = session.node(*id)?;
        if session
            .repository()
            .definitions()
            .is_node_type(&record, &MIX_VERSIONABLE)
        {
            session.add_version_history(*id)?;
            count += 1;
        }
    }
    Ok(count)
}

/// Converts a JSON property value.
pub fn property_state(name: QName, raw: &JsonValue) -> CliResult<PropertyState> {
    match raw {
        JsonValue::Array(items) => {
            let values = items
                .iter()
                .map(|item| value(&name, item))
                .collect::<CliResult<Vec<_>>>()?;
            let property_type = values
                .first()
                .map(Value::property_type)
                .unwrap_or(PropertyType::String);
            if values.iter().any(|v| v.property_type() != property_type) {
                return Err(CliError::content_error(format!(
                    "Property '{}' mixes value types",
                    name
                )));
            }
            Ok(PropertyState::multiple(name, property_type, values))
        }
        other => {
            let value = value(&name, other)?;
            Ok(PropertyState::single(name, value))
        }
    }
}

fn value(name: &QName, raw: &JsonValue) -> CliResult<Value> {
    match raw {
        JsonValue::String(s) => Ok(Value::String(s.clone())),
        JsonValue::Bool(b) => Ok(Value::Boolean(*b)),
        JsonValue::Number(n) => match n.as_i64() {
            Some(i) => Ok(Value::Long(i)),
            None => n.as_f64().map(Value::Double).ok_or_else(|| {
                CliError::content_error(format!("Property '{}': unsupported number {}", name, n))
            }),
        },
        JsonValue::Object(_) => serde_json::from_value(raw.clone()).map_err(|e| {
            CliError::content_error(format!("Property '{}': invalid typed value: {}", name, e))
        }),
        JsonValue::Null | JsonValue::Array(_) => Err(CliError::content_error(format!(
            "Property '{}': unsupported value {}",
            name, raw
        ))),
    }
}
