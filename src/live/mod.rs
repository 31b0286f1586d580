//! Live tree access
//!
//! The checkin algorithm reads the current working tree through `LiveTree`.
//! A `LiveNode` is an owned snapshot of one node: its types, its
//! referenceability and versionability, and every property and child
//! together with the OnParentVersion action of its definition.
//!
//! Node-type introspection is external; it is consumed through
//! `ItemDefinitions`. `StaticDefinitions` is a table-driven implementation.

mod definitions;

pub use definitions::{ItemDefinitions, StaticDefinitions};

use std::collections::HashMap;

use crate::item::{
    NodeId, OnParentVersionAction, PropertyState, QName, Value, JCR_BASE_VERSION,
    JCR_MIXIN_TYPES, JCR_VERSION_HISTORY, MIX_REFERENCEABLE, MIX_VERSIONABLE,
};
use crate::store::{NodeRecord, PersistentStore, StoreError, StoreResult};

/// Version bookkeeping of a versionable node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VersionableInfo {
    /// The node's version history.
    pub version_history: NodeId,
    /// The version the node is currently based on.
    pub base_version: NodeId,
}

/// A property of a live node with its checkin policy.
#[derive(Debug, Clone, PartialEq)]
pub struct LiveProperty {
    pub state: PropertyState,
    pub opv: OnParentVersionAction,
}

/// A child entry of a live node with its checkin policy.
#[derive(Debug, Clone, PartialEq)]
pub struct LiveChild {
    pub name: QName,
    pub id: NodeId,
    pub opv: OnParentVersionAction,
}

/// Snapshot of a node in the working tree.
#[derive(Debug, Clone, PartialEq)]
pub struct LiveNode {
    pub id: NodeId,
    pub name: QName,
    pub path: String,
    pub primary_type: QName,
    pub mixin_types: Vec<QName>,
    pub referenceable: bool,
    /// `Some` only for versionable nodes that already have a history.
    pub versionable: Option<VersionableInfo>,
    pub properties: Vec<LiveProperty>,
    /// In document order.
    pub children: Vec<LiveChild>,
}

/// Read access to the working tree.
pub trait LiveTree {
    /// Returns a snapshot of the node.
    fn node(&self, id: NodeId) -> StoreResult<LiveNode>;
}

impl LiveTree for HashMap<NodeId, LiveNode> {
    fn node(&self, id: NodeId) -> StoreResult<LiveNode> {
        self.get(&id).cloned().ok_or_else(|| StoreError::not_found(id))
    }
}

/// Mixin types recorded in `jcr:mixinTypes`.
pub fn mixin_types(record: &NodeRecord) -> Vec<QName> {
    record
        .property(&JCR_MIXIN_TYPES)
        .map(|p| p.values().iter().filter_map(Value::as_name).cloned().collect())
        .unwrap_or_default()
}

fn reference(record: &NodeRecord, name: &QName) -> Option<NodeId> {
    record
        .property(name)
        .and_then(PropertyState::first)
        .and_then(Value::as_reference)
}

/// `LiveTree` over a persistent store and a set of item definitions.
pub struct WorkspaceTree<'a> {
    store: &'a dyn PersistentStore,
    definitions: &'a dyn ItemDefinitions,
}

impl<'a> WorkspaceTree<'a> {
    pub fn new(store: &'a dyn PersistentStore, definitions: &'a dyn ItemDefinitions) -> Self {
        Self { store, definitions }
    }
}

impl LiveTree for WorkspaceTree<'_> {
    fn node(&self, id: NodeId) -> StoreResult<LiveNode> {
        let record = self.store.get_node(id)?;
        let path = self.store.path(id)?;

        let versionable = if self.definitions.is_node_type(&record, &MIX_VERSIONABLE) {
            match (
                reference(&record, &JCR_VERSION_HISTORY),
                reference(&record, &JCR_BASE_VERSION),
            ) {
                (Some(version_history), Some(base_version)) => Some(VersionableInfo {
                    version_history,
                    base_version,
                }),
                _ => None,
            }
        } else {
            None
        };

        let properties = record
            .properties()
            .iter()
            .map(|p| LiveProperty {
                state: p.clone(),
                opv: self.definitions.property_opv(&record, p.name()),
            })
            .collect();

        let mut children = Vec::with_capacity(record.children().len());
        for entry in record.children() {
            let child = self.store.get_node(entry.id)?;
            children.push(LiveChild {
                name: entry.name.clone(),
                id: entry.id,
                opv: self.definitions.child_opv(&record, &child),
            });
        }

        Ok(LiveNode {
            id,
            name: record.name().clone(),
            path,
            primary_type: record.primary_type().clone(),
            mixin_types: mixin_types(&record),
            referenceable: self.definitions.is_node_type(&record, &MIX_REFERENCEABLE),
            versionable,
            properties,
            children,
        })
    }
}
