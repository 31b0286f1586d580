//! Persistent State Store
//!
//! The durable, id-addressed node/property state consumed by the
//! versioning engine and by sessions. Nodes are arena records addressed by
//! `NodeId`; there are no live handles.
//!
//! Writes go to a working set first. `save` makes the working set durable,
//! `reload` throws away the working copy of one node (and any new nodes
//! that hung below it) and falls back to its durable state.
//!
//! `InMemoryStore` is the reference implementation.

mod errors;
mod memory;

pub use errors::{Severity, StoreError, StoreErrorCode, StoreResult};
pub use memory::InMemoryStore;

use serde::Serialize;

use crate::item::{NodeId, PropertyState, QName};

/// Ordered entry in a node's child list
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChildEntry {
    pub name: QName,
    pub id: NodeId,
}

/// A persisted node.
///
/// `revision` counts how many times this record was made durable. A record
/// that only exists in the working set has revision 0.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeRecord {
    id: NodeId,
    name: QName,
    parent: Option<NodeId>,
    primary_type: QName,
    properties: Vec<PropertyState>,
    children: Vec<ChildEntry>,
    revision: u64,
}

impl NodeRecord {
    /// Creates an empty record.
    pub fn new(id: NodeId, name: QName, parent: Option<NodeId>, primary_type: QName) -> Self {
        Self {
            id,
            name,
            parent,
            primary_type,
            properties: Vec::new(),
            children: Vec::new(),
            revision: 0,
        }
    }

    #[inline]
    pub fn id(&self) -> NodeId {
        self.id
    }

    #[inline]
    pub fn name(&self) -> &QName {
        &self.name
    }

    #[inline]
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    #[inline]
    pub fn primary_type(&self) -> &QName {
        &self.primary_type
    }

    /// Properties in insertion order.
    #[inline]
    pub fn properties(&self) -> &[PropertyState] {
        &self.properties
    }

    /// Child entries in document order.
    #[inline]
    pub fn children(&self) -> &[ChildEntry] {
        &self.children
    }

    #[inline]
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Looks up a property by name.
    pub fn property(&self, name: &QName) -> Option<&PropertyState> {
        self.properties.iter().find(|p| p.name() == name)
    }

    /// Looks up the first child with the given name.
    pub fn child(&self, name: &QName) -> Option<&ChildEntry> {
        self.children.iter().find(|c| &c.name == name)
    }

    /// Sets a property, replacing an existing one in place.
    pub fn set_property(&mut self, property: PropertyState) {
        match self
            .properties
            .iter_mut()
            .find(|p| p.name() == property.name())
        {
            Some(existing) => *existing = property,
            None => self.properties.push(property),
        }
    }

    /// Removes a property. Returns true if it existed.
    pub fn remove_property(&mut self, name: &QName) -> bool {
        let before = self.properties.len();
        self.properties.retain(|p| p.name() != name);
        before != self.properties.len()
    }

    /// Appends a child entry.
    pub fn add_child(&mut self, name: QName, id: NodeId) {
        self.children.push(ChildEntry { name, id });
    }

    /// Removes the child entry with the given id. Returns true if it existed.
    pub fn remove_child(&mut self, id: NodeId) -> bool {
        let before = self.children.len();
        self.children.retain(|c| c.id != id);
        before != self.children.len()
    }

    pub(crate) fn set_revision(&mut self, revision: u64) {
        self.revision = revision;
    }
}

/// Durable node/property state.
///
/// Implementations must keep every write in a working set until `save`,
/// and must support `reload` of a single node from durable state.
pub trait PersistentStore {
    /// Returns the root node id.
    fn root(&self) -> NodeId;

    /// Returns the current (working or durable) state of a node.
    fn get_node(&self, id: NodeId) -> StoreResult<NodeRecord>;

    /// Returns true if the node exists in working or durable state.
    fn exists(&self, id: NodeId) -> bool;

    /// Creates a child node with the given identity.
    fn create_child_with_id(
        &mut self,
        parent: NodeId,
        name: &QName,
        node_type: &QName,
        id: NodeId,
    ) -> StoreResult<NodeId>;

    /// Sets a property on a node.
    fn set_property(&mut self, node: NodeId, property: PropertyState) -> StoreResult<()>;

    /// Removes a property. Returns true if it existed.
    fn remove_property(&mut self, node: NodeId, name: &QName) -> StoreResult<bool>;

    /// Discards the working copy of a node and falls back to its durable
    /// state. A node that was never saved ceases to exist.
    fn reload(&mut self, node: NodeId) -> StoreResult<()>;

    /// Makes the working set durable. Returns the number of records saved.
    fn save(&mut self) -> StoreResult<usize>;

    /// Returns true if the working set is not empty.
    fn has_pending_changes(&self) -> bool;

    /// Creates a child node with a fresh identity.
    fn create_child(&mut self, parent: NodeId, name: &QName, node_type: &QName) -> StoreResult<NodeId> {
        self.create_child_with_id(parent, name, node_type, NodeId::new_v4())
    }

    /// Returns all properties of a node in insertion order.
    fn get_properties(&self, node: NodeId) -> StoreResult<Vec<PropertyState>> {
        Ok(self.get_node(node)?.properties().to_vec())
    }

    /// Returns one property of a node.
    fn get_property(&self, node: NodeId, name: &QName) -> StoreResult<Option<PropertyState>> {
        Ok(self.get_node(node)?.property(name).cloned())
    }

    /// Returns the durable revision of a node.
    fn revision(&self, node: NodeId) -> StoreResult<u64> {
        Ok(self.get_node(node)?.revision())
    }

    /// Returns the slash-separated path of a node.
    fn path(&self, node: NodeId) -> StoreResult<String> {
        let mut segments = Vec::new();
        let mut current = self.get_node(node)?;
        while let Some(parent) = current.parent() {
            segments.push(current.name().to_string());
            current = self.get_node(parent)?;
        }
        segments.reverse();
        Ok(format!("/{}", segments.join("/")))
    }
}
