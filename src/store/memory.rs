//! In-memory persistent store
//!
//! Two maps: `durable` holds saved records, `working` holds records written
//! since the last save. Reads see the working copy first.

use std::collections::{HashMap, HashSet};

use crate::item::{NodeId, PropertyState, QName, REP_ROOT};

use super::{NodeRecord, PersistentStore, StoreError, StoreResult};

/// Reference `PersistentStore` backed by hash maps.
#[derive(Debug, Clone)]
pub struct InMemoryStore {
    root: NodeId,
    durable: HashMap<NodeId, NodeRecord>,
    working: HashMap<NodeId, NodeRecord>,
}

impl InMemoryStore {
    /// Creates a store holding only a durable root node of type `rep:root`.
    pub fn new() -> Self {
        Self::with_root_type(REP_ROOT)
    }

    /// Creates a store whose durable root has the given type.
    pub fn with_root_type(root_type: QName) -> Self {
        let root = NodeId::new_v4();
        let mut record = NodeRecord::new(root, QName::local(""), None, root_type);
        record.set_revision(1);

        let mut durable = HashMap::new();
        durable.insert(root, record);

        Self {
            root,
            durable,
            working: HashMap::new(),
        }
    }

    /// Number of records in durable state.
    pub fn durable_len(&self) -> usize {
        self.durable.len()
    }

    /// Number of records in the working set.
    pub fn working_len(&self) -> usize {
        self.working.len()
    }

    /// Returns true if the node has durable state.
    pub fn is_durable(&self, id: NodeId) -> bool {
        self.durable.contains_key(&id)
    }

    fn current(&self, id: NodeId) -> Option<&NodeRecord> {
        self.working.get(&id).or_else(|| self.durable.get(&id))
    }

    fn working_copy(&mut self, id: NodeId) -> StoreResult<&mut NodeRecord> {
        if !self.working.contains_key(&id) {
            let durable = self
                .durable
                .get(&id)
                .cloned()
                .ok_or_else(|| StoreError::not_found(id))?;
            self.working.insert(id, durable);
        }
        self.working
            .get_mut(&id)
            .ok_or_else(|| StoreError::not_found(id))
    }

    /// New (never saved) working records below any of `roots`.
    fn new_descendants(&self, roots: &HashSet<NodeId>) -> HashSet<NodeId> {
        let mut found: HashSet<NodeId> = HashSet::new();
        loop {
            let before = found.len();
            for (id, record) in &self.working {
                if self.durable.contains_key(id) || found.contains(id) {
                    continue;
                }
                if let Some(parent) = record.parent() {
                    if roots.contains(&parent) || found.contains(&parent) {
                        found.insert(*id);
                    }
                }
            }
            if found.len() == before {
                return found;
            }
        }
    }

    fn check_integrity(&self) -> StoreResult<()> {
        for record in self.working.values() {
            for child in record.children() {
                if self.current(child.id).is_none() {
                    return Err(StoreError::data_corruption(format!(
                        "Dangling child entry '{}' -> {}",
                        child.name, child.id
                    ))
                    .with_details(format!("parent: {}", record.id())));
                }
            }
        }
        Ok(())
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl PersistentStore for InMemoryStore {
    fn root(&self) -> NodeId {
        self.root
    }

    fn get_node(&self, id: NodeId) -> StoreResult<NodeRecord> {
        self.current(id)
            .cloned()
            .ok_or_else(|| StoreError::not_found(id))
    }

    fn exists(&self, id: NodeId) -> bool {
        self.current(id).is_some()
    }

    fn create_child_with_id(
        &mut self,
        parent: NodeId,
        name: &QName,
        node_type: &QName,
        id: NodeId,
    ) -> StoreResult<NodeId> {
        if self.exists(id) {
            return Err(StoreError::write_failed(format!(
                "Node {} already exists",
                id
            )));
        }
        self.working_copy(parent)?.add_child(name.clone(), id);
        self.working.insert(
            id,
            NodeRecord::new(id, name.clone(), Some(parent), node_type.clone()),
        );
        Ok(id)
    }

    fn set_property(&mut self, node: NodeId, property: PropertyState) -> StoreResult<()> {
        self.working_copy(node)?.set_property(property);
        Ok(())
    }

    fn remove_property(&mut self, node: NodeId, name: &QName) -> StoreResult<bool> {
        if self
            .current(node)
            .ok_or_else(|| StoreError::not_found(node))?
            .property(name)
            .is_none()
        {
            return Ok(false);
        }
        Ok(self.working_copy(node)?.remove_property(name))
    }

    fn reload(&mut self, node: NodeId) -> StoreResult<()> {
        let record = self
            .current(node)
            .cloned()
            .ok_or_else(|| StoreError::not_found(node))?;

        let mut discarded = HashSet::new();
        discarded.insert(node);
        let orphans = self.new_descendants(&discarded);

        self.working.remove(&node);
        for orphan in orphans {
            self.working.remove(&orphan);
        }

        // A node without durable state is gone; unlink it from its parent.
        if !self.durable.contains_key(&node) {
            if let Some(parent) = record.parent() {
                if let Some(parent_record) = self.working.get_mut(&parent) {
                    parent_record.remove_child(node);
                }
            }
        }
        Ok(())
    }

    fn save(&mut self) -> StoreResult<usize> {
        self.check_integrity()?;

        let count = self.working.len();
        for (id, mut record) in self.working.drain() {
            let revision = self.durable.get(&id).map(|r| r.revision()).unwrap_or(0) + 1;
            record.set_revision(revision);
            self.durable.insert(id, record);
        }
        Ok(count)
    }

    fn has_pending_changes(&self) -> bool {
        !self.working.is_empty()
    }
}
