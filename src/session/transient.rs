//! Transient item state
//!
//! Per-session overlay of pending modifications, keyed by `ItemId`. An
//! entry is created on the first in-session mutation of an item, read in
//! preference to persistent state, and destroyed when the session saves
//! (promoted) or refreshes without keeping changes (discarded).
//!
//! The manager is owned by exactly one session and never locked.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::item::{ItemId, NodeId, PropertyState, QName};
use crate::store::{NodeRecord, PersistentStore};

/// What a transient entry does to persistent state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemStatus {
    /// Item does not exist persistently yet
    New,
    /// Item exists persistently and is overlaid
    Modified,
    /// Item exists persistently and is removed
    Removed,
}

impl ItemStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemStatus::New => "NEW",
            ItemStatus::Modified => "MODIFIED",
            ItemStatus::Removed => "REMOVED",
        }
    }
}

impl fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Overlaid item content.
#[derive(Debug, Clone, PartialEq)]
pub enum ItemData {
    Node(NodeRecord),
    /// For `Removed`, the last known state of the property.
    Property(PropertyState),
}

/// One overlay entry.
#[derive(Debug, Clone, PartialEq)]
pub struct TransientItemState {
    id: ItemId,
    status: ItemStatus,
    data: ItemData,
    base_revision: Option<u64>,
    seq: u64,
}

impl TransientItemState {
    pub fn id(&self) -> &ItemId {
        &self.id
    }

    pub fn status(&self) -> ItemStatus {
        self.status
    }

    pub fn data(&self) -> &ItemData {
        &self.data
    }

    /// Revision of the persistent node the overlay was based on.
    /// `None` for new nodes.
    pub fn base_revision(&self) -> Option<u64> {
        self.base_revision
    }

    /// Creation order within the session.
    pub fn seq(&self) -> u64 {
        self.seq
    }

    pub fn as_node(&self) -> Option<&NodeRecord> {
        match self.data {
            ItemData::Node(ref record) => Some(record),
            ItemData::Property(_) => None,
        }
    }

    pub fn as_property(&self) -> Option<&PropertyState> {
        match self.data {
            ItemData::Property(ref state) => Some(state),
            ItemData::Node(_) => None,
        }
    }
}

/// Observer of overlay lifecycle.
pub trait ItemStateListener: Send + Sync {
    fn state_created(&self, _state: &TransientItemState) {}

    fn state_disposed(&self, _state: &TransientItemState) {}
}

/// Session-owned overlay of transient item states.
#[derive(Default)]
pub struct TransientStateManager {
    entries: HashMap<ItemId, TransientItemState>,
    next_seq: u64,
    listeners: Vec<Arc<dyn ItemStateListener>>,
}

impl fmt::Debug for TransientStateManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransientStateManager")
            .field("entries", &self.entries.len())
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl TransientStateManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_listener(&mut self, listener: Arc<dyn ItemStateListener>) {
        self.listeners.push(listener);
    }

    /// Records a node that has no persistent state.
    pub fn create_node(&mut self, record: NodeRecord) {
        let id = ItemId::Node(record.id());
        self.put(id, ItemStatus::New, ItemData::Node(record), None);
    }

    /// Overlays a node. A node that is already transient keeps its status
    /// and base revision; otherwise `base_revision` is recorded.
    pub fn modify_node(&mut self, record: NodeRecord, base_revision: u64) {
        let id = ItemId::Node(record.id());
        match self.entries.get_mut(&id) {
            Some(entry) => entry.data = ItemData::Node(record),
            None => self.put(id, ItemStatus::Modified, ItemData::Node(record), Some(base_revision)),
        }
    }

    /// Overlays a property value.
    ///
    /// `base_revision` is the persistent revision of the owning node, `None`
    /// if the owner is itself new. `exists` tells whether the property has
    /// persistent state.
    pub fn set_property(
        &mut self,
        node: NodeId,
        state: PropertyState,
        base_revision: Option<u64>,
        exists: bool,
    ) {
        let id = ItemId::Property(node, state.name().clone());
        match self.entries.get_mut(&id) {
            Some(entry) => {
                if entry.status == ItemStatus::Removed {
                    entry.status = ItemStatus::Modified;
                }
                entry.data = ItemData::Property(state);
            }
            None => {
                let status = if exists {
                    ItemStatus::Modified
                } else {
                    ItemStatus::New
                };
                self.put(id, status, ItemData::Property(state), base_revision);
            }
        }
    }

    /// Marks a property removed. Removing a property that only exists
    /// transiently drops its entry. Returns true if anything changed.
    ///
    /// `persistent` is the property's persistent state, if any.
    pub fn remove_property(
        &mut self,
        node: NodeId,
        name: &QName,
        persistent: Option<PropertyState>,
        base_revision: Option<u64>,
    ) -> bool {
        let id = ItemId::Property(node, name.clone());
        match self.entries.get(&id).map(|e| e.status) {
            Some(ItemStatus::New) => self.dispose(&id).is_some(),
            Some(ItemStatus::Removed) => false,
            Some(ItemStatus::Modified) => {
                if let Some(entry) = self.entries.get_mut(&id) {
                    entry.status = ItemStatus::Removed;
                }
                true
            }
            None => match persistent {
                Some(state) => {
                    self.put(id, ItemStatus::Removed, ItemData::Property(state), base_revision);
                    true
                }
                None => false,
            },
        }
    }

    pub fn get(&self, id: &ItemId) -> Option<&TransientItemState> {
        self.entries.get(id)
    }

    pub fn node(&self, id: NodeId) -> Option<&NodeRecord> {
        self.entries.get(&ItemId::Node(id)).and_then(TransientItemState::as_node)
    }

    /// Transient state of a property, including removed ones.
    pub fn property(&self, node: NodeId, name: &QName) -> Option<&TransientItemState> {
        self.entries.get(&ItemId::Property(node, name.clone()))
    }

    /// Property entries of one node, in creation order.
    pub fn properties_of(&self, node: NodeId) -> Vec<&TransientItemState> {
        let mut found: Vec<_> = self
            .entries
            .values()
            .filter(|e| matches!(e.id, ItemId::Property(owner, _) if owner == node))
            .collect();
        found.sort_by_key(|e| e.seq);
        found
    }

    pub fn contains(&self, id: &ItemId) -> bool {
        self.entries.contains_key(id)
    }

    /// Returns true if the node or any of its properties is transient.
    pub fn touches(&self, node: NodeId) -> bool {
        self.entries.keys().any(|id| id.node_id() == node)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Discards one entry.
    pub fn dispose(&mut self, id: &ItemId) -> Option<TransientItemState> {
        let state = self.entries.remove(id)?;
        self.notify_disposed(&state);
        Some(state)
    }

    /// Discards every entry. Returns how many were discarded.
    pub fn dispose_all(&mut self) -> usize {
        let states = self.take_ordered();
        for state in &states {
            self.notify_disposed(state);
        }
        states.len()
    }

    /// Every entry in creation order.
    pub fn ordered(&self) -> Vec<&TransientItemState> {
        let mut states: Vec<_> = self.entries.values().collect();
        states.sort_by_key(|s| s.seq);
        states
    }

    /// Removes every entry and returns them in creation order, once they
    /// have been promoted to persistent state.
    pub fn drain_ordered(&mut self) -> Vec<TransientItemState> {
        let states = self.take_ordered();
        for state in &states {
            self.notify_disposed(state);
        }
        states
    }

    /// Entries whose persistent node has changed since the overlay was
    /// created (or no longer exists). New nodes are never stale.
    pub fn stale_items(&self, store: &dyn PersistentStore) -> Vec<ItemId> {
        let mut stale: Vec<&TransientItemState> = self
            .entries
            .values()
            .filter(|entry| match entry.base_revision {
                Some(base) => match store.revision(entry.id.node_id()) {
                    Ok(current) => current != base,
                    Err(_) => true,
                },
                None => false,
            })
            .collect();
        stale.sort_by_key(|e| e.seq);
        stale.into_iter().map(|e| e.id.clone()).collect()
    }

    fn put(&mut self, id: ItemId, status: ItemStatus, data: ItemData, base_revision: Option<u64>) {
        let state = TransientItemState {
            id: id.clone(),
            status,
            data,
            base_revision,
            seq: self.next_seq,
        };
        self.next_seq += 1;
        for listener in &self.listeners {
            listener.state_created(&state);
        }
        self.entries.insert(id, state);
    }

    fn take_ordered(&mut self) -> Vec<TransientItemState> {
        let mut states: Vec<_> = self.entries.drain().map(|(_, state)| state).collect();
        states.sort_by_key(|s| s.seq);
        states
    }

    fn notify_disposed(&self, state: &TransientItemState) {
        for listener in &self.listeners {
            listener.state_disposed(state);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::{Value, NT_UNSTRUCTURED};
    use crate::store::InMemoryStore;
    use std::sync::Mutex;

    fn record(parent: NodeId) -> NodeRecord {
        NodeRecord::new(NodeId::new_v4(), QName::local("n"), Some(parent), NT_UNSTRUCTURED)
    }

    fn prop(name: &str, value: i64) -> PropertyState {
        PropertyState::single(QName::local(name), Value::Long(value))
    }

    #[derive(Default)]
    struct Recorder {
        created: Mutex<Vec<ItemId>>,
        disposed: Mutex<Vec<ItemId>>,
    }

    impl ItemStateListener for Recorder {
        fn state_created(&self, state: &TransientItemState) {
            self.created.lock().unwrap().push(state.id().clone());
        }

        fn state_disposed(&self, state: &TransientItemState) {
            self.disposed.lock().unwrap().push(state.id().clone());
        }
    }

    #[test]
    fn test_create_node_is_new() {
        let mut manager = TransientStateManager::new();
        let node = record(NodeId::new_v4());
        let id = node.id();
        manager.create_node(node);

        let state = manager.get(&ItemId::Node(id)).unwrap();
        assert_eq!(state.status(), ItemStatus::New);
        assert_eq!(state.base_revision(), None);
        assert!(manager.node(id).is_some());
    }

    #[test]
    fn test_modify_transient_node_keeps_status() {
        let mut manager = TransientStateManager::new();
        let node = record(NodeId::new_v4());
        let id = node.id();
        manager.create_node(node.clone());
        manager.modify_node(node, 7);

        let state = manager.get(&ItemId::Node(id)).unwrap();
        assert_eq!(state.status(), ItemStatus::New);
        assert_eq!(state.base_revision(), None);
        assert_eq!(manager.len(), 1);
    }

    #[test]
    fn test_set_then_remove_new_property_drops_entry() {
        let mut manager = TransientStateManager::new();
        let node = NodeId::new_v4();
        manager.set_property(node, prop("p", 1), Some(1), false);
        assert_eq!(manager.len(), 1);

        let removed = manager.remove_property(node, &QName::local("p"), None, Some(1));
        assert!(removed);
        assert!(manager.is_empty());
    }

    #[test]
    fn test_remove_persistent_property_marks_removed() {
        let mut manager = TransientStateManager::new();
        let node = NodeId::new_v4();
        assert!(manager.remove_property(node, &QName::local("p"), Some(prop("p", 1)), Some(3)));
        assert!(!manager.remove_property(node, &QName::local("p"), Some(prop("p", 1)), Some(3)));

        let state = manager.property(node, &QName::local("p")).unwrap();
        assert_eq!(state.status(), ItemStatus::Removed);

        manager.set_property(node, prop("p", 2), Some(3), true);
        let state = manager.property(node, &QName::local("p")).unwrap();
        assert_eq!(state.status(), ItemStatus::Modified);
        assert_eq!(state.as_property().unwrap().first(), Some(&Value::Long(2)));
    }

    #[test]
    fn test_remove_missing_property_is_noop() {
        let mut manager = TransientStateManager::new();
        assert!(!manager.remove_property(NodeId::new_v4(), &QName::local("p"), None, None));
        assert!(manager.is_empty());
    }

    #[test]
    fn test_drain_ordered_follows_creation() {
        let mut manager = TransientStateManager::new();
        let parent = record(NodeId::new_v4());
        let parent_id = parent.id();
        manager.create_node(parent);
        manager.set_property(parent_id, prop("a", 1), None, false);
        manager.set_property(parent_id, prop("b", 2), None, false);

        let drained = manager.drain_ordered();
        let seqs: Vec<u64> = drained.iter().map(|s| s.seq()).collect();
        assert_eq!(seqs, vec![0, 1, 2]);
        assert!(drained[0].as_node().is_some());
        assert!(manager.is_empty());
    }

    #[test]
    fn test_dispose_all_notifies_listeners() {
        let recorder = Arc::new(Recorder::default());
        let mut manager = TransientStateManager::new();
        manager.add_listener(recorder.clone());

        let node = NodeId::new_v4();
        manager.set_property(node, prop("a", 1), Some(1), false);
        manager.set_property(node, prop("b", 1), Some(1), false);
        manager.set_property(node, prop("c", 1), Some(1), false);

        assert_eq!(manager.dispose_all(), 3);
        assert!(manager.is_empty());
        assert_eq!(recorder.created.lock().unwrap().len(), 3);
        assert_eq!(*recorder.created.lock().unwrap(), *recorder.disposed.lock().unwrap());
    }

    #[test]
    fn test_stale_items_detects_moved_revision() {
        let mut store = InMemoryStore::new();
        let root = store.root();
        let node = store.create_child(root, &QName::local("a"), &NT_UNSTRUCTURED).unwrap();
        store.save().unwrap();
        let base = store.revision(node).unwrap();

        let mut manager = TransientStateManager::new();
        manager.set_property(node, prop("p", 1), Some(base), false);
        manager.create_node(record(node));
        assert!(manager.stale_items(&store).is_empty());

        store.set_property(node, prop("q", 1)).unwrap();
        store.save().unwrap();

        let stale = manager.stale_items(&store);
        assert_eq!(stale, vec![ItemId::Property(node, QName::local("p"))]);
    }

    #[test]
    fn test_touches() {
        let mut manager = TransientStateManager::new();
        let node = NodeId::new_v4();
        manager.set_property(node, prop("p", 1), Some(1), false);
        assert!(manager.touches(node));
        assert!(!manager.touches(NodeId::new_v4()));
    }
}
