//! Sessions
//!
//! A `Repository` owns the shared workspace store, the version manager and
//! the cluster gate. A `Session` is one client's view of it: reads go
//! through the session's transient overlay first, writes only touch the
//! overlay until `save` promotes them.
//!
//! Versioning operations work on persisted state only; a node with pending
//! transient changes cannot be checked in.

mod config;
mod errors;
mod refresh;
mod transient;

pub use config::SessionConfig;
pub use errors::{SessionError, SessionResult};
pub use refresh::{RefreshOutcome, SessionRefresh};
pub use transient::{
    ItemData, ItemStateListener, ItemStatus, TransientItemState, TransientStateManager,
};

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::cluster::{ClusterNode, SyncGate};
use crate::item::{
    ItemId, NodeId, PropertyState, PropertyType, QName, Value, JCR_BASE_VERSION,
    JCR_IS_CHECKED_OUT, JCR_MIXIN_TYPES, JCR_VERSION_HISTORY, MIX_VERSIONABLE,
};
use crate::live::{mixin_types, ItemDefinitions, VersionableInfo, WorkspaceTree};
use crate::observability::{Event, Logger, MetricsRegistry, ObservationScope};
use crate::store::{InMemoryStore, NodeRecord, PersistentStore, StoreError};
use crate::version::{FrozenNode, VersionError, VersionHistory, VersionManager, VersionRecord};

type WorkspaceStore = Box<dyn PersistentStore + Send + Sync>;

/// Shared repository state.
pub struct Repository {
    workspace: RwLock<WorkspaceStore>,
    versions: Mutex<VersionManager>,
    definitions: Arc<dyn ItemDefinitions>,
    gate: SyncGate,
    metrics: Arc<MetricsRegistry>,
    config: SessionConfig,
}

impl Repository {
    pub fn new(
        workspace: WorkspaceStore,
        versions: VersionManager,
        definitions: Arc<dyn ItemDefinitions>,
        metrics: Arc<MetricsRegistry>,
    ) -> Self {
        Self {
            workspace: RwLock::new(workspace),
            versions: Mutex::new(versions),
            definitions,
            gate: SyncGate::default().with_metrics(Arc::clone(&metrics)),
            metrics,
            config: SessionConfig::default(),
        }
    }

    /// Standalone repository over in-memory workspace and version stores.
    pub fn in_memory(definitions: Arc<dyn ItemDefinitions>) -> Self {
        let metrics = Arc::new(MetricsRegistry::new());
        Self::new(
            Box::new(InMemoryStore::new()),
            VersionManager::in_memory(Arc::clone(&metrics)),
            definitions,
            metrics,
        )
    }

    /// Joins a cluster.
    pub fn with_cluster(mut self, cluster: Arc<dyn ClusterNode>) -> Self {
        self.gate = SyncGate::new(Some(cluster)).with_metrics(Arc::clone(&self.metrics));
        self
    }

    pub fn with_config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    /// Opens a session.
    pub fn login(self: &Arc<Self>) -> Session {
        Session {
            repository: Arc::clone(self),
            transient: TransientStateManager::new(),
        }
    }

    pub fn metrics(&self) -> &Arc<MetricsRegistry> {
        &self.metrics
    }

    pub fn config(&self) -> SessionConfig {
        self.config
    }

    pub fn is_clustered(&self) -> bool {
        self.gate.is_clustered()
    }

    pub fn definitions(&self) -> &dyn ItemDefinitions {
        self.definitions.as_ref()
    }

    fn read(&self) -> SessionResult<RwLockReadGuard<'_, WorkspaceStore>> {
        self.workspace
            .read()
            .map_err(|_| StoreError::unavailable("workspace lock poisoned").into())
    }

    fn write(&self) -> SessionResult<RwLockWriteGuard<'_, WorkspaceStore>> {
        self.workspace
            .write()
            .map_err(|_| StoreError::unavailable("workspace lock poisoned").into())
    }

    fn versions(&self) -> SessionResult<MutexGuard<'_, VersionManager>> {
        self.versions
            .lock()
            .map_err(|_| StoreError::unavailable("version manager lock poisoned").into())
    }
}

/// One client's view of a repository.
pub struct Session {
    repository: Arc<Repository>,
    transient: TransientStateManager,
}

impl Session {
    pub fn repository(&self) -> &Arc<Repository> {
        &self.repository
    }

    /// Root node of the workspace.
    pub fn root(&self) -> SessionResult<NodeId> {
        Ok(self.repository.read()?.root())
    }

    /// The session's transient overlay.
    pub fn transient(&self) -> &TransientStateManager {
        &self.transient
    }

    pub fn add_listener(&mut self, listener: Arc<dyn ItemStateListener>) {
        self.transient.add_listener(listener);
    }

    pub fn has_pending_changes(&self) -> bool {
        !self.transient.is_empty()
    }

    // ==================
    // Reads
    // ==================

    /// Node as seen by this session: transient state over persistent state.
    pub fn node(&self, id: NodeId) -> SessionResult<NodeRecord> {
        let mut record = match self.transient.node(id) {
            Some(record) => record.clone(),
            None => self.persistent_node(id)?,
        };
        for entry in self.transient.properties_of(id) {
            if let (ItemId::Property(_, name), Some(state)) = (entry.id(), entry.as_property()) {
                match entry.status() {
                    ItemStatus::Removed => {
                        record.remove_property(name);
                    }
                    ItemStatus::New | ItemStatus::Modified => record.set_property(state.clone()),
                }
            }
        }
        Ok(record)
    }

    /// Property as seen by this session.
    pub fn property(&self, node: NodeId, name: &QName) -> SessionResult<Option<PropertyState>> {
        Ok(self.node(node)?.property(name).cloned())
    }

    /// Workspace path of a persisted node.
    pub fn path(&self, node: NodeId) -> SessionResult<String> {
        Ok(self.repository.read()?.path(node)?)
    }

    /// Resolves an absolute path against the session's view.
    pub fn node_at(&self, path: &str) -> SessionResult<NodeId> {
        let mut current = self.root()?;
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            let record = self.node(current)?;
            current = record
                .children()
                .iter()
                .find(|c| c.name.to_string() == segment)
                .map(|c| c.id)
                .ok_or_else(|| StoreError::not_found(path))?;
        }
        Ok(current)
    }

    /// Runs `f` over the persisted workspace as a live tree.
    pub fn with_live_tree<T>(&self, f: impl FnOnce(&WorkspaceTree<'_>) -> T) -> SessionResult<T> {
        let store = self.repository.read()?;
        let live = WorkspaceTree::new(&**store, self.repository.definitions.as_ref());
        Ok(f(&live))
    }

    fn persistent_node(&self, id: NodeId) -> SessionResult<NodeRecord> {
        match self.repository.read()?.get_node(id) {
            Ok(record) => Ok(record),
            Err(err) if err.is_not_found() => Err(SessionError::ItemNotFound(ItemId::Node(id))),
            Err(err) => Err(err.into()),
        }
    }

    // ==================
    // Transient writes
    // ==================

    /// Adds a child node.
    pub fn add_node(&mut self, parent: NodeId, name: QName, node_type: QName) -> SessionResult<NodeId> {
        let (mut parent_record, base) = match self.transient.node(parent) {
            Some(record) => (record.clone(), 0),
            None => {
                let record = self.persistent_node(parent)?;
                let revision = record.revision();
                (record, revision)
            }
        };

        let id = NodeId::new_v4();
        parent_record.add_child(name.clone(), id);
        self.transient.modify_node(parent_record, base);
        self.transient
            .create_node(NodeRecord::new(id, name, Some(parent), node_type));
        Ok(id)
    }

    /// Adds a mixin type to `jcr:mixinTypes`.
    pub fn add_mixin(&mut self, node: NodeId, mixin: QName) -> SessionResult<()> {
        let mut mixins = mixin_types(&self.node(node)?);
        if mixins.contains(&mixin) {
            return Ok(());
        }
        mixins.push(mixin);
        self.set_property(
            node,
            PropertyState::multiple(
                JCR_MIXIN_TYPES,
                PropertyType::Name,
                mixins.into_iter().map(Value::Name).collect(),
            ),
        )
    }

    /// Sets a property.
    pub fn set_property(&mut self, node: NodeId, state: PropertyState) -> SessionResult<()> {
        if self.is_new(node) {
            self.transient.set_property(node, state, None, false);
            return Ok(());
        }
        let record = self.persistent_node(node)?;
        let exists = record.property(state.name()).is_some();
        self.transient
            .set_property(node, state, Some(record.revision()), exists);
        Ok(())
    }

    /// Removes a property. Returns false if there was nothing to remove.
    pub fn remove_property(&mut self, node: NodeId, name: &QName) -> SessionResult<bool> {
        if self.is_new(node) {
            return Ok(self.transient.remove_property(node, name, None, None));
        }
        let record = self.persistent_node(node)?;
        Ok(self.transient.remove_property(
            node,
            name,
            record.property(name).cloned(),
            Some(record.revision()),
        ))
    }

    fn is_new(&self, node: NodeId) -> bool {
        self.transient
            .get(&ItemId::Node(node))
            .map(|s| s.status() == ItemStatus::New)
            .unwrap_or(false)
    }

    // ==================
    // Save / refresh
    // ==================

    /// Promotes every transient entry to the workspace, saves it and
    /// publishes the changed nodes to the cluster.
    ///
    /// On failure the workspace's unsaved writes are discarded and the
    /// transient state is kept.
    pub fn save(&mut self) -> SessionResult<usize> {
        if self.transient.is_empty() {
            return Ok(0);
        }

        let scope = ObservationScope::new(Event::SessionSave.as_str());
        let changes = {
            let mut store = self.repository.write()?;
            if let Err(err) = promote(&mut **store, &self.transient) {
                discard(&mut **store, &self.transient);
                scope.fail(&err.to_string());
                return Err(err.into());
            }
            if let Err(err) = store.save() {
                discard(&mut **store, &self.transient);
                scope.fail(&err.to_string());
                return Err(err.into());
            }

            let promoted = self.transient.drain_ordered();
            promoted
                .iter()
                .map(|s| s.id().node_id())
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect::<Vec<_>>()
        };

        self.repository.metrics.increment_saves();
        let count = changes.len().to_string();
        scope.complete_with_fields(&[("nodes", count.as_str())]);

        self.repository
            .gate
            .publish(&changes)
            .map_err(SessionError::ClusterPublish)?;
        Ok(changes.len())
    }

    /// Refreshes with the repository's cluster-sync setting.
    pub fn refresh(&mut self, keep_changes: bool) -> SessionResult<RefreshOutcome> {
        let sync = self.repository.config.cluster_sync_on_refresh;
        self.refresh_with(SessionRefresh::new(keep_changes, sync))
    }

    pub fn refresh_with(&mut self, refresh: SessionRefresh) -> SessionResult<RefreshOutcome> {
        refresh.perform(
            &self.repository.gate,
            &mut self.transient,
            Some(&self.repository.metrics),
        )
    }

    /// Transient entries whose persistent state changed underneath them.
    pub fn stale_items(&self) -> SessionResult<Vec<ItemId>> {
        let store = self.repository.read()?;
        Ok(self.transient.stale_items(&**store))
    }

    // ==================
    // Versioning
    // ==================

    /// Creates the version history of a persisted `mix:versionable` node
    /// and records it on the node.
    pub fn add_version_history(&mut self, node: NodeId) -> SessionResult<VersionableInfo> {
        self.ensure_clean(node)?;

        let info = {
            let mut store = self.repository.write()?;
            let record = store.get_node(node)?;
            let path = store.path(node)?;
            if !self.repository.definitions.is_node_type(&record, &MIX_VERSIONABLE) {
                return Err(VersionError::not_versionable(path).into());
            }
            let info = {
                let live = WorkspaceTree::new(&**store, self.repository.definitions.as_ref());
                self.repository.versions()?.create_version_history(&live, node)?
            };
            write_system_properties(
                &mut **store,
                node,
                vec![
                    PropertyState::single(JCR_VERSION_HISTORY, Value::Reference(info.version_history)),
                    PropertyState::single(JCR_BASE_VERSION, Value::Reference(info.base_version)),
                    PropertyState::single(JCR_IS_CHECKED_OUT, Value::Boolean(true)),
                ],
            )?;
            info
        };

        self.publish(node)?;
        Ok(info)
    }

    /// Checks in a persisted versionable node and moves its base version.
    ///
    /// The workspace stays write-locked from reading the base version until
    /// the new base is saved, so concurrent checkins of one node form a
    /// linear chain.
    pub fn checkin(&mut self, node: NodeId) -> SessionResult<VersionRecord> {
        self.ensure_clean(node)?;

        let version = {
            let mut store = self.repository.write()?;
            let version = {
                let live = WorkspaceTree::new(&**store, self.repository.definitions.as_ref());
                self.repository.versions()?.checkin(&live, node)?
            };
            write_system_properties(
                &mut **store,
                node,
                vec![
                    PropertyState::single(JCR_BASE_VERSION, Value::Reference(version.id)),
                    PropertyState::single(JCR_IS_CHECKED_OUT, Value::Boolean(false)),
                ],
            )?;
            version
        };

        self.publish(node)?;
        Ok(version)
    }

    pub fn version_history(&self, id: NodeId) -> SessionResult<VersionHistory> {
        Ok(self.repository.versions()?.history(id)?)
    }

    pub fn version(&self, id: NodeId) -> SessionResult<VersionRecord> {
        Ok(self.repository.versions()?.version(id)?)
    }

    /// Frozen snapshot of a version.
    pub fn frozen_node(&self, version: NodeId) -> SessionResult<FrozenNode> {
        Ok(self.repository.versions()?.frozen_node(version)?)
    }

    fn ensure_clean(&self, node: NodeId) -> SessionResult<()> {
        if self.transient.touches(node) {
            let path = self.path(node).unwrap_or_else(|_| node.to_string());
            return Err(VersionError::pending_changes(path).into());
        }
        Ok(())
    }

    fn publish(&self, node: NodeId) -> SessionResult<()> {
        self.repository
            .gate
            .publish(&[node])
            .map_err(SessionError::ClusterPublish)
    }
}

/// Writes version bookkeeping straight to the workspace and saves it.
fn write_system_properties(
    store: &mut dyn PersistentStore,
    node: NodeId,
    properties: Vec<PropertyState>,
) -> Result<(), StoreError> {
    let written = properties
        .into_iter()
        .try_for_each(|p| store.set_property(node, p))
        .and_then(|_| store.save().map(|_| ()));
    if let Err(err) = written {
        if store.has_pending_changes() {
            if let Err(reload) = store.reload(node) {
                let reason = reload.to_string();
                Logger::error("RELOAD_FAILED", &[("reason", reason.as_str())]);
            }
        }
        return Err(err);
    }
    Ok(())
}

fn promote(
    store: &mut dyn PersistentStore,
    transient: &TransientStateManager,
) -> Result<(), StoreError> {
    for state in transient.ordered() {
        match (state.status(), state.data()) {
            (ItemStatus::New, ItemData::Node(record)) => {
                let parent = record.parent().ok_or_else(|| {
                    StoreError::write_failed(format!("Transient node {} has no parent", record.id()))
                })?;
                store.create_child_with_id(parent, record.name(), record.primary_type(), record.id())?;
            }
            // child entries are written by the children themselves
            (_, ItemData::Node(_)) => {}
            (ItemStatus::Removed, ItemData::Property(property)) => {
                store.remove_property(state.id().node_id(), property.name())?;
            }
            (_, ItemData::Property(property)) => {
                store.set_property(state.id().node_id(), property.clone())?;
            }
        }
    }
    Ok(())
}

/// Drops unsaved workspace writes made while promoting `transient`.
fn discard(store: &mut dyn PersistentStore, transient: &TransientStateManager) {
    let touched: BTreeSet<NodeId> = transient.ordered().iter().map(|s| s.id().node_id()).collect();
    for node in touched {
        if store.exists(node) {
            if let Err(err) = store.reload(node) {
                let reason = err.to_string();
                Logger::error("RELOAD_FAILED", &[("reason", reason.as_str())]);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::{OnParentVersionAction, NT_UNSTRUCTURED};
    use crate::live::StaticDefinitions;

    fn repository() -> Arc<Repository> {
        Arc::new(
            Repository::in_memory(Arc::new(StaticDefinitions::builtin()))
                .with_config(SessionConfig::without_cluster_sync()),
        )
    }

    fn long(name: &str, value: i64) -> PropertyState {
        PropertyState::single(QName::local(name), Value::Long(value))
    }

    #[test]
    fn test_transient_reads_shadow_persistent() {
        let repo = repository();
        let mut session = repo.login();
        let root = session.root().unwrap();

        let a = session.add_node(root, QName::local("a"), NT_UNSTRUCTURED).unwrap();
        session.set_property(a, long("p", 1)).unwrap();
        assert_eq!(session.property(a, &QName::local("p")).unwrap().unwrap().first(), Some(&Value::Long(1)));

        // other sessions only see saved state
        let other = repo.login();
        assert!(matches!(other.node(a), Err(SessionError::ItemNotFound(_))));

        session.save().unwrap();
        assert!(!session.has_pending_changes());
        assert!(other.property(a, &QName::local("p")).unwrap().is_some());
    }

    #[test]
    fn test_poisoned_workspace_is_store_unavailable() {
        let repo = repository();
        let poisoner = Arc::clone(&repo);
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.workspace.write().unwrap();
            panic!("writer died");
        })
        .join();

        match repo.login().root() {
            Err(SessionError::Store(err)) => {
                assert_eq!(err.code(), crate::store::StoreErrorCode::ArborStoreUnavailable);
                assert!(!err.is_fatal());
            }
            other => panic!("expected unavailable store, got {:?}", other),
        }
    }

    #[test]
    fn test_remove_property_overlay() {
        let repo = repository();
        let mut session = repo.login();
        let root = session.root().unwrap();
        let a = session.add_node(root, QName::local("a"), NT_UNSTRUCTURED).unwrap();
        session.set_property(a, long("p", 1)).unwrap();
        session.save().unwrap();

        assert!(session.remove_property(a, &QName::local("p")).unwrap());
        assert!(session.property(a, &QName::local("p")).unwrap().is_none());
        assert!(!session.remove_property(a, &QName::local("missing")).unwrap());

        session.save().unwrap();
        assert!(repo.login().property(a, &QName::local("p")).unwrap().is_none());
    }

    #[test]
    fn test_refresh_discards_unsaved_node() {
        let repo = repository();
        let mut session = repo.login();
        let root = session.root().unwrap();
        let a = session.add_node(root, QName::local("a"), NT_UNSTRUCTURED).unwrap();

        let outcome = session.refresh(false).unwrap();
        assert_eq!(outcome.disposed, 2);
        assert!(matches!(session.node(a), Err(SessionError::ItemNotFound(_))));
        assert!(session.node(root).unwrap().children().is_empty());
    }

    #[test]
    fn test_checkin_updates_base_version() {
        let repo = repository();
        let mut session = repo.login();
        let root = session.root().unwrap();
        let a = session.add_node(root, QName::local("a"), NT_UNSTRUCTURED).unwrap();
        session.add_mixin(a, MIX_VERSIONABLE).unwrap();
        session.set_property(a, long("p", 1)).unwrap();
        session.save().unwrap();

        let info = session.add_version_history(a).unwrap();
        let version = session.checkin(a).unwrap();

        assert_eq!(version.name.local_name(), "1.0");
        assert_eq!(version.predecessors, vec![info.base_version]);
        let base = session.property(a, &JCR_BASE_VERSION).unwrap().unwrap();
        assert_eq!(base.first().and_then(Value::as_reference), Some(version.id));
        let checked_out = session.property(a, &JCR_IS_CHECKED_OUT).unwrap().unwrap();
        assert_eq!(checked_out.first(), Some(&Value::Boolean(false)));

        let frozen = session.frozen_node(version.id).unwrap();
        assert_eq!(frozen.frozen_property(&QName::local("p")).unwrap().first(), Some(&Value::Long(1)));
    }

    #[test]
    fn test_checkin_with_pending_changes_fails() {
        let repo = repository();
        let mut session = repo.login();
        let root = session.root().unwrap();
        let a = session.add_node(root, QName::local("a"), NT_UNSTRUCTURED).unwrap();
        session.add_mixin(a, MIX_VERSIONABLE).unwrap();
        session.save().unwrap();
        session.add_version_history(a).unwrap();

        session.set_property(a, long("p", 2)).unwrap();
        let err = session.checkin(a).unwrap_err();
        assert_eq!(
            err.as_version_error().unwrap().code(),
            crate::version::VersionErrorCode::ArborVersionPendingChanges
        );
    }

    #[test]
    fn test_add_version_history_requires_versionable() {
        let repo = repository();
        let mut session = repo.login();
        let root = session.root().unwrap();
        let a = session.add_node(root, QName::local("a"), NT_UNSTRUCTURED).unwrap();
        session.save().unwrap();

        let err = session.add_version_history(a).unwrap_err();
        assert_eq!(
            err.as_version_error().unwrap().code(),
            crate::version::VersionErrorCode::ArborVersionNotVersionable
        );
    }

    #[test]
    fn test_aborted_checkin_leaves_base_version() {
        let definitions = StaticDefinitions::builtin()
            .with_property_rule(QName::local("secret"), OnParentVersionAction::Abort);
        let repo = Arc::new(Repository::in_memory(Arc::new(definitions)));
        let mut session = repo.login();
        let root = session.root().unwrap();
        let a = session.add_node(root, QName::local("a"), NT_UNSTRUCTURED).unwrap();
        session.add_mixin(a, MIX_VERSIONABLE).unwrap();
        session.set_property(a, long("secret", 1)).unwrap();
        session.save().unwrap();
        let info = session.add_version_history(a).unwrap();

        let err = session.checkin(a).unwrap_err();
        assert!(err.as_version_error().unwrap().is_abort());

        let base = session.property(a, &JCR_BASE_VERSION).unwrap().unwrap();
        assert_eq!(base.first().and_then(Value::as_reference), Some(info.base_version));
        let history = session.version_history(info.version_history).unwrap();
        assert_eq!(history.versions.len(), 1);
    }
}
