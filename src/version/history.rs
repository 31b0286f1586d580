//! Version histories
//!
//! The version store keeps one `nt:versionHistory` per versionable node,
//! directly below its root:
//!
//! ```text
//! /rep:<node id>                 nt:versionHistory  jcr:versionableUuid
//!   /jcr:rootVersion             nt:version         jcr:created, jcr:predecessors = []
//!     /jcr:frozenNode            nt:frozenNode      (Init shell)
//!   /1.0                         nt:version         jcr:predecessors = [rootVersion]
//!     /jcr:frozenNode            nt:frozenNode      (full snapshot)
//!   /1.1 ...
//! ```
//!
//! Every mutation ends in `save` or, on failure, in a reload of the
//! history node so no half-built version stays in the working set.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::item::{
    NodeId, PropertyState, PropertyType, QName, Value, JCR_CREATED, JCR_FROZEN_NODE,
    JCR_PREDECESSORS, JCR_ROOT_VERSION, JCR_VERSIONABLE_UUID, NS_REP, NT_VERSION,
    NT_VERSION_HISTORY,
};
use crate::live::{LiveTree, VersionableInfo};
use crate::observability::{log_event_with_fields, Event, MetricsRegistry};
use crate::store::{InMemoryStore, NodeRecord, PersistentStore};

use super::checkin::{CheckinMode, FrozenBuilder};
use super::errors::{StoreContext, VersionError, VersionResult};
use super::frozen::{FrozenItem, FrozenNode};

/// One version of a node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VersionRecord {
    pub id: NodeId,
    pub name: QName,
    pub created: DateTime<Utc>,
    pub predecessors: Vec<NodeId>,
    pub frozen_node: NodeId,
}

impl VersionRecord {
    fn from_record(record: &NodeRecord) -> VersionResult<Self> {
        let created = match record.property(&JCR_CREATED).and_then(PropertyState::first) {
            Some(Value::Date(created)) => *created,
            _ => {
                return Err(VersionError::data_integrity(format!(
                    "Version {} has no '{}'",
                    record.id(),
                    JCR_CREATED
                )))
            }
        };
        let predecessors = record
            .property(&JCR_PREDECESSORS)
            .map(|p| p.values().iter().filter_map(Value::as_reference).collect())
            .unwrap_or_default();
        let frozen_node = record
            .child(&JCR_FROZEN_NODE)
            .map(|c| c.id)
            .ok_or_else(|| {
                VersionError::data_integrity(format!(
                    "Version {} has no '{}'",
                    record.id(),
                    JCR_FROZEN_NODE
                ))
            })?;

        Ok(Self {
            id: record.id(),
            name: record.name().clone(),
            created,
            predecessors,
            frozen_node,
        })
    }

    pub fn is_root(&self) -> bool {
        self.name == JCR_ROOT_VERSION
    }
}

/// All versions of one versionable node, in creation order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VersionHistory {
    pub id: NodeId,
    pub versionable_id: NodeId,
    pub versions: Vec<VersionRecord>,
}

impl VersionHistory {
    pub fn root_version(&self) -> Option<&VersionRecord> {
        self.versions.iter().find(|v| v.is_root())
    }

    pub fn version(&self, name: &str) -> Option<&VersionRecord> {
        self.versions.iter().find(|v| v.name.local_name() == name)
    }

    /// Most recently created version.
    pub fn latest(&self) -> Option<&VersionRecord> {
        self.versions.last()
    }
}

/// Name of the successor of `base`: `1.0` after the root version, the
/// last segment incremented otherwise, and a `.1` branch while taken.
///
/// Branches off the root version start from `1.0` (`1.0.1`, `1.0.1.1`, ...).
fn next_version_name(history: &NodeRecord, base: &QName) -> QName {
    let (mut candidate, mut branch) = if *base == JCR_ROOT_VERSION {
        ("1.0".to_string(), "1.0".to_string())
    } else {
        let base_local = base.local_name();
        let successor = match base_local.rsplit_once('.') {
            Some((head, last)) => match last.parse::<u64>() {
                Ok(n) => format!("{}.{}", head, n + 1),
                Err(_) => format!("{}.1", base_local),
            },
            None => format!("{}.1", base_local),
        };
        (successor, base_local.to_string())
    };

    while history.child(&QName::local(candidate.as_str())).is_some() {
        branch.push_str(".1");
        candidate = branch.clone();
    }
    QName::local(candidate)
}

/// Owner of the version store.
pub struct VersionManager {
    store: Box<dyn PersistentStore + Send + Sync>,
    metrics: Arc<MetricsRegistry>,
}

impl VersionManager {
    pub fn new(store: Box<dyn PersistentStore + Send + Sync>, metrics: Arc<MetricsRegistry>) -> Self {
        Self { store, metrics }
    }

    /// Version manager over a fresh in-memory store.
    pub fn in_memory(metrics: Arc<MetricsRegistry>) -> Self {
        Self::new(Box::new(InMemoryStore::new()), metrics)
    }

    /// Read access to the version store.
    pub fn store(&self) -> &dyn PersistentStore {
        self.store.as_ref()
    }

    /// Creates the history of `node` with its root version.
    ///
    /// Returns the history id and the root version as the initial base.
    pub fn create_version_history<L: LiveTree + ?Sized>(
        &mut self,
        live: &L,
        node: NodeId,
    ) -> VersionResult<VersionableInfo> {
        let root = self.store.root();
        let result = self.write_version_history(live, root, node);
        self.finish(result, root)
    }

    fn write_version_history<L: LiveTree + ?Sized>(
        &mut self,
        live: &L,
        root: NodeId,
        node: NodeId,
    ) -> VersionResult<VersionableInfo> {
        let name = QName::new(NS_REP, node.to_string());
        if self.store.get_node(root).context("read version storage", root)?.child(&name).is_some() {
            return Err(VersionError::data_integrity(format!(
                "Node {} already has a version history",
                node
            )));
        }

        let history = self
            .store
            .create_child(root, &name, &NT_VERSION_HISTORY)
            .context("create version history", node)?;
        self.store
            .set_property(
                history,
                PropertyState::single(JCR_VERSIONABLE_UUID.clone(), Value::String(node.to_string())),
            )
            .context("set versionable uuid", history)?;

        let root_version = self.create_version(history, &JCR_ROOT_VERSION, Vec::new())?;
        FrozenBuilder::new(self.store.as_mut(), live)
            .with_metrics(&self.metrics)
            .build(root_version, &JCR_FROZEN_NODE, node, CheckinMode::Init)?;

        self.store.save().context("save version history", history)?;

        let history_str = history.to_string();
        let node_str = node.to_string();
        log_event_with_fields(
            Event::VersionHistoryCreated,
            &[("history", history_str.as_str()), ("node", node_str.as_str())],
        );

        Ok(VersionableInfo {
            version_history: history,
            base_version: root_version,
        })
    }

    /// Checks in `node`: adds a version after its base version holding a
    /// frozen snapshot of the node.
    pub fn checkin<L: LiveTree + ?Sized>(
        &mut self,
        live: &L,
        node: NodeId,
    ) -> VersionResult<VersionRecord> {
        let source = live.node(node).context("read live node", node)?;
        let info = source
            .versionable
            .ok_or_else(|| VersionError::not_versionable(&source.path))?;

        let result = self.write_version(live, node, info);
        let result = self.finish(result, info.version_history)?;
        self.metrics.increment_checkins_completed();
        self.metrics.increment_versions();

        let version_str = result.name.to_string();
        log_event_with_fields(
            Event::VersionCreated,
            &[("path", source.path.as_str()), ("version", version_str.as_str())],
        );
        Ok(result)
    }

    fn write_version<L: LiveTree + ?Sized>(
        &mut self,
        live: &L,
        node: NodeId,
        info: VersionableInfo,
    ) -> VersionResult<VersionRecord> {
        let history = self
            .store
            .get_node(info.version_history)
            .context("read version history", info.version_history)?;
        let base = self
            .store
            .get_node(info.base_version)
            .context("read base version", info.base_version)?;
        if base.parent() != Some(history.id()) {
            return Err(VersionError::data_integrity(format!(
                "Base version {} does not belong to history {}",
                base.id(),
                history.id()
            )));
        }

        let name = next_version_name(&history, base.name());
        let version = self.create_version(history.id(), &name, vec![base.id()])?;
        FrozenBuilder::new(self.store.as_mut(), live)
            .with_metrics(&self.metrics)
            .build(version, &JCR_FROZEN_NODE, node, CheckinMode::Versioned)?;

        self.store.save().context("save version", version)?;
        self.version(version)
    }

    fn create_version(
        &mut self,
        history: NodeId,
        name: &QName,
        predecessors: Vec<NodeId>,
    ) -> VersionResult<NodeId> {
        let version = self
            .store
            .create_child(history, name, &NT_VERSION)
            .context("create version", history)?;
        self.store
            .set_property(version, PropertyState::single(JCR_CREATED.clone(), Value::Date(Utc::now())))
            .context("set created", version)?;
        self.store
            .set_property(
                version,
                PropertyState::multiple(
                    JCR_PREDECESSORS.clone(),
                    PropertyType::Reference,
                    predecessors.into_iter().map(Value::Reference).collect(),
                ),
            )
            .context("set predecessors", version)?;
        Ok(version)
    }

    /// Reloads `anchor` when `result` is an error.
    fn finish<T>(&mut self, result: VersionResult<T>, anchor: NodeId) -> VersionResult<T> {
        if result.is_err() && self.store.has_pending_changes() {
            self.store.reload(anchor).context("discard unsaved version", anchor)?;
        }
        result
    }

    /// Loads a version history.
    pub fn history(&self, id: NodeId) -> VersionResult<VersionHistory> {
        let record = self.store.get_node(id).context("read version history", id)?;
        if *record.primary_type() != NT_VERSION_HISTORY {
            return Err(VersionError::data_integrity(format!(
                "Item {} is not a version history",
                id
            )));
        }

        let versionable_id: NodeId = record
            .property(&JCR_VERSIONABLE_UUID)
            .and_then(PropertyState::first)
            .and_then(Value::as_str)
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| {
                VersionError::data_integrity(format!(
                    "Version history {} has no '{}'",
                    id, JCR_VERSIONABLE_UUID
                ))
            })?;

        let mut versions = Vec::with_capacity(record.children().len());
        for child in record.children() {
            versions.push(self.version(child.id)?);
        }

        Ok(VersionHistory {
            id,
            versionable_id,
            versions,
        })
    }

    /// Loads one version.
    pub fn version(&self, id: NodeId) -> VersionResult<VersionRecord> {
        let record = self.store.get_node(id).context("read version", id)?;
        if *record.primary_type() != NT_VERSION {
            return Err(VersionError::data_integrity(format!(
                "Item {} is not a version",
                id
            )));
        }
        VersionRecord::from_record(&record)
    }

    /// Loads the frozen tree of a version.
    pub fn frozen_node(&self, version: NodeId) -> VersionResult<FrozenNode> {
        let record = self.version(version)?;
        match FrozenItem::load(self.store.as_ref(), record.frozen_node)? {
            FrozenItem::Node(node) => Ok(node),
            FrozenItem::VersionHistory(_) => Err(VersionError::data_integrity(format!(
                "Frozen node of version {} is a history reference",
                version
            ))),
        }
    }
}
