//! Frozen item model
//!
//! Read-only views of persisted frozen records:
//! - `FrozenNode` - an `nt:frozenNode` snapshot of a live node
//! - `FrozenVersionHistoryRef` - an `nt:versionedChild` pointer to the
//!   version history of an independently versionable child
//!
//! Both are built once from store records and never mutated. Which variant
//! a child is gets decided by its record type at load time.

use serde::Serialize;

use crate::item::{
    NodeId, PropertyState, QName, Value, JCR_BASE_VERSION, JCR_CHILD_VERSION_HISTORY,
    JCR_FROZEN_MIXIN_TYPES, JCR_FROZEN_PRIMARY_TYPE, JCR_FROZEN_UUID, JCR_PRIMARY_TYPE, JCR_UUID,
    NT_FROZEN_NODE, NT_VERSIONED_CHILD,
};
use crate::store::{NodeRecord, PersistentStore};

use crate::observability::{Event, Logger};

use super::errors::{StoreContext, VersionError, VersionErrorCode, VersionResult};

/// Where a stored property of a frozen record belongs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PropertySlot {
    FrozenUuid,
    FrozenPrimaryType,
    FrozenMixinTypes,
    /// `jcr:primaryType` / `jcr:uuid` of the frozen record itself
    Ignored,
    Frozen,
}

impl PropertySlot {
    /// Total over names; unknown names are ordinary frozen properties.
    pub(crate) fn classify(name: &QName) -> Self {
        if *name == JCR_FROZEN_UUID {
            PropertySlot::FrozenUuid
        } else if *name == JCR_FROZEN_PRIMARY_TYPE {
            PropertySlot::FrozenPrimaryType
        } else if *name == JCR_FROZEN_MIXIN_TYPES {
            PropertySlot::FrozenMixinTypes
        } else if *name == JCR_PRIMARY_TYPE || *name == JCR_UUID {
            PropertySlot::Ignored
        } else {
            PropertySlot::Frozen
        }
    }
}

/// Returns true for names that never appear among frozen properties.
pub fn is_reserved(name: &QName) -> bool {
    PropertySlot::classify(name) != PropertySlot::Frozen
        || *name == JCR_CHILD_VERSION_HISTORY
        || *name == JCR_BASE_VERSION
}

/// Immutable snapshot of a node at checkin time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrozenNode {
    id: NodeId,
    name: QName,
    frozen_uuid: Option<NodeId>,
    frozen_primary_type: QName,
    frozen_mixin_types: Vec<QName>,
    frozen_properties: Vec<PropertyState>,
    children: Vec<FrozenItem>,
}

impl FrozenNode {
    /// Builds the view from an `nt:frozenNode` record and its loaded children.
    pub fn from_record(record: &NodeRecord, children: Vec<FrozenItem>) -> VersionResult<Self> {
        if *record.primary_type() != NT_FROZEN_NODE {
            return Err(VersionError::data_integrity(format!(
                "Illegal frozen node {}. Record type is '{}'",
                record.id(),
                record.primary_type()
            )));
        }

        let mut frozen_uuid = None;
        let mut frozen_primary_type = None;
        let mut frozen_mixin_types = Vec::new();
        let mut frozen_properties = Vec::new();

        for property in record.properties() {
            match PropertySlot::classify(property.name()) {
                PropertySlot::FrozenUuid => {
                    frozen_uuid = Some(parse_frozen_uuid(record, property)?);
                }
                PropertySlot::FrozenPrimaryType => {
                    frozen_primary_type = property.first().and_then(Value::as_name).cloned();
                }
                PropertySlot::FrozenMixinTypes => {
                    frozen_mixin_types = property
                        .values()
                        .iter()
                        .filter_map(Value::as_name)
                        .cloned()
                        .collect();
                }
                PropertySlot::Ignored => {}
                PropertySlot::Frozen => frozen_properties.push(property.clone()),
            }
        }

        let frozen_primary_type = frozen_primary_type.ok_or_else(|| {
            VersionError::data_integrity(format!(
                "Illegal frozen node {}. Must have '{}'",
                record.id(),
                JCR_FROZEN_PRIMARY_TYPE
            ))
        })?;

        Ok(Self {
            id: record.id(),
            name: record.name().clone(),
            frozen_uuid,
            frozen_primary_type,
            frozen_mixin_types,
            frozen_properties,
            children,
        })
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn name(&self) -> &QName {
        &self.name
    }

    /// Identity of the source node; `None` unless it was referenceable.
    pub fn frozen_uuid(&self) -> Option<NodeId> {
        self.frozen_uuid
    }

    pub fn frozen_primary_type(&self) -> &QName {
        &self.frozen_primary_type
    }

    pub fn frozen_mixin_types(&self) -> &[QName] {
        &self.frozen_mixin_types
    }

    /// Copied properties in source order.
    pub fn frozen_properties(&self) -> &[PropertyState] {
        &self.frozen_properties
    }

    pub fn frozen_property(&self, name: &QName) -> Option<&PropertyState> {
        self.frozen_properties.iter().find(|p| p.name() == name)
    }

    /// Frozen children in source order.
    pub fn children(&self) -> &[FrozenItem] {
        &self.children
    }

    pub fn child(&self, name: &QName) -> Option<&FrozenItem> {
        self.children.iter().find(|c| c.name() == name)
    }

    /// Returns true if a direct child references the given version history.
    pub fn has_frozen_history(&self, version_history: NodeId) -> bool {
        self.children.iter().any(|c| match c {
            FrozenItem::VersionHistory(r) => r.version_history == version_history,
            FrozenItem::Node(_) => false,
        })
    }
}

fn parse_frozen_uuid(record: &NodeRecord, property: &PropertyState) -> VersionResult<NodeId> {
    let invalid = || {
        VersionError::data_integrity(format!(
            "Illegal frozen node {}. '{}' is not a node identifier",
            record.id(),
            JCR_FROZEN_UUID
        ))
    };
    match property.first() {
        Some(Value::String(raw)) => raw.parse().map_err(|_| invalid()),
        Some(Value::Reference(id)) => Ok(*id),
        _ => Err(invalid()),
    }
}

/// Pointer from a frozen node to an independently versioned child.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FrozenVersionHistoryRef {
    id: NodeId,
    name: QName,
    version_history: NodeId,
    base_version: NodeId,
}

impl FrozenVersionHistoryRef {
    /// Builds the view from an `nt:versionedChild` record.
    pub fn from_record(record: &NodeRecord) -> VersionResult<Self> {
        let reference = |name: &QName| {
            record
                .property(name)
                .and_then(PropertyState::first)
                .and_then(Value::as_reference)
                .ok_or_else(|| {
                    VersionError::data_integrity(format!(
                        "Illegal version history reference {}. Must have '{}'",
                        record.id(),
                        name
                    ))
                })
        };

        Ok(Self {
            id: record.id(),
            name: record.name().clone(),
            version_history: reference(&JCR_CHILD_VERSION_HISTORY)?,
            base_version: reference(&JCR_BASE_VERSION)?,
        })
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn name(&self) -> &QName {
        &self.name
    }

    pub fn version_history(&self) -> NodeId {
        self.version_history
    }

    /// Base version of the child when the parent was checked in.
    pub fn base_version(&self) -> NodeId {
        self.base_version
    }
}

/// A child of a frozen node.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FrozenItem {
    Node(FrozenNode),
    VersionHistory(FrozenVersionHistoryRef),
}

impl FrozenItem {
    /// Loads a persisted frozen item and, for nodes, its whole subtree.
    pub fn load<S: PersistentStore + ?Sized>(store: &S, id: NodeId) -> VersionResult<Self> {
        Self::load_item(store, id).map_err(|err| {
            if err.code() == VersionErrorCode::ArborVersionDataIntegrity {
                let id_str = id.to_string();
                Logger::error(
                    Event::FrozenNodeCorrupted.as_str(),
                    &[("item", id_str.as_str()), ("reason", err.message())],
                );
            }
            err
        })
    }

    fn load_item<S: PersistentStore + ?Sized>(store: &S, id: NodeId) -> VersionResult<Self> {
        let record = store.get_node(id).context("load frozen item", id)?;

        if *record.primary_type() == NT_FROZEN_NODE {
            let children = record
                .children()
                .iter()
                .map(|c| FrozenItem::load_item(store, c.id))
                .collect::<VersionResult<Vec<_>>>()?;
            Ok(FrozenItem::Node(FrozenNode::from_record(&record, children)?))
        } else if *record.primary_type() == NT_VERSIONED_CHILD {
            Ok(FrozenItem::VersionHistory(
                FrozenVersionHistoryRef::from_record(&record)?,
            ))
        } else {
            Err(VersionError::data_integrity(format!(
                "Item {} of type '{}' is not a frozen item",
                id,
                record.primary_type()
            )))
        }
    }

    pub fn id(&self) -> NodeId {
        match self {
            FrozenItem::Node(n) => n.id(),
            FrozenItem::VersionHistory(r) => r.id(),
        }
    }

    pub fn name(&self) -> &QName {
        match self {
            FrozenItem::Node(n) => n.name(),
            FrozenItem::VersionHistory(r) => r.name(),
        }
    }

    pub fn as_node(&self) -> Option<&FrozenNode> {
        match self {
            FrozenItem::Node(n) => Some(n),
            FrozenItem::VersionHistory(_) => None,
        }
    }

    pub fn as_history_ref(&self) -> Option<&FrozenVersionHistoryRef> {
        match self {
            FrozenItem::VersionHistory(r) => Some(r),
            FrozenItem::Node(_) => None,
        }
    }
}
