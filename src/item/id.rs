//! Item identities

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::QName;

/// Identity of a persisted node.
///
/// Referenceable nodes expose this value as their `jcr:uuid`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(Uuid);

impl NodeId {
    /// Generates a fresh random identity.
    pub fn new_v4() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wraps an existing UUID.
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    #[inline]
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl FromStr for NodeId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({})", self.0)
    }
}

/// Identity of any item: a node, or a property addressed by its owning node.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ItemId {
    Node(NodeId),
    Property(NodeId, QName),
}

impl ItemId {
    /// Returns the node that is, or owns, this item.
    pub fn node_id(&self) -> NodeId {
        match self {
            ItemId::Node(id) => *id,
            ItemId::Property(id, _) => *id,
        }
    }

    /// Returns true if this identifies a node.
    #[inline]
    pub fn is_node(&self) -> bool {
        matches!(self, ItemId::Node(_))
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemId::Node(id) => write!(f, "{}", id),
            ItemId::Property(id, name) => write!(f, "{}/{}", id, name),
        }
    }
}
