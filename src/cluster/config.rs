//! Cluster configuration
//!
//! - Disabled by default; a standalone repository never syncs
//! - Node id is auto-generated when enabled without one

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::errors::{ClusterError, ClusterResult};

/// Cluster membership of this repository.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    /// Whether this repository takes part in a cluster.
    pub enabled: bool,

    /// Identity of this node in the journal. Auto-generated if absent.
    pub node_id: Option<String>,
}

impl ClusterConfig {
    /// Standalone repository (default).
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Cluster member with the given id, or a generated one.
    pub fn enabled(node_id: Option<String>) -> Self {
        Self {
            enabled: true,
            node_id: Some(node_id.unwrap_or_else(|| Uuid::new_v4().to_string())),
        }
    }

    /// Node id, generating one if none is configured.
    pub fn resolved_node_id(&self) -> String {
        self.node_id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string())
    }

    /// Validate the configuration.
    ///
    /// A configured node id must be non-empty and free of whitespace.
    pub fn validate(&self) -> ClusterResult<()> {
        if let Some(ref id) = self.node_id {
            if id.is_empty() {
                return Err(ClusterError::InvalidConfig("node_id must not be empty".into()));
            }
            if id.chars().any(char::is_whitespace) {
                return Err(ClusterError::InvalidConfig(format!(
                    "node_id '{}' must not contain whitespace",
                    id
                )));
            }
        }
        Ok(())
    }
}
