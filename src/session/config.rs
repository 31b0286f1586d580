//! Session configuration

use serde::{Deserialize, Serialize};

/// Per-session behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Catch up with the cluster before `refresh` discards or keeps
    /// transient state.
    pub cluster_sync_on_refresh: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cluster_sync_on_refresh: true,
        }
    }
}

impl SessionConfig {
    /// Refreshes never wait for the cluster.
    pub fn without_cluster_sync() -> Self {
        Self {
            cluster_sync_on_refresh: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_syncs_on_refresh() {
        assert!(SessionConfig::default().cluster_sync_on_refresh);
        assert!(!SessionConfig::without_cluster_sync().cluster_sync_on_refresh);
    }

    #[test]
    fn test_deserialize_empty_object() {
        let config: SessionConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, SessionConfig::default());
    }
}
