//! Configuration file
//!
//! ```json
//! {
//!   "log_level": "info",
//!   "cluster_sync_on_refresh": true,
//!   "cluster": { "enabled": false, "node_id": null }
//! }
//! ```
//!
//! Every field is optional.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::cluster::ClusterConfig;
use crate::observability::Severity;
use crate::session::SessionConfig;

use super::errors::{CliError, CliResult};

/// Configuration file structure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Minimum log severity: trace, info, warn, error or fatal (default: info)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Synchronize with the cluster before each refresh (default: true)
    #[serde(default = "default_cluster_sync_on_refresh")]
    pub cluster_sync_on_refresh: bool,

    /// Cluster membership (default: standalone)
    #[serde(default)]
    pub cluster: ClusterConfig,
}

fn default_log_level() -> String {
    "info".to_string()
}
fn default_cluster_sync_on_refresh() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            cluster_sync_on_refresh: default_cluster_sync_on_refresh(),
            cluster: ClusterConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from file
    pub fn load(path: &Path) -> CliResult<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| CliError::config_error(format!("Failed to read config: {}", e)))?;

        let config: Config = serde_json::from_str(&content)
            .map_err(|e| CliError::config_error(format!("Invalid config JSON: {}", e)))?;

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> CliResult<()> {
        self.severity()?;
        self.cluster
            .validate()
            .map_err(|e| CliError::config_error(format!("Cluster config error: {}", e)))?;
        Ok(())
    }

    /// Parsed `log_level`.
    pub fn severity(&self) -> CliResult<Severity> {
        self.log_level.parse::<Severity>().map_err(|_| {
            CliError::config_error(format!("Invalid log_level: '{}'", self.log_level))
        })
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            cluster_sync_on_refresh: self.cluster_sync_on_refresh,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_empty_object_uses_defaults() {
        let file = write_config("{}");
        let config = Config::load(file.path()).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.severity().unwrap(), Severity::Info);
        assert!(config.session_config().cluster_sync_on_refresh);
    }

    #[test]
    fn test_full_config() {
        let file = write_config(
            r#"{"log_level": "warn", "cluster_sync_on_refresh": false,
                "cluster": {"enabled": true, "node_id": "node-1"}}"#,
        );
        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.severity().unwrap(), Severity::Warn);
        assert!(!config.session_config().cluster_sync_on_refresh);
        assert_eq!(config.cluster.node_id.as_deref(), Some("node-1"));
    }

    #[test]
    fn test_invalid_log_level() {
        let file = write_config(r#"{"log_level": "loud"}"#);
        let err = Config::load(file.path()).unwrap_err();
        assert!(err.message().contains("loud"));
    }

    #[test]
    fn test_invalid_cluster_node_id() {
        let file = write_config(r#"{"cluster": {"enabled": true, "node_id": ""}}"#);
        assert!(Config::load(file.path()).is_err());
    }

    #[test]
    fn test_missing_file() {
        let err = Config::load(Path::new("/nonexistent/arbordb.json")).unwrap_err();
        assert!(err.message().contains("Failed to read config"));
    }
}
