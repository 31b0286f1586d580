//! Session errors

use thiserror::Error;

use crate::cluster::ClusterError;
use crate::item::ItemId;
use crate::store::StoreError;
use crate::version::VersionError;

/// Result type for session operations
pub type SessionResult<T> = Result<T, SessionError>;

/// Session errors
#[derive(Debug, Error)]
pub enum SessionError {
    // ==================
    // Cluster
    // ==================
    /// Catch-up with the cluster failed before a refresh
    #[error("Unable to synchronize with the cluster: {0}")]
    ClusterSync(#[source] ClusterError),

    /// Saved changes could not be announced to the cluster
    #[error("Unable to publish changes to the cluster: {0}")]
    ClusterPublish(#[source] ClusterError),

    // ==================
    // Repository
    // ==================
    /// Workspace store failure
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Versioning failure
    #[error("Version error: {0}")]
    Version(#[from] VersionError),

    /// Item is neither transient nor persistent
    #[error("Item not found: {0}")]
    ItemNotFound(ItemId),
}

impl SessionError {
    /// Returns true if the refresh failed at the cluster gate
    pub fn is_cluster_sync(&self) -> bool {
        matches!(self, SessionError::ClusterSync(_))
    }

    /// The versioning error, if this is one
    pub fn as_version_error(&self) -> Option<&VersionError> {
        match self {
            SessionError::Version(err) => Some(err),
            _ => None,
        }
    }
}
