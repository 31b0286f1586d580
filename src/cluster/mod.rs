//! Cluster synchronization
//!
//! A repository may be one node of a cluster sharing a journal of saved
//! changes. Before a session discards its transient state on refresh it
//! can ask the cluster to catch up, so that the durable state it falls
//! back to includes every change other nodes have published.
//!
//! - `ClusterNode`: what the session layer needs from a cluster
//! - `SyncGate`: runs the catch-up only when requested and clustered
//! - `Journal` / `JournalClusterNode`: in-process implementation

mod config;
mod errors;
mod journal;

pub use config::ClusterConfig;
pub use errors::{ClusterError, ClusterResult};
pub use journal::{Journal, JournalClusterNode, JournalRecord, RecordConsumer};

use std::sync::Arc;
use std::time::Instant;

use crate::item::NodeId;
use crate::observability::{log_event_with_fields, Event, Logger, MetricsRegistry};

/// A member of a repository cluster.
pub trait ClusterNode: Send + Sync {
    /// Identity of this node in the journal.
    fn node_id(&self) -> &str;

    /// Blocks until every change published by other nodes is applied.
    fn sync(&self) -> ClusterResult<()>;

    /// Announces locally saved changes to the other nodes.
    fn publish(&self, changes: &[NodeId]) -> ClusterResult<()>;
}

/// What the gate did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateOutcome {
    /// Cluster synchronized
    Synced,
    /// Synchronization was not requested
    NotRequested,
    /// Repository is not clustered
    Standalone,
}

impl GateOutcome {
    pub fn synced(&self) -> bool {
        *self == GateOutcome::Synced
    }
}

/// Decides whether a refresh must catch up with the cluster first.
#[derive(Clone, Default)]
pub struct SyncGate {
    cluster: Option<Arc<dyn ClusterNode>>,
    metrics: Option<Arc<MetricsRegistry>>,
}

impl SyncGate {
    pub fn new(cluster: Option<Arc<dyn ClusterNode>>) -> Self {
        Self {
            cluster,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<MetricsRegistry>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn is_clustered(&self) -> bool {
        self.cluster.is_some()
    }

    /// Synchronizes with the cluster if one is configured and `requested`.
    ///
    /// Blocks the caller until `sync` returns. Failures are returned as-is
    /// for the caller to wrap.
    pub fn sync_before_refresh(&self, requested: bool) -> ClusterResult<GateOutcome> {
        let cluster = match self.cluster {
            Some(ref cluster) => cluster,
            None => return Ok(GateOutcome::Standalone),
        };
        if !requested {
            return Ok(GateOutcome::NotRequested);
        }

        let node = cluster.node_id();
        log_event_with_fields(Event::ClusterSyncBegin, &[("node", node)]);
        let started = Instant::now();
        match cluster.sync() {
            Ok(()) => {
                if let Some(ref metrics) = self.metrics {
                    metrics.increment_cluster_syncs();
                }
                let elapsed = started.elapsed().as_millis().to_string();
                log_event_with_fields(
                    Event::ClusterSyncComplete,
                    &[("elapsed_ms", elapsed.as_str()), ("node", node)],
                );
                Ok(GateOutcome::Synced)
            }
            Err(err) => {
                if let Some(ref metrics) = self.metrics {
                    metrics.increment_cluster_sync_failures();
                }
                let reason = err.to_string();
                Logger::error(
                    Event::ClusterSyncFailed.as_str(),
                    &[("node", node), ("reason", reason.as_str())],
                );
                Err(err)
            }
        }
    }

    /// Publishes saved changes if clustered.
    pub fn publish(&self, changes: &[NodeId]) -> ClusterResult<()> {
        match self.cluster {
            Some(ref cluster) => cluster.publish(changes),
            None => Ok(()),
        }
    }
}
