//! Repository counters
//!
//! - Counters only, monotonic
//! - Reset only when the registry is created
//! - Relaxed atomics; exact totals, no cross-counter ordering

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Operational counters shared by the version manager and sessions.
#[derive(Debug, Default)]
pub struct MetricsRegistry {
    /// Checkins that produced a frozen tree
    checkins_completed: AtomicU64,
    /// Checkins stopped by an ABORT item
    checkins_aborted: AtomicU64,
    /// `nt:frozenNode` records written
    frozen_nodes_created: AtomicU64,
    /// `nt:versionedChild` records written
    history_refs_created: AtomicU64,
    /// Properties copied into frozen nodes
    properties_frozen: AtomicU64,
    /// Versions added to histories
    versions_created: AtomicU64,
    /// Session saves
    saves: AtomicU64,
    /// Session refreshes
    refreshes: AtomicU64,
    /// Transient states discarded by refresh
    transient_states_disposed: AtomicU64,
    /// Successful cluster synchronizations
    cluster_syncs: AtomicU64,
    /// Failed cluster synchronizations
    cluster_sync_failures: AtomicU64,
}

impl MetricsRegistry {
    /// Create a registry with all counters at zero
    pub fn new() -> Self {
        Self::default()
    }

    // Versioning

    pub fn increment_checkins_completed(&self) {
        self.checkins_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_checkins_aborted(&self) {
        self.checkins_aborted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_frozen_nodes(&self) {
        self.frozen_nodes_created.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_history_refs(&self) {
        self.history_refs_created.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_properties_frozen(&self, count: u64) {
        self.properties_frozen.fetch_add(count, Ordering::Relaxed);
    }

    pub fn increment_versions(&self) {
        self.versions_created.fetch_add(1, Ordering::Relaxed);
    }

    // Session

    pub fn increment_saves(&self) {
        self.saves.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_refreshes(&self) {
        self.refreshes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_transient_disposed(&self, count: u64) {
        self.transient_states_disposed
            .fetch_add(count, Ordering::Relaxed);
    }

    // Cluster

    pub fn increment_cluster_syncs(&self) {
        self.cluster_syncs.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_cluster_sync_failures(&self) {
        self.cluster_sync_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Point-in-time copy of every counter
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            checkins_completed: self.checkins_completed.load(Ordering::Relaxed),
            checkins_aborted: self.checkins_aborted.load(Ordering::Relaxed),
            frozen_nodes_created: self.frozen_nodes_created.load(Ordering::Relaxed),
            history_refs_created: self.history_refs_created.load(Ordering::Relaxed),
            properties_frozen: self.properties_frozen.load(Ordering::Relaxed),
            versions_created: self.versions_created.load(Ordering::Relaxed),
            saves: self.saves.load(Ordering::Relaxed),
            refreshes: self.refreshes.load(Ordering::Relaxed),
            transient_states_disposed: self.transient_states_disposed.load(Ordering::Relaxed),
            cluster_syncs: self.cluster_syncs.load(Ordering::Relaxed),
            cluster_sync_failures: self.cluster_sync_failures.load(Ordering::Relaxed),
        }
    }

    /// Current counters as a JSON object
    pub fn to_json(&self) -> String {
        serde_json::to_string(&self.snapshot()).unwrap_or_else(|_| "{}".to_string())
    }
}

/// A point-in-time copy of all counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub checkins_completed: u64,
    pub checkins_aborted: u64,
    pub frozen_nodes_created: u64,
    pub history_refs_created: u64,
    pub properties_frozen: u64,
    pub versions_created: u64,
    pub saves: u64,
    pub refreshes: u64,
    pub transient_states_disposed: u64,
    pub cluster_syncs: u64,
    pub cluster_sync_failures: u64,
}
