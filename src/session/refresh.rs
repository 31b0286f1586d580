//! Session refresh
//!
//! Runs the cluster gate, then disposes or keeps the session's transient
//! state. The gate always completes before any entry is disposed; a gate
//! failure leaves the transient state untouched.

use crate::cluster::SyncGate;
use crate::observability::{log_event_with_fields, Event, MetricsRegistry};

use super::errors::{SessionError, SessionResult};
use super::transient::TransientStateManager;

/// One refresh request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionRefresh {
    keep_changes: bool,
    cluster_sync: bool,
}

/// Result of a completed refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshOutcome {
    /// Entries discarded
    pub disposed: usize,
    /// Entries kept
    pub retained: usize,
    /// Whether the cluster was synchronized first
    pub synced: bool,
}

impl SessionRefresh {
    pub fn new(keep_changes: bool, cluster_sync: bool) -> Self {
        Self {
            keep_changes,
            cluster_sync,
        }
    }

    pub fn keep_changes(&self) -> bool {
        self.keep_changes
    }

    pub fn cluster_sync(&self) -> bool {
        self.cluster_sync
    }

    pub fn perform(
        &self,
        gate: &SyncGate,
        transient: &mut TransientStateManager,
        metrics: Option<&MetricsRegistry>,
    ) -> SessionResult<RefreshOutcome> {
        let keep = if self.keep_changes { "true" } else { "false" };
        let sync = if self.cluster_sync { "true" } else { "false" };
        log_event_with_fields(
            Event::RefreshBegin,
            &[("cluster_sync", sync), ("keep_changes", keep)],
        );

        let synced = gate
            .sync_before_refresh(self.cluster_sync)
            .map_err(SessionError::ClusterSync)?
            .synced();

        let outcome = if self.keep_changes {
            // Stale entries stay as they are; see `Session::stale_items`.
            RefreshOutcome {
                disposed: 0,
                retained: transient.len(),
                synced,
            }
        } else {
            let disposed = transient.dispose_all();
            if disposed > 0 {
                let count = disposed.to_string();
                log_event_with_fields(Event::TransientDisposed, &[("count", count.as_str())]);
            }
            RefreshOutcome {
                disposed,
                retained: transient.len(),
                synced,
            }
        };

        if let Some(metrics) = metrics {
            metrics.increment_refreshes();
            metrics.add_transient_disposed(outcome.disposed as u64);
        }

        let (disposed, retained) = (outcome.disposed.to_string(), outcome.retained.to_string());
        log_event_with_fields(
            Event::RefreshComplete,
            &[
                ("disposed", disposed.as_str()),
                ("retained", retained.as_str()),
                ("synced", if synced { "true" } else { "false" }),
            ],
        );
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::{ClusterError, ClusterNode, ClusterResult};
    use crate::item::{NodeId, PropertyState, QName, Value};
    use std::sync::Arc;

    struct Down;

    impl ClusterNode for Down {
        fn node_id(&self) -> &str {
            "down"
        }

        fn sync(&self) -> ClusterResult<()> {
            Err(ClusterError::JournalUnavailable("unreachable".into()))
        }

        fn publish(&self, _changes: &[NodeId]) -> ClusterResult<()> {
            Ok(())
        }
    }

    fn populated(count: usize) -> TransientStateManager {
        let mut manager = TransientStateManager::new();
        let node = NodeId::new_v4();
        for i in 0..count {
            let state = PropertyState::single(QName::local(format!("p{}", i)), Value::Long(i as i64));
            manager.set_property(node, state, Some(1), false);
        }
        manager
    }

    #[test]
    fn test_discard_disposes_everything() {
        let mut transient = populated(3);
        let metrics = MetricsRegistry::new();

        let outcome = SessionRefresh::new(false, false)
            .perform(&SyncGate::default(), &mut transient, Some(&metrics))
            .unwrap();

        assert_eq!(outcome.disposed, 3);
        assert_eq!(outcome.retained, 0);
        assert!(!outcome.synced);
        assert!(transient.is_empty());
        assert_eq!(metrics.snapshot().transient_states_disposed, 3);
        assert_eq!(metrics.snapshot().refreshes, 1);
    }

    #[test]
    fn test_keep_changes_retains_entries() {
        let mut transient = populated(2);
        let outcome = SessionRefresh::new(true, true)
            .perform(&SyncGate::default(), &mut transient, None)
            .unwrap();

        assert_eq!(outcome.disposed, 0);
        assert_eq!(outcome.retained, 2);
        assert_eq!(transient.len(), 2);
    }

    #[test]
    fn test_gate_failure_leaves_entries() {
        let mut transient = populated(2);
        let gate = SyncGate::new(Some(Arc::new(Down)));

        let err = SessionRefresh::new(false, true)
            .perform(&gate, &mut transient, None)
            .unwrap_err();

        assert!(err.is_cluster_sync());
        assert_eq!(transient.len(), 2);
    }

    #[test]
    fn test_gate_skipped_when_not_requested() {
        let mut transient = populated(1);
        let gate = SyncGate::new(Some(Arc::new(Down)));

        let outcome = SessionRefresh::new(false, false)
            .perform(&gate, &mut transient, None)
            .unwrap();
        assert_eq!(outcome.disposed, 1);
    }
}
