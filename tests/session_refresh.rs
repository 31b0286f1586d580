//! Session Refresh Tests
//!
//! Transient-state disposal and its ordering against the cluster gate.
//!
//! Test Categories:
//! 1. Discard without cluster sync
//! 2. Keep-changes with a failing cluster
//! 3. Sync-before-dispose ordering
//! 4. Stale-item detection

use std::sync::{Arc, Mutex};

use arbordb::cluster::{ClusterError, ClusterNode, ClusterResult};
use arbordb::item::{NodeId, PropertyState, QName, Value, NT_UNSTRUCTURED};
use arbordb::live::StaticDefinitions;
use arbordb::session::{
    ItemStateListener, Repository, Session, SessionConfig, SessionRefresh, TransientItemState,
};

// =============================================================================
// Helpers
// =============================================================================

type EventLog = Arc<Mutex<Vec<String>>>;

struct RecordingCluster {
    log: EventLog,
    fail: bool,
}

impl ClusterNode for RecordingCluster {
    fn node_id(&self) -> &str {
        "recording"
    }

    fn sync(&self) -> ClusterResult<()> {
        self.log.lock().unwrap().push("sync".into());
        if self.fail {
            Err(ClusterError::JournalUnavailable("journal offline".into()))
        } else {
            Ok(())
        }
    }

    fn publish(&self, _changes: &[NodeId]) -> ClusterResult<()> {
        Ok(())
    }
}

struct RecordingListener {
    log: EventLog,
}

impl ItemStateListener for RecordingListener {
    fn state_disposed(&self, state: &TransientItemState) {
        self.log
            .lock()
            .unwrap()
            .push(format!("dispose {}", state.status()));
    }
}

fn repository(cluster: Option<Arc<dyn ClusterNode>>) -> Arc<Repository> {
    let repository = Repository::in_memory(Arc::new(StaticDefinitions::builtin()));
    match cluster {
        Some(cluster) => Arc::new(repository.with_cluster(cluster)),
        None => Arc::new(repository),
    }
}

/// Saves one node, then leaves three transient property entries on it.
fn session_with_three_entries(repository: &Arc<Repository>) -> (Session, NodeId) {
    let mut session = repository.login();
    let root = session.root().unwrap();
    let node = session
        .add_node(root, QName::local("doc"), NT_UNSTRUCTURED)
        .unwrap();
    session.save().unwrap();

    for i in 0..3 {
        session
            .set_property(
                node,
                PropertyState::single(QName::local(format!("p{}", i)), Value::Long(i)),
            )
            .unwrap();
    }
    assert_eq!(session.transient().len(), 3);
    (session, node)
}

// =============================================================================
// SCENARIO 3: DISCARD WITHOUT SYNC
// =============================================================================

/// Test: refresh(keep=false, sync=false) disposes every entry and never
/// contacts the cluster.
#[test]
fn test_discard_without_sync_disposes_all() {
    let log = EventLog::default();
    let repository = repository(Some(Arc::new(RecordingCluster {
        log: Arc::clone(&log),
        fail: false,
    })));
    let (mut session, node) = session_with_three_entries(&repository);

    let outcome = session
        .refresh_with(SessionRefresh::new(false, false))
        .unwrap();

    assert_eq!(outcome.disposed, 3);
    assert!(!outcome.synced);
    assert!(!session.has_pending_changes());
    assert!(log.lock().unwrap().is_empty());
    assert!(session.property(node, &QName::local("p0")).unwrap().is_none());
}

/// Test: Disposal counts reach the repository metrics.
#[test]
fn test_discard_is_counted() {
    let repository = repository(None);
    let (mut session, _) = session_with_three_entries(&repository);

    session.refresh(false).unwrap();

    let metrics = repository.metrics().snapshot();
    assert_eq!(metrics.refreshes, 1);
    assert_eq!(metrics.transient_states_disposed, 3);
}

// =============================================================================
// SCENARIO 4: KEEP CHANGES WITH FAILING CLUSTER
// =============================================================================

/// Test: A failing sync surfaces as a cluster-sync error and leaves the
/// transient entries untouched.
#[test]
fn test_failing_sync_keeps_entries() {
    let log = EventLog::default();
    let repository = repository(Some(Arc::new(RecordingCluster {
        log: Arc::clone(&log),
        fail: true,
    })));
    let (mut session, node) = session_with_three_entries(&repository);

    let err = session
        .refresh_with(SessionRefresh::new(true, true))
        .unwrap_err();

    assert!(err.is_cluster_sync());
    assert!(err.to_string().contains("journal offline"));
    assert_eq!(session.transient().len(), 3);
    assert_eq!(
        session.property(node, &QName::local("p1")).unwrap().unwrap().first(),
        Some(&Value::Long(1))
    );
    assert_eq!(repository.metrics().snapshot().cluster_sync_failures, 1);
}

/// Test: A failing sync also blocks a discarding refresh.
#[test]
fn test_failing_sync_blocks_discard() {
    let repository = repository(Some(Arc::new(RecordingCluster {
        log: EventLog::default(),
        fail: true,
    })));
    let (mut session, _) = session_with_three_entries(&repository);

    assert!(session.refresh(false).unwrap_err().is_cluster_sync());
    assert_eq!(session.transient().len(), 3);
}

/// Test: Turning sync off in the session config skips the gate.
#[test]
fn test_config_disables_sync_on_refresh() {
    let log = EventLog::default();
    let repository = Arc::new(
        Repository::in_memory(Arc::new(StaticDefinitions::builtin()))
            .with_cluster(Arc::new(RecordingCluster {
                log: Arc::clone(&log),
                fail: true,
            }))
            .with_config(SessionConfig::without_cluster_sync()),
    );
    let (mut session, _) = session_with_three_entries(&repository);

    let outcome = session.refresh(false).unwrap();
    assert_eq!(outcome.disposed, 3);
    assert!(log.lock().unwrap().is_empty());
}

// =============================================================================
// ORDERING
// =============================================================================

/// Test: Sync completes before the first entry is disposed.
#[test]
fn test_sync_precedes_disposal() {
    let log = EventLog::default();
    let repository = repository(Some(Arc::new(RecordingCluster {
        log: Arc::clone(&log),
        fail: false,
    })));
    let (mut session, _) = session_with_three_entries(&repository);
    session.add_listener(Arc::new(RecordingListener {
        log: Arc::clone(&log),
    }));

    let outcome = session
        .refresh_with(SessionRefresh::new(false, true))
        .unwrap();
    assert!(outcome.synced);

    let log = log.lock().unwrap();
    assert_eq!(log.len(), 4);
    assert_eq!(log[0], "sync");
    assert!(log[1..].iter().all(|e| e.starts_with("dispose")));
}

/// Test: Without a cluster, requesting sync is a no-op.
#[test]
fn test_standalone_sync_request_is_noop() {
    let repository = repository(None);
    let (mut session, _) = session_with_three_entries(&repository);

    let outcome = session
        .refresh_with(SessionRefresh::new(false, true))
        .unwrap();
    assert!(!outcome.synced);
    assert_eq!(outcome.disposed, 3);
}

// =============================================================================
// STALE ITEMS
// =============================================================================

/// Test: keep_changes leaves entries alone even when another session saved
/// over them; stale detection reports them.
#[test]
fn test_keep_changes_retains_stale_entries() {
    let repository = repository(None);
    let (mut first, node) = session_with_three_entries(&repository);

    let mut second = repository.login();
    second
        .set_property(node, PropertyState::single(QName::local("p0"), Value::Long(99)))
        .unwrap();
    second.save().unwrap();

    let outcome = first.refresh(true).unwrap();
    assert_eq!(outcome.disposed, 0);
    assert_eq!(outcome.retained, 3);
    assert_eq!(first.stale_items().unwrap().len(), 3);
}
