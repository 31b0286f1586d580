//! Cluster Sync Tests
//!
//! Two repositories sharing one journal, exercised through sessions.
//!
//! Test Categories:
//! 1. Publish on save, replay on refresh
//! 2. Corrupted journal records
//! 3. Consumer failures

use std::sync::{Arc, Mutex};

use arbordb::cluster::{ClusterError, Journal, JournalClusterNode, JournalRecord, RecordConsumer};
use arbordb::item::{NodeId, PropertyState, QName, Value, NT_UNSTRUCTURED};
use arbordb::live::StaticDefinitions;
use arbordb::session::{Repository, SessionError, SessionRefresh};

// =============================================================================
// Helpers
// =============================================================================

#[derive(Default)]
struct ChangeRecorder {
    seen: Mutex<Vec<(u64, Vec<NodeId>)>>,
}

impl RecordConsumer for ChangeRecorder {
    fn apply(&self, record: &JournalRecord) -> Result<(), String> {
        self.seen
            .lock()
            .unwrap()
            .push((record.revision, record.changes.clone()));
        Ok(())
    }
}

struct Refusing;

impl RecordConsumer for Refusing {
    fn apply(&self, record: &JournalRecord) -> Result<(), String> {
        Err(format!("cannot apply revision {}", record.revision))
    }
}

fn clustered(node: Arc<JournalClusterNode>) -> Arc<Repository> {
    Arc::new(Repository::in_memory(Arc::new(StaticDefinitions::builtin())).with_cluster(node))
}

// =============================================================================
// PUBLISH AND REPLAY
// =============================================================================

/// Test: A save on one node is replayed on the other node's next
/// synchronized refresh.
#[test]
fn test_save_is_replayed_on_peer_refresh() {
    let journal = Arc::new(Journal::new());
    let recorder = Arc::new(ChangeRecorder::default());
    let writer_node = Arc::new(JournalClusterNode::new("writer", Arc::clone(&journal)));
    let reader_node = Arc::new(
        JournalClusterNode::new("reader", Arc::clone(&journal)).with_consumer(recorder.clone()),
    );
    let writer = clustered(writer_node);
    let reader = clustered(Arc::clone(&reader_node));

    let mut session = writer.login();
    let root = session.root().unwrap();
    let doc = session
        .add_node(root, QName::local("doc"), NT_UNSTRUCTURED)
        .unwrap();
    session.save().unwrap();
    assert_eq!(journal.head().unwrap(), 1);

    let mut peer = reader.login();
    let outcome = peer.refresh_with(SessionRefresh::new(false, true)).unwrap();

    assert!(outcome.synced);
    assert_eq!(reader_node.local_revision().unwrap(), 1);
    let seen = recorder.seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert!(seen[0].1.contains(&doc));
    assert!(seen[0].1.contains(&root));
}

/// Test: A node never replays its own records.
#[test]
fn test_own_saves_are_not_replayed() {
    let journal = Arc::new(Journal::new());
    let recorder = Arc::new(ChangeRecorder::default());
    let node = Arc::new(
        JournalClusterNode::new("solo", Arc::clone(&journal)).with_consumer(recorder.clone()),
    );
    let repository = clustered(Arc::clone(&node));

    let mut session = repository.login();
    let root = session.root().unwrap();
    session
        .add_node(root, QName::local("doc"), NT_UNSTRUCTURED)
        .unwrap();
    session.save().unwrap();
    session.refresh(false).unwrap();

    assert!(recorder.seen.lock().unwrap().is_empty());
    assert_eq!(node.local_revision().unwrap(), 1);
    assert_eq!(repository.metrics().snapshot().cluster_syncs, 1);
}

// =============================================================================
// CORRUPTION
// =============================================================================

/// Test: A record whose checksum does not match stops the replay; the
/// refresh fails and the session keeps its changes.
#[test]
fn test_corrupted_record_fails_refresh() {
    let journal = Arc::new(Journal::new());
    journal.append("peer", vec![NodeId::new_v4()]).unwrap();
    let mut tampered = JournalRecord::new(2, "peer", vec![NodeId::new_v4()]).unwrap();
    tampered.changes.push(NodeId::new_v4());
    journal.append_record(tampered).unwrap();

    let node = Arc::new(JournalClusterNode::new("reader", Arc::clone(&journal)));
    let repository = clustered(Arc::clone(&node));

    let mut session = repository.login();
    let root = session.root().unwrap();
    session
        .set_property(root, PropertyState::single(QName::local("draft"), Value::Long(1)))
        .unwrap();

    let err = session.refresh(false).unwrap_err();
    match err {
        SessionError::ClusterSync(ClusterError::CorruptedRecord { revision, .. }) => {
            assert_eq!(revision, 2)
        }
        other => panic!("expected corrupted record, got {:?}", other),
    }
    assert!(session.has_pending_changes());
    assert_eq!(node.local_revision().unwrap(), 1);
}

// =============================================================================
// CONSUMER FAILURES
// =============================================================================

/// Test: A consumer failure surfaces with the failing revision and is
/// retried on the next sync.
#[test]
fn test_consumer_failure_is_reported_and_retried() {
    let journal = Arc::new(Journal::new());
    journal.append("peer", vec![NodeId::new_v4()]).unwrap();
    let node = Arc::new(
        JournalClusterNode::new("reader", Arc::clone(&journal)).with_consumer(Arc::new(Refusing)),
    );
    let repository = clustered(Arc::clone(&node));
    let mut session = repository.login();

    for _ in 0..2 {
        let err = session.refresh(true).unwrap_err();
        match err {
            SessionError::ClusterSync(ClusterError::Consumer { revision, reason }) => {
                assert_eq!(revision, 1);
                assert!(reason.contains("revision 1"));
            }
            other => panic!("expected consumer failure, got {:?}", other),
        }
    }
    assert_eq!(node.local_revision().unwrap(), 0);
    assert_eq!(repository.metrics().snapshot().cluster_sync_failures, 2);
}
