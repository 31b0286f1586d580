//! Session Versioning Tests
//!
//! Version histories and checkins driven through a session against the
//! workspace and version stores.
//!
//! Test Categories:
//! 1. Versioned child references
//! 2. Version naming and predecessors
//! 3. Aborted checkins
//! 4. Preconditions
//! 5. Concurrent checkins

use std::sync::Arc;

use arbordb::item::{
    NodeId, OnParentVersionAction, PropertyState, QName, Value, JCR_BASE_VERSION,
    JCR_IS_CHECKED_OUT, MIX_VERSIONABLE, NT_UNSTRUCTURED,
};
use arbordb::live::StaticDefinitions;
use arbordb::session::{Repository, Session};
use arbordb::version::VersionErrorCode;

// =============================================================================
// Helpers
// =============================================================================

fn session(definitions: StaticDefinitions) -> Session {
    Arc::new(Repository::in_memory(Arc::new(definitions))).login()
}

fn versionable(session: &mut Session, parent: NodeId, name: &str) -> NodeId {
    let node = session
        .add_node(parent, QName::local(name), NT_UNSTRUCTURED)
        .unwrap();
    session.add_mixin(node, MIX_VERSIONABLE).unwrap();
    node
}

fn reference(session: &Session, node: NodeId, name: &QName) -> Option<NodeId> {
    session
        .property(node, name)
        .unwrap()
        .and_then(|p| p.first().and_then(Value::as_reference))
}

// =============================================================================
// SCENARIO 1: VERSIONED CHILD
// =============================================================================

/// Test: Checking in A with a COPY property and a versionable VERSION
/// child C freezes the property and references C's history and base.
#[test]
fn test_checkin_references_versioned_child() {
    let definitions =
        StaticDefinitions::builtin().with_child_rule(QName::local("c"), OnParentVersionAction::Version);
    let mut session = session(definitions);
    let root = session.root().unwrap();

    let a = versionable(&mut session, root, "a");
    session
        .set_property(a, PropertyState::single(QName::local("p"), Value::Long(42)))
        .unwrap();
    let c = versionable(&mut session, a, "c");
    session
        .set_property(c, PropertyState::single(QName::local("inner"), Value::Long(7)))
        .unwrap();
    session.save().unwrap();

    let c_info = session.add_version_history(c).unwrap();
    let a_info = session.add_version_history(a).unwrap();

    let version = session.checkin(a).unwrap();
    let frozen = session.frozen_node(version.id).unwrap();

    assert_eq!(
        frozen.frozen_property(&QName::local("p")).unwrap().first(),
        Some(&Value::Long(42))
    );
    let child = frozen.child(&QName::local("c")).unwrap();
    let history_ref = child.as_history_ref().unwrap();
    assert_eq!(history_ref.version_history(), c_info.version_history);
    assert_eq!(history_ref.base_version(), c_info.base_version);
    assert!(frozen.has_frozen_history(c_info.version_history));

    let history = session.version_history(a_info.version_history).unwrap();
    assert_eq!(history.versionable_id, a);
    assert_eq!(history.versions.len(), 2);
}

// =============================================================================
// NAMING
// =============================================================================

/// Test: Successive checkins form a chain 1.0, 1.1 with predecessors and
/// move the base version.
#[test]
fn test_successive_checkins_chain() {
    let mut session = session(StaticDefinitions::builtin());
    let root = session.root().unwrap();
    let a = versionable(&mut session, root, "a");
    session.save().unwrap();
    let info = session.add_version_history(a).unwrap();

    let first = session.checkin(a).unwrap();
    let second = session.checkin(a).unwrap();

    assert_eq!(first.name, QName::local("1.0"));
    assert_eq!(second.name, QName::local("1.1"));
    assert_eq!(first.predecessors, vec![info.base_version]);
    assert_eq!(second.predecessors, vec![first.id]);
    assert_eq!(reference(&session, a, &JCR_BASE_VERSION), Some(second.id));
    assert_eq!(
        session.property(a, &JCR_IS_CHECKED_OUT).unwrap().unwrap().first(),
        Some(&Value::Boolean(false))
    );

    let history = session.version_history(info.version_history).unwrap();
    assert!(history.root_version().is_some());
    assert_eq!(history.latest().map(|v| v.id), Some(second.id));
    assert_eq!(history.version("1.0").map(|v| v.id), Some(first.id));
}

// =============================================================================
// ABORT
// =============================================================================

/// Test: An ABORT child stops the checkin; the history keeps only its root
/// version and the base version stays put.
#[test]
fn test_abort_child_leaves_history_unchanged() {
    let definitions =
        StaticDefinitions::builtin().with_child_rule(QName::local("lock"), OnParentVersionAction::Abort);
    let mut session = session(definitions);
    let root = session.root().unwrap();
    let a = versionable(&mut session, root, "a");
    session
        .add_node(a, QName::local("lock"), NT_UNSTRUCTURED)
        .unwrap();
    session.save().unwrap();
    let info = session.add_version_history(a).unwrap();

    let err = session.checkin(a).unwrap_err();
    let version_err = err.as_version_error().unwrap();

    assert_eq!(version_err.code(), VersionErrorCode::ArborVersionAbort);
    assert!(version_err.message().contains("/a/lock"));
    assert!(!session.has_pending_changes());
    assert_eq!(reference(&session, a, &JCR_BASE_VERSION), Some(info.base_version));

    let history = session.version_history(info.version_history).unwrap();
    assert_eq!(history.versions.len(), 1);
    assert_eq!(session.repository().metrics().snapshot().checkins_aborted, 1);
}

// =============================================================================
// PRECONDITIONS
// =============================================================================

/// Test: A node without mix:versionable cannot get a history.
#[test]
fn test_history_requires_versionable_mixin() {
    let mut session = session(StaticDefinitions::builtin());
    let root = session.root().unwrap();
    let plain = session
        .add_node(root, QName::local("plain"), NT_UNSTRUCTURED)
        .unwrap();
    session.save().unwrap();

    let err = session.add_version_history(plain).unwrap_err();
    assert_eq!(
        err.as_version_error().map(|e| e.code()),
        Some(VersionErrorCode::ArborVersionNotVersionable)
    );
}

/// Test: Unsaved changes on the node block a checkin.
#[test]
fn test_pending_changes_block_checkin() {
    let mut session = session(StaticDefinitions::builtin());
    let root = session.root().unwrap();
    let a = versionable(&mut session, root, "a");
    session.save().unwrap();
    session.add_version_history(a).unwrap();

    session
        .set_property(a, PropertyState::single(QName::local("draft"), Value::Boolean(true)))
        .unwrap();

    let err = session.checkin(a).unwrap_err();
    assert_eq!(
        err.as_version_error().map(|e| e.code()),
        Some(VersionErrorCode::ArborVersionPendingChanges)
    );
}

// =============================================================================
// CONCURRENCY
// =============================================================================

/// Test: Concurrent checkins of one node from separate sessions form a
/// linear chain and the base version ends on the newest version.
#[test]
fn test_concurrent_checkins_form_linear_chain() {
    let repository = Arc::new(Repository::in_memory(Arc::new(StaticDefinitions::builtin())));
    let mut session = repository.login();
    let root = session.root().unwrap();
    let a = versionable(&mut session, root, "a");
    session.save().unwrap();
    let info = session.add_version_history(a).unwrap();

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let repository = Arc::clone(&repository);
            std::thread::spawn(move || repository.login().checkin(a).unwrap())
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let history = session.version_history(info.version_history).unwrap();
    assert_eq!(history.versions.len(), 9);
    for (previous, version) in history.versions.iter().zip(history.versions.iter().skip(1)) {
        assert_eq!(version.predecessors, vec![previous.id]);
        assert!(!version.name.local_name().contains("rootVersion"));
    }
    assert_eq!(history.versions[1].name, QName::local("1.0"));
    assert_eq!(history.versions[8].name, QName::local("1.7"));
    assert_eq!(
        reference(&session, a, &JCR_BASE_VERSION),
        history.latest().map(|v| v.id)
    );
}
