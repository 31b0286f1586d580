//! In-process cluster journal
//!
//! An append-only revision log shared by the cluster nodes of one process.
//! Each record names the node that wrote it and the node ids it changed,
//! and carries a CRC32 over its payload. Checksums are verified when a
//! node replays records during `sync`.

use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::item::NodeId;
use crate::observability::{log_event_with_fields, Event, Logger};

use super::errors::{ClusterError, ClusterResult};
use super::ClusterNode;

/// One journal entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalRecord {
    /// Position in the journal, starting at 1
    pub revision: u64,
    /// Node id of the writer
    pub origin: String,
    /// Nodes changed by the writer's save
    pub changes: Vec<NodeId>,
    pub created: DateTime<Utc>,
    /// CRC32 of the payload (every other field)
    pub checksum: u32,
}

#[derive(Serialize)]
struct Payload<'a> {
    revision: u64,
    origin: &'a str,
    changes: &'a [NodeId],
    created: &'a DateTime<Utc>,
}

impl JournalRecord {
    /// Creates a record with a freshly computed checksum.
    pub fn new(
        revision: u64,
        origin: impl Into<String>,
        changes: Vec<NodeId>,
    ) -> ClusterResult<Self> {
        let mut record = Self {
            revision,
            origin: origin.into(),
            changes,
            created: Utc::now(),
            checksum: 0,
        };
        record.checksum = record.compute_checksum()?;
        Ok(record)
    }

    /// CRC32 over the serialized payload.
    pub fn compute_checksum(&self) -> ClusterResult<u32> {
        let payload = Payload {
            revision: self.revision,
            origin: &self.origin,
            changes: &self.changes,
            created: &self.created,
        };
        payload_checksum(self.revision, &payload)
    }

    /// Fails if the stored checksum does not match the payload.
    pub fn verify(&self) -> ClusterResult<()> {
        let actual = self.compute_checksum()?;
        if actual != self.checksum {
            return Err(ClusterError::CorruptedRecord {
                revision: self.revision,
                expected: self.checksum,
                actual,
            });
        }
        Ok(())
    }
}

fn payload_checksum<T: Serialize>(revision: u64, payload: &T) -> ClusterResult<u32> {
    let bytes = serde_json::to_vec(payload).map_err(|e| ClusterError::Encoding {
        revision,
        reason: e.to_string(),
    })?;
    Ok(crc32fast::hash(&bytes))
}

/// Shared append-only journal.
#[derive(Debug, Default)]
pub struct Journal {
    records: Mutex<Vec<JournalRecord>>,
}

impl Journal {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> ClusterResult<MutexGuard<'_, Vec<JournalRecord>>> {
        self.records
            .lock()
            .map_err(|_| ClusterError::JournalUnavailable("journal lock poisoned".into()))
    }

    /// Latest revision, 0 when empty.
    pub fn head(&self) -> ClusterResult<u64> {
        Ok(self.lock()?.last().map(|r| r.revision).unwrap_or(0))
    }

    /// Appends a new record and returns its revision.
    pub fn append(&self, origin: &str, changes: Vec<NodeId>) -> ClusterResult<u64> {
        let mut records = self.lock()?;
        let revision = records.last().map(|r| r.revision).unwrap_or(0) + 1;
        records.push(JournalRecord::new(revision, origin, changes)?);
        Ok(revision)
    }

    /// Appends a record received as-is, e.g. from a peer process.
    ///
    /// The revision must continue the journal. The checksum is not checked
    /// here; readers verify it on replay.
    pub fn append_record(&self, record: JournalRecord) -> ClusterResult<()> {
        let mut records = self.lock()?;
        let expected = records.last().map(|r| r.revision).unwrap_or(0) + 1;
        if record.revision != expected {
            return Err(ClusterError::OutOfOrder {
                expected,
                actual: record.revision,
            });
        }
        records.push(record);
        Ok(())
    }

    /// Records with a revision greater than `revision`, in order.
    pub fn records_after(&self, revision: u64) -> ClusterResult<Vec<JournalRecord>> {
        Ok(self
            .lock()?
            .iter()
            .filter(|r| r.revision > revision)
            .cloned()
            .collect())
    }

    pub fn len(&self) -> ClusterResult<usize> {
        Ok(self.lock()?.len())
    }

    pub fn is_empty(&self) -> ClusterResult<bool> {
        Ok(self.len()? == 0)
    }
}

/// Applies records written by other cluster nodes.
pub trait RecordConsumer: Send + Sync {
    fn apply(&self, record: &JournalRecord) -> Result<(), String>;
}

/// Cluster node backed by a shared `Journal`.
pub struct JournalClusterNode {
    node_id: String,
    journal: Arc<Journal>,
    consumers: Vec<Arc<dyn RecordConsumer>>,
    revision: Mutex<u64>,
}

impl JournalClusterNode {
    /// Joins the journal at revision 0; the first `sync` replays everything.
    pub fn new(node_id: impl Into<String>, journal: Arc<Journal>) -> Self {
        Self {
            node_id: node_id.into(),
            journal,
            consumers: Vec::new(),
            revision: Mutex::new(0),
        }
    }

    pub fn with_consumer(mut self, consumer: Arc<dyn RecordConsumer>) -> Self {
        self.consumers.push(consumer);
        self
    }

    /// Last journal revision this node has applied.
    pub fn local_revision(&self) -> ClusterResult<u64> {
        self.revision
            .lock()
            .map(|r| *r)
            .map_err(|_| ClusterError::JournalUnavailable("revision lock poisoned".into()))
    }

    fn apply(&self, record: &JournalRecord) -> ClusterResult<()> {
        if let Err(err) = record.verify() {
            let revision = record.revision.to_string();
            log_event_with_fields(
                Event::JournalCorruption,
                &[("node", self.node_id.as_str()), ("revision", revision.as_str())],
            );
            return Err(err);
        }
        for consumer in &self.consumers {
            consumer
                .apply(record)
                .map_err(|reason| ClusterError::Consumer {
                    revision: record.revision,
                    reason,
                })?;
        }
        Ok(())
    }
}

impl ClusterNode for JournalClusterNode {
    fn node_id(&self) -> &str {
        &self.node_id
    }

    /// Replays every record after the local revision. Stops at the first
    /// failing record; the local revision stays at the last applied one.
    fn sync(&self) -> ClusterResult<()> {
        let mut local = self
            .revision
            .lock()
            .map_err(|_| ClusterError::JournalUnavailable("revision lock poisoned".into()))?;

        let pending = self.journal.records_after(*local)?;
        let mut applied = 0usize;
        for record in &pending {
            if record.origin != self.node_id {
                self.apply(record)?;
                applied += 1;
            }
            *local = record.revision;
        }

        if applied > 0 {
            let (revision, applied) = (local.to_string(), applied.to_string());
            Logger::trace(
                "JOURNAL_REPLAYED",
                &[
                    ("applied", applied.as_str()),
                    ("node", self.node_id.as_str()),
                    ("revision", revision.as_str()),
                ],
            );
        }
        Ok(())
    }

    fn publish(&self, changes: &[NodeId]) -> ClusterResult<()> {
        if changes.is_empty() {
            return Ok(());
        }
        let revision = self.journal.append(&self.node_id, changes.to_vec())?;
        let (revision, count) = (revision.to_string(), changes.len().to_string());
        log_event_with_fields(
            Event::ClusterPublish,
            &[
                ("changes", count.as_str()),
                ("node", self.node_id.as_str()),
                ("revision", revision.as_str()),
            ],
        );
        Ok(())
    }
}
