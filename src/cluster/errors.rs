//! Cluster errors

use thiserror::Error;

/// Result type for cluster operations
pub type ClusterResult<T> = Result<T, ClusterError>;

/// Cluster errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClusterError {
    // ==================
    // Journal
    // ==================
    /// Journal cannot be read or written (e.g. poisoned lock)
    #[error("Journal unavailable: {0}")]
    JournalUnavailable(String),

    /// Stored checksum does not match the record payload
    #[error("Corrupted journal record at revision {revision}: expected checksum {expected:08x}, found {actual:08x}")]
    CorruptedRecord {
        revision: u64,
        expected: u32,
        actual: u32,
    },

    /// Record payload could not be serialized for its checksum
    #[error("Cannot encode journal record at revision {revision}: {reason}")]
    Encoding { revision: u64, reason: String },

    /// Appended record does not continue the journal
    #[error("Out-of-order journal record: expected revision {expected}, got {actual}")]
    OutOfOrder { expected: u64, actual: u64 },

    // ==================
    // Sync
    // ==================
    /// A consumer rejected a replayed record
    #[error("Record consumer failed at revision {revision}: {reason}")]
    Consumer { revision: u64, reason: String },

    // ==================
    // Configuration
    // ==================
    /// Invalid cluster configuration
    #[error("Invalid cluster configuration: {0}")]
    InvalidConfig(String),
}

impl ClusterError {
    /// Returns true if journal content can no longer be trusted
    pub fn is_corruption(&self) -> bool {
        matches!(self, ClusterError::CorruptedRecord { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_corrupted_record_display() {
        let err = ClusterError::CorruptedRecord {
            revision: 3,
            expected: 0xdeadbeef,
            actual: 0x1,
        };
        let display = err.to_string();
        assert!(display.contains("revision 3"));
        assert!(display.contains("deadbeef"));
        assert!(display.contains("00000001"));
        assert!(err.is_corruption());
    }

    #[test]
    fn test_consumer_error_is_not_corruption() {
        let err = ClusterError::Consumer {
            revision: 1,
            reason: "busy".into(),
        };
        assert!(!err.is_corruption());
    }
}
