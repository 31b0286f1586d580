//! Observable events
//!
//! Every lifecycle step that reaches the log is named here. Names are
//! UPPER_SNAKE and stable.

use std::fmt;

/// Observable repository events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Configuration
    /// Configuration file loaded and validated
    ConfigLoaded,

    // Versioning
    /// Frozen snapshot build started
    CheckinBegin,
    /// Frozen snapshot build finished
    CheckinComplete,
    /// Frozen snapshot build aborted by an ABORT item
    CheckinAborted,
    /// A persisted frozen node failed validation (FATAL)
    FrozenNodeCorrupted,
    /// Version history created for a versionable node
    VersionHistoryCreated,
    /// New version added to a history
    VersionCreated,

    // Session
    /// Transient changes promoted and saved
    SessionSave,
    /// Refresh started
    RefreshBegin,
    /// Refresh finished
    RefreshComplete,
    /// Transient item state discarded
    TransientDisposed,

    // Cluster
    /// Synchronization with the cluster started
    ClusterSyncBegin,
    /// Synchronization with the cluster finished
    ClusterSyncComplete,
    /// Synchronization with the cluster failed
    ClusterSyncFailed,
    /// Local changes appended to the journal
    ClusterPublish,
    /// Journal record failed its checksum (FATAL)
    JournalCorruption,
}

impl Event {
    /// Returns the string representation of the event
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::ConfigLoaded => "CONFIG_LOADED",

            Event::CheckinBegin => "CHECKIN_BEGIN",
            Event::CheckinComplete => "CHECKIN_COMPLETE",
            Event::CheckinAborted => "CHECKIN_ABORTED",
            Event::FrozenNodeCorrupted => "FROZEN_NODE_CORRUPTED",
            Event::VersionHistoryCreated => "VERSION_HISTORY_CREATED",
            Event::VersionCreated => "VERSION_CREATED",

            Event::SessionSave => "SESSION_SAVE",
            Event::RefreshBegin => "REFRESH_BEGIN",
            Event::RefreshComplete => "REFRESH_COMPLETE",
            Event::TransientDisposed => "TRANSIENT_DISPOSED",

            Event::ClusterSyncBegin => "CLUSTER_SYNC_BEGIN",
            Event::ClusterSyncComplete => "CLUSTER_SYNC_COMPLETE",
            Event::ClusterSyncFailed => "CLUSTER_SYNC_FAILED",
            Event::ClusterPublish => "CLUSTER_PUBLISH",
            Event::JournalCorruption => "JOURNAL_CORRUPTION",
        }
    }

    /// Returns true if this event indicates a fatal condition
    pub fn is_fatal(&self) -> bool {
        matches!(self, Event::FrozenNodeCorrupted | Event::JournalCorruption)
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_events_are_upper_snake() {
        let events = [
            Event::ConfigLoaded,
            Event::CheckinBegin,
            Event::CheckinComplete,
            Event::CheckinAborted,
            Event::FrozenNodeCorrupted,
            Event::VersionHistoryCreated,
            Event::VersionCreated,
            Event::SessionSave,
            Event::RefreshBegin,
            Event::RefreshComplete,
            Event::TransientDisposed,
            Event::ClusterSyncBegin,
            Event::ClusterSyncComplete,
            Event::ClusterSyncFailed,
            Event::ClusterPublish,
            Event::JournalCorruption,
        ];

        for event in events {
            let s = event.as_str();
            assert!(!s.is_empty());
            assert!(s.chars().all(|c| c.is_ascii_uppercase() || c == '_'));
        }
    }

    #[test]
    fn test_fatal_events() {
        assert!(Event::JournalCorruption.is_fatal());
        assert!(Event::FrozenNodeCorrupted.is_fatal());
        assert!(!Event::CheckinAborted.is_fatal());
        assert!(!Event::ClusterSyncFailed.is_fatal());
    }

    #[test]
    fn test_event_display() {
        assert_eq!(format!("{}", Event::RefreshComplete), "REFRESH_COMPLETE");
    }
}
