//! Version error types
//!
//! Error codes:
//! - ARBOR_VERSION_ABORT (ERROR) - an item with OPV ABORT stopped a checkin
//! - ARBOR_VERSION_DATA_INTEGRITY (FATAL) - a persisted frozen item is malformed
//! - ARBOR_VERSION_STORE_ACCESS (ERROR) - the persistent store failed
//! - ARBOR_VERSION_NOT_VERSIONABLE (ERROR)
//! - ARBOR_VERSION_PENDING_CHANGES (ERROR)
//! - ARBOR_VERSION_ILLEGAL_STATE (ERROR) - checkin phase machine misuse

use std::error::Error as StdError;
use std::fmt;

use crate::store::{Severity, StoreError, StoreResult};

/// Version-specific error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionErrorCode {
    ArborVersionAbort,
    ArborVersionDataIntegrity,
    ArborVersionStoreAccess,
    ArborVersionNotVersionable,
    ArborVersionPendingChanges,
    ArborVersionIllegalState,
}

impl VersionErrorCode {
    /// Returns the string code
    pub fn code(&self) -> &'static str {
        match self {
            VersionErrorCode::ArborVersionAbort => "ARBOR_VERSION_ABORT",
            VersionErrorCode::ArborVersionDataIntegrity => "ARBOR_VERSION_DATA_INTEGRITY",
            VersionErrorCode::ArborVersionStoreAccess => "ARBOR_VERSION_STORE_ACCESS",
            VersionErrorCode::ArborVersionNotVersionable => "ARBOR_VERSION_NOT_VERSIONABLE",
            VersionErrorCode::ArborVersionPendingChanges => "ARBOR_VERSION_PENDING_CHANGES",
            VersionErrorCode::ArborVersionIllegalState => "ARBOR_VERSION_ILLEGAL_STATE",
        }
    }

    /// Returns the severity level for this error
    pub fn severity(&self) -> Severity {
        match self {
            VersionErrorCode::ArborVersionDataIntegrity => Severity::Fatal,
            _ => Severity::Error,
        }
    }
}

impl fmt::Display for VersionErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Version error with the item it concerns
#[derive(Debug)]
pub struct VersionError {
    code: VersionErrorCode,
    message: String,
    item: Option<String>,
    source: Option<StoreError>,
}

impl VersionError {
    fn new(code: VersionErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            item: None,
            source: None,
        }
    }

    /// Checkin stopped by an item whose OPV is ABORT
    pub fn abort(path: impl fmt::Display) -> Self {
        let item = path.to_string();
        Self {
            item: Some(item.clone()),
            ..Self::new(
                VersionErrorCode::ArborVersionAbort,
                format!("Checkin aborted due to OPV in {}", item),
            )
        }
    }

    /// Persisted frozen item is malformed
    pub fn data_integrity(message: impl Into<String>) -> Self {
        Self::new(VersionErrorCode::ArborVersionDataIntegrity, message)
    }

    /// Store failure during `operation` on `item`
    pub fn store(operation: &str, item: impl fmt::Display, source: StoreError) -> Self {
        let item = item.to_string();
        Self {
            code: VersionErrorCode::ArborVersionStoreAccess,
            message: format!("{} failed for {}", operation, item),
            item: Some(item),
            source: Some(source),
        }
    }

    /// Node has no version history
    pub fn not_versionable(path: impl fmt::Display) -> Self {
        let item = path.to_string();
        Self {
            item: Some(item.clone()),
            ..Self::new(
                VersionErrorCode::ArborVersionNotVersionable,
                format!("Node {} is not versionable", item),
            )
        }
    }

    /// Node has unsaved changes
    pub fn pending_changes(path: impl fmt::Display) -> Self {
        let item = path.to_string();
        Self {
            item: Some(item.clone()),
            ..Self::new(
                VersionErrorCode::ArborVersionPendingChanges,
                format!("Node {} has pending changes", item),
            )
        }
    }

    /// Forbidden checkin phase transition
    pub fn illegal_state(from: &str, to: &str) -> Self {
        Self::new(
            VersionErrorCode::ArborVersionIllegalState,
            format!("Illegal checkin phase transition: {} -> {}", from, to),
        )
    }

    /// Returns the error code
    pub fn code(&self) -> VersionErrorCode {
        self.code
    }

    /// Returns the severity level
    pub fn severity(&self) -> Severity {
        self.code.severity()
    }

    /// Returns the error message
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the item this error concerns
    pub fn item(&self) -> Option<&str> {
        self.item.as_deref()
    }

    /// Returns the wrapped store error
    pub fn store_error(&self) -> Option<&StoreError> {
        self.source.as_ref()
    }

    /// Fatal if the code is fatal or the wrapped store error is
    pub fn is_fatal(&self) -> bool {
        self.severity() == Severity::Fatal
            || self.source.as_ref().map(StoreError::is_fatal).unwrap_or(false)
    }

    pub fn is_abort(&self) -> bool {
        self.code == VersionErrorCode::ArborVersionAbort
    }
}

impl fmt::Display for VersionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}: {}",
            self.code.severity(),
            self.code.code(),
            self.message
        )?;
        if let Some(ref source) = self.source {
            write!(f, " (caused by: {})", source)?;
        }
        Ok(())
    }
}

impl StdError for VersionError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source.as_ref().map(|e| e as &(dyn StdError + 'static))
    }
}

/// Result type for version operations
pub type VersionResult<T> = Result<T, VersionError>;

/// Attaches operation and item context to store results.
pub(crate) trait StoreContext<T> {
    fn context(self, operation: &str, item: impl fmt::Display) -> VersionResult<T>;
}

impl<T> StoreContext<T> for StoreResult<T> {
    fn context(self, operation: &str, item: impl fmt::Display) -> VersionResult<T> {
        self.map_err(|e| VersionError::store(operation, item, e))
    }
}
