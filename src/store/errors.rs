//! Store error types
//!
//! Error codes:
//! - ARBOR_STORE_ITEM_NOT_FOUND (ERROR severity)
//! - ARBOR_STORE_WRITE_FAILED (ERROR severity)
//! - ARBOR_STORE_UNAVAILABLE (ERROR severity)
//! - ARBOR_DATA_CORRUPTION (FATAL severity)

use std::error::Error as StdError;
use std::fmt;

/// Severity levels for store errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Operation fails, repository continues
    Error,
    /// Persistent state can no longer be trusted
    Fatal,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "ERROR"),
            Severity::Fatal => write!(f, "FATAL"),
        }
    }
}

/// Store-specific error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreErrorCode {
    /// Addressed node does not exist
    ArborStoreItemNotFound,
    /// Write rejected by the store
    ArborStoreWriteFailed,
    /// Store cannot be reached (e.g. poisoned lock)
    ArborStoreUnavailable,
    /// Persisted records are inconsistent
    ArborDataCorruption,
}

impl StoreErrorCode {
    /// Returns the string code
    pub fn code(&self) -> &'static str {
        match self {
            StoreErrorCode::ArborStoreItemNotFound => "ARBOR_STORE_ITEM_NOT_FOUND",
            StoreErrorCode::ArborStoreWriteFailed => "ARBOR_STORE_WRITE_FAILED",
            StoreErrorCode::ArborStoreUnavailable => "ARBOR_STORE_UNAVAILABLE",
            StoreErrorCode::ArborDataCorruption => "ARBOR_DATA_CORRUPTION",
        }
    }

    /// Returns the severity level for this error
    pub fn severity(&self) -> Severity {
        match self {
            StoreErrorCode::ArborDataCorruption => Severity::Fatal,
            _ => Severity::Error,
        }
    }
}

impl fmt::Display for StoreErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Store error with context
#[derive(Debug)]
pub struct StoreError {
    code: StoreErrorCode,
    message: String,
    details: Option<String>,
    source: Option<Box<dyn StdError + Send + Sync>>,
}

impl StoreError {
    fn new(code: StoreErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
            source: None,
        }
    }

    /// Addressed item does not exist
    pub fn not_found(item: impl fmt::Display) -> Self {
        Self::new(
            StoreErrorCode::ArborStoreItemNotFound,
            format!("No such item: {}", item),
        )
    }

    /// Write was rejected
    pub fn write_failed(message: impl Into<String>) -> Self {
        Self::new(StoreErrorCode::ArborStoreWriteFailed, message)
    }

    /// Write was rejected because of an underlying error
    pub fn write_failed_with(
        message: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self {
            source: Some(Box::new(source)),
            ..Self::write_failed(message)
        }
    }

    /// Store cannot be reached
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(StoreErrorCode::ArborStoreUnavailable, message)
    }

    /// Persisted records are inconsistent (FATAL)
    pub fn data_corruption(message: impl Into<String>) -> Self {
        Self::new(StoreErrorCode::ArborDataCorruption, message)
    }

    /// Attaches details about the affected item
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Returns the error code
    pub fn code(&self) -> StoreErrorCode {
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

    /// Returns additional error details
    pub fn details(&self) -> Option<&str> {
        self.details.as_deref()
    }

    /// Returns whether this error is fatal
    pub fn is_fatal(&self) -> bool {
        self.severity() == Severity::Fatal
    }

    /// Returns true if the addressed item does not exist
    pub fn is_not_found(&self) -> bool {
        self.code == StoreErrorCode::ArborStoreItemNotFound
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}: {}",
            self.code.severity(),
            self.code.code(),
            self.message
        )?;
        if let Some(ref details) = self.details {
            write!(f, " ({})", details)?;
        }
        Ok(())
    }
}

impl StdError for StoreError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn StdError + 'static))
    }
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;
