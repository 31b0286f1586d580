//! CLI-specific error types
//!
//! Every CLI error ends the process; `exit_code` tells the caller which
//! stage failed.

use std::fmt;
use std::io;

use crate::item::ItemError;
use crate::session::SessionError;
use crate::version::VersionError;

/// CLI error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CliErrorCode {
    /// Configuration file error
    ConfigError,
    /// I/O error (files, stdout)
    IoError,
    /// Content file cannot be imported
    ContentError,
    /// Repository operation failed
    RepositoryError,
}

impl CliErrorCode {
    /// Get the error code string
    pub fn code(&self) -> &'static str {
        match self {
            Self::ConfigError => "ARBOR_CLI_CONFIG_ERROR",
            Self::IoError => "ARBOR_CLI_IO_ERROR",
            Self::ContentError => "ARBOR_CLI_CONTENT_ERROR",
            Self::RepositoryError => "ARBOR_CLI_REPOSITORY_ERROR",
        }
    }

    /// Process exit code
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConfigError => 2,
            Self::IoError => 3,
            Self::ContentError => 4,
            Self::RepositoryError => 5,
        }
    }
}

/// CLI error
#[derive(Debug)]
pub struct CliError {
    code: CliErrorCode,
    message: String,
}

impl CliError {
    /// Create a new CLI error
    pub fn new(code: CliErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Config error
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::ConfigError, msg)
    }

    /// I/O error
    pub fn io_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::IoError, msg)
    }

    /// Content error
    pub fn content_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::ContentError, msg)
    }

    /// Repository error
    pub fn repository_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::RepositoryError, msg)
    }

    /// Get the error code
    pub fn code(&self) -> CliErrorCode {
        self.code
    }

    /// Get the error code string
    pub fn code_str(&self) -> &'static str {
        self.code.code()
    }

    /// Get the error message
    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn exit_code(&self) -> i32 {
        self.code.exit_code()
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code.code(), self.message)
    }
}

impl std::error::Error for CliError {}

impl From<io::Error> for CliError {
    fn from(e: io::Error) -> Self {
        Self::io_error(e.to_string())
    }
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        Self::io_error(format!("JSON error: {}", e))
    }
}

impl From<ItemError> for CliError {
    fn from(e: ItemError) -> Self {
        Self::content_error(e.to_string())
    }
}

impl From<SessionError> for CliError {
    fn from(e: SessionError) -> Self {
        Self::repository_error(e.to_string())
    }
}

impl From<VersionError> for CliError {
    fn from(e: VersionError) -> Self {
        Self::repository_error(e.to_string())
    }
}

/// CLI result type
pub type CliResult<T> = Result<T, CliError>;
