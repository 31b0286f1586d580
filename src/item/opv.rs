//! OnParentVersion actions
//!
//! Every property and child node definition declares what happens to the
//! item when its parent is checked in.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::ItemError;

/// Checkin policy of a single item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OnParentVersionAction {
    /// Item is copied into the frozen node.
    Copy,
    /// Item is versioned: properties are copied, versionable children are
    /// referenced through their version history.
    Version,
    /// Item is not frozen; a new one is initialized on restore.
    Initialize,
    /// Item is not frozen; it is recomputed on restore.
    Compute,
    /// Item is not frozen.
    Ignore,
    /// Presence of the item forbids checkin of the parent.
    Abort,
}

impl OnParentVersionAction {
    /// Returns the canonical upper-case name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Copy => "COPY",
            Self::Version => "VERSION",
            Self::Initialize => "INITIALIZE",
            Self::Compute => "COMPUTE",
            Self::Ignore => "IGNORE",
            Self::Abort => "ABORT",
        }
    }

    /// Returns true if the item is recorded in a frozen node.
    pub fn is_frozen(&self) -> bool {
        matches!(self, Self::Copy | Self::Version)
    }
}

impl Default for OnParentVersionAction {
    /// COPY, as for residual item definitions.
    fn default() -> Self {
        Self::Copy
    }
}

impl FromStr for OnParentVersionAction {
    type Err = ItemError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "COPY" => Ok(Self::Copy),
            "VERSION" => Ok(Self::Version),
            "INITIALIZE" => Ok(Self::Initialize),
            "COMPUTE" => Ok(Self::Compute),
            "IGNORE" => Ok(Self::Ignore),
            "ABORT" => Ok(Self::Abort),
            _ => Err(ItemError::UnknownAction(s.to_string())),
        }
    }
}

impl fmt::Display for OnParentVersionAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
