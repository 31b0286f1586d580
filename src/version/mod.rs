//! Versioning engine
//!
//! - `frozen`: read-only model of persisted snapshots
//! - `checkin`: builds a frozen subtree from a live node under OPV rules
//! - `history`: version histories and versions around the builder
//!
//! All writes go to a version store separate from the workspace store.

mod checkin;
mod errors;
mod frozen;
mod history;

pub use checkin::{checkin, CheckinMode, CheckinPhase};
pub use errors::{VersionError, VersionErrorCode, VersionResult};
pub use frozen::{is_reserved, FrozenItem, FrozenNode, FrozenVersionHistoryRef};
pub use history::{VersionHistory, VersionManager, VersionRecord};
