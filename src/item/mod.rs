//! Item vocabulary
//!
//! Shared building blocks for every layer of the repository:
//! - `QName` - namespace-qualified item and type names
//! - `NodeId` / `ItemId` - identities of persisted nodes and properties
//! - `Value` / `PropertyState` - typed property values
//! - `OnParentVersionAction` - the per-item checkin policy
//!
//! Reserved names used by the versioning engine live in `name`.

mod id;
mod name;
mod opv;
mod value;

pub use id::{ItemId, NodeId};
pub use name::{
    QName, JCR_BASE_VERSION, JCR_CHILD_VERSION_HISTORY, JCR_CREATED, JCR_FROZEN_MIXIN_TYPES,
    JCR_FROZEN_NODE, JCR_FROZEN_PRIMARY_TYPE, JCR_FROZEN_UUID, JCR_IS_CHECKED_OUT,
    JCR_MIXIN_TYPES, JCR_PREDECESSORS, JCR_PRIMARY_TYPE, JCR_ROOT_VERSION, JCR_UUID,
    JCR_VERSIONABLE_UUID, JCR_VERSION_HISTORY, MIX_REFERENCEABLE, MIX_VERSIONABLE, NS_DEFAULT,
    NS_JCR, NS_MIX, NS_NT, NS_REP, NT_FROZEN_NODE, NT_UNSTRUCTURED, NT_VERSION,
    NT_VERSIONED_CHILD, NT_VERSION_HISTORY, REP_ROOT, REP_VERSION_STORAGE,
};
pub use opv::OnParentVersionAction;
pub use value::{PropertyState, PropertyType, PropertyValue, Value};

use thiserror::Error;

/// Result type for item vocabulary parsing
pub type ItemResult<T> = Result<T, ItemError>;

/// Errors raised while parsing names, values or policies
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ItemError {
    /// Name is not of the form `prefix:local`, `{uri}local` or `local`
    #[error("Malformed name: '{0}'")]
    MalformedName(String),

    /// Prefix has no built-in namespace mapping
    #[error("Unknown namespace prefix: '{0}'")]
    UnknownPrefix(String),

    /// Raw text cannot be converted to the requested property type
    #[error("Invalid {property_type} value '{raw}': {reason}")]
    InvalidValue {
        property_type: String,
        raw: String,
        reason: String,
    },

    /// Unknown OnParentVersion action name
    #[error("Unknown OnParentVersion action: '{0}'")]
    UnknownAction(String),

    /// Unknown property type name
    #[error("Unknown property type: '{0}'")]
    UnknownPropertyType(String),
}
