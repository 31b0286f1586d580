//! Qualified names
//!
//! A `QName` is a namespace URI plus a local name. Names are compared by
//! both parts; the prefix used to spell a name is never part of its identity.
//!
//! Only the fixed built-in prefixes (`jcr`, `nt`, `mix`, `rep`) are known
//! here. Session-level prefix remapping is not handled by this crate.

use std::borrow::Cow;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::{ItemError, ItemResult};

/// The empty (default) namespace
pub const NS_DEFAULT: &str = "";
/// Namespace of repository-defined item names
pub const NS_JCR: &str = "http://www.jcp.org/jcr/1.0";
/// Namespace of built-in primary node types
pub const NS_NT: &str = "http://www.jcp.org/jcr/nt/1.0";
/// Namespace of built-in mixin node types
pub const NS_MIX: &str = "http://www.jcp.org/jcr/mix/1.0";
/// Namespace of internal implementation names
pub const NS_REP: &str = "internal";

const BUILTIN_PREFIXES: [(&str, &str); 5] = [
    ("", NS_DEFAULT),
    ("jcr", NS_JCR),
    ("nt", NS_NT),
    ("mix", NS_MIX),
    ("rep", NS_REP),
];

/// A namespace-qualified name.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QName {
    namespace: Cow<'static, str>,
    local: Cow<'static, str>,
}

impl QName {
    /// Creates a name from owned parts.
    pub fn new(namespace: impl Into<String>, local: impl Into<String>) -> Self {
        Self {
            namespace: Cow::Owned(namespace.into()),
            local: Cow::Owned(local.into()),
        }
    }

    /// Creates a name from static parts. Usable in constants.
    pub const fn from_static(namespace: &'static str, local: &'static str) -> Self {
        Self {
            namespace: Cow::Borrowed(namespace),
            local: Cow::Borrowed(local),
        }
    }

    /// Creates a name in the default namespace.
    pub fn local(local: impl Into<String>) -> Self {
        Self::new(NS_DEFAULT, local)
    }

    /// Parses `{uri}local`, `prefix:local` (built-in prefixes only) or `local`.
    pub fn parse(raw: &str) -> ItemResult<Self> {
        if raw.is_empty() {
            return Err(ItemError::MalformedName(raw.to_string()));
        }

        if let Some(rest) = raw.strip_prefix('{') {
            let (namespace, local) = rest
                .split_once('}')
                .ok_or_else(|| ItemError::MalformedName(raw.to_string()))?;
            if local.is_empty() {
                return Err(ItemError::MalformedName(raw.to_string()));
            }
            return Ok(Self::new(namespace, local));
        }

        match raw.split_once(':') {
            Some((prefix, local)) => {
                if local.is_empty() || local.contains(':') {
                    return Err(ItemError::MalformedName(raw.to_string()));
                }
                let namespace = BUILTIN_PREFIXES
                    .iter()
                    .find(|(p, _)| *p == prefix)
                    .map(|(_, uri)| *uri)
                    .ok_or_else(|| ItemError::UnknownPrefix(prefix.to_string()))?;
                Ok(Self::new(namespace, local))
            }
            None => Ok(Self::local(raw)),
        }
    }

    /// Returns the namespace URI.
    #[inline]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Returns the local part.
    #[inline]
    pub fn local_name(&self) -> &str {
        &self.local
    }

    fn prefix(&self) -> Option<&'static str> {
        BUILTIN_PREFIXES
            .iter()
            .find(|(_, uri)| *uri == self.namespace.as_ref())
            .map(|(p, _)| *p)
    }
}

impl fmt::Display for QName {
    /// Built-in namespaces print as `prefix:local`, others as `{uri}local`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.prefix() {
            Some("") => write!(f, "{}", self.local),
            Some(prefix) => write!(f, "{}:{}", prefix, self.local),
            None => write!(f, "{{{}}}{}", self.namespace, self.local),
        }
    }
}

impl fmt::Debug for QName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "QName({})", self)
    }
}

impl Serialize for QName {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for QName {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        QName::parse(&raw).map_err(serde::de::Error::custom)
    }
}

// Item names
pub const JCR_PRIMARY_TYPE: QName = QName::from_static(NS_JCR, "primaryType");
pub const JCR_MIXIN_TYPES: QName = QName::from_static(NS_JCR, "mixinTypes");
pub const JCR_UUID: QName = QName::from_static(NS_JCR, "uuid");
pub const JCR_FROZEN_UUID: QName = QName::from_static(NS_JCR, "frozenUuid");
pub const JCR_FROZEN_PRIMARY_TYPE: QName = QName::from_static(NS_JCR, "frozenPrimaryType");
pub const JCR_FROZEN_MIXIN_TYPES: QName = QName::from_static(NS_JCR, "frozenMixinTypes");
pub const JCR_FROZEN_NODE: QName = QName::from_static(NS_JCR, "frozenNode");
pub const JCR_CHILD_VERSION_HISTORY: QName = QName::from_static(NS_JCR, "childVersionHistory");
pub const JCR_VERSION_HISTORY: QName = QName::from_static(NS_JCR, "versionHistory");
pub const JCR_BASE_VERSION: QName = QName::from_static(NS_JCR, "baseVersion");
pub const JCR_IS_CHECKED_OUT: QName = QName::from_static(NS_JCR, "isCheckedOut");
pub const JCR_PREDECESSORS: QName = QName::from_static(NS_JCR, "predecessors");
pub const JCR_CREATED: QName = QName::from_static(NS_JCR, "created");
pub const JCR_ROOT_VERSION: QName = QName::from_static(NS_JCR, "rootVersion");
pub const JCR_VERSIONABLE_UUID: QName = QName::from_static(NS_JCR, "versionableUuid");

// Node types
pub const NT_UNSTRUCTURED: QName = QName::from_static(NS_NT, "unstructured");
pub const NT_FROZEN_NODE: QName = QName::from_static(NS_NT, "frozenNode");
pub const NT_VERSIONED_CHILD: QName = QName::from_static(NS_NT, "versionedChild");
pub const NT_VERSION_HISTORY: QName = QName::from_static(NS_NT, "versionHistory");
pub const NT_VERSION: QName = QName::from_static(NS_NT, "version");
pub const MIX_REFERENCEABLE: QName = QName::from_static(NS_MIX, "referenceable");
pub const MIX_VERSIONABLE: QName = QName::from_static(NS_MIX, "versionable");
pub const REP_ROOT: QName = QName::from_static(NS_REP, "root");
pub const REP_VERSION_STORAGE: QName = QName::from_static(NS_REP, "versionStorage");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_prefixed() {
        let name = QName::parse("jcr:frozenUuid").unwrap();
        assert_eq!(name, JCR_FROZEN_UUID);
        assert_eq!(name.namespace(), NS_JCR);
        assert_eq!(name.local_name(), "frozenUuid");
    }

    #[test]
    fn test_parse_expanded_and_local() {
        let expanded = QName::parse("{http://example.com/ns}title").unwrap();
        assert_eq!(expanded.namespace(), "http://example.com/ns");
        assert_eq!(expanded.to_string(), "{http://example.com/ns}title");

        let local = QName::parse("title").unwrap();
        assert_eq!(local, QName::local("title"));
        assert_eq!(local.to_string(), "title");
    }

    #[test]
    fn test_parse_rejects_unknown_prefix() {
        assert_eq!(
            QName::parse("foo:bar"),
            Err(ItemError::UnknownPrefix("foo".to_string()))
        );
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!(QName::parse("").is_err());
        assert!(QName::parse("jcr:").is_err());
        assert!(QName::parse("{uri}").is_err());
        assert!(QName::parse("{uri").is_err());
    }

    #[test]
    fn test_static_and_owned_names_are_equal() {
        let owned = QName::new(NS_NT, "frozenNode");
        assert_eq!(owned, NT_FROZEN_NODE);
        assert_eq!(owned.to_string(), "nt:frozenNode");
    }

    #[test]
    fn test_serde_uses_display_form() {
        let json = serde_json::to_string(&MIX_VERSIONABLE).unwrap();
        assert_eq!(json, "\"mix:versionable\"");
        let back: QName = serde_json::from_str(&json).unwrap();
        assert_eq!(back, MIX_VERSIONABLE);
    }
}
