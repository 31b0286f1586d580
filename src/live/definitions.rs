//! Item definitions
//!
//! Answers the two questions the versioning engine asks of the type
//! system: which OnParentVersion action applies to an item, and whether a
//! node is of a given (primary or mixin) type, supertypes included.

use std::collections::{HashMap, HashSet, VecDeque};

use crate::item::{
    NodeId, OnParentVersionAction, QName, JCR_BASE_VERSION, JCR_IS_CHECKED_OUT, JCR_MIXIN_TYPES,
    JCR_PREDECESSORS, JCR_PRIMARY_TYPE, JCR_UUID, JCR_VERSION_HISTORY, MIX_REFERENCEABLE,
    MIX_VERSIONABLE,
};
use crate::store::NodeRecord;

use super::mixin_types;

/// Type introspection consumed by the live tree reader.
pub trait ItemDefinitions: Send + Sync {
    /// OnParentVersion action of a property of `node`.
    fn property_opv(&self, node: &NodeRecord, property: &QName) -> OnParentVersionAction;

    /// OnParentVersion action of `child` below `parent`.
    fn child_opv(&self, parent: &NodeRecord, child: &NodeRecord) -> OnParentVersionAction;

    /// Returns true if the node's primary type, a mixin, or any of their
    /// supertypes equals `node_type`.
    fn is_node_type(&self, node: &NodeRecord, node_type: &QName) -> bool;
}

/// Table-driven item definitions.
///
/// Lookup order for properties: per-item override, then per-name rule,
/// then the default action. Child nodes are resolved the same way.
#[derive(Debug, Clone)]
pub struct StaticDefinitions {
    default_action: OnParentVersionAction,
    property_rules: HashMap<QName, OnParentVersionAction>,
    child_rules: HashMap<QName, OnParentVersionAction>,
    property_overrides: HashMap<(NodeId, QName), OnParentVersionAction>,
    node_overrides: HashMap<NodeId, OnParentVersionAction>,
    supertypes: HashMap<QName, Vec<QName>>,
}

impl StaticDefinitions {
    /// Empty table; every item resolves to COPY.
    pub fn new() -> Self {
        Self {
            default_action: OnParentVersionAction::Copy,
            property_rules: HashMap::new(),
            child_rules: HashMap::new(),
            property_overrides: HashMap::new(),
            node_overrides: HashMap::new(),
            supertypes: HashMap::new(),
        }
    }

    /// Table pre-loaded with the built-in system property definitions.
    pub fn builtin() -> Self {
        Self::new()
            .with_property_rule(JCR_PRIMARY_TYPE.clone(), OnParentVersionAction::Compute)
            .with_property_rule(JCR_MIXIN_TYPES.clone(), OnParentVersionAction::Compute)
            .with_property_rule(JCR_UUID.clone(), OnParentVersionAction::Initialize)
            .with_property_rule(JCR_VERSION_HISTORY.clone(), OnParentVersionAction::Copy)
            .with_property_rule(JCR_BASE_VERSION.clone(), OnParentVersionAction::Ignore)
            .with_property_rule(JCR_IS_CHECKED_OUT.clone(), OnParentVersionAction::Ignore)
            .with_property_rule(JCR_PREDECESSORS.clone(), OnParentVersionAction::Copy)
            .with_supertype(MIX_VERSIONABLE.clone(), MIX_REFERENCEABLE.clone())
    }

    /// Sets the action used when nothing more specific matches.
    pub fn with_default_action(mut self, action: OnParentVersionAction) -> Self {
        self.default_action = action;
        self
    }

    /// Adds a rule for every property with the given name.
    pub fn with_property_rule(mut self, name: QName, action: OnParentVersionAction) -> Self {
        self.property_rules.insert(name, action);
        self
    }

    /// Adds a rule for every child node with the given name.
    pub fn with_child_rule(mut self, name: QName, action: OnParentVersionAction) -> Self {
        self.child_rules.insert(name, action);
        self
    }

    /// Declares `supertype` as a supertype of `node_type`.
    pub fn with_supertype(mut self, node_type: QName, supertype: QName) -> Self {
        self.supertypes.entry(node_type).or_default().push(supertype);
        self
    }

    /// Overrides the action of one property of one node.
    pub fn set_property_opv(&mut self, node: NodeId, name: QName, action: OnParentVersionAction) {
        self.property_overrides.insert((node, name), action);
    }

    /// Overrides the action of one node as a child of its parent.
    pub fn set_node_opv(&mut self, node: NodeId, action: OnParentVersionAction) {
        self.node_overrides.insert(node, action);
    }

    fn type_closure(&self, roots: Vec<QName>) -> HashSet<QName> {
        let mut seen = HashSet::new();
        let mut queue: VecDeque<QName> = roots.into();
        while let Some(ty) = queue.pop_front() {
            if let Some(supers) = self.supertypes.get(&ty) {
                queue.extend(supers.iter().filter(|s| !seen.contains(*s)).cloned());
            }
            seen.insert(ty);
        }
        seen
    }
}

impl Default for StaticDefinitions {
    fn default() -> Self {
        Self::builtin()
    }
}

impl ItemDefinitions for StaticDefinitions {
    fn property_opv(&self, node: &NodeRecord, property: &QName) -> OnParentVersionAction {
        self.property_overrides
            .get(&(node.id(), property.clone()))
            .or_else(|| self.property_rules.get(property))
            .copied()
            .unwrap_or(self.default_action)
    }

    fn child_opv(&self, _parent: &NodeRecord, child: &NodeRecord) -> OnParentVersionAction {
        self.node_overrides
            .get(&child.id())
            .or_else(|| self.child_rules.get(child.name()))
            .copied()
            .unwrap_or(self.default_action)
    }

    fn is_node_type(&self, node: &NodeRecord, node_type: &QName) -> bool {
        let mut roots = mixin_types(node);
        roots.push(node.primary_type().clone());
        self.type_closure(roots).contains(node_type)
    }
}
