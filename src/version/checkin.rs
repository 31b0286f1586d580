//! Frozen snapshot builder
//!
//! Walks a live node and writes an `nt:frozenNode` subtree under a given
//! parent in the version store. Every property and child is dispatched on
//! its effective OnParentVersion action:
//!
//! | action                         | property | child                                       |
//! |--------------------------------|----------|---------------------------------------------|
//! | ABORT                          | abort    | abort                                       |
//! | COMPUTE / IGNORE / INITIALIZE  | skip     | skip                                        |
//! | VERSION                        | copy     | history reference, or recurse in `Copy`     |
//! | COPY                           | copy     | recurse in `CopyRecursive`                  |
//!
//! `Copy` forces properties to COPY, `CopyRecursive` forces properties and
//! children. A declared ABORT is never overridden by a forced copy.
//!
//! On abort the parent of the failing level is reloaded, and so is the
//! parent of every enclosing level while the error travels up. Store
//! errors are propagated with context and do not reload anything.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::item::{
    NodeId, OnParentVersionAction, PropertyState, PropertyType, QName, Value, JCR_BASE_VERSION,
    JCR_CHILD_VERSION_HISTORY, JCR_FROZEN_MIXIN_TYPES, JCR_FROZEN_PRIMARY_TYPE, JCR_FROZEN_UUID,
    NT_FROZEN_NODE, NT_VERSIONED_CHILD,
};
use crate::live::{LiveNode, LiveTree, VersionableInfo};
use crate::observability::{log_event_with_fields, Event, Logger, MetricsRegistry, Severity};
use crate::store::PersistentStore;

use super::errors::{StoreContext, VersionError, VersionResult};
use super::frozen::is_reserved;

/// How a checkin call treats the items of its source node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckinMode {
    /// Shell only: identity and types, no properties or children
    Init,
    /// Every item follows its declared action
    #[default]
    Versioned,
    /// Properties forced to COPY; children follow their declared action
    Copy,
    /// Properties and children forced to COPY, all the way down
    CopyRecursive,
}

impl CheckinMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckinMode::Init => "init",
            CheckinMode::Versioned => "versioned",
            CheckinMode::Copy => "copy",
            CheckinMode::CopyRecursive => "copy_recursive",
        }
    }

    fn forces_property_copy(self) -> bool {
        matches!(self, CheckinMode::Copy | CheckinMode::CopyRecursive)
    }

    fn forces_child_copy(self) -> bool {
        self == CheckinMode::CopyRecursive
    }

    /// Effective action for a property declared with `declared`.
    pub fn property_action(self, declared: OnParentVersionAction) -> OnParentVersionAction {
        effective(declared, self.forces_property_copy())
    }

    /// Effective action for a child declared with `declared`.
    pub fn child_action(self, declared: OnParentVersionAction) -> OnParentVersionAction {
        effective(declared, self.forces_child_copy())
    }
}

fn effective(declared: OnParentVersionAction, forced: bool) -> OnParentVersionAction {
    match declared {
        OnParentVersionAction::Abort => OnParentVersionAction::Abort,
        _ if forced => OnParentVersionAction::Copy,
        other => other,
    }
}

impl fmt::Display for CheckinMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CheckinMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "init" => Ok(CheckinMode::Init),
            "versioned" | "version" => Ok(CheckinMode::Versioned),
            "copy" => Ok(CheckinMode::Copy),
            "copy_recursive" => Ok(CheckinMode::CopyRecursive),
            other => Err(format!("unknown checkin mode '{}'", other)),
        }
    }
}

/// Phase of one checkin call.
///
/// ```text
/// Started -> ShellCreated -> ProcessingProperties -> ProcessingChildren -> Completed
///                 |                  |                      |
///                 +-> Completed      +-> Aborted            +-> Aborted
/// ```
/// The short `ShellCreated -> Completed` path is taken in `Init` mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckinPhase {
    Started,
    ShellCreated,
    ProcessingProperties,
    ProcessingChildren,
    Completed,
    Aborted,
}

impl CheckinPhase {
    pub fn name(&self) -> &'static str {
        match self {
            CheckinPhase::Started => "Started",
            CheckinPhase::ShellCreated => "ShellCreated",
            CheckinPhase::ProcessingProperties => "ProcessingProperties",
            CheckinPhase::ProcessingChildren => "ProcessingChildren",
            CheckinPhase::Completed => "Completed",
            CheckinPhase::Aborted => "Aborted",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, CheckinPhase::Completed | CheckinPhase::Aborted)
    }

    /// Started -> ShellCreated
    pub fn shell_created(self) -> VersionResult<Self> {
        match self {
            CheckinPhase::Started => Ok(CheckinPhase::ShellCreated),
            _ => Err(VersionError::illegal_state(self.name(), "ShellCreated")),
        }
    }

    /// ShellCreated -> ProcessingProperties
    pub fn begin_properties(self) -> VersionResult<Self> {
        match self {
            CheckinPhase::ShellCreated => Ok(CheckinPhase::ProcessingProperties),
            _ => Err(VersionError::illegal_state(self.name(), "ProcessingProperties")),
        }
    }

    /// ProcessingProperties -> ProcessingChildren
    pub fn begin_children(self) -> VersionResult<Self> {
        match self {
            CheckinPhase::ProcessingProperties => Ok(CheckinPhase::ProcessingChildren),
            _ => Err(VersionError::illegal_state(self.name(), "ProcessingChildren")),
        }
    }

    /// ProcessingChildren -> Completed, or ShellCreated -> Completed (Init)
    pub fn complete(self) -> VersionResult<Self> {
        match self {
            CheckinPhase::ShellCreated | CheckinPhase::ProcessingChildren => {
                Ok(CheckinPhase::Completed)
            }
            _ => Err(VersionError::illegal_state(self.name(), "Completed")),
        }
    }

    /// ProcessingProperties | ProcessingChildren -> Aborted
    pub fn abort(self) -> VersionResult<Self> {
        match self {
            CheckinPhase::ProcessingProperties | CheckinPhase::ProcessingChildren => {
                Ok(CheckinPhase::Aborted)
            }
            _ => Err(VersionError::illegal_state(self.name(), "Aborted")),
        }
    }
}

/// Builds a frozen snapshot of `source` named `name` under `parent`.
///
/// Returns the id of the new `nt:frozenNode`. The store's working set is
/// left unsaved.
pub fn checkin<S, L>(
    store: &mut S,
    live: &L,
    parent: NodeId,
    name: &QName,
    source: NodeId,
    mode: CheckinMode,
) -> VersionResult<NodeId>
where
    S: PersistentStore + ?Sized,
    L: LiveTree + ?Sized,
{
    FrozenBuilder::new(store, live).build(parent, name, source, mode)
}

pub(crate) struct FrozenBuilder<'a, S: ?Sized, L: ?Sized> {
    store: &'a mut S,
    live: &'a L,
    metrics: Option<&'a MetricsRegistry>,
}

impl<'a, S, L> FrozenBuilder<'a, S, L>
where
    S: PersistentStore + ?Sized,
    L: LiveTree + ?Sized,
{
    pub(crate) fn new(store: &'a mut S, live: &'a L) -> Self {
        Self {
            store,
            live,
            metrics: None,
        }
    }

    pub(crate) fn with_metrics(mut self, metrics: &'a MetricsRegistry) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub(crate) fn build(
        mut self,
        parent: NodeId,
        name: &QName,
        source: NodeId,
        mode: CheckinMode,
    ) -> VersionResult<NodeId> {
        let source = self.live.node(source).context("read live node", source)?;
        let mode_str = mode.as_str();
        log_event_with_fields(
            Event::CheckinBegin,
            &[("path", source.path.as_str()), ("mode", mode_str)],
        );

        match self.freeze(parent, name, &source, mode) {
            Ok(frozen) => {
                let frozen_str = frozen.to_string();
                log_event_with_fields(
                    Event::CheckinComplete,
                    &[("path", source.path.as_str()), ("frozen_node", frozen_str.as_str())],
                );
                Ok(frozen)
            }
            Err(err) => {
                if err.is_abort() {
                    if let Some(metrics) = self.metrics {
                        metrics.increment_checkins_aborted();
                    }
                    Logger::warn(
                        Event::CheckinAborted.as_str(),
                        &[("path", source.path.as_str()), ("item", err.item().unwrap_or(""))],
                    );
                } else {
                    Logger::error(
                        "CHECKIN_FAILED",
                        &[("path", source.path.as_str()), ("reason", err.message())],
                    );
                }
                Err(err)
            }
        }
    }

    fn freeze(
        &mut self,
        parent: NodeId,
        name: &QName,
        source: &LiveNode,
        mode: CheckinMode,
    ) -> VersionResult<NodeId> {
        let mut phase = CheckinPhase::Started;

        let node = self
            .store
            .create_child(parent, name, &NT_FROZEN_NODE)
            .context("create frozen node", &source.path)?;
        if let Some(metrics) = self.metrics {
            metrics.increment_frozen_nodes();
        }
        self.write_shell(node, source)?;
        phase = phase.shell_created()?;

        if mode == CheckinMode::Init {
            phase.complete()?;
            return Ok(node);
        }

        phase = phase.begin_properties()?;
        let mut frozen = 0u64;
        for property in &source.properties {
            let property_name = property.state.name();
            match mode.property_action(property.opv) {
                OnParentVersionAction::Abort => {
                    phase.abort()?;
                    return Err(self.abort(parent, format!("{}/{}", path_prefix(source), property_name)));
                }
                OnParentVersionAction::Version | OnParentVersionAction::Copy => {
                    if is_reserved(property_name) {
                        continue;
                    }
                    self.store
                        .set_property(node, property.state.clone())
                        .context("copy property", &source.path)?;
                    frozen += 1;
                    if Logger::enabled(Severity::Trace) {
                        let property_str = property_name.to_string();
                        Logger::trace(
                            "PROPERTY_FROZEN",
                            &[("path", source.path.as_str()), ("property", property_str.as_str())],
                        );
                    }
                }
                OnParentVersionAction::Compute
                | OnParentVersionAction::Ignore
                | OnParentVersionAction::Initialize => {}
            }
        }
        if let Some(metrics) = self.metrics {
            metrics.add_properties_frozen(frozen);
        }

        phase = phase.begin_children()?;
        for child in &source.children {
            let action = mode.child_action(child.opv);
            let child_mode = match action {
                OnParentVersionAction::Abort => {
                    phase.abort()?;
                    return Err(self.abort(parent, format!("{}/{}", path_prefix(source), child.name)));
                }
                OnParentVersionAction::Compute
                | OnParentVersionAction::Ignore
                | OnParentVersionAction::Initialize => continue,
                OnParentVersionAction::Version => CheckinMode::Copy,
                OnParentVersionAction::Copy => CheckinMode::CopyRecursive,
            };

            let live_child = self.live.node(child.id).context("read live node", child.id)?;

            if action == OnParentVersionAction::Version {
                if let Some(info) = live_child.versionable {
                    self.write_history_ref(node, &child.name, &live_child, info)?;
                    continue;
                }
            }

            if let Err(err) = self.freeze(node, &child.name, &live_child, child_mode) {
                if err.is_abort() {
                    phase.abort()?;
                    self.reload(parent, &source.path)?;
                }
                return Err(err);
            }
        }

        phase.complete()?;
        Ok(node)
    }

    fn write_shell(&mut self, node: NodeId, source: &LiveNode) -> VersionResult<()> {
        if source.referenceable {
            self.store
                .set_property(
                    node,
                    PropertyState::single(
                        JCR_FROZEN_UUID.clone(),
                        Value::String(source.id.to_string()),
                    ),
                )
                .context("set frozen uuid", &source.path)?;
        }

        self.store
            .set_property(
                node,
                PropertyState::single(
                    JCR_FROZEN_PRIMARY_TYPE.clone(),
                    Value::Name(source.primary_type.clone()),
                ),
            )
            .context("set frozen primary type", &source.path)?;

        if !source.mixin_types.is_empty() {
            let mixins = source.mixin_types.iter().cloned().map(Value::Name).collect();
            self.store
                .set_property(
                    node,
                    PropertyState::multiple(JCR_FROZEN_MIXIN_TYPES.clone(), PropertyType::Name, mixins),
                )
                .context("set frozen mixin types", &source.path)?;
        }
        Ok(())
    }

    fn write_history_ref(
        &mut self,
        parent: NodeId,
        name: &QName,
        child: &LiveNode,
        info: VersionableInfo,
    ) -> VersionResult<()> {
        let reference = self
            .store
            .create_child(parent, name, &NT_VERSIONED_CHILD)
            .context("create version history reference", &child.path)?;
        self.store
            .set_property(
                reference,
                PropertyState::single(
                    JCR_CHILD_VERSION_HISTORY.clone(),
                    Value::Reference(info.version_history),
                ),
            )
            .context("set child version history", &child.path)?;
        self.store
            .set_property(
                reference,
                PropertyState::single(JCR_BASE_VERSION.clone(), Value::Reference(info.base_version)),
            )
            .context("set base version", &child.path)?;

        if let Some(metrics) = self.metrics {
            metrics.increment_history_refs();
        }
        Ok(())
    }

    /// Reloads `parent` and returns the abort error for `item`.
    fn abort(&mut self, parent: NodeId, item: String) -> VersionError {
        match self.reload(parent, &item) {
            Ok(()) => VersionError::abort(item),
            Err(err) => err,
        }
    }

    fn reload(&mut self, parent: NodeId, item: &str) -> VersionResult<()> {
        self.store
            .reload(parent)
            .context("reload after abort", item)
    }
}

fn path_prefix(node: &LiveNode) -> &str {
    node.path.trim_end_matches('/')
}
