//! CLI command implementations
//!
//! Both commands run against a fresh in-memory repository:
//! 1. Load and validate the configuration, apply the log level
//! 2. Load the content file and build item definitions from its rules
//! 3. Import and save the content, create histories for versionable nodes
//! 4. Run the command and return its JSON result

use std::path::Path;
use std::sync::Arc;

use serde_json::{json, Value};

use crate::cluster::{Journal, JournalClusterNode};
use crate::item::JCR_FROZEN_NODE;
use crate::observability::{log_event_with_fields, Event, Logger};
use crate::session::{Repository, Session};
use crate::store::{InMemoryStore, PersistentStore};
use crate::version::{self, CheckinMode, FrozenItem};

use super::args::Command;
use super::config::Config;
use super::errors::{CliError, CliResult};
use super::import::{create_version_histories, import, Content};
use super::io::write_response;

/// Runs a command and writes its result to stdout.
pub fn run_command(command: Command) -> CliResult<()> {
    let result = match command {
        Command::Checkin {
            config,
            content,
            path,
        } => checkin(&config, &content, &path)?,
        Command::Freeze {
            config,
            content,
            path,
            mode,
        } => freeze(&config, &content, &path, mode)?,
    };
    write_response(result)
}

/// Checks in the node at `path` and returns the new version, its frozen
/// node and the repository counters.
pub fn checkin(config_path: &Path, content_path: &Path, path: &str) -> CliResult<Value> {
    let (repository, mut session) = open(config_path, content_path)?;
    let node = session.node_at(path)?;

    let version = session.checkin(node)?;
    let frozen = session.frozen_node(version.id)?;

    Ok(json!({
        "path": path,
        "version": serde_json::to_value(&version)?,
        "frozen": serde_json::to_value(&frozen)?,
        "metrics": serde_json::to_value(repository.metrics().snapshot())?,
    }))
}

/// Builds a frozen snapshot of the node at `path` in `mode` into a scratch
/// store and returns it.
pub fn freeze(
    config_path: &Path,
    content_path: &Path,
    path: &str,
    mode: CheckinMode,
) -> CliResult<Value> {
    let (_repository, session) = open(config_path, content_path)?;
    let node = session.node_at(path)?;

    let mut scratch = InMemoryStore::new();
    let parent = scratch.root();
    let frozen_id = session
        .with_live_tree(|live| version::checkin(&mut scratch, live, parent, &JCR_FROZEN_NODE, node, mode))??;
    let frozen = FrozenItem::load(&scratch, frozen_id)?;

    Ok(json!({
        "path": path,
        "mode": mode.as_str(),
        "frozen": serde_json::to_value(&frozen)?,
    }))
}

fn open(config_path: &Path, content_path: &Path) -> CliResult<(Arc<Repository>, Session)> {
    let config = Config::load(config_path)?;
    Logger::set_min_severity(config.severity()?);
    let config_str = config_path.display().to_string();
    log_event_with_fields(Event::ConfigLoaded, &[("path", config_str.as_str())]);

    let content = Content::load(content_path)?;
    let mut repository = Repository::in_memory(Arc::new(content.definitions()?))
        .with_config(config.session_config());
    if config.cluster.enabled {
        let node = JournalClusterNode::new(config.cluster.resolved_node_id(), Arc::new(Journal::new()));
        repository = repository.with_cluster(Arc::new(node));
    }
    let repository = Arc::new(repository);

    let mut session = repository.login();
    let root = session.root()?;
    let created = import(&mut session, root, &content.nodes)?;
    if created.is_empty() {
        return Err(CliError::content_error("Content file has no nodes"));
    }
    session.save()?;
    create_version_histories(&mut session, &created)?;
    Ok((repository, session))
}
