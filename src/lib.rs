//! arbordb - versioning engine for a hierarchical content repository
//!
//! - `item`: names, ids, values and the OnParentVersion policy
//! - `store`: persistent node store interface and in-memory store
//! - `live`: read access to the working tree and its item definitions
//! - `version`: frozen snapshots, checkin and version histories
//! - `session`: transient overlays, save and refresh
//! - `cluster`: synchronization gate and journal
//! - `observability`: structured logging and counters
//! - `cli`: command-line front end

pub mod cli;
pub mod cluster;
pub mod item;
pub mod live;
pub mod observability;
pub mod session;
pub mod store;
pub mod version;
