//! MongoDB connection lifecycle for a content-management host application
//!
//! This crate resolves one live database handle at startup and closes it at
//! shutdown, while keeping a legacy query surface working on top of the
//! modern `mongodb` driver.
//!
//! # Features
//! - Connection resolution from an existing client, an existing database
//!   handle, a connection string, or host/port parts
//! - Topology-aware connect defaults (single node vs replica set / seed list)
//! - Legacy `find(filter, projection)` and `next_object` via wrappers and
//!   extension traits
//! - Shutdown that closes only the clients this process opened
//! - Optional keepalive timer cancelled at shutdown

pub mod compat;
pub mod config;
pub mod connection;
pub mod context;
pub mod factory;
pub mod keepalive;
pub mod lifecycle;
pub mod manager;
pub mod options;
pub mod query;
pub mod uri;

#[cfg(test)]
mod testing;

pub use compat::{
    legacy_find_options, with_legacy_projection, CompatCollection, CompatCursor, CompatDatabase,
    LegacyCollectionExt, LegacyCursorExt,
};
pub use config::{ConnectionConfig, ConnectionSource, DbOptions, Environment};
pub use connection::{Ownership, ResolvedConnection, Resolver};
pub use factory::{ClientFactory, DriverClientFactory};
pub use keepalive::Keepalive;
pub use manager::DbManager;
pub use mongo_bridge_common::{BridgeError, Result};
pub use options::{ConnectOptions, ConnectPlan};
pub use query::QueryBuilder;
pub use uri::{redact, HostPort, ParsedUri, TopologyMode};
