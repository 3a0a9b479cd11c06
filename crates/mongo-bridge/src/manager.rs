//! Database lifecycle for a host application
//!
//! # Example
//! ```rust,ignore
//! use mongo_bridge::{ConnectionConfig, DbManager, Keepalive};
//! use std::time::Duration;
//!
//! let mut manager = DbManager::new();
//! let db = manager.connect(ConnectionConfig::new("my-site")).await?;
//! manager.set_keepalive(Keepalive::ping(db.inner().clone(), Duration::from_secs(60)));
//!
//! let docs = db
//!     .collection("pages")
//!     .find_with_projection(doc! {}, doc! { "slug": 1 })
//!     .await?
//!     .to_list()
//!     .await?;
//!
//! manager.close().await?;
//! ```

use mongo_bridge_common::{BridgeError, Result};
use mongodb::Client;
use tracing::warn;

use crate::compat::CompatDatabase;
use crate::config::{ConnectionConfig, Environment};
use crate::connection::{Ownership, ResolvedConnection, Resolver};
use crate::context;
use crate::factory::{ClientFactory, DriverClientFactory};
use crate::keepalive::Keepalive;
use crate::lifecycle;
use crate::options::ConnectPlan;

/// Owns one resolved connection from startup to shutdown
pub struct DbManager<F: ClientFactory = DriverClientFactory> {
    resolver: Resolver<F>,
    connection: Option<ResolvedConnection>,
    keepalive: Option<Keepalive>,
    publish: bool,
}

impl DbManager<DriverClientFactory> {
    /// Manager using the driver and the process environment
    pub fn new() -> Self {
        Self::with_factory(DriverClientFactory, Environment::from_process())
    }
}

impl Default for DbManager<DriverClientFactory> {
    fn default() -> Self {
        Self::new()
    }
}

impl<F: ClientFactory> DbManager<F> {
    pub fn with_factory(factory: F, env: Environment) -> Self {
        Self {
            resolver: Resolver::with_factory(factory, env),
            connection: None,
            keepalive: None,
            publish: true,
        }
    }

    /// Whether `connect` publishes the handle into the process-wide context
    /// (default: `true`)
    pub fn publish_globally(mut self, publish: bool) -> Self {
        self.publish = publish;
        self
    }

    pub fn resolver(&self) -> &Resolver<F> {
        &self.resolver
    }

    /// What `connect` would dial for `config`, without dialing it
    pub fn plan(&self, config: &ConnectionConfig) -> Result<Option<ConnectPlan>> {
        self.resolver.plan(config)
    }

    /// Resolve `config` and keep the result until [`DbManager::close`]
    pub async fn connect(&mut self, config: ConnectionConfig) -> Result<CompatDatabase> {
        if self.connection.is_some() {
            return Err(BridgeError::Internal(
                "Database already connected. Call close() first to reconnect.".to_string(),
            ));
        }

        let resolved = self.resolver.resolve(&config).await?;
        let database = resolved.database().clone();
        if self.publish {
            context::install_database(database.clone());
        }
        self.connection = Some(resolved);
        Ok(database)
    }

    pub fn connection(&self) -> Option<&ResolvedConnection> {
        self.connection.as_ref()
    }

    pub fn database(&self) -> Option<&CompatDatabase> {
        self.connection.as_ref().map(ResolvedConnection::database)
    }

    pub fn client(&self) -> Option<&Client> {
        self.connection.as_ref().and_then(ResolvedConnection::client)
    }

    pub fn ownership(&self) -> Option<Ownership> {
        self.connection.as_ref().map(ResolvedConnection::ownership)
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    /// Hand over a keepalive timer to be cancelled at shutdown.
    ///
    /// A previously handed-over timer is cancelled and replaced.
    pub fn set_keepalive(&mut self, keepalive: Keepalive) {
        if let Some(previous) = self.keepalive.replace(keepalive) {
            warn!("Replacing an existing keepalive timer");
            previous.cancel();
        }
    }

    pub fn has_keepalive(&self) -> bool {
        self.keepalive.is_some()
    }

    /// Shutdown hook: cancel the keepalive, then close the client if this
    /// manager opened it
    pub async fn close(&mut self) -> Result<()> {
        let connection = self.connection.take();
        let keepalive = self.keepalive.take();
        if self.publish && connection.is_some() {
            context::clear();
        }
        lifecycle::close(self.resolver.factory(), connection, keepalive).await
    }
}
