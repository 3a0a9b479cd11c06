//! Connection resolution: one live database handle from a configuration

use bson::{doc, Document as BsonDocument};
use mongo_bridge_common::{BridgeError, Result};
use mongodb::Client;
use tracing::{error, info, instrument};

use crate::compat::{self, CompatCollection, CompatDatabase};
use crate::config::{ConnectionConfig, ConnectionSource, Environment};
use crate::factory::{ClientFactory, DriverClientFactory};
use crate::options::ConnectPlan;
use crate::uri::{redact, TopologyMode};

/// Who is responsible for closing the client behind a resolved connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ownership {
    /// Opened by the resolver; closed at shutdown
    Owned,
    /// Caller-supplied client; left open for its owner
    Reused,
    /// Caller-supplied database handle; there is no client to close
    Adopted,
}

impl Ownership {
    pub fn closes_on_shutdown(self) -> bool {
        self == Ownership::Owned
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Ownership::Owned => "owned",
            Ownership::Reused => "reused",
            Ownership::Adopted => "adopted",
        }
    }
}

/// A live database handle and, when there is one, the client behind it
#[derive(Debug, Clone)]
pub struct ResolvedConnection {
    client: Option<Client>,
    database: CompatDatabase,
    ownership: Ownership,
    topology: Option<TopologyMode>,
}

impl ResolvedConnection {
    /// Get a reference to the database
    pub fn database(&self) -> &CompatDatabase {
        &self.database
    }

    /// Get the database name
    pub fn database_name(&self) -> &str {
        self.database.name()
    }

    /// Get the client, absent when a bare database handle was adopted
    pub fn client(&self) -> Option<&Client> {
        self.client.as_ref()
    }

    pub fn ownership(&self) -> Ownership {
        self.ownership
    }

    /// Topology of the dialed connection string; `None` for adopted objects
    pub fn topology(&self) -> Option<TopologyMode> {
        self.topology
    }

    /// Get a collection by name with the legacy surface
    pub fn collection(&self, name: &str) -> CompatCollection<BsonDocument> {
        self.database.collection(name)
    }

    /// Check if the connection is healthy by pinging the server
    pub async fn ping(&self) -> Result<bool> {
        match self.database.run_command(doc! { "ping": 1 }).await {
            Ok(_) => Ok(true),
            Err(e) => Err(BridgeError::Connection(format!("Ping failed: {}", e))),
        }
    }

    /// List all collection names in the current database
    pub async fn list_collection_names(&self) -> Result<Vec<String>> {
        let names = self.database.list_collection_names().await?;
        Ok(names)
    }

    pub(crate) fn into_client(self) -> (Option<Client>, Ownership) {
        (self.client, self.ownership)
    }
}

/// Turns a [`ConnectionConfig`] into a [`ResolvedConnection`]
pub struct Resolver<F: ClientFactory = DriverClientFactory> {
    factory: F,
    env: Environment,
}

impl Resolver<DriverClientFactory> {
    /// Resolver using the driver and the process environment
    pub fn new() -> Self {
        Self::with_factory(DriverClientFactory, Environment::from_process())
    }
}

impl Default for Resolver<DriverClientFactory> {
    fn default() -> Self {
        Self::new()
    }
}

impl<F: ClientFactory> Resolver<F> {
    pub fn with_factory(factory: F, env: Environment) -> Self {
        Self { factory, env }
    }

    pub fn factory(&self) -> &F {
        &self.factory
    }

    pub fn environment(&self) -> &Environment {
        &self.env
    }

    /// What would be dialed for `config`, without dialing it.
    ///
    /// `None` when the configuration supplies a client or handle.
    pub fn plan(&self, config: &ConnectionConfig) -> Result<Option<ConnectPlan>> {
        let uri = config.source(&self.env).uri()?;
        Ok(uri.map(|uri| ConnectPlan::new(uri, config.options.connect.as_ref())))
    }

    /// Resolve `config` into a live handle.
    ///
    /// Caller-supplied clients and handles are adopted without any I/O.
    /// Otherwise a connection is opened once; failures are reported, never
    /// retried here. The legacy surface is installed on every successful path.
    #[instrument(skip(self, config), fields(short_name = %config.short_name))]
    pub async fn resolve(&self, config: &ConnectionConfig) -> Result<ResolvedConnection> {
        let resolved = match config.source(&self.env) {
            ConnectionSource::ExistingClient { client, name } => {
                info!(database = %name, "Reusing caller-supplied MongoDB client");
                let database = CompatDatabase::new(client.database(&name));
                ResolvedConnection {
                    client: Some(client),
                    database,
                    ownership: Ownership::Reused,
                    topology: None,
                }
            }
            ConnectionSource::ExistingHandle(db) => {
                info!(database = db.name(), "Adopting caller-supplied database handle");
                ResolvedConnection {
                    client: None,
                    database: CompatDatabase::new(db),
                    ownership: Ownership::Adopted,
                    topology: None,
                }
            }
            ConnectionSource::Uri(uri) => self.open(uri, config).await?,
            ConnectionSource::HostPort(host_port) => self.open(host_port.to_uri()?, config).await?,
        };

        compat::install();
        Ok(resolved)
    }

    async fn open(&self, uri: String, config: &ConnectionConfig) -> Result<ResolvedConnection> {
        let plan = ConnectPlan::new(uri, config.options.connect.as_ref());
        info!(
            uri = %redact(&plan.uri),
            topology = %plan.topology,
            "Connecting to MongoDB"
        );

        let client = match self.factory.connect(&plan).await {
            Ok(client) => client,
            Err(e @ BridgeError::Configuration(_)) => return Err(e),
            Err(e) => {
                error!(error = %e, "ERROR: There was an issue connecting to the database. Is it running?");
                return Err(BridgeError::Connection(e.message().to_string()));
            }
        };

        // A database named in the connection string wins over the configured name
        let database = match plan.uri_database() {
            Some(_) => client
                .default_database()
                .unwrap_or_else(|| client.database(config.database_name())),
            None => client.database(config.database_name()),
        };

        info!(database = database.name(), "Connected to MongoDB");
        Ok(ResolvedConnection {
            client: Some(client),
            database: CompatDatabase::new(database),
            ownership: Ownership::Owned,
            topology: Some(plan.topology),
        })
    }
}
