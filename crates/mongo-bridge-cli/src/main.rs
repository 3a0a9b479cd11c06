//! mongo-bridge CLI - connection checks for content-site databases
//!
//! Usage:
//!   mongo-bridge check                         Resolve, ping, report topology
//!   mongo-bridge check --config db.json        Load database options from JSON
//!   mongo-bridge uri --host db1,db2 --name cms Print the URI without connecting
//!   mongo-bridge find aposDocs --projection '{"slug": 1}'
//!
//! MONGO_BRIDGE_MONGODB_URI overrides every other connection setting.
//! MONGO_BRIDGE_MONGODB_LOG_LEVEL turns on driver logging at that level.

use anyhow::{bail, Context, Result};
use bson::{Bson, Document};
use clap::{Args, Parser, Subcommand};
use mongo_bridge::{
    redact, ConnectionConfig, DbManager, DbOptions, Environment, QueryBuilder,
};
use std::path::PathBuf;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "mongo-bridge")]
#[command(about = "MongoDB connection checks for content-site databases", long_about = None)]
#[command(version)]
struct Cli {
    /// Log level (RUST_LOG takes precedence)
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect, ping, and report topology and ownership
    Check {
        #[command(flatten)]
        connect: ConnectArgs,

        /// Also list collection names
        #[arg(long)]
        collections: bool,
    },
    /// Print the resolved URI and connect options without connecting
    Uri {
        #[command(flatten)]
        connect: ConnectArgs,
    },
    /// Query a collection through the legacy projection path
    Find {
        /// Collection name
        collection: String,

        /// Filter as (extended) JSON
        #[arg(long, default_value = "{}")]
        filter: String,

        /// Projection as (extended) JSON
        #[arg(long)]
        projection: Option<String>,

        /// Sort as JSON
        #[arg(long)]
        sort: Option<String>,

        #[arg(long)]
        skip: Option<u64>,

        #[arg(long, default_value_t = 20)]
        limit: i64,

        #[command(flatten)]
        connect: ConnectArgs,
    },
}

#[derive(Args)]
struct ConnectArgs {
    /// JSON file with database options
    #[arg(long)]
    config: Option<PathBuf>,

    /// Full connection URI
    #[arg(long)]
    uri: Option<String>,

    /// Host or comma-separated seed list
    #[arg(long)]
    host: Option<String>,

    #[arg(long)]
    port: Option<u16>,

    #[arg(long)]
    user: Option<String>,

    #[arg(long)]
    password: Option<String>,

    /// Database name
    #[arg(long)]
    name: Option<String>,

    /// Application short name, the fallback database name
    #[arg(long, default_value = "mongo-bridge")]
    short_name: String,
}

impl ConnectArgs {
    fn into_config(self) -> Result<ConnectionConfig> {
        let mut options = match &self.config {
            Some(path) => DbOptions::from_file(path)?,
            None => DbOptions::default(),
        };

        if self.uri.is_some() {
            options.uri = self.uri;
        }
        if self.host.is_some() {
            options.host = self.host;
        }
        if self.port.is_some() {
            options.port = self.port;
        }
        if self.user.is_some() {
            options.user = self.user;
        }
        if self.password.is_some() {
            options.password = self.password;
        }
        if self.name.is_some() {
            options.name = self.name;
        }

        Ok(ConnectionConfig::new(self.short_name).with_options(options))
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let env = Environment::from_process();
    init_logging(&cli.log_level, &env)?;

    let rt = tokio::runtime::Runtime::new().context("Failed to create tokio runtime")?;

    match cli.command {
        Commands::Check {
            connect,
            collections,
        } => rt.block_on(run_check(connect.into_config()?, collections)),
        Commands::Uri { connect } => run_uri(connect.into_config()?),
        Commands::Find {
            collection,
            filter,
            projection,
            sort,
            skip,
            limit,
            connect,
        } => {
            let mut query = QueryBuilder::new(collection)
                .filter(parse_document("filter", &filter)?)
                .limit(limit);
            if let Some(projection) = projection {
                query = query.projection(parse_document("projection", &projection)?);
            }
            if let Some(sort) = sort {
                query = query.sort(parse_document("sort", &sort)?);
            }
            if let Some(skip) = skip {
                query = query.skip(skip);
            }
            rt.block_on(run_find(connect.into_config()?, query))
        }
    }
}

async fn run_check(config: ConnectionConfig, collections: bool) -> Result<()> {
    let mut manager = DbManager::new();
    let outcome = check(&mut manager, config, collections).await;
    settle(outcome, manager.close().await)
}

async fn check(
    manager: &mut DbManager,
    config: ConnectionConfig,
    collections: bool,
) -> Result<()> {
    manager.connect(config).await?;
    let Some(connection) = manager.connection() else {
        bail!("No connection after connect");
    };

    let healthy = connection.ping().await?;
    let mut report = serde_json::json!({
        "database": connection.database_name(),
        "ownership": connection.ownership().as_str(),
        "topology": connection.topology().map(|t| t.as_str()),
        "ping": healthy,
    });
    if collections {
        report["collections"] = serde_json::json!(connection.list_collection_names().await?);
    }

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn run_uri(config: ConnectionConfig) -> Result<()> {
    let manager = DbManager::new();
    let Some(plan) = manager.plan(&config)? else {
        bail!("Configuration supplies no connection string");
    };

    let report = serde_json::json!({
        "uri": redact(&plan.uri),
        "topology": plan.topology.as_str(),
        "database": plan.uri_database().unwrap_or_else(|| config.database_name().to_string()),
        "connect": plan.options,
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

async fn run_find(config: ConnectionConfig, query: QueryBuilder) -> Result<()> {
    let mut manager = DbManager::new();
    let outcome = find(&mut manager, config, query).await;
    settle(outcome, manager.close().await)
}

/// Combine a command's result with the shutdown that follows it.
///
/// The command's own error is reported first; a close failure behind it is
/// only logged.
fn settle(outcome: Result<()>, closed: mongo_bridge::Result<()>) -> Result<()> {
    match (outcome, closed) {
        (Err(e), Err(close_err)) => {
            warn!(error = %close_err, "Failed to close MongoDB client");
            Err(e)
        }
        (Err(e), Ok(())) => Err(e),
        (Ok(()), closed) => Ok(closed?),
    }
}

async fn find(manager: &mut DbManager, config: ConnectionConfig, query: QueryBuilder) -> Result<()> {
    let db = manager.connect(config).await?;
    info!(collection = query.collection_name(), "Running legacy find");

    let docs = query.to_list(&db).await?;
    for doc in docs {
        println!("{}", Bson::Document(doc).into_relaxed_extjson());
    }
    Ok(())
}

fn parse_document(what: &str, json: &str) -> Result<Document> {
    let value: serde_json::Value =
        serde_json::from_str(json).with_context(|| format!("--{} is not valid JSON", what))?;
    match Bson::try_from(value).with_context(|| format!("--{} is not valid extended JSON", what))? {
        Bson::Document(doc) => Ok(doc),
        other => bail!("--{} must be a JSON object, got {}", what, other),
    }
}

/// Initialize logging based on log level
fn init_logging(level: &str, env: &Environment) -> Result<()> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let mut filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    if let Some(directive) = env.driver_log_directive()? {
        filter = filter.add_directive(directive.parse()?);
    }

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .try_init()
        .ok(); // Ignore error if already initialized

    Ok(())
}
