//! Connection configuration and source selection
//!
//! # Example
//! ```rust,ignore
//! use mongo_bridge::{ConnectionConfig, DbOptions, Environment};
//!
//! let options = DbOptions::from_json_str(r#"{"host": "db1,db2", "name": "cms"}"#)?;
//! let config = ConnectionConfig::new("my-site").with_options(options);
//! let source = config.source(&Environment::from_process());
//! ```

use mongo_bridge_common::{BridgeError, Result};
use mongodb::{Client, Database};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::Path;

use crate::uri::{HostPort, DEFAULT_HOST, DEFAULT_PORT};

/// Environment variable overriding every other URI setting
pub const MONGODB_URI_ENV: &str = "MONGO_BRIDGE_MONGODB_URI";
/// Environment variable selecting the driver's log verbosity
pub const MONGODB_LOG_LEVEL_ENV: &str = "MONGO_BRIDGE_MONGODB_LOG_LEVEL";

const DRIVER_LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Process-level overrides read from the environment
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Environment {
    /// Full connection URI; beats `uri` and discrete host settings
    pub uri: Option<String>,
    /// Driver log verbosity (`trace`, `debug`, `info`, `warn`, `error`)
    pub log_level: Option<String>,
}

impl Environment {
    /// Read the overrides from the process environment.
    ///
    /// Empty values are treated as unset.
    pub fn from_process() -> Self {
        Self {
            uri: non_empty_var(MONGODB_URI_ENV),
            log_level: non_empty_var(MONGODB_LOG_LEVEL_ENV),
        }
    }

    /// `tracing` filter directive enabling driver events at the configured level
    pub fn driver_log_directive(&self) -> Result<Option<String>> {
        let Some(level) = &self.log_level else {
            return Ok(None);
        };
        let level = level.to_lowercase();
        if !DRIVER_LOG_LEVELS.contains(&level.as_str()) {
            return Err(BridgeError::Configuration(format!(
                "{} must be one of {}, got '{}'",
                MONGODB_LOG_LEVEL_ENV,
                DRIVER_LOG_LEVELS.join(", "),
                level
            )));
        }
        Ok(Some(format!("mongodb={}", level)))
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

/// Serializable connection settings
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DbOptions {
    /// Full connection URI, used verbatim
    pub uri: Option<String>,
    /// Host or comma-separated seed list (default: `localhost`)
    pub host: Option<String>,
    /// Port applied to seeds without their own (default: 27017)
    pub port: Option<u16>,
    pub user: Option<String>,
    #[serde(skip_serializing)]
    pub password: Option<String>,
    /// Database name (default: the application short name)
    pub name: Option<String>,
    /// Serialized into the URI query string
    pub params: Option<Map<String, Value>>,
    /// Low-level driver options merged over the computed defaults
    pub connect: Option<Map<String, Value>>,
}

impl std::fmt::Debug for DbOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DbOptions")
            .field("uri", &self.uri.as_deref().map(crate::uri::redact))
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("name", &self.name)
            .field("params", &self.params)
            .field("connect", &self.connect)
            .finish()
    }
}

impl DbOptions {
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| {
            BridgeError::Configuration(format!("Invalid database options: {}", e))
        })
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            BridgeError::Configuration(format!("Cannot read {}: {}", path.display(), e))
        })?;
        Self::from_json_str(&json)
    }
}

/// Everything the resolver may be handed at startup
#[derive(Clone)]
pub struct ConnectionConfig {
    /// Pre-built client shared with the caller
    pub client: Option<Client>,
    /// Pre-built database handle, already targeting the right database
    pub db: Option<Database>,
    pub options: DbOptions,
    /// Application short name, the fallback database name
    pub short_name: String,
}

impl std::fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("client", &self.client.is_some())
            .field("db", &self.db.as_ref().map(|db| db.name().to_string()))
            .field("options", &self.options)
            .field("short_name", &self.short_name)
            .finish()
    }
}

impl ConnectionConfig {
    pub fn new(short_name: impl Into<String>) -> Self {
        Self {
            client: None,
            db: None,
            options: DbOptions::default(),
            short_name: short_name.into(),
        }
    }

    pub fn with_client(mut self, client: Client) -> Self {
        self.client = Some(client);
        self
    }

    pub fn with_database(mut self, db: Database) -> Self {
        self.db = Some(db);
        self
    }

    pub fn with_options(mut self, options: DbOptions) -> Self {
        self.options = options;
        self
    }

    /// Configured database name, falling back to the short name
    pub fn database_name(&self) -> &str {
        non_empty(&self.options.name).unwrap_or(&self.short_name)
    }

    /// Pick the single source this configuration resolves through.
    ///
    /// Priority: pre-built client, pre-built handle, environment URI,
    /// explicit URI, then a URI built from the discrete settings.
    pub fn source(&self, env: &Environment) -> ConnectionSource {
        if let Some(client) = &self.client {
            return ConnectionSource::ExistingClient {
                client: client.clone(),
                name: self.database_name().to_string(),
            };
        }
        if let Some(db) = &self.db {
            return ConnectionSource::ExistingHandle(db.clone());
        }
        if let Some(uri) = non_empty(&env.uri) {
            return ConnectionSource::Uri(uri.to_string());
        }
        if let Some(uri) = non_empty(&self.options.uri) {
            return ConnectionSource::Uri(uri.to_string());
        }
        ConnectionSource::HostPort(self.host_port())
    }

    fn host_port(&self) -> HostPort {
        let options = &self.options;
        HostPort {
            host: non_empty(&options.host).unwrap_or(DEFAULT_HOST).to_string(),
            port: options.port.filter(|p| *p != 0).unwrap_or(DEFAULT_PORT),
            user: non_empty(&options.user).map(str::to_string),
            password: options.password.clone(),
            name: self.database_name().to_string(),
            params: options.params.clone(),
        }
    }
}

/// Where a live database handle comes from
#[derive(Debug, Clone)]
pub enum ConnectionSource {
    /// Caller-owned client; the handle is derived from it by name
    ExistingClient { client: Client, name: String },
    /// Caller-owned handle, adopted verbatim
    ExistingHandle(Database),
    /// Connection string from the environment or the `uri` option
    Uri(String),
    /// Discrete settings a connection string is built from
    HostPort(HostPort),
}

impl ConnectionSource {
    /// Whether resolving this source opens a new network connection
    pub fn opens_connection(&self) -> bool {
        matches!(self, ConnectionSource::Uri(_) | ConnectionSource::HostPort(_))
    }

    /// The connection string to dial, if this source dials one
    pub fn uri(&self) -> Result<Option<String>> {
        match self {
            ConnectionSource::ExistingClient { .. } | ConnectionSource::ExistingHandle(_) => Ok(None),
            ConnectionSource::Uri(uri) => Ok(Some(uri.clone())),
            ConnectionSource::HostPort(hp) => hp.to_uri().map(Some),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env_with_uri(uri: &str) -> Environment {
        Environment {
            uri: Some(uri.to_string()),
            log_level: None,
        }
    }

    #[test]
    fn test_database_name_falls_back_to_short_name() {
        let config = ConnectionConfig::new("site");
        assert_eq!(config.database_name(), "site");

        let config = ConnectionConfig::new("site").with_options(DbOptions {
            name: Some(String::new()),
            ..Default::default()
        });
        assert_eq!(config.database_name(), "site");

        let config = ConnectionConfig::new("site").with_options(DbOptions {
            name: Some("cms".to_string()),
            ..Default::default()
        });
        assert_eq!(config.database_name(), "cms");
    }

    #[test]
    fn test_source_defaults_to_host_port() {
        let config = ConnectionConfig::new("testdb");
        let source = config.source(&Environment::default());
        assert!(source.opens_connection());
        assert_eq!(
            source.uri().unwrap().as_deref(),
            Some("mongodb://localhost:27017/testdb")
        );
    }

    #[test]
    fn test_source_explicit_uri_verbatim() {
        let config = ConnectionConfig::new("site").with_options(DbOptions {
            uri: Some("mongodb://db.internal/other".to_string()),
            host: Some("ignored".to_string()),
            ..Default::default()
        });
        let source = config.source(&Environment::default());
        assert!(matches!(source, ConnectionSource::Uri(ref u) if u == "mongodb://db.internal/other"));
    }

    #[test]
    fn test_source_environment_uri_beats_explicit_uri() {
        let config = ConnectionConfig::new("site").with_options(DbOptions {
            uri: Some("mongodb://explicit/db".to_string()),
            ..Default::default()
        });
        let source = config.source(&env_with_uri("mongodb://from-env/db"));
        assert!(matches!(source, ConnectionSource::Uri(ref u) if u == "mongodb://from-env/db"));
    }

    #[test]
    fn test_source_empty_values_are_unset() {
        let config = ConnectionConfig::new("site").with_options(DbOptions {
            uri: Some(String::new()),
            host: Some(String::new()),
            port: Some(0),
            user: Some(String::new()),
            ..Default::default()
        });
        let source = config.source(&env_with_uri(""));
        assert_eq!(
            source.uri().unwrap().as_deref(),
            Some("mongodb://localhost:27017/site")
        );
    }

    #[test]
    fn test_options_from_json() {
        let options = DbOptions::from_json_str(
            r#"{
                "host": "a,b,c",
                "port": 27018,
                "user": "app",
                "password": "pw",
                "name": "testdb",
                "params": { "replicaSet": "rs0" },
                "connect": { "maxPoolSize": 5 }
            }"#,
        )
        .unwrap();
        assert_eq!(options.host.as_deref(), Some("a,b,c"));
        assert_eq!(options.port, Some(27018));
        assert_eq!(options.password.as_deref(), Some("pw"));
        assert!(options.params.unwrap().contains_key("replicaSet"));
        assert!(options.connect.unwrap().contains_key("maxPoolSize"));
    }

    #[test]
    fn test_options_from_bad_json() {
        let err = DbOptions::from_json_str(r#"{"port": "not a number"}"#).unwrap_err();
        assert!(matches!(err, BridgeError::Configuration(_)));
    }

    #[test]
    fn test_options_debug_hides_password() {
        let options = DbOptions {
            uri: Some("mongodb://u:secret@h/db".to_string()),
            password: Some("hunter2".to_string()),
            ..Default::default()
        };
        let rendered = format!("{:?}", options);
        assert!(!rendered.contains("hunter2"));
        assert!(!rendered.contains("secret"));
    }

    #[test]
    fn test_options_serialize_skips_password() {
        let options = DbOptions {
            password: Some("hunter2".to_string()),
            ..Default::default()
        };
        let json = serde_json::to_string(&options).unwrap();
        assert!(!json.contains("hunter2"));
    }

    #[test]
    fn test_driver_log_directive() {
        let env = Environment {
            uri: None,
            log_level: Some("DEBUG".to_string()),
        };
        assert_eq!(
            env.driver_log_directive().unwrap().as_deref(),
            Some("mongodb=debug")
        );
        assert_eq!(Environment::default().driver_log_directive().unwrap(), None);
    }

    #[test]
    fn test_driver_log_directive_rejects_unknown_level() {
        let env = Environment {
            uri: None,
            log_level: Some("chatty".to_string()),
        };
        assert!(matches!(
            env.driver_log_directive(),
            Err(BridgeError::Configuration(_))
        ));
    }

    #[tokio::test]
    async fn test_source_prefers_client_then_handle() {
        let client = Client::with_uri_str("mongodb://localhost:27017").await.unwrap();
        let config = ConnectionConfig::new("site")
            .with_client(client.clone())
            .with_database(client.database("other"))
            .with_options(DbOptions {
                uri: Some("mongodb://ignored/db".to_string()),
                ..Default::default()
            });
        let source = config.source(&env_with_uri("mongodb://also-ignored/db"));
        assert!(!source.opens_connection());
        assert!(matches!(source, ConnectionSource::ExistingClient { ref name, .. } if name == "site"));

        let config = ConnectionConfig::new("site").with_database(client.database("other"));
        let source = config.source(&Environment::default());
        assert!(matches!(source, ConnectionSource::ExistingHandle(ref db) if db.name() == "other"));
        assert_eq!(source.uri().unwrap(), None);
    }
}
