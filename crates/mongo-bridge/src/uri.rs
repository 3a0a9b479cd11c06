//! Connection string construction and inspection
//!
//! Builds `mongodb://` URIs from discrete host/port/credential settings and
//! inspects existing URIs for the two facts the resolver cares about: which
//! topology they point at and whether they name a database in their path.

use mongo_bridge_common::{BridgeError, Result};
use serde_json::{Map, Value};
use urlencoding::{decode, encode};

/// Host used when none is configured
pub const DEFAULT_HOST: &str = "localhost";
/// Port used for every seed host that does not carry its own
pub const DEFAULT_PORT: u16 = 27017;
/// Scheme of connection strings listing their hosts directly
pub const STANDARD_SCHEME: &str = "mongodb";
/// Scheme of connection strings resolved through DNS service discovery
pub const SEEDLIST_SCHEME: &str = "mongodb+srv";

/// Whether a connection string targets one standalone server or a cluster
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TopologyMode {
    /// A single standalone node; manual reconnect defaults apply
    SingleNode,
    /// Replica set or sharded cluster; the driver's own failover applies
    Cluster,
}

impl TopologyMode {
    /// Classify a connection string.
    ///
    /// A seedlist scheme or a comma anywhere in the host segment means a
    /// cluster. Anything else, including strings that fail to parse, is
    /// treated as a single node.
    pub fn detect(uri: &str) -> Self {
        if uri.starts_with(SEEDLIST_SCHEME) {
            return TopologyMode::Cluster;
        }
        match host_segment(uri) {
            Some(hosts) if hosts.contains(',') => TopologyMode::Cluster,
            _ => TopologyMode::SingleNode,
        }
    }

    pub fn is_cluster(self) -> bool {
        self == TopologyMode::Cluster
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TopologyMode::SingleNode => "single-node",
            TopologyMode::Cluster => "cluster",
        }
    }
}

impl std::fmt::Display for TopologyMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Host segment of a connection string, credentials stripped
fn host_segment(uri: &str) -> Option<&str> {
    let (_, rest) = uri.split_once("://")?;
    let authority = &rest[..authority_end(rest)];
    Some(
        authority
            .rsplit_once('@')
            .map(|(_, hosts)| hosts)
            .unwrap_or(authority),
    )
}

fn authority_end(rest: &str) -> usize {
    rest.find(['/', '?']).unwrap_or(rest.len())
}

/// A connection string split into its parts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedUri {
    pub scheme: String,
    /// Raw `user[:password]` section, still percent-encoded
    pub credentials: Option<String>,
    pub hosts: Vec<String>,
    /// Decoded database name from the path, if the path names one
    pub database: Option<String>,
    pub query: Option<String>,
}

impl ParsedUri {
    pub fn parse(uri: &str) -> Result<Self> {
        let (scheme, rest) = uri.split_once("://").ok_or_else(|| {
            BridgeError::Configuration(format!(
                "Connection string is missing a scheme: {}",
                redact(uri)
            ))
        })?;

        let (authority, tail) = rest.split_at(authority_end(rest));
        let (credentials, hosts) = match authority.rsplit_once('@') {
            Some((credentials, hosts)) => (Some(credentials.to_string()), hosts),
            None => (None, authority),
        };
        if hosts.is_empty() {
            return Err(BridgeError::Configuration(format!(
                "Connection string has no hosts: {}",
                redact(uri)
            )));
        }

        let (path, query) = match tail.split_once('?') {
            Some((path, query)) => (path, Some(query.to_string())),
            None => (tail, None),
        };

        // "/" alone does not name a database
        let database = if path.len() > 1 {
            let name = decode(&path[1..]).map_err(|e| {
                BridgeError::Configuration(format!("Invalid database name in connection string: {}", e))
            })?;
            Some(name.into_owned())
        } else {
            None
        };

        Ok(Self {
            scheme: scheme.to_string(),
            credentials,
            hosts: hosts.split(',').map(str::to_string).collect(),
            database,
            query,
        })
    }
}

/// Discrete connection settings used when no URI is configured
#[derive(Debug, Clone, PartialEq)]
pub struct HostPort {
    /// One host or a comma-separated seed list; each seed may carry `:port`
    pub host: String,
    pub port: u16,
    pub user: Option<String>,
    pub password: Option<String>,
    pub name: String,
    pub params: Option<Map<String, Value>>,
}

impl HostPort {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            user: None,
            password: None,
            name: name.into(),
            params: None,
        }
    }

    /// Render `mongodb://[user[:password]@]host:port[,...]/name[?params]`
    pub fn to_uri(&self) -> Result<String> {
        if self.name.is_empty() {
            return Err(BridgeError::Configuration(
                "Database name must not be empty".to_string(),
            ));
        }

        let mut uri = format!("{}://", STANDARD_SCHEME);
        if let Some(user) = &self.user {
            uri.push_str(&encode(user));
            if let Some(password) = &self.password {
                uri.push(':');
                uri.push_str(&encode(password));
            }
            uri.push('@');
        }

        let seeds = self
            .host
            .split(',')
            .map(|seed| format_seed(seed, self.port))
            .collect::<Result<Vec<_>>>()?;
        uri.push_str(&seeds.join(","));

        uri.push('/');
        uri.push_str(&encode(&self.name));

        if let Some(params) = self.params.as_ref().filter(|p| !p.is_empty()) {
            uri.push('?');
            uri.push_str(&serialize_params(params)?);
        }

        Ok(uri)
    }
}

fn format_seed(seed: &str, default_port: u16) -> Result<String> {
    let seed = seed.trim();
    if seed.is_empty() {
        return Err(BridgeError::Configuration(
            "Host list contains an empty entry".to_string(),
        ));
    }

    // IPv6 literal, optionally followed by ":port"
    if seed.starts_with('[') {
        return Ok(if seed.contains("]:") {
            seed.to_string()
        } else {
            format!("{}:{}", seed, default_port)
        });
    }

    match seed.rsplit_once(':') {
        Some((host, port)) => {
            let port: u16 = port.parse().map_err(|_| {
                BridgeError::Configuration(format!("Invalid port in host entry '{}'", seed))
            })?;
            Ok(format!("{}:{}", encode(host), port))
        }
        None => Ok(format!("{}:{}", encode(seed), default_port)),
    }
}

/// Serialize a params mapping into a query string.
///
/// Scalars become `key=value`, lists become one `key=value` pair per item
/// (the convention the driver uses for repeatable options such as
/// `readPreferenceTags`), and `null` becomes `key=`. Nested objects cannot be
/// expressed in a connection string and are rejected.
pub fn serialize_params(params: &Map<String, Value>) -> Result<String> {
    let mut pairs = Vec::with_capacity(params.len());
    for (key, value) in params {
        if key.is_empty() {
            return Err(BridgeError::Configuration(
                "params contains an empty key".to_string(),
            ));
        }
        match value {
            Value::Array(items) => {
                for item in items {
                    pairs.push(query_pair(key, &scalar_param(key, item)?));
                }
            }
            other => pairs.push(query_pair(key, &scalar_param(key, other)?)),
        }
    }
    Ok(pairs.join("&"))
}

fn scalar_param(key: &str, value: &Value) -> Result<String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Null => Ok(String::new()),
        Value::Array(_) | Value::Object(_) => Err(BridgeError::Configuration(format!(
            "params.{} must be a scalar or a list of scalars",
            key
        ))),
    }
}

fn query_pair(key: &str, value: &str) -> String {
    format!("{}={}", encode(key), encode(value))
}

/// Replace the credentials of a connection string with `***` for logging
pub fn redact(uri: &str) -> String {
    let Some((scheme, rest)) = uri.split_once("://") else {
        return uri.to_string();
    };
    match rest[..authority_end(rest)].rfind('@') {
        Some(at) => format!("{}://***@{}", scheme, &rest[at + 1..]),
        None => uri.to_string(),
    }
}
