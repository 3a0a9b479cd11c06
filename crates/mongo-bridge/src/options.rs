//! Connect options with topology-aware defaults
//!
//! Options are kept as a flat key/value map so callers can pass raw driver
//! settings through `connect`. Single-node targets get manual reconnect
//! defaults; cluster targets get none and rely on the driver's failover.

use mongo_bridge_common::{BridgeError, Result};
use mongodb::options::ClientOptions;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::time::Duration;
use tracing::{debug, warn};

use crate::uri::{ParsedUri, TopologyMode};

pub const AUTO_RECONNECT: &str = "autoReconnect";
pub const RECONNECT_TRIES: &str = "reconnectTries";
pub const RECONNECT_INTERVAL: &str = "reconnectInterval";

/// `reconnectTries` value meaning "retry forever"
pub const UNLIMITED_RECONNECT_TRIES: u64 = u64::MAX;
pub const DEFAULT_RECONNECT_INTERVAL_MS: u64 = 1000;

/// Smallest heartbeat interval the driver accepts
const MIN_HEARTBEAT: Duration = Duration::from_millis(500);

/// Flat connect options, keyed by driver option name
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ConnectOptions {
    entries: Map<String, Value>,
    /// Keys supplied by the caller rather than by topology defaults
    #[serde(skip)]
    explicit: BTreeSet<String>,
}

impl ConnectOptions {
    /// Baseline options for a topology
    pub fn defaults_for(topology: TopologyMode) -> Self {
        let mut entries = Map::new();
        if topology == TopologyMode::SingleNode {
            entries.insert(AUTO_RECONNECT.to_string(), Value::Bool(true));
            entries.insert(
                RECONNECT_TRIES.to_string(),
                Value::from(UNLIMITED_RECONNECT_TRIES),
            );
            entries.insert(
                RECONNECT_INTERVAL.to_string(),
                Value::from(DEFAULT_RECONNECT_INTERVAL_MS),
            );
        }
        Self {
            entries,
            explicit: BTreeSet::new(),
        }
    }

    /// Merge caller options over these; the caller wins on conflicts
    pub fn merge(&mut self, overrides: &Map<String, Value>) {
        for (key, value) in overrides {
            self.entries.insert(key.clone(), value.clone());
            self.explicit.insert(key.clone());
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether `key` came from the caller rather than the topology defaults
    pub fn is_explicit(&self, key: &str) -> bool {
        self.explicit.contains(key)
    }

    /// Translate these options onto the driver's client options.
    ///
    /// The reconnect keys map onto the driver's nearest equivalents:
    /// `autoReconnect` drives retryable reads/writes and `reconnectInterval`
    /// drives the server monitor's heartbeat. A defaulted reconnect key only
    /// fills a setting the connection string left unset; a caller-supplied one
    /// always applies. Explicit driver keys are applied afterwards so they win
    /// over the translated ones.
    pub fn apply_to(&self, client_options: &mut ClientOptions) -> Result<()> {
        if let Some(value) = self.get(AUTO_RECONNECT) {
            let enabled = as_bool(AUTO_RECONNECT, value)?;
            let explicit = self.is_explicit(AUTO_RECONNECT);
            fill(&mut client_options.retry_reads, enabled, explicit);
            fill(&mut client_options.retry_writes, enabled, explicit);
        }
        if let Some(value) = self.get(RECONNECT_INTERVAL) {
            let interval = as_millis(RECONNECT_INTERVAL, value)?;
            fill(
                &mut client_options.heartbeat_freq,
                interval.max(MIN_HEARTBEAT),
                self.is_explicit(RECONNECT_INTERVAL),
            );
        }
        if let Some(value) = self.get(RECONNECT_TRIES) {
            let tries = as_reconnect_tries(value)?;
            if tries != UNLIMITED_RECONNECT_TRIES {
                warn!(
                    reconnect_tries = tries,
                    "Server monitoring retries until shutdown; a finite reconnectTries is not enforced"
                );
            }
        }

        for (key, value) in &self.entries {
            match key.as_str() {
                AUTO_RECONNECT | RECONNECT_TRIES | RECONNECT_INTERVAL => {}
                "appName" => client_options.app_name = Some(as_string(key, value)?),
                "maxPoolSize" => client_options.max_pool_size = Some(as_u32(key, value)?),
                "minPoolSize" => client_options.min_pool_size = Some(as_u32(key, value)?),
                "maxIdleTimeMS" => client_options.max_idle_time = Some(as_millis(key, value)?),
                "connectTimeoutMS" => client_options.connect_timeout = Some(as_millis(key, value)?),
                "serverSelectionTimeoutMS" => {
                    client_options.server_selection_timeout = Some(as_millis(key, value)?)
                }
                "heartbeatFrequencyMS" => client_options.heartbeat_freq = Some(as_millis(key, value)?),
                "localThresholdMS" => client_options.local_threshold = Some(as_millis(key, value)?),
                "retryReads" => client_options.retry_reads = Some(as_bool(key, value)?),
                "retryWrites" => client_options.retry_writes = Some(as_bool(key, value)?),
                "directConnection" => client_options.direct_connection = Some(as_bool(key, value)?),
                "replicaSet" => client_options.repl_set_name = Some(as_string(key, value)?),
                other => warn!(option = other, "Ignoring unknown connect option"),
            }
        }

        debug!(options = ?self.entries, "Applied connect options");
        Ok(())
    }
}

fn fill<T>(slot: &mut Option<T>, value: T, overwrite: bool) {
    if overwrite || slot.is_none() {
        *slot = Some(value);
    }
}

fn invalid(key: &str, expected: &str, value: &Value) -> BridgeError {
    BridgeError::Configuration(format!(
        "connect.{} must be {}, got {}",
        key, expected, value
    ))
}

fn as_bool(key: &str, value: &Value) -> Result<bool> {
    value.as_bool().ok_or_else(|| invalid(key, "a boolean", value))
}

fn as_string(key: &str, value: &Value) -> Result<String> {
    value
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| invalid(key, "a string", value))
}

fn as_u32(key: &str, value: &Value) -> Result<u32> {
    value
        .as_u64()
        .and_then(|n| u32::try_from(n).ok())
        .ok_or_else(|| invalid(key, "a non-negative 32-bit integer", value))
}

fn as_millis(key: &str, value: &Value) -> Result<Duration> {
    value
        .as_u64()
        .map(Duration::from_millis)
        .ok_or_else(|| invalid(key, "a non-negative number of milliseconds", value))
}

/// Accepts integers, plus floats at or beyond `u64::MAX` as "unlimited"
fn as_reconnect_tries(value: &Value) -> Result<u64> {
    value
        .as_u64()
        .or_else(|| {
            value
                .as_f64()
                .filter(|f| *f >= u64::MAX as f64)
                .map(|_| UNLIMITED_RECONNECT_TRIES)
        })
        .ok_or_else(|| invalid(RECONNECT_TRIES, "a non-negative integer", value))
}

/// Everything needed to dial: the URI, its topology and the merged options
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectPlan {
    pub uri: String,
    pub topology: TopologyMode,
    pub options: ConnectOptions,
}

impl ConnectPlan {
    pub fn new(uri: impl Into<String>, overrides: Option<&Map<String, Value>>) -> Self {
        let uri = uri.into();
        let topology = TopologyMode::detect(&uri);
        let mut options = ConnectOptions::defaults_for(topology);
        if let Some(overrides) = overrides {
            options.merge(overrides);
        }
        Self {
            uri,
            topology,
            options,
        }
    }

    /// Database named by the connection string's path, if any
    pub fn uri_database(&self) -> Option<String> {
        ParsedUri::parse(&self.uri).ok().and_then(|parsed| parsed.database)
    }
}
