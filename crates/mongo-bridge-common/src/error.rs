//! Error types for mongo-bridge

use thiserror::Error;

/// Result type alias for mongo-bridge operations
pub type Result<T> = std::result::Result<T, BridgeError>;

/// Unified error type for connection resolution, compatibility calls and shutdown
#[derive(Error, Debug, Clone)]
pub enum BridgeError {
    /// Malformed connection options, params mapping or URI. Fatal to startup.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Network, DNS or authentication failure while opening the connection
    #[error("Connection error: {0}")]
    Connection(String),

    /// Failure while closing an owned client at shutdown
    #[error("Close error: {0}")]
    Close(String),

    #[error("MongoDB error: {0}")]
    MongoDB(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl BridgeError {
    /// The message carried by this error, without the category prefix
    pub fn message(&self) -> &str {
        match self {
            BridgeError::Configuration(m)
            | BridgeError::Connection(m)
            | BridgeError::Close(m)
            | BridgeError::MongoDB(m)
            | BridgeError::Serialization(m)
            | BridgeError::Deserialization(m)
            | BridgeError::Internal(m) => m,
        }
    }

    /// Returns true if this error happened while establishing a connection
    pub fn is_connection(&self) -> bool {
        matches!(self, BridgeError::Connection(_))
    }
}

impl From<serde_json::Error> for BridgeError {
    fn from(err: serde_json::Error) -> Self {
        BridgeError::Serialization(err.to_string())
    }
}

// MongoDB-specific error conversions (when mongodb-errors feature is enabled)
#[cfg(feature = "mongodb-errors")]
impl From<mongodb::error::Error> for BridgeError {
    fn from(err: mongodb::error::Error) -> Self {
        use mongodb::error::ErrorKind;

        match err.kind.as_ref() {
            ErrorKind::Io(_)
            | ErrorKind::DnsResolve { .. }
            | ErrorKind::ServerSelection { .. }
            | ErrorKind::Authentication { .. } => BridgeError::Connection(err.to_string()),
            ErrorKind::InvalidArgument { .. } => BridgeError::Configuration(err.to_string()),
            _ => BridgeError::MongoDB(err.to_string()),
        }
    }
}

#[cfg(feature = "mongodb-errors")]
impl From<bson::ser::Error> for BridgeError {
    fn from(err: bson::ser::Error) -> Self {
        BridgeError::Serialization(format!("BSON serialization error: {}", err))
    }
}

#[cfg(feature = "mongodb-errors")]
impl From<bson::de::Error> for BridgeError {
    fn from(err: bson::de::Error) -> Self {
        BridgeError::Deserialization(format!("BSON deserialization error: {}", err))
    }
}
