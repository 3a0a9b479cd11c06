//! Shutdown of a resolved connection
//!
//! Only a client the resolver opened itself is closed. A reused client
//! stays open for whoever built it, and an adopted handle has no client.

use mongo_bridge_common::{BridgeError, Result};
use tracing::{debug, info, instrument};

use crate::connection::ResolvedConnection;
use crate::factory::ClientFactory;
use crate::keepalive::Keepalive;

/// Release `connection` at shutdown.
///
/// The keepalive, if any, is cancelled first regardless of ownership. A
/// failure to close an owned client is returned as [`BridgeError::Close`].
#[instrument(skip_all)]
pub async fn close<F: ClientFactory>(
    factory: &F,
    connection: Option<ResolvedConnection>,
    keepalive: Option<Keepalive>,
) -> Result<()> {
    if let Some(keepalive) = keepalive {
        keepalive.cancel();
        debug!("Keepalive cancelled");
    }

    let Some(connection) = connection else {
        return Ok(());
    };

    let (client, ownership) = connection.into_client();
    let Some(client) = client else {
        debug!("No client to close; the database handle was supplied directly");
        return Ok(());
    };
    if !ownership.closes_on_shutdown() {
        debug!(ownership = ownership.as_str(), "Leaving caller-supplied client open for its owner");
        return Ok(());
    }

    factory.close(client).await.map_err(|e| match e {
        BridgeError::Close(_) => e,
        other => BridgeError::Close(other.message().to_string()),
    })?;
    info!("MongoDB client closed");
    Ok(())
}
