//! Client construction and teardown behind an injectable seam

use async_trait::async_trait;
use bson::doc;
use mongo_bridge_common::Result;
use mongodb::options::ClientOptions;
use mongodb::Client;
use tracing::{debug, instrument};

use crate::options::ConnectPlan;
use crate::uri::redact;

/// Opens and closes driver clients for the resolver
#[async_trait]
pub trait ClientFactory: Send + Sync {
    /// Open a client for `plan` and confirm the server answers
    async fn connect(&self, plan: &ConnectPlan) -> Result<Client>;

    /// Close a client this process opened, without draining in-flight work
    async fn close(&self, client: Client) -> Result<()>;
}

/// Factory backed by the `mongodb` driver
#[derive(Debug, Clone, Copy, Default)]
pub struct DriverClientFactory;

#[async_trait]
impl ClientFactory for DriverClientFactory {
    #[instrument(skip(self, plan), fields(uri = %redact(&plan.uri), topology = %plan.topology))]
    async fn connect(&self, plan: &ConnectPlan) -> Result<Client> {
        let mut client_options = ClientOptions::parse(plan.uri.as_str()).await?;
        plan.options.apply_to(&mut client_options)?;

        let client = Client::with_options(client_options)?;

        // The driver connects lazily; ping so failures surface here
        client
            .database("admin")
            .run_command(doc! { "ping": 1 })
            .await?;

        debug!("Server answered ping");
        Ok(client)
    }

    async fn close(&self, client: Client) -> Result<()> {
        client.shutdown().immediate(true).await;
        Ok(())
    }
}
