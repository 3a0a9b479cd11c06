//! In-memory client factory for unit tests

use async_trait::async_trait;
use mongo_bridge_common::{BridgeError, Result};
use mongodb::Client;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::factory::ClientFactory;
use crate::options::ConnectPlan;

/// Builds lazy clients (no server round trip) and records every call
#[derive(Default)]
pub(crate) struct RecordingFactory {
    connects: AtomicUsize,
    closes: AtomicUsize,
    connect_error: Option<BridgeError>,
    close_error: Option<BridgeError>,
    last_plan: Mutex<Option<ConnectPlan>>,
}

impl RecordingFactory {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn failing_connect(err: BridgeError) -> Self {
        Self {
            connect_error: Some(err),
            ..Self::default()
        }
    }

    pub(crate) fn failing_close(err: BridgeError) -> Self {
        Self {
            close_error: Some(err),
            ..Self::default()
        }
    }

    pub(crate) fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub(crate) fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub(crate) fn last_plan(&self) -> Option<ConnectPlan> {
        self.last_plan.lock().unwrap().clone()
    }
}

#[async_trait]
impl ClientFactory for RecordingFactory {
    async fn connect(&self, plan: &ConnectPlan) -> Result<Client> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        *self.last_plan.lock().unwrap() = Some(plan.clone());
        if let Some(err) = &self.connect_error {
            return Err(err.clone());
        }
        Ok(Client::with_uri_str(plan.uri.as_str()).await?)
    }

    async fn close(&self, client: Client) -> Result<()> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        drop(client);
        match &self.close_error {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}
