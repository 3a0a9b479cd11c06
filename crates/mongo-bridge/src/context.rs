//! Process-wide application context holding the live database handle
//!
//! Higher-level data-access code reads the handle from here instead of
//! threading it through every call.

use mongo_bridge_common::{BridgeError, Result};
use std::sync::{PoisonError, RwLock as StdRwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::compat::CompatDatabase;

static DATABASE: StdRwLock<Option<CompatDatabase>> = StdRwLock::new(None);

// The slot is only ever replaced whole, so a poisoned lock is recovered.
fn read_slot() -> RwLockReadGuard<'static, Option<CompatDatabase>> {
    DATABASE.read().unwrap_or_else(PoisonError::into_inner)
}

fn write_slot() -> RwLockWriteGuard<'static, Option<CompatDatabase>> {
    DATABASE.write().unwrap_or_else(PoisonError::into_inner)
}

/// Publish `database` as the process-wide handle, replacing any previous one
pub fn install_database(database: CompatDatabase) {
    *write_slot() = Some(database);
}

/// Get the process-wide handle, returning an error if none is published
pub fn database() -> Result<CompatDatabase> {
    read_slot()
        .clone()
        .ok_or_else(|| BridgeError::Internal("Database not initialized. Call connect() first.".to_string()))
}

pub fn is_connected() -> bool {
    read_slot().is_some()
}

/// Drop the published handle. The client behind it is not closed.
pub fn clear() {
    *write_slot() = None;
}
