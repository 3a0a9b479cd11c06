//! Common utilities for mongo-bridge
//!
//! This crate provides the error type shared by the connection layer and the CLI.

pub mod error;

pub use error::{BridgeError, Result};
