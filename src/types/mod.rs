//! Core types for the MCP server.
//!
//! - **IDs**: call and instance identifiers
//! - **Errors**: the tool-facing error taxonomy with thiserror derives
//! - **Config**: immutable configuration for the client, server and logging

mod config;
mod errors;
mod ids;

pub use config::{
    ClientConfig, Config, ObservabilityConfig, ServerConfig, DEFAULT_BASE_URL, USER_AGENT,
};
pub use errors::{Error, ErrorKind, Result};
pub use ids::{CallId, InstanceId};
