//! Minimal MCP server: JSON-RPC 2.0 over stdio and HTTP.

pub mod protocol;
pub mod server;
pub mod stdio;

pub use protocol::{RpcError, MCP_PROTOCOL_VERSION, SERVER_NAME};
pub use server::{Incoming, McpServer};
pub use stdio::serve_stdio;
