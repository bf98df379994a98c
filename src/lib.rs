//! # Whistle MCP - agent tools over the Whistle Express API
//!
//! Exposes the Whistle backend (provider search, phone + OTP sign-in,
//! whistles, user settings) as MCP tools, behind a resilient outbound HTTP
//! layer:
//! - Tool catalog with JSON Schema validation before any network call
//! - One shared client: process-wide sliding-window rate limit, bounded
//!   retries with exponential backoff, `Retry-After` support
//! - Structured `ToolResult` errors the agent can branch on
//! - MCP over stdio and `POST /mcp`, plus liveness/readiness endpoints
//!
//! ## Architecture
//!
//! ```text
//!   stdio / POST /mcp
//!          │
//!          ▼
//!   ┌─────────────┐   prepare    ┌─────────────┐
//!   │  McpServer  │ ───────────▶ │ ToolCatalog │  invalid_argument,
//!   └──────┬──────┘              └─────────────┘  unknown_tool
//!          │ tools/call
//!          ▼
//!   ┌─────────────┐  build   ┌───────────────────┐
//!   │ Dispatcher  │ ───────▶ │ RequestDescriptor │
//!   └──────┬──────┘          └─────────┬─────────┘
//!          │ shape                     ▼
//!          │             ┌──────────────────────────┐
//!          └──────────── │ ResilientClient          │
//!                        │  RateLimiter → Transport │ ─▶ backend
//!                        │  Backoff / Retry-After   │
//!                        └──────────────────────────┘
//! ```

// Enforce strict safety at compile time
#![deny(unsafe_code)]
#![warn(missing_debug_implementations)]
#![warn(rust_2018_idioms)]

pub mod health;
pub mod http;
pub mod mcp;
pub mod rate_limiter;
pub mod tools;
pub mod types;

// Internal utilities
pub mod observability;

pub use types::{Config, Error, Result};
