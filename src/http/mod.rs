//! Outbound HTTP to the backend.
//!
//! - **descriptor**: immutable request descriptions built by tools
//! - **transport**: one request, one response, over reqwest
//! - **retry**: retry classification and backoff schedule
//! - **client**: rate limit + retry + error normalization

pub mod client;
pub mod descriptor;
pub mod retry;
pub mod transport;

#[cfg(test)]
pub(crate) mod testing;

pub use client::{AttemptObserver, AttemptOutcome, AttemptRecord, ResilientClient, Response};
pub use descriptor::{path_segment, DescriptorBuilder, Method, RequestDescriptor};
pub use retry::{Backoff, RetryPolicy};
pub use transport::{RawResponse, ReqwestTransport, Transport, TransportError};
