//! Network edge of the HTTP client.
//!
//! `Transport` sends exactly one request and reports what happened. Policy
//! (rate limiting, retry, error normalization) lives in the client above it.

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::RETRY_AFTER;
use std::collections::BTreeMap;
use std::error::Error as StdError;
use std::time::Duration;

use super::descriptor::RequestDescriptor;
use super::retry::parse_retry_after;
use crate::types::{ClientConfig, Error, Result};

/// Status, `Retry-After` hint and raw body of one HTTP exchange.
#[derive(Debug, Clone, PartialEq)]
pub struct RawResponse {
    pub status: u16,
    pub retry_after: Option<Duration>,
    pub body: Bytes,
}

impl RawResponse {
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            retry_after: None,
            body: body.into(),
        }
    }

    pub fn with_retry_after(mut self, retry_after: Duration) -> Self {
        self.retry_after = Some(retry_after);
        self
    }
}

/// Failure before a complete HTTP response was received.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("connect failed: {0}")]
    Connect(String),

    #[error("timed out: {0}")]
    Timeout(String),

    /// Reset, closed mid-exchange, body read failure.
    #[error("connection error: {0}")]
    Io(String),

    /// The request could not be built (bad URL, invalid header). Never retried.
    #[error("malformed request: {0}")]
    Malformed(String),
}

impl TransportError {
    pub fn is_transient(&self) -> bool {
        !matches!(self, TransportError::Malformed(_))
    }
}

/// Sends one request. Implementations must be safe to share across tasks.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(
        &self,
        url: &str,
        headers: &BTreeMap<String, String>,
        request: &RequestDescriptor,
    ) -> std::result::Result<RawResponse, TransportError>;
}

/// Production transport over a pooled `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .read_timeout(config.read_timeout)
            .pool_max_idle_per_host(10)
            .build()
            .map_err(|e| Error::config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(
        &self,
        url: &str,
        headers: &BTreeMap<String, String>,
        request: &RequestDescriptor,
    ) -> std::result::Result<RawResponse, TransportError> {
        let mut builder = self.client.request(request.method().into(), url);
        for (name, value) in headers {
            builder = builder.header(name, value);
        }
        if !request.query().is_empty() {
            builder = builder.query(request.query());
        }
        if let Some(body) = request.body() {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(classify)?;
        let status = response.status().as_u16();
        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_retry_after);
        let body = response.bytes().await.map_err(classify)?;

        Ok(RawResponse {
            status,
            retry_after,
            body,
        })
    }
}

/// Map a reqwest error onto the transient/non-transient split.
fn classify(err: reqwest::Error) -> TransportError {
    let message = error_chain(&err);
    if err.is_builder() {
        TransportError::Malformed(message)
    } else if err.is_timeout() {
        TransportError::Timeout(message)
    } else if err.is_connect() {
        TransportError::Connect(message)
    } else {
        TransportError::Io(message)
    }
}

/// Flatten an error and its sources into one diagnostic line.
fn error_chain(err: &dyn StdError) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(inner) = source {
        message.push_str(": ");
        message.push_str(&inner.to_string());
        source = inner.source();
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_malformed_is_permanent() {
        assert!(TransportError::Connect("refused".into()).is_transient());
        assert!(TransportError::Timeout("read".into()).is_transient());
        assert!(TransportError::Io("reset".into()).is_transient());
        assert!(!TransportError::Malformed("bad url".into()).is_transient());
    }

    #[tokio::test]
    async fn test_invalid_url_is_malformed() {
        let transport = ReqwestTransport::new(&ClientConfig::default()).unwrap();
        let request = RequestDescriptor::get("/x").build();
        let err = transport
            .send("not a url", &BTreeMap::new(), &request)
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Malformed(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn test_refused_connection_is_transient() {
        // Bind then drop to get a port nobody listens on.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let transport = ReqwestTransport::new(&ClientConfig::default()).unwrap();
        let request = RequestDescriptor::get("/x").build();
        let err = transport
            .send(&format!("http://{addr}/x"), &BTreeMap::new(), &request)
            .await
            .unwrap_err();
        assert!(err.is_transient(), "got {err:?}");
    }
}
