//! Resilient HTTP client: rate limiting, retry/backoff and error
//! normalization around a `Transport`.

use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use super::descriptor::{Method, RequestDescriptor};
use super::retry::{is_retriable_status, RetryPolicy};
use super::transport::{RawResponse, ReqwestTransport, Transport};
use crate::rate_limiter::RateLimiter;
use crate::types::{ClientConfig, Error, Result};

/// Successful (2xx) backend response.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Response {
    pub status: u16,
    pub body: Value,
}

/// What one attempt produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    Success { status: u16 },
    /// 429 or 5xx; eligible for retry.
    RetriableStatus { status: u16 },
    /// Definitive non-2xx status.
    Rejected { status: u16 },
    TransportError { message: String, transient: bool },
    /// No slot within the bounded wait; nothing was sent.
    RateLimited { retry_after: Duration },
}

impl AttemptOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, AttemptOutcome::Success { .. })
    }

    pub fn label(&self) -> &'static str {
        match self {
            AttemptOutcome::Success { .. } => "success",
            AttemptOutcome::RetriableStatus { .. } => "retriable_status",
            AttemptOutcome::Rejected { .. } => "rejected",
            AttemptOutcome::TransportError { .. } => "transport_error",
            AttemptOutcome::RateLimited { .. } => "rate_limited",
        }
    }
}

/// Observable record of a single attempt.
#[derive(Debug, Clone)]
pub struct AttemptRecord {
    pub attempt: u32,
    pub max_attempts: u32,
    pub method: Method,
    pub path: String,
    pub elapsed: Duration,
    pub outcome: AttemptOutcome,
    /// Backoff before the next attempt, when one will follow.
    pub next_delay: Option<Duration>,
}

/// Hook receiving every attempt. The client never logs on its own.
pub trait AttemptObserver: Send + Sync {
    fn on_attempt(&self, record: &AttemptRecord);
}

/// Outbound client shared by all tool calls.
///
/// Holds the immutable config, the pooled transport and the process-wide
/// rate limiter. Cheap to clone.
#[derive(Clone)]
pub struct ResilientClient {
    config: Arc<ClientConfig>,
    policy: RetryPolicy,
    default_headers: Arc<BTreeMap<String, String>>,
    transport: Arc<dyn Transport>,
    limiter: Arc<RateLimiter>,
    observer: Option<Arc<dyn AttemptObserver>>,
}

impl fmt::Debug for ResilientClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResilientClient")
            .field("base_url", &self.config.base_url)
            .field("policy", &self.policy)
            .field("limiter", &self.limiter)
            .field("has_observer", &self.observer.is_some())
            .finish_non_exhaustive()
    }
}

impl ResilientClient {
    pub fn new(
        config: Arc<ClientConfig>,
        transport: Arc<dyn Transport>,
        limiter: Arc<RateLimiter>,
    ) -> Self {
        Self {
            policy: RetryPolicy::from_config(&config),
            default_headers: Arc::new(config.default_headers()),
            config,
            transport,
            limiter,
            observer: None,
        }
    }

    /// Production client: reqwest transport and a limiter sized from config.
    pub fn from_config(config: Arc<ClientConfig>) -> Result<Self> {
        let transport = Arc::new(ReqwestTransport::new(&config)?);
        let limiter = Arc::new(RateLimiter::from_config(&config));
        Ok(Self::new(config, transport, limiter))
    }

    pub fn with_observer(mut self, observer: Arc<dyn AttemptObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    /// Execute one descriptor under the rate limit and retry policy.
    ///
    /// Every attempt sends the same descriptor. Dropping the returned future
    /// abandons the in-flight attempt and any pending backoff.
    pub async fn execute(&self, request: &RequestDescriptor) -> Result<Response> {
        let url = self.config.url_for(request.path());
        let headers = self.merged_headers(request);
        let max_attempts = self.policy.max_attempts;
        let mut backoff = self.policy.backoff();
        let mut last_status = None;
        let mut last_error = String::new();
        let mut last_retry_after = None;

        for attempt in 1..=max_attempts {
            let queued = Instant::now();
            if let Err(err) = self.limiter.acquire().await {
                if let Error::RateLimited { retry_after } = &err {
                    let outcome = AttemptOutcome::RateLimited {
                        retry_after: *retry_after,
                    };
                    self.observe(request, attempt, queued, outcome, None);
                }
                return Err(err);
            }

            let sent = Instant::now();
            let (outcome, retry_after) = match self.transport.send(&url, &headers, request).await {
                Ok(raw) if (200..300).contains(&raw.status) => {
                    let outcome = AttemptOutcome::Success { status: raw.status };
                    self.observe(request, attempt, sent, outcome, None);
                    return Ok(Response {
                        status: raw.status,
                        body: parse_body(&raw.body),
                    });
                }
                Ok(raw) if is_retriable_status(raw.status) => {
                    last_status = Some(raw.status);
                    last_error = format!("HTTP {}: {}", raw.status, body_text(&raw));
                    last_retry_after = raw.retry_after;
                    let outcome = AttemptOutcome::RetriableStatus { status: raw.status };
                    (outcome, raw.retry_after)
                }
                Ok(raw) => {
                    let outcome = AttemptOutcome::Rejected { status: raw.status };
                    self.observe(request, attempt, sent, outcome, None);
                    return Err(rejected(&raw));
                }
                Err(err) if err.is_transient() => {
                    last_status = None;
                    last_retry_after = None;
                    last_error = err.to_string();
                    let outcome = AttemptOutcome::TransportError {
                        message: last_error.clone(),
                        transient: true,
                    };
                    (outcome, None)
                }
                Err(err) => {
                    let outcome = AttemptOutcome::TransportError {
                        message: err.to_string(),
                        transient: false,
                    };
                    self.observe(request, attempt, sent, outcome, None);
                    return Err(Error::internal(err.to_string()));
                }
            };

            let delay = if attempt == max_attempts {
                None
            } else {
                backoff.next_delay(attempt, retry_after)
            };
            self.observe(request, attempt, sent, outcome, delay);
            match delay {
                Some(delay) => tokio::time::sleep(delay).await,
                // Out of attempts, or the backend wants a longer pause than
                // the retry budget allows.
                None => {
                    return Err(Error::UpstreamUnavailable {
                        attempts: attempt,
                        last_status,
                        last_error,
                        retry_after: last_retry_after,
                    })
                }
            }
        }

        Err(Error::UpstreamUnavailable {
            attempts: max_attempts,
            last_status,
            last_error,
            retry_after: last_retry_after,
        })
    }

    /// Send one unretried, unlimited GET to the base URL. Any HTTP status
    /// means the backend is reachable.
    pub async fn probe(&self) -> std::result::Result<u16, String> {
        let request = RequestDescriptor::get("/").build();
        let url = self.config.url_for(request.path());
        self.transport
            .send(&url, &self.default_headers, &request)
            .await
            .map(|raw| raw.status)
            .map_err(|e| e.to_string())
    }

    fn merged_headers(&self, request: &RequestDescriptor) -> BTreeMap<String, String> {
        let mut headers = (*self.default_headers).clone();
        for (name, value) in request.headers() {
            // Header names are case-insensitive; drop a default that differs only by case.
            headers.retain(|existing, _| !existing.eq_ignore_ascii_case(name));
            headers.insert(name.clone(), value.clone());
        }
        headers
    }

    fn observe(
        &self,
        request: &RequestDescriptor,
        attempt: u32,
        started: Instant,
        outcome: AttemptOutcome,
        next_delay: Option<Duration>,
    ) {
        if let Some(observer) = &self.observer {
            observer.on_attempt(&AttemptRecord {
                attempt,
                max_attempts: self.policy.max_attempts,
                method: request.method(),
                path: request.path().to_string(),
                elapsed: started.elapsed(),
                outcome,
                next_delay,
            });
        }
    }
}

/// Empty -> null, JSON -> parsed, anything else -> string.
fn parse_body(body: &[u8]) -> Value {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Value::Null;
    }
    serde_json::from_slice(body)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(body).into_owned()))
}

fn body_text(raw: &RawResponse) -> String {
    let text = String::from_utf8_lossy(&raw.body);
    if text.trim().is_empty() {
        reqwest::StatusCode::from_u16(raw.status)
            .ok()
            .and_then(|s| s.canonical_reason())
            .unwrap_or("no body")
            .to_string()
    } else {
        text.into_owned()
    }
}

fn rejected(raw: &RawResponse) -> Error {
    Error::UpstreamRejected {
        status: raw.status,
        message: body_text(raw),
        body: parse_body(&raw.body),
    }
}
