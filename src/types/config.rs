//! Configuration structures.
//!
//! Configuration is resolved once at startup (environment, `.env`, CLI flags)
//! and then shared read-only. Nothing mutates it after construction.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

use super::errors::{Error, Result};

/// Default backend base URL.
pub const DEFAULT_BASE_URL: &str = "https://dowhistle.herokuapp.com/v3";

/// User agent sent on every backend request.
pub const USER_AGENT: &str = "MCP-Server/1.0";

/// Global server configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Server configuration.
    #[serde(default)]
    pub server: ServerConfig,

    /// Observability configuration.
    #[serde(default)]
    pub observability: ObservabilityConfig,

    /// Outbound backend client configuration.
    #[serde(default)]
    pub client: ClientConfig,
}

impl Config {
    /// Check cross-field constraints before the config is shared.
    pub fn validate(&self) -> Result<()> {
        self.client.validate()
    }
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Health / HTTP MCP bind address.
    pub health_addr: String,

    /// Origins allowed to call the HTTP surface from a browser. `*` allows any.
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,
}

fn default_cors_origins() -> Vec<String> {
    vec!["*".to_string()]
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            health_addr: "0.0.0.0:8080".to_string(),
            cors_origins: default_cors_origins(),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Tracing log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable JSON log formatting.
    pub json_logs: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
        }
    }
}

/// Outbound HTTP client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Backend base URL; tool paths are appended to it.
    pub base_url: String,

    /// Bearer credential sent as `Authorization` when set.
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,

    /// Extra headers sent on every request.
    #[serde(default)]
    pub extra_headers: BTreeMap<String, String>,

    /// Per-attempt TCP/TLS connect timeout.
    #[serde(with = "humantime_serde")]
    pub connect_timeout: Duration,

    /// Per-attempt read timeout.
    #[serde(with = "humantime_serde")]
    pub read_timeout: Duration,

    /// Total attempt ceiling per request (first attempt included).
    pub max_retries: u32,

    /// Backoff base delay.
    #[serde(with = "humantime_serde")]
    pub retry_base_delay: Duration,

    /// Backoff cap. Also caps a backend `Retry-After`.
    #[serde(with = "humantime_serde")]
    pub retry_max_delay: Duration,

    /// Jitter factor in `[0, 1)`; delays vary by `±jitter`.
    pub retry_jitter: f64,

    /// Admitted request starts per rolling minute.
    pub rate_limit_per_minute: u32,

    /// How long a caller may queue for a rate-limit slot before failing.
    #[serde(with = "humantime_serde")]
    pub rate_limit_max_wait: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: None,
            extra_headers: BTreeMap::new(),
            connect_timeout: Duration::from_secs(10),
            read_timeout: Duration::from_secs(30),
            max_retries: 3,
            retry_base_delay: Duration::from_secs(1),
            retry_max_delay: Duration::from_secs(10),
            retry_jitter: 0.1,
            rate_limit_per_minute: 60,
            rate_limit_max_wait: Duration::from_secs(5),
        }
    }
}

impl ClientConfig {
    pub fn validate(&self) -> Result<()> {
        if self.base_url.trim().is_empty() {
            return Err(Error::config("base_url cannot be empty"));
        }
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(Error::config(format!(
                "base_url must be an http(s) URL, got '{}'",
                self.base_url
            )));
        }
        if self.max_retries == 0 {
            return Err(Error::config("max_retries must be at least 1"));
        }
        if self.rate_limit_per_minute == 0 {
            return Err(Error::config("rate_limit_per_minute must be positive"));
        }
        if !(0.0..1.0).contains(&self.retry_jitter) {
            return Err(Error::config(format!(
                "retry_jitter must be in [0, 1), got {}",
                self.retry_jitter
            )));
        }
        if self.retry_max_delay < self.retry_base_delay {
            return Err(Error::config("retry_max_delay must be >= retry_base_delay"));
        }
        Ok(())
    }

    /// Headers applied to every request before per-request overrides.
    pub fn default_headers(&self) -> BTreeMap<String, String> {
        let mut headers = BTreeMap::new();
        headers.insert("Content-Type".to_string(), "application/json".to_string());
        headers.insert("User-Agent".to_string(), USER_AGENT.to_string());
        if let Some(key) = self.api_key.as_deref().filter(|k| !k.is_empty()) {
            headers.insert("Authorization".to_string(), format!("Bearer {key}"));
        }
        for (name, value) in &self.extra_headers {
            headers.insert(name.clone(), value.clone());
        }
        headers
    }

    /// Join the base URL and a descriptor path with exactly one slash.
    pub fn url_for(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}
