//! Shared harness: stub backends on ephemeral ports and client wiring.

#![allow(dead_code)]

use axum::Router;
use serde_json::Value;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;
use whistle_mcp::http::{AttemptObserver, AttemptRecord, ResilientClient};
use whistle_mcp::tools::Dispatcher;
use whistle_mcp::types::ClientConfig;

/// Requests seen by a stub backend, in arrival order.
#[derive(Debug, Clone, Default)]
pub struct RequestLog(Arc<Mutex<Vec<(String, Value)>>>);

impl RequestLog {
    pub fn push(&self, path: &str, body: Value) {
        self.0.lock().unwrap().push((path.to_string(), body));
    }

    pub fn len(&self) -> usize {
        self.0.lock().unwrap().len()
    }

    pub fn entries(&self) -> Vec<(String, Value)> {
        self.0.lock().unwrap().clone()
    }
}

/// Collects every attempt the client makes.
#[derive(Debug, Default)]
pub struct AttemptLog(Mutex<Vec<AttemptRecord>>);

impl AttemptLog {
    pub fn records(&self) -> Vec<AttemptRecord> {
        self.0.lock().unwrap().clone()
    }
}

impl AttemptObserver for AttemptLog {
    fn on_attempt(&self, record: &AttemptRecord) {
        self.0.lock().unwrap().push(record.clone());
    }
}

/// Serve `routes` under `/v3` on 127.0.0.1 and return the base URL.
pub async fn spawn_backend(routes: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = Router::new().nest("/v3", routes);
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}/v3")
}

/// Fast retry schedule so failure paths finish quickly.
pub fn test_config(base_url: &str) -> ClientConfig {
    ClientConfig {
        base_url: base_url.to_string(),
        connect_timeout: Duration::from_secs(2),
        read_timeout: Duration::from_secs(5),
        max_retries: 3,
        retry_base_delay: Duration::from_millis(10),
        retry_max_delay: Duration::from_millis(50),
        ..ClientConfig::default()
    }
}

/// Dispatcher over a real reqwest transport.
pub fn dispatcher(config: ClientConfig, attempts: Arc<AttemptLog>) -> Dispatcher {
    let client = ResilientClient::from_config(Arc::new(config))
        .unwrap()
        .with_observer(attempts);
    Dispatcher::new(client).unwrap()
}
