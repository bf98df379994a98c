//! In-process transport and observer doubles for unit tests.

use async_trait::async_trait;
use std::collections::{BTreeMap, VecDeque};
use std::sync::Mutex;

use super::client::{AttemptObserver, AttemptRecord};
use super::descriptor::RequestDescriptor;
use super::transport::{RawResponse, Transport, TransportError};

type Scripted = std::result::Result<RawResponse, TransportError>;

/// Replays a fixed script of outcomes, then repeats the fallback forever.
#[derive(Debug, Default)]
pub(crate) struct ScriptedTransport {
    script: Mutex<VecDeque<Scripted>>,
    fallback: Option<Scripted>,
    sent: Mutex<Vec<(String, BTreeMap<String, String>, RequestDescriptor)>>,
}

impl ScriptedTransport {
    pub(crate) fn new(script: Vec<Scripted>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            ..Self::default()
        }
    }

    pub(crate) fn repeating(outcome: Scripted) -> Self {
        Self {
            fallback: Some(outcome),
            ..Self::default()
        }
    }

    pub(crate) fn call_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }

    pub(crate) fn urls(&self) -> Vec<String> {
        self.sent.lock().unwrap().iter().map(|s| s.0.clone()).collect()
    }

    pub(crate) fn headers(&self) -> Vec<BTreeMap<String, String>> {
        self.sent.lock().unwrap().iter().map(|s| s.1.clone()).collect()
    }

    pub(crate) fn requests(&self) -> Vec<RequestDescriptor> {
        self.sent.lock().unwrap().iter().map(|s| s.2.clone()).collect()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(
        &self,
        url: &str,
        headers: &BTreeMap<String, String>,
        request: &RequestDescriptor,
    ) -> Scripted {
        self.sent
            .lock()
            .unwrap()
            .push((url.to_string(), headers.clone(), request.clone()));
        let next = self.script.lock().unwrap().pop_front();
        match next.or_else(|| self.fallback.clone()) {
            Some(outcome) => outcome,
            None => Err(TransportError::Io("script exhausted".into())),
        }
    }
}

/// Collects every attempt record in order.
#[derive(Debug, Default)]
pub(crate) struct RecordingObserver {
    records: Mutex<Vec<AttemptRecord>>,
}

impl RecordingObserver {
    pub(crate) fn records(&self) -> Vec<AttemptRecord> {
        self.records.lock().unwrap().clone()
    }
}

impl AttemptObserver for RecordingObserver {
    fn on_attempt(&self, record: &AttemptRecord) {
        self.records.lock().unwrap().push(record.clone());
    }
}
