//! In-memory transport and backend doubles for unit tests.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use super::identity::ConversationKey;
use crate::backend::{BackendError, BackendRelay};
use crate::transport::{self, IdentityRecord, OutboundMessage, Presence, Transport, TransportError};

/// A delivered message as seen by the transport.
#[derive(Debug, Clone)]
pub struct Sent {
    pub key: String,
    pub body: String,
    pub at: Instant,
}

/// Transport that records everything and answers lookups from a script.
#[derive(Default)]
pub struct RecordingTransport {
    lookup: Mutex<Option<Vec<IdentityRecord>>>,
    lookup_delay: Mutex<Option<Duration>>,
    fail_sends: AtomicBool,
    lookups: AtomicUsize,
    presences: AtomicUsize,
    send_attempts: AtomicUsize,
    sent: Mutex<Vec<Sent>>,
}

impl RecordingTransport {
    pub fn new() -> Arc<Self> {
        let transport = Self::default();
        *transport.lookup.lock().unwrap() = Some(Vec::new());
        Arc::new(transport)
    }

    pub fn with_lookup(self: Arc<Self>, records: Vec<IdentityRecord>) -> Arc<Self> {
        *self.lookup.lock().unwrap() = Some(records);
        self
    }

    pub fn with_failing_lookup(self: Arc<Self>) -> Arc<Self> {
        *self.lookup.lock().unwrap() = None;
        self
    }

    pub fn with_lookup_delay(self: Arc<Self>, delay: Duration) -> Arc<Self> {
        *self.lookup_delay.lock().unwrap() = Some(delay);
        self
    }

    pub fn with_failing_sends(self: Arc<Self>) -> Arc<Self> {
        self.fail_sends.store(true, Ordering::SeqCst);
        self
    }

    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    pub fn presences(&self) -> usize {
        self.presences.load(Ordering::SeqCst)
    }

    pub fn send_attempts(&self) -> usize {
        self.send_attempts.load(Ordering::SeqCst)
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }

    /// Bodies delivered to one conversation, in delivery order.
    pub fn bodies(&self, key: &str) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter(|s| s.key == key)
            .map(|s| s.body)
            .collect()
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    fn name(&self) -> &str {
        "recording"
    }

    async fn lookup_identity(&self, _raw: &str) -> transport::Result<Vec<IdentityRecord>> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        let delay = *self.lookup_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let scripted = self.lookup.lock().unwrap().clone();
        scripted.ok_or_else(|| TransportError::Rejected("lookup unavailable".to_string()))
    }

    async fn send_presence(&self, _key: &ConversationKey, _presence: Presence) -> transport::Result<()> {
        self.presences.fetch_add(1, Ordering::SeqCst);
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(TransportError::Rejected("presence refused".to_string()));
        }
        Ok(())
    }

    async fn send_messages(
        &self,
        key: &ConversationKey,
        messages: &[OutboundMessage],
    ) -> transport::Result<()> {
        self.send_attempts.fetch_add(1, Ordering::SeqCst);
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(TransportError::Rejected("send refused".to_string()));
        }
        let mut sent = self.sent.lock().unwrap();
        for message in messages {
            sent.push(Sent {
                key: key.to_string(),
                body: message.body.clone(),
                at: Instant::now(),
            });
        }
        Ok(())
    }
}

/// Backend double replying `ok:<body>`, or failing, with optional delays.
pub struct StubBackend {
    fail: bool,
    delays: Mutex<HashMap<String, Duration>>,
    calls: Mutex<Vec<(String, String)>>,
    in_flight: Mutex<HashMap<String, usize>>,
    max_in_flight: AtomicUsize,
}

impl StubBackend {
    fn build(fail: bool) -> Arc<Self> {
        Arc::new(Self {
            fail,
            delays: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            in_flight: Mutex::new(HashMap::new()),
            max_in_flight: AtomicUsize::new(0),
        })
    }

    pub fn echo() -> Arc<Self> {
        Self::build(false)
    }

    pub fn failing() -> Arc<Self> {
        Self::build(true)
    }

    /// Delay every call carrying this message body.
    pub fn with_delay(self: Arc<Self>, body: &str, delay: Duration) -> Arc<Self> {
        self.delays.lock().unwrap().insert(body.to_string(), delay);
        self
    }

    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }

    /// Highest number of overlapping calls seen for a single identifier.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BackendRelay for StubBackend {
    async fn relay(&self, identifier: &str, body: &str) -> Result<String, BackendError> {
        self.calls
            .lock()
            .unwrap()
            .push((identifier.to_string(), body.to_string()));
        {
            let mut in_flight = self.in_flight.lock().unwrap();
            let n = in_flight.entry(identifier.to_string()).or_insert(0);
            *n += 1;
            self.max_in_flight.fetch_max(*n, Ordering::SeqCst);
        }

        let delay = self.delays.lock().unwrap().get(body).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        } else {
            tokio::task::yield_now().await;
        }

        if let Some(n) = self.in_flight.lock().unwrap().get_mut(identifier) {
            *n -= 1;
        }

        if self.fail {
            Err(BackendError::Status {
                status: 500,
                body: "stub failure".to_string(),
            })
        } else {
            Ok(format!("ok:{}", body))
        }
    }
}
