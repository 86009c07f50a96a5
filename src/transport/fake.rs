//! In-process fake transport for session stream tests
//!
//! [`FakeConnector`] records every connection attempt and hands out
//! [`FakeTransport`]s that capture outbound frames and close calls, so tests
//! can drive a `SessionStream` without opening sockets. Lifecycle events are
//! fed to the stream directly by the test, which keeps every test
//! synchronous.
//!
//! # Example
//!
//! ```ignore
//! let connector = FakeConnector::new();
//! let (transport, _events) = connector.connect(&url);
//! transport.send("{}".to_string()).unwrap();
//! assert_eq!(connector.last().unwrap().sent(), vec!["{}".to_string()]);
//! ```

use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use url::Url;

use crate::error::{ChatbotError, Result};
use crate::transport::{Connector, EventReceiver, Transport, TransportEvent};

/// Recording transport used in tests.
#[derive(Debug, Default)]
pub struct FakeTransport {
    sent: Mutex<Vec<String>>,
    close_calls: Mutex<usize>,
    fail_sends: bool,
}

impl FakeTransport {
    /// Frames written so far, in order
    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().expect("sent lock poisoned").clone()
    }

    /// How many times `close()` was called
    pub fn close_calls(&self) -> usize {
        *self.close_calls.lock().expect("close lock poisoned")
    }
}

impl Transport for FakeTransport {
    fn send(&self, frame: String) -> Result<()> {
        if self.fail_sends {
            return Err(ChatbotError::Transport("fake send failure".to_string()).into());
        }
        self.sent.lock().expect("sent lock poisoned").push(frame);
        Ok(())
    }

    fn close(&self) {
        *self.close_calls.lock().expect("close lock poisoned") += 1;
    }
}

/// One recorded connection attempt.
#[derive(Debug)]
pub struct FakeConnection {
    /// URL passed to `connect`
    pub url: Url,
    /// The transport handed to the caller
    pub transport: Arc<FakeTransport>,
    /// Sender feeding the caller's event receiver
    pub events: mpsc::UnboundedSender<TransportEvent>,
}

/// Connector that records attempts instead of dialing out.
#[derive(Debug, Default)]
pub struct FakeConnector {
    connections: Mutex<Vec<FakeConnection>>,
    fail_sends: bool,
}

impl FakeConnector {
    /// Create a connector whose transports accept every frame
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a connector whose transports reject every frame
    pub fn failing() -> Self {
        Self {
            fail_sends: true,
            ..Self::default()
        }
    }

    /// Number of `connect` calls so far
    pub fn attempts(&self) -> usize {
        self.connections.lock().expect("connections lock poisoned").len()
    }

    /// URL of the most recent attempt
    pub fn last_url(&self) -> Option<Url> {
        self.connections
            .lock()
            .expect("connections lock poisoned")
            .last()
            .map(|c| c.url.clone())
    }

    /// Transport of the most recent attempt
    pub fn last(&self) -> Option<Arc<FakeTransport>> {
        self.connections
            .lock()
            .expect("connections lock poisoned")
            .last()
            .map(|c| Arc::clone(&c.transport))
    }

    /// Transport of attempt `index`
    pub fn transport(&self, index: usize) -> Option<Arc<FakeTransport>> {
        self.connections
            .lock()
            .expect("connections lock poisoned")
            .get(index)
            .map(|c| Arc::clone(&c.transport))
    }

    /// Sender that feeds events to the receiver of attempt `index`
    pub fn event_sender(&self, index: usize) -> Option<mpsc::UnboundedSender<TransportEvent>> {
        self.connections
            .lock()
            .expect("connections lock poisoned")
            .get(index)
            .map(|c| c.events.clone())
    }
}

impl Connector for FakeConnector {
    fn connect(&self, url: &Url) -> (Arc<dyn Transport>, EventReceiver) {
        let (events, receiver) = mpsc::unbounded_channel();
        let transport = Arc::new(FakeTransport {
            fail_sends: self.fail_sends,
            ..FakeTransport::default()
        });
        self.connections
            .lock()
            .expect("connections lock poisoned")
            .push(FakeConnection {
                url: url.clone(),
                transport: Arc::clone(&transport),
                events,
            });
        let transport: Arc<dyn Transport> = transport;
        (transport, receiver)
    }
}
