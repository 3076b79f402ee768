//! Scripted in-memory transport shared by the integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use rust_xfyun::transport::StateCell;
use rust_xfyun::{Connector, Error, ReadyState, Transport, TransportEvent};
use serde_json::Value;
use tokio::sync::mpsc;

pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init()
        .ok();
}

/// Frames the client has written, in order.
#[derive(Clone, Default)]
pub struct SentLog(Arc<Mutex<Vec<String>>>);

impl SentLog {
    pub fn len(&self) -> usize {
        self.0.lock().unwrap().len()
    }

    pub fn json(&self) -> Vec<Value> {
        self.0
            .lock()
            .unwrap()
            .iter()
            .map(|s| serde_json::from_str(s).unwrap())
            .collect()
    }

    fn push(&self, text: String) {
        self.0.lock().unwrap().push(text);
    }
}

/// Client side of the scripted socket.
pub struct MockTransport {
    state: StateCell,
    sent: SentLog,
    outbound: mpsc::UnboundedSender<String>,
    inbound: tokio::sync::Mutex<mpsc::UnboundedReceiver<TransportEvent>>,
    closes: Arc<AtomicUsize>,
    close_error: Option<String>,
}

/// Server side of the scripted socket.
pub struct MockServer {
    pub sent: SentLog,
    pub closes: Arc<AtomicUsize>,
    outbound: mpsc::UnboundedReceiver<String>,
    inbound: mpsc::UnboundedSender<TransportEvent>,
}

pub fn mock_pair() -> (MockTransport, MockServer) {
    let (out_tx, out_rx) = mpsc::unbounded_channel();
    let (in_tx, in_rx) = mpsc::unbounded_channel();
    let sent = SentLog::default();
    let closes = Arc::new(AtomicUsize::new(0));

    let transport = MockTransport {
        state: StateCell::new(ReadyState::Open),
        sent: sent.clone(),
        outbound: out_tx,
        inbound: tokio::sync::Mutex::new(in_rx),
        closes: Arc::clone(&closes),
        close_error: None,
    };
    let server = MockServer {
        sent,
        closes,
        outbound: out_rx,
        inbound: in_tx,
    };
    (transport, server)
}

impl MockTransport {
    pub fn with_close_error(mut self, message: &str) -> Self {
        self.close_error = Some(message.to_string());
        self
    }
}

#[async_trait]
impl Transport for MockTransport {
    fn state(&self) -> ReadyState {
        self.state.get()
    }

    async fn send_text(&self, text: String) -> Result<(), Error> {
        if self.state.get() != ReadyState::Open {
            return Err(Error::ConnectionClosed);
        }
        self.sent.push(text.clone());
        let _ = self.outbound.send(text);
        Ok(())
    }

    async fn next_event(&self) -> TransportEvent {
        if self.state.get() == ReadyState::Closed {
            return TransportEvent::Closed;
        }
        let event = self.inbound.lock().await.recv().await;
        match event {
            Some(TransportEvent::Message(text)) => TransportEvent::Message(text),
            Some(other) => {
                self.state.advance(ReadyState::Closed);
                other
            }
            None => {
                self.state.advance(ReadyState::Closed);
                TransportEvent::Closed
            }
        }
    }

    async fn close(&self) -> Result<(), Error> {
        if self.state.advance(ReadyState::Closing) == ReadyState::Closed {
            return Ok(());
        }
        self.closes.fetch_add(1, Ordering::SeqCst);
        self.state.advance(ReadyState::Closed);
        match &self.close_error {
            Some(message) => Err(Error::Transport(message.clone())),
            None => Ok(()),
        }
    }
}

impl MockServer {
    pub fn push(&self, frame: Value) {
        self.push_raw(&frame.to_string());
    }

    pub fn push_raw(&self, text: &str) {
        let _ = self
            .inbound
            .send(TransportEvent::Message(text.to_string()));
    }

    pub fn push_close(&self) {
        let _ = self.inbound.send(TransportEvent::Closed);
    }

    pub fn push_error(&self, message: &str) {
        let _ = self.inbound.send(TransportEvent::Error(message.to_string()));
    }

    /// Waits for the next frame written by the client.
    pub async fn recv(&mut self) -> Option<Value> {
        let text = self.outbound.recv().await?;
        Some(serde_json::from_str(&text).unwrap())
    }

    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

enum Behavior {
    Open(Mutex<Option<MockTransport>>),
    Hang,
    Fail(String),
}

/// Connector handing out one prepared transport.
#[derive(Clone)]
pub struct MockConnector {
    behavior: Arc<Behavior>,
    pub urls: Arc<Mutex<Vec<String>>>,
}

impl MockConnector {
    pub fn new(transport: MockTransport) -> Self {
        Self::with(Behavior::Open(Mutex::new(Some(transport))))
    }

    pub fn hanging() -> Self {
        Self::with(Behavior::Hang)
    }

    pub fn failing(message: &str) -> Self {
        Self::with(Behavior::Fail(message.to_string()))
    }

    fn with(behavior: Behavior) -> Self {
        Self {
            behavior: Arc::new(behavior),
            urls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn last_url(&self) -> url::Url {
        let urls = self.urls.lock().unwrap();
        url::Url::parse(urls.last().unwrap()).unwrap()
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn open(&self, url: &str) -> Result<Box<dyn Transport>, Error> {
        self.urls.lock().unwrap().push(url.to_string());
        match self.behavior.as_ref() {
            Behavior::Open(slot) => {
                let transport = slot.lock().unwrap().take();
                match transport {
                    Some(transport) => Ok(Box::new(transport)),
                    None => Err(Error::HandshakeFailed("transport already used".to_string())),
                }
            }
            Behavior::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(Error::HandshakeFailed("never opened".to_string()))
            }
            Behavior::Fail(message) => Err(Error::HandshakeFailed(message.clone())),
        }
    }
}

pub fn frame(status: u8, payload: Value) -> Value {
    let mut data = payload;
    data["status"] = Value::from(status);
    serde_json::json!({
        "code": 0,
        "message": "success",
        "sid": "mock0001",
        "data": data,
    })
}

pub fn error_frame(code: i64, message: &str) -> Value {
    serde_json::json!({
        "code": code,
        "message": message,
        "sid": "mock0001",
    })
}
