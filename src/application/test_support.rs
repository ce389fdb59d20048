// In-memory transport for driving the connection manager in tests
use crate::application::connection_machine::CLOSE_ABNORMAL;
use crate::application::transport::{
    SocketEvent, TelemetrySocket, TelemetryTransport, TransportError,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::mpsc;

/// Hands out queued sockets; opening with an empty queue fails
pub struct MockTransport {
    sockets: Mutex<VecDeque<MockSocket>>,
    opens: AtomicUsize,
}

/// Server end of a queued socket
pub struct MockServer {
    events: mpsc::UnboundedSender<SocketEvent>,
    sent: mpsc::UnboundedReceiver<String>,
    closed: mpsc::UnboundedReceiver<u16>,
}

struct MockSocket {
    events: mpsc::UnboundedReceiver<SocketEvent>,
    sent: mpsc::UnboundedSender<String>,
    closed: mpsc::UnboundedSender<u16>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            sockets: Mutex::new(VecDeque::new()),
            opens: AtomicUsize::new(0),
        }
    }

    pub fn push_socket(&self) -> MockServer {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (sent_tx, sent_rx) = mpsc::unbounded_channel();
        let (closed_tx, closed_rx) = mpsc::unbounded_channel();

        self.sockets.lock().push_back(MockSocket {
            events: events_rx,
            sent: sent_tx,
            closed: closed_tx,
        });

        MockServer {
            events: events_tx,
            sent: sent_rx,
            closed: closed_rx,
        }
    }

    pub fn open_count(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TelemetryTransport for MockTransport {
    async fn open(&self, endpoint: &str) -> Result<Box<dyn TelemetrySocket>, TransportError> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        match self.sockets.lock().pop_front() {
            Some(socket) => Ok(Box::new(socket)),
            None => Err(TransportError::Open {
                endpoint: endpoint.to_string(),
                reason: "connection refused".to_string(),
            }),
        }
    }
}

#[async_trait]
impl TelemetrySocket for MockSocket {
    async fn next_event(&mut self) -> SocketEvent {
        self.events
            .recv()
            .await
            .unwrap_or(SocketEvent::Closed(CLOSE_ABNORMAL))
    }

    async fn send_text(&mut self, text: String) -> Result<(), TransportError> {
        self.sent
            .send(text)
            .map_err(|e| TransportError::Write(e.to_string()))
    }

    async fn close(&mut self, code: u16) {
        let _ = self.closed.send(code);
    }
}

impl MockServer {
    pub fn frame(&self, text: &str) {
        let _ = self.events.send(SocketEvent::Frame(text.to_string()));
    }

    pub fn close(&self, code: u16) {
        let _ = self.events.send(SocketEvent::Closed(code));
    }

    pub fn error(&self, message: &str) {
        let _ = self.events.send(SocketEvent::Error(message.to_string()));
    }

    pub async fn next_sent(&mut self) -> Option<String> {
        self.sent.recv().await
    }

    pub async fn closed_with(&mut self) -> Option<u16> {
        self.closed.recv().await
    }
}
