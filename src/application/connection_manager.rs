// Connection manager - One live telemetry socket with backoff reconnection
use crate::application::connection_machine::{
    CLOSE_ABNORMAL, CLOSE_NORMAL, CloseOutcome, ConnectionMachine, ConnectionState,
};
use crate::application::transport::{
    SocketEvent, TelemetrySocket, TelemetryTransport, TransportError,
};
use crate::domain::live_value::{
    DataFormatError, LiveValue, LiveValueStore, encode_command, parse_frame,
};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::time::Instant;

const EVENT_CAPACITY: usize = 64;

#[derive(Debug, Clone)]
pub struct ConnectionSettings {
    pub endpoint: String,
    pub max_attempts: u32,
}

impl ConnectionSettings {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            max_attempts: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConnectionError {
    #[error("telemetry connection is not open")]
    NotConnected,
    #[error(transparent)]
    DataFormat(#[from] DataFormatError),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("gave up reconnecting after {attempts} attempts")]
    MaxRetriesExceeded { attempts: u32 },
}

/// State transitions and conditions reported to observers
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionEvent {
    Connecting { attempt: u32, delay: Duration },
    Connected,
    Closed { code: u16 },
    Error(ConnectionError),
    Disconnected,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConnectionSnapshot {
    pub state: ConnectionState,
    pub attempts: u32,
    pub lag_ms: Option<u64>,
}

enum SessionEnd {
    Closed(u16),
    Shutdown,
    Superseded,
}

/// Owns at most one live socket and publishes inbound readings.
///
/// Cloning yields another handle to the same connection. Every session runs
/// under a generation number; a session whose generation is no longer current
/// cannot touch state, which keeps a torn-down connection from coming back.
#[derive(Clone)]
pub struct ConnectionManager {
    shared: Arc<Shared>,
}

struct Shared {
    settings: ConnectionSettings,
    transport: Arc<dyn TelemetryTransport>,
    inner: Mutex<Inner>,
    store_tx: watch::Sender<LiveValueStore>,
    events_tx: broadcast::Sender<ConnectionEvent>,
}

struct Inner {
    machine: ConnectionMachine,
    generation: u64,
    outgoing: Option<mpsc::UnboundedSender<String>>,
    shutdown: Option<oneshot::Sender<()>>,
}

impl ConnectionManager {
    pub fn new(settings: ConnectionSettings, transport: Arc<dyn TelemetryTransport>) -> Self {
        let (store_tx, _) = watch::channel(LiveValueStore::new());
        let (events_tx, _) = broadcast::channel(EVENT_CAPACITY);
        let machine = ConnectionMachine::new(settings.max_attempts);

        Self {
            shared: Arc::new(Shared {
                settings,
                transport,
                inner: Mutex::new(Inner {
                    machine,
                    generation: 0,
                    outgoing: None,
                    shutdown: None,
                }),
                store_tx,
                events_tx,
            }),
        }
    }

    /// Schedule a connection attempt after the current backoff delay.
    /// No-op while an attempt is pending or a socket is open. Must be called
    /// from within a tokio runtime.
    pub fn connect(&self) {
        let mut inner = self.shared.inner.lock();
        let Some(delay) = inner.machine.begin_connect() else {
            tracing::debug!(
                "connect() ignored, connection is {:?}",
                inner.machine.state()
            );
            return;
        };

        inner.generation += 1;
        let generation = inner.generation;
        let attempt = inner.machine.attempts();
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        inner.shutdown = Some(shutdown_tx);
        drop(inner);

        tracing::info!(
            "Connecting to {} in {:?} (attempt {})",
            self.shared.settings.endpoint,
            delay,
            attempt
        );
        self.shared.emit(ConnectionEvent::Connecting { attempt, delay });
        tokio::spawn(supervise(self.shared.clone(), generation, delay, shutdown_rx));
    }

    /// Close the socket with a normal code and cancel any pending reconnect.
    /// Safe to call repeatedly or before ever connecting.
    pub fn disconnect(&self) {
        let mut inner = self.shared.inner.lock();
        let previous = inner.machine.state();
        inner.generation += 1;
        inner.machine.on_disconnect();
        inner.outgoing = None;
        if let Some(shutdown) = inner.shutdown.take() {
            let _ = shutdown.send(());
        }
        drop(inner);

        if previous != ConnectionState::Closed {
            tracing::info!("Disconnected from {}", self.shared.settings.endpoint);
            self.shared.emit(ConnectionEvent::Disconnected);
        }
    }

    /// Send `{"<identifier>": <value>}` on the open socket. Nothing is queued
    /// while disconnected.
    pub fn send(&self, identifier: &str, value: LiveValue) -> Result<(), ConnectionError> {
        let inner = self.shared.inner.lock();
        if !inner.machine.is_open() {
            return Err(ConnectionError::NotConnected);
        }
        let outgoing = inner.outgoing.as_ref().ok_or(ConnectionError::NotConnected)?;
        outgoing
            .send(encode_command(identifier, &value))
            .map_err(|_| ConnectionError::NotConnected)
    }

    pub fn reset_attempts(&self) {
        self.shared.inner.lock().machine.reset_attempts();
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ConnectionEvent> {
        self.shared.events_tx.subscribe()
    }

    /// Receiver of store snapshots, notified on every clear and merge
    pub fn store(&self) -> watch::Receiver<LiveValueStore> {
        self.shared.store_tx.subscribe()
    }

    pub fn values(&self) -> LiveValueStore {
        self.shared.store_tx.borrow().clone()
    }

    pub fn state(&self) -> ConnectionState {
        self.shared.inner.lock().machine.state()
    }

    pub fn lag(&self, now: Instant) -> Option<Duration> {
        self.shared.inner.lock().machine.lag(now)
    }

    pub fn snapshot(&self) -> ConnectionSnapshot {
        let inner = self.shared.inner.lock();
        ConnectionSnapshot {
            state: inner.machine.state(),
            attempts: inner.machine.attempts(),
            lag_ms: inner
                .machine
                .lag(Instant::now())
                .map(|lag| lag.as_millis() as u64),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.shared.settings.endpoint
    }
}

impl Shared {
    fn emit(&self, event: ConnectionEvent) {
        // No subscribers is fine
        let _ = self.events_tx.send(event);
    }

    fn with_generation<R>(&self, generation: u64, f: impl FnOnce(&mut Inner) -> R) -> Option<R> {
        let mut inner = self.inner.lock();
        if inner.generation != generation {
            return None;
        }
        Some(f(&mut inner))
    }

    async fn run_session(
        &self,
        generation: u64,
        mut socket: Box<dyn TelemetrySocket>,
        shutdown: &mut oneshot::Receiver<()>,
    ) -> SessionEnd {
        let (outgoing_tx, mut outgoing_rx) = mpsc::unbounded_channel();

        // Stale readings must not survive into the new session
        let opened = self.with_generation(generation, |inner| {
            inner.machine.on_open(Instant::now());
            inner.outgoing = Some(outgoing_tx);
            self.store_tx.send_replace(LiveValueStore::new());
        });
        if opened.is_none() {
            socket.close(CLOSE_NORMAL).await;
            return SessionEnd::Superseded;
        }

        tracing::info!("Telemetry socket open at {}", self.settings.endpoint);
        self.emit(ConnectionEvent::Connected);

        loop {
            tokio::select! {
                biased;
                _ = &mut *shutdown => {
                    socket.close(CLOSE_NORMAL).await;
                    return SessionEnd::Shutdown;
                }
                Some(text) = outgoing_rx.recv() => {
                    if let Err(err) = socket.send_text(text).await {
                        tracing::warn!("Failed to send command: {}", err);
                        self.emit(ConnectionEvent::Error(err.into()));
                    }
                }
                event = socket.next_event() => match event {
                    SocketEvent::Frame(text) => self.apply_frame(generation, &text),
                    SocketEvent::Closed(code) => return SessionEnd::Closed(code),
                    SocketEvent::Error(message) => {
                        // The close that follows drives the retry
                        tracing::warn!("Telemetry socket error: {}", message);
                        self.emit(ConnectionEvent::Error(TransportError::Socket(message).into()));
                    }
                },
            }
        }
    }

    fn apply_frame(&self, generation: u64, text: &str) {
        let parsed = parse_frame(text);
        let applied = self.with_generation(generation, |inner| -> Result<(), DataFormatError> {
            let pairs = parsed?;
            inner.machine.on_frame(Instant::now());
            self.store_tx.send_modify(|store| store.merge(pairs));
            Ok(())
        });

        // Frames from a superseded session are dropped silently
        if let Some(Err(err)) = applied {
            tracing::warn!("Dropping telemetry frame: {}", err);
            self.emit(ConnectionEvent::Error(err.into()));
        }
    }
}

/// Drive one connection generation: backoff, open, read, and retry on
/// abnormal closure until stopped, exhausted or shut down.
async fn supervise(
    shared: Arc<Shared>,
    generation: u64,
    mut delay: Duration,
    mut shutdown: oneshot::Receiver<()>,
) {
    loop {
        tokio::select! {
            biased;
            _ = &mut shutdown => return,
            _ = tokio::time::sleep(delay) => {}
        }

        let opened = tokio::select! {
            biased;
            _ = &mut shutdown => return,
            result = shared.transport.open(&shared.settings.endpoint) => result,
        };

        let code = match opened {
            Ok(socket) => match shared.run_session(generation, socket, &mut shutdown).await {
                SessionEnd::Closed(code) => code,
                SessionEnd::Shutdown | SessionEnd::Superseded => return,
            },
            Err(err) => {
                tracing::warn!("Telemetry socket failed to open: {}", err);
                shared.emit(ConnectionEvent::Error(err.into()));
                CLOSE_ABNORMAL
            }
        };

        let Some(outcome) = shared.with_generation(generation, |inner| {
            inner.outgoing = None;
            inner.machine.on_close(code)
        }) else {
            return;
        };

        shared.emit(ConnectionEvent::Closed { code });

        match outcome {
            CloseOutcome::Retry { attempt, delay: next } => {
                tracing::info!(
                    "Telemetry socket closed ({}), reconnecting in {:?} (attempt {})",
                    code,
                    next,
                    attempt
                );
                shared.emit(ConnectionEvent::Connecting {
                    attempt,
                    delay: next,
                });
                delay = next;
            }
            CloseOutcome::Stop => {
                tracing::info!("Telemetry socket closed normally ({})", code);
                return;
            }
            CloseOutcome::GiveUp { attempts } => {
                tracing::error!(
                    "Giving up on {} after {} reconnect attempts",
                    shared.settings.endpoint,
                    attempts
                );
                shared.emit(ConnectionEvent::Error(ConnectionError::MaxRetriesExceeded {
                    attempts,
                }));
                return;
            }
        }
    }
}
