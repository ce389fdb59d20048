// Connection state machine - Backoff, attempt bookkeeping and lag tracking
use serde::Serialize;
use std::time::Duration;
use tokio::time::Instant;

pub const CLOSE_NORMAL: u16 = 1000;
pub const CLOSE_GOING_AWAY: u16 = 1001;
/// Reported when the socket drops without a close frame
pub const CLOSE_ABNORMAL: u16 = 1006;

const BASE_DELAY_MS: f64 = 1000.0;
const BACKOFF_STEP_MS: f64 = 2000.0;
const BACKOFF_FACTOR: f64 = 1.5;
const MAX_DELAY_MS: f64 = 60_000.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Connecting,
    Open,
    Closed,
}

/// What the supervisor does after a socket closes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseOutcome {
    Retry { attempt: u32, delay: Duration },
    Stop,
    GiveUp { attempts: u32 },
}

/// Delay before (re)opening the socket after `attempts` abnormal closures.
/// A first attempt only waits the base delay.
pub fn reconnect_delay(attempts: u32) -> Duration {
    if attempts == 0 {
        return Duration::from_millis(BASE_DELAY_MS as u64);
    }
    let exponent = attempts.min(i32::MAX as u32) as i32;
    let ms = BASE_DELAY_MS + BACKOFF_STEP_MS * BACKOFF_FACTOR.powi(exponent);
    Duration::from_millis(ms.min(MAX_DELAY_MS) as u64)
}

pub fn is_normal_close(code: u16) -> bool {
    matches!(code, CLOSE_NORMAL | CLOSE_GOING_AWAY)
}

#[derive(Debug, Clone)]
pub struct ConnectionMachine {
    state: ConnectionState,
    attempts: u32,
    max_attempts: u32,
    opened_at: Option<Instant>,
    last_received: Option<Instant>,
}

impl ConnectionMachine {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            state: ConnectionState::Closed,
            attempts: 0,
            max_attempts,
            opened_at: None,
            last_received: None,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn is_open(&self) -> bool {
        self.state == ConnectionState::Open
    }

    /// Move to `connecting` and return the delay before opening the socket.
    /// `None` while an attempt is already pending or a socket is open.
    pub fn begin_connect(&mut self) -> Option<Duration> {
        if self.state != ConnectionState::Closed {
            return None;
        }
        self.state = ConnectionState::Connecting;
        Some(reconnect_delay(self.attempts))
    }

    pub fn on_open(&mut self, now: Instant) {
        self.state = ConnectionState::Open;
        self.attempts = 0;
        self.opened_at = Some(now);
        self.last_received = None;
    }

    pub fn on_frame(&mut self, now: Instant) {
        self.last_received = Some(now);
    }

    pub fn on_close(&mut self, code: u16) -> CloseOutcome {
        if is_normal_close(code) {
            self.state = ConnectionState::Closed;
            return CloseOutcome::Stop;
        }

        if self.attempts >= self.max_attempts {
            self.state = ConnectionState::Closed;
            return CloseOutcome::GiveUp {
                attempts: self.attempts,
            };
        }

        self.attempts += 1;
        self.state = ConnectionState::Connecting;
        CloseOutcome::Retry {
            attempt: self.attempts,
            delay: reconnect_delay(self.attempts),
        }
    }

    /// Caller-initiated teardown, keeps the attempt counter
    pub fn on_disconnect(&mut self) {
        self.state = ConnectionState::Closed;
    }

    pub fn reset_attempts(&mut self) {
        self.attempts = 0;
    }

    /// Time since the last frame, or since open if nothing arrived yet
    pub fn lag(&self, now: Instant) -> Option<Duration> {
        self.last_received
            .or(self.opened_at)
            .map(|since| now.saturating_duration_since(since))
    }
}
