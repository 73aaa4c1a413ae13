//! Pure connection state management for the connection driver
//!
//! This module contains the driver's state and timer vocabulary, its timing
//! configuration and its error type. Nothing in here performs I/O.

use crate::engine::{EngineError, TopicError};
use std::time::Duration;
use thiserror::Error;

/// Connection lifecycle state of the driver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Not connected and not trying to connect
    Disconnected,
    /// Connect issued; polling the engine until the handshake completes
    ConnectPending,
    /// Socket bound, read/write/misc loops active
    Connected,
    /// Waiting out the fixed delay before the next reconnect attempt
    ReconnectBackoff,
}

impl ConnectionState {
    /// The timer a state keeps armed, if any. The driver has a single timer
    /// slot, so arming one always replaces the previous timer.
    pub fn timer(self) -> Option<TimerKind> {
        match self {
            ConnectionState::Disconnected => None,
            ConnectionState::ConnectPending => Some(TimerKind::ConnectPoll),
            ConnectionState::Connected => Some(TimerKind::Misc),
            ConnectionState::ReconnectBackoff => Some(TimerKind::Reconnect),
        }
    }
}

/// The three timers the driver multiplexes onto its single timer slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerKind {
    /// Short recurring poll driving the connect handshake
    ConnectPoll,
    /// Recurring housekeeping (keepalive, QoS retries)
    Misc,
    /// One-shot backoff before a reconnect attempt
    Reconnect,
}

/// Driver timer intervals
#[derive(Debug, Clone, PartialEq)]
pub struct DriverTimings {
    pub connect_poll: Duration,
    pub misc_interval: Duration,
    pub reconnect_delay: Duration,
}

impl Default for DriverTimings {
    fn default() -> Self {
        Self {
            connect_poll: Duration::from_millis(100),
            misc_interval: Duration::from_secs(1),
            reconnect_delay: Duration::from_secs(5),
        }
    }
}

impl DriverTimings {
    pub fn delay_for(&self, kind: TimerKind) -> Duration {
        match kind {
            TimerKind::ConnectPoll => self.connect_poll,
            TimerKind::Misc => self.misc_interval,
            TimerKind::Reconnect => self.reconnect_delay,
        }
    }

    /// Zero intervals would spin the reactor
    pub fn validate(&self) -> Result<(), String> {
        if self.connect_poll.is_zero() {
            return Err("connect poll interval must be greater than 0".to_string());
        }
        if self.misc_interval.is_zero() {
            return Err("misc interval must be greater than 0".to_string());
        }
        if self.reconnect_delay.is_zero() {
            return Err("reconnect delay must be greater than 0".to_string());
        }
        Ok(())
    }
}

/// Where and how to connect
#[derive(Debug, Clone, PartialEq)]
pub struct BrokerAddress {
    pub host: String,
    pub port: u16,
    pub keepalive: Duration,
}

impl BrokerAddress {
    pub fn new(host: impl Into<String>, port: u16, keepalive: Duration) -> Self {
        Self {
            host: host.into(),
            port,
            keepalive,
        }
    }
}

/// Connection driver errors
///
/// Transient connectivity problems never show up here; they drive the
/// reconnect backoff instead. What remains are contract violations by the
/// engine and local misuse.
#[derive(Debug, Error)]
pub enum DriverError {
    #[error("Engine {operation} failed")]
    EngineFailure {
        operation: &'static str,
        #[source]
        source: EngineError,
    },
    #[error("Engine reported a connection but exposed no socket")]
    MissingSocket,
    #[error("Failed to register engine socket")]
    Socket(#[source] std::io::Error),
    #[error("Invalid publish request")]
    InvalidPublish(#[from] TopicError),
    #[error("Publish rejected by engine")]
    PublishFailed(#[source] EngineError),
    #[error("Connection driver is no longer running")]
    Closed,
    #[error("Connection driver task ended abnormally")]
    TaskFailed(#[source] tokio::task::JoinError),
}

impl DriverError {
    pub fn engine(operation: &'static str, source: EngineError) -> Self {
        Self::EngineFailure { operation, source }
    }
}
