//! Pure health monitoring and reconnection logic for the connection driver
//!
//! Every decision the driver makes about its connection lifecycle is taken
//! here from plain values: step results, notification codes and the current
//! state. The driver only carries the decisions out.

use super::connection::ConnectionState;
use crate::engine::{EngineError, EngineResult};
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Pure health monitoring and reconnection decision logic
pub struct HealthMonitor;

impl HealthMonitor {
    /// Determine next state after a connection event (pure function)
    pub fn determine_next_state(current: ConnectionState, event: &ConnectionEvent) -> ConnectionState {
        match event {
            ConnectionEvent::ConnectIssued => ConnectionState::ConnectPending,
            ConnectionEvent::ConnectFailed(_) => ConnectionState::ReconnectBackoff,
            ConnectionEvent::ConnAckAccepted => ConnectionState::Connected,
            ConnectionEvent::ConnAckRefused(_) => ConnectionState::ReconnectBackoff,
            ConnectionEvent::ConnectionLost => ConnectionState::ReconnectBackoff,
            ConnectionEvent::Closed { expected: true } => ConnectionState::Disconnected,
            ConnectionEvent::Closed { expected: false } => ConnectionState::ReconnectBackoff,
            ConnectionEvent::DisconnectRequested => match current {
                // The Disconnected notification finishes the teardown
                ConnectionState::Connected => ConnectionState::Connected,
                _ => ConnectionState::Disconnected,
            },
        }
    }

    /// Classify the result of a read, write or misc step (pure function)
    pub fn classify_step(result: EngineResult<()>) -> StepOutcome {
        match result {
            Ok(()) => StepOutcome::Continue,
            Err(e) if e.is_connection_lost() => StepOutcome::ConnectionLost,
            Err(e) => StepOutcome::Fatal(e),
        }
    }

    /// Decide how to handle a connect or reconnect call's result (pure function)
    ///
    /// A failed connect is never fatal: name resolution, refused sockets and
    /// bad parameters alike are retried after the backoff delay.
    pub fn classify_connect(result: EngineResult<()>) -> ConnectOutcome {
        match result {
            Ok(()) | Err(EngineError::ConnectionPending) => ConnectOutcome::Pending,
            Err(e) => ConnectOutcome::Retry(e),
        }
    }

    /// Decide how to react to a CONNACK return code (pure function)
    pub fn on_connack(return_code: u8) -> ConnAckDecision {
        if return_code == 0 {
            ConnAckDecision::Accepted
        } else {
            ConnAckDecision::Refused(return_code)
        }
    }

    /// Decide how to react to a Disconnected notification (pure function)
    ///
    /// Engines may report one disconnect twice. Only the first report of a
    /// connected session is acted on. A loss after the user asked to
    /// disconnect is treated as the requested close.
    pub fn on_disconnect(
        connected: bool,
        reason_code: i32,
        reconnect_wanted: bool,
    ) -> DisconnectDecision {
        if !connected {
            return DisconnectDecision::IgnoreDuplicate;
        }
        if reason_code == 0 || !reconnect_wanted {
            DisconnectDecision::StayDisconnected
        } else {
            DisconnectDecision::Reconnect
        }
    }

    /// Check if connection state allows publishing (pure function)
    pub fn can_publish(state: ConnectionState) -> bool {
        matches!(state, ConnectionState::Connected)
    }

    /// Calculate health metrics for connection (pure function)
    pub fn calculate_health_metrics(stats: &ConnectionStats) -> HealthMetrics {
        let now = Instant::now();

        let uptime = stats.connected_since.map(|t| now.duration_since(t));
        let time_since_last_message = stats.last_message_at.map(|t| now.duration_since(t));

        HealthMetrics {
            uptime,
            time_since_last_message,
            reconnect_count: stats.reconnect_attempts,
            messages_received: stats.messages_received,
            is_healthy: Self::determine_health_status(uptime, time_since_last_message),
        }
    }

    fn determine_health_status(
        uptime: Option<Duration>,
        time_since_last_message: Option<Duration>,
    ) -> bool {
        match (uptime, time_since_last_message) {
            (Some(_), None) => true,
            (Some(_), Some(last_msg)) => last_msg < Duration::from_secs(300),
            _ => false,
        }
    }

    /// Log connection state transition (pure logging function)
    pub fn log_state_transition(from: ConnectionState, to: ConnectionState, event: &ConnectionEvent) {
        match (from, to, event) {
            (_, ConnectionState::Connected, ConnectionEvent::ConnAckAccepted) => {
                info!("MQTT connection established");
            }
            (_, _, ConnectionEvent::ConnAckRefused(code)) => {
                warn!(return_code = code, "Broker refused connection");
            }
            (_, _, ConnectionEvent::ConnectFailed(reason)) => {
                warn!(reason = %reason, "Connect attempt failed");
            }
            (ConnectionState::Connected, ConnectionState::ReconnectBackoff, _) => {
                warn!("MQTT connection lost, reconnect scheduled");
            }
            (_, ConnectionState::Disconnected, _) if from != to => {
                info!("MQTT connection closed");
            }
            _ if from != to => {
                info!("MQTT connection state: {:?} -> {:?}", from, to);
            }
            _ => {}
        }
    }
}

/// Connection events that trigger state transitions
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionEvent {
    /// `connect` or `reconnect` was accepted by the engine
    ConnectIssued,
    /// `connect` or `reconnect` failed immediately
    ConnectFailed(String),
    ConnAckAccepted,
    ConnAckRefused(u8),
    /// A read, write or misc step reported the connection gone
    ConnectionLost,
    /// The engine's Disconnected notification was acted on
    Closed { expected: bool },
    /// The user asked to disconnect
    DisconnectRequested,
}

/// Outcome of a read, write or misc step
#[derive(Debug)]
pub enum StepOutcome {
    Continue,
    ConnectionLost,
    /// Any other error; the engine broke its contract and the driver stops
    Fatal(EngineError),
}

/// Outcome of a connect or reconnect call
#[derive(Debug)]
pub enum ConnectOutcome {
    /// Handshake in flight; poll until the CONNACK arrives
    Pending,
    /// Failed; try again after the backoff delay
    Retry(EngineError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnAckDecision {
    Accepted,
    Refused(u8),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectDecision {
    /// Already disconnected; a repeated report
    IgnoreDuplicate,
    /// Clean, client-requested disconnect
    StayDisconnected,
    /// Unexpected loss; schedule a reconnect
    Reconnect,
}

/// Running counters kept by the driver
#[derive(Debug, Clone, Default)]
pub struct ConnectionStats {
    /// Sessions that reached `Connected`
    pub sessions: u32,
    /// Reconnect attempts issued after a loss or refusal
    pub reconnect_attempts: u32,
    pub messages_received: u64,
    pub connected_since: Option<Instant>,
    pub last_message_at: Option<Instant>,
}

/// Health metrics for connection monitoring
#[derive(Debug, Clone)]
pub struct HealthMetrics {
    /// Time since connection established
    pub uptime: Option<Duration>,
    /// Time since last message received
    pub time_since_last_message: Option<Duration>,
    /// Number of reconnection attempts
    pub reconnect_count: u32,
    pub messages_received: u64,
    /// Overall health status
    pub is_healthy: bool,
}
