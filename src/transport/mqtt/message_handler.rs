//! Pure notification routing and listener fan-out for the connection driver
//!
//! Engine notifications are translated into routing decisions here. The
//! events the application observes ([`DriverEvent`]) are broadcast to every
//! registered listener through [`EventListeners`].

use crate::engine::{EngineMessage, EngineNotification, LogLevel, CONNECTION_LOST_CODE};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Pure routing decisions for engine notifications
pub struct MessageHandler;

impl MessageHandler {
    /// Route an engine notification to the driver's handler (pure routing decision)
    pub fn route_notification(notification: EngineNotification) -> NotificationRoute {
        match notification {
            EngineNotification::Connected(return_code) => NotificationRoute::ConnAck(return_code),
            EngineNotification::Disconnected(reason_code) => {
                NotificationRoute::Disconnect(reason_code)
            }
            EngineNotification::Message(message) => NotificationRoute::Message(message),
            EngineNotification::Log(level, text) => NotificationRoute::Log(level, text),
        }
    }

    /// Human readable form of a CONNACK return code (pure function)
    pub fn describe_connack(return_code: u8) -> &'static str {
        match return_code {
            0 => "accepted",
            1 => "unacceptable protocol version",
            2 => "identifier rejected",
            3 => "server unavailable",
            4 => "bad user name or password",
            5 => "not authorized",
            _ => "unknown refusal",
        }
    }

    /// Human readable form of a disconnect reason code (pure function)
    pub fn describe_disconnect(reason_code: i32) -> &'static str {
        match reason_code {
            0 => "client requested",
            CONNECTION_LOST_CODE => "connection lost",
            _ => "unexpected",
        }
    }
}

/// Routing decisions for engine notifications
#[derive(Debug, Clone, PartialEq)]
pub enum NotificationRoute {
    /// Handshake finished with this CONNACK return code
    ConnAck(u8),
    /// Engine closed the connection with this reason code
    Disconnect(i32),
    /// Inbound PUBLISH for the listeners
    Message(EngineMessage),
    /// Engine diagnostics for the log
    Log(LogLevel, String),
}

/// Events the driver reports to its listeners
#[derive(Debug, Clone, PartialEq)]
pub enum DriverEvent {
    /// Handshake accepted and the socket is bound
    Connected,
    /// Session ended; `expected` is true for a client-requested disconnect
    Disconnected { expected: bool },
    Message(EngineMessage),
}

/// Listener registry shared between the driver task and its handles
#[derive(Debug, Clone, Default)]
pub struct EventListeners {
    inner: Arc<Mutex<Vec<mpsc::UnboundedSender<DriverEvent>>>>,
}

impl EventListeners {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new listener. Events emitted before this call are not replayed.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<DriverEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        match self.inner.lock() {
            Ok(mut listeners) => listeners.push(tx),
            Err(poisoned) => poisoned.into_inner().push(tx),
        }
        rx
    }

    /// Deliver an event to every live listener, pruning the ones that hung up
    pub fn emit(&self, event: DriverEvent) {
        let mut listeners = match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!("Listener registry lock was poisoned, recovering");
                poisoned.into_inner()
            }
        };

        listeners.retain(|tx| tx.send(event.clone()).is_ok());
        debug!(listeners = listeners.len(), event = ?event, "Driver event emitted");
    }

    /// Drop every listener so their receivers observe the end of the stream
    pub fn close(&self) {
        match self.inner.lock() {
            Ok(mut listeners) => listeners.clear(),
            Err(poisoned) => poisoned.into_inner().clear(),
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().map(|l| l.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
