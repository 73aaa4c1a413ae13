//! Protocol engine capability
//!
//! The MQTT wire protocol is not implemented here. It lives behind
//! [`ProtocolEngine`], a poll/step style engine that expects the caller to hand
//! it read slots, write slots and periodic maintenance at a cadence of the
//! caller's choosing, and that reports state changes through out-of-band
//! notifications fired from inside those steps.
//!
//! Notifications are never delivered inline: the engine pushes them through an
//! [`EngineNotifier`], which only enqueues onto the driver's task queue. The
//! driver acts on them on a later turn, after the step that produced them has
//! returned.

pub mod error;
pub mod topics;

use bytes::Bytes;
use std::os::unix::io::RawFd;
use std::path::Path;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

pub use error::{EngineError, EngineResult, CONNECTION_LOST_CODE};
pub use rumqttc::QoS;
pub use topics::{topic_matches, TopicError};

/// Session parameters an engine is created with
#[derive(Debug, Clone, PartialEq)]
pub struct SessionOptions {
    pub client_id: String,
    pub clean_session: bool,
}

/// An inbound PUBLISH as delivered by the engine
#[derive(Debug, Clone, PartialEq)]
pub struct EngineMessage {
    pub topic: String,
    pub payload: Bytes,
    pub qos: QoS,
    pub retain: bool,
}

impl EngineMessage {
    pub fn new(topic: impl Into<String>, payload: impl Into<Bytes>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
            qos: QoS::AtMostOnce,
            retain: false,
        }
    }
}

/// Engine log levels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Info,
    Notice,
    Warning,
    Error,
}

impl LogLevel {
    /// Forward an engine log line to the tracing subscriber
    pub fn emit(self, message: &str) {
        match self {
            LogLevel::Debug => debug!(target: "mqtt_engine", "{}", message),
            LogLevel::Info => info!(target: "mqtt_engine", "{}", message),
            LogLevel::Notice => info!(target: "mqtt_engine", notice = true, "{}", message),
            LogLevel::Warning => warn!(target: "mqtt_engine", "{}", message),
            LogLevel::Error => error!(target: "mqtt_engine", "{}", message),
        }
    }
}

/// Out-of-band notifications an engine fires from inside its step functions
#[derive(Debug, Clone, PartialEq)]
pub enum EngineNotification {
    /// CONNACK processed; `0` means accepted
    Connected(u8),
    /// Connection closed; `0` means the client asked for it
    Disconnected(i32),
    Message(EngineMessage),
    Log(LogLevel, String),
}

/// Posts engine notifications onto the driver's queue.
///
/// Sending never blocks and never runs driver code. Once the driver is gone
/// every send is silently discarded.
#[derive(Debug, Clone)]
pub struct EngineNotifier {
    tx: mpsc::UnboundedSender<EngineNotification>,
}

impl EngineNotifier {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<EngineNotification>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn connected(&self, return_code: u8) {
        self.post(EngineNotification::Connected(return_code));
    }

    pub fn disconnected(&self, reason_code: i32) {
        self.post(EngineNotification::Disconnected(reason_code));
    }

    pub fn message(&self, message: EngineMessage) {
        self.post(EngineNotification::Message(message));
    }

    pub fn log(&self, level: LogLevel, text: impl Into<String>) {
        self.post(EngineNotification::Log(level, text.into()));
    }

    /// Whether the receiving driver still exists
    pub fn is_attached(&self) -> bool {
        !self.tx.is_closed()
    }

    fn post(&self, notification: EngineNotification) {
        // A closed queue means the driver was dropped; nothing left to notify.
        let _ = self.tx.send(notification);
    }
}

/// A non-blocking, step-driven MQTT protocol engine.
///
/// Every method returns immediately. Step methods report a lost connection
/// as [`EngineError::ConnectionLost`]; any other error from a step is treated
/// by the driver as a broken engine contract.
pub trait ProtocolEngine: Send + 'static {
    /// Install the sink for connect/disconnect/message/log notifications
    fn set_notifier(&mut self, notifier: EngineNotifier);

    /// Enable TLS, verifying the broker against the CA certificates in
    /// `ca_path`. Called before the first `connect`.
    fn set_tls(&mut self, ca_path: &Path) -> EngineResult<()>;

    /// Begin connecting. Completion is reported by a `Connected` notification.
    fn connect(&mut self, host: &str, port: u16, keepalive: Duration) -> EngineResult<()>;

    /// Retry the last `connect` with the same parameters
    fn reconnect(&mut self) -> EngineResult<()>;

    /// Request a clean disconnect; reported by a `Disconnected(0)` notification
    fn disconnect(&mut self) -> EngineResult<()>;

    /// Generic loop step, used only while the connect handshake is pending
    fn step_poll(&mut self, timeout: Duration, max_packets: usize) -> EngineResult<()>;

    /// Descriptor of the connected socket, if any
    fn socket(&self) -> Option<RawFd>;

    /// Whether the engine has queued output waiting for a write slot
    fn wants_write(&self) -> bool;

    fn step_read(&mut self) -> EngineResult<()>;

    fn step_write(&mut self) -> EngineResult<()>;

    /// Periodic maintenance: keepalive pings, retries of unacknowledged packets
    fn step_misc(&mut self) -> EngineResult<()>;

    fn publish(&mut self, topic: &str, payload: &[u8], qos: QoS, retain: bool)
        -> EngineResult<()>;

    fn send_subscribe(&mut self, filter: &str, qos: QoS) -> EngineResult<()>;

    fn send_unsubscribe(&mut self, filter: &str) -> EngineResult<()>;

    fn topic_matches(&self, filter: &str, topic: &str) -> bool {
        topics::topic_matches(filter, topic)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notifier_posts_in_order() {
        let (notifier, mut rx) = EngineNotifier::channel();

        notifier.connected(0);
        notifier.message(EngineMessage::new("a/b", "hello"));
        notifier.disconnected(CONNECTION_LOST_CODE);

        assert_eq!(rx.try_recv().unwrap(), EngineNotification::Connected(0));
        assert_eq!(
            rx.try_recv().unwrap(),
            EngineNotification::Message(EngineMessage::new("a/b", "hello"))
        );
        assert_eq!(
            rx.try_recv().unwrap(),
            EngineNotification::Disconnected(CONNECTION_LOST_CODE)
        );
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_notifier_after_driver_dropped_is_noop() {
        let (notifier, rx) = EngineNotifier::channel();
        assert!(notifier.is_attached());

        drop(rx);

        assert!(!notifier.is_attached());
        notifier.connected(0);
        notifier.log(LogLevel::Warning, "nobody is listening");
    }

    #[test]
    fn test_log_levels_emit_without_subscriber() {
        for level in [
            LogLevel::Debug,
            LogLevel::Info,
            LogLevel::Notice,
            LogLevel::Warning,
            LogLevel::Error,
        ] {
            level.emit("engine says hi");
        }
    }
}
