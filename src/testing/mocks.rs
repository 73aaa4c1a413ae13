//! Scripted protocol engine for tests
//!
//! [`ScriptedEngine`] implements [`ProtocolEngine`] over a real Unix socket
//! pair, so the driver's readiness waits, timers and notification queue are
//! exercised for real. The test keeps an [`EngineProbe`] to script connect
//! outcomes, inject inbound messages or failures, drop the connection from
//! the "broker" side and inspect every call the driver made.

use crate::engine::{
    EngineError, EngineMessage, EngineNotifier, EngineResult, ProtocolEngine, QoS, SessionOptions,
    CONNECTION_LOST_CODE,
};
use bytes::Bytes;
use std::collections::VecDeque;
use std::io::{ErrorKind, Read, Write};
use std::os::unix::io::{AsRawFd, RawFd};
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// One call the driver made into the engine
#[derive(Debug, Clone, PartialEq)]
pub enum EngineCall {
    SetTls { ca_path: PathBuf },
    Connect { host: String, port: u16 },
    Reconnect,
    Disconnect,
    StepPoll,
    StepRead,
    StepWrite,
    StepMisc,
    Publish {
        topic: String,
        payload: Bytes,
        qos: QoS,
        retain: bool,
    },
    Subscribe { filter: String, qos: QoS },
    Unsubscribe { filter: String },
}

/// Outcome of the next handshake
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectScript {
    Accept,
    /// CONNACK with this non-zero return code
    Refuse(u8),
}

/// Step functions an error can be injected into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepKind {
    Poll,
    Read,
    Write,
    Misc,
}

#[derive(Default)]
struct ProbeState {
    calls: Vec<EngineCall>,
    connect_script: VecDeque<ConnectScript>,
    connect_errors: VecDeque<EngineError>,
    step_errors: Vec<(StepKind, EngineError)>,
    inbound: VecDeque<EngineMessage>,
    /// Broker side of the socket pair
    peer: Option<UnixStream>,
    duplicate_disconnect: bool,
    misc_output: bool,
    notifier: Option<EngineNotifier>,
}

impl ProbeState {
    fn take_step_error(&mut self, kind: StepKind) -> Option<EngineError> {
        let index = self.step_errors.iter().position(|(k, _)| *k == kind)?;
        Some(self.step_errors.remove(index).1)
    }
}

fn lock(state: &Mutex<ProbeState>) -> MutexGuard<'_, ProbeState> {
    match state.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Test-side view of a [`ScriptedEngine`]
#[derive(Clone)]
pub struct EngineProbe {
    state: Arc<Mutex<ProbeState>>,
}

impl EngineProbe {
    /// Queue handshake outcomes; an empty script accepts
    pub fn script_connect(&self, outcomes: impl IntoIterator<Item = ConnectScript>) {
        lock(&self.state).connect_script.extend(outcomes);
    }

    /// Make the next `connect`/`reconnect` call fail immediately
    pub fn fail_next_connect(&self, error: EngineError) {
        lock(&self.state).connect_errors.push_back(error);
    }

    /// Make the next call of step `kind` return `error`
    pub fn inject_step_error(&self, kind: StepKind, error: EngineError) {
        lock(&self.state).step_errors.push((kind, error));
    }

    /// Report every disconnect twice, like some engines do
    pub fn duplicate_disconnects(&self, enabled: bool) {
        lock(&self.state).duplicate_disconnect = enabled;
    }

    /// Make every `step_misc` queue a packet, like a keepalive PINGREQ
    pub fn queue_output_on_misc(&self, enabled: bool) {
        lock(&self.state).misc_output = enabled;
    }

    /// Post a Disconnected notification without touching the socket
    pub fn report_disconnect(&self, reason_code: i32) -> bool {
        match &lock(&self.state).notifier {
            Some(notifier) => {
                notifier.disconnected(reason_code);
                true
            }
            None => false,
        }
    }

    /// Broker sends a PUBLISH. Returns false when no connection is up.
    pub fn deliver(&self, topic: &str, payload: &[u8]) -> bool {
        let mut state = lock(&self.state);
        let Some(peer) = state.peer.as_mut() else {
            return false;
        };
        if peer.write_all(&[0x30]).is_err() {
            return false;
        }
        state
            .inbound
            .push_back(EngineMessage::new(topic, Bytes::copy_from_slice(payload)));
        true
    }

    /// Broker closes the TCP connection
    pub fn drop_connection(&self) -> bool {
        lock(&self.state).peer.take().is_some()
    }

    pub fn is_connected(&self) -> bool {
        lock(&self.state).peer.is_some()
    }

    pub fn calls(&self) -> Vec<EngineCall> {
        lock(&self.state).calls.clone()
    }

    pub fn clear_calls(&self) {
        lock(&self.state).calls.clear();
    }

    /// Number of recorded calls satisfying `predicate`
    pub fn count(&self, predicate: impl Fn(&EngineCall) -> bool) -> usize {
        lock(&self.state).calls.iter().filter(|&c| predicate(c)).count()
    }

    pub fn connect_calls(&self) -> usize {
        self.count(|c| matches!(c, EngineCall::Connect { .. } | EngineCall::Reconnect))
    }

    pub fn subscribe_calls(&self, filter: &str) -> usize {
        self.count(|c| matches!(c, EngineCall::Subscribe { filter: f, .. } if f == filter))
    }

    pub fn unsubscribe_calls(&self, filter: &str) -> usize {
        self.count(|c| matches!(c, EngineCall::Unsubscribe { filter: f } if f == filter))
    }

    /// QoS of every SUBSCRIBE sent for `filter`, in order
    pub fn subscribe_qos(&self, filter: &str) -> Vec<QoS> {
        lock(&self.state)
            .calls
            .iter()
            .filter_map(|c| match c {
                EngineCall::Subscribe { filter: f, qos } if f == filter => Some(*qos),
                _ => None,
            })
            .collect()
    }

    pub fn published(&self) -> Vec<(String, Bytes)> {
        lock(&self.state)
            .calls
            .iter()
            .filter_map(|c| match c {
                EngineCall::Publish { topic, payload, .. } => Some((topic.clone(), payload.clone())),
                _ => None,
            })
            .collect()
    }
}

/// In-process engine backed by a Unix socket pair
pub struct ScriptedEngine {
    options: SessionOptions,
    notifier: Option<EngineNotifier>,
    probe: Arc<Mutex<ProbeState>>,
    address: Option<(String, u16)>,
    handshake_pending: bool,
    socket: Option<UnixStream>,
    outbound: usize,
}

impl ScriptedEngine {
    pub fn new(options: SessionOptions) -> (Self, EngineProbe) {
        let probe = Arc::new(Mutex::new(ProbeState::default()));
        let engine = Self {
            options,
            notifier: None,
            probe: Arc::clone(&probe),
            address: None,
            handshake_pending: false,
            socket: None,
            outbound: 0,
        };
        (engine, EngineProbe { state: probe })
    }

    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    fn record(&self, call: EngineCall) {
        lock(&self.probe).calls.push(call);
    }

    /// Record a step call and hand back its injected error, if any
    fn step(&self, call: EngineCall, kind: StepKind) -> EngineResult<()> {
        let mut state = lock(&self.probe);
        state.calls.push(call);
        match state.take_step_error(kind) {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn notify(&self, f: impl FnOnce(&EngineNotifier)) {
        if let Some(notifier) = &self.notifier {
            f(notifier);
        }
    }

    fn begin_handshake(&mut self) -> EngineResult<()> {
        if let Some(error) = lock(&self.probe).connect_errors.pop_front() {
            return Err(error);
        }
        self.socket = None;
        self.handshake_pending = true;
        Ok(())
    }

    fn finish_handshake(&mut self) -> EngineResult<()> {
        let script = lock(&self.probe)
            .connect_script
            .pop_front()
            .unwrap_or(ConnectScript::Accept);
        self.handshake_pending = false;

        match script {
            ConnectScript::Accept => {
                let (local, peer) = UnixStream::pair()?;
                local.set_nonblocking(true)?;
                self.socket = Some(local);
                self.outbound = 0;
                lock(&self.probe).peer = Some(peer);
                self.notify(|n| n.connected(0));
            }
            ConnectScript::Refuse(code) => self.notify(|n| n.connected(code)),
        }
        Ok(())
    }

    /// Socket closed under us: release it and report the loss
    fn lose_connection(&mut self) -> EngineError {
        self.socket = None;
        self.outbound = 0;
        let duplicate = {
            let mut state = lock(&self.probe);
            state.peer = None;
            state.duplicate_disconnect
        };
        self.notify(|n| n.disconnected(CONNECTION_LOST_CODE));
        if duplicate {
            self.notify(|n| n.disconnected(CONNECTION_LOST_CODE));
        }
        EngineError::ConnectionLost
    }

    fn require_socket(&self) -> EngineResult<()> {
        if self.socket.is_some() {
            Ok(())
        } else {
            Err(EngineError::NoConnection)
        }
    }
}

impl ProtocolEngine for ScriptedEngine {
    fn set_notifier(&mut self, notifier: EngineNotifier) {
        lock(&self.probe).notifier = Some(notifier.clone());
        self.notifier = Some(notifier);
    }

    fn set_tls(&mut self, ca_path: &Path) -> EngineResult<()> {
        self.record(EngineCall::SetTls {
            ca_path: ca_path.to_path_buf(),
        });
        if ca_path.as_os_str().is_empty() {
            return Err(EngineError::Tls("empty CA path".to_string()));
        }
        Ok(())
    }

    fn connect(&mut self, host: &str, port: u16, _keepalive: Duration) -> EngineResult<()> {
        self.record(EngineCall::Connect {
            host: host.to_string(),
            port,
        });
        self.address = Some((host.to_string(), port));
        self.begin_handshake()
    }

    fn reconnect(&mut self) -> EngineResult<()> {
        self.record(EngineCall::Reconnect);
        if self.address.is_none() {
            return Err(EngineError::InvalidParameters(
                "reconnect before connect".to_string(),
            ));
        }
        self.begin_handshake()
    }

    fn disconnect(&mut self) -> EngineResult<()> {
        let duplicate = {
            let mut state = lock(&self.probe);
            state.calls.push(EngineCall::Disconnect);
            state.peer = None;
            state.duplicate_disconnect
        };

        if self.handshake_pending {
            self.handshake_pending = false;
            return Ok(());
        }
        if self.socket.take().is_none() {
            return Err(EngineError::NoConnection);
        }

        self.outbound = 0;
        self.notify(|n| n.disconnected(0));
        if duplicate {
            self.notify(|n| n.disconnected(0));
        }
        Ok(())
    }

    fn step_poll(&mut self, _timeout: Duration, _max_packets: usize) -> EngineResult<()> {
        self.step(EngineCall::StepPoll, StepKind::Poll)?;
        if self.handshake_pending {
            self.finish_handshake()?;
        }
        Ok(())
    }

    fn socket(&self) -> Option<RawFd> {
        self.socket.as_ref().map(|s| s.as_raw_fd())
    }

    fn wants_write(&self) -> bool {
        self.socket.is_some() && self.outbound > 0
    }

    fn step_read(&mut self) -> EngineResult<()> {
        self.step(EngineCall::StepRead, StepKind::Read)?;
        let Some(socket) = self.socket.as_mut() else {
            return Err(EngineError::NoConnection);
        };

        let mut buf = [0u8; 64];
        let mut eof = false;
        loop {
            match socket.read(&mut buf) {
                Ok(0) => {
                    eof = true;
                    break;
                }
                Ok(_) => continue,
                Err(e) if e.kind() == ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(_) => {
                    eof = true;
                    break;
                }
            }
        }

        let inbound: Vec<EngineMessage> = lock(&self.probe).inbound.drain(..).collect();
        for message in inbound {
            self.notify(|n| n.message(message));
        }

        if eof {
            return Err(self.lose_connection());
        }
        Ok(())
    }

    fn step_write(&mut self) -> EngineResult<()> {
        self.step(EngineCall::StepWrite, StepKind::Write)?;
        self.require_socket()?;
        self.outbound = 0;
        Ok(())
    }

    fn step_misc(&mut self) -> EngineResult<()> {
        self.step(EngineCall::StepMisc, StepKind::Misc)?;
        if self.socket.is_some() && lock(&self.probe).misc_output {
            self.outbound += 1;
        }
        Ok(())
    }

    fn publish(&mut self, topic: &str, payload: &[u8], qos: QoS, retain: bool) -> EngineResult<()> {
        self.record(EngineCall::Publish {
            topic: topic.to_string(),
            payload: Bytes::copy_from_slice(payload),
            qos,
            retain,
        });
        self.require_socket()?;
        self.outbound += 1;
        Ok(())
    }

    fn send_subscribe(&mut self, filter: &str, qos: QoS) -> EngineResult<()> {
        self.record(EngineCall::Subscribe {
            filter: filter.to_string(),
            qos,
        });
        self.require_socket()?;
        self.outbound += 1;
        Ok(())
    }

    fn send_unsubscribe(&mut self, filter: &str) -> EngineResult<()> {
        self.record(EngineCall::Unsubscribe {
            filter: filter.to_string(),
        });
        self.require_socket()?;
        self.outbound += 1;
        Ok(())
    }
}

/// Session options used by tests that do not care about them
pub fn test_session() -> SessionOptions {
    SessionOptions {
        client_id: "test-client".to_string(),
        clean_session: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::EngineNotification;

    fn engine_with_notifications() -> (
        ScriptedEngine,
        EngineProbe,
        tokio::sync::mpsc::UnboundedReceiver<EngineNotification>,
    ) {
        let (mut engine, probe) = ScriptedEngine::new(test_session());
        let (notifier, rx) = EngineNotifier::channel();
        engine.set_notifier(notifier);
        (engine, probe, rx)
    }

    #[test]
    fn test_handshake_accepts_by_default() {
        let (mut engine, probe, mut rx) = engine_with_notifications();

        engine
            .connect("localhost", 1883, Duration::from_secs(60))
            .unwrap();
        assert!(engine.socket().is_none());

        engine.step_poll(Duration::ZERO, 1).unwrap();
        assert!(engine.socket().is_some());
        assert!(probe.is_connected());
        assert_eq!(rx.try_recv().unwrap(), EngineNotification::Connected(0));
    }

    #[test]
    fn test_scripted_refusal() {
        let (mut engine, probe, mut rx) = engine_with_notifications();
        probe.script_connect([ConnectScript::Refuse(5)]);

        engine
            .connect("localhost", 1883, Duration::from_secs(60))
            .unwrap();
        engine.step_poll(Duration::ZERO, 1).unwrap();

        assert!(engine.socket().is_none());
        assert_eq!(rx.try_recv().unwrap(), EngineNotification::Connected(5));
    }

    #[test]
    fn test_delivered_message_is_reported_by_step_read() {
        let (mut engine, probe, mut rx) = engine_with_notifications();
        engine
            .connect("localhost", 1883, Duration::from_secs(60))
            .unwrap();
        engine.step_poll(Duration::ZERO, 1).unwrap();
        let _ = rx.try_recv();

        assert!(probe.deliver("a/b", b"hi"));
        engine.step_read().unwrap();

        assert_eq!(
            rx.try_recv().unwrap(),
            EngineNotification::Message(EngineMessage::new("a/b", "hi"))
        );
    }

    #[test]
    fn test_peer_close_is_connection_lost() {
        let (mut engine, probe, mut rx) = engine_with_notifications();
        engine
            .connect("localhost", 1883, Duration::from_secs(60))
            .unwrap();
        engine.step_poll(Duration::ZERO, 1).unwrap();
        let _ = rx.try_recv();

        assert!(probe.drop_connection());
        let result = engine.step_read();

        assert!(matches!(result, Err(EngineError::ConnectionLost)));
        assert!(engine.socket().is_none());
        assert_eq!(
            rx.try_recv().unwrap(),
            EngineNotification::Disconnected(CONNECTION_LOST_CODE)
        );
    }

    #[test]
    fn test_outbound_traffic_wants_write_until_flushed() {
        let (mut engine, _probe, _rx) = engine_with_notifications();
        engine
            .connect("localhost", 1883, Duration::from_secs(60))
            .unwrap();
        engine.step_poll(Duration::ZERO, 1).unwrap();

        assert!(!engine.wants_write());
        engine.send_subscribe("a/#", QoS::AtLeastOnce).unwrap();
        assert!(engine.wants_write());
        engine.step_write().unwrap();
        assert!(!engine.wants_write());
    }

    #[test]
    fn test_injected_step_error_fires_once() {
        let (mut engine, probe, _rx) = engine_with_notifications();
        probe.inject_step_error(StepKind::Misc, EngineError::Protocol);

        assert!(matches!(engine.step_misc(), Err(EngineError::Protocol)));
        assert!(engine.step_misc().is_ok());
        assert_eq!(probe.count(|c| *c == EngineCall::StepMisc), 2);
    }

    #[test]
    fn test_duplicate_disconnect_reports_twice() {
        let (mut engine, probe, mut rx) = engine_with_notifications();
        probe.duplicate_disconnects(true);
        engine
            .connect("localhost", 1883, Duration::from_secs(60))
            .unwrap();
        engine.step_poll(Duration::ZERO, 1).unwrap();
        let _ = rx.try_recv();

        engine.disconnect().unwrap();

        assert_eq!(rx.try_recv().unwrap(), EngineNotification::Disconnected(0));
        assert_eq!(rx.try_recv().unwrap(), EngineNotification::Disconnected(0));
        assert!(engine.disconnect().is_err());
    }

    #[test]
    fn test_misc_output_wants_write() {
        let (mut engine, probe, _rx) = engine_with_notifications();
        probe.queue_output_on_misc(true);
        engine
            .connect("localhost", 1883, Duration::from_secs(60))
            .unwrap();
        engine.step_poll(Duration::ZERO, 1).unwrap();

        engine.step_misc().unwrap();
        assert!(engine.wants_write());
        engine.step_write().unwrap();
        assert!(!engine.wants_write());
    }

    #[test]
    fn test_set_tls_is_recorded() {
        let (mut engine, probe, _rx) = engine_with_notifications();

        engine.set_tls(Path::new("/etc/ssl/certs")).unwrap();
        assert!(matches!(engine.set_tls(Path::new("")), Err(EngineError::Tls(_))));

        assert_eq!(
            probe.calls()[0],
            EngineCall::SetTls {
                ca_path: PathBuf::from("/etc/ssl/certs")
            }
        );
    }

    #[test]
    fn test_report_disconnect_uses_installed_notifier() {
        let (mut engine, probe) = ScriptedEngine::new(test_session());
        assert!(!probe.report_disconnect(CONNECTION_LOST_CODE));

        let (notifier, mut rx) = EngineNotifier::channel();
        engine.set_notifier(notifier);

        assert!(probe.report_disconnect(CONNECTION_LOST_CODE));
        assert_eq!(
            rx.try_recv().unwrap(),
            EngineNotification::Disconnected(CONNECTION_LOST_CODE)
        );
    }

    #[test]
    fn test_reconnect_requires_prior_connect() {
        let (mut engine, _probe, _rx) = engine_with_notifications();
        assert!(matches!(
            engine.reconnect(),
            Err(EngineError::InvalidParameters(_))
        ));
    }
}
