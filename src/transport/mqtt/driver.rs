//! Impure I/O operations for the connection driver
//!
//! One tokio task owns the engine and runs a select loop over engine
//! notifications, user commands, the single timer slot and the socket's
//! read/write readiness. Lifecycle decisions come from [`HealthMonitor`],
//! notification routing from [`MessageHandler`].

use super::connection::{BrokerAddress, ConnectionState, DriverError, DriverTimings, TimerKind};
use super::health_monitor::{
    ConnAckDecision, ConnectOutcome, ConnectionEvent, ConnectionStats, DisconnectDecision,
    HealthMetrics, HealthMonitor, StepOutcome,
};
use super::message_handler::{DriverEvent, EventListeners, MessageHandler, NotificationRoute};
use super::socket::{Readiness, SocketRegistration};
use crate::engine::topics::validate_topic;
use crate::engine::{
    EngineMessage, EngineNotification, EngineNotifier, ProtocolEngine, QoS, CONNECTION_LOST_CODE,
};
use crate::mqtt_span;
use bytes::Bytes;
use std::future::pending;
use std::io;
use std::pin::Pin;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{sleep, Sleep};
use tracing::{debug, error, info, warn, Instrument};

/// How long `shutdown` waits for the clean disconnect before stopping the task
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug)]
enum DriverCommand {
    Connect(BrokerAddress),
    Disconnect,
    Publish {
        topic: String,
        payload: Bytes,
        qos: QoS,
        retain: bool,
        reply: oneshot::Sender<Result<(), DriverError>>,
    },
    Subscribe {
        filter: String,
        qos: QoS,
    },
    Unsubscribe {
        filter: String,
    },
}

/// Cloneable handle to a running connection driver
#[derive(Debug, Clone)]
pub struct DriverHandle {
    commands: mpsc::UnboundedSender<DriverCommand>,
    state: watch::Receiver<ConnectionState>,
    stats: watch::Receiver<ConnectionStats>,
    listeners: EventListeners,
}

impl DriverHandle {
    /// Start connecting. Ignored with a warning unless the driver is disconnected.
    pub fn connect(&self, broker: BrokerAddress) -> Result<(), DriverError> {
        self.send(DriverCommand::Connect(broker))
    }

    /// Request a clean disconnect; no reconnect follows
    pub fn disconnect(&self) -> Result<(), DriverError> {
        self.send(DriverCommand::Disconnect)
    }

    /// Hand a message to the engine and wait for its verdict
    pub async fn publish(
        &self,
        topic: &str,
        payload: impl Into<Bytes>,
        qos: QoS,
        retain: bool,
    ) -> Result<(), DriverError> {
        validate_topic(topic)?;

        let (reply, response) = oneshot::channel();
        self.send(DriverCommand::Publish {
            topic: topic.to_string(),
            payload: payload.into(),
            qos,
            retain,
            reply,
        })?;

        response.await.map_err(|_| DriverError::Closed)?
    }

    /// Ask the engine to SUBSCRIBE; dropped by the driver while not connected
    pub fn send_subscribe(&self, filter: &str, qos: QoS) -> Result<(), DriverError> {
        self.send(DriverCommand::Subscribe {
            filter: filter.to_string(),
            qos,
        })
    }

    /// Ask the engine to UNSUBSCRIBE; dropped by the driver while not connected
    pub fn send_unsubscribe(&self, filter: &str) -> Result<(), DriverError> {
        self.send(DriverCommand::Unsubscribe {
            filter: filter.to_string(),
        })
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    pub fn is_connected(&self) -> bool {
        HealthMonitor::can_publish(self.state())
    }

    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }

    /// Wait until the driver reaches `target`; false on timeout or if the driver stopped
    pub async fn wait_for_state(&self, target: ConnectionState, timeout: Duration) -> bool {
        let mut state = self.state.clone();
        let reached = matches!(
            tokio::time::timeout(timeout, state.wait_for(|s| *s == target)).await,
            Ok(Ok(_))
        );
        reached
    }

    pub fn stats(&self) -> ConnectionStats {
        self.stats.borrow().clone()
    }

    pub fn health_metrics(&self) -> HealthMetrics {
        HealthMonitor::calculate_health_metrics(&self.stats.borrow())
    }

    /// Subscribe to connection and message events from now on
    pub fn events(&self) -> mpsc::UnboundedReceiver<DriverEvent> {
        self.listeners.subscribe()
    }

    fn send(&self, command: DriverCommand) -> Result<(), DriverError> {
        self.commands.send(command).map_err(|_| DriverError::Closed)
    }
}

/// Owner of the driver task. Dropping it aborts the task and destroys the engine.
pub struct ConnectionDriver {
    handle: DriverHandle,
    task: Option<JoinHandle<Result<(), DriverError>>>,
}

impl ConnectionDriver {
    /// Move `engine` into a new driver task. Must be called within a tokio runtime.
    pub fn spawn<E: ProtocolEngine>(mut engine: E, timings: DriverTimings) -> Self {
        let (notifier, notifications) = EngineNotifier::channel();
        engine.set_notifier(notifier.clone());

        let (command_tx, commands) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);
        let (stats_tx, stats_rx) = watch::channel(ConnectionStats::default());
        let listeners = EventListeners::new();

        let task = DriverTask {
            engine,
            timings,
            _notifier: notifier,
            notifications,
            commands,
            state: ConnectionState::Disconnected,
            state_tx,
            stats_tx,
            listeners: listeners.clone(),
            timer: None,
            socket: None,
            connected: false,
            reading: false,
            writing: false,
            reconnect_wanted: false,
        };

        let task_listeners = listeners.clone();
        let join = tokio::spawn(
            async move {
                let result = task.run().await;
                if let Err(ref e) = result {
                    error!(error = ?e, "Connection driver stopped");
                }
                task_listeners.close();
                result
            }
            .instrument(mqtt_span!(task = "connection_driver")),
        );

        Self {
            handle: DriverHandle {
                commands: command_tx,
                state: state_rx,
                stats: stats_rx,
                listeners,
            },
            task: Some(join),
        }
    }

    pub fn handle(&self) -> DriverHandle {
        self.handle.clone()
    }

    pub fn connect(&self, broker: BrokerAddress) -> Result<(), DriverError> {
        self.handle.connect(broker)
    }

    pub fn disconnect(&self) -> Result<(), DriverError> {
        self.handle.disconnect()
    }

    pub fn state(&self) -> ConnectionState {
        self.handle.state()
    }

    pub fn events(&self) -> mpsc::UnboundedReceiver<DriverEvent> {
        self.handle.events()
    }

    /// Wait for the driver task to end. Returns the engine failure that
    /// stopped it, if any.
    pub async fn join(mut self) -> Result<(), DriverError> {
        match self.task.take() {
            Some(task) => Self::task_result(task.await),
            None => Ok(()),
        }
    }

    /// Disconnect cleanly, wait briefly for the broker session to close,
    /// then stop the task
    pub async fn shutdown(mut self) -> Result<(), DriverError> {
        let Some(task) = self.task.take() else {
            return Ok(());
        };

        if self.handle.disconnect().is_ok()
            && !self
                .handle
                .wait_for_state(ConnectionState::Disconnected, SHUTDOWN_TIMEOUT)
                .await
        {
            warn!("Timed out waiting for clean disconnect");
        }

        if task.is_finished() {
            return Self::task_result(task.await);
        }

        task.abort();
        match task.await {
            Err(e) if e.is_cancelled() => {
                info!("Connection driver shut down");
                Ok(())
            }
            other => Self::task_result(other),
        }
    }

    fn task_result(
        joined: Result<Result<(), DriverError>, tokio::task::JoinError>,
    ) -> Result<(), DriverError> {
        joined.map_err(DriverError::TaskFailed)?
    }
}

impl Drop for ConnectionDriver {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

struct ArmedTimer {
    kind: TimerKind,
    sleep: Pin<Box<Sleep>>,
}

enum LoopEvent {
    Notification(EngineNotification),
    Command(DriverCommand),
    HandlesDropped,
    Timer(TimerKind),
    Ready(Readiness, io::Result<()>),
}

struct DriverTask<E> {
    engine: E,
    timings: DriverTimings,
    // Keeps the notification queue open for the lifetime of the task
    _notifier: EngineNotifier,
    notifications: mpsc::UnboundedReceiver<EngineNotification>,
    commands: mpsc::UnboundedReceiver<DriverCommand>,
    state: ConnectionState,
    state_tx: watch::Sender<ConnectionState>,
    stats_tx: watch::Sender<ConnectionStats>,
    listeners: EventListeners,
    timer: Option<ArmedTimer>,
    socket: Option<SocketRegistration>,
    connected: bool,
    reading: bool,
    writing: bool,
    /// Cleared by an explicit disconnect, set again by connect
    reconnect_wanted: bool,
}

impl<E: ProtocolEngine> DriverTask<E> {
    async fn run(mut self) -> Result<(), DriverError> {
        debug!("Connection driver started");

        loop {
            let event = tokio::select! {
                biased;
                Some(notification) = self.notifications.recv() => LoopEvent::Notification(notification),
                command = self.commands.recv() => match command {
                    Some(command) => LoopEvent::Command(command),
                    None => LoopEvent::HandlesDropped,
                },
                kind = wait_timer(&mut self.timer) => LoopEvent::Timer(kind),
                result = wait_ready(self.socket.as_ref(), Readiness::Read), if self.reading => {
                    LoopEvent::Ready(Readiness::Read, result)
                }
                result = wait_ready(self.socket.as_ref(), Readiness::Write), if self.writing => {
                    LoopEvent::Ready(Readiness::Write, result)
                }
            };

            match event {
                LoopEvent::Notification(notification) => self.handle_notification(notification)?,
                LoopEvent::Command(command) => self.handle_command(command),
                LoopEvent::HandlesDropped => {
                    debug!("All driver handles dropped, stopping");
                    return Ok(());
                }
                LoopEvent::Timer(kind) => {
                    self.timer = None;
                    self.handle_timer(kind)?;
                }
                LoopEvent::Ready(readiness, Ok(())) => self.handle_ready(readiness)?,
                LoopEvent::Ready(readiness, Err(e)) => {
                    warn!(error = %e, ?readiness, "Socket readiness wait failed");
                    match readiness {
                        Readiness::Read => self.reading = false,
                        Readiness::Write => self.writing = false,
                    }
                }
            }
        }
    }

    fn handle_notification(&mut self, notification: EngineNotification) -> Result<(), DriverError> {
        match MessageHandler::route_notification(notification) {
            NotificationRoute::ConnAck(return_code) => return self.on_connack(return_code),
            NotificationRoute::Disconnect(reason_code) => self.on_disconnect(reason_code),
            NotificationRoute::Message(message) => self.on_message(message),
            NotificationRoute::Log(level, text) => level.emit(&text),
        }
        Ok(())
    }

    fn on_connack(&mut self, return_code: u8) -> Result<(), DriverError> {
        match HealthMonitor::on_connack(return_code) {
            ConnAckDecision::Accepted => {
                if self.connected {
                    debug!("Connect notification while connected, ignoring");
                    return Ok(());
                }

                let fd = self.engine.socket().ok_or(DriverError::MissingSocket)?;
                let registration = SocketRegistration::register(fd).map_err(DriverError::Socket)?;
                debug!(fd, "Engine socket registered");

                self.socket = Some(registration);
                self.connected = true;
                self.reading = true;
                self.writing = false;
                self.probe_write();

                self.stats_tx.send_modify(|stats| {
                    stats.sessions += 1;
                    stats.connected_since = Some(Instant::now());
                });
                self.transition(ConnectionEvent::ConnAckAccepted);
                self.listeners.emit(DriverEvent::Connected);
            }
            ConnAckDecision::Refused(code) => {
                warn!(
                    return_code = code,
                    reason = MessageHandler::describe_connack(code),
                    "Connection refused by broker"
                );
                self.transition(ConnectionEvent::ConnAckRefused(code));
            }
        }
        Ok(())
    }

    fn on_disconnect(&mut self, reason_code: i32) {
        match HealthMonitor::on_disconnect(self.connected, reason_code, self.reconnect_wanted) {
            DisconnectDecision::IgnoreDuplicate => {
                debug!(reason_code, "Disconnect notification while disconnected, ignoring");
            }
            DisconnectDecision::StayDisconnected => {
                self.close_session(reason_code, true);
                self.transition(ConnectionEvent::Closed { expected: true });
            }
            DisconnectDecision::Reconnect => {
                self.close_session(reason_code, false);
                self.transition(ConnectionEvent::Closed { expected: false });
            }
        }
    }

    fn on_message(&mut self, message: EngineMessage) {
        debug!(topic = %message.topic, bytes = message.payload.len(), "Message received");
        self.stats_tx.send_modify(|stats| {
            stats.messages_received += 1;
            stats.last_message_at = Some(Instant::now());
        });
        self.listeners.emit(DriverEvent::Message(message));
    }

    fn close_session(&mut self, reason_code: i32, expected: bool) {
        self.connected = false;
        self.reading = false;
        self.writing = false;
        if self.socket.take().is_some() {
            debug!("Engine socket released");
        }

        self.stats_tx
            .send_modify(|stats| stats.connected_since = None);
        info!(
            reason_code,
            reason = MessageHandler::describe_disconnect(reason_code),
            "Session closed"
        );
        self.listeners.emit(DriverEvent::Disconnected { expected });
    }

    fn handle_command(&mut self, command: DriverCommand) {
        match command {
            DriverCommand::Connect(broker) => self.connect(broker),
            DriverCommand::Disconnect => self.disconnect(),
            DriverCommand::Publish {
                topic,
                payload,
                qos,
                retain,
                reply,
            } => {
                let result = self
                    .engine
                    .publish(&topic, &payload, qos, retain)
                    .map_err(DriverError::PublishFailed);
                if result.is_ok() {
                    self.probe_write();
                }
                // The caller may have stopped waiting
                let _ = reply.send(result);
            }
            DriverCommand::Subscribe { filter, qos } => {
                if !self.connected {
                    debug!(%filter, "Not connected, subscribe left to the next replay");
                    return;
                }
                match self.engine.send_subscribe(&filter, qos) {
                    Ok(()) => {
                        debug!(%filter, ?qos, "Subscribe sent");
                        self.probe_write();
                    }
                    Err(e) => warn!(%filter, error = %e, "Subscribe request failed"),
                }
            }
            DriverCommand::Unsubscribe { filter } => {
                if !self.connected {
                    debug!(%filter, "Not connected, unsubscribe skipped");
                    return;
                }
                match self.engine.send_unsubscribe(&filter) {
                    Ok(()) => {
                        debug!(%filter, "Unsubscribe sent");
                        self.probe_write();
                    }
                    Err(e) => warn!(%filter, error = %e, "Unsubscribe request failed"),
                }
            }
        }
    }

    fn connect(&mut self, broker: BrokerAddress) {
        if self.state != ConnectionState::Disconnected {
            warn!(state = ?self.state, "Connect requested while not disconnected, ignoring");
            return;
        }

        info!(host = %broker.host, port = broker.port, "Connecting to broker");
        self.reconnect_wanted = true;
        let result = self
            .engine
            .connect(&broker.host, broker.port, broker.keepalive);
        self.after_connect_call(result);
    }

    fn after_connect_call(&mut self, result: crate::engine::EngineResult<()>) {
        match HealthMonitor::classify_connect(result) {
            ConnectOutcome::Pending => self.transition(ConnectionEvent::ConnectIssued),
            ConnectOutcome::Retry(e) => self.transition(ConnectionEvent::ConnectFailed(e.to_string())),
        }
    }

    fn disconnect(&mut self) {
        self.reconnect_wanted = false;

        if self.connected {
            if let Err(e) = self.engine.disconnect() {
                warn!(error = %e, "Engine disconnect failed, closing session locally");
                self.close_session(0, true);
                self.transition(ConnectionEvent::Closed { expected: true });
                return;
            }
        } else if self.state == ConnectionState::ConnectPending {
            if let Err(e) = self.engine.disconnect() {
                debug!(error = %e, "Engine disconnect during handshake failed");
            }
        }

        self.transition(ConnectionEvent::DisconnectRequested);
    }

    fn handle_timer(&mut self, kind: TimerKind) -> Result<(), DriverError> {
        match kind {
            TimerKind::ConnectPoll => self.poll_handshake(),
            TimerKind::Misc => self.run_misc(),
            TimerKind::Reconnect => {
                self.attempt_reconnect();
                Ok(())
            }
        }
    }

    fn poll_handshake(&mut self) -> Result<(), DriverError> {
        if self.state != ConnectionState::ConnectPending {
            return Ok(());
        }

        match HealthMonitor::classify_step(self.engine.step_poll(Duration::ZERO, 1)) {
            StepOutcome::Continue => self.arm(Some(TimerKind::ConnectPoll)),
            StepOutcome::ConnectionLost => {
                warn!("Connection lost during handshake");
                self.transition(ConnectionEvent::ConnectionLost);
            }
            StepOutcome::Fatal(e) => return Err(DriverError::engine("step_poll", e)),
        }
        Ok(())
    }

    fn run_misc(&mut self) -> Result<(), DriverError> {
        if !self.connected {
            return Ok(());
        }

        match HealthMonitor::classify_step(self.engine.step_misc()) {
            StepOutcome::Continue => {
                self.arm(Some(TimerKind::Misc));
                self.probe_write();
            }
            StepOutcome::ConnectionLost => self.connection_lost("step_misc"),
            StepOutcome::Fatal(e) => return Err(DriverError::engine("step_misc", e)),
        }
        Ok(())
    }

    fn attempt_reconnect(&mut self) {
        if self.state != ConnectionState::ReconnectBackoff {
            return;
        }
        if !self.reconnect_wanted {
            self.transition(ConnectionEvent::DisconnectRequested);
            return;
        }
        if self.connected {
            // The engine never reported the loss it returned from a step
            self.close_session(CONNECTION_LOST_CODE, false);
        }

        self.stats_tx
            .send_modify(|stats| stats.reconnect_attempts += 1);
        info!(
            attempt = self.stats_tx.borrow().reconnect_attempts,
            "Reconnecting to broker"
        );
        let result = self.engine.reconnect();
        self.after_connect_call(result);
    }

    fn handle_ready(&mut self, readiness: Readiness) -> Result<(), DriverError> {
        if !self.connected {
            return Ok(());
        }

        let (operation, result) = match readiness {
            Readiness::Read => ("step_read", self.engine.step_read()),
            Readiness::Write => {
                self.writing = false;
                ("step_write", self.engine.step_write())
            }
        };

        match HealthMonitor::classify_step(result) {
            StepOutcome::Continue => self.probe_write(),
            StepOutcome::ConnectionLost => self.connection_lost(operation),
            StepOutcome::Fatal(e) => return Err(DriverError::engine(operation, e)),
        }
        Ok(())
    }

    /// A step reported the connection gone. The engine has already closed its
    /// descriptor, so the registration is dropped before anything can reuse
    /// the number. The Disconnected notification that follows ends the session.
    fn connection_lost(&mut self, operation: &'static str) {
        warn!(operation, "Engine reported connection lost");
        self.reading = false;
        self.writing = false;
        self.socket = None;
        self.transition(ConnectionEvent::ConnectionLost);
    }

    /// Arm a write wait if the engine has output queued and none is outstanding
    fn probe_write(&mut self) {
        if self.connected && self.socket.is_some() && !self.writing && self.engine.wants_write() {
            self.writing = true;
        }
    }

    fn transition(&mut self, event: ConnectionEvent) {
        let from = self.state;
        let to = HealthMonitor::determine_next_state(from, &event);
        HealthMonitor::log_state_transition(from, to, &event);

        self.state = to;
        // A pending backoff keeps its deadline when the loss is reported twice
        if to != from || self.timer.is_none() {
            self.arm(to.timer());
        }
        self.state_tx.send_if_modified(|state| {
            if *state == to {
                false
            } else {
                *state = to;
                true
            }
        });
    }

    /// Arm the single timer slot, replacing whatever it held
    fn arm(&mut self, kind: Option<TimerKind>) {
        self.timer = kind.map(|kind| ArmedTimer {
            kind,
            sleep: Box::pin(sleep(self.timings.delay_for(kind))),
        });
    }
}

async fn wait_timer(slot: &mut Option<ArmedTimer>) -> TimerKind {
    match slot {
        Some(timer) => {
            timer.sleep.as_mut().await;
            timer.kind
        }
        None => pending().await,
    }
}

async fn wait_ready(socket: Option<&SocketRegistration>, readiness: Readiness) -> io::Result<()> {
    match socket {
        Some(socket) => socket.ready(readiness).await,
        None => pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::EngineError;
    use crate::testing::{test_session, EngineCall, ScriptedEngine, StepKind};

    fn broker() -> BrokerAddress {
        BrokerAddress::new("localhost", 1883, Duration::from_secs(60))
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconnect_waits_for_backoff_delay() {
        let (engine, probe) = ScriptedEngine::new(test_session());
        probe.fail_next_connect(EngineError::ConnectionRefused);
        probe.fail_next_connect(EngineError::ConnectionRefused);
        let driver = ConnectionDriver::spawn(engine, DriverTimings::default());

        driver.connect(broker()).unwrap();
        sleep(Duration::from_millis(4900)).await;
        assert_eq!(driver.state(), ConnectionState::ReconnectBackoff);
        assert_eq!(probe.count(|c| *c == EngineCall::Reconnect), 0);

        sleep(Duration::from_millis(200)).await;
        assert_eq!(probe.count(|c| *c == EngineCall::Reconnect), 1);
        assert_eq!(driver.state(), ConnectionState::ReconnectBackoff);
        assert_eq!(driver.handle().stats().reconnect_attempts, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_disconnect_report_keeps_backoff_deadline() {
        // Arrange: a misc step reports the loss before the engine notifies it
        let (engine, probe) = ScriptedEngine::new(test_session());
        let driver = ConnectionDriver::spawn(engine, DriverTimings::default());
        driver.connect(broker()).unwrap();
        assert!(
            driver
                .handle()
                .wait_for_state(ConnectionState::Connected, Duration::from_secs(1))
                .await
        );
        probe.inject_step_error(StepKind::Misc, EngineError::ConnectionLost);
        assert!(
            driver
                .handle()
                .wait_for_state(ConnectionState::ReconnectBackoff, Duration::from_secs(2))
                .await
        );

        // Act: the engine's own notification arrives three seconds later
        sleep(Duration::from_secs(3)).await;
        assert!(probe.report_disconnect(CONNECTION_LOST_CODE));

        // Assert: the reconnect still fires five seconds after the loss
        sleep(Duration::from_millis(2500)).await;
        assert_eq!(probe.count(|c| *c == EngineCall::Reconnect), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnect_while_pending_stops_polling() {
        let (engine, probe) = ScriptedEngine::new(test_session());
        let driver = ConnectionDriver::spawn(engine, DriverTimings::default());

        driver.connect(broker()).unwrap();
        driver.disconnect().unwrap();
        sleep(Duration::from_secs(10)).await;

        assert_eq!(driver.state(), ConnectionState::Disconnected);
        assert_eq!(probe.count(|c| *c == EngineCall::StepPoll), 0);
        assert_eq!(probe.count(|c| *c == EngineCall::Reconnect), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_handles_dropped_stops_task() {
        let (engine, _probe) = ScriptedEngine::new(test_session());
        let mut driver = ConnectionDriver::spawn(engine, DriverTimings::default());
        let task = driver.task.take().unwrap();

        drop(driver);

        // The owner was dropped with the task detached: closing the command
        // channel ends the loop cleanly
        assert!(matches!(task.await, Ok(Ok(()))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_for_state_times_out() {
        let (engine, _probe) = ScriptedEngine::new(test_session());
        let driver = ConnectionDriver::spawn(engine, DriverTimings::default());

        let reached = driver
            .handle()
            .wait_for_state(ConnectionState::Connected, Duration::from_secs(1))
            .await;

        assert!(!reached);
    }
}
