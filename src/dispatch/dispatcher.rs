//! Subscription dispatcher task
//!
//! The dispatcher listens to one connection driver. It replays the desired
//! subscription set on every connect, and fans each inbound message out to
//! the handlers whose filter matches. Handler calls and removals run as
//! items on the dispatcher's own queue, one at a time, in post order.

use super::subscription::{SubscribeError, Subscription};
use super::table::{Removed, SubscriptionId, SubscriptionTable};
use crate::dispatch_span;
use crate::engine::topics::validate_filter;
use crate::engine::{topic_matches, EngineMessage, QoS};
use crate::transport::mqtt::{DriverEvent, DriverHandle};
use bytes::Bytes;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn, Instrument};

type BoxedHandler = Box<dyn FnMut(&str, &[u8]) + Send>;
type SharedHandler = Arc<Mutex<BoxedHandler>>;

pub(super) enum DispatchTask {
    Remove(SubscriptionId),
    Invoke {
        id: SubscriptionId,
        handler: SharedHandler,
        topic: Arc<str>,
        payload: Bytes,
    },
}

struct DispatchState {
    table: SubscriptionTable<SharedHandler>,
    /// Tracks the driver's Connected/Disconnected events, not its state watch
    connected: bool,
    /// Driver session count when the desired set was last replayed
    session: u32,
}

impl DispatchState {
    /// True when a SUBSCRIBE sent now would reach the session the last
    /// replay covered. A newer session gets the entry from its own replay.
    fn in_replayed_session(&self, driver: &DriverHandle) -> bool {
        self.connected && self.session == driver.stats().sessions
    }
}

pub(super) struct DispatcherShared {
    state: Mutex<DispatchState>,
    driver: DriverHandle,
    queue: mpsc::UnboundedSender<DispatchTask>,
}

impl DispatcherShared {
    fn lock(&self) -> MutexGuard<'_, DispatchState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!("Subscription table lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    pub(super) fn post(&self, task: DispatchTask) {
        // Only fails once the dispatcher task is gone
        let _ = self.queue.send(task);
    }

    fn on_event(&self, event: DriverEvent) {
        match event {
            DriverEvent::Connected => self.replay(),
            DriverEvent::Disconnected { expected } => {
                self.lock().connected = false;
                debug!(expected, "Dispatcher marked disconnected");
            }
            DriverEvent::Message(message) => self.fan_out(message),
        }
    }

    fn replay(&self) {
        let mut state = self.lock();
        state.connected = true;
        state.session = self.driver.stats().sessions;

        let desired = state.table.desired();
        info!(filters = desired.len(), "Replaying subscriptions");
        for (filter, qos) in desired {
            if let Err(e) = self.driver.send_subscribe(&filter, qos) {
                warn!(%filter, error = %e, "Subscription replay failed");
            }
        }
    }

    fn fan_out(&self, message: EngineMessage) {
        let matched = self.lock().table.matching(&message.topic, topic_matches);
        if matched.is_empty() {
            debug!(topic = %message.topic, "No subscription matches message");
            return;
        }

        let topic: Arc<str> = Arc::from(message.topic.as_str());
        debug!(topic = %topic, handlers = matched.len(), "Dispatching message");
        for (id, handler) in matched {
            self.post(DispatchTask::Invoke {
                id,
                handler,
                topic: Arc::clone(&topic),
                payload: message.payload.clone(),
            });
        }
    }

    fn run_task(&self, task: DispatchTask) {
        match task {
            DispatchTask::Remove(id) => self.remove(id),
            DispatchTask::Invoke {
                id,
                handler,
                topic,
                payload,
            } => {
                let mut handler = match handler.lock() {
                    Ok(guard) => guard,
                    Err(poisoned) => {
                        warn!(%id, "Handler lock was poisoned, recovering");
                        poisoned.into_inner()
                    }
                };
                let call = panic::catch_unwind(AssertUnwindSafe(|| {
                    (*handler)(&topic[..], &payload[..])
                }));
                if call.is_err() {
                    error!(%id, topic = %topic, "Subscription handler panicked");
                }
            }
        }
    }

    fn remove(&self, id: SubscriptionId) {
        let mut state = self.lock();
        match state.table.remove(id) {
            Removed::Absent => debug!(%id, "Subscription already removed"),
            Removed::Remaining => debug!(%id, "Subscription removed, filter still in use"),
            Removed::LastForFilter(filter) => {
                debug!(%id, %filter, "Last subscription for filter removed");
                if state.connected {
                    if let Err(e) = self.driver.send_unsubscribe(&filter) {
                        warn!(%filter, error = %e, "Unsubscribe request failed");
                    }
                }
            }
        }
    }
}

/// Multiplexes subscriptions with overlapping filters over one driver
pub struct SubscriptionDispatcher {
    shared: Arc<DispatcherShared>,
    task: Option<JoinHandle<()>>,
}

impl SubscriptionDispatcher {
    /// Attach to a driver. Must be called within a tokio runtime.
    pub fn spawn(driver: DriverHandle) -> Self {
        let events = driver.events();
        let (queue, tasks) = mpsc::unbounded_channel();
        let connected = driver.is_connected();
        let session = driver.stats().sessions;

        let shared = Arc::new(DispatcherShared {
            state: Mutex::new(DispatchState {
                table: SubscriptionTable::new(),
                connected,
                session,
            }),
            driver,
            queue,
        });

        let task = tokio::spawn(
            Self::run(Arc::clone(&shared), events, tasks).instrument(dispatch_span!(task = "dispatcher")),
        );

        Self {
            shared,
            task: Some(task),
        }
    }

    async fn run(
        shared: Arc<DispatcherShared>,
        mut events: mpsc::UnboundedReceiver<DriverEvent>,
        mut tasks: mpsc::UnboundedReceiver<DispatchTask>,
    ) {
        debug!("Dispatcher started");

        loop {
            tokio::select! {
                biased;
                Some(task) = tasks.recv() => shared.run_task(task),
                event = events.recv() => match event {
                    Some(event) => shared.on_event(event),
                    None => break,
                },
            }
        }

        while let Ok(task) = tasks.try_recv() {
            shared.run_task(task);
        }
        info!("Connection driver stopped, dispatcher exiting");
    }

    /// Register `handler` for every message whose topic matches `filter`.
    ///
    /// The first entry for a filter, and any entry raising its QoS, sends a
    /// SUBSCRIBE when connected; otherwise the next connect replays it. While
    /// a reconnect has not been replayed yet, the replay sends it instead.
    pub fn subscribe<F>(
        &self,
        filter: &str,
        qos: QoS,
        handler: F,
    ) -> Result<Subscription, SubscribeError>
    where
        F: FnMut(&str, &[u8]) + Send + 'static,
    {
        validate_filter(filter)?;

        let boxed: BoxedHandler = Box::new(handler);
        let handler: SharedHandler = Arc::new(Mutex::new(boxed));
        let mut state = self.shared.lock();
        let inserted = state.table.insert(filter, qos, handler);

        let send_now = state.in_replayed_session(&self.shared.driver);
        if let (true, Some(wire_qos)) = (send_now, inserted.wire_qos) {
            if self.shared.driver.send_subscribe(filter, wire_qos).is_err() {
                state.table.remove(inserted.id);
                return Err(SubscribeError::Closed);
            }
        }
        debug!(id = %inserted.id, filter, ?qos, "Subscription added");

        Ok(Subscription {
            shared: Arc::downgrade(&self.shared),
            id: inserted.id,
            filter: filter.to_string(),
        })
    }

    /// Live subscription entries
    pub fn subscription_count(&self) -> usize {
        self.shared.lock().table.len()
    }

    /// Distinct live filters
    pub fn filter_count(&self) -> usize {
        self.shared.lock().table.filter_count()
    }

    /// Filters the dispatcher keeps subscribed, with their QoS
    pub fn desired(&self) -> Vec<(String, QoS)> {
        self.shared.lock().table.desired()
    }

    pub fn is_connected(&self) -> bool {
        self.shared.lock().connected
    }

    pub fn driver(&self) -> &DriverHandle {
        &self.shared.driver
    }
}

impl Drop for SubscriptionDispatcher {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
