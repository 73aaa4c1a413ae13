//! Client facade
//!
//! Wires one [`ConnectionDriver`] and one [`SubscriptionDispatcher`] together
//! from a [`ClientConfig`].

use crate::config::ClientConfig;
use crate::dispatch::{Subscription, SubscriptionDispatcher};
use crate::engine::{ProtocolEngine, QoS, SessionOptions};
use crate::error::ClientResult;
use crate::transport::mqtt::{
    BrokerAddress, ConnectionDriver, ConnectionState, DriverEvent, DriverHandle, HealthMetrics,
};
use bytes::Bytes;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::info;

/// MQTT client multiplexing many subscriptions over one engine connection
pub struct MqttClient {
    config: ClientConfig,
    broker: BrokerAddress,
    // Declared before the driver so it stops first
    dispatcher: SubscriptionDispatcher,
    driver: ConnectionDriver,
}

impl MqttClient {
    /// Start a client around an already constructed engine.
    /// Must be called within a tokio runtime.
    pub fn new<E: ProtocolEngine>(mut engine: E, config: ClientConfig) -> ClientResult<Self> {
        config.validate()?;
        let broker = config.broker_address()?;

        if let Some(ca_path) = &config.broker.ca_path {
            engine.set_tls(ca_path)?;
            info!(ca_path = %ca_path.display(), "TLS enabled");
        }

        let driver = ConnectionDriver::spawn(engine, config.driver_timings());
        let dispatcher = SubscriptionDispatcher::spawn(driver.handle());

        info!(client_id = config.client_id(), broker = %config.broker.url, "MQTT client created");
        Ok(Self {
            config,
            broker,
            dispatcher,
            driver,
        })
    }

    /// Create the engine from the configured session options, then start the client
    pub fn with_engine<E, F>(config: ClientConfig, create_engine: F) -> ClientResult<Self>
    where
        E: ProtocolEngine,
        F: FnOnce(SessionOptions) -> E,
    {
        let engine = create_engine(config.session_options());
        Self::new(engine, config)
    }

    /// Start connecting to the configured broker. Progress is reported
    /// through [`MqttClient::events`] and [`MqttClient::state`].
    pub fn connect(&self) -> ClientResult<()> {
        self.driver.connect(self.broker.clone())?;
        Ok(())
    }

    /// Disconnect cleanly; no reconnect follows
    pub fn disconnect(&self) -> ClientResult<()> {
        self.driver.disconnect()?;
        Ok(())
    }

    pub async fn publish(
        &self,
        topic: &str,
        payload: impl Into<Bytes>,
        qos: QoS,
        retain: bool,
    ) -> ClientResult<()> {
        self.driver
            .handle()
            .publish(topic, payload, qos, retain)
            .await?;
        Ok(())
    }

    /// Register `handler` for messages matching `filter`; see
    /// [`SubscriptionDispatcher::subscribe`]
    pub fn subscribe<F>(&self, filter: &str, qos: QoS, handler: F) -> ClientResult<Subscription>
    where
        F: FnMut(&str, &[u8]) + Send + 'static,
    {
        Ok(self.dispatcher.subscribe(filter, qos, handler)?)
    }

    pub fn state(&self) -> ConnectionState {
        self.driver.state()
    }

    pub fn is_connected(&self) -> bool {
        self.driver.handle().is_connected()
    }

    pub async fn wait_for_state(&self, target: ConnectionState, timeout: Duration) -> bool {
        self.driver.handle().wait_for_state(target, timeout).await
    }

    pub fn events(&self) -> mpsc::UnboundedReceiver<DriverEvent> {
        self.driver.events()
    }

    pub fn health_metrics(&self) -> HealthMetrics {
        self.driver.handle().health_metrics()
    }

    pub fn driver(&self) -> DriverHandle {
        self.driver.handle()
    }

    pub fn dispatcher(&self) -> &SubscriptionDispatcher {
        &self.dispatcher
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Disconnect, wait briefly for the session to close, then stop both tasks
    pub async fn shutdown(self) -> ClientResult<()> {
        let MqttClient {
            dispatcher, driver, ..
        } = self;

        let result = driver.shutdown().await;
        drop(dispatcher);
        info!("MQTT client shut down");
        Ok(result?)
    }
}
