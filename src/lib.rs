//! mqtt-dispatch
//!
//! Reactor-driven MQTT client core for the tokio runtime.
//!
//! # Overview
//!
//! The crate does not speak the MQTT wire protocol itself. It drives a
//! step-based protocol engine (anything implementing
//! [`engine::ProtocolEngine`]) from a single tokio task, and lets many
//! independent call sites share that one connection:
//! - [`transport::mqtt::ConnectionDriver`] owns the engine: connect handshake
//!   polling, socket readiness, periodic maintenance, fixed-delay reconnect
//! - [`dispatch::SubscriptionDispatcher`] multiplexes overlapping wildcard
//!   subscriptions, replays them after every reconnect and fans inbound
//!   messages out to each matching handler
//! - [`MqttClient`] wires both together from a TOML [`ClientConfig`]
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use mqtt_dispatch::testing::ScriptedEngine;
//! use mqtt_dispatch::{ClientConfig, MqttClient, QoS};
//!
//! # tokio_test::block_on(async {
//! let config = ClientConfig::new("mqtt://localhost:1883");
//! let client = MqttClient::with_engine(config, |options| ScriptedEngine::new(options).0)?;
//!
//! let _temperature = client.subscribe("sensors/+/temperature", QoS::AtLeastOnce, |topic, payload| {
//!     println!("{topic}: {}", String::from_utf8_lossy(payload));
//! })?;
//!
//! client.connect()?;
//! client.publish("sensors/kitchen/temperature", "21.5", QoS::AtMostOnce, false).await?;
//! client.shutdown().await?;
//! # Ok::<(), mqtt_dispatch::ClientError>(())
//! # });
//! ```

pub mod client;
pub mod config;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod observability;
pub mod testing;
pub mod transport;

pub use client::MqttClient;
pub use config::{ClientConfig, ConfigError};
pub use dispatch::{SubscribeError, Subscription, SubscriptionDispatcher, SubscriptionId};
pub use engine::{
    EngineError, EngineMessage, EngineNotifier, LogLevel, ProtocolEngine, QoS, SessionOptions,
};
pub use error::{ClientError, ClientResult};
pub use transport::mqtt::{
    BrokerAddress, ConnectionDriver, ConnectionState, DriverError, DriverEvent, DriverHandle,
    DriverTimings, HealthMetrics,
};
