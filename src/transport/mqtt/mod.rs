//! Connection driver for a step-based MQTT engine
//!
//! This module turns an engine's synchronous "loop" API into event-driven
//! behavior on the tokio reactor, separating pure decisions from I/O.
//!
//! # Architecture
//!
//! - [`connection`] - Pure connection state, timer vocabulary and errors
//! - [`message_handler`] - Pure notification routing and listener fan-out
//! - [`health_monitor`] - Pure lifecycle decisions and health metrics
//! - [`socket`] - Readiness registration for the engine's descriptor
//! - [`driver`] - Impure I/O: the driver task and its handles
//!
//! # Usage
//!
//! ```rust,no_run
//! use mqtt_dispatch::engine::SessionOptions;
//! use mqtt_dispatch::testing::ScriptedEngine;
//! use mqtt_dispatch::transport::mqtt::{BrokerAddress, ConnectionDriver, DriverTimings};
//! use std::time::Duration;
//!
//! # tokio_test::block_on(async {
//! let (engine, _probe) = ScriptedEngine::new(SessionOptions {
//!     client_id: "doc".to_string(),
//!     clean_session: true,
//! });
//!
//! let driver = ConnectionDriver::spawn(engine, DriverTimings::default());
//! let mut events = driver.events();
//! driver.connect(BrokerAddress::new("localhost", 1883, Duration::from_secs(60)))?;
//!
//! while let Some(event) = events.recv().await {
//!     println!("{event:?}");
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! # });
//! ```

pub mod connection;
pub mod driver;
pub mod health_monitor;
pub mod message_handler;
pub mod socket;

// Re-export public types for convenience
pub use connection::{BrokerAddress, ConnectionState, DriverError, DriverTimings, TimerKind};
pub use driver::{ConnectionDriver, DriverHandle};
pub use health_monitor::{
    ConnectionEvent, ConnectionStats, DisconnectDecision, HealthMetrics, HealthMonitor,
    StepOutcome,
};
pub use message_handler::{DriverEvent, EventListeners, MessageHandler, NotificationRoute};
