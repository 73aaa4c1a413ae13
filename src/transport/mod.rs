//! Transport layer
//!
//! The connection driver that schedules a step-based MQTT engine on the
//! tokio reactor lives in [`mqtt`].

pub mod mqtt;

pub use mqtt::{ConnectionDriver, ConnectionState, DriverError, DriverEvent, DriverHandle};
