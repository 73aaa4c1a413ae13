//! Testing utilities
//!
//! A scripted [`ProtocolEngine`](crate::engine::ProtocolEngine) that drives the
//! connection driver and dispatcher end to end without a broker.

pub mod mocks;

pub use mocks::*;
