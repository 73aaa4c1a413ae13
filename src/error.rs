//! Crate-level error type
//!
//! Each layer keeps its own error enum; [`ClientError`] unifies them for
//! callers that drive the whole client.

use crate::config::ConfigError;
use crate::dispatch::SubscribeError;
use crate::engine::{EngineError, TopicError};
use crate::transport::mqtt::DriverError;
use thiserror::Error;

/// Main error type for client operations
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Connection driver error: {0}")]
    Driver(#[from] DriverError),

    #[error("Subscription error: {0}")]
    Subscribe(#[from] SubscribeError),

    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    #[error("Topic error: {0}")]
    Topic(#[from] TopicError),
}

impl ClientError {
    /// True when the driver task is gone and the client can no longer be used
    pub fn is_closed(&self) -> bool {
        matches!(
            self,
            ClientError::Driver(DriverError::Closed) | ClientError::Subscribe(SubscribeError::Closed)
        )
    }

    /// True for failures caused by the caller's arguments
    pub fn is_invalid_input(&self) -> bool {
        matches!(
            self,
            ClientError::Topic(_)
                | ClientError::Driver(DriverError::InvalidPublish(_))
                | ClientError::Subscribe(SubscribeError::Invalid(_))
        )
    }
}

/// Result type for client operations
pub type ClientResult<T> = Result<T, ClientError>;
