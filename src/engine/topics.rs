//! Topic filter validation and matching
//!
//! Matching follows the MQTT wildcard rules: `+` matches exactly one level,
//! `#` (last level only) matches the parent level and everything below it.
//! Topics starting with `$` are only matched by filters whose first level
//! is not a wildcard.

use rumqttc::QoS;
use thiserror::Error;

/// Topic and filter validation errors
#[derive(Debug, Error, PartialEq)]
pub enum TopicError {
    #[error("Topic cannot be empty")]
    Empty,
    #[error("Invalid topic filter: '{0}'")]
    InvalidFilter(String),
    #[error("Wildcards are not allowed in a publish topic: '{0}'")]
    WildcardInTopic(String),
    #[error("Invalid QoS level: {0}")]
    InvalidQos(u8),
}

/// Does `topic` match the subscription `filter`?
pub fn topic_matches(filter: &str, topic: &str) -> bool {
    let mut filter_levels = filter.split('/');
    let mut topic_levels = topic.split('/');

    if topic.starts_with('$') && matches!(filter.split('/').next(), Some("+" | "#")) {
        return false;
    }

    loop {
        match (filter_levels.next(), topic_levels.next()) {
            (Some("#"), _) => return true,
            (Some(f), Some(t)) if f == "+" || f == t => continue,
            (None, None) => return true,
            _ => return false,
        }
    }
}

/// Validate a subscription filter (`+` must fill a whole level, `#` must be last)
pub fn validate_filter(filter: &str) -> Result<(), TopicError> {
    if filter.is_empty() {
        return Err(TopicError::Empty);
    }
    if !rumqttc::valid_filter(filter) {
        return Err(TopicError::InvalidFilter(filter.to_string()));
    }
    Ok(())
}

/// Validate a concrete publish topic
pub fn validate_topic(topic: &str) -> Result<(), TopicError> {
    if topic.is_empty() {
        return Err(TopicError::Empty);
    }
    if has_wildcards(topic) {
        return Err(TopicError::WildcardInTopic(topic.to_string()));
    }
    Ok(())
}

pub fn has_wildcards(topic: &str) -> bool {
    topic.contains('+') || topic.contains('#')
}

/// Convert a numeric QoS level (0..=2)
pub fn qos_from_level(level: u8) -> Result<QoS, TopicError> {
    match level {
        0 => Ok(QoS::AtMostOnce),
        1 => Ok(QoS::AtLeastOnce),
        2 => Ok(QoS::ExactlyOnce),
        other => Err(TopicError::InvalidQos(other)),
    }
}

pub fn qos_level(qos: QoS) -> u8 {
    match qos {
        QoS::AtMostOnce => 0,
        QoS::AtLeastOnce => 1,
        QoS::ExactlyOnce => 2,
    }
}
