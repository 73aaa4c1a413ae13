//! Subscription dispatcher
//!
//! Independent call sites subscribe to possibly overlapping wildcard topic
//! filters over one connection. Identical filters share one wire-level
//! subscription: SUBSCRIBE goes out for the first entry of a filter (and
//! again when an entry raises the filter's QoS), UNSUBSCRIBE after the last
//! entry is gone. Every entry whose filter matches an inbound topic gets
//! its handler called once per message.

pub mod dispatcher;
pub mod subscription;
pub mod table;

pub use dispatcher::SubscriptionDispatcher;
pub use subscription::{SubscribeError, Subscription};
pub use table::{SubscriptionId, SubscriptionTable};
