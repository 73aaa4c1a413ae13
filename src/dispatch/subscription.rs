//! Subscription handles
//!
//! A [`Subscription`] keeps its entry alive. Dropping it (or calling
//! [`Subscription::unsubscribe`]) posts the removal onto the dispatcher's
//! queue, so it is safe to do from inside a handler, including the handler
//! the subscription owns.

use super::dispatcher::{DispatchTask, DispatcherShared};
use super::table::SubscriptionId;
use crate::engine::TopicError;
use std::sync::Weak;
use thiserror::Error;
use tracing::trace;

/// Local precondition failures of `subscribe`
#[derive(Debug, Error)]
pub enum SubscribeError {
    #[error("Invalid subscription")]
    Invalid(#[from] TopicError),
    #[error("Dispatcher is no longer connected to a driver")]
    Closed,
}

/// Handle to one live subscription entry
#[must_use = "dropping a Subscription unsubscribes it"]
pub struct Subscription {
    pub(super) shared: Weak<DispatcherShared>,
    pub(super) id: SubscriptionId,
    pub(super) filter: String,
}

impl Subscription {
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    pub fn filter(&self) -> &str {
        &self.filter
    }

    /// Remove the entry. The removal runs on the dispatcher's queue; wire
    /// traffic, if any, happens there and never inside this call.
    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("filter", &self.filter)
            .finish()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        // Dispatcher already gone: nothing left to clean up
        if let Some(shared) = self.shared.upgrade() {
            trace!(id = %self.id, filter = %self.filter, "Posting subscription removal");
            shared.post(DispatchTask::Remove(self.id));
        }
    }
}
