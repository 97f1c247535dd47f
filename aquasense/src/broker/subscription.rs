use std::sync::{Arc, Weak};

use super::consumer::ConsumerSlot;
use crate::core::BrokerInner;

/// A consumer's registration with a broker.
///
/// Dropping the subscription unsubscribes. When the last consumer leaves,
/// the broker releases its feed subscription.
#[derive(Debug)]
#[must_use = "dropping a Subscription unsubscribes the consumer"]
pub struct Subscription {
    handle: Unsubscribe,
}

impl Subscription {
    pub(crate) const fn new(slot: Arc<ConsumerSlot>, broker: Weak<BrokerInner>) -> Self {
        Self {
            handle: Unsubscribe { slot, broker },
        }
    }

    /// Identifier unique within the broker.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.handle.slot.id
    }

    /// `false` once unsubscribed or the broker was closed.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.handle.is_active()
    }

    /// Stop receiving callbacks. Idempotent.
    pub fn unsubscribe(&self) {
        self.handle.unsubscribe();
    }

    /// A cloneable handle that can unsubscribe this consumer, including from
    /// inside one of its own callbacks.
    pub fn unsubscriber(&self) -> Unsubscribe {
        self.handle.clone()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.handle.unsubscribe();
    }
}

/// Detached unsubscribe capability for a [`Subscription`].
///
/// Holding it does not keep the consumer registered.
#[derive(Debug, Clone)]
pub struct Unsubscribe {
    slot: Arc<ConsumerSlot>,
    broker: Weak<BrokerInner>,
}

impl Unsubscribe {
    /// Stop the consumer's callbacks. Only the first call across all clones
    /// (and the owning subscription) has any effect.
    pub fn unsubscribe(&self) {
        if !self.slot.deactivate() {
            return;
        }
        if let Some(broker) = self.broker.upgrade() {
            broker.leave(self.slot.id);
        }
    }

    /// `false` once unsubscribed or the broker was closed.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.slot.is_active()
    }
}
