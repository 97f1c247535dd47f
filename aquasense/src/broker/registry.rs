use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use aquasense_core::Telemetry;

use super::consumer::{Consumer, ConsumerSlot, Delivery};

/// Consumers in registration order.
#[derive(Debug, Default)]
pub struct Registry {
    slots: Vec<Arc<ConsumerSlot>>,
    next_id: u64,
}

impl Registry {
    pub fn register(&mut self, consumer: Consumer) -> Arc<ConsumerSlot> {
        self.next_id += 1;
        let slot = Arc::new(ConsumerSlot::new(self.next_id, consumer));
        self.slots.push(Arc::clone(&slot));
        slot
    }

    pub fn remove(&mut self, id: u64) {
        self.slots.retain(|s| s.id != id);
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Copy of the current targets, taken under the broker lock.
    pub fn targets(&self) -> Vec<Arc<ConsumerSlot>> {
        self.slots.clone()
    }

    /// Deactivate and forget every consumer.
    pub fn drain(&mut self) {
        for slot in self.slots.drain(..) {
            slot.deactivate();
        }
    }
}

/// Deliver to `targets` in order. Must be called without the broker lock.
///
/// Slots deactivated after the targets were taken are skipped. A panicking
/// callback is counted and delivery continues with the next consumer.
pub fn deliver(targets: &[Arc<ConsumerSlot>], delivery: &Delivery, telemetry: &Telemetry) {
    for slot in targets {
        if !slot.is_active() {
            continue;
        }
        if catch_unwind(AssertUnwindSafe(|| slot.invoke(delivery))).is_err() {
            telemetry.record_consumer_panic();
            #[cfg(feature = "tracing")]
            tracing::warn!(
                consumer = slot.id,
                name = ?slot.name(),
                delivery = delivery_kind(delivery),
                "consumer callback panicked"
            );
        }
    }
}

#[cfg(feature = "tracing")]
const fn delivery_kind(delivery: &Delivery) -> &'static str {
    match delivery {
        Delivery::Update { .. } => "update",
        Delivery::Error(_) => "error",
        Delivery::Connectivity { .. } => "connectivity",
    }
}
