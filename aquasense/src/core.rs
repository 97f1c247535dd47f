use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use aquasense_core::{
    AquaError, BrokerConfig, Clock, Parameter, ParameterDefaults, PhysicalRange,
    ReconciledWindow, Reconciler, SnapshotFeed, StreamHandle, SystemClock, Telemetry,
    TelemetrySnapshot,
};

use crate::broker::consumer::{Consumer, ConsumerSlot, Delivery};
use crate::broker::machine::{Action, BrokerMachine, BrokerState, Event};
use crate::broker::registry::{Registry, deliver};
use crate::broker::session::SessionManager;
use crate::broker::subscription::Subscription;

/// Shares one feed subscription among any number of consumers.
///
/// Cloning is cheap; clones refer to the same broker.
#[derive(Clone)]
pub struct Broker {
    pub(crate) inner: Arc<BrokerInner>,
}

impl std::fmt::Debug for Broker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Broker")
            .field("feed", &self.inner.feed.name())
            .field("state", &self.state())
            .field("consumers", &self.consumer_count())
            .finish_non_exhaustive()
    }
}

pub(crate) struct BrokerInner {
    feed: Arc<dyn SnapshotFeed>,
    cfg: BrokerConfig,
    pub(crate) reconciler: Reconciler,
    pub(crate) telemetry: Telemetry,
    shared: Mutex<Shared>,
}

#[derive(Default)]
struct Shared {
    machine: BrokerMachine,
    registry: Registry,
    session: Option<StreamHandle>,
}

/// Side effects planned under the lock and performed after releasing it.
enum Effect {
    Deliver(Vec<Arc<ConsumerSlot>>, Delivery),
    Release(StreamHandle),
}

/// Builder for constructing a [`Broker`].
pub struct BrokerBuilder {
    feed: Option<Arc<dyn SnapshotFeed>>,
    cfg: BrokerConfig,
    clock: Arc<dyn Clock>,
}

impl Default for BrokerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl BrokerBuilder {
    /// Create a builder with default configuration and the system clock.
    ///
    /// A feed must be supplied with [`feed`](Self::feed) before building.
    #[must_use]
    pub fn new() -> Self {
        Self {
            feed: None,
            cfg: BrokerConfig::default(),
            clock: Arc::new(SystemClock),
        }
    }

    /// Set the snapshot feed shared by every consumer.
    #[must_use]
    pub fn feed(mut self, feed: Arc<dyn SnapshotFeed>) -> Self {
        self.feed = Some(feed);
        self
    }

    /// Replace the whole configuration.
    #[must_use]
    pub fn config(mut self, cfg: BrokerConfig) -> Self {
        self.cfg = cfg;
        self
    }

    /// Number of most recent records requested from the feed.
    #[must_use]
    pub const fn window_size(mut self, n: usize) -> Self {
        self.cfg.window_size = n;
        self
    }

    /// Whether new consumers immediately receive the last window.
    #[must_use]
    pub const fn replay_on_join(mut self, yes: bool) -> Self {
        self.cfg.replay_on_join = yes;
        self
    }

    /// Fallback values used when a parameter has no valid reading.
    #[must_use]
    pub const fn defaults(mut self, defaults: ParameterDefaults) -> Self {
        self.cfg.reconcile.defaults = defaults;
        self
    }

    /// Treat probe fault sentinels (e.g. `-127` for temperature) as invalid.
    #[must_use]
    pub const fn reject_sensor_faults(mut self, yes: bool) -> Self {
        self.cfg.reconcile.reject_sensor_faults = yes;
        self
    }

    /// Accept a parameter's values only inside `range`.
    #[must_use]
    pub fn physical_range(mut self, param: Parameter, range: PhysicalRange) -> Self {
        self.cfg.reconcile.physical_ranges.insert(param, range);
        self
    }

    /// Replace all physical ranges.
    #[must_use]
    pub fn physical_ranges(mut self, ranges: BTreeMap<Parameter, PhysicalRange>) -> Self {
        self.cfg.reconcile.physical_ranges = ranges;
        self
    }

    /// Clock used as processing time during reconciliation.
    #[must_use]
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Build the broker. No feed subscription is opened until the first consumer joins.
    ///
    /// # Errors
    /// Returns `InvalidArg` if no feed was supplied or the configuration is invalid.
    pub fn build(self) -> Result<Broker, AquaError> {
        let feed = self
            .feed
            .ok_or_else(|| AquaError::invalid_arg("broker requires a snapshot feed"))?;
        self.cfg.validate()?;
        let reconciler = Reconciler::new(self.cfg.reconcile.clone(), self.clock);
        Ok(Broker {
            inner: Arc::new(BrokerInner {
                feed,
                cfg: self.cfg,
                reconciler,
                telemetry: Telemetry::new(),
                shared: Mutex::new(Shared::default()),
            }),
        })
    }
}

impl Broker {
    /// Start building a broker.
    #[must_use]
    pub fn builder() -> BrokerBuilder {
        BrokerBuilder::new()
    }

    /// Register a consumer. The first consumer opens the feed subscription.
    ///
    /// With replay enabled (broker-wide or on the consumer) and a window
    /// already reconciled, the consumer receives that window and the current
    /// connectivity before this call returns.
    ///
    /// # Errors
    /// - `BrokerClosed` after [`close`](Self::close).
    /// - `InvalidArg` when called outside a Tokio runtime.
    pub fn subscribe(&self, consumer: Consumer) -> Result<Subscription, AquaError> {
        if tokio::runtime::Handle::try_current().is_err() {
            return Err(AquaError::invalid_arg(
                "subscribe must be called within a tokio runtime",
            ));
        }
        let replay = consumer.replay_on_join.unwrap_or(self.inner.cfg.replay_on_join);

        let (slot, effects, snapshot) = {
            let mut shared = self.inner.lock();
            if shared.machine.state == BrokerState::Closed {
                return Err(AquaError::BrokerClosed);
            }
            let slot = shared.registry.register(consumer);
            let effects = self.inner.step(&mut shared, Event::ConsumerJoined);
            let connectivity = (
                shared.machine.announcements,
                shared.machine.state == BrokerState::Live,
            );
            let snapshot = shared
                .machine
                .last_window
                .clone()
                .map(|(seq, window)| (seq, window, connectivity));
            (slot, effects, snapshot)
        };
        self.inner.apply(effects);

        #[cfg(feature = "tracing")]
        tracing::debug!(feed = self.inner.feed.name(), consumer = slot.id, name = ?slot.name(), "consumer joined");

        // broadcasts may reach the slot first; stamped deliveries keep the newest
        if replay && let Some((seq, window, (epoch, up))) = snapshot {
            let targets = [Arc::clone(&slot)];
            deliver(&targets, &Delivery::Update { seq, window }, &self.inner.telemetry);
            deliver(&targets, &Delivery::Connectivity { epoch, up }, &self.inner.telemetry);
        }

        Ok(Subscription::new(slot, Arc::downgrade(&self.inner)))
    }

    /// Re-open the feed after it ended or failed to open.
    ///
    /// Has no effect while a feed session is attached or no consumers are
    /// registered. The broker stays `Degraded` until a non-empty snapshot
    /// arrives.
    ///
    /// # Errors
    /// - `BrokerClosed` after [`close`](Self::close).
    /// - `InvalidArg` when called outside a Tokio runtime.
    pub fn reconnect(&self) -> Result<(), AquaError> {
        if tokio::runtime::Handle::try_current().is_err() {
            return Err(AquaError::invalid_arg(
                "reconnect must be called within a tokio runtime",
            ));
        }
        let effects = {
            let mut shared = self.inner.lock();
            if shared.machine.state == BrokerState::Closed {
                return Err(AquaError::BrokerClosed);
            }
            self.inner.step(&mut shared, Event::Reconnect)
        };
        self.inner.apply(effects);
        Ok(())
    }

    /// Drop all consumers and release the feed. Idempotent.
    pub fn close(&self) {
        self.inner.dispatch(Event::Close);
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> BrokerState {
        self.inner.lock().machine.state
    }

    /// Number of registered consumers.
    #[must_use]
    pub fn consumer_count(&self) -> usize {
        self.inner.lock().registry.len()
    }

    /// The most recently broadcast window of the current feed generation.
    #[must_use]
    pub fn last_window(&self) -> Option<Arc<ReconciledWindow>> {
        self.inner
            .lock()
            .machine
            .last_window
            .as_ref()
            .map(|(_, w)| Arc::clone(w))
    }

    /// Copy of the broker's counters.
    #[must_use]
    pub fn telemetry(&self) -> TelemetrySnapshot {
        self.inner.telemetry.snapshot()
    }

    /// Active configuration.
    #[must_use]
    pub fn config(&self) -> &BrokerConfig {
        &self.inner.cfg
    }

    /// Name of the underlying feed.
    #[must_use]
    pub fn feed_name(&self) -> &'static str {
        self.inner.feed.name()
    }
}

impl BrokerInner {
    fn lock(&self) -> MutexGuard<'_, Shared> {
        // callbacks never run under this lock, so a poisoned guard still holds consistent state
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn dispatch(self: &Arc<Self>, event: Event) {
        let effects = {
            let mut shared = self.lock();
            self.step(&mut shared, event)
        };
        self.apply(effects);
    }

    pub(crate) fn leave(self: &Arc<Self>, id: u64) {
        let effects = {
            let mut shared = self.lock();
            shared.registry.remove(id);
            self.step(&mut shared, Event::ConsumerLeft)
        };
        self.apply(effects);
        #[cfg(feature = "tracing")]
        tracing::debug!(feed = self.feed.name(), consumer = id, "consumer left");
    }

    /// Run one transition and turn its actions into effects.
    fn step(self: &Arc<Self>, shared: &mut Shared, event: Event) -> Vec<Effect> {
        #[cfg(feature = "tracing")]
        let before = shared.machine.state;

        let machine = std::mem::take(&mut shared.machine);
        let (machine, actions) = machine.handle(event);
        shared.machine = machine;

        #[cfg(feature = "tracing")]
        if before != shared.machine.state {
            tracing::info!(
                feed = self.feed.name(),
                from = ?before,
                to = ?shared.machine.state,
                generation = shared.machine.generation,
                "broker state changed"
            );
        }

        let mut effects = Vec::with_capacity(actions.len());
        for action in actions {
            match action {
                Action::OpenFeed { generation } => {
                    let handle = SessionManager::spawn(
                        Arc::downgrade(self),
                        Arc::clone(&self.feed),
                        generation,
                        self.cfg.window_size,
                    );
                    if let Some(old) = shared.session.replace(handle) {
                        effects.push(Effect::Release(old));
                    }
                }
                Action::ReleaseFeed => {
                    if let Some(old) = shared.session.take() {
                        effects.push(Effect::Release(old));
                    }
                }
                Action::Broadcast { seq, window } => effects.push(Effect::Deliver(
                    shared.registry.targets(),
                    Delivery::Update { seq, window },
                )),
                Action::NotifyError(error) => {
                    #[cfg(feature = "tracing")]
                    tracing::warn!(feed = self.feed.name(), error = %error, "feed error");
                    effects.push(Effect::Deliver(
                        shared.registry.targets(),
                        Delivery::Error(error),
                    ));
                }
                Action::NotifyConnectivity { epoch, up } => effects.push(Effect::Deliver(
                    shared.registry.targets(),
                    Delivery::Connectivity { epoch, up },
                )),
                Action::DropConsumers => shared.registry.drain(),
            }
        }
        effects
    }

    fn apply(&self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::Deliver(targets, delivery) => {
                    deliver(&targets, &delivery, &self.telemetry);
                }
                Effect::Release(handle) => drop(handle),
            }
        }
    }
}
