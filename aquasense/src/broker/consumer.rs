use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use aquasense_core::{AquaError, ReconciledWindow};

type UpdateFn = dyn Fn(Arc<ReconciledWindow>) + Send + Sync;
type ErrorFn = dyn Fn(&AquaError) + Send + Sync;
type ConnectivityFn = dyn Fn(bool) + Send + Sync;

/// Callbacks registered with a broker.
///
/// Callbacks run on the broker's feed task with no broker lock held, so they
/// may call back into the broker (including unsubscribing). They should
/// return quickly; a slow consumer delays the ones registered after it.
pub struct Consumer {
    pub(crate) name: Option<String>,
    pub(crate) on_update: Box<UpdateFn>,
    pub(crate) on_error: Option<Box<ErrorFn>>,
    pub(crate) on_connectivity: Option<Box<ConnectivityFn>>,
    pub(crate) replay_on_join: Option<bool>,
}

impl fmt::Debug for Consumer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Consumer")
            .field("name", &self.name)
            .field("on_error", &self.on_error.is_some())
            .field("on_connectivity", &self.on_connectivity.is_some())
            .field("replay_on_join", &self.replay_on_join)
            .finish_non_exhaustive()
    }
}

impl Consumer {
    /// Start building a consumer.
    #[must_use]
    pub fn builder() -> ConsumerBuilder {
        ConsumerBuilder::default()
    }

    /// A consumer with only an update callback.
    pub fn on_update<F>(f: F) -> Self
    where
        F: Fn(Arc<ReconciledWindow>) + Send + Sync + 'static,
    {
        Self {
            name: None,
            on_update: Box::new(f),
            on_error: None,
            on_connectivity: None,
            replay_on_join: None,
        }
    }

    /// Label used in logs.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }
}

/// Builder for [`Consumer`].
#[derive(Default)]
pub struct ConsumerBuilder {
    name: Option<String>,
    on_update: Option<Box<UpdateFn>>,
    on_error: Option<Box<ErrorFn>>,
    on_connectivity: Option<Box<ConnectivityFn>>,
    replay_on_join: Option<bool>,
}

impl ConsumerBuilder {
    /// Label the consumer in logs.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Called with every reconciled window. Required.
    #[must_use]
    pub fn on_update<F>(mut self, f: F) -> Self
    where
        F: Fn(Arc<ReconciledWindow>) + Send + Sync + 'static,
    {
        self.on_update = Some(Box::new(f));
        self
    }

    /// Called with every feed failure.
    #[must_use]
    pub fn on_error<F>(mut self, f: F) -> Self
    where
        F: Fn(&AquaError) + Send + Sync + 'static,
    {
        self.on_error = Some(Box::new(f));
        self
    }

    /// Called when the broker goes live (`true`) or degraded (`false`).
    #[must_use]
    pub fn on_connectivity<F>(mut self, f: F) -> Self
    where
        F: Fn(bool) + Send + Sync + 'static,
    {
        self.on_connectivity = Some(Box::new(f));
        self
    }

    /// Override the broker's replay-on-join setting for this consumer.
    #[must_use]
    pub const fn replay_on_join(mut self, replay: Option<bool>) -> Self {
        self.replay_on_join = replay;
        self
    }

    /// Finish the consumer.
    ///
    /// # Errors
    /// Returns `InvalidArg` if no update callback was supplied.
    pub fn build(self) -> Result<Consumer, AquaError> {
        let on_update = self
            .on_update
            .ok_or_else(|| AquaError::invalid_arg("consumer requires an on_update callback"))?;
        Ok(Consumer {
            name: self.name,
            on_update,
            on_error: self.on_error,
            on_connectivity: self.on_connectivity,
            replay_on_join: self.replay_on_join,
        })
    }
}

/// What a single delivery carries.
#[derive(Debug, Clone)]
pub enum Delivery {
    Update { seq: u64, window: Arc<ReconciledWindow> },
    Error(AquaError),
    Connectivity { epoch: u64, up: bool },
}

/// A registered consumer.
#[derive(Debug)]
pub struct ConsumerSlot {
    pub(crate) id: u64,
    active: AtomicBool,
    /// Highest broadcast sequence delivered; guards replay against a racing broadcast.
    delivered: AtomicU64,
    /// Newest connectivity epoch delivered; a stale replay never overrides a newer announcement.
    announced: AtomicU64,
    consumer: Consumer,
}

impl ConsumerSlot {
    pub(crate) const fn new(id: u64, consumer: Consumer) -> Self {
        Self {
            id,
            active: AtomicBool::new(true),
            delivered: AtomicU64::new(0),
            announced: AtomicU64::new(0),
            consumer,
        }
    }

    pub(crate) fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Returns `true` only for the call that flipped the slot inactive.
    pub(crate) fn deactivate(&self) -> bool {
        self.active.swap(false, Ordering::AcqRel)
    }

    /// Invoke the matching callback, if the consumer registered one.
    ///
    /// A window or connectivity change is delivered at most once and never
    /// after a newer one.
    pub(crate) fn invoke(&self, delivery: &Delivery) {
        match delivery {
            Delivery::Update { seq, window } => {
                if self.delivered.fetch_max(*seq, Ordering::AcqRel) < *seq {
                    (self.consumer.on_update)(Arc::clone(window));
                }
            }
            Delivery::Error(e) => {
                if let Some(f) = &self.consumer.on_error {
                    f(e);
                }
            }
            Delivery::Connectivity { epoch, up } => {
                if self.announced.fetch_max(*epoch, Ordering::AcqRel) < *epoch
                    && let Some(f) = &self.consumer.on_connectivity
                {
                    f(*up);
                }
            }
        }
    }

    #[cfg_attr(not(feature = "tracing"), allow(dead_code))]
    pub(crate) fn name(&self) -> Option<&str> {
        self.consumer.name()
    }
}
