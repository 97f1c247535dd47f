use std::sync::Arc;

use aquasense_core::{AquaError, ReconciledWindow};
use serde::{Deserialize, Serialize};

/// Lifecycle of a broker's single feed subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BrokerState {
    /// No feed subscription.
    #[default]
    Idle,
    /// Subscription requested; nothing broadcast yet.
    Connecting,
    /// At least one snapshot broadcast and the feed is healthy.
    Live,
    /// The feed failed or went empty; the last window is still valid.
    Degraded,
    /// Terminal: consumers dropped and the feed released.
    Closed,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    ConsumerJoined,
    ConsumerLeft,
    /// Re-open a feed that ended or failed to open while consumers remain.
    Reconnect,
    FeedOpened { generation: u64 },
    FeedOpenFailed { generation: u64, error: AquaError },
    Snapshot { generation: u64, window: Arc<ReconciledWindow> },
    FeedError { generation: u64, error: AquaError },
    FeedEnded { generation: u64, error: AquaError },
    Close,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    OpenFeed { generation: u64 },
    ReleaseFeed,
    Broadcast { seq: u64, window: Arc<ReconciledWindow> },
    NotifyError(AquaError),
    /// `epoch` increases with every announcement for the broker's lifetime.
    NotifyConnectivity { epoch: u64, up: bool },
    DropConsumers,
}

#[derive(Debug, Default)]
pub struct BrokerMachine {
    pub state: BrokerState,
    pub consumers: usize,
    /// Incremented on every feed open.
    pub generation: u64,
    /// True while the current generation's session is attached (requested, open, or streaming).
    pub feed_attached: bool,
    pub broadcasts: u64,
    /// Epoch of the latest connectivity announcement; never reset.
    pub announcements: u64,
    pub last_window: Option<(u64, Arc<ReconciledWindow>)>,
}

impl BrokerMachine {
    pub fn handle(self, event: Event) -> (Self, Vec<Action>) {
        if self.state == BrokerState::Closed {
            return (self, Vec::new());
        }
        // feed events only count for the session that is still attached
        if let Some(generation) = event_generation(&event)
            && (generation != self.generation || !self.feed_attached)
        {
            return (self, Vec::new());
        }
        self.transition_for_event(event)
    }

    fn transition_for_event(mut self, event: Event) -> (Self, Vec<Action>) {
        let mut actions = Vec::new();
        match event {
            Event::ConsumerJoined => {
                self.consumers += 1;
                if self.state == BrokerState::Idle {
                    self.state = BrokerState::Connecting;
                    actions.push(self.open());
                }
            }
            Event::ConsumerLeft => {
                self.consumers = self.consumers.saturating_sub(1);
                if self.consumers == 0 && self.state != BrokerState::Idle {
                    self.state = BrokerState::Idle;
                    self.last_window = None;
                    if self.feed_attached {
                        self.feed_attached = false;
                        actions.push(Action::ReleaseFeed);
                    }
                }
            }
            Event::Reconnect => {
                if self.consumers > 0 && !self.feed_attached {
                    actions.push(self.open());
                }
            }
            Event::FeedOpened { .. } => {}
            Event::FeedOpenFailed { error, .. } | Event::FeedEnded { error, .. } => {
                self.feed_attached = false;
                actions.push(Action::ReleaseFeed);
                actions.push(Action::NotifyError(error));
                self.degrade(&mut actions);
            }
            Event::FeedError { error, .. } => {
                actions.push(Action::NotifyError(error));
                self.degrade(&mut actions);
            }
            Event::Snapshot { window, .. } => {
                if window.is_empty() {
                    // nothing to show yet while connecting; a live feed going empty is degraded
                    if self.state == BrokerState::Live {
                        self.degrade(&mut actions);
                    }
                } else {
                    self.broadcasts += 1;
                    self.last_window = Some((self.broadcasts, Arc::clone(&window)));
                    actions.push(Action::Broadcast {
                        seq: self.broadcasts,
                        window,
                    });
                    if self.state != BrokerState::Live {
                        self.state = BrokerState::Live;
                        actions.push(self.announce(true));
                    }
                }
            }
            Event::Close => {
                self.state = BrokerState::Closed;
                self.consumers = 0;
                self.last_window = None;
                actions.push(Action::DropConsumers);
                if self.feed_attached {
                    self.feed_attached = false;
                    actions.push(Action::ReleaseFeed);
                }
            }
        }
        (self, actions)
    }

    fn open(&mut self) -> Action {
        self.generation += 1;
        self.feed_attached = true;
        Action::OpenFeed {
            generation: self.generation,
        }
    }

    /// Enter `Degraded`, announcing the connectivity loss only on entry.
    fn degrade(&mut self, actions: &mut Vec<Action>) {
        if matches!(self.state, BrokerState::Connecting | BrokerState::Live) {
            self.state = BrokerState::Degraded;
            actions.push(self.announce(false));
        }
    }

    fn announce(&mut self, up: bool) -> Action {
        self.announcements += 1;
        Action::NotifyConnectivity {
            epoch: self.announcements,
            up,
        }
    }
}

const fn event_generation(event: &Event) -> Option<u64> {
    match event {
        Event::FeedOpened { generation }
        | Event::FeedOpenFailed { generation, .. }
        | Event::Snapshot { generation, .. }
        | Event::FeedError { generation, .. }
        | Event::FeedEnded { generation, .. } => Some(*generation),
        Event::ConsumerJoined | Event::ConsumerLeft | Event::Reconnect | Event::Close => None,
    }
}
