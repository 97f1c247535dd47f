//! In-memory snapshot feed for CI-safe tests and examples.
//!
//! [`MockFeed`] is driven by a [`MockFeedController`]: tests can seed an
//! in-memory store, push snapshots or errors into the open session, end the
//! session remotely, and inspect how often the feed was opened and released.
#![warn(missing_docs)]

mod dynamic;
pub mod fixtures;

pub use dynamic::{DEFAULT_PATH, FeedBehavior, MockFeed, MockFeedController};
