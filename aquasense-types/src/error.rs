use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Unified error type for the aquasense workspace.
///
/// Parse defects and resolution gaps never surface here; they are recovered
/// locally by default substitution. This type covers feed failures and
/// contract violations at the public API boundary.
#[derive(Debug, Error, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum AquaError {
    /// Invalid input argument or a violated API contract.
    #[error("invalid argument: {0}")]
    InvalidArg(String),

    /// The snapshot feed reported a failure.
    #[error("{feed} failed: {msg}")]
    Feed {
        /// Feed name that failed.
        feed: String,
        /// Human-readable error message.
        msg: String,
    },

    /// The snapshot feed stopped delivering events and closed its channel.
    #[error("{feed} closed the snapshot subscription")]
    FeedClosed {
        /// Feed name whose subscription ended.
        feed: String,
    },

    /// A snapshot could not be interpreted as a list of records.
    #[error("malformed snapshot: {0}")]
    MalformedSnapshot(String),

    /// The broker has been closed and accepts no further consumers.
    #[error("broker is closed")]
    BrokerClosed,

    /// Unknown/opaque error.
    #[error("unknown error: {0}")]
    Other(String),
}

impl AquaError {
    /// Helper: build a `Feed` error with the feed name and message.
    pub fn feed(feed: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Feed {
            feed: feed.into(),
            msg: msg.into(),
        }
    }

    /// Helper: build a `FeedClosed` error for the given feed name.
    pub fn feed_closed(feed: impl Into<String>) -> Self {
        Self::FeedClosed { feed: feed.into() }
    }

    /// Helper: build a `MalformedSnapshot` error.
    pub fn malformed_snapshot(msg: impl Into<String>) -> Self {
        Self::MalformedSnapshot(msg.into())
    }

    /// Helper: build an `InvalidArg` error.
    pub fn invalid_arg(msg: impl Into<String>) -> Self {
        Self::InvalidArg(msg.into())
    }

    /// Returns true if the application can recover by subscribing again.
    ///
    /// Feed-side failures are transient from the broker's point of view;
    /// contract violations and a closed broker are not.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        match self {
            Self::Feed { .. } | Self::FeedClosed { .. } | Self::MalformedSnapshot(_) => true,
            Self::InvalidArg(_) | Self::BrokerClosed | Self::Other(_) => false,
        }
    }
}
