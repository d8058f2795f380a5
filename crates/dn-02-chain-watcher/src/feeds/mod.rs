//! # Chain Feeds
//!
//! A feed tells the watcher how far the chain has grown. Polling and
//! subscription chains differ only here; the watcher consumes both the same
//! way.

mod polling;
mod subscription;

pub use polling::PollingFeed;
pub use subscription::{backoff_delay, SubscriptionFeed, RECONNECT_BASE_DELAY, RECONNECT_MAX_DELAY};

use crate::ports::outbound::ChainClient;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use shared_types::{BlockHeight, ChainError};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// What a feed produced on one call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedSignal {
    /// The chain tip is at this height.
    Tip(BlockHeight),
    /// This cycle failed; the watcher waits for the next one.
    Skipped(ChainError),
}

/// Source of chain tip signals.
///
/// `next_tip` must be cancel-safe: the watcher drops it on shutdown.
#[async_trait]
pub trait ChainFeed: Send {
    /// Wait for the next tip signal.
    async fn next_tip(&mut self) -> FeedSignal;

    /// Access model, for logs.
    fn mode(&self) -> FeedMode;
}

/// How a chain is accessed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedMode {
    /// Interval polling of the tip height.
    Poll,
    /// Native new-head subscription.
    Subscribe,
}

impl fmt::Display for FeedMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeedMode::Poll => f.write_str("poll"),
            FeedMode::Subscribe => f.write_str("subscribe"),
        }
    }
}

/// Build the feed for `mode`.
///
/// A subscription requested on a client without push support falls back to
/// polling.
pub fn build_feed(
    mode: FeedMode,
    client: Arc<dyn ChainClient>,
    poll_interval: Duration,
) -> Box<dyn ChainFeed> {
    match mode {
        FeedMode::Subscribe if client.supports_subscription() => {
            Box::new(SubscriptionFeed::new(client, poll_interval))
        }
        FeedMode::Subscribe => {
            warn!(
                chain = %client.chain_id(),
                "[dn-02] Subscription unsupported, falling back to polling"
            );
            Box::new(PollingFeed::new(client, poll_interval))
        }
        FeedMode::Poll => Box::new(PollingFeed::new(client, poll_interval)),
    }
}

/// Explicit tip read shared by both feeds.
pub(crate) async fn read_tip(client: &dyn ChainClient) -> FeedSignal {
    match client.current_height().await {
        Ok(height) => FeedSignal::Tip(height),
        Err(err) => FeedSignal::Skipped(err),
    }
}
