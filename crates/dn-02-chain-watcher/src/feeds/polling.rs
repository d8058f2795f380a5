//! Interval polling feed
//!
//! Reads the tip height once per tick. A failed read skips that tick only.

use super::{read_tip, ChainFeed, FeedMode, FeedSignal};
use crate::ports::outbound::ChainClient;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, Interval, MissedTickBehavior};

/// Tip feed driven by a `tokio::time::interval`.
pub struct PollingFeed {
    client: Arc<dyn ChainClient>,
    ticker: Interval,
}

impl PollingFeed {
    /// Poll `client` every `poll_interval`. The first tick fires immediately.
    pub fn new(client: Arc<dyn ChainClient>, poll_interval: Duration) -> Self {
        let mut ticker = interval(poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self { client, ticker }
    }
}

#[async_trait]
impl ChainFeed for PollingFeed {
    async fn next_tip(&mut self) -> FeedSignal {
        self.ticker.tick().await;
        read_tip(self.client.as_ref()).await
    }

    fn mode(&self) -> FeedMode {
        FeedMode::Poll
    }
}
