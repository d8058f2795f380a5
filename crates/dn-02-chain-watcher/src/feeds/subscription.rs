//! New-head subscription feed
//!
//! Yields a tip per head notification. When the stream errors or ends, the
//! feed reconnects with exponential backoff and polls the tip at the poll
//! interval until the stream is back, so no block is skipped while
//! disconnected.

use super::{read_tip, ChainFeed, FeedMode, FeedSignal};
use crate::ports::outbound::{ChainClient, HeadStream};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, Instant, Interval, MissedTickBehavior};
use tokio_stream::StreamExt;
use tracing::{info, warn};

/// First reconnect delay.
pub const RECONNECT_BASE_DELAY: Duration = Duration::from_millis(500);

/// Upper bound on the reconnect delay.
pub const RECONNECT_MAX_DELAY: Duration = Duration::from_secs(30);

/// Exponential backoff delay before reconnect attempt number `attempts`
/// (1-based).
pub fn backoff_delay(attempts: u32) -> Duration {
    let shift = attempts.saturating_sub(1).min(16);
    RECONNECT_BASE_DELAY
        .saturating_mul(1u32 << shift)
        .min(RECONNECT_MAX_DELAY)
}

/// Tip feed over `ChainClient::subscribe_new_heads`.
pub struct SubscriptionFeed {
    client: Arc<dyn ChainClient>,
    stream: Option<HeadStream>,
    /// Failed connects since the last successful one.
    attempts: u32,
    next_attempt: Instant,
    /// Read the tip explicitly before the next notification.
    gap_read: bool,
    fallback: Interval,
}

impl SubscriptionFeed {
    /// Subscribe through `client`, polling every `poll_interval` while
    /// disconnected. The first connect happens on the first `next_tip`.
    pub fn new(client: Arc<dyn ChainClient>, poll_interval: Duration) -> Self {
        let mut fallback = interval(poll_interval);
        fallback.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self {
            client,
            stream: None,
            attempts: 0,
            next_attempt: Instant::now(),
            gap_read: false,
            fallback,
        }
    }

    /// Whether the head stream is currently connected.
    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    fn disconnected(&mut self) {
        self.stream = None;
        self.attempts = 0;
        self.next_attempt = Instant::now() + RECONNECT_BASE_DELAY;
        self.fallback.reset();
    }

    async fn try_connect(&mut self) {
        match self.client.subscribe_new_heads().await {
            Ok(stream) => {
                info!(
                    chain = %self.client.chain_id(),
                    "[dn-02] Head subscription established"
                );
                self.stream = Some(stream);
                self.attempts = 0;
                self.gap_read = true;
            }
            Err(err) => {
                self.attempts += 1;
                let delay = backoff_delay(self.attempts);
                self.next_attempt = Instant::now() + delay;
                warn!(
                    chain = %self.client.chain_id(),
                    attempts = self.attempts,
                    retry_in = ?delay,
                    error = %err,
                    "[dn-02] Head subscription failed, polling meanwhile"
                );
            }
        }
    }
}

#[async_trait]
impl ChainFeed for SubscriptionFeed {
    async fn next_tip(&mut self) -> FeedSignal {
        loop {
            if self.stream.is_none() && Instant::now() >= self.next_attempt {
                self.try_connect().await;
            }

            let Some(stream) = self.stream.as_mut() else {
                self.fallback.tick().await;
                return read_tip(self.client.as_ref()).await;
            };

            if self.gap_read {
                self.gap_read = false;
                return read_tip(self.client.as_ref()).await;
            }

            match stream.next().await {
                Some(Ok(height)) => return FeedSignal::Tip(height),
                Some(Err(err)) => {
                    warn!(
                        chain = %self.client.chain_id(),
                        error = %err,
                        "[dn-02] Head subscription errored"
                    );
                    self.disconnected();
                    return FeedSignal::Skipped(err);
                }
                None => {
                    warn!(
                        chain = %self.client.chain_id(),
                        "[dn-02] Head subscription ended"
                    );
                    self.disconnected();
                }
            }
        }
    }

    fn mode(&self) -> FeedMode {
        FeedMode::Subscribe
    }
}
