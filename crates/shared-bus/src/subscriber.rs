//! # Event Subscriber
//!
//! Defines the subscription side of the event bus.

use crate::events::{Cursor, Delivery, EventFilter};
use crate::publisher::BusState;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use thiserror::Error;
use tokio::sync::broadcast;
use tokio_stream::Stream;
use tracing::{debug, warn};

/// Errors from subscription operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SubscriptionError {
    /// The event bus was closed.
    #[error("Event bus closed")]
    Closed,
}

/// Trait for subscribing to deliveries from the bus.
pub trait EventSubscriber: Send + Sync {
    /// Subscribe to live deliveries matching a filter.
    fn subscribe(&self, filter: EventFilter) -> Subscription;

    /// Subscribe starting after `cursor`, replaying what is still buffered.
    fn subscribe_from(&self, filter: EventFilter, cursor: Cursor) -> Subscription;
}

/// A subscription handle for receiving deliveries.
///
/// Tracks its own per-chain cursor so deliveries seen through both replay and
/// the live channel are yielded once.
pub struct Subscription {
    /// The broadcast receiver.
    receiver: broadcast::Receiver<Delivery>,

    /// Filter for this subscription.
    filter: EventFilter,

    /// Last sequence yielded per chain.
    cursor: Cursor,

    /// Replayed deliveries not yet yielded.
    backlog: VecDeque<Delivery>,

    /// Bus state, for refilling after a lag.
    state: Arc<Mutex<BusState>>,
}

impl Subscription {
    pub(crate) fn new(
        receiver: broadcast::Receiver<Delivery>,
        filter: EventFilter,
        cursor: Cursor,
        backlog: VecDeque<Delivery>,
        state: Arc<Mutex<BusState>>,
    ) -> Self {
        Self {
            receiver,
            filter,
            cursor,
            backlog,
            state,
        }
    }

    /// Receive the next delivery that matches the filter.
    ///
    /// # Returns
    ///
    /// - `Some(delivery)` - The next matching delivery
    /// - `None` - The bus was closed and everything buffered was drained
    pub async fn recv(&mut self) -> Option<Delivery> {
        loop {
            if let Some(delivery) = self.backlog.pop_front() {
                if self.accept(&delivery) {
                    return Some(delivery);
                }
                continue;
            }

            match self.receiver.recv().await {
                Ok(delivery) => {
                    if self.accept(&delivery) {
                        return Some(delivery);
                    }
                }
                Err(broadcast::error::RecvError::Closed) => return None,
                Err(broadcast::error::RecvError::Lagged(count)) => {
                    debug!(lagged = count, "Subscriber lagged, refilling from replay buffer");
                    self.refill();
                }
            }
        }
    }

    /// Try to receive the next delivery without blocking.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(delivery))` - A delivery was available and matched
    /// - `Ok(None)` - No delivery available (would block)
    /// - `Err(SubscriptionError::Closed)` - The bus was closed and drained
    pub fn try_recv(&mut self) -> Result<Option<Delivery>, SubscriptionError> {
        loop {
            if let Some(delivery) = self.backlog.pop_front() {
                if self.accept(&delivery) {
                    return Ok(Some(delivery));
                }
                continue;
            }

            match self.receiver.try_recv() {
                Ok(delivery) => {
                    if self.accept(&delivery) {
                        return Ok(Some(delivery));
                    }
                }
                Err(broadcast::error::TryRecvError::Empty) => return Ok(None),
                Err(broadcast::error::TryRecvError::Closed) => {
                    return Err(SubscriptionError::Closed)
                }
                Err(broadcast::error::TryRecvError::Lagged(_)) => self.refill(),
            }
        }
    }

    /// Get the filter for this subscription.
    #[must_use]
    pub fn filter(&self) -> &EventFilter {
        &self.filter
    }

    /// Position to pass to `subscribe_from` when reconnecting.
    #[must_use]
    pub fn cursor(&self) -> &Cursor {
        &self.cursor
    }

    /// Advance the cursor and decide whether to yield `delivery`.
    fn accept(&mut self, delivery: &Delivery) -> bool {
        let chain = delivery.chain();
        if !self.filter.matches_chain(chain) || delivery.seq <= self.cursor.position(chain) {
            return false;
        }
        self.cursor.advance(chain, delivery.seq);
        self.filter.matches(&delivery.event)
    }

    /// Pull everything after the cursor back out of the replay buffer.
    fn refill(&mut self) {
        let state = self.state.lock();
        for (chain, ledger) in &state.chains {
            if !self.filter.matches_chain(chain) {
                continue;
            }
            let (pending, gap) = ledger.replay_after(self.cursor.position(chain));
            if let Some(from) = gap {
                warn!(chain = %chain, from, "Lagged past replay buffer, deliveries lost");
            }
            self.backlog.extend(pending);
        }
    }
}

type RecvFuture = Pin<Box<dyn Future<Output = (Option<Delivery>, Subscription)> + Send>>;

enum StreamState {
    Idle(Subscription),
    Waiting(RecvFuture),
    Done,
}

/// A stream wrapper for subscriptions.
///
/// Implements `tokio_stream::Stream` for use with stream combinators.
pub struct EventStream {
    state: StreamState,
}

impl EventStream {
    /// Create a new event stream from a subscription.
    #[must_use]
    pub fn new(subscription: Subscription) -> Self {
        Self {
            state: StreamState::Idle(subscription),
        }
    }
}

impl Stream for EventStream {
    type Item = Delivery;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        loop {
            match std::mem::replace(&mut this.state, StreamState::Done) {
                StreamState::Idle(mut subscription) => {
                    this.state = StreamState::Waiting(Box::pin(async move {
                        let delivery = subscription.recv().await;
                        (delivery, subscription)
                    }));
                }
                StreamState::Waiting(mut fut) => {
                    return match fut.as_mut().poll(cx) {
                        Poll::Ready((Some(delivery), subscription)) => {
                            this.state = StreamState::Idle(subscription);
                            Poll::Ready(Some(delivery))
                        }
                        Poll::Ready((None, _)) => Poll::Ready(None),
                        Poll::Pending => {
                            this.state = StreamState::Waiting(fut);
                            Poll::Pending
                        }
                    };
                }
                StreamState::Done => return Poll::Ready(None),
            }
        }
    }
}
