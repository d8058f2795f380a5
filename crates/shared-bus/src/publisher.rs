//! # Event Publisher
//!
//! Defines the publishing side of the event bus.

use crate::delivered_window::DeliveredWindow;
use crate::events::{Cursor, Delivery, EventFilter, PublishOutcome};
use crate::subscriber::{EventStream, EventSubscriber, Subscription};
use crate::BusConfig;
use async_trait::async_trait;
use parking_lot::Mutex;
use shared_types::{ChainId, ConfirmedEvent};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// Trait for publishing confirmed events to the bus.
///
/// The confirmation pipelines call this once per promoted event.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publish a confirmed event.
    ///
    /// Returns `Duplicate` without side effects if the event's id was already
    /// delivered for its chain within the dedup window.
    async fn publish(&self, event: ConfirmedEvent) -> PublishOutcome;

    /// Total events delivered (duplicates excluded).
    fn events_published(&self) -> u64;
}

/// Per-chain delivery bookkeeping.
#[derive(Debug)]
pub(crate) struct ChainLedger {
    next_seq: u64,
    delivered: DeliveredWindow,
    pub(crate) replay: VecDeque<Delivery>,
}

impl ChainLedger {
    fn new(dedup_window_blocks: u64) -> Self {
        Self {
            next_seq: 1,
            delivered: DeliveredWindow::new(dedup_window_blocks),
            replay: VecDeque::new(),
        }
    }

    pub(crate) fn last_seq(&self) -> u64 {
        self.next_seq - 1
    }

    /// Deliveries after `after_seq`, plus the first missing sequence if the
    /// buffer no longer reaches back that far.
    pub(crate) fn replay_after(&self, after_seq: u64) -> (Vec<Delivery>, Option<u64>) {
        let pending: Vec<Delivery> = self
            .replay
            .iter()
            .filter(|d| d.seq > after_seq)
            .cloned()
            .collect();

        let gap = match pending.first() {
            Some(first) if first.seq > after_seq + 1 => Some(after_seq + 1),
            None if self.last_seq() > after_seq => Some(after_seq + 1),
            _ => None,
        };

        (pending, gap)
    }
}

/// State shared between the bus and its subscriptions.
#[derive(Debug)]
pub(crate) struct BusState {
    /// `None` once the bus is closed.
    pub(crate) sender: Option<broadcast::Sender<Delivery>>,
    pub(crate) chains: HashMap<ChainId, ChainLedger>,
}

impl BusState {
    /// Receiver for a new subscription, already closed if the bus is.
    pub(crate) fn receiver(&self) -> broadcast::Receiver<Delivery> {
        match &self.sender {
            Some(sender) => sender.subscribe(),
            None => {
                let (sender, receiver) = broadcast::channel(1);
                drop(sender);
                receiver
            }
        }
    }

    /// Current position of every chain, for live-only subscriptions.
    pub(crate) fn head_cursor(&self) -> Cursor {
        let mut cursor = Cursor::new();
        for (chain, ledger) in &self.chains {
            cursor.advance(chain, ledger.last_seq());
        }
        cursor
    }
}

/// In-memory implementation of the event bus.
///
/// Uses `tokio::sync::broadcast` for multi-producer, multi-consumer delivery.
/// Sequencing and broadcast happen under one lock so every subscriber sees a
/// chain's deliveries in sequence order.
pub struct InMemoryEventBus {
    state: Arc<Mutex<BusState>>,

    /// Total events delivered.
    events_published: AtomicU64,

    config: BusConfig,
}

impl InMemoryEventBus {
    /// Create a new in-memory event bus with default sizing.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(BusConfig::default())
    }

    /// Create a new in-memory event bus with specified channel capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_config(BusConfig {
            channel_capacity: capacity,
            ..BusConfig::default()
        })
    }

    /// Create a new in-memory event bus.
    #[must_use]
    pub fn with_config(config: BusConfig) -> Self {
        let (sender, _) = broadcast::channel(config.channel_capacity.max(1));
        Self {
            state: Arc::new(Mutex::new(BusState {
                sender: Some(sender),
                chains: HashMap::new(),
            })),
            events_published: AtomicU64::new(0),
            config,
        }
    }

    /// Subscribe to live deliveries matching a filter.
    #[must_use]
    pub fn subscribe(&self, filter: EventFilter) -> Subscription {
        let state = self.state.lock();
        let receiver = state.receiver();
        let cursor = state.head_cursor();
        drop(state);

        debug!(chains = ?filter.chains, "New subscription created");
        Subscription::new(receiver, filter, cursor, VecDeque::new(), self.state.clone())
    }

    /// Subscribe starting after `cursor`.
    ///
    /// Deliveries still in the replay buffer are yielded first, then live ones.
    /// If the buffer no longer reaches back to the cursor, the gap is logged and
    /// delivery resumes from the oldest retained entry.
    #[must_use]
    pub fn subscribe_from(&self, filter: EventFilter, cursor: Cursor) -> Subscription {
        let state = self.state.lock();
        let receiver = state.receiver();

        let mut backlog = VecDeque::new();
        for (chain, ledger) in &state.chains {
            if !filter.matches_chain(chain) {
                continue;
            }
            let (pending, gap) = ledger.replay_after(cursor.position(chain));
            if let Some(from) = gap {
                warn!(chain = %chain, from, "Replay buffer no longer holds requested deliveries");
            }
            backlog.extend(pending);
        }
        drop(state);

        debug!(
            chains = ?filter.chains,
            replayed = backlog.len(),
            "Resumed subscription"
        );
        Subscription::new(receiver, filter, cursor, backlog, self.state.clone())
    }

    /// Get a stream of deliveries matching a filter.
    #[must_use]
    pub fn event_stream(&self, filter: EventFilter) -> EventStream {
        EventStream::new(self.subscribe(filter))
    }

    /// Close the bus.
    ///
    /// Subscribers drain what is already buffered, then `recv()` returns `None`.
    /// Later publishes are still recorded for replay but reach no one live.
    pub fn close(&self) {
        if self.state.lock().sender.take().is_some() {
            info!("Event bus closed");
        }
    }

    /// Check if `close()` was called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.state.lock().sender.is_none()
    }

    /// Get the number of active subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.state
            .lock()
            .sender
            .as_ref()
            .map_or(0, broadcast::Sender::receiver_count)
    }

    /// Last sequence number assigned for `chain` (0 if none).
    #[must_use]
    pub fn last_seq(&self, chain: &ChainId) -> u64 {
        self.state
            .lock()
            .chains
            .get(chain)
            .map_or(0, ChainLedger::last_seq)
    }

    /// Number of ids in the delivered window of `chain`.
    #[must_use]
    pub fn delivered_len(&self, chain: &ChainId) -> usize {
        self.state
            .lock()
            .chains
            .get(chain)
            .map_or(0, |ledger| ledger.delivered.len())
    }

    /// Get the bus sizing.
    #[must_use]
    pub fn config(&self) -> &BusConfig {
        &self.config
    }

    /// Get the channel capacity.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.config.channel_capacity
    }
}

impl Default for InMemoryEventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventPublisher for InMemoryEventBus {
    async fn publish(&self, event: ConfirmedEvent) -> PublishOutcome {
        let mut state = self.state.lock();
        let dedup_window = self.config.dedup_window_blocks;
        let ledger = state
            .chains
            .entry(event.chain().clone())
            .or_insert_with(|| ChainLedger::new(dedup_window));

        if !ledger.delivered.insert(event.id().clone(), event.confirmed_at) {
            debug!(key = %event.key(), "Duplicate delivery suppressed");
            return PublishOutcome::Duplicate;
        }

        let seq = ledger.next_seq;
        ledger.next_seq += 1;

        let delivery = Delivery {
            seq,
            event: event.clone(),
        };
        ledger.replay.push_back(delivery.clone());
        while ledger.replay.len() > self.config.replay_buffer {
            ledger.replay.pop_front();
        }

        self.events_published.fetch_add(1, Ordering::Relaxed);

        let receivers = match &state.sender {
            Some(sender) => sender.send(delivery).unwrap_or(0),
            None => 0,
        };

        debug!(
            key = %event.key(),
            seq,
            receivers,
            "Event published"
        );

        PublishOutcome::Delivered { seq, receivers }
    }

    fn events_published(&self) -> u64 {
        self.events_published.load(Ordering::Relaxed)
    }
}

impl EventSubscriber for InMemoryEventBus {
    fn subscribe(&self, filter: EventFilter) -> Subscription {
        InMemoryEventBus::subscribe(self, filter)
    }

    fn subscribe_from(&self, filter: EventFilter, cursor: Cursor) -> Subscription {
        InMemoryEventBus::subscribe_from(self, filter, cursor)
    }
}
