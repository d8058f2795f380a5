//! # Bus Events
//!
//! What flows through the bus and how consumers select and resume it.

use serde::{Deserialize, Serialize};
use shared_types::{ChainId, ConfirmedEvent, EventKind};
use std::collections::HashMap;

/// A confirmed event stamped with its per-chain sequence number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delivery {
    /// Gap-free, starting at 1, per chain.
    pub seq: u64,
    /// The delivered event.
    pub event: ConfirmedEvent,
}

impl Delivery {
    /// Chain the delivery belongs to.
    #[must_use]
    pub fn chain(&self) -> &ChainId {
        self.event.chain()
    }
}

/// Result of `EventPublisher::publish`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    /// Recorded, sequenced and broadcast.
    Delivered {
        /// Sequence number assigned.
        seq: u64,
        /// Live subscribers at send time.
        receivers: usize,
    },
    /// Already delivered within the window; nothing happened.
    Duplicate,
}

impl PublishOutcome {
    /// Whether the publish was a no-op.
    #[must_use]
    pub fn is_duplicate(&self) -> bool {
        matches!(self, PublishOutcome::Duplicate)
    }

    /// Sequence number, if one was assigned.
    #[must_use]
    pub fn seq(&self) -> Option<u64> {
        match self {
            PublishOutcome::Delivered { seq, .. } => Some(*seq),
            PublishOutcome::Duplicate => None,
        }
    }
}

/// Filter for subscribing to specific deliveries.
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    /// Chains to include. Empty means all chains.
    pub chains: Vec<ChainId>,
    /// Event kinds to include. Empty means all kinds.
    pub kinds: Vec<EventKind>,
}

impl EventFilter {
    /// Create a filter that accepts all events.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Create a filter for specific chains.
    #[must_use]
    pub fn chains(chains: Vec<ChainId>) -> Self {
        Self {
            chains,
            kinds: Vec::new(),
        }
    }

    /// Create a filter for specific event kinds.
    #[must_use]
    pub fn kinds(kinds: Vec<EventKind>) -> Self {
        Self {
            chains: Vec::new(),
            kinds,
        }
    }

    /// Check if a chain is selected by this filter.
    #[must_use]
    pub fn matches_chain(&self, chain: &ChainId) -> bool {
        self.chains.is_empty() || self.chains.contains(chain)
    }

    /// Check if an event matches this filter.
    #[must_use]
    pub fn matches(&self, event: &ConfirmedEvent) -> bool {
        let kind_match = self.kinds.is_empty() || self.kinds.contains(&event.event.kind);
        self.matches_chain(event.chain()) && kind_match
    }
}

/// Last sequence number a consumer has seen, per chain.
///
/// Serializable so consumers can persist it and resume with
/// `subscribe_from` after a restart or reconnect.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cursor {
    positions: HashMap<ChainId, u64>,
}

impl Cursor {
    /// A cursor positioned before every delivery.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Last seen sequence for `chain` (0 if none).
    #[must_use]
    pub fn position(&self, chain: &ChainId) -> u64 {
        self.positions.get(chain).copied().unwrap_or(0)
    }

    /// Move `chain` forward to `seq`. Never moves backwards.
    pub fn advance(&mut self, chain: &ChainId, seq: u64) {
        let pos = self.positions.entry(chain.clone()).or_insert(0);
        *pos = (*pos).max(seq);
    }
}
