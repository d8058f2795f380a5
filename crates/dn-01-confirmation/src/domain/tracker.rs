//! Per-chain confirmation tracker
//!
//! Pure, synchronous state machine. Callers serialize access (see
//! `ConfirmationPipeline`).

use super::record::ConfirmationRecord;
use shared_bus::DeliveredWindow;
use shared_types::{BlockHeight, CandidateEvent, ChainId, ConfirmedEvent, EventId};
use std::collections::HashMap;
use tracing::{debug, warn};

/// Result of `ConfirmationTracker::observe`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ObserveOutcome {
    /// New pending record with depth 1.
    Inserted,
    /// Already pending; no-op.
    AlreadyPending,
    /// Already confirmed; no-op.
    AlreadyConfirmed,
    /// Below the retention floor of confirmed ids; rejected.
    Stale,
    /// Event belongs to another chain; rejected.
    ForeignChain,
    /// Observed below a height that already had events promoted; rejected
    /// so deliveries stay in non-decreasing height order.
    BehindPromoted,
}

impl ObserveOutcome {
    /// Whether a new record was created.
    pub fn is_inserted(&self) -> bool {
        matches!(self, ObserveOutcome::Inserted)
    }
}

/// Tracks pending events of one chain until they reach `required_depth`.
#[derive(Debug)]
pub struct ConfirmationTracker {
    chain: ChainId,
    required_depth: u64,
    /// Confirmed ids are remembered this many heights below `latest_height`.
    retention_blocks: u64,
    latest_height: Option<BlockHeight>,
    pending: HashMap<EventId, ConfirmationRecord>,
    /// Confirmed ids keyed by observed height.
    confirmed: DeliveredWindow,
    /// Highest observed height of any promoted event.
    highest_promoted: Option<BlockHeight>,
    next_order: u64,
}

impl ConfirmationTracker {
    pub fn new(chain: ChainId, required_depth: u64, retention_blocks: u64) -> Self {
        Self {
            chain,
            required_depth,
            retention_blocks,
            latest_height: None,
            pending: HashMap::new(),
            confirmed: DeliveredWindow::new(retention_blocks),
            highest_promoted: None,
            next_order: 0,
        }
    }

    /// Start tracking a candidate event.
    pub fn observe(&mut self, event: CandidateEvent) -> ObserveOutcome {
        if event.chain != self.chain {
            warn!(
                expected = %self.chain,
                key = %event.key(),
                "[dn-01] Event from foreign chain rejected"
            );
            return ObserveOutcome::ForeignChain;
        }

        if self.pending.contains_key(&event.id) {
            return ObserveOutcome::AlreadyPending;
        }
        if self.confirmed.contains(&event.id) {
            return ObserveOutcome::AlreadyConfirmed;
        }
        if let Some(floor) = self.retention_floor() {
            if event.observed_height < floor {
                debug!(
                    key = %event.key(),
                    height = event.observed_height,
                    floor,
                    "[dn-01] Stale event rejected"
                );
                return ObserveOutcome::Stale;
            }
        }
        if let Some(promoted) = self.highest_promoted {
            if event.observed_height < promoted {
                warn!(
                    key = %event.key(),
                    height = event.observed_height,
                    highest_promoted = promoted,
                    "[dn-01] Late event below promoted height rejected"
                );
                return ObserveOutcome::BehindPromoted;
            }
        }

        let order = self.next_order;
        self.next_order += 1;

        let id = event.id.clone();
        self.pending
            .insert(id, ConfirmationRecord::new(event, self.required_depth, order));
        ObserveOutcome::Inserted
    }

    /// Move the chain tip to `new_height` and promote every record that now
    /// meets the required depth.
    ///
    /// Returned events are ordered by ascending observed height, ties broken
    /// by observation order. The tip never moves backwards here; use
    /// `discard` for reorgs.
    ///
    /// # Panics
    ///
    /// If an event would be confirmed a second time.
    pub fn advance_height(&mut self, new_height: BlockHeight) -> Vec<ConfirmedEvent> {
        let latest = match self.latest_height {
            Some(current) if current > new_height => {
                debug!(
                    chain = %self.chain,
                    current,
                    new_height,
                    "[dn-01] Ignoring height regression outside discard"
                );
                current
            }
            _ => new_height,
        };
        self.latest_height = Some(latest);

        let mut ready: Vec<EventId> = Vec::new();
        for (id, record) in self.pending.iter_mut() {
            record.update_depth(latest);
            if record.is_confirmed() {
                ready.push(id.clone());
            }
        }

        let mut promoted: Vec<ConfirmationRecord> = ready
            .iter()
            .filter_map(|id| self.pending.remove(id))
            .collect();
        promoted.sort_by_key(|r| (r.observed_height, r.order));
        if let Some(last) = promoted.last() {
            self.highest_promoted = self.highest_promoted.max(Some(last.observed_height));
        }

        promoted
            .into_iter()
            .map(|record| {
                let inserted = self
                    .confirmed
                    .insert(record.event.id.clone(), record.observed_height);
                assert!(
                    inserted,
                    "event {} on {} confirmed twice",
                    record.event.id, self.chain
                );
                ConfirmedEvent {
                    event: record.event,
                    confirmed_at: latest,
                }
            })
            .collect()
    }

    /// Drop every pending record observed at or above `orphaned_height` and
    /// rewind the latest height to `orphaned_height - 1`.
    ///
    /// Confirmed events are never retracted.
    pub fn discard(&mut self, orphaned_height: BlockHeight) -> Vec<CandidateEvent> {
        let mut orphaned: Vec<ConfirmationRecord> = Vec::new();
        self.pending.retain(|_, record| {
            if record.observed_height >= orphaned_height {
                orphaned.push(record.clone());
                false
            } else {
                true
            }
        });
        orphaned.sort_by_key(|r| (r.observed_height, r.order));

        let rewound = orphaned_height.checked_sub(1);
        self.latest_height = match (self.latest_height, rewound) {
            (Some(latest), Some(rewound)) => Some(latest.min(rewound)),
            (Some(_), None) => None,
            (None, _) => None,
        };

        if !orphaned.is_empty() {
            warn!(
                chain = %self.chain,
                from_height = orphaned_height,
                count = orphaned.len(),
                "[dn-01] Discarded pending events after reorg"
            );
        }

        orphaned.into_iter().map(|r| r.event).collect()
    }

    /// Lowest observed height still accepted.
    fn retention_floor(&self) -> Option<BlockHeight> {
        self.latest_height
            .map(|latest| latest.saturating_sub(self.retention_blocks))
            .filter(|floor| *floor > 0)
    }

    pub fn chain(&self) -> &ChainId {
        &self.chain
    }

    pub fn required_depth(&self) -> u64 {
        self.required_depth
    }

    pub fn latest_height(&self) -> Option<BlockHeight> {
        self.latest_height
    }

    /// Highest observed height among promoted events.
    pub fn highest_promoted(&self) -> Option<BlockHeight> {
        self.highest_promoted
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn confirmed_len(&self) -> usize {
        self.confirmed.len()
    }

    pub fn is_pending(&self, id: &EventId) -> bool {
        self.pending.contains_key(id)
    }

    pub fn is_confirmed(&self, id: &EventId) -> bool {
        self.confirmed.contains(id)
    }

    pub fn record(&self, id: &EventId) -> Option<&ConfirmationRecord> {
        self.pending.get(id)
    }

    /// Pending records in promotion order.
    pub fn pending_snapshot(&self) -> Vec<ConfirmationRecord> {
        let mut records: Vec<ConfirmationRecord> = self.pending.values().cloned().collect();
        records.sort_by_key(|r| (r.observed_height, r.order));
        records
    }
}
