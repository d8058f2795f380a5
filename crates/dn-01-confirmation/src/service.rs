//! Confirmation Pipeline - single-writer wrapper around the tracker
//!
//! Serializes observe/advance/discard for one chain and publishes promoted
//! events to the bus while still holding the lock.

use crate::domain::{ConfirmationRecord, ConfirmationTracker, ObserveOutcome};
use crate::ports::inbound::ConfirmationSink;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use shared_bus::{EventPublisher, PublishOutcome};
use shared_types::{BlockHeight, CandidateEvent, ChainId, ConfirmedEvent};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Heights of confirmed ids remembered below the tip.
pub const DEFAULT_RETENTION_BLOCKS: u64 = 1024;

/// Confirmation configuration for one chain
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmationConfig {
    pub chain: ChainId,
    /// Blocks (including the event's own) required before promotion
    pub required_depth: u64,
    /// Retention of confirmed ids, in heights below the tip
    pub retention_blocks: u64,
}

impl ConfirmationConfig {
    pub fn new(chain: ChainId, required_depth: u64) -> Self {
        Self {
            chain,
            required_depth,
            retention_blocks: DEFAULT_RETENTION_BLOCKS,
        }
    }
}

/// Confirmation pipeline for one chain.
pub struct ConfirmationPipeline {
    chain: ChainId,
    tracker: Mutex<ConfirmationTracker>,
    publisher: Arc<dyn EventPublisher>,
}

impl ConfirmationPipeline {
    pub fn new(config: ConfirmationConfig, publisher: Arc<dyn EventPublisher>) -> Self {
        let tracker = ConfirmationTracker::new(
            config.chain.clone(),
            config.required_depth,
            config.retention_blocks,
        );
        Self {
            chain: config.chain,
            tracker: Mutex::new(tracker),
            publisher,
        }
    }

    /// Observe a single event.
    pub async fn observe(&self, event: CandidateEvent) -> ObserveOutcome {
        self.tracker.lock().await.observe(event)
    }

    pub async fn pending_len(&self) -> usize {
        self.tracker.lock().await.pending_len()
    }

    pub async fn confirmed_len(&self) -> usize {
        self.tracker.lock().await.confirmed_len()
    }

    pub async fn required_depth(&self) -> u64 {
        self.tracker.lock().await.required_depth()
    }

    /// Pending records in promotion order.
    pub async fn snapshot(&self) -> Vec<ConfirmationRecord> {
        self.tracker.lock().await.pending_snapshot()
    }

    async fn publish_all(&self, confirmed: &[ConfirmedEvent]) {
        for event in confirmed {
            let outcome = self.publisher.publish(event.clone()).await;
            match outcome {
                PublishOutcome::Delivered { seq, receivers } => info!(
                    key = %event.key(),
                    observed_height = event.observed_height(),
                    confirmed_at = event.confirmed_at,
                    seq,
                    receivers,
                    "[dn-01] Event confirmed"
                ),
                PublishOutcome::Duplicate => debug!(
                    key = %event.key(),
                    "[dn-01] Bus already delivered event"
                ),
            }
        }
    }
}

#[async_trait]
impl ConfirmationSink for ConfirmationPipeline {
    fn chain_id(&self) -> &ChainId {
        &self.chain
    }

    async fn observe_block(
        &self,
        height: BlockHeight,
        events: Vec<CandidateEvent>,
    ) -> Vec<ConfirmedEvent> {
        let mut tracker = self.tracker.lock().await;

        let mut inserted = 0usize;
        for event in events {
            if tracker.observe(event).is_inserted() {
                inserted += 1;
            }
        }
        if inserted > 0 {
            debug!(chain = %self.chain, height, inserted, "[dn-01] Observed events");
        }

        let confirmed = tracker.advance_height(height);
        self.publish_all(&confirmed).await;
        confirmed
    }

    async fn advance_height(&self, height: BlockHeight) -> Vec<ConfirmedEvent> {
        let mut tracker = self.tracker.lock().await;
        let confirmed = tracker.advance_height(height);
        self.publish_all(&confirmed).await;
        confirmed
    }

    async fn discard(&self, orphaned_height: BlockHeight) -> Vec<CandidateEvent> {
        self.tracker.lock().await.discard(orphaned_height)
    }

    async fn latest_height(&self) -> Option<BlockHeight> {
        self.tracker.lock().await.latest_height()
    }
}
