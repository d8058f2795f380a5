//! Driving Ports (API - Inbound)
//!
//! What chain watchers call to feed a chain's confirmation pipeline.

use async_trait::async_trait;
use shared_types::{BlockHeight, CandidateEvent, ChainId, ConfirmedEvent};

/// Primary confirmation API, one instance per chain.
///
/// Every method is serialized per chain; promoted events are already
/// published when a call returns.
#[async_trait]
pub trait ConfirmationSink: Send + Sync {
    /// Chain this sink tracks.
    fn chain_id(&self) -> &ChainId;

    /// Observe all candidate events of the block at `height`, then advance the
    /// tip to `height`.
    ///
    /// Returns the events promoted by this call, in delivery order.
    async fn observe_block(
        &self,
        height: BlockHeight,
        events: Vec<CandidateEvent>,
    ) -> Vec<ConfirmedEvent>;

    /// Advance the tip without new events.
    async fn advance_height(&self, height: BlockHeight) -> Vec<ConfirmedEvent>;

    /// Drop pending events at or above `orphaned_height` after a reorg.
    async fn discard(&self, orphaned_height: BlockHeight) -> Vec<CandidateEvent>;

    /// Latest height the tracker has seen.
    async fn latest_height(&self) -> Option<BlockHeight>;
}
