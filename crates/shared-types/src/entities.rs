//! # Core Domain Entities
//!
//! Chain-facing entities observed by the watchers and the events that flow
//! from the confirmation tracker to the event bus.
//!
//! ## Clusters
//!
//! - **Chain data**: `ChainBlock`, `ChainLog` as returned by a chain client
//! - **Events**: `CandidateEvent`, `ConfirmedEvent`, `EventKey`
//! - **Identity**: `ChainId`, `EventId`

use serde::{Deserialize, Serialize};
use std::fmt;

// =============================================================================
// IDENTITY
// =============================================================================

/// Height of a block within its chain.
pub type BlockHeight = u64;

/// A 32-byte block or transaction hash.
pub type BlockHash = [u8; 32];

/// Opaque identifier of a watched chain (e.g. `bitcoin`, `spectrum`).
///
/// Used as the namespace for every event key.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChainId(String);

impl ChainId {
    /// Create a chain identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ChainId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Chain-native identifier of an event (txid + output/log index, block id).
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(String);

impl EventId {
    /// Create an event identifier from an arbitrary chain-native string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Identifier of the `index`-th log/output of a transaction: `txid:index`.
    pub fn from_tx(tx_hash: &BlockHash, index: u32) -> Self {
        Self(format!("{}:{}", hex::encode(tx_hash), index))
    }

    /// Identifier of a new-block event: `block:height:hash`.
    pub fn for_block(height: BlockHeight, hash: &BlockHash) -> Self {
        Self(format!("block:{}:{}", height, hex::encode(hash)))
    }

    /// Borrow the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Globally unique key of an event: the event id namespaced by its chain.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EventKey {
    /// Chain the event belongs to.
    pub chain: ChainId,
    /// Chain-native event id.
    pub id: EventId,
}

impl fmt::Display for EventKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.chain, self.id)
    }
}

// =============================================================================
// EVENTS
// =============================================================================

/// Kind of chain event the notary reacts to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// A new block was observed.
    NewBlock,
    /// Funds were locked on this chain for transfer to another.
    Deposit,
    /// Funds were released on this chain.
    Withdrawal,
}

/// An event observed on a chain but not yet confirmed.
///
/// Immutable once created; confirmation progress is held by the tracker.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateEvent {
    /// Chain the event was observed on.
    pub chain: ChainId,
    /// Chain-native identifier.
    pub id: EventId,
    /// Height of the block containing the event.
    pub observed_height: BlockHeight,
    /// What happened.
    pub kind: EventKind,
    /// Opaque chain-specific payload.
    pub payload: Vec<u8>,
}

impl CandidateEvent {
    /// Create a candidate event.
    pub fn new(
        chain: ChainId,
        id: EventId,
        observed_height: BlockHeight,
        kind: EventKind,
        payload: Vec<u8>,
    ) -> Self {
        Self {
            chain,
            id,
            observed_height,
            kind,
            payload,
        }
    }

    /// Key under which the event is tracked and de-duplicated.
    pub fn key(&self) -> EventKey {
        EventKey {
            chain: self.chain.clone(),
            id: self.id.clone(),
        }
    }
}

/// A candidate event that reached its chain's required confirmation depth.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmedEvent {
    /// The confirmed event.
    pub event: CandidateEvent,
    /// Chain height at which the required depth was reached.
    pub confirmed_at: BlockHeight,
}

impl ConfirmedEvent {
    /// Chain the event belongs to.
    pub fn chain(&self) -> &ChainId {
        &self.event.chain
    }

    /// Chain-native event id.
    pub fn id(&self) -> &EventId {
        &self.event.id
    }

    /// Height at which the event was first observed.
    pub fn observed_height(&self) -> BlockHeight {
        self.event.observed_height
    }

    /// De-duplication key.
    pub fn key(&self) -> EventKey {
        self.event.key()
    }
}

// =============================================================================
// CHAIN DATA
// =============================================================================

/// A log entry (or transaction output) relevant to the notary.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainLog {
    /// Hash of the transaction that produced the log.
    pub tx_hash: BlockHash,
    /// Log index (or output index) within the transaction.
    pub index: u32,
    /// Event kind decoded by the transport.
    pub kind: EventKind,
    /// Raw log data.
    pub data: Vec<u8>,
}

/// A block as returned by a chain client.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainBlock {
    /// Block height.
    pub height: BlockHeight,
    /// Block hash.
    pub hash: BlockHash,
    /// Hash of the parent block.
    pub parent_hash: BlockHash,
    /// Logs the notary cares about, in block order.
    pub logs: Vec<ChainLog>,
}

impl ChainBlock {
    /// Extract candidate events from this block.
    ///
    /// One event per log, preceded by a `NewBlock` event when
    /// `emit_new_block` is set.
    pub fn candidate_events(&self, chain: &ChainId, emit_new_block: bool) -> Vec<CandidateEvent> {
        let mut events = Vec::with_capacity(self.logs.len() + usize::from(emit_new_block));

        if emit_new_block {
            events.push(CandidateEvent::new(
                chain.clone(),
                EventId::for_block(self.height, &self.hash),
                self.height,
                EventKind::NewBlock,
                self.hash.to_vec(),
            ));
        }

        events.extend(self.logs.iter().map(|log| {
            CandidateEvent::new(
                chain.clone(),
                EventId::from_tx(&log.tx_hash, log.index),
                self.height,
                log.kind,
                log.data.clone(),
            )
        }));

        events
    }
}
