//! # Integration Flows
//!
//! Each module wires real subsystem implementations together; only chain
//! transports are mocked.

pub mod bus_flows;
pub mod confirmation_flows;
pub mod signing_flows;
pub mod watcher_flows;

use shared_types::{CandidateEvent, ChainId, ChainLog, EventId, EventKind};

/// Candidate deposit `id` on `chain` observed at `height`.
pub fn deposit(chain: &str, id: &str, height: u64) -> CandidateEvent {
    CandidateEvent::new(
        ChainId::new(chain),
        EventId::new(id),
        height,
        EventKind::Deposit,
        id.as_bytes().to_vec(),
    )
}

/// Deposit log whose tx hash is `[tag; 32]`.
pub fn deposit_log(tag: u8) -> ChainLog {
    ChainLog {
        tx_hash: [tag; 32],
        index: 0,
        kind: EventKind::Deposit,
        data: vec![tag],
    }
}
