//! Confirmation record
//!
//! Mutable progress of one pending event, owned by the tracker.

use shared_types::{BlockHeight, CandidateEvent};

/// A pending event and its confirmation progress.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConfirmationRecord {
    pub event: CandidateEvent,
    pub observed_height: BlockHeight,
    pub required_depth: u64,
    pub current_depth: u64,
    /// Insertion order, breaks ties between events at the same height.
    pub(crate) order: u64,
}

impl ConfirmationRecord {
    pub(crate) fn new(event: CandidateEvent, required_depth: u64, order: u64) -> Self {
        Self {
            observed_height: event.observed_height,
            event,
            required_depth,
            current_depth: 1,
            order,
        }
    }

    /// Recompute depth against the chain's latest height.
    ///
    /// A record above the latest height (not yet reached after a rewind) has
    /// depth 0.
    pub(crate) fn update_depth(&mut self, latest_height: BlockHeight) {
        self.current_depth = if latest_height >= self.observed_height {
            latest_height - self.observed_height + 1
        } else {
            0
        };
    }

    /// Check if the record reached its required depth.
    pub fn is_confirmed(&self) -> bool {
        self.current_depth >= self.required_depth
    }
}
