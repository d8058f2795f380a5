//! Recorded block hashes for reorg detection
//!
//! Keeps a bounded window of `height → hash` for processed blocks and
//! compares newly fetched blocks against it.

use shared_types::{BlockHash, BlockHeight, ChainBlock, ChainError};
use std::collections::BTreeMap;

/// Outcome of checking a fetched block against the window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReorgCheck {
    /// Extends or matches what was recorded.
    Continuous,
    /// The block's parent is not the recorded block at `height`.
    ParentMismatch {
        /// Height of the recorded block that was replaced.
        height: BlockHeight,
    },
    /// A different block now sits at a recorded `height`.
    HashChanged {
        /// Height whose hash changed.
        height: BlockHeight,
    },
}

impl ReorgCheck {
    /// Highest height known to have been replaced, if any.
    pub fn replaced_height(&self) -> Option<BlockHeight> {
        match self {
            ReorgCheck::Continuous => None,
            ReorgCheck::ParentMismatch { height } | ReorgCheck::HashChanged { height } => {
                Some(*height)
            }
        }
    }

    /// `ChainError::Reorg` at the replaced height, `Ok` if continuous.
    pub fn into_result(self) -> Result<(), ChainError> {
        match self.replaced_height() {
            Some(height) => Err(ChainError::Reorg { height }),
            None => Ok(()),
        }
    }
}

/// Sliding window of recorded block hashes
#[derive(Debug)]
pub struct BlockHashWindow {
    hashes: BTreeMap<BlockHeight, BlockHash>,
    capacity: u64,
}

impl BlockHashWindow {
    /// Window keeping the last `capacity` heights.
    pub fn new(capacity: u64) -> Self {
        Self {
            hashes: BTreeMap::new(),
            capacity: capacity.max(1),
        }
    }

    /// Compare a freshly fetched block with recorded hashes at the same and
    /// the previous height.
    pub fn check(&self, block: &ChainBlock) -> ReorgCheck {
        if let Some(recorded) = self.hashes.get(&block.height) {
            if *recorded != block.hash {
                return ReorgCheck::HashChanged {
                    height: block.height,
                };
            }
        }

        if let Some(parent_height) = block.height.checked_sub(1) {
            if let Some(recorded) = self.hashes.get(&parent_height) {
                if *recorded != block.parent_hash {
                    return ReorgCheck::ParentMismatch {
                        height: parent_height,
                    };
                }
            }
        }

        ReorgCheck::Continuous
    }

    /// Record a processed block and evict heights that fell out of the window.
    pub fn record(&mut self, height: BlockHeight, hash: BlockHash) {
        self.hashes.insert(height, hash);

        let floor = self.highest().unwrap_or(height).saturating_sub(self.capacity - 1);
        self.hashes = self.hashes.split_off(&floor);
    }

    /// Recorded hash at `height`.
    pub fn get(&self, height: BlockHeight) -> Option<BlockHash> {
        self.hashes.get(&height).copied()
    }

    /// Forget every height at or above `height`.
    pub fn truncate_from(&mut self, height: BlockHeight) {
        self.hashes.split_off(&height);
    }

    /// Highest recorded height.
    pub fn highest(&self) -> Option<BlockHeight> {
        self.hashes.keys().next_back().copied()
    }

    /// Number of recorded heights.
    pub fn len(&self) -> usize {
        self.hashes.len()
    }

    /// Check if nothing is recorded.
    pub fn is_empty(&self) -> bool {
        self.hashes.is_empty()
    }
}
