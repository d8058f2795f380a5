//! # Height-Bounded Delivered Window
//!
//! Remembers which event ids of one chain were already delivered.
//!
//! ## Design
//!
//! - Ids are bucketed by the height at which they were confirmed
//! - Buckets more than `window_blocks` below the newest height are evicted
//! - Memory is bounded by chain progress rather than wall-clock time

use shared_types::{BlockHeight, EventId};
use std::collections::{BTreeMap, HashSet};

/// Bounded set of delivered event ids for a single chain.
#[derive(Debug)]
pub struct DeliveredWindow {
    /// Ids bucketed by confirmation height.
    by_height: BTreeMap<BlockHeight, Vec<EventId>>,

    /// Flat index for O(1) membership checks.
    ids: HashSet<EventId>,

    /// How many heights below the newest one are retained.
    window_blocks: u64,

    /// Newest confirmation height seen.
    newest: Option<BlockHeight>,
}

impl DeliveredWindow {
    /// Create an empty window retaining `window_blocks` heights.
    #[must_use]
    pub fn new(window_blocks: u64) -> Self {
        Self {
            by_height: BTreeMap::new(),
            ids: HashSet::new(),
            window_blocks,
            newest: None,
        }
    }

    /// Record `id` as delivered at `height`.
    ///
    /// Returns `false` if the id is already in the window.
    pub fn insert(&mut self, id: EventId, height: BlockHeight) -> bool {
        if self.ids.contains(&id) {
            return false;
        }

        self.ids.insert(id.clone());
        self.by_height.entry(height).or_default().push(id);

        if self.newest.map_or(true, |newest| height > newest) {
            self.newest = Some(height);
            self.evict();
        }

        true
    }

    /// Check if `id` was delivered within the window.
    #[must_use]
    pub fn contains(&self, id: &EventId) -> bool {
        self.ids.contains(id)
    }

    /// Lowest height still retained.
    #[must_use]
    pub fn floor(&self) -> Option<BlockHeight> {
        self.by_height.keys().next().copied()
    }

    /// Number of ids in the window.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Check if the window is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    fn evict(&mut self) {
        let Some(newest) = self.newest else {
            return;
        };
        let threshold = newest.saturating_sub(self.window_blocks);

        let retained = self.by_height.split_off(&threshold);
        let expired = std::mem::replace(&mut self.by_height, retained);

        for id in expired.into_values().flatten() {
            self.ids.remove(&id);
        }
    }
}
