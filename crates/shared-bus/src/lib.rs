//! # Shared Bus - Confirmed Event Delivery
//!
//! Carries `ConfirmedEvent`s from the per-chain confirmation pipelines to the
//! notary logic that collects them for quorum signing.
//!
//! ```text
//! ┌──────────────┐                    ┌──────────────┐
//! │ Pipeline     │                    │ Notary logic │
//! │ (per chain)  │    publish()       │              │
//! │              │ ──────┐            │              │
//! └──────────────┘       │            └──────────────┘
//!                        ▼                    ↑
//!                  ┌──────────────┐          │
//!                  │  Event Bus   │          │
//!                  │ dedup + seq  │ ─────────┘
//!                  └──────────────┘  subscribe() / subscribe_from()
//! ```
//!
//! ## Guarantees
//!
//! - **At-most-once per window:** an `EventId` already delivered for a chain
//!   within `dedup_window_blocks` of the newest confirmation is a no-op.
//! - **Per-chain order:** each chain's deliveries carry a gap-free sequence
//!   number assigned in publish order.
//! - **Replay:** a bounded per-chain buffer lets a reconnecting consumer
//!   resume from its `Cursor`, and refills subscribers that lagged.

#![allow(clippy::missing_const_for_fn)]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod delivered_window;
pub mod events;
pub mod publisher;
pub mod subscriber;

pub use delivered_window::DeliveredWindow;
pub use events::{Cursor, Delivery, EventFilter, PublishOutcome};
pub use publisher::{EventPublisher, InMemoryEventBus};
pub use subscriber::{EventStream, EventSubscriber, Subscription, SubscriptionError};

use serde::{Deserialize, Serialize};

/// Maximum events to buffer per subscriber before it lags.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1000;

/// Confirmation heights kept in each chain's delivered window.
pub const DEFAULT_DEDUP_WINDOW_BLOCKS: u64 = 1024;

/// Deliveries retained per chain for replay.
pub const DEFAULT_REPLAY_BUFFER: usize = 4096;

/// Bus sizing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BusConfig {
    /// Broadcast channel capacity.
    pub channel_capacity: usize,
    /// Height span of the per-chain delivered-id window.
    pub dedup_window_blocks: u64,
    /// Per-chain replay buffer length.
    pub replay_buffer: usize,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            dedup_window_blocks: DEFAULT_DEDUP_WINDOW_BLOCKS,
            replay_buffer: DEFAULT_REPLAY_BUFFER,
        }
    }
}
