//! # DN-02 Chain Watcher
//!
//! Turns a chain's RPC or subscription transport into an ordered stream of
//! blocks for the confirmation pipeline.
//!
//! **Subsystem ID:** 02
//! **Architecture:** Hexagonal (ports/adapters)
//!
//! ## Purpose
//!
//! - One `ChainClient` port over heterogeneous transports
//! - Two `ChainFeed`s (interval polling, new-head subscription) driving the
//!   same `ChainWatcher` block-walk logic
//! - Reorg detection against recorded block hashes
//! - Persisted per-chain checkpoints so a restart resumes below the last
//!   processed height instead of below the current tip
//!
//! ## Flow
//!
//! ```text
//! ChainClient ──→ PollingFeed | SubscriptionFeed ──tip──→ ChainWatcher
//!                                                            │ block_at(last+1..=tip)
//!                                                            ▼
//!                                                    ConfirmationSink (dn-01)
//! ```
//!
//! ## Module Structure
//!
//! ```text
//! dn-02-chain-watcher/
//! ├── domain/     # BlockHashWindow
//! ├── ports/      # ChainClient, CheckpointStore
//! ├── adapters/   # TimeoutChainClient, MockChainClient, checkpoint stores
//! ├── feeds/      # ChainFeed, PollingFeed, SubscriptionFeed
//! └── watcher.rs  # ChainWatcher
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod adapters;
pub mod domain;
pub mod feeds;
pub mod ports;
pub mod watcher;

// Re-exports
pub use adapters::{
    JsonCheckpointStore, MemoryCheckpointStore, MockChainClient, TimeoutChainClient,
};
pub use domain::{BlockHashWindow, ReorgCheck};
pub use feeds::{build_feed, ChainFeed, FeedMode, FeedSignal, PollingFeed, SubscriptionFeed};
pub use ports::{ChainClient, CheckpointError, CheckpointStore, HeadStream};
pub use watcher::{ChainWatcher, WatcherConfig, WatcherStats};

/// Default poll interval.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 500;

/// Default per-call RPC timeout.
pub const DEFAULT_RPC_TIMEOUT_MS: u64 = 3_000;

/// Default number of processed blocks between progress log lines.
pub const DEFAULT_PROGRESS_LOG_INTERVAL: u64 = 20;
