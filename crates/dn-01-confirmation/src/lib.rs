//! # dn-01-confirmation
//!
//! Confirmation tracker: holds chain events until they are buried under the
//! chain's required depth, then hands each one to the event bus exactly once.
//!
//! ## Overview
//!
//! - **Depth tracking**: `current_depth = latest_height - observed_height + 1`
//! - **Promotion**: records reaching `required_depth` are confirmed in
//!   ascending observed height, ties by observation order
//! - **Reorg handling**: `discard(h)` drops every pending record at or above
//!   `h`; confirmed events are never retracted
//!
//! ## Architecture
//!
//! ```text
//! ChainWatcher (dn-02) ──observe_block / discard──→ ConfirmationPipeline
//!                                                        │
//!                                                        └── ConfirmedEvent ──→ EventBus
//! ```
//!
//! One pipeline per chain. The tracker inside is single-writer behind an async
//! mutex, and promoted events are published before the lock is released so
//! per-chain delivery order equals promotion order.
//!
//! ## Example
//!
//! ```rust,ignore
//! use dn_01_confirmation::{ConfirmationConfig, ConfirmationPipeline};
//!
//! let pipeline = ConfirmationPipeline::new(
//!     ConfirmationConfig::new(ChainId::new("bitcoin"), 6),
//!     bus.clone(),
//! );
//!
//! pipeline.observe_block(100, block.candidate_events(&chain, false)).await;
//! let confirmed = pipeline.advance_height(105).await;
//! ```

pub mod domain;
pub mod ports;
pub mod service;

pub use domain::{ConfirmationRecord, ConfirmationTracker, ObserveOutcome};
pub use ports::inbound::ConfirmationSink;
pub use service::{ConfirmationConfig, ConfirmationPipeline, DEFAULT_RETENTION_BLOCKS};
