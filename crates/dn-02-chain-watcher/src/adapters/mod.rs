//! # Adapters Layer (Hexagonal Architecture)
//!
//! `ChainClient` implementations and decorators, and `CheckpointStore`
//! backends.

mod checkpoint;
mod mock;
mod timeout;

pub use checkpoint::{JsonCheckpointStore, MemoryCheckpointStore};
pub use mock::MockChainClient;
pub use timeout::TimeoutChainClient;
