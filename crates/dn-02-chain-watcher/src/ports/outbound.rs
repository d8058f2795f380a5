//! # Outbound Ports
//!
//! The chain transport as seen by feeds and watchers, and where a watcher
//! persists its progress.

use async_trait::async_trait;
use shared_types::{BlockHeight, ChainBlock, ChainError, ChainId};
use std::pin::Pin;
use std::sync::Arc;
use thiserror::Error;
use tokio_stream::Stream;

/// New-head notifications from a push-capable chain.
pub type HeadStream = Pin<Box<dyn Stream<Item = Result<BlockHeight, ChainError>> + Send>>;

/// Chain client - outbound port.
///
/// Errors are `ChainError::Transport` (network, timeout) or
/// `ChainError::NotFound` (height beyond the tip).
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Chain this client talks to.
    fn chain_id(&self) -> &ChainId;

    /// Current tip height.
    async fn current_height(&self) -> Result<BlockHeight, ChainError>;

    /// Block at `height`, with the logs the notary cares about.
    async fn block_at(&self, height: BlockHeight) -> Result<ChainBlock, ChainError>;

    /// Whether `subscribe_new_heads` is available.
    fn supports_subscription(&self) -> bool {
        false
    }

    /// Open a new-head stream. Restartable by calling again.
    async fn subscribe_new_heads(&self) -> Result<HeadStream, ChainError> {
        Err(ChainError::Unsupported)
    }
}

#[async_trait]
impl<T: ChainClient + ?Sized> ChainClient for Arc<T> {
    fn chain_id(&self) -> &ChainId {
        (**self).chain_id()
    }

    async fn current_height(&self) -> Result<BlockHeight, ChainError> {
        (**self).current_height().await
    }

    async fn block_at(&self, height: BlockHeight) -> Result<ChainBlock, ChainError> {
        (**self).block_at(height).await
    }

    fn supports_subscription(&self) -> bool {
        (**self).supports_subscription()
    }

    async fn subscribe_new_heads(&self) -> Result<HeadStream, ChainError> {
        (**self).subscribe_new_heads().await
    }
}

/// Checkpoint persistence errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CheckpointError {
    /// Reading or writing the backing storage failed.
    #[error("Checkpoint I/O error: {message}")]
    Io { message: String },

    /// Stored checkpoint could not be decoded.
    #[error("Corrupt checkpoint for {chain}: {message}")]
    Corrupt { chain: ChainId, message: String },
}

/// Last processed height per chain - outbound port.
///
/// Written by the watcher after every processed block and after every
/// reorg rewind, read once when the watcher starts without a position.
pub trait CheckpointStore: Send + Sync {
    /// Stored height for `chain`, `None` if nothing was saved yet.
    fn load(&self, chain: &ChainId) -> Result<Option<BlockHeight>, CheckpointError>;

    /// Replace the stored height for `chain`.
    fn save(&self, chain: &ChainId, last_processed: BlockHeight) -> Result<(), CheckpointError>;
}
