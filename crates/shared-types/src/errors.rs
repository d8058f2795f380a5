//! # Error Types
//!
//! The error taxonomy shared across subsystems. Each component decides its own
//! retry policy from the [`ErrorKind`] of a failure.

use crate::entities::BlockHeight;
use thiserror::Error;

/// Classification of failures in the confirmation engine and signer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// RPC or network failure, including timeouts. Always retried.
    Transport,
    /// Requested height not produced yet. Means "no new data".
    NotFound,
    /// A previously observed height now resolves to a different block.
    Reorg,
    /// Signing key could not be loaded. Fatal to that signing attempt.
    KeyUnavailable,
}

/// Errors returned by chain clients and feeds.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ChainError {
    /// Network failure or per-call timeout.
    #[error("Transport error: {0}")]
    Transport(String),

    /// Height beyond the chain tip.
    #[error("Block not found at height {height}")]
    NotFound { height: BlockHeight },

    /// Block at `height` changed since it was recorded.
    #[error("Reorg detected at height {height}")]
    Reorg { height: BlockHeight },

    /// The chain has no native push feed.
    #[error("Subscription not supported by this chain")]
    Unsupported,
}

impl ChainError {
    /// Taxonomy bucket for this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ChainError::Transport(_) | ChainError::Unsupported => ErrorKind::Transport,
            ChainError::NotFound { .. } => ErrorKind::NotFound,
            ChainError::Reorg { .. } => ErrorKind::Reorg,
        }
    }

    /// Whether the caller should simply try again on its next cycle.
    pub fn is_retryable(&self) -> bool {
        matches!(self.kind(), ErrorKind::Transport | ErrorKind::NotFound)
    }
}
