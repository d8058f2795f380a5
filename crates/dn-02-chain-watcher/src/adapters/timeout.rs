//! Per-call timeout decorator
//!
//! Bounds every `ChainClient` call; an elapsed call becomes a transport
//! error and is retried by the caller's next cycle.

use crate::ports::outbound::{ChainClient, HeadStream};
use async_trait::async_trait;
use shared_types::{BlockHeight, ChainBlock, ChainError, ChainId};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Wraps a client and applies `timeout` to each call.
pub struct TimeoutChainClient {
    inner: Arc<dyn ChainClient>,
    timeout: Duration,
}

impl TimeoutChainClient {
    /// Wrap `inner`.
    pub fn new(inner: Arc<dyn ChainClient>, timeout: Duration) -> Self {
        Self { inner, timeout }
    }

    /// Configured per-call timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn bounded<T>(
        &self,
        call: &str,
        fut: impl Future<Output = Result<T, ChainError>>,
    ) -> Result<T, ChainError> {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(ChainError::Transport(format!(
                "{} on {} timed out after {:?}",
                call,
                self.inner.chain_id(),
                self.timeout
            ))),
        }
    }
}

#[async_trait]
impl ChainClient for TimeoutChainClient {
    fn chain_id(&self) -> &ChainId {
        self.inner.chain_id()
    }

    async fn current_height(&self) -> Result<BlockHeight, ChainError> {
        self.bounded("current_height", self.inner.current_height())
            .await
    }

    async fn block_at(&self, height: BlockHeight) -> Result<ChainBlock, ChainError> {
        self.bounded("block_at", self.inner.block_at(height)).await
    }

    fn supports_subscription(&self) -> bool {
        self.inner.supports_subscription()
    }

    async fn subscribe_new_heads(&self) -> Result<HeadStream, ChainError> {
        self.bounded("subscribe_new_heads", self.inner.subscribe_new_heads())
            .await
    }
}
