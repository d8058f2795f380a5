//! Development chain
//!
//! A local chain that grows by one block per interval so the notary binary
//! runs end to end without a remote node. Every third block carries a
//! deposit log and every fifth a withdrawal log.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dn_02_chain_watcher::{ChainClient, HeadStream, MockChainClient};
use sha3::{Digest, Keccak256};
use shared_types::{BlockHeight, ChainBlock, ChainError, ChainId, ChainLog, EventKind};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};

/// Self-producing in-memory chain.
pub struct DevChainClient {
    inner: MockChainClient,
}

impl DevChainClient {
    /// Poll-only chain.
    pub fn new(chain: ChainId) -> Self {
        Self {
            inner: MockChainClient::new(chain),
        }
    }

    /// Chain that also pushes new heads.
    pub fn with_subscription(chain: ChainId) -> Self {
        Self {
            inner: MockChainClient::with_subscription(chain),
        }
    }

    /// Produce one block.
    pub fn produce_block(&self) -> ChainBlock {
        let height = self.inner.tip() + 1;
        let block = self.inner.push_block(dev_logs(self.inner.chain_id(), height));
        debug!(
            chain = %self.inner.chain_id(),
            height = block.height,
            logs = block.logs.len(),
            "Dev block produced"
        );
        block
    }

    /// Produce `count` blocks at once.
    pub fn produce_blocks(&self, count: u64) {
        for _ in 0..count {
            self.produce_block();
        }
    }

    /// Current tip height.
    pub fn tip(&self) -> BlockHeight {
        self.inner.tip()
    }

    /// Produce a block every `block_interval` until `shutdown` turns `true`.
    pub fn spawn_producer(
        self: &Arc<Self>,
        block_interval: Duration,
        mut shutdown: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        let chain = Arc::clone(self);
        tokio::spawn(async move {
            info!(
                chain = %chain.inner.chain_id(),
                interval = ?block_interval,
                "Dev chain producer started"
            );
            let mut ticker = interval(block_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // First tick completes immediately
            ticker.tick().await;

            loop {
                if *shutdown.borrow() {
                    break;
                }
                tokio::select! {
                    _ = shutdown.changed() => break,
                    _ = ticker.tick() => {
                        chain.produce_block();
                    }
                }
            }

            info!(
                chain = %chain.inner.chain_id(),
                tip = chain.tip(),
                "Dev chain producer stopped"
            );
        })
    }
}

#[async_trait]
impl ChainClient for DevChainClient {
    fn chain_id(&self) -> &ChainId {
        self.inner.chain_id()
    }

    async fn current_height(&self) -> Result<BlockHeight, ChainError> {
        self.inner.current_height().await
    }

    async fn block_at(&self, height: BlockHeight) -> Result<ChainBlock, ChainError> {
        self.inner.block_at(height).await
    }

    fn supports_subscription(&self) -> bool {
        self.inner.supports_subscription()
    }

    async fn subscribe_new_heads(&self) -> Result<HeadStream, ChainError> {
        self.inner.subscribe_new_heads().await
    }
}

fn dev_logs(chain: &ChainId, height: BlockHeight) -> Vec<ChainLog> {
    let mut logs = Vec::new();
    if height % 3 == 0 {
        logs.push(dev_log(chain, height, logs.len() as u32, EventKind::Deposit));
    }
    if height % 5 == 0 {
        logs.push(dev_log(chain, height, logs.len() as u32, EventKind::Withdrawal));
    }
    logs
}

fn dev_log(chain: &ChainId, height: BlockHeight, index: u32, kind: EventKind) -> ChainLog {
    let mut hasher = Keccak256::new();
    hasher.update(b"dev-tx");
    hasher.update(chain.as_str().as_bytes());
    hasher.update(height.to_be_bytes());
    hasher.update(index.to_be_bytes());

    ChainLog {
        tx_hash: hasher.finalize().into(),
        index,
        kind,
        data: height.to_be_bytes().to_vec(),
    }
}
