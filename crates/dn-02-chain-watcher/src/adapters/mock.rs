//! Scriptable in-memory chain
//!
//! Used by tests across the workspace and by the runtime's dev chains.

use crate::ports::outbound::{ChainClient, HeadStream};
use async_trait::async_trait;
use parking_lot::Mutex;
use sha3::{Digest, Keccak256};
use shared_types::{BlockHash, BlockHeight, ChainBlock, ChainError, ChainId, ChainLog};
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::debug;

#[derive(Default)]
struct MockState {
    blocks: BTreeMap<BlockHeight, ChainBlock>,
    /// Mixed into block hashes; bumped on every fork.
    branch: u64,
    fail_height_calls: u32,
    fail_block_calls: u32,
    fail_subscribes: u32,
    height_calls: u64,
    block_calls: u64,
    subscribe_calls: u64,
    latency: Option<Duration>,
    heads: Option<mpsc::UnboundedSender<Result<BlockHeight, ChainError>>>,
}

/// In-memory chain with a genesis block at height 0.
///
/// Blocks get deterministic Keccak hashes derived from the chain id, height
/// and branch, so a fork produces different hashes at the same heights.
pub struct MockChainClient {
    chain: ChainId,
    subscription: bool,
    state: Mutex<MockState>,
}

impl MockChainClient {
    /// Poll-only chain.
    pub fn new(chain: ChainId) -> Self {
        Self::build(chain, false)
    }

    /// Chain with a new-head subscription feed.
    pub fn with_subscription(chain: ChainId) -> Self {
        Self::build(chain, true)
    }

    fn build(chain: ChainId, subscription: bool) -> Self {
        let mut state = MockState::default();
        let genesis = ChainBlock {
            height: 0,
            hash: block_hash(&chain, 0, 0),
            parent_hash: [0u8; 32],
            logs: Vec::new(),
        };
        state.blocks.insert(0, genesis);
        Self {
            chain,
            subscription,
            state: Mutex::new(state),
        }
    }

    /// Append a block carrying `logs` and notify head subscribers.
    pub fn push_block(&self, logs: Vec<ChainLog>) -> ChainBlock {
        let mut state = self.state.lock();
        let (tip, parent) = state
            .blocks
            .iter()
            .next_back()
            .map(|(h, b)| (*h, b.hash))
            .unwrap_or((0, [0u8; 32]));

        let height = tip + 1;
        let block = ChainBlock {
            height,
            hash: block_hash(&self.chain, height, state.branch),
            parent_hash: parent,
            logs,
        };
        state.blocks.insert(height, block.clone());

        if let Some(heads) = &state.heads {
            if heads.send(Ok(height)).is_err() {
                state.heads = None;
            }
        }
        block
    }

    /// Append `count` empty blocks.
    pub fn extend(&self, count: u64) {
        for _ in 0..count {
            self.push_block(Vec::new());
        }
    }

    /// Replace every block at or above `height` with a new branch of
    /// `new_len` blocks. Returns the new tip.
    pub fn fork_at(&self, height: BlockHeight, new_len: u64) -> BlockHeight {
        {
            let mut state = self.state.lock();
            state.blocks.retain(|h, _| *h < height.max(1));
            state.branch += 1;
        }
        debug!(chain = %self.chain, height, new_len, "Mock chain forked");
        self.extend(new_len);
        self.tip()
    }

    /// Current tip height.
    pub fn tip(&self) -> BlockHeight {
        self.state.lock().blocks.keys().next_back().copied().unwrap_or(0)
    }

    /// Fail the next `n` `current_height` calls with a transport error.
    pub fn fail_next_height_calls(&self, n: u32) {
        self.state.lock().fail_height_calls = n;
    }

    /// Fail the next `n` `block_at` calls with a transport error.
    pub fn fail_next_block_calls(&self, n: u32) {
        self.state.lock().fail_block_calls = n;
    }

    /// Fail the next `n` `subscribe_new_heads` calls with a transport error.
    pub fn fail_next_subscribes(&self, n: u32) {
        self.state.lock().fail_subscribes = n;
    }

    /// Delay every call by `latency`.
    pub fn set_latency(&self, latency: Duration) {
        self.state.lock().latency = Some(latency);
    }

    /// End the current head stream, as a dropped websocket would.
    pub fn close_head_stream(&self) {
        self.state.lock().heads = None;
    }

    /// Push an error into the current head stream.
    pub fn break_head_stream(&self, reason: &str) {
        let mut state = self.state.lock();
        if let Some(heads) = state.heads.take() {
            let _ = heads.send(Err(ChainError::Transport(reason.to_string())));
        }
    }

    /// Number of `current_height` calls so far.
    pub fn height_calls(&self) -> u64 {
        self.state.lock().height_calls
    }

    /// Number of `block_at` calls so far.
    pub fn block_calls(&self) -> u64 {
        self.state.lock().block_calls
    }

    /// Number of `subscribe_new_heads` calls so far.
    pub fn subscribe_calls(&self) -> u64 {
        self.state.lock().subscribe_calls
    }

    async fn delay(&self) {
        let latency = self.state.lock().latency;
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
    }
}

/// Keccak-256 of `chain || height || branch`.
fn block_hash(chain: &ChainId, height: BlockHeight, branch: u64) -> BlockHash {
    let mut hasher = Keccak256::new();
    hasher.update(chain.as_str().as_bytes());
    hasher.update(height.to_be_bytes());
    hasher.update(branch.to_be_bytes());
    hasher.finalize().into()
}

fn take_failure(counter: &mut u32) -> bool {
    if *counter > 0 {
        *counter -= 1;
        true
    } else {
        false
    }
}

#[async_trait]
impl ChainClient for MockChainClient {
    fn chain_id(&self) -> &ChainId {
        &self.chain
    }

    async fn current_height(&self) -> Result<BlockHeight, ChainError> {
        self.delay().await;
        let mut state = self.state.lock();
        state.height_calls += 1;
        if take_failure(&mut state.fail_height_calls) {
            return Err(ChainError::Transport("mock: connection refused".into()));
        }
        Ok(state.blocks.keys().next_back().copied().unwrap_or(0))
    }

    async fn block_at(&self, height: BlockHeight) -> Result<ChainBlock, ChainError> {
        self.delay().await;
        let mut state = self.state.lock();
        state.block_calls += 1;
        if take_failure(&mut state.fail_block_calls) {
            return Err(ChainError::Transport("mock: connection reset".into()));
        }
        state
            .blocks
            .get(&height)
            .cloned()
            .ok_or(ChainError::NotFound { height })
    }

    fn supports_subscription(&self) -> bool {
        self.subscription
    }

    async fn subscribe_new_heads(&self) -> Result<HeadStream, ChainError> {
        if !self.subscription {
            return Err(ChainError::Unsupported);
        }
        self.delay().await;
        let mut state = self.state.lock();
        state.subscribe_calls += 1;
        if take_failure(&mut state.fail_subscribes) {
            return Err(ChainError::Transport("mock: handshake failed".into()));
        }

        let (tx, rx) = mpsc::unbounded_channel();
        state.heads = Some(tx);
        Ok(Box::pin(UnboundedReceiverStream::new(rx)))
    }
}
