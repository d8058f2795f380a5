//! Chain watcher
//!
//! One task per chain. Waits for tip signals from its feed, fetches every
//! block in `(last_processed, tip]` in order, and hands each block's
//! candidate events to the confirmation sink.
//!
//! Blocks are fetched without holding the tracker lock. A transport error
//! ends the pass; the next signal resumes at `last_processed + 1`.
//!
//! With a `CheckpointStore` attached, the last processed height is saved
//! after every block and every rewind. A restarted watcher resumes at
//! `checkpoint - required_depth + 1`, which re-observes every event that
//! could still have been pending when it stopped.

use crate::domain::BlockHashWindow;
use crate::feeds::{ChainFeed, FeedSignal};
use crate::ports::outbound::{ChainClient, CheckpointStore};
use dn_01_confirmation::ConfirmationSink;
use shared_types::{BlockHeight, ChainBlock, ChainError, ChainId, ErrorKind};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// Watcher configuration for one chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatcherConfig {
    /// Required confirmation depth; also how far below the tip a watcher
    /// without `start_height` begins.
    pub required_depth: u64,
    /// First height to process. Takes precedence over a stored checkpoint;
    /// without either the watcher starts at `tip - required_depth`.
    pub start_height: Option<BlockHeight>,
    /// Processed blocks between progress log lines.
    pub progress_log_interval: u64,
    /// Emit a `NewBlock` event per processed block.
    pub emit_new_block_events: bool,
    /// Heights of recorded hashes kept for reorg detection.
    pub reorg_window: u64,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            required_depth: 6,
            start_height: None,
            progress_log_interval: crate::DEFAULT_PROGRESS_LOG_INTERVAL,
            emit_new_block_events: false,
            reorg_window: 256,
        }
    }
}

/// Summary returned when a watcher stops.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WatcherStats {
    /// Highest height fully processed.
    pub last_processed: Option<BlockHeight>,
    /// Blocks handed to the sink.
    pub blocks_processed: u64,
    /// Reorgs handled.
    pub reorgs: u64,
    /// Feed cycles that produced no tip.
    pub skipped_signals: u64,
}

/// Drives one chain from its feed into its confirmation sink.
pub struct ChainWatcher {
    chain: ChainId,
    client: Arc<dyn ChainClient>,
    feed: Box<dyn ChainFeed>,
    sink: Arc<dyn ConfirmationSink>,
    config: WatcherConfig,
    hashes: BlockHashWindow,
    checkpoints: Option<Arc<dyn CheckpointStore>>,
    stats: WatcherStats,
}

impl ChainWatcher {
    /// Create a watcher. `client` is used for block fetches; `feed` only
    /// reports tips.
    pub fn new(
        client: Arc<dyn ChainClient>,
        feed: Box<dyn ChainFeed>,
        sink: Arc<dyn ConfirmationSink>,
        config: WatcherConfig,
    ) -> Self {
        Self {
            chain: client.chain_id().clone(),
            hashes: BlockHashWindow::new(config.reorg_window),
            client,
            feed,
            sink,
            config,
            checkpoints: None,
            stats: WatcherStats::default(),
        }
    }

    /// Persist progress to `store` and resume from it on start.
    pub fn with_checkpoints(mut self, store: Arc<dyn CheckpointStore>) -> Self {
        self.checkpoints = Some(store);
        self
    }

    /// Highest height fully processed.
    pub fn last_processed(&self) -> Option<BlockHeight> {
        self.stats.last_processed
    }

    /// Run until `shutdown` turns `true` (or its sender is dropped).
    ///
    /// A pass in progress finishes the block it is on before returning.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> WatcherStats {
        info!(
            chain = %self.chain,
            feed = %self.feed.mode(),
            required_depth = self.config.required_depth,
            "[dn-02] Watcher started"
        );

        loop {
            if *shutdown.borrow() {
                break;
            }

            let signal = tokio::select! {
                _ = shutdown.changed() => break,
                signal = self.feed.next_tip() => signal,
            };

            match signal {
                FeedSignal::Tip(tip) => self.catch_up(tip, &shutdown).await,
                FeedSignal::Skipped(err) => {
                    self.stats.skipped_signals += 1;
                    log_skipped(&self.chain, &err);
                }
            }
        }

        info!(
            chain = %self.chain,
            last_processed = ?self.stats.last_processed,
            blocks = self.stats.blocks_processed,
            "[dn-02] Watcher stopped"
        );
        self.stats
    }

    /// Process every block up to `tip`.
    pub async fn catch_up(&mut self, tip: BlockHeight, shutdown: &watch::Receiver<bool>) {
        let mut next = match self.stats.last_processed {
            Some(last) if tip <= last => {
                self.verify_tip(tip).await;
                return;
            }
            Some(last) => last + 1,
            None => self.start_height(tip),
        };

        while next <= tip {
            if *shutdown.borrow() {
                debug!(chain = %self.chain, next, "[dn-02] Shutdown requested mid-pass");
                return;
            }

            let fetched = fetch_checked(self.client.as_ref(), &self.hashes, next).await;
            match fetched {
                Ok(block) => {
                    self.process(block, tip).await;
                    next += 1;
                }
                Err(ChainError::Reorg { height }) => match self.handle_reorg(height).await {
                    Some(divergence) => next = divergence,
                    None => return,
                },
                Err(err) => {
                    log_fetch_error(&self.chain, next, &err);
                    return;
                }
            }
        }
    }

    /// First height of a watcher that has processed nothing yet.
    fn start_height(&self, tip: BlockHeight) -> BlockHeight {
        let default = tip.saturating_sub(self.config.required_depth);
        if let Some(start) = self.config.start_height {
            return start;
        }
        let Some(store) = &self.checkpoints else {
            return default;
        };

        match store.load(&self.chain) {
            Ok(Some(checkpoint)) if checkpoint <= tip => {
                let resume = (checkpoint + 1).saturating_sub(self.config.required_depth);
                info!(
                    chain = %self.chain,
                    checkpoint,
                    resume,
                    tip,
                    "[dn-02] Resuming from checkpoint"
                );
                resume
            }
            Ok(Some(checkpoint)) => {
                warn!(
                    chain = %self.chain,
                    checkpoint,
                    tip,
                    "[dn-02] Checkpoint ahead of chain tip, ignoring"
                );
                default
            }
            Ok(None) => default,
            Err(err) => {
                warn!(
                    chain = %self.chain,
                    error = %err,
                    "[dn-02] Checkpoint unreadable, ignoring"
                );
                default
            }
        }
    }

    fn save_checkpoint(&self, height: BlockHeight) {
        let Some(store) = &self.checkpoints else {
            return;
        };
        if let Err(err) = store.save(&self.chain, height) {
            warn!(chain = %self.chain, height, error = %err, "[dn-02] Checkpoint save failed");
        }
    }

    async fn process(&mut self, block: ChainBlock, tip: BlockHeight) {
        let height = block.height;
        let events = block.candidate_events(&self.chain, self.config.emit_new_block_events);

        self.sink.observe_block(height, events).await;
        self.hashes.record(height, block.hash);
        self.stats.last_processed = Some(height);
        self.stats.blocks_processed += 1;
        self.save_checkpoint(height);

        let every = self.config.progress_log_interval.max(1);
        if self.stats.blocks_processed % every == 0 {
            info!(
                chain = %self.chain,
                height,
                tip,
                behind = tip.saturating_sub(height),
                "[dn-02] Sync progress"
            );
        }
    }

    /// No new block: re-check the recorded hash at the tip.
    async fn verify_tip(&mut self, tip: BlockHeight) {
        if self.hashes.get(tip).is_none() {
            return;
        }
        let fetched = fetch_checked(self.client.as_ref(), &self.hashes, tip).await;
        match fetched {
            Ok(_) => {}
            Err(ChainError::Reorg { height }) => {
                self.handle_reorg(height).await;
            }
            Err(err) => log_fetch_error(&self.chain, tip, &err),
        }
    }

    /// Find where the chain diverged from what was recorded, discard pending
    /// events from there and rewind. Returns the divergence height, or `None`
    /// if the walk could not complete (retried on the next signal).
    async fn handle_reorg(&mut self, replaced: BlockHeight) -> Option<BlockHeight> {
        let mut divergence = replaced;
        while let Some(below) = divergence.checked_sub(1) {
            let Some(recorded) = self.hashes.get(below) else {
                break;
            };
            match self.client.block_at(below).await {
                Ok(block) if block.hash == recorded => break,
                Ok(_) => divergence = below,
                Err(err) => {
                    log_fetch_error(&self.chain, below, &err);
                    return None;
                }
            }
        }

        let orphaned = self.sink.discard(divergence).await;
        self.hashes.truncate_from(divergence);
        self.stats.last_processed = divergence.checked_sub(1);
        self.stats.reorgs += 1;
        if let Some(rewound) = self.stats.last_processed {
            self.save_checkpoint(rewound);
        }

        let err = ChainError::Reorg { height: divergence };
        warn!(
            chain = %self.chain,
            error = %err,
            replaced,
            orphaned = orphaned.len(),
            "[dn-02] Rewinding"
        );
        Some(divergence)
    }
}

/// Fetch `height` and compare it against recorded hashes. A mismatch is
/// returned as `ChainError::Reorg` at the replaced height.
async fn fetch_checked(
    client: &dyn ChainClient,
    hashes: &BlockHashWindow,
    height: BlockHeight,
) -> Result<ChainBlock, ChainError> {
    let block = client.block_at(height).await?;
    hashes.check(&block).into_result()?;
    Ok(block)
}

fn log_skipped(chain: &ChainId, err: &ChainError) {
    match err.kind() {
        ErrorKind::NotFound => debug!(chain = %chain, "[dn-02] No new data"),
        _ if err.is_retryable() => {
            warn!(chain = %chain, error = %err, "[dn-02] Tip read failed, retrying next cycle")
        }
        _ => error!(chain = %chain, error = %err, "[dn-02] Tip read failed"),
    }
}

fn log_fetch_error(chain: &ChainId, height: BlockHeight, err: &ChainError) {
    match err.kind() {
        ErrorKind::NotFound => debug!(chain = %chain, height, "[dn-02] Block not available yet"),
        _ if err.is_retryable() => warn!(
            chain = %chain,
            height,
            error = %err,
            "[dn-02] Block fetch failed, resuming next cycle"
        ),
        _ => error!(chain = %chain, height, error = %err, "[dn-02] Block fetch failed"),
    }
}
