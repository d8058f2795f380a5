//! # Notary Runtime Library
//!
//! Wires the notary subsystems together. The main entry point is the
//! `main.rs` binary; the library is exposed for integration tests.
//!
//! ## Flow
//!
//! ```text
//! ChainClient ──→ ChainWatcher (dn-02, one task per chain)
//!                      │
//!                      ▼
//!              ConfirmationPipeline (dn-01) ──→ InMemoryEventBus ──→ subscribers
//!                                                                    (EventSigningHandler)
//! ```
//!
//! ## Shutdown Sequence
//!
//! 1. Signal every watcher through the shared `watch` channel
//! 2. Await all watcher tasks (each finishes its current block)
//! 3. Close the bus so subscribers drain and end

pub mod adapters;
pub mod container;
pub mod handlers;

use std::collections::HashMap;
use std::sync::Arc;

use dn_01_confirmation::{ConfirmationPipeline, ConfirmationSink};
use dn_02_chain_watcher::{build_feed, ChainClient, ChainWatcher, WatcherStats};
use parking_lot::Mutex;
use shared_bus::InMemoryEventBus;
use shared_types::ChainId;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

pub use container::{
    ChainConfig, ConfigError, ContainerError, NotaryConfig, NotaryContainer, SignerConfig,
};

/// The notary runtime orchestrating all chain watchers.
pub struct NotaryRuntime {
    container: NotaryContainer,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
    watchers: Mutex<Vec<(ChainId, JoinHandle<WatcherStats>)>>,
}

impl NotaryRuntime {
    /// Validate `config` and build the subsystems for every configured
    /// chain, using `clients` for chain access.
    pub fn new(
        config: NotaryConfig,
        clients: HashMap<ChainId, Arc<dyn ChainClient>>,
    ) -> Result<Self, ContainerError> {
        info!(chains = config.chains.len(), "Creating notary runtime");
        let container = NotaryContainer::new(config, clients)?;
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        Ok(Self {
            container,
            shutdown_tx,
            shutdown_rx,
            watchers: Mutex::new(Vec::new()),
        })
    }

    /// Spawn one watcher task per chain. Calling it again is a no-op.
    pub fn start(&self) {
        let mut watchers = self.watchers.lock();
        if !watchers.is_empty() {
            warn!("Notary runtime already started");
            return;
        }

        info!("===========================================");
        info!("  Distributed Notary Runtime v{}", env!("CARGO_PKG_VERSION"));
        info!("===========================================");

        for chain in &self.container.chains {
            let feed = build_feed(
                chain.config.feed,
                Arc::clone(&chain.client),
                chain.config.poll_interval(),
            );
            let sink: Arc<dyn ConfirmationSink> = chain.pipeline.clone();
            let mut watcher = ChainWatcher::new(
                Arc::clone(&chain.client),
                feed,
                sink,
                chain.config.watcher_config(),
            );
            if let Some(store) = &self.container.checkpoints {
                watcher = watcher.with_checkpoints(Arc::clone(store));
            }

            let handle = tokio::spawn(watcher.run(self.shutdown_rx.clone()));
            watchers.push((chain.config.id.clone(), handle));
        }

        info!(watchers = watchers.len(), "All chain watchers running");
    }

    /// Shared event bus.
    pub fn bus(&self) -> Arc<InMemoryEventBus> {
        Arc::clone(&self.container.bus)
    }

    /// Confirmation pipeline of `chain`.
    pub fn pipeline(&self, chain: &ChainId) -> Option<Arc<ConfirmationPipeline>> {
        self.container
            .chain(chain)
            .map(|c| Arc::clone(&c.pipeline))
    }

    /// Receiver that turns `true` once shutdown starts.
    pub fn shutdown_signal(&self) -> watch::Receiver<bool> {
        self.shutdown_rx.clone()
    }

    /// Validated configuration.
    pub fn config(&self) -> &NotaryConfig {
        &self.container.config
    }

    /// Stop every watcher, wait for them, then close the bus.
    ///
    /// Returns each chain's final watcher stats.
    pub async fn shutdown(&self) -> Vec<(ChainId, WatcherStats)> {
        info!("Initiating graceful shutdown...");

        if self.shutdown_tx.send(true).is_err() {
            warn!("No shutdown receivers left");
        }

        let watchers = std::mem::take(&mut *self.watchers.lock());
        let mut stats = Vec::with_capacity(watchers.len());
        for (chain, handle) in watchers {
            match handle.await {
                Ok(s) => stats.push((chain, s)),
                Err(e) => error!(chain = %chain, error = %e, "Watcher task failed"),
            }
        }

        self.container.bus.close();
        info!("Shutdown complete");
        stats
    }
}
