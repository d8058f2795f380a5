//! # Subsystem Container
//!
//! Builds the per-chain subsystems and the shared event bus from a validated
//! `NotaryConfig`.
//!
//! ```text
//! ChainClient ──TimeoutChainClient──→ (watcher, spawned by the runtime) ──→ CheckpointStore
//!                                          │
//!                                          ▼
//!                              ConfirmationPipeline (dn-01) ──→ InMemoryEventBus
//! ```
//!
//! ## Thread Safety
//!
//! - Everything shared is wrapped in `Arc`
//! - Each pipeline serializes its own tracker; the bus is shared by all

use std::collections::HashMap;
use std::sync::Arc;

use dn_01_confirmation::{ConfirmationConfig, ConfirmationPipeline};
use dn_02_chain_watcher::{
    ChainClient, CheckpointStore, JsonCheckpointStore, TimeoutChainClient,
};
use shared_bus::{EventPublisher, InMemoryEventBus};
use shared_types::ChainId;
use thiserror::Error;
use tracing::info;

use crate::container::config::{ChainConfig, ConfigError, NotaryConfig};

/// Errors while assembling the container.
#[derive(Debug, Error)]
pub enum ContainerError {
    /// Configuration failed validation.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A configured chain has no client.
    #[error("No chain client supplied for {0}")]
    MissingClient(ChainId),

    /// A client was supplied under a different chain id than it reports.
    #[error("Client registered as {expected} reports chain {actual}")]
    ClientMismatch { expected: ChainId, actual: ChainId },
}

/// Everything needed to run one chain.
pub struct ChainSubsystem {
    /// Chain settings.
    pub config: ChainConfig,
    /// Client with every call bounded by `rpc_timeout_ms`.
    pub client: Arc<dyn ChainClient>,
    /// Confirmation pipeline publishing to the shared bus.
    pub pipeline: Arc<ConfirmationPipeline>,
}

/// Central container holding all subsystem instances.
pub struct NotaryContainer {
    /// Validated configuration.
    pub config: NotaryConfig,
    /// Shared event bus.
    pub bus: Arc<InMemoryEventBus>,
    /// Per-chain subsystems, in configuration order.
    pub chains: Vec<ChainSubsystem>,
    /// Watcher progress store, shared by all chains. `None` when
    /// `checkpoint_dir` is unset.
    pub checkpoints: Option<Arc<dyn CheckpointStore>>,
}

impl NotaryContainer {
    /// Validate `config` and wire one pipeline per configured chain.
    ///
    /// `clients` must hold a client for every configured chain; extra
    /// clients are ignored.
    pub fn new(
        config: NotaryConfig,
        mut clients: HashMap<ChainId, Arc<dyn ChainClient>>,
    ) -> Result<Self, ContainerError> {
        config.validate()?;

        let bus = Arc::new(InMemoryEventBus::with_config(config.bus.clone()));
        let publisher: Arc<dyn EventPublisher> = bus.clone();

        let mut chains = Vec::with_capacity(config.chains.len());
        for chain_config in &config.chains {
            let raw = clients
                .remove(&chain_config.id)
                .ok_or_else(|| ContainerError::MissingClient(chain_config.id.clone()))?;
            if raw.chain_id() != &chain_config.id {
                return Err(ContainerError::ClientMismatch {
                    expected: chain_config.id.clone(),
                    actual: raw.chain_id().clone(),
                });
            }

            let client: Arc<dyn ChainClient> =
                Arc::new(TimeoutChainClient::new(raw, chain_config.rpc_timeout()));
            let pipeline = Arc::new(ConfirmationPipeline::new(
                ConfirmationConfig {
                    retention_blocks: chain_config.retention_blocks,
                    ..ConfirmationConfig::new(chain_config.id.clone(), chain_config.required_depth)
                },
                Arc::clone(&publisher),
            ));

            info!(
                chain = %chain_config.id,
                feed = %chain_config.feed,
                required_depth = chain_config.required_depth,
                retention_blocks = chain_config.retention_blocks,
                "Chain subsystem initialized"
            );
            chains.push(ChainSubsystem {
                config: chain_config.clone(),
                client,
                pipeline,
            });
        }

        let checkpoints = config.checkpoint_dir.as_ref().map(|dir| {
            info!(dir = %dir.display(), "Watcher checkpoints enabled");
            let store: Arc<dyn CheckpointStore> = Arc::new(JsonCheckpointStore::new(dir));
            store
        });

        Ok(Self {
            config,
            bus,
            chains,
            checkpoints,
        })
    }

    /// Subsystem of `chain`.
    pub fn chain(&self, chain: &ChainId) -> Option<&ChainSubsystem> {
        self.chains.iter().find(|c| &c.config.id == chain)
    }
}
