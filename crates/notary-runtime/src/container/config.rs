//! # Notary Configuration
//!
//! Typed configuration read from a JSON file, with environment overrides.
//!
//! ## Sources (later wins)
//!
//! 1. Built-in defaults (one poll chain, one subscription chain)
//! 2. The file named by `DN_CONFIG` (default `notary.json`, optional)
//! 3. `DN_LOG_LEVEL`

use dn_01_confirmation::DEFAULT_RETENTION_BLOCKS;
use dn_02_chain_watcher::{
    FeedMode, WatcherConfig, DEFAULT_POLL_INTERVAL_MS, DEFAULT_PROGRESS_LOG_INTERVAL,
    DEFAULT_RPC_TIMEOUT_MS,
};
use serde::{Deserialize, Serialize};
use shared_bus::BusConfig;
use shared_types::{BlockHeight, ChainId};
use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Environment variable naming the config file.
pub const CONFIG_ENV: &str = "DN_CONFIG";

/// Environment variable overriding `log_level`.
pub const LOG_LEVEL_ENV: &str = "DN_LOG_LEVEL";

/// Config file read when `DN_CONFIG` is unset.
pub const DEFAULT_CONFIG_PATH: &str = "notary.json";

/// Default confirmation depth.
pub const DEFAULT_REQUIRED_DEPTH: u64 = 6;

/// Default height span of recorded block hashes.
pub const DEFAULT_REORG_WINDOW: u64 = 256;

/// Directory of per-chain watcher checkpoints unless configured otherwise.
pub const DEFAULT_CHECKPOINT_DIR: &str = "data/checkpoints";

/// Default block interval of development chains.
pub const DEFAULT_DEV_BLOCK_INTERVAL_MS: u64 = 1_000;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file exists but could not be read.
    #[error("Failed to read config file {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The config file is not valid JSON for `NotaryConfig`.
    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    /// No chain is configured.
    #[error("No chains configured")]
    NoChains,

    /// A chain has an empty id.
    #[error("Chain id must not be empty")]
    EmptyChainId,

    /// Two chain entries share an id.
    #[error("Chain {0} configured more than once")]
    DuplicateChain(ChainId),

    /// A per-chain value must be positive.
    #[error("Chain {chain}: {field} must be greater than zero")]
    ZeroValue { chain: ChainId, field: &'static str },

    /// A bus sizing value must be positive.
    #[error("Bus: {0} must be greater than zero")]
    InvalidBus(&'static str),
}

/// Complete notary configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotaryConfig {
    /// Watched chains.
    pub chains: Vec<ChainConfig>,
    /// Event bus sizing.
    pub bus: BusConfig,
    /// Log filter directive used when neither `DN_LOG_LEVEL` nor `RUST_LOG`
    /// is set.
    pub log_level: String,
    /// Local signing key.
    pub signer: SignerConfig,
    /// Where watchers persist their last processed height. `null` disables
    /// checkpoints, so a restart begins `required_depth` below the tip.
    pub checkpoint_dir: Option<PathBuf>,
}

impl Default for NotaryConfig {
    fn default() -> Self {
        Self {
            chains: vec![
                ChainConfig::new("bitcoin"),
                ChainConfig {
                    feed: FeedMode::Subscribe,
                    required_depth: 12,
                    ..ChainConfig::new("spectrum")
                },
            ],
            bus: BusConfig::default(),
            log_level: "info".to_string(),
            signer: SignerConfig::default(),
            checkpoint_dir: Some(PathBuf::from(DEFAULT_CHECKPOINT_DIR)),
        }
    }
}

impl NotaryConfig {
    /// Parse a JSON document. Missing fields take their defaults.
    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Load from the process environment and validate.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with(|name| std::env::var(name).ok())
    }

    /// Load using `var` to look up environment variables, then validate.
    ///
    /// A missing file is only an error when `DN_CONFIG` names it explicitly.
    pub fn load_with(var: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let explicit = var(CONFIG_ENV);
        let path = PathBuf::from(explicit.as_deref().unwrap_or(DEFAULT_CONFIG_PATH));

        let mut config = match std::fs::read_to_string(&path) {
            Ok(raw) => Self::from_json(&raw)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound && explicit.is_none() => {
                Self::default()
            }
            Err(source) => return Err(ConfigError::Read { path, source }),
        };

        if let Some(level) = var(LOG_LEVEL_ENV) {
            config.log_level = level;
        }

        config.validate()?;
        Ok(config)
    }

    /// Check values the runtime cannot start with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chains.is_empty() {
            return Err(ConfigError::NoChains);
        }

        let mut seen = HashSet::new();
        for chain in &self.chains {
            chain.validate()?;
            if !seen.insert(&chain.id) {
                return Err(ConfigError::DuplicateChain(chain.id.clone()));
            }
        }

        if self.bus.channel_capacity == 0 {
            return Err(ConfigError::InvalidBus("channel_capacity"));
        }
        if self.bus.dedup_window_blocks == 0 {
            return Err(ConfigError::InvalidBus("dedup_window_blocks"));
        }
        if self.bus.replay_buffer == 0 {
            return Err(ConfigError::InvalidBus("replay_buffer"));
        }

        Ok(())
    }

    /// Configuration of `chain`.
    pub fn chain(&self, chain: &ChainId) -> Option<&ChainConfig> {
        self.chains.iter().find(|c| &c.id == chain)
    }
}

/// One watched chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainConfig {
    /// Chain namespace.
    pub id: ChainId,
    /// Access model.
    pub feed: FeedMode,
    /// Blocks (including the event's own) before an event is confirmed.
    pub required_depth: u64,
    /// Tip poll interval; also the fallback interval of subscription feeds.
    pub poll_interval_ms: u64,
    /// Upper bound on each RPC call.
    pub rpc_timeout_ms: u64,
    /// Processed blocks between progress log lines.
    pub progress_log_interval: u64,
    /// Emit a `NewBlock` event per processed block.
    pub emit_new_block_events: bool,
    /// First height to process; defaults to `required_depth` below the tip.
    pub start_height: Option<BlockHeight>,
    /// Recorded block hashes kept for reorg detection.
    pub reorg_window: u64,
    /// Heights below the tip for which confirmed ids are remembered.
    pub retention_blocks: u64,
    /// Block interval when this chain is served by a development chain.
    pub dev_block_interval_ms: u64,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            id: ChainId::new(""),
            feed: FeedMode::Poll,
            required_depth: DEFAULT_REQUIRED_DEPTH,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            rpc_timeout_ms: DEFAULT_RPC_TIMEOUT_MS,
            progress_log_interval: DEFAULT_PROGRESS_LOG_INTERVAL,
            emit_new_block_events: false,
            start_height: None,
            reorg_window: DEFAULT_REORG_WINDOW,
            retention_blocks: DEFAULT_RETENTION_BLOCKS,
            dev_block_interval_ms: DEFAULT_DEV_BLOCK_INTERVAL_MS,
        }
    }
}

impl ChainConfig {
    /// Poll chain `id` with default settings.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: ChainId::new(id),
            ..Self::default()
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_millis(self.rpc_timeout_ms)
    }

    pub fn dev_block_interval(&self) -> Duration {
        Duration::from_millis(self.dev_block_interval_ms)
    }

    /// Settings for this chain's `ChainWatcher`.
    pub fn watcher_config(&self) -> WatcherConfig {
        WatcherConfig {
            required_depth: self.required_depth,
            start_height: self.start_height,
            progress_log_interval: self.progress_log_interval,
            emit_new_block_events: self.emit_new_block_events,
            reorg_window: self.reorg_window,
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.id.as_str().is_empty() {
            return Err(ConfigError::EmptyChainId);
        }

        let positive = [
            ("required_depth", self.required_depth),
            ("poll_interval_ms", self.poll_interval_ms),
            ("rpc_timeout_ms", self.rpc_timeout_ms),
            ("progress_log_interval", self.progress_log_interval),
            ("reorg_window", self.reorg_window),
            ("retention_blocks", self.retention_blocks),
            ("dev_block_interval_ms", self.dev_block_interval_ms),
        ];
        for (field, value) in positive {
            if value == 0 {
                return Err(ConfigError::ZeroValue {
                    chain: self.id.clone(),
                    field,
                });
            }
        }

        Ok(())
    }
}

/// Local signing key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignerConfig {
    /// Key handle the signature is logged under.
    pub key: String,
    /// Seed the development key is derived from.
    pub dev_seed: String,
}

impl Default for SignerConfig {
    fn default() -> Self {
        Self {
            key: "notary-dev".to_string(),
            dev_seed: "distributed-notary development key".to_string(),
        }
    }
}
