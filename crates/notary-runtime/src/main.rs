//! # Distributed Notary Runtime
//!
//! Entry point for a notary node.
//!
//! ## Startup Sequence
//!
//! 1. Load configuration (`DN_CONFIG`, `DN_LOG_LEVEL`)
//! 2. Initialize logging
//! 3. Load the local signing key
//! 4. Wire a development chain per configured chain and start producing
//! 5. Start one watcher per chain and the event signing handler
//! 6. Run until Ctrl-C, then shut down in order

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use dn_02_chain_watcher::{ChainClient, FeedMode};
use dn_03_signing::{address_from_pubkey, InMemoryKeyStore, KeyHandle, SignatureService};
use notary_runtime::adapters::DevChainClient;
use notary_runtime::container::config::LOG_LEVEL_ENV;
use notary_runtime::handlers::EventSigningHandler;
use notary_runtime::{NotaryConfig, NotaryRuntime};
use shared_bus::EventFilter;
use shared_types::ChainId;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// `DN_LOG_LEVEL`, then `RUST_LOG`, then the configured level.
fn log_filter(config: &NotaryConfig) -> Result<EnvFilter> {
    if std::env::var(LOG_LEVEL_ENV).is_err() {
        if let Ok(filter) = EnvFilter::try_from_default_env() {
            return Ok(filter);
        }
    }
    EnvFilter::try_new(&config.log_level)
        .with_context(|| format!("Invalid log level {:?}", config.log_level))
}

fn init_logging(config: &NotaryConfig) -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(log_filter(config)?)
        .with_target(true)
        .with_thread_ids(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to install tracing subscriber")?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = NotaryConfig::load().context("Failed to load notary configuration")?;
    init_logging(&config)?;

    // Local signing key
    let key = KeyHandle::new(config.signer.key.clone());
    let keys = InMemoryKeyStore::new();
    let public = keys
        .insert_from_seed(key.clone(), config.signer.dev_seed.as_bytes())
        .context("Failed to load signing key")?;
    info!(
        key = %key,
        address = %hex::encode(address_from_pubkey(&public)),
        "Signing key ready"
    );
    warn!("Using development signing key and development chains");

    // Development chains
    let mut dev_chains = Vec::with_capacity(config.chains.len());
    let mut clients: HashMap<ChainId, Arc<dyn ChainClient>> = HashMap::new();
    for chain in &config.chains {
        let dev = Arc::new(match chain.feed {
            FeedMode::Subscribe => DevChainClient::with_subscription(chain.id.clone()),
            FeedMode::Poll => DevChainClient::new(chain.id.clone()),
        });
        // Initial history
        dev.produce_blocks(chain.required_depth * 2);
        clients.insert(chain.id.clone(), dev.clone());
        dev_chains.push((dev, chain.dev_block_interval()));
    }

    let runtime = NotaryRuntime::new(config, clients).context("Failed to build notary runtime")?;

    let producers: Vec<_> = dev_chains
        .iter()
        .map(|(dev, block_interval)| dev.spawn_producer(*block_interval, runtime.shutdown_signal()))
        .collect();

    let signer = EventSigningHandler::new(Arc::new(SignatureService::new(keys)), key);
    let signer_task = tokio::spawn(signer.run(runtime.bus().subscribe(EventFilter::all())));

    runtime.start();

    info!("Notary is running. Press Ctrl+C to stop.");
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;

    for (chain, stats) in runtime.shutdown().await {
        info!(
            chain = %chain,
            last_processed = ?stats.last_processed,
            blocks = stats.blocks_processed,
            reorgs = stats.reorgs,
            "Watcher summary"
        );
    }
    for producer in producers {
        producer.await.context("Dev chain producer panicked")?;
    }
    let signed = signer_task.await.context("Signing handler panicked")?;
    info!(signed, "Notary stopped");

    Ok(())
}
