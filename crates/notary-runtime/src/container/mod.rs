//! # Notary Container
//!
//! Configuration and the per-chain subsystems built from it.

pub mod config;
pub mod subsystems;

pub use config::{ChainConfig, ConfigError, NotaryConfig, SignerConfig};
pub use subsystems::{ChainSubsystem, ContainerError, NotaryContainer};
