//! # Adapter Implementations
//!
//! Concrete `ChainClient`s the runtime can wire without a remote node.

pub mod dev_chain;

pub use dev_chain::DevChainClient;
