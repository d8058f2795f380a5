//! Adapters layer - key store implementations.

mod memory;

pub use memory::InMemoryKeyStore;
