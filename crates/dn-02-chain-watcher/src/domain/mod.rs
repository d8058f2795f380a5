//! # Domain Layer
//!
//! Chain-agnostic bookkeeping used by the watcher.

pub mod reorg;

pub use reorg::{BlockHashWindow, ReorgCheck};
