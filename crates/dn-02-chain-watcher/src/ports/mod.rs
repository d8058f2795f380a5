//! # Ports Module
//!
//! Outbound dependencies of the watcher.

pub mod outbound;

pub use outbound::*;
