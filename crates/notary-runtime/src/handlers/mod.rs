//! # Event Handlers
//!
//! Consumers of the event bus running inside the notary process.

pub mod event_signing;

pub use event_signing::{EventSigningHandler, SignedEvent};
