//! # Shared Types Crate
//!
//! Domain entities and the error taxonomy shared by the notary subsystems.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: every type that crosses a crate boundary
//!   (candidate events, confirmed events, chain blocks) is defined here.
//! - **Chain Namespacing**: every event key is scoped by its [`ChainId`];
//!   identical event ids on different chains never collide.
//! - **Immutability**: a [`CandidateEvent`] is never mutated after creation.
//!   Confirmation progress lives in the tracker, not in the event.

pub mod entities;
pub mod errors;

pub use entities::*;
pub use errors::*;
