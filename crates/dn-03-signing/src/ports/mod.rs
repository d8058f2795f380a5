//! Ports layer - trait definitions for the signing subsystem.

pub mod inbound;
pub mod outbound;
