//! Ports for the confirmation subsystem.

pub mod inbound;
