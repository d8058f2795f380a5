//! Confirmation domain: records and the per-chain tracker.

mod record;
mod tracker;

pub use record::ConfirmationRecord;
pub use tracker::{ConfirmationTracker, ObserveOutcome};
