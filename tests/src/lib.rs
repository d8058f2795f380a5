//! # Distributed Notary Test Suite
//!
//! Unified test crate for flows that cross subsystem boundaries.
//!
//! ## Structure
//!
//! ```text
//! tests/
//! ├── src/integration/   # Cross-subsystem flows
//! │   ├── bus_flows.rs          # dn-01 → shared-bus delivery guarantees
//! │   ├── confirmation_flows.rs # depth, dedup, discard, ordering
//! │   ├── watcher_flows.rs      # dn-02 → dn-01 → bus, failures and reorgs
//! │   └── signing_flows.rs      # bus → dn-03 canonical signatures
//! └── benches/           # Criterion benchmarks
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p dn-tests
//! cargo test -p dn-tests integration::watcher_flows
//! cargo bench -p dn-tests
//! ```

pub mod integration;
