//! # Canonical Signature Subsystem (DN-03)
//!
//! Produces secp256k1 ECDSA signatures in canonical low-S form so that every
//! notary signing the same digest with the same key emits byte-identical
//! signatures.
//!
//! ## Architecture
//!
//! - **Domain Layer** (`domain/`): canonicalization, encoding, digests; no I/O
//! - **Ports Layer** (`ports/`): `SigningApi` (inbound), `KeyStore` (outbound)
//! - **Adapters** (`adapters/`): `InMemoryKeyStore`
//! - **Service Layer** (`service.rs`): sign, canonicalize, self-verify
//!
//! ## Security Notes
//!
//! - **Deterministic nonces**: RFC 6979, no RNG at signing time
//! - **Malleability**: `s > n/2` is replaced by `n - s` and the recovery parity
//!   flipped; `ensure_canonical` rejects high-S encodings
//! - **Key custody**: each secret is held once, behind a mutex, and never
//!   leaves the key store

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod service;

// Re-export public API
pub use adapters::InMemoryKeyStore;
pub use domain::canonical::{
    address_from_pubkey, canonicalize, ensure_canonical, invert_s, is_canonical, keccak256,
    recover_public_key, verify_canonical,
};
pub use domain::digest::event_digest;
pub use domain::entities::{Address, CanonicalSignature, KeyHandle, SigningRequest};
pub use domain::errors::SigningError;
pub use ports::inbound::SigningApi;
pub use ports::outbound::KeyStore;
pub use service::SignatureService;
