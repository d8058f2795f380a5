//! # Signing Entities
//!
//! Requests, key handles and the canonical signature encoding.

use super::canonical::parse_recovery_id;
use super::errors::SigningError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// 20-byte Ethereum-style address derived from a public key.
pub type Address = [u8; 20];

/// Length of the `r || s || v` encoding.
pub const SIGNATURE_LEN: usize = 65;

/// Name of a key held by a `KeyStore`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeyHandle(String);

impl KeyHandle {
    /// Wrap a key name.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Key name.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for KeyHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for KeyHandle {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// A digest to sign with a named key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SigningRequest {
    /// Prehashed message (Keccak-256)
    pub digest: [u8; 32],
    /// Key to sign with
    pub key: KeyHandle,
}

impl SigningRequest {
    /// Create a request.
    pub fn new(digest: [u8; 32], key: KeyHandle) -> Self {
        Self { digest, key }
    }
}

/// secp256k1 ECDSA signature with `s <= n/2`.
///
/// `recovery_id` is the raw k256 recovery byte (0 or 1 in practice).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CanonicalSignature {
    /// R component (32 bytes, big-endian)
    pub r: [u8; 32],
    /// S component (32 bytes, big-endian)
    pub s: [u8; 32],
    /// Recovery ID
    pub recovery_id: u8,
}

impl CanonicalSignature {
    /// `r || s || recovery_id`.
    pub fn to_bytes(&self) -> [u8; SIGNATURE_LEN] {
        self.encode(0)
    }

    /// `r || s || (recovery_id + 27)`, the Ethereum convention.
    pub fn to_eth_bytes(&self) -> [u8; SIGNATURE_LEN] {
        self.encode(27)
    }

    /// Parse `r || s || v` where v is 0, 1, 27 or 28.
    ///
    /// Does not check canonicality; see `ensure_canonical`.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SigningError> {
        if bytes.len() != SIGNATURE_LEN {
            return Err(SigningError::InvalidFormat);
        }

        let mut r = [0u8; 32];
        let mut s = [0u8; 32];
        r.copy_from_slice(&bytes[..32]);
        s.copy_from_slice(&bytes[32..64]);
        let recovery_id = parse_recovery_id(bytes[64])?.to_byte();

        Ok(Self { r, s, recovery_id })
    }

    /// Lower-case hex of `to_bytes`.
    pub fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }

    fn encode(&self, v_offset: u8) -> [u8; SIGNATURE_LEN] {
        let mut out = [0u8; SIGNATURE_LEN];
        out[..32].copy_from_slice(&self.r);
        out[32..64].copy_from_slice(&self.s);
        out[64] = self.recovery_id + v_offset;
        out
    }
}
