//! # Inbound Ports (Driving Ports / API)
//!
//! Implementations must be thread-safe (`Send + Sync`).

use crate::domain::entities::{CanonicalSignature, KeyHandle, SigningRequest};
use crate::domain::errors::SigningError;
use k256::ecdsa::VerifyingKey;

/// Canonical signing API.
pub trait SigningApi: Send + Sync {
    /// Sign `request.digest` with `request.key`.
    ///
    /// The result is low-S and has been verified against the key's public
    /// half before it is returned.
    ///
    /// # Errors
    /// * `SigningError::KeyUnavailable` - the key handle cannot be loaded
    fn sign(&self, request: &SigningRequest) -> Result<CanonicalSignature, SigningError>;

    /// Verify a canonical signature against a held key.
    fn verify(
        &self,
        digest: &[u8; 32],
        signature: &CanonicalSignature,
        key: &KeyHandle,
    ) -> Result<(), SigningError>;

    /// Public half of a held key.
    fn public_key(&self, key: &KeyHandle) -> Result<VerifyingKey, SigningError>;
}
