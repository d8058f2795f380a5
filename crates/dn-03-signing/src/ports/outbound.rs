//! # Outbound Ports (Driven Ports / SPI)
//!
//! Key custody. The secret never crosses this boundary: the store signs and
//! hands back the raw, not yet canonical, result.

use crate::domain::entities::KeyHandle;
use crate::domain::errors::SigningError;
use k256::ecdsa::{RecoveryId, Signature, VerifyingKey};
use std::sync::Arc;

/// Holder of signing keys.
pub trait KeyStore: Send + Sync {
    /// RFC 6979 deterministic ECDSA over a 32-byte prehash.
    ///
    /// # Errors
    /// * `SigningError::KeyUnavailable` - `key` is not loaded
    /// * `SigningError::SigningFailed` - the signer rejected the digest
    fn sign_prehash(
        &self,
        key: &KeyHandle,
        digest: &[u8; 32],
    ) -> Result<(Signature, RecoveryId), SigningError>;

    /// Public half of `key`.
    fn public_key(&self, key: &KeyHandle) -> Result<VerifyingKey, SigningError>;
}

impl<T: KeyStore + ?Sized> KeyStore for Arc<T> {
    fn sign_prehash(
        &self,
        key: &KeyHandle,
        digest: &[u8; 32],
    ) -> Result<(Signature, RecoveryId), SigningError> {
        (**self).sign_prehash(key, digest)
    }

    fn public_key(&self, key: &KeyHandle) -> Result<VerifyingKey, SigningError> {
        (**self).public_key(key)
    }
}
