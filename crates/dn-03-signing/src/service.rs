//! # Signature Service
//!
//! Application service implementing `SigningApi` over a `KeyStore`.
//!
//! ## Flow
//!
//! 1. Key store signs the prehash (RFC 6979)
//! 2. Result is brought to low-S form
//! 3. Result is verified against the key's public half before release

use crate::domain::canonical::{canonicalize, verify_canonical};
use crate::domain::entities::{CanonicalSignature, KeyHandle, SigningRequest};
use crate::domain::errors::SigningError;
use crate::ports::inbound::SigningApi;
use crate::ports::outbound::KeyStore;
use k256::ecdsa::VerifyingKey;
use tracing::{debug, error};

/// Canonical signature service.
///
/// Stateless apart from the key store; safe to share across tasks.
pub struct SignatureService<K: KeyStore> {
    keys: K,
}

impl<K: KeyStore> SignatureService<K> {
    /// Create a service over `keys`.
    pub fn new(keys: K) -> Self {
        Self { keys }
    }

    /// The underlying key store.
    pub fn key_store(&self) -> &K {
        &self.keys
    }
}

impl<K: KeyStore> SigningApi for SignatureService<K> {
    fn sign(&self, request: &SigningRequest) -> Result<CanonicalSignature, SigningError> {
        let (raw, recovery_id) = self.keys.sign_prehash(&request.key, &request.digest)?;
        let signature = canonicalize(&raw, recovery_id);

        let public = self.keys.public_key(&request.key)?;
        if let Err(err) = verify_canonical(&request.digest, &signature, &public) {
            error!(
                key = %request.key,
                error = %err,
                "[dn-03] Produced signature failed self-verification"
            );
            return Err(err);
        }

        debug!(
            key = %request.key,
            digest = %hex::encode(request.digest),
            "[dn-03] Digest signed"
        );
        Ok(signature)
    }

    fn verify(
        &self,
        digest: &[u8; 32],
        signature: &CanonicalSignature,
        key: &KeyHandle,
    ) -> Result<(), SigningError> {
        let public = self.keys.public_key(key)?;
        verify_canonical(digest, signature, &public)
    }

    fn public_key(&self, key: &KeyHandle) -> Result<VerifyingKey, SigningError> {
        self.keys.public_key(key)
    }
}
