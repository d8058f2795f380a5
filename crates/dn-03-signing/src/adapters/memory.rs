//! In-process key store.
//!
//! Each secret lives once, inside a `parking_lot::Mutex`, and is wiped on
//! drop (`SigningKey` zeroizes itself). Callers only ever see public keys and
//! signatures.

use crate::domain::canonical::keccak256;
use crate::domain::entities::KeyHandle;
use crate::domain::errors::SigningError;
use crate::ports::outbound::KeyStore;
use k256::ecdsa::{RecoveryId, Signature, SigningKey, VerifyingKey};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::info;
use zeroize::Zeroizing;

struct KeyEntry {
    secret: Mutex<SigningKey>,
    public: VerifyingKey,
}

/// `KeyStore` backed by a map of in-memory secp256k1 keys.
#[derive(Default)]
pub struct InMemoryKeyStore {
    keys: RwLock<HashMap<KeyHandle, Arc<KeyEntry>>>,
}

impl InMemoryKeyStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a 32-byte big-endian secret under `key`, replacing any previous
    /// key with that handle.
    pub fn insert(&self, key: KeyHandle, secret: &[u8; 32]) -> Result<VerifyingKey, SigningError> {
        let signing_key = SigningKey::from_slice(secret).map_err(|_| SigningError::InvalidKey)?;
        let public = *signing_key.verifying_key();

        info!(key = %key, "[dn-03] Signing key loaded");
        self.keys.write().insert(
            key,
            Arc::new(KeyEntry {
                secret: Mutex::new(signing_key),
                public,
            }),
        );
        Ok(public)
    }

    /// Load the key whose secret is `keccak256(seed)`. For development
    /// setups only.
    pub fn insert_from_seed(
        &self,
        key: KeyHandle,
        seed: &[u8],
    ) -> Result<VerifyingKey, SigningError> {
        let secret = Zeroizing::new(keccak256(seed));
        self.insert(key, &secret)
    }

    /// Drop `key`. Returns whether it was loaded.
    pub fn remove(&self, key: &KeyHandle) -> bool {
        self.keys.write().remove(key).is_some()
    }

    /// Whether `key` is loaded.
    pub fn contains(&self, key: &KeyHandle) -> bool {
        self.keys.read().contains_key(key)
    }

    /// Number of loaded keys.
    pub fn len(&self) -> usize {
        self.keys.read().len()
    }

    /// Check if no key is loaded.
    pub fn is_empty(&self) -> bool {
        self.keys.read().is_empty()
    }

    fn entry(&self, key: &KeyHandle) -> Result<Arc<KeyEntry>, SigningError> {
        self.keys
            .read()
            .get(key)
            .cloned()
            .ok_or_else(|| SigningError::KeyUnavailable(key.to_string()))
    }
}

impl KeyStore for InMemoryKeyStore {
    fn sign_prehash(
        &self,
        key: &KeyHandle,
        digest: &[u8; 32],
    ) -> Result<(Signature, RecoveryId), SigningError> {
        let entry = self.entry(key)?;
        let secret = entry.secret.lock();
        secret
            .sign_prehash_recoverable(digest)
            .map_err(|e| SigningError::SigningFailed(e.to_string()))
    }

    fn public_key(&self, key: &KeyHandle) -> Result<VerifyingKey, SigningError> {
        Ok(self.entry(key)?.public)
    }
}

impl fmt::Debug for InMemoryKeyStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let keys = self.keys.read();
        f.debug_struct("InMemoryKeyStore")
            .field("keys", &keys.keys().collect::<Vec<_>>())
            .finish()
    }
}
