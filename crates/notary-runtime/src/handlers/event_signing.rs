//! Confirmed event signing handler.
//!
//! Subscribes to the bus and signs the Keccak digest of every confirmed
//! event with the local key. Signatures are logged; handing them to the
//! quorum protocol happens outside this process.

use std::sync::Arc;

use dn_03_signing::{
    event_digest, CanonicalSignature, KeyHandle, KeyStore, SignatureService, SigningApi,
    SigningError, SigningRequest,
};
use shared_bus::{Delivery, Subscription};
use shared_types::ConfirmedEvent;
use tracing::{error, info};

/// A confirmed event with this notary's signature over it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedEvent {
    /// Per-chain bus sequence number.
    pub seq: u64,
    pub event: ConfirmedEvent,
    pub digest: [u8; 32],
    pub signature: CanonicalSignature,
}

/// Handler turning bus deliveries into signed events.
pub struct EventSigningHandler<K: KeyStore> {
    service: Arc<SignatureService<K>>,
    key: KeyHandle,
}

impl<K: KeyStore> EventSigningHandler<K> {
    /// Sign with `key` through `service`.
    pub fn new(service: Arc<SignatureService<K>>, key: KeyHandle) -> Self {
        Self { service, key }
    }

    /// Sign one delivery.
    pub fn sign_delivery(&self, delivery: &Delivery) -> Result<SignedEvent, SigningError> {
        let digest = event_digest(&delivery.event);
        let signature = self
            .service
            .sign(&SigningRequest::new(digest, self.key.clone()))?;

        Ok(SignedEvent {
            seq: delivery.seq,
            event: delivery.event.clone(),
            digest,
            signature,
        })
    }

    /// Sign deliveries until the bus closes. Returns how many were signed.
    ///
    /// A failed signature is logged and the event skipped; signing errors are
    /// not retried.
    pub async fn run(self, mut subscription: Subscription) -> u64 {
        info!(key = %self.key, "[dn-03] Event signing handler started");
        let mut signed = 0u64;

        while let Some(delivery) = subscription.recv().await {
            match self.sign_delivery(&delivery) {
                Ok(signed_event) => {
                    signed += 1;
                    info!(
                        event = %signed_event.event.key(),
                        seq = signed_event.seq,
                        observed_height = signed_event.event.observed_height(),
                        confirmed_at = signed_event.event.confirmed_at,
                        digest = %hex::encode(signed_event.digest),
                        signature = %signed_event.signature.to_hex(),
                        "[dn-03] Confirmed event signed"
                    );
                }
                Err(e) => {
                    error!(
                        event = %delivery.event.key(),
                        error = %e,
                        "[dn-03] Failed to sign confirmed event"
                    );
                }
            }
        }

        info!(signed, "[dn-03] Event signing handler stopped");
        signed
    }
}
