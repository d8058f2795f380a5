//! # Signing Flows
//!
//! Confirmed events travel pipeline (dn-01) → bus → `EventSigningHandler`
//! and come out with canonical signatures (dn-03) that any notary holding
//! the same key reproduces byte for byte.

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use dn_01_confirmation::{ConfirmationConfig, ConfirmationPipeline, ConfirmationSink};
    use dn_03_signing::{
        address_from_pubkey, ensure_canonical, event_digest, invert_s, is_canonical,
        recover_public_key, verify_canonical, CanonicalSignature, InMemoryKeyStore, KeyHandle,
        SignatureService, SigningApi, SigningError, SigningRequest,
    };
    use k256::ecdsa::SigningKey;
    use notary_runtime::handlers::EventSigningHandler;
    use rand::rngs::OsRng;
    use shared_bus::{EventFilter, EventPublisher, InMemoryEventBus};
    use shared_types::{BlockHeight, ChainId, ConfirmedEvent};
    use tokio::time::timeout;

    use crate::integration::deposit;

    const SEED: &[u8] = b"notary federation test seed";

    fn notary(seed: &[u8]) -> Arc<SignatureService<InMemoryKeyStore>> {
        let store = InMemoryKeyStore::new();
        store.insert_from_seed(KeyHandle::new("notary"), seed).unwrap();
        Arc::new(SignatureService::new(store))
    }

    fn confirmed(id: &str, height: BlockHeight, confirmed_at: BlockHeight) -> ConfirmedEvent {
        ConfirmedEvent {
            event: deposit("bitcoin", id, height),
            confirmed_at,
        }
    }

    fn request(digest: [u8; 32]) -> SigningRequest {
        SigningRequest::new(digest, KeyHandle::new("notary"))
    }

    /// Two notaries holding the same key agree on every signature; the
    /// high-S twin of an accepted signature is refused.
    #[test]
    fn test_notaries_agree_byte_for_byte() {
        let a = notary(SEED);
        let b = notary(SEED);

        for height in 1..=16u64 {
            let event = confirmed(&format!("tx-{height}"), height, height + 5);
            let digest = event_digest(&event);

            let sig_a = a.sign(&request(digest)).unwrap();
            let sig_b = b.sign(&request(digest)).unwrap();
            assert_eq!(sig_a.to_bytes(), sig_b.to_bytes());
            assert!(is_canonical(&sig_a));

            let twin = CanonicalSignature {
                s: invert_s(&sig_a.s),
                recovery_id: sig_a.recovery_id ^ 1,
                ..sig_a
            };
            assert_eq!(ensure_canonical(&twin), Err(SigningError::NonCanonical));
            assert!(b
                .verify(&digest, &twin, &KeyHandle::new("notary"))
                .is_err());
        }
    }

    #[test]
    fn test_different_keys_disagree() {
        let a = notary(SEED);
        let b = notary(b"another seed");
        let digest = event_digest(&confirmed("tx", 1, 6));

        let sig_a = a.sign(&request(digest)).unwrap();
        let sig_b = b.sign(&request(digest)).unwrap();
        assert_ne!(sig_a, sig_b);

        let key_b = b.public_key(&KeyHandle::new("notary")).unwrap();
        assert_eq!(
            verify_canonical(&digest, &sig_a, &key_b),
            Err(SigningError::VerificationFailed)
        );
    }

    #[test]
    fn test_random_keys_always_low_s() {
        for round in 0..8u8 {
            let secret: [u8; 32] = SigningKey::random(&mut OsRng).to_bytes().into();
            let store = InMemoryKeyStore::new();
            let public = store.insert(KeyHandle::new("notary"), &secret).unwrap();
            let service = SignatureService::new(store);

            for i in 0..8u8 {
                let digest = [round.wrapping_mul(31).wrapping_add(i); 32];
                let sig = service.sign(&request(digest)).unwrap();
                assert!(is_canonical(&sig));
                verify_canonical(&digest, &sig, &public).unwrap();
            }
        }
    }

    /// Confirmation → bus → signer, with the signer recoverable from every
    /// signature.
    #[tokio::test]
    async fn test_confirmed_events_are_signed() {
        let bus = Arc::new(InMemoryEventBus::new());
        let publisher: Arc<dyn EventPublisher> = bus.clone();
        let pipeline =
            ConfirmationPipeline::new(ConfirmationConfig::new(ChainId::new("bitcoin"), 3), publisher);

        let service = notary(SEED);
        let key = service.public_key(&KeyHandle::new("notary")).unwrap();
        let handler = EventSigningHandler::new(Arc::clone(&service), KeyHandle::new("notary"));
        let mut sub = bus.subscribe(EventFilter::all());

        pipeline
            .observe_block(10, vec![deposit("bitcoin", "a", 10), deposit("bitcoin", "b", 10)])
            .await;
        pipeline.observe_block(11, vec![deposit("bitcoin", "c", 11)]).await;
        pipeline.advance_height(13).await;

        let mut signed = Vec::new();
        for _ in 0..3 {
            let delivery = timeout(Duration::from_secs(5), sub.recv())
                .await
                .unwrap()
                .unwrap();
            signed.push(handler.sign_delivery(&delivery).unwrap());
        }

        let ids: Vec<_> = signed.iter().map(|s| s.event.id().as_str().to_string()).collect();
        assert_eq!(ids, ["a", "b", "c"]);
        assert_eq!(signed.iter().map(|s| s.seq).collect::<Vec<_>>(), [1, 2, 3]);

        for s in &signed {
            assert_eq!(s.digest, event_digest(&s.event));
            let recovered = recover_public_key(&s.digest, &s.signature).unwrap();
            assert_eq!(address_from_pubkey(&recovered), address_from_pubkey(&key));
        }

        // A second notary signing the same deliveries produces the same bytes
        let peer = EventSigningHandler::new(notary(SEED), KeyHandle::new("notary"));
        let mut replay = bus.subscribe_from(EventFilter::all(), Default::default());
        for s in &signed {
            let delivery = replay.recv().await.unwrap();
            let theirs = peer.sign_delivery(&delivery).unwrap();
            assert_eq!(theirs.signature.to_bytes(), s.signature.to_bytes());
        }
    }

    #[tokio::test]
    async fn test_handler_skips_unavailable_key() {
        let bus = Arc::new(InMemoryEventBus::new());
        let handler = EventSigningHandler::new(notary(SEED), KeyHandle::new("missing"));
        let sub = bus.subscribe(EventFilter::all());
        let task = tokio::spawn(handler.run(sub));

        bus.publish(confirmed("a", 1, 6)).await;
        bus.close();

        assert_eq!(task.await.unwrap(), 0);
    }
}
