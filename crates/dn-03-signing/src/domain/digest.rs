//! Signing digest of a confirmed event.
//!
//! Every notary must hash an event to the same 32 bytes, so the encoding is
//! fixed: a domain tag, then each variable-length field prefixed with its
//! length as a big-endian `u64`. `confirmed_at` is local progress and is
//! not covered.

use super::canonical::keccak256;
use shared_types::{ConfirmedEvent, EventKind};

const DOMAIN_TAG: &[u8] = b"distributed-notary/event/v1";

/// Keccak-256 digest a notary signs for `event`.
pub fn event_digest(event: &ConfirmedEvent) -> [u8; 32] {
    keccak256(&preimage(event))
}

fn preimage(event: &ConfirmedEvent) -> Vec<u8> {
    let candidate = &event.event;
    let mut buf = Vec::with_capacity(
        DOMAIN_TAG.len() + candidate.payload.len() + candidate.id.as_str().len() + 96,
    );

    buf.extend_from_slice(DOMAIN_TAG);
    put_bytes(&mut buf, candidate.chain.as_str().as_bytes());
    put_bytes(&mut buf, candidate.id.as_str().as_bytes());
    buf.extend_from_slice(&candidate.observed_height.to_be_bytes());
    buf.push(kind_tag(candidate.kind));
    put_bytes(&mut buf, &candidate.payload);
    buf
}

fn put_bytes(buf: &mut Vec<u8>, bytes: &[u8]) {
    // usize is at most 64 bits on every supported target
    buf.extend_from_slice(&(bytes.len() as u64).to_be_bytes());
    buf.extend_from_slice(bytes);
}

fn kind_tag(kind: EventKind) -> u8 {
    match kind {
        EventKind::NewBlock => 0,
        EventKind::Deposit => 1,
        EventKind::Withdrawal => 2,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_types::{CandidateEvent, ChainId, EventId};

    fn confirmed(chain: &str, id: &str, payload: &[u8], confirmed_at: u64) -> ConfirmedEvent {
        ConfirmedEvent {
            event: CandidateEvent::new(
                ChainId::new(chain),
                EventId::new(id),
                100,
                EventKind::Deposit,
                payload.to_vec(),
            ),
            confirmed_at,
        }
    }

    #[test]
    fn test_digest_ignores_confirmation_height() {
        assert_eq!(
            event_digest(&confirmed("bitcoin", "aa:0", b"x", 106)),
            event_digest(&confirmed("bitcoin", "aa:0", b"x", 140))
        );
    }

    #[test]
    fn test_digest_binds_chain_and_payload() {
        let base = event_digest(&confirmed("bitcoin", "aa:0", b"x", 106));
        assert_ne!(base, event_digest(&confirmed("spectrum", "aa:0", b"x", 106)));
        assert_ne!(base, event_digest(&confirmed("bitcoin", "aa:0", b"y", 106)));
    }

    #[test]
    fn test_length_prefix_prevents_field_shifting() {
        assert_ne!(
            event_digest(&confirmed("ab", "c", b"", 1)),
            event_digest(&confirmed("a", "bc", b"", 1))
        );
    }

    #[test]
    fn test_preimage_layout() {
        let mut expected = DOMAIN_TAG.to_vec();
        expected.extend_from_slice(&[0, 0, 0, 0, 0, 0, 0, 2]);
        expected.extend_from_slice(b"ab");
        expected.extend_from_slice(&[0, 0, 0, 0, 0, 0, 0, 4]);
        expected.extend_from_slice(b"cc:0");
        expected.extend_from_slice(&100u64.to_be_bytes());
        expected.push(1);
        expected.extend_from_slice(&[0, 0, 0, 0, 0, 0, 0, 3]);
        expected.extend_from_slice(b"xyz");

        assert_eq!(preimage(&confirmed("ab", "cc:0", b"xyz", 101)), expected);
    }

    #[test]
    fn test_large_payload_length_not_truncated() {
        let payload = vec![7u8; (u16::MAX as usize) + 2];
        let bytes = preimage(&confirmed("bitcoin", "aa:0", &payload, 101));

        let prefix_at = bytes.len() - payload.len() - 8;
        let prefix: [u8; 8] = bytes[prefix_at..prefix_at + 8].try_into().unwrap();
        assert_eq!(u64::from_be_bytes(prefix), payload.len() as u64);
    }
}
