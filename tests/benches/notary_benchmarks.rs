//! # Distributed Notary Benchmarks
//!
//! Hot paths of a notary under load.
//!
//! ```bash
//! cargo bench -p dn-tests --bench notary_benchmarks
//! cargo bench -p dn-tests --bench notary_benchmarks -- dn-03
//! ```
//!
//! | Group | Path |
//! |-------|------|
//! | dn-01/tracker | observe + advance over many pending events |
//! | dn-03/digest | event digest of a confirmed event |
//! | dn-03/sign | canonical sign, sign + verify |

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use dn_01_confirmation::ConfirmationTracker;
use dn_03_signing::{
    event_digest, verify_canonical, InMemoryKeyStore, KeyHandle, SignatureService, SigningApi,
    SigningRequest,
};
use rand::Rng;
use shared_types::{CandidateEvent, ChainId, ConfirmedEvent, EventId, EventKind};
use std::time::Duration;

const REQUIRED_DEPTH: u64 = 6;

fn candidate(n: u64, height: u64) -> CandidateEvent {
    CandidateEvent::new(
        ChainId::new("bitcoin"),
        EventId::new(format!("tx-{n}")),
        height,
        EventKind::Deposit,
        n.to_be_bytes().to_vec(),
    )
}

fn bench_tracker(c: &mut Criterion) {
    let mut group = c.benchmark_group("dn-01/tracker");

    for per_block in [10u64, 100, 1_000] {
        let blocks = 50u64;
        group.throughput(Throughput::Elements(per_block * blocks));
        group.bench_with_input(
            BenchmarkId::new("observe_advance", per_block),
            &per_block,
            |b, &per_block| {
                b.iter(|| {
                    let mut tracker =
                        ConfirmationTracker::new(ChainId::new("bitcoin"), REQUIRED_DEPTH, 1024);
                    let mut confirmed = 0usize;
                    for height in 1..=blocks {
                        for i in 0..per_block {
                            tracker.observe(candidate(height * per_block + i, height));
                        }
                        confirmed += tracker.advance_height(height).len();
                    }
                    black_box(confirmed)
                });
            },
        );
    }

    group.bench_function("duplicate_observe", |b| {
        let mut tracker = ConfirmationTracker::new(ChainId::new("bitcoin"), REQUIRED_DEPTH, 1024);
        tracker.observe(candidate(1, 1));
        b.iter(|| black_box(tracker.observe(candidate(1, 1))));
    });

    group.finish();
}

fn bench_digest(c: &mut Criterion) {
    let mut group = c.benchmark_group("dn-03/digest");
    let mut rng = rand::thread_rng();

    for size in [32usize, 256, 4096] {
        let payload: Vec<u8> = (0..size).map(|_| rng.gen()).collect();
        let event = ConfirmedEvent {
            event: CandidateEvent::new(
                ChainId::new("spectrum"),
                EventId::new("0xabc:0"),
                1_000,
                EventKind::Withdrawal,
                payload,
            ),
            confirmed_at: 1_011,
        };
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::new("event_digest", size), &event, |b, event| {
            b.iter(|| event_digest(black_box(event)))
        });
    }

    group.finish();
}

fn bench_sign(c: &mut Criterion) {
    let mut group = c.benchmark_group("dn-03/sign");
    let store = InMemoryKeyStore::new();
    let key = KeyHandle::new("bench");
    let public = match store.insert_from_seed(key.clone(), b"bench seed") {
        Ok(public) => public,
        Err(e) => panic!("load bench key: {e}"),
    };
    let service = SignatureService::new(store);

    let mut rng = rand::thread_rng();
    let digests: Vec<[u8; 32]> = (0..256).map(|_| rng.gen()).collect();

    group.bench_function("sign", |b| {
        let mut i = 0usize;
        b.iter(|| {
            i = (i + 1) % digests.len();
            service.sign(&SigningRequest::new(digests[i], key.clone()))
        })
    });

    group.bench_function("sign_then_verify", |b| {
        let mut i = 0usize;
        b.iter(|| {
            i = (i + 1) % digests.len();
            let digest = digests[i];
            let signature = service.sign(&SigningRequest::new(digest, key.clone()));
            signature.map(|sig| verify_canonical(&digest, &sig, &public).is_ok())
        })
    });

    group.finish();
}

criterion_group!(
    name = notary_benches;
    config = Criterion::default()
        .sample_size(50)
        .measurement_time(Duration::from_secs(5));
    targets = bench_tracker, bench_digest, bench_sign
);

criterion_main!(notary_benches);
