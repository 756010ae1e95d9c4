use criterion::{Criterion, criterion_group, criterion_main};
use order_webhook_watcher::app::{MatchPolicy, OrderMatcher};
use order_webhook_watcher::domain::{DedupKey, Direction, Payload, Transaction};
use std::hint::black_box;

fn bench_matcher(c: &mut Criterion) {
    let matcher = OrderMatcher::default();
    let text_tx = Transaction::new("tx-text", 1_714_564_800).with_payload(
        Direction::Inbound,
        Payload::Text("Payment for Order: 123456, thanks!".to_string()),
    );
    let hex_tx = Transaction::new("tx-hex", 1_714_564_800).with_payload(
        Direction::Inbound,
        Payload::Hex(hex::encode("Payment for Order: 123456, thanks!")),
    );
    let untracked_tx = Transaction::new("tx-plain", 1_714_564_800).with_payload(
        Direction::Inbound,
        Payload::Text("just a tip".to_string()),
    );

    c.bench_function("match_text_payload", |b| {
        b.iter(|| black_box(&matcher).match_transaction(black_box(&text_tx)))
    });
    c.bench_function("match_hex_payload", |b| {
        b.iter(|| black_box(&matcher).match_transaction(black_box(&hex_tx)))
    });
    c.bench_function("match_untracked", |b| {
        b.iter(|| black_box(&matcher).match_transaction(black_box(&untracked_tx)))
    });

    let markers = vec!["order:".to_string(), "invoice#".to_string(), "ref=".to_string()];
    let multi = OrderMatcher::new(MatchPolicy::new(&markers, None, true).unwrap());
    c.bench_function("match_three_markers", |b| {
        b.iter(|| black_box(&multi).match_text(black_box("paying ref=INV-77 now")))
    });
}

fn bench_dedup_key(c: &mut Criterion) {
    c.bench_function("dedup_key_from_base64_hash", |b| {
        b.iter(|| DedupKey::from_hash(black_box("q3Kb8w+V/1mZ0kT4rPp0tLqJm6b2sVh9gkA3W1pQ6xE=")))
    });
}

criterion_group!(benches, bench_matcher, bench_dedup_key);
criterion_main!(benches);
