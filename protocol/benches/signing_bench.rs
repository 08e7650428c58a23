// Canonical id and signing benchmarks for redemption transactions.
//
// Covers envelope building (which hashes the canonical bytes), id
// recomputation, Ed25519 signing over the id, and full signed-transaction
// verification against the notary's checks.

use chrono::{TimeZone, Utc};
use criterion::{criterion_group, criterion_main, Criterion};

use orchard_protocol::asset::{Basket, StateRef};
use orchard_protocol::crypto::PartyKeypair;
use orchard_protocol::identity::PartyName;
use orchard_protocol::transaction::{
    verify_signed, Command, SignatureBundle, SignedTransaction, TimeWindow, TransactionBuilder,
    TransactionEnvelope, TransactionId,
};

fn envelope(seller: &PartyKeypair, buyer: &PartyKeypair) -> TransactionEnvelope {
    let basket = Basket::new("apples", "Orchard Farm", seller.public_key(), 10);
    let until = Utc
        .timestamp_millis_opt(1_700_000_000_000)
        .single()
        .expect("valid timestamp");
    TransactionBuilder::new(Command::Redeem)
        .notary(PartyName::new("O=Notary, L=London, C=GB"))
        .add_input(StateRef::new(TransactionId::from_bytes([1; 32]), 0))
        .add_input(StateRef::new(TransactionId::from_bytes([2; 32]), 0))
        .add_output(basket.change_owner(buyer.public_key()).into())
        .time_window(TimeWindow::until(until))
        .add_signatories([seller.public_key(), buyer.public_key()])
        .build()
        .expect("valid envelope")
}

fn bench_build_envelope(c: &mut Criterion) {
    let seller = PartyKeypair::generate();
    let buyer = PartyKeypair::generate();

    c.bench_function("redeem/build_envelope", |b| {
        b.iter(|| envelope(&seller, &buyer));
    });
}

fn bench_compute_id(c: &mut Criterion) {
    let seller = PartyKeypair::generate();
    let buyer = PartyKeypair::generate();
    let env = envelope(&seller, &buyer);

    c.bench_function("redeem/compute_id", |b| {
        b.iter(|| env.compute_id());
    });
}

fn bench_sign(c: &mut Criterion) {
    let seller = PartyKeypair::generate();
    let buyer = PartyKeypair::generate();
    let env = envelope(&seller, &buyer);

    c.bench_function("redeem/sign_id", |b| {
        b.iter(|| {
            let mut bundle = SignatureBundle::new();
            bundle.sign(&env.id, &seller);
            bundle
        });
    });
}

fn bench_verify_signed(c: &mut Criterion) {
    let seller = PartyKeypair::generate();
    let buyer = PartyKeypair::generate();
    let env = envelope(&seller, &buyer);
    let mut bundle = SignatureBundle::new();
    bundle.sign(&env.id, &seller);
    bundle.sign(&env.id, &buyer);
    let signed = SignedTransaction::new(env, bundle);

    c.bench_function("redeem/verify_signed", |b| {
        b.iter(|| verify_signed(&signed).expect("fully signed"));
    });
}

criterion_group!(
    benches,
    bench_build_envelope,
    bench_compute_id,
    bench_sign,
    bench_verify_signed
);
criterion_main!(benches);
