// Copyright (c) 2026 Orchard Ledger Contributors. MIT License.
// See LICENSE for details.

//! # Orchard Ledger — Redemption Protocol
//!
//! Atomic exchange of a stamp (a bearer voucher) for a basket of goods over
//! a UTXO ledger. Both states are consumed and a re-owned basket is produced
//! in a single transaction that both parties sign and a uniqueness notary
//! certifies. Either the whole exchange happens or none of it does.
//!
//! ## Architecture
//!
//! - **crypto** — Ed25519 keys and SHA-256 hashing.
//! - **identity** — X.500 party names and the membership directory.
//! - **asset** — Stamp and Basket states, state references.
//! - **transaction** — Envelope building, canonical ids, contract, signing.
//! - **vault** — Per-party state store (in-memory and sled-backed).
//! - **notary** — Uniqueness and time-window certification.
//! - **session** — Peer messaging between flows.
//! - **flow** — The initiating and responding redemption flows.
//! - **config** — Protocol constants and flow configuration.
//!
//! ## Ground Rules
//!
//! 1. A transaction id commits to every field that can change its meaning.
//! 2. No state is consumed without a notary certificate.
//! 3. A responder signs only what it has validated itself.

pub mod asset;
pub mod config;
pub mod crypto;
pub mod flow;
pub mod identity;
pub mod notary;
pub mod session;
pub mod transaction;
pub mod vault;
