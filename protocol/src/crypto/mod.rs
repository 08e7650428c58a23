//! # Cryptographic Primitives
//!
//! Everything the redemption protocol signs or hashes goes through here:
//!
//! - **Ed25519** for party and notary signatures over canonical transaction ids.
//! - **SHA-256** (double) for canonical transaction identifiers.
//!
//! These are thin, typed wrappers around `ed25519-dalek` and `sha2`. Nothing
//! in this module knows what a stamp or a basket is.

pub mod hash;
pub mod keys;

pub use hash::{double_sha256, sha256};
pub use keys::{KeyError, PartyKeypair, PublicKey, Signature};
