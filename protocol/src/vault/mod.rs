//! # Vault
//!
//! The local party's view of the ledger: which states exist, which are
//! still unconsumed, and which finalized transactions it has recorded.
//!
//! ```text
//! store.rs      — StateStore trait, Lookup result type, VaultError
//! memory.rs     — MemoryVault: insertion-ordered, in-process
//! sled_vault.rs — SledVault: durable, sled-backed
//! ```
//!
//! Queries are snapshot reads, never locks. Between "selected as unconsumed"
//! and "submitted to the notary" another transaction may consume the same
//! state; only the notary can settle that race.

pub mod memory;
pub mod sled_vault;
pub mod store;

pub use memory::MemoryVault;
pub use sled_vault::SledVault;
pub use store::{Lookup, StateStore, VaultError};
