//! # Identity
//!
//! Party names, their ledger keys, and the membership directory used to
//! resolve one into the other.
//!
//! ```text
//! party.rs      — PartyName and PartyInfo value types
//! directory.rs  — MembershipDirectory trait and the in-memory directory
//! ```

pub mod directory;
pub mod party;

pub use directory::{IdentityError, InMemoryDirectory, MembershipDirectory};
pub use party::{PartyInfo, PartyName};
