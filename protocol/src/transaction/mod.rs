//! # Transaction Module
//!
//! Construction, signing, verification, and contract checking for
//! redemption transactions.
//!
//! ## Architecture
//!
//! ```text
//! types.rs        — TransactionId, Command, TimeWindow
//! builder.rs      — TransactionEnvelope and its fluent TransactionBuilder
//! selection.rs    — stamp lookup and basket selection
//! contract.rs     — Redeem contract rules
//! signing.rs      — SignatureBundle and SignedTransaction
//! verification.rs — id integrity and signature completeness checks
//! ```
//!
//! ## Transaction Lifecycle
//!
//! 1. **Select** — [`select_redemption_inputs`] finds the stamp and a basket.
//! 2. **Build** — [`TransactionBuilder`] assembles the unsigned envelope.
//! 3. **Verify** — each party runs [`verify_redeem`] before signing.
//! 4. **Sign** — every required signatory signs the canonical id.
//! 5. **Notarise** — the notary runs [`verify_signed`] and certifies.
//!
//! ## Design Decisions
//!
//! - Transaction ids are `double_sha256` of a hand-written canonical byte
//!   layout, never of a serde encoding.
//! - Signatures cover the 32-byte id only. The id commits to every field,
//!   including the notary and the signatory set.

pub mod builder;
pub mod contract;
pub mod selection;
pub mod signing;
pub mod types;
pub mod verification;

pub use builder::{TransactionBuilder, TransactionEnvelope};
pub use contract::{verify_redeem, ContractError};
pub use selection::{select_redemption_inputs, BasketSelection, RedemptionInputs, SelectionError};
pub use signing::{sign_envelope, SignatureBundle, SignedTransaction};
pub use types::{Command, TimeWindow, TransactionId};
pub use verification::{verify_id, verify_signed, TransactionError};
