//! # Notary
//!
//! The notary is the single serialization point for spends. It certifies
//! that none of a transaction's inputs has been consumed by another
//! notarised transaction and that the current time lies inside the
//! transaction's time window. Nothing is recorded in a vault without its
//! certificate.
//!
//! ```text
//! notary/
//! ├── certificate.rs  — UniquenessCertificate, NotarisedTransaction
//! └── uniqueness.rs   — in-memory UniquenessNotary
//! ```

pub mod certificate;
pub mod uniqueness;

pub use certificate::{NotarisedTransaction, UniquenessCertificate};
pub use uniqueness::UniquenessNotary;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::asset::StateRef;
use crate::identity::PartyName;
use crate::transaction::{SignedTransaction, TransactionError, TransactionId};

/// Why a notary refused, or could not answer, a certification request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NotaryError {
    /// An input was already consumed by another notarised transaction.
    #[error("input {state_ref} already consumed by transaction {consumed_by}")]
    Conflict {
        state_ref: StateRef,
        consumed_by: TransactionId,
    },

    #[error("time window closed at {until}, notary time is {now}")]
    TimeWindowExpired {
        until: DateTime<Utc>,
        now: DateTime<Utc>,
    },

    /// Transient: the notary could not be reached. Safe to retry.
    #[error("notary unreachable: {0}")]
    Unreachable(String),

    /// The signed transaction failed id or signature checks.
    #[error("invalid transaction: {0}")]
    InvalidTransaction(#[from] TransactionError),

    /// The transaction names a different notary.
    #[error("transaction names notary {requested}, this is {actual}")]
    WrongNotary {
        requested: PartyName,
        actual: PartyName,
    },
}

impl NotaryError {
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unreachable(_))
    }
}

/// Uniqueness and time-window certification.
#[async_trait]
pub trait NotaryService: Send + Sync {
    /// The notary's own identity.
    fn name(&self) -> &PartyName;

    /// Certify `tx`, or explain why not. Resubmitting an already certified
    /// transaction returns its original certificate.
    async fn certify_uniqueness(
        &self,
        tx: &SignedTransaction,
    ) -> Result<UniquenessCertificate, NotaryError>;
}
