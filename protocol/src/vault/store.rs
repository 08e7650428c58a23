//! The state store contract every vault implements.

use thiserror::Error;
use uuid::Uuid;

use crate::asset::{LedgerState, StateAndRef, StateKind, StateRef};
use crate::crypto::{double_sha256, PublicKey};
use crate::notary::NotarisedTransaction;
use crate::transaction::TransactionId;

/// Errors from the vault's storage layer.
///
/// Absence of a state is never an error; it is [`Lookup::NotFound`].
#[derive(Debug, Clone, Error)]
pub enum VaultError {
    #[error("sled error: {0}")]
    Sled(#[from] ::sled::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("vault data corrupt: {0}")]
    Corrupt(String),

    #[error("vault belongs to {found}, not {expected}")]
    WrongOwner {
        expected: PublicKey,
        found: PublicKey,
    },
}

impl From<bincode::Error> for VaultError {
    fn from(e: bincode::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

/// Outcome of a single-state query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup<T> {
    Found(T),
    NotFound,
}

impl<T> Lookup<T> {
    pub fn is_found(&self) -> bool {
        matches!(self, Self::Found(_))
    }

    pub fn found(self) -> Option<T> {
        match self {
            Self::Found(v) => Some(v),
            Self::NotFound => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Lookup<U> {
        match self {
            Self::Found(v) => Lookup::Found(f(v)),
            Self::NotFound => Lookup::NotFound,
        }
    }
}

impl<T> From<Option<T>> for Lookup<T> {
    fn from(opt: Option<T>) -> Self {
        match opt {
            Some(v) => Self::Found(v),
            None => Self::NotFound,
        }
    }
}

/// Query and record interface over a party's ledger states.
///
/// Implementations must return unconsumed states of a kind in a stable
/// iteration order; "first match" selection depends on it.
pub trait StateStore: Send + Sync {
    /// All unconsumed states of `kind`, in the store's iteration order.
    fn unconsumed_of_kind(
        &self,
        kind: StateKind,
    ) -> Result<Vec<StateAndRef<LedgerState>>, VaultError>;

    /// Whether `state_ref` has been consumed by a recorded transaction.
    fn is_consumed(&self, state_ref: &StateRef) -> Result<bool, VaultError>;

    /// Durably record a notarised transaction: inputs become consumed and
    /// the outputs that list the vault owner among their participants become
    /// unconsumed states, in one atomic step. Recording the same transaction
    /// twice is a no-op.
    fn record(&self, tx: &NotarisedTransaction) -> Result<(), VaultError>;

    /// A previously recorded transaction.
    fn transaction(&self, id: &TransactionId)
        -> Result<Option<NotarisedTransaction>, VaultError>;

    /// Insert freshly issued states, as an issuance transaction would.
    /// Returns their references in the order given.
    fn seed(&self, states: Vec<LedgerState>) -> Result<Vec<StateRef>, VaultError>;

    /// First unconsumed state of `kind` satisfying `predicate`.
    fn find_unconsumed_by_predicate(
        &self,
        kind: StateKind,
        predicate: &dyn Fn(&LedgerState) -> bool,
    ) -> Result<Lookup<StateAndRef<LedgerState>>, VaultError> {
        Ok(self
            .unconsumed_of_kind(kind)?
            .into_iter()
            .find(|sar| predicate(&sar.state))
            .into())
    }

    /// The unconsumed state of `kind` whose own id is `id`.
    fn find_unconsumed_by_id(
        &self,
        kind: StateKind,
        id: Uuid,
    ) -> Result<Lookup<StateAndRef<LedgerState>>, VaultError> {
        self.find_unconsumed_by_predicate(kind, &|state| state.id() == id)
    }
}

/// Transaction id for a batch of seeded states. Salted with a fresh UUID so
/// two identical seeds never share references.
pub(crate) fn issuance_id(states: &[LedgerState]) -> TransactionId {
    let mut buf = Vec::with_capacity(256);
    buf.extend_from_slice(b"orchard-issuance");
    buf.extend_from_slice(Uuid::new_v4().as_bytes());
    for state in states {
        buf.extend_from_slice(&state.canonical_bytes());
    }
    TransactionId::from_bytes(double_sha256(&buf))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_helpers() {
        let found: Lookup<u8> = Some(3).into();
        assert!(found.is_found());
        assert_eq!(found.clone().map(|v| v * 2), Lookup::Found(6));
        assert_eq!(found.found(), Some(3));

        let missing: Lookup<u8> = None.into();
        assert!(!missing.is_found());
        assert_eq!(missing.found(), None);
    }
}
