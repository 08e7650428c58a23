//! Redemption failure taxonomy.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

use crate::asset::StateRef;
use crate::crypto::PublicKey;
use crate::identity::{IdentityError, PartyName};
use crate::notary::NotaryError;
use crate::session::SessionError;
use crate::transaction::{ContractError, SelectionError, TransactionError, TransactionId};
use crate::vault::VaultError;

/// Structured discriminant of a [`RedemptionError`]. Callers branch on this,
/// never on message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RedemptionErrorKind {
    BuyerNotFound,
    StampNotFound,
    NoEligibleBasket,
    MalformedTransaction,
    InvalidSignature,
    CounterpartyRejected,
    SessionTimeout,
    DoubleSpend,
    TimeWindowExpired,
    NotaryUnreachable,
    PartialFinalization,
    ContractViolation,
    Session,
    Vault,
    Cancelled,
}

impl fmt::Display for RedemptionErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Debug, Error)]
pub enum RedemptionError {
    #[error("the buyer {0} does not exist within the network")]
    BuyerNotFound(PartyName),

    #[error("no unconsumed stamp with id {0}")]
    StampNotFound(Uuid),

    #[error("there are no eligible baskets owned by stamp issuer {issuer}")]
    NoEligibleBasket { issuer: PublicKey },

    #[error("malformed transaction: {reason}")]
    MalformedTransaction { reason: String },

    #[error("invalid signature: {reason}")]
    InvalidSignature { reason: String },

    #[error("{counterparty} rejected the transaction: {reason}")]
    CounterpartyRejected {
        counterparty: PartyName,
        reason: String,
    },

    #[error("no response from {counterparty} within {waited:?}")]
    SessionTimeout {
        counterparty: PartyName,
        waited: Duration,
    },

    #[error("input {state_ref} already consumed by transaction {consumed_by}")]
    DoubleSpend {
        state_ref: StateRef,
        consumed_by: TransactionId,
    },

    #[error("time window closed at {until}")]
    TimeWindowExpired { until: chrono::DateTime<chrono::Utc> },

    #[error("notary unreachable after {attempts} attempt(s): {reason}")]
    NotaryUnreachable { attempts: u32, reason: String },

    /// Notarised and recorded locally; the counterparty's copy is not
    /// confirmed and needs out-of-band reconciliation.
    #[error("transaction {tx_id} notarised but not confirmed by {counterparty}: {reason}")]
    PartialFinalization {
        tx_id: TransactionId,
        counterparty: PartyName,
        reason: String,
    },

    /// Notarised, but this party's own vault could not record it. The
    /// spend stands; the local copy needs reconciliation.
    #[error("transaction {tx_id} notarised but not recorded locally: {source}")]
    NotRecordedLocally {
        tx_id: TransactionId,
        source: VaultError,
    },

    #[error("contract violation: {0}")]
    ContractViolation(#[from] ContractError),

    #[error("session error: {0}")]
    Session(#[from] SessionError),

    #[error("vault error: {0}")]
    Vault(#[from] VaultError),

    #[error("cancelled while {stage}")]
    Cancelled { stage: &'static str },
}

impl RedemptionError {
    pub fn kind(&self) -> RedemptionErrorKind {
        use RedemptionErrorKind as K;
        match self {
            Self::BuyerNotFound(_) => K::BuyerNotFound,
            Self::StampNotFound(_) => K::StampNotFound,
            Self::NoEligibleBasket { .. } => K::NoEligibleBasket,
            Self::MalformedTransaction { .. } => K::MalformedTransaction,
            Self::InvalidSignature { .. } => K::InvalidSignature,
            Self::CounterpartyRejected { .. } => K::CounterpartyRejected,
            Self::SessionTimeout { .. } => K::SessionTimeout,
            Self::DoubleSpend { .. } => K::DoubleSpend,
            Self::TimeWindowExpired { .. } => K::TimeWindowExpired,
            Self::NotaryUnreachable { .. } => K::NotaryUnreachable,
            Self::PartialFinalization { .. } => K::PartialFinalization,
            Self::ContractViolation(_) => K::ContractViolation,
            Self::Session(_) => K::Session,
            Self::Vault(_) | Self::NotRecordedLocally { .. } => K::Vault,
            Self::Cancelled { .. } => K::Cancelled,
        }
    }

    /// Only an unreachable notary is worth trying again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::NotaryUnreachable { .. })
    }

    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedTransaction {
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid_signature(reason: impl Into<String>) -> Self {
        Self::InvalidSignature {
            reason: reason.into(),
        }
    }
}

impl From<TransactionError> for RedemptionError {
    fn from(e: TransactionError) -> Self {
        match e {
            TransactionError::Malformed { .. } | TransactionError::IdMismatch { .. } => {
                Self::malformed(e.to_string())
            }
            TransactionError::MissingSignatures { .. }
            | TransactionError::InvalidSignature { .. }
            | TransactionError::UnexpectedSigner { .. } => Self::invalid_signature(e.to_string()),
        }
    }
}

impl From<SelectionError> for RedemptionError {
    fn from(e: SelectionError) -> Self {
        match e {
            SelectionError::StampNotFound(id) => Self::StampNotFound(id),
            SelectionError::NoEligibleBasket { issuer } => Self::NoEligibleBasket { issuer },
            SelectionError::Vault(e) => Self::Vault(e),
        }
    }
}

impl From<IdentityError> for RedemptionError {
    fn from(e: IdentityError) -> Self {
        match e {
            IdentityError::UnknownParty(name) => Self::BuyerNotFound(name),
        }
    }
}

impl From<NotaryError> for RedemptionError {
    fn from(e: NotaryError) -> Self {
        match e {
            NotaryError::Conflict {
                state_ref,
                consumed_by,
            } => Self::DoubleSpend {
                state_ref,
                consumed_by,
            },
            NotaryError::TimeWindowExpired { until, .. } => Self::TimeWindowExpired { until },
            NotaryError::Unreachable(reason) => Self::NotaryUnreachable {
                attempts: 1,
                reason,
            },
            NotaryError::InvalidTransaction(e) => e.into(),
            e @ NotaryError::WrongNotary { .. } => Self::malformed(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_unreachable_notary_is_retryable() {
        let unreachable: RedemptionError = NotaryError::Unreachable("down".into()).into();
        assert!(unreachable.is_retryable());
        assert_eq!(unreachable.kind(), RedemptionErrorKind::NotaryUnreachable);

        let conflict: RedemptionError = NotaryError::Conflict {
            state_ref: StateRef::new(TransactionId::from_bytes([1; 32]), 0),
            consumed_by: TransactionId::from_bytes([2; 32]),
        }
        .into();
        assert!(!conflict.is_retryable());
        assert_eq!(conflict.kind(), RedemptionErrorKind::DoubleSpend);
    }

    #[test]
    fn signature_problems_map_to_invalid_signature() {
        let e: RedemptionError = TransactionError::MissingSignatures { missing: vec![] }.into();
        assert_eq!(e.kind(), RedemptionErrorKind::InvalidSignature);
        let e: RedemptionError = TransactionError::malformed("no inputs").into();
        assert_eq!(e.kind(), RedemptionErrorKind::MalformedTransaction);
    }

    #[test]
    fn kind_displays_as_its_name() {
        assert_eq!(RedemptionErrorKind::StampNotFound.to_string(), "StampNotFound");
    }
}
