//! Ledger state envelope types.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::basket::Basket;
use super::stamp::Stamp;
use crate::crypto::PublicKey;
use crate::transaction::types::TransactionId;

/// Discriminant used by typed vault queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StateKind {
    Stamp,
    Basket,
}

impl fmt::Display for StateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stamp => write!(f, "Stamp"),
            Self::Basket => write!(f, "Basket"),
        }
    }
}

/// Any state the ledger can hold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LedgerState {
    Stamp(Stamp),
    Basket(Basket),
}

impl LedgerState {
    pub fn kind(&self) -> StateKind {
        match self {
            Self::Stamp(_) => StateKind::Stamp,
            Self::Basket(_) => StateKind::Basket,
        }
    }

    /// The state's own identifier (not its ledger reference).
    pub fn id(&self) -> Uuid {
        match self {
            Self::Stamp(s) => s.id,
            Self::Basket(b) => b.id,
        }
    }

    pub fn as_stamp(&self) -> Option<&Stamp> {
        match self {
            Self::Stamp(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_basket(&self) -> Option<&Basket> {
        match self {
            Self::Basket(b) => Some(b),
            _ => None,
        }
    }

    /// Keys of the parties that should hold this state in their vaults.
    pub fn participants(&self) -> &[PublicKey] {
        match self {
            Self::Stamp(s) => &s.participants,
            Self::Basket(b) => &b.participants,
        }
    }

    pub fn is_relevant_to(&self, key: &PublicKey) -> bool {
        self.participants().contains(key)
    }

    /// Deterministic byte encoding used inside signable transaction bytes.
    /// Prefixed with a kind tag so a stamp and a basket never collide.
    pub fn canonical_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(128);
        match self {
            Self::Stamp(s) => {
                buf.push(0x01);
                s.write_canonical(&mut buf);
            }
            Self::Basket(b) => {
                buf.push(0x02);
                b.write_canonical(&mut buf);
            }
        }
        buf
    }
}

/// LE u32 length, then the UTF-8 bytes.
pub(crate) fn put_str(buf: &mut Vec<u8>, s: &str) {
    buf.extend_from_slice(&(s.len() as u32).to_le_bytes());
    buf.extend_from_slice(s.as_bytes());
}

pub(crate) fn put_keys(buf: &mut Vec<u8>, keys: &[PublicKey]) {
    buf.extend_from_slice(&(keys.len() as u32).to_le_bytes());
    for key in keys {
        buf.extend_from_slice(key.as_bytes());
    }
}

impl From<Stamp> for LedgerState {
    fn from(s: Stamp) -> Self {
        Self::Stamp(s)
    }
}

impl From<Basket> for LedgerState {
    fn from(b: Basket) -> Self {
        Self::Basket(b)
    }
}

// ---------------------------------------------------------------------------
// StateRef
// ---------------------------------------------------------------------------

/// Pointer to a ledger state: the transaction that produced it and the
/// output index within that transaction.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StateRef {
    pub tx_id: TransactionId,
    pub index: u32,
}

impl StateRef {
    pub fn new(tx_id: TransactionId, index: u32) -> Self {
        Self { tx_id, index }
    }

    /// 36-byte key: tx id followed by big-endian index, so byte order and
    /// `Ord` agree.
    pub fn to_key(&self) -> [u8; 36] {
        let mut key = [0u8; 36];
        key[..32].copy_from_slice(self.tx_id.as_bytes());
        key[32..].copy_from_slice(&self.index.to_be_bytes());
        key
    }
}

impl fmt::Display for StateRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.tx_id, self.index)
    }
}

/// A state together with where it lives on the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateAndRef<T> {
    pub state: T,
    pub state_ref: StateRef,
}

impl<T> StateAndRef<T> {
    pub fn new(state: T, state_ref: StateRef) -> Self {
        Self { state, state_ref }
    }
}

impl StateAndRef<LedgerState> {
    /// Narrow to a stamp, keeping the reference.
    pub fn into_stamp(self) -> Option<StateAndRef<Stamp>> {
        match self.state {
            LedgerState::Stamp(s) => Some(StateAndRef::new(s, self.state_ref)),
            _ => None,
        }
    }

    /// Narrow to a basket, keeping the reference.
    pub fn into_basket(self) -> Option<StateAndRef<Basket>> {
        match self.state {
            LedgerState::Basket(b) => Some(StateAndRef::new(b, self.state_ref)),
            _ => None,
        }
    }
}
