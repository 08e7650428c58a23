//! # Sled-backed vault
//!
//! Durable [`StateStore`] built on sled's embedded key-value store.
//!
//! ## Tree Layout
//!
//! | Tree           | Key                       | Value                              |
//! |----------------|---------------------------|------------------------------------|
//! | `states`       | `StateRef::to_key` (36B)  | `bincode(StateAndRef<LedgerState>)` |
//! | `consumed`     | `StateRef::to_key` (36B)  | consuming tx id (32B)              |
//! | `transactions` | tx id (32B)               | `bincode(NotarisedTransaction)`    |
//! | `meta`         | `owner`                   | owner public key (32B)             |
//!
//! A vault is opened for one owner key and refuses to open for another.
//! Recorded outputs are kept only when the owner is among their
//! participants.
//!
//! States are never deleted; "unconsumed" means present in `states` and
//! absent from `consumed`. Iteration order is key order, so repeated queries
//! over the same data return the same first match.
//!
//! ## Atomicity
//!
//! Recording a transaction touches all three trees inside one sled
//! multi-tree transaction. A reader sees either none of it or all of it.

use sled::transaction::{ConflictableTransactionError, TransactionError as SledTxError};
use sled::{Batch, Db, Transactional, Tree};
use std::path::Path;
use tracing::debug;

use super::store::{issuance_id, StateStore, VaultError};
use crate::asset::{LedgerState, StateAndRef, StateKind, StateRef};
use crate::crypto::PublicKey;
use crate::notary::NotarisedTransaction;
use crate::transaction::TransactionId;

const OWNER_KEY: &[u8] = b"owner";

/// Persistent vault for one party.
///
/// sled trees are safe to share between threads, so `SledVault` can sit
/// behind an `Arc<dyn StateStore>` without extra locking.
#[derive(Debug, Clone)]
pub struct SledVault {
    owner: PublicKey,
    db: Db,
    states: Tree,
    consumed: Tree,
    transactions: Tree,
}

impl SledVault {
    /// Open or create the vault of `owner` at `path`.
    pub fn open<P: AsRef<Path>>(path: P, owner: PublicKey) -> Result<Self, VaultError> {
        Self::from_db(sled::open(path)?, owner)
    }

    /// A vault that is discarded on drop. For tests.
    pub fn open_temporary(owner: PublicKey) -> Result<Self, VaultError> {
        Self::from_db(sled::Config::new().temporary(true).open()?, owner)
    }

    fn from_db(db: Db, owner: PublicKey) -> Result<Self, VaultError> {
        let meta = db.open_tree("meta")?;
        match meta.get(OWNER_KEY)? {
            Some(stored) => {
                let found = PublicKey::try_from_slice(&stored)
                    .map_err(|e| VaultError::Corrupt(format!("stored owner key: {e}")))?;
                if found != owner {
                    return Err(VaultError::WrongOwner {
                        expected: owner,
                        found,
                    });
                }
            }
            None => {
                meta.insert(OWNER_KEY, &owner.as_bytes()[..])?;
            }
        }
        Ok(Self {
            owner,
            states: db.open_tree("states")?,
            consumed: db.open_tree("consumed")?,
            transactions: db.open_tree("transactions")?,
            db,
        })
    }

    pub fn owner(&self) -> &PublicKey {
        &self.owner
    }

    /// Number of recorded (notarised) transactions.
    pub fn transaction_count(&self) -> usize {
        self.transactions.len()
    }

    pub fn flush(&self) -> Result<(), VaultError> {
        self.db.flush()?;
        Ok(())
    }

    fn decode_state(bytes: &[u8]) -> Result<StateAndRef<LedgerState>, VaultError> {
        Ok(bincode::deserialize(bytes)?)
    }
}

impl StateStore for SledVault {
    fn unconsumed_of_kind(
        &self,
        kind: StateKind,
    ) -> Result<Vec<StateAndRef<LedgerState>>, VaultError> {
        let mut out = Vec::new();
        for entry in self.states.iter() {
            let (key, value) = entry?;
            if self.consumed.contains_key(&key)? {
                continue;
            }
            let sar = Self::decode_state(&value)?;
            if sar.state_ref.to_key().as_slice() != key.as_ref() {
                return Err(VaultError::Corrupt(format!(
                    "state stored under wrong key: {}",
                    sar.state_ref
                )));
            }
            if sar.state.kind() == kind {
                out.push(sar);
            }
        }
        Ok(out)
    }

    fn is_consumed(&self, state_ref: &StateRef) -> Result<bool, VaultError> {
        Ok(self.consumed.contains_key(state_ref.to_key())?)
    }

    fn record(&self, tx: &NotarisedTransaction) -> Result<(), VaultError> {
        let id = tx.id();
        let envelope = &tx.transaction.envelope;

        // Serialize up front so the sled closure can only fail on conflicts.
        let tx_bytes = bincode::serialize(tx)?;
        let inputs: Vec<[u8; 36]> = envelope.inputs.iter().map(StateRef::to_key).collect();
        let mut outputs = Vec::with_capacity(envelope.outputs.len());
        for (state_ref, state) in envelope.output_refs() {
            if !state.is_relevant_to(&self.owner) {
                continue;
            }
            let sar = StateAndRef::new(state.clone(), state_ref.clone());
            outputs.push((state_ref.to_key(), bincode::serialize(&sar)?));
        }

        let result: Result<bool, SledTxError<VaultError>> =
            (&self.states, &self.consumed, &self.transactions).transaction(
                |(states, consumed, transactions)| -> Result<bool, ConflictableTransactionError<VaultError>> {
                    if transactions.get(id.as_bytes())?.is_some() {
                        return Ok(false);
                    }
                    for key in &inputs {
                        consumed.insert(&key[..], &id.as_bytes()[..])?;
                    }
                    for (key, bytes) in &outputs {
                        states.insert(&key[..], bytes.as_slice())?;
                    }
                    transactions.insert(&id.as_bytes()[..], tx_bytes.as_slice())?;
                    Ok(true)
                },
            );

        let written = match result {
            Ok(written) => written,
            Err(SledTxError::Abort(e)) => return Err(e),
            Err(SledTxError::Storage(e)) => return Err(VaultError::Sled(e)),
        };
        if written {
            self.db.flush()?;
            debug!(tx_id = %id, inputs = inputs.len(), outputs = outputs.len(), "recorded transaction");
        }
        Ok(())
    }

    fn transaction(
        &self,
        id: &TransactionId,
    ) -> Result<Option<NotarisedTransaction>, VaultError> {
        match self.transactions.get(id.as_bytes())? {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    fn seed(&self, states: Vec<LedgerState>) -> Result<Vec<StateRef>, VaultError> {
        let tx_id = issuance_id(&states);
        let mut batch = Batch::default();
        let mut refs = Vec::with_capacity(states.len());
        for (index, state) in states.into_iter().enumerate() {
            let state_ref = StateRef::new(tx_id, index as u32);
            let bytes = bincode::serialize(&StateAndRef::new(state, state_ref.clone()))?;
            batch.insert(&state_ref.to_key()[..], bytes);
            refs.push(state_ref);
        }
        self.states.apply_batch(batch)?;
        self.db.flush()?;
        Ok(refs)
    }
}
