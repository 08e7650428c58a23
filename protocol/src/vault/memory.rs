//! In-process vault.
//!
//! States are kept in insertion order, which is the iteration order
//! "first eligible" selection sees. A single `parking_lot::RwLock` guards
//! everything, so `record` is atomic with respect to readers.
//!
//! `record` keeps only outputs whose participants include the owner key.

use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};

use super::store::{issuance_id, StateStore, VaultError};
use crate::asset::{LedgerState, StateAndRef, StateKind, StateRef};
use crate::crypto::PublicKey;
use crate::notary::NotarisedTransaction;
use crate::transaction::TransactionId;

#[derive(Default)]
struct Inner {
    /// Every state ever seen, in arrival order.
    states: Vec<StateAndRef<LedgerState>>,
    known: HashSet<StateRef>,
    /// Consumed ref -> consuming transaction.
    consumed: HashMap<StateRef, TransactionId>,
    transactions: HashMap<TransactionId, NotarisedTransaction>,
}

/// Vault held entirely in memory. Cheap to create; lost on drop.
pub struct MemoryVault {
    owner: PublicKey,
    inner: RwLock<Inner>,
}

impl MemoryVault {
    /// An empty vault for the party holding `owner`.
    pub fn new(owner: PublicKey) -> Self {
        Self {
            owner,
            inner: RwLock::new(Inner::default()),
        }
    }

    pub fn owner(&self) -> &PublicKey {
        &self.owner
    }

    /// Number of unconsumed states of every kind.
    pub fn unconsumed_count(&self) -> usize {
        let inner = self.inner.read();
        inner
            .states
            .iter()
            .filter(|sar| !inner.consumed.contains_key(&sar.state_ref))
            .count()
    }

    /// The transaction that consumed `state_ref`, if any.
    pub fn consumed_by(&self, state_ref: &StateRef) -> Option<TransactionId> {
        self.inner.read().consumed.get(state_ref).copied()
    }

    fn insert_state(inner: &mut Inner, sar: StateAndRef<LedgerState>) {
        if inner.known.insert(sar.state_ref.clone()) {
            inner.states.push(sar);
        }
    }
}

impl StateStore for MemoryVault {
    fn unconsumed_of_kind(
        &self,
        kind: StateKind,
    ) -> Result<Vec<StateAndRef<LedgerState>>, VaultError> {
        let inner = self.inner.read();
        Ok(inner
            .states
            .iter()
            .filter(|sar| sar.state.kind() == kind && !inner.consumed.contains_key(&sar.state_ref))
            .cloned()
            .collect())
    }

    fn is_consumed(&self, state_ref: &StateRef) -> Result<bool, VaultError> {
        Ok(self.inner.read().consumed.contains_key(state_ref))
    }

    fn record(&self, tx: &NotarisedTransaction) -> Result<(), VaultError> {
        let id = tx.id();
        let mut inner = self.inner.write();
        if inner.transactions.contains_key(&id) {
            return Ok(());
        }
        let envelope = &tx.transaction.envelope;
        for input in &envelope.inputs {
            inner.consumed.insert(input.clone(), id);
        }
        for (state_ref, state) in envelope.output_refs() {
            if state.is_relevant_to(&self.owner) {
                Self::insert_state(&mut inner, StateAndRef::new(state.clone(), state_ref));
            }
        }
        inner.transactions.insert(id, tx.clone());
        Ok(())
    }

    fn transaction(
        &self,
        id: &TransactionId,
    ) -> Result<Option<NotarisedTransaction>, VaultError> {
        Ok(self.inner.read().transactions.get(id).cloned())
    }

    fn seed(&self, states: Vec<LedgerState>) -> Result<Vec<StateRef>, VaultError> {
        let tx_id = issuance_id(&states);
        let mut inner = self.inner.write();
        let mut refs = Vec::with_capacity(states.len());
        for (index, state) in states.into_iter().enumerate() {
            let state_ref = StateRef::new(tx_id, index as u32);
            Self::insert_state(&mut inner, StateAndRef::new(state, state_ref.clone()));
            refs.push(state_ref);
        }
        Ok(refs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::{Basket, Stamp};
    use crate::crypto::PartyKeypair;
    use crate::vault::Lookup;

    #[test]
    fn seeded_states_are_unconsumed_in_order() {
        let owner = PartyKeypair::generate().public_key();
        let vault = MemoryVault::new(owner.clone());
        let b1 = Basket::new("apples", "Farm", owner.clone(), 1);
        let b2 = Basket::new("apples", "Farm", owner.clone(), 2);
        let stamp = Stamp::new("voucher", owner);

        let refs = vault
            .seed(vec![b1.clone().into(), stamp.clone().into(), b2.clone().into()])
            .unwrap();
        assert_eq!(refs.len(), 3);
        assert_eq!(vault.unconsumed_count(), 3);

        let baskets = vault.unconsumed_of_kind(StateKind::Basket).unwrap();
        let ids: Vec<_> = baskets.iter().map(|s| s.state.id()).collect();
        assert_eq!(ids, vec![b1.id, b2.id]);

        match vault.find_unconsumed_by_id(StateKind::Stamp, stamp.id).unwrap() {
            Lookup::Found(sar) => assert_eq!(sar.state_ref, refs[1]),
            Lookup::NotFound => panic!("seeded stamp not found"),
        }
    }

    #[test]
    fn kind_filter_applies_to_id_lookup() {
        let owner = PartyKeypair::generate().public_key();
        let vault = MemoryVault::new(owner.clone());
        let basket = Basket::new("apples", "Farm", owner, 1);
        vault.seed(vec![basket.clone().into()]).unwrap();

        assert_eq!(
            vault.find_unconsumed_by_id(StateKind::Stamp, basket.id).unwrap(),
            Lookup::NotFound
        );
    }

    #[test]
    fn predicate_returns_first_match() {
        let owner = PartyKeypair::generate().public_key();
        let vault = MemoryVault::new(owner.clone());
        let light = Basket::new("apples", "Farm", owner.clone(), 1);
        let heavy = Basket::new("apples", "Farm", owner, 50);
        vault.seed(vec![light.clone().into(), heavy.into()]).unwrap();

        let found = vault
            .find_unconsumed_by_predicate(StateKind::Basket, &|s| {
                s.as_basket().is_some_and(|b| b.weight >= 1)
            })
            .unwrap()
            .found()
            .unwrap();
        assert_eq!(found.state.id(), light.id);
    }
}
