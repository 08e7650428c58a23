//! In-memory uniqueness notary.
//!
//! Conflicting spends are serialized behind one `parking_lot::Mutex`: the
//! whole check-then-commit for a transaction runs under the lock, so two
//! transactions sharing an input can never both pass the conflict check.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::{NotaryError, NotaryService, UniquenessCertificate};
use crate::asset::StateRef;
use crate::crypto::{PartyKeypair, PublicKey};
use crate::identity::PartyName;
use crate::transaction::{verify_signed, SignedTransaction, TransactionId};

type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

#[derive(Default)]
struct Ledger {
    /// Input -> transaction that consumed it.
    committed: HashMap<StateRef, TransactionId>,
    certificates: HashMap<TransactionId, UniquenessCertificate>,
}

/// A single-node notary holding its committed-input map in memory.
pub struct UniquenessNotary {
    name: PartyName,
    keypair: PartyKeypair,
    ledger: Mutex<Ledger>,
    clock: Clock,
    /// Requests left to fail with `Unreachable` before answering normally.
    outage: AtomicU32,
    requests: AtomicUsize,
}

impl UniquenessNotary {
    pub fn new(name: PartyName, keypair: PartyKeypair) -> Self {
        Self {
            name,
            keypair,
            ledger: Mutex::new(Ledger::default()),
            clock: Arc::new(Utc::now),
            outage: AtomicU32::new(0),
            requests: AtomicUsize::new(0),
        }
    }

    /// Replace the wall clock used for time-window checks.
    pub fn with_clock(mut self, clock: impl Fn() -> DateTime<Utc> + Send + Sync + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    pub fn public_key(&self) -> PublicKey {
        self.keypair.public_key()
    }

    /// Make the next `requests` calls fail as unreachable.
    pub fn simulate_outage(&self, requests: u32) {
        self.outage.store(requests, Ordering::SeqCst);
    }

    /// Total certification requests received, including failed ones.
    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    /// The transaction that consumed `state_ref`, if the notary has seen one.
    pub fn consumed_by(&self, state_ref: &StateRef) -> Option<TransactionId> {
        self.ledger.lock().committed.get(state_ref).copied()
    }

    fn take_outage(&self) -> bool {
        self.outage
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    fn certify(&self, tx: &SignedTransaction) -> Result<UniquenessCertificate, NotaryError> {
        let envelope = &tx.envelope;
        if envelope.notary != self.name {
            return Err(NotaryError::WrongNotary {
                requested: envelope.notary.clone(),
                actual: self.name.clone(),
            });
        }
        verify_signed(tx)?;

        let id = envelope.id;
        let mut ledger = self.ledger.lock();

        if let Some(existing) = ledger.certificates.get(&id) {
            debug!(tx_id = %id, "resubmission of certified transaction");
            return Ok(existing.clone());
        }

        for input in &envelope.inputs {
            if let Some(consumed_by) = ledger.committed.get(input) {
                warn!(tx_id = %id, state_ref = %input, consumed_by = %consumed_by, "double spend rejected");
                return Err(NotaryError::Conflict {
                    state_ref: input.clone(),
                    consumed_by: *consumed_by,
                });
            }
        }

        let now = (self.clock)();
        if !envelope.time_window.contains(now) {
            return Err(NotaryError::TimeWindowExpired {
                until: envelope.time_window.until,
                now,
            });
        }

        for input in &envelope.inputs {
            ledger.committed.insert(input.clone(), id);
        }
        let certificate = UniquenessCertificate::issue(self.name.clone(), &self.keypair, id, now);
        ledger.certificates.insert(id, certificate.clone());
        info!(tx_id = %id, inputs = envelope.inputs.len(), "transaction notarised");
        Ok(certificate)
    }
}

#[async_trait]
impl NotaryService for UniquenessNotary {
    fn name(&self) -> &PartyName {
        &self.name
    }

    async fn certify_uniqueness(
        &self,
        tx: &SignedTransaction,
    ) -> Result<UniquenessCertificate, NotaryError> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        if self.take_outage() {
            return Err(NotaryError::Unreachable(format!(
                "{} is not accepting requests",
                self.name
            )));
        }
        self.certify(tx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::Basket;
    use crate::transaction::{
        Command, SignatureBundle, TimeWindow, TransactionBuilder, TransactionError,
    };
    use chrono::Duration;

    const NOTARY: &str = "O=Notary, L=London, C=GB";

    fn notary() -> UniquenessNotary {
        UniquenessNotary::new(PartyName::new(NOTARY), PartyKeypair::generate())
    }

    fn signed(inputs: &[StateRef], until: DateTime<Utc>) -> SignedTransaction {
        let seller = PartyKeypair::from_seed(&[1u8; 32]);
        let buyer = PartyKeypair::from_seed(&[2u8; 32]);
        let basket = Basket::new("apples", "Farm", seller.public_key(), 10);
        let mut builder = TransactionBuilder::new(Command::Redeem)
            .notary(PartyName::new(NOTARY))
            .add_output(basket.change_owner(buyer.public_key()).into())
            .time_window(TimeWindow::until(until))
            .add_signatories([seller.public_key(), buyer.public_key()]);
        for input in inputs {
            builder = builder.add_input(input.clone());
        }
        let envelope = builder.build().unwrap();
        let mut bundle = SignatureBundle::new();
        bundle.sign(&envelope.id, &seller);
        bundle.sign(&envelope.id, &buyer);
        SignedTransaction::new(envelope, bundle)
    }

    fn sref(b: u8, i: u32) -> StateRef {
        StateRef::new(TransactionId::from_bytes([b; 32]), i)
    }

    #[tokio::test]
    async fn certifies_and_signs() {
        let notary = notary();
        let tx = signed(&[sref(1, 0), sref(2, 0)], Utc::now() + Duration::days(1));
        let cert = notary.certify_uniqueness(&tx).await.unwrap();
        assert!(cert.verify(&tx.id(), &notary.public_key()));
        assert_eq!(notary.consumed_by(&sref(1, 0)), Some(tx.id()));
    }

    #[tokio::test]
    async fn overlapping_input_is_a_conflict() {
        let notary = notary();
        let until = Utc::now() + Duration::days(1);
        let first = signed(&[sref(1, 0), sref(2, 0)], until);
        let second = signed(&[sref(3, 0), sref(2, 0)], until);

        notary.certify_uniqueness(&first).await.unwrap();
        match notary.certify_uniqueness(&second).await {
            Err(NotaryError::Conflict {
                state_ref,
                consumed_by,
            }) => {
                assert_eq!(state_ref, sref(2, 0));
                assert_eq!(consumed_by, first.id());
            }
            other => panic!("expected Conflict, got {:?}", other),
        }
        // The rejected transaction's other input stays spendable.
        assert_eq!(notary.consumed_by(&sref(3, 0)), None);
    }

    #[tokio::test]
    async fn resubmission_returns_same_certificate() {
        let notary = notary();
        let tx = signed(&[sref(1, 0)], Utc::now() + Duration::days(1));
        let a = notary.certify_uniqueness(&tx).await.unwrap();
        let b = notary.certify_uniqueness(&tx).await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn expired_window_is_rejected() {
        let fixed = Utc::now();
        let notary = notary().with_clock(move || fixed);
        let tx = signed(&[sref(1, 0)], fixed);
        assert!(matches!(
            notary.certify_uniqueness(&tx).await,
            Err(NotaryError::TimeWindowExpired { .. })
        ));
        assert_eq!(notary.consumed_by(&sref(1, 0)), None);
    }

    #[tokio::test]
    async fn partially_signed_transaction_is_rejected() {
        let notary = notary();
        let mut tx = signed(&[sref(1, 0)], Utc::now() + Duration::days(1));
        let seller = PartyKeypair::from_seed(&[1u8; 32]).public_key();
        let mut bundle = SignatureBundle::new();
        for (key, sig) in tx.signatures.iter() {
            if key == &seller {
                bundle.insert(key.clone(), sig.clone());
            }
        }
        tx.signatures = bundle;

        assert!(matches!(
            notary.certify_uniqueness(&tx).await,
            Err(NotaryError::InvalidTransaction(
                TransactionError::MissingSignatures { .. }
            ))
        ));
    }

    #[tokio::test]
    async fn wrong_notary_is_rejected() {
        let other = UniquenessNotary::new(
            PartyName::new("O=Other Notary, L=Paris, C=FR"),
            PartyKeypair::generate(),
        );
        let tx = signed(&[sref(1, 0)], Utc::now() + Duration::days(1));
        assert!(matches!(
            other.certify_uniqueness(&tx).await,
            Err(NotaryError::WrongNotary { .. })
        ));
    }

    #[tokio::test]
    async fn outage_fails_then_recovers() {
        let notary = notary();
        notary.simulate_outage(2);
        let tx = signed(&[sref(1, 0)], Utc::now() + Duration::days(1));

        for _ in 0..2 {
            let err = notary.certify_uniqueness(&tx).await.unwrap_err();
            assert!(err.is_transient());
        }
        assert!(notary.certify_uniqueness(&tx).await.is_ok());
        assert_eq!(notary.request_count(), 3);
    }
}
