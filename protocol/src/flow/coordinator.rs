//! Signature collection from the counterparty.
//!
//! ```text
//! Built → LocallySigned → AwaitingCounterparty → FullySigned
//!   └──────────┴─────────────────┴──────────────→ Aborted(kind)
//! ```
//!
//! The coordinator owns the signature bundle for the whole exchange and
//! only hands it out once every required signatory has a verifying entry.

use std::time::Duration;
use tracing::{debug, info, warn};

use super::context::{cancelled, CancelToken};
use super::error::{RedemptionError, RedemptionErrorKind};
use crate::asset::{LedgerState, StateAndRef};
use crate::crypto::PartyKeypair;
use crate::session::{Session, SessionError, SessionMessage};
use crate::transaction::{SignatureBundle, SignedTransaction, TransactionEnvelope};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SigningState {
    Built,
    LocallySigned,
    AwaitingCounterparty,
    FullySigned,
    Aborted(RedemptionErrorKind),
}

/// Wait for the next message on `session`, bounded by `timeout` and
/// abandoned if `cancel` fires.
pub(crate) async fn receive_within(
    session: &mut dyn Session,
    timeout: Duration,
    cancel: &mut CancelToken,
    stage: &'static str,
) -> Result<SessionMessage, RedemptionError> {
    let counterparty = session.counterparty().clone();
    tokio::select! {
        biased;
        _ = cancelled(cancel) => Err(RedemptionError::Cancelled { stage }),
        received = tokio::time::timeout(timeout, session.receive()) => match received {
            Ok(message) => Ok(message?),
            Err(_) => Err(RedemptionError::SessionTimeout {
                counterparty,
                waited: timeout,
            }),
        },
    }
}

/// Drives one envelope from `Built` to `FullySigned`.
pub struct SigningCoordinator<'a> {
    keypair: &'a PartyKeypair,
    timeout: Duration,
    state: SigningState,
}

impl<'a> SigningCoordinator<'a> {
    pub fn new(keypair: &'a PartyKeypair, timeout: Duration) -> Self {
        Self {
            keypair,
            timeout,
            state: SigningState::Built,
        }
    }

    pub fn state(&self) -> SigningState {
        self.state
    }

    /// Sign `envelope`, propose it over `session` together with the resolved
    /// `inputs`, and collect the counterparty's signatures.
    pub async fn collect(
        &mut self,
        envelope: &TransactionEnvelope,
        inputs: &[StateAndRef<LedgerState>],
        session: &mut dyn Session,
        cancel: &mut CancelToken,
    ) -> Result<SignedTransaction, RedemptionError> {
        let result = self.run(envelope, inputs, session, cancel).await;
        if let Err(e) = &result {
            warn!(tx_id = %envelope.id, error = %e, "signature collection aborted");
            self.state = SigningState::Aborted(e.kind());
        }
        result
    }

    async fn run(
        &mut self,
        envelope: &TransactionEnvelope,
        inputs: &[StateAndRef<LedgerState>],
        session: &mut dyn Session,
        cancel: &mut CancelToken,
    ) -> Result<SignedTransaction, RedemptionError> {
        let me = self.keypair.public_key();
        if !envelope.signatories.contains(&me) {
            return Err(RedemptionError::malformed(
                "local party is not a required signatory",
            ));
        }

        let mut bundle = SignatureBundle::new();
        let signature = bundle.sign(&envelope.id, self.keypair);
        self.state = SigningState::LocallySigned;
        debug!(tx_id = %envelope.id, "signed locally");

        session
            .send(SessionMessage::Propose {
                envelope: envelope.clone(),
                inputs: inputs.to_vec(),
                signature,
            })
            .await?;
        self.state = SigningState::AwaitingCounterparty;

        let counterparty = session.counterparty().clone();
        let reply = receive_within(session, self.timeout, cancel, "awaiting signatures").await?;
        let theirs = match reply {
            SessionMessage::Signatures(bundle) => bundle,
            SessionMessage::Reject { reason } => {
                return Err(RedemptionError::CounterpartyRejected {
                    counterparty,
                    reason,
                })
            }
            other => {
                return Err(SessionError::Unexpected {
                    counterparty,
                    expected: "Signatures",
                    actual: other.name(),
                }
                .into())
            }
        };

        for (key, signature) in theirs.iter() {
            if !envelope.signatories.contains(key) {
                return Err(RedemptionError::invalid_signature(format!(
                    "signature from {key}, which is not a required signatory"
                )));
            }
            if !key.verify(envelope.id.as_bytes(), signature) {
                return Err(RedemptionError::invalid_signature(format!(
                    "signature from {key} does not verify over {}",
                    envelope.id
                )));
            }
            bundle.insert(key.clone(), signature.clone());
        }

        let missing = bundle.missing(&envelope.signatories);
        if !missing.is_empty() {
            return Err(RedemptionError::invalid_signature(format!(
                "incomplete signature set: {} signatory(ies) missing",
                missing.len()
            )));
        }

        self.state = SigningState::FullySigned;
        info!(tx_id = %envelope.id, signatures = bundle.len(), "fully signed");
        Ok(SignedTransaction::new(envelope.clone(), bundle))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::{Basket, StateRef};
    use crate::flow::context::never_cancel;
    use crate::identity::PartyName;
    use crate::session::{FlowMessaging, InProcessNetwork};
    use crate::transaction::{Command, TimeWindow, TransactionBuilder, TransactionId};
    use chrono::Utc;

    const SELLER: &str = "O=Seller, L=London, C=GB";
    const BUYER: &str = "O=Buyer, L=New York, C=US";

    fn envelope(seller: &PartyKeypair, buyer: &PartyKeypair) -> TransactionEnvelope {
        let basket = Basket::new("apples", "Farm", seller.public_key(), 10);
        TransactionBuilder::new(Command::Redeem)
            .notary(PartyName::new("O=Notary, L=London, C=GB"))
            .add_input(StateRef::new(TransactionId::from_bytes([1; 32]), 0))
            .add_input(StateRef::new(TransactionId::from_bytes([2; 32]), 0))
            .add_output(basket.change_owner(buyer.public_key()).into())
            .time_window(TimeWindow::until(Utc::now() + chrono::Duration::days(1)))
            .add_signatories([seller.public_key(), buyer.public_key()])
            .build()
            .unwrap()
    }

    /// Session to a counterparty whose behaviour is scripted by `reply`.
    async fn scripted<F>(reply: F) -> Box<dyn Session>
    where
        F: FnOnce(TransactionEnvelope) -> Option<SessionMessage> + Send + 'static,
    {
        let network = InProcessNetwork::new();
        let mut inbox = network.register(PartyName::new(BUYER));
        let session = network
            .endpoint(PartyName::new(SELLER))
            .initiate(&PartyName::new(BUYER))
            .await
            .unwrap();
        tokio::spawn(async move {
            let mut incoming = inbox.recv().await.unwrap();
            let envelope = match incoming.session.receive().await.unwrap() {
                SessionMessage::Propose { envelope, .. } => envelope,
                other => panic!("expected Propose, got {:?}", other),
            };
            if let Some(msg) = reply(envelope) {
                incoming.session.send(msg).await.unwrap();
            }
            // Hold the session open until the test is done with it.
            futures::future::pending::<()>().await;
        });
        session
    }

    #[tokio::test]
    async fn collects_counterparty_signature() {
        let seller = PartyKeypair::generate();
        let buyer = PartyKeypair::generate();
        let env = envelope(&seller, &buyer);
        let b = buyer.clone();
        let mut session = scripted(move |env| {
            let mut bundle = SignatureBundle::new();
            bundle.sign(&env.id, &b);
            Some(SessionMessage::Signatures(bundle))
        })
        .await;

        let mut coordinator = SigningCoordinator::new(&seller, Duration::from_secs(5));
        let signed = coordinator
            .collect(&env, &[], session.as_mut(), &mut never_cancel())
            .await
            .unwrap();
        assert_eq!(coordinator.state(), SigningState::FullySigned);
        assert!(signed.signatures.is_complete_for(&env));
    }

    #[tokio::test]
    async fn rejection_aborts() {
        let seller = PartyKeypair::generate();
        let buyer = PartyKeypair::generate();
        let env = envelope(&seller, &buyer);
        let mut session = scripted(|_| {
            Some(SessionMessage::Reject {
                reason: "not for me".into(),
            })
        })
        .await;

        let mut coordinator = SigningCoordinator::new(&seller, Duration::from_secs(5));
        let err = coordinator
            .collect(&env, &[], session.as_mut(), &mut never_cancel())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), RedemptionErrorKind::CounterpartyRejected);
        assert_eq!(
            coordinator.state(),
            SigningState::Aborted(RedemptionErrorKind::CounterpartyRejected)
        );
    }

    #[tokio::test]
    async fn signature_over_wrong_id_is_invalid() {
        let seller = PartyKeypair::generate();
        let buyer = PartyKeypair::generate();
        let env = envelope(&seller, &buyer);
        let b = buyer.clone();
        let mut session = scripted(move |_| {
            let mut bundle = SignatureBundle::new();
            bundle.sign(&TransactionId::from_bytes([0xAB; 32]), &b);
            Some(SessionMessage::Signatures(bundle))
        })
        .await;

        let mut coordinator = SigningCoordinator::new(&seller, Duration::from_secs(5));
        let err = coordinator
            .collect(&env, &[], session.as_mut(), &mut never_cancel())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), RedemptionErrorKind::InvalidSignature);
    }

    #[tokio::test]
    async fn empty_bundle_is_incomplete() {
        let seller = PartyKeypair::generate();
        let buyer = PartyKeypair::generate();
        let env = envelope(&seller, &buyer);
        let mut session = scripted(|_| Some(SessionMessage::Signatures(SignatureBundle::new()))).await;

        let mut coordinator = SigningCoordinator::new(&seller, Duration::from_secs(5));
        let err = coordinator
            .collect(&env, &[], session.as_mut(), &mut never_cancel())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), RedemptionErrorKind::InvalidSignature);
    }

    #[tokio::test(start_paused = true)]
    async fn silent_counterparty_times_out() {
        let seller = PartyKeypair::generate();
        let buyer = PartyKeypair::generate();
        let env = envelope(&seller, &buyer);
        let mut session = scripted(|_| None).await;

        let mut coordinator = SigningCoordinator::new(&seller, Duration::from_secs(30));
        let err = coordinator
            .collect(&env, &[], session.as_mut(), &mut never_cancel())
            .await
            .unwrap_err();
        match err {
            RedemptionError::SessionTimeout { waited, .. } => {
                assert_eq!(waited, Duration::from_secs(30))
            }
            other => panic!("expected SessionTimeout, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn cancellation_while_waiting() {
        let seller = PartyKeypair::generate();
        let buyer = PartyKeypair::generate();
        let env = envelope(&seller, &buyer);
        let mut session = scripted(|_| None).await;
        let (cancel_tx, mut cancel_rx) = tokio::sync::watch::channel(false);

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            let _ = cancel_tx.send(true);
        });

        let mut coordinator = SigningCoordinator::new(&seller, Duration::from_secs(60));
        let err = coordinator
            .collect(&env, &[], session.as_mut(), &mut cancel_rx)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), RedemptionErrorKind::Cancelled);
    }

    #[tokio::test]
    async fn refuses_when_not_a_signatory() {
        let seller = PartyKeypair::generate();
        let buyer = PartyKeypair::generate();
        let outsider = PartyKeypair::generate();
        let env = envelope(&seller, &buyer);
        let mut session = scripted(|_| None).await;

        let mut coordinator = SigningCoordinator::new(&outsider, Duration::from_secs(5));
        let err = coordinator
            .collect(&env, &[], session.as_mut(), &mut never_cancel())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), RedemptionErrorKind::MalformedTransaction);
    }
}
