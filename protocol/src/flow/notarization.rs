//! Notary submission with bounded retry.

use tracing::{debug, info, warn};

use super::context::{cancelled, CancelToken};
use super::error::RedemptionError;
use crate::config::RetryPolicy;
use crate::crypto::PublicKey;
use crate::notary::{NotarisedTransaction, NotaryError, NotaryService};
use crate::transaction::{verify_signed, SignedTransaction};

/// Submits fully signed transactions to one notary.
///
/// Only [`NotaryError::Unreachable`] is retried. A conflict or an expired
/// window is final for the attempt; retrying with the same inputs cannot
/// succeed. Cancelling during a backoff abandons the submission before the
/// next request.
pub struct NotarizationClient<'a> {
    notary: &'a dyn NotaryService,
    notary_key: PublicKey,
    policy: RetryPolicy,
}

impl<'a> NotarizationClient<'a> {
    pub fn new(notary: &'a dyn NotaryService, notary_key: PublicKey, policy: RetryPolicy) -> Self {
        Self {
            notary,
            notary_key,
            policy,
        }
    }

    pub async fn notarise(
        &self,
        tx: SignedTransaction,
        cancel: &mut CancelToken,
    ) -> Result<NotarisedTransaction, RedemptionError> {
        // Partial or invalid signature sets never reach the notary.
        verify_signed(&tx)?;

        let id = tx.id();
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 1;
        let certificate = loop {
            debug!(tx_id = %id, attempt, notary = %self.notary.name(), "requesting notarisation");
            match self.notary.certify_uniqueness(&tx).await {
                Ok(certificate) => break certificate,
                Err(NotaryError::Unreachable(reason)) if attempt < max_attempts => {
                    let backoff = self.policy.backoff_for(attempt);
                    warn!(
                        tx_id = %id,
                        attempt,
                        max_attempts,
                        backoff_ms = backoff.as_millis() as u64,
                        reason = %reason,
                        "notary unreachable, retrying"
                    );
                    tokio::select! {
                        biased;
                        _ = cancelled(cancel) => {
                            info!(tx_id = %id, attempt, "cancelled before notary retry");
                            return Err(RedemptionError::Cancelled {
                                stage: "waiting to retry notarisation",
                            });
                        }
                        _ = tokio::time::sleep(backoff) => {}
                    }
                    attempt += 1;
                }
                Err(NotaryError::Unreachable(reason)) => {
                    return Err(RedemptionError::NotaryUnreachable {
                        attempts: attempt,
                        reason,
                    })
                }
                Err(e) => return Err(e.into()),
            }
        };

        if !certificate.verify(&id, &self.notary_key) {
            return Err(RedemptionError::invalid_signature(format!(
                "notary certificate for {id} does not verify against {}",
                self.notary_key
            )));
        }
        info!(tx_id = %id, attempts = attempt, "notarised");
        Ok(NotarisedTransaction::new(tx, certificate))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::{Basket, StateRef};
    use crate::crypto::PartyKeypair;
    use crate::flow::context::never_cancel;
    use crate::flow::error::RedemptionErrorKind;
    use crate::identity::PartyName;
    use crate::notary::UniquenessNotary;
    use crate::transaction::{
        Command, SignatureBundle, TimeWindow, TransactionBuilder, TransactionId,
    };
    use chrono::Utc;
    use std::time::Duration;

    const NOTARY: &str = "O=Notary, L=London, C=GB";

    fn signed(complete: bool) -> SignedTransaction {
        let seller = PartyKeypair::generate();
        let buyer = PartyKeypair::generate();
        let basket = Basket::new("apples", "Farm", seller.public_key(), 10);
        let envelope = TransactionBuilder::new(Command::Redeem)
            .notary(PartyName::new(NOTARY))
            .add_input(StateRef::new(TransactionId::from_bytes([1; 32]), 0))
            .add_output(basket.change_owner(buyer.public_key()).into())
            .time_window(TimeWindow::until(Utc::now() + chrono::Duration::days(1)))
            .add_signatories([seller.public_key(), buyer.public_key()])
            .build()
            .unwrap();
        let mut bundle = SignatureBundle::new();
        bundle.sign(&envelope.id, &seller);
        if complete {
            bundle.sign(&envelope.id, &buyer);
        }
        SignedTransaction::new(envelope, bundle)
    }

    fn policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(1),
        }
    }

    #[tokio::test]
    async fn incomplete_bundle_never_reaches_notary() {
        let notary = UniquenessNotary::new(PartyName::new(NOTARY), PartyKeypair::generate());
        let client = NotarizationClient::new(&notary, notary.public_key(), policy(3));
        let err = client.notarise(signed(false), &mut never_cancel()).await.unwrap_err();
        assert_eq!(err.kind(), RedemptionErrorKind::InvalidSignature);
        assert_eq!(notary.request_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn retries_through_transient_outage() {
        let notary = UniquenessNotary::new(PartyName::new(NOTARY), PartyKeypair::generate());
        notary.simulate_outage(2);
        let client = NotarizationClient::new(&notary, notary.public_key(), policy(3));

        let started = tokio::time::Instant::now();
        let notarised = client.notarise(signed(true), &mut never_cancel()).await.unwrap();
        assert_eq!(notary.request_count(), 3);
        // 100ms + 200ms of backoff.
        let waited = started.elapsed();
        assert!(waited >= Duration::from_millis(300) && waited < Duration::from_millis(400));
        assert!(notarised
            .certificate
            .verify(&notarised.id(), &notary.public_key()));
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_at_the_policy_limit() {
        let notary = UniquenessNotary::new(PartyName::new(NOTARY), PartyKeypair::generate());
        notary.simulate_outage(10);
        let client = NotarizationClient::new(&notary, notary.public_key(), policy(3));

        match client.notarise(signed(true), &mut never_cancel()).await {
            Err(RedemptionError::NotaryUnreachable { attempts, .. }) => assert_eq!(attempts, 3),
            other => panic!("expected NotaryUnreachable, got {:?}", other),
        }
        assert_eq!(notary.request_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_during_backoff_skips_the_retry() {
        let notary = UniquenessNotary::new(PartyName::new(NOTARY), PartyKeypair::generate());
        notary.simulate_outage(1);
        let client = NotarizationClient::new(
            &notary,
            notary.public_key(),
            RetryPolicy {
                max_attempts: 3,
                initial_backoff: Duration::from_secs(5),
                max_backoff: Duration::from_secs(5),
            },
        );
        let tx = signed(true);
        let first_input = tx.envelope.inputs[0].clone();

        let (cancel_tx, mut cancel_rx) = tokio::sync::watch::channel(false);
        let abort = async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            cancel_tx.send(true).unwrap();
            cancel_tx
        };
        let (result, _cancel_tx) = tokio::join!(client.notarise(tx, &mut cancel_rx), abort);

        match result {
            Err(RedemptionError::Cancelled { .. }) => {}
            other => panic!("expected Cancelled, got {:?}", other),
        }
        assert_eq!(notary.request_count(), 1);
        assert_eq!(notary.consumed_by(&first_input), None);
    }

    #[tokio::test]
    async fn conflict_is_not_retried() {
        let notary = UniquenessNotary::new(PartyName::new(NOTARY), PartyKeypair::generate());
        let client = NotarizationClient::new(&notary, notary.public_key(), policy(5));
        client.notarise(signed(true), &mut never_cancel()).await.unwrap();

        // Different transaction, same input.
        let err = client.notarise(signed(true), &mut never_cancel()).await.unwrap_err();
        assert_eq!(err.kind(), RedemptionErrorKind::DoubleSpend);
        assert_eq!(notary.request_count(), 2);
    }

    #[tokio::test]
    async fn certificate_from_unexpected_key_is_rejected() {
        let notary = UniquenessNotary::new(PartyName::new(NOTARY), PartyKeypair::generate());
        let impostor_key = PartyKeypair::generate().public_key();
        let client = NotarizationClient::new(&notary, impostor_key, policy(1));
        let err = client.notarise(signed(true), &mut never_cancel()).await.unwrap_err();
        assert_eq!(err.kind(), RedemptionErrorKind::InvalidSignature);
    }
}
