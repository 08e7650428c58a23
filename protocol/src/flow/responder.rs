//! The counterparty side of a redemption.
//!
//! The responder signs only what it has checked: the id matches the
//! envelope, the initiator signed it, the `Redeem` contract holds, and the
//! re-owned basket is owned by the responder itself. It records the
//! transaction only once the notary's certificate verifies.

use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use super::context::{never_cancel, PartyContext};
use super::coordinator::receive_within;
use super::error::RedemptionError;
use crate::asset::{LedgerState, StateAndRef};
use crate::config::REDEEM_PROTOCOL;
use crate::crypto::Signature;
use crate::identity::PartyName;
use crate::notary::NotarisedTransaction;
use crate::session::{IncomingSession, Session, SessionError, SessionMessage};
use crate::transaction::{
    verify_id, verify_redeem, verify_signed, SignatureBundle, TransactionEnvelope, TransactionId,
};

pub struct RedeemResponder {
    ctx: PartyContext,
}

impl RedeemResponder {
    pub fn new(ctx: PartyContext) -> Self {
        Self { ctx }
    }

    /// Serve every session arriving on `inbox`, each on its own task, until
    /// the inbox closes.
    pub fn serve(self: Arc<Self>, mut inbox: mpsc::Receiver<IncomingSession>) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(incoming) = inbox.recv().await {
                let responder = Arc::clone(&self);
                tokio::spawn(async move {
                    let initiator = incoming.initiator().clone();
                    match responder.respond(incoming).await {
                        Ok(tx_id) => debug!(tx_id = %tx_id, initiator = %initiator, "responder done"),
                        Err(e) => warn!(
                            initiator = %initiator,
                            kind = %e.kind(),
                            error = %e,
                            "responder failed"
                        ),
                    }
                });
            }
            debug!("responder inbox closed");
        })
    }

    /// Handle one session from proposal to record acknowledgement.
    #[instrument(skip(self, incoming), fields(initiator = %incoming.initiator()))]
    pub async fn respond(&self, incoming: IncomingSession) -> Result<TransactionId, RedemptionError> {
        let IncomingSession {
            protocol,
            mut session,
        } = incoming;
        let initiator = session.counterparty().clone();
        let timeout = self.ctx.config.session_timeout;

        if protocol != REDEEM_PROTOCOL {
            let reason = format!("unsupported protocol {protocol}");
            let _ = session.send(SessionMessage::Reject { reason: reason.clone() }).await;
            return Err(RedemptionError::malformed(reason));
        }

        let proposal = receive_within(&mut session, timeout, &mut never_cancel(), "awaiting proposal").await?;
        let (envelope, inputs, signature) = match proposal {
            SessionMessage::Propose {
                envelope,
                inputs,
                signature,
            } => (envelope, inputs, signature),
            other => {
                return Err(SessionError::Unexpected {
                    counterparty: initiator,
                    expected: "Propose",
                    actual: other.name(),
                }
                .into())
            }
        };

        if let Err(e) = self.check_proposal(&initiator, &envelope, &inputs, &signature) {
            warn!(tx_id = %envelope.id, error = %e, "rejecting proposal");
            let _ = session
                .send(SessionMessage::Reject {
                    reason: e.to_string(),
                })
                .await;
            return Err(e);
        }

        let mut bundle = SignatureBundle::new();
        bundle.sign(&envelope.id, &self.ctx.keypair);
        session.send(SessionMessage::Signatures(bundle)).await?;
        debug!(tx_id = %envelope.id, "signed proposal");

        let finalized = receive_within(
            &mut session,
            timeout,
            &mut never_cancel(),
            "awaiting finalized transaction",
        )
        .await?;
        let notarised = match finalized {
            SessionMessage::Finalized(tx) => *tx,
            other => {
                return Err(SessionError::Unexpected {
                    counterparty: initiator,
                    expected: "Finalized",
                    actual: other.name(),
                }
                .into())
            }
        };

        let recorded = self
            .check_finalized(&envelope, &notarised)
            .and_then(|()| self.ctx.vault.record(&notarised).map_err(RedemptionError::from));
        match recorded {
            Ok(()) => {
                session.send(SessionMessage::Recorded).await?;
                info!(tx_id = %envelope.id, "recorded redemption");
                Ok(envelope.id)
            }
            Err(e) => {
                warn!(tx_id = %envelope.id, error = %e, "could not record finalized transaction");
                let _ = session
                    .send(SessionMessage::RecordFailed {
                        reason: e.to_string(),
                    })
                    .await;
                Err(e)
            }
        }
    }

    fn check_proposal(
        &self,
        initiator: &PartyName,
        envelope: &TransactionEnvelope,
        inputs: &[StateAndRef<LedgerState>],
        signature: &Signature,
    ) -> Result<(), RedemptionError> {
        verify_id(envelope)?;
        if envelope.notary != self.ctx.config.notary {
            return Err(RedemptionError::malformed(format!(
                "transaction names notary {}, expected {}",
                envelope.notary, self.ctx.config.notary
            )));
        }

        let initiator_key = self
            .ctx
            .directory
            .lookup(initiator)
            .map_err(|e| RedemptionError::malformed(e.to_string()))?
            .ledger_key;
        if !envelope.signatories.contains(&initiator_key) {
            return Err(RedemptionError::invalid_signature(format!(
                "initiator {initiator} is not a required signatory"
            )));
        }
        if !initiator_key.verify(envelope.id.as_bytes(), signature) {
            return Err(RedemptionError::invalid_signature(format!(
                "initiator signature does not verify over {}",
                envelope.id
            )));
        }

        verify_redeem(envelope, inputs)?;

        let me = self.ctx.public_key();
        let owned_by_me = envelope.outputs.iter().all(|output| match output {
            LedgerState::Basket(basket) => basket.owner == me,
            LedgerState::Stamp(_) => false,
        });
        if !owned_by_me {
            return Err(RedemptionError::malformed(
                "output basket is not owned by the responding party",
            ));
        }
        Ok(())
    }

    fn check_finalized(
        &self,
        proposed: &TransactionEnvelope,
        notarised: &NotarisedTransaction,
    ) -> Result<(), RedemptionError> {
        if &notarised.transaction.envelope != proposed {
            return Err(RedemptionError::malformed(
                "finalized transaction differs from the one signed",
            ));
        }
        verify_signed(&notarised.transaction)?;

        let notary_key = self
            .ctx
            .directory
            .lookup(&proposed.notary)
            .map_err(|e| RedemptionError::malformed(e.to_string()))?
            .ledger_key;
        if !notarised.certificate.verify(&proposed.id, &notary_key) {
            return Err(RedemptionError::invalid_signature(
                "notary certificate does not verify",
            ));
        }
        Ok(())
    }
}
