//! Two-party finalization: sign, notarise, record, distribute.
//!
//! The notary certificate is the commit point. Before it, cancellation and
//! failure leave nothing behind. After it, the spend is permanent: the
//! initiator records locally and distributes to the counterparty whatever
//! happens on either side. A copy that is missing on one side is reported
//! with the notarised transaction, never rolled back.

use tracing::{error, info, warn};

use super::context::{is_cancelled, never_cancel, CancelToken};
use super::coordinator::{receive_within, SigningCoordinator};
use super::error::RedemptionError;
use super::notarization::NotarizationClient;
use super::state::{FlowState, FlowTracker};
use crate::asset::{LedgerState, StateAndRef};
use crate::config::FlowConfig;
use crate::crypto::{PartyKeypair, PublicKey};
use crate::identity::PartyName;
use crate::notary::{NotarisedTransaction, NotaryService};
use crate::session::{Session, SessionMessage};
use crate::transaction::TransactionEnvelope;
use crate::vault::{StateStore, VaultError};

/// How far a notarised transaction got.
#[derive(Debug, Clone)]
pub enum Finality {
    /// Both parties recorded the transaction.
    Committed(NotarisedTransaction),
    /// Recorded locally only; the counterparty did not confirm.
    Partial {
        transaction: NotarisedTransaction,
        reason: String,
    },
    /// Notarised, but this party's own vault refused the record.
    LocalRecordFailed {
        transaction: NotarisedTransaction,
        error: VaultError,
        counterparty_recorded: bool,
    },
}

impl Finality {
    pub fn transaction(&self) -> &NotarisedTransaction {
        match self {
            Self::Committed(tx)
            | Self::Partial { transaction: tx, .. }
            | Self::LocalRecordFailed { transaction: tx, .. } => tx,
        }
    }
}

pub struct FinalizationProtocol<'a> {
    keypair: &'a PartyKeypair,
    vault: &'a dyn StateStore,
    notary: &'a dyn NotaryService,
    notary_key: PublicKey,
    config: &'a FlowConfig,
}

impl<'a> FinalizationProtocol<'a> {
    pub fn new(
        keypair: &'a PartyKeypair,
        vault: &'a dyn StateStore,
        notary: &'a dyn NotaryService,
        notary_key: PublicKey,
        config: &'a FlowConfig,
    ) -> Self {
        Self {
            keypair,
            vault,
            notary,
            notary_key,
            config,
        }
    }

    /// Finalize `envelope` with the counterparty on `session`.
    ///
    /// Advances `tracker` through `Signed`, `Notarized` and `Committed`. A
    /// copy missing on either side leaves it at `Notarized`.
    pub async fn finalize(
        &self,
        envelope: &TransactionEnvelope,
        inputs: &[StateAndRef<LedgerState>],
        session: &mut dyn Session,
        cancel: &mut CancelToken,
        tracker: &mut FlowTracker,
    ) -> Result<Finality, RedemptionError> {
        let mut coordinator = SigningCoordinator::new(self.keypair, self.config.session_timeout);
        let signed = coordinator.collect(envelope, inputs, session, cancel).await?;
        tracker.advance(FlowState::Signed);

        if is_cancelled(cancel) {
            return Err(RedemptionError::Cancelled {
                stage: "about to notarise",
            });
        }

        let client = NotarizationClient::new(
            self.notary,
            self.notary_key.clone(),
            self.config.notary_retry.clone(),
        );
        let notarised = client.notarise(signed, cancel).await?;
        tracker.advance(FlowState::Notarized);
        let tx_id = notarised.id();

        let local = self.vault.record(&notarised);
        if let Err(e) = &local {
            error!(tx_id = %tx_id, error = %e, "notarised transaction could not be recorded locally");
        }
        let counterparty = session.counterparty().clone();
        let remote = self.distribute(&notarised, session).await;

        match (local, remote) {
            (Ok(()), Ok(())) => {
                tracker.advance(FlowState::Committed);
                info!(tx_id = %tx_id, counterparty = %counterparty, "transaction committed by both parties");
                Ok(Finality::Committed(notarised))
            }
            (Ok(()), Err(reason)) => Ok(self.partial(notarised, &counterparty, reason)),
            (Err(error), remote) => {
                warn!(
                    tx_id = %tx_id,
                    counterparty = %counterparty,
                    counterparty_recorded = remote.is_ok(),
                    "local copy of notarised transaction needs reconciliation"
                );
                Ok(Finality::LocalRecordFailed {
                    transaction: notarised,
                    error,
                    counterparty_recorded: remote.is_ok(),
                })
            }
        }
    }

    /// Send the notarised transaction and wait for the counterparty to
    /// acknowledge its record. `Err` carries the reason it did not.
    async fn distribute(
        &self,
        notarised: &NotarisedTransaction,
        session: &mut dyn Session,
    ) -> Result<(), String> {
        session
            .send(SessionMessage::Finalized(Box::new(notarised.clone())))
            .await
            .map_err(|e| e.to_string())?;

        // Past the commit point: the caller can no longer cancel.
        let reply = receive_within(
            session,
            self.config.session_timeout,
            &mut never_cancel(),
            "awaiting record acknowledgement",
        )
        .await;
        match reply {
            Ok(SessionMessage::Recorded) => Ok(()),
            Ok(SessionMessage::RecordFailed { reason }) | Ok(SessionMessage::Reject { reason }) => {
                Err(reason)
            }
            Ok(other) => Err(format!("unexpected {} instead of Recorded", other.name())),
            Err(e) => Err(e.to_string()),
        }
    }

    fn partial(
        &self,
        transaction: NotarisedTransaction,
        counterparty: &PartyName,
        reason: String,
    ) -> Finality {
        warn!(
            tx_id = %transaction.id(),
            counterparty = %counterparty,
            reason = %reason,
            "partial finalization: counterparty copy needs reconciliation"
        );
        Finality::Partial {
            transaction,
            reason,
        }
    }
}
