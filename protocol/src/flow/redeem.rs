//! The initiating redemption flow.
//!
//! A seller holding a stamp it issued redeems it for one of its own
//! baskets on behalf of a buyer:
//!
//! 1. Resolve the buyer and the configured notary in the directory.
//! 2. Select the stamp and an eligible basket from the local vault.
//! 3. Build the `Redeem` envelope, signed by seller and buyer.
//! 4. Finalize with the buyer: collect signatures, notarise, record on
//!    both sides.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::context::{is_cancelled, never_cancel, CancelToken, PartyContext};
use super::error::{RedemptionError, RedemptionErrorKind};
use super::finality::{FinalizationProtocol, Finality};
use super::state::{FlowState, FlowTracker};
use crate::asset::{LedgerState, StateAndRef};
use crate::identity::PartyName;
use crate::notary::NotarisedTransaction;
use crate::transaction::{
    select_redemption_inputs, verify_redeem, BasketSelection, Command, TimeWindow,
    TransactionBuilder, TransactionId,
};

/// Client request to redeem a stamp.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RedeemRequest {
    pub buyer: PartyName,
    pub stamp_id: Uuid,
    /// Redeem this particular basket instead of applying the configured
    /// selection policy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub basket_id: Option<Uuid>,
}

impl RedeemRequest {
    pub fn new(buyer: PartyName, stamp_id: Uuid) -> Self {
        Self {
            buyer,
            stamp_id,
            basket_id: None,
        }
    }

    pub fn with_basket(mut self, basket_id: Uuid) -> Self {
        self.basket_id = Some(basket_id);
        self
    }
}

// ---------------------------------------------------------------------------
// FlowOutcome
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub enum FlowStatus {
    Committed { tx_id: TransactionId },
    /// Notarised and recorded locally, not confirmed by the counterparty.
    PartialFinalization { tx_id: TransactionId },
    /// Notarised, but the local vault did not record it. The inputs are
    /// spent regardless.
    LocalRecordFailed {
        tx_id: TransactionId,
        counterparty_recorded: bool,
    },
    Failed(RedemptionError),
}

/// Result of one [`RedeemFlow::call`].
///
/// `Display` gives the transaction id on success and
/// `Flow failed, message: <kind>: <detail>` otherwise. Branch on
/// [`FlowOutcome::status`] or [`FlowOutcome::kind`], not on that text.
#[derive(Debug)]
pub struct FlowOutcome {
    status: FlowStatus,
    /// Set whenever the transaction was notarised.
    transaction: Option<NotarisedTransaction>,
    /// Set when notarised but not recorded on both sides.
    error: Option<RedemptionError>,
    history: Vec<FlowState>,
}

impl FlowOutcome {
    fn failed(error: RedemptionError, tracker: FlowTracker) -> Self {
        Self {
            status: FlowStatus::Failed(error),
            transaction: None,
            error: None,
            history: tracker.history().to_vec(),
        }
    }

    pub fn status(&self) -> &FlowStatus {
        &self.status
    }

    pub fn is_committed(&self) -> bool {
        matches!(self.status, FlowStatus::Committed { .. })
    }

    /// The notarised transaction's id, whether or not the counterparty
    /// confirmed it.
    pub fn tx_id(&self) -> Option<TransactionId> {
        match &self.status {
            FlowStatus::Committed { tx_id }
            | FlowStatus::PartialFinalization { tx_id }
            | FlowStatus::LocalRecordFailed { tx_id, .. } => Some(*tx_id),
            FlowStatus::Failed(_) => None,
        }
    }

    /// Structured failure kind; `None` when committed.
    pub fn kind(&self) -> Option<RedemptionErrorKind> {
        match &self.status {
            FlowStatus::Committed { .. } => None,
            FlowStatus::PartialFinalization { .. } => Some(RedemptionErrorKind::PartialFinalization),
            FlowStatus::LocalRecordFailed { .. } => Some(RedemptionErrorKind::Vault),
            FlowStatus::Failed(e) => Some(e.kind()),
        }
    }

    pub fn error(&self) -> Option<&RedemptionError> {
        match &self.status {
            FlowStatus::Failed(e) => Some(e),
            _ => self.error.as_ref(),
        }
    }

    pub fn transaction(&self) -> Option<&NotarisedTransaction> {
        self.transaction.as_ref()
    }

    /// Every finalization state the attempt went through.
    pub fn history(&self) -> &[FlowState] {
        &self.history
    }

    pub fn final_state(&self) -> FlowState {
        self.history
            .last()
            .copied()
            .unwrap_or(FlowState::Initiated)
    }
}

impl fmt::Display for FlowOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.status, self.error()) {
            (FlowStatus::Committed { tx_id }, _) => write!(f, "{tx_id}"),
            (_, Some(e)) => write!(f, "Flow failed, message: {}: {}", e.kind(), e),
            (_, None) => f.write_str("Flow failed"),
        }
    }
}

// ---------------------------------------------------------------------------
// RedeemFlow
// ---------------------------------------------------------------------------

/// Entry point for redemptions initiated by this party.
#[derive(Clone)]
pub struct RedeemFlow {
    ctx: Arc<PartyContext>,
}

impl RedeemFlow {
    pub fn new(ctx: Arc<PartyContext>) -> Self {
        Self { ctx }
    }

    pub async fn call(&self, request: RedeemRequest) -> FlowOutcome {
        self.call_with_cancel(request, never_cancel()).await
    }

    /// Like [`RedeemFlow::call`], abandoning the attempt if `cancel` fires
    /// before the transaction is notarised.
    #[instrument(
        skip(self, request, cancel),
        fields(buyer = %request.buyer, stamp_id = %request.stamp_id)
    )]
    pub async fn call_with_cancel(
        &self,
        request: RedeemRequest,
        mut cancel: CancelToken,
    ) -> FlowOutcome {
        let mut tracker = FlowTracker::new();
        match self.run(&request, &mut cancel, &mut tracker).await {
            Ok(Finality::Committed(tx)) => FlowOutcome {
                status: FlowStatus::Committed { tx_id: tx.id() },
                transaction: Some(tx),
                error: None,
                history: tracker.history().to_vec(),
            },
            Ok(Finality::Partial {
                transaction,
                reason,
            }) => {
                let tx_id = transaction.id();
                FlowOutcome {
                    status: FlowStatus::PartialFinalization { tx_id },
                    error: Some(RedemptionError::PartialFinalization {
                        tx_id,
                        counterparty: request.buyer.clone(),
                        reason,
                    }),
                    transaction: Some(transaction),
                    history: tracker.history().to_vec(),
                }
            }
            Ok(Finality::LocalRecordFailed {
                transaction,
                error,
                counterparty_recorded,
            }) => {
                let tx_id = transaction.id();
                FlowOutcome {
                    status: FlowStatus::LocalRecordFailed {
                        tx_id,
                        counterparty_recorded,
                    },
                    error: Some(RedemptionError::NotRecordedLocally {
                        tx_id,
                        source: error,
                    }),
                    transaction: Some(transaction),
                    history: tracker.history().to_vec(),
                }
            }
            Err(e) => {
                warn!(kind = %e.kind(), error = %e, "redemption failed");
                tracker.fail(e.kind());
                FlowOutcome::failed(e, tracker)
            }
        }
    }

    async fn run(
        &self,
        request: &RedeemRequest,
        cancel: &mut CancelToken,
        tracker: &mut FlowTracker,
    ) -> Result<Finality, RedemptionError> {
        let ctx = &self.ctx;
        let me = ctx.public_key();

        let buyer = ctx
            .directory
            .lookup(&request.buyer)
            .map_err(|_| RedemptionError::BuyerNotFound(request.buyer.clone()))?;
        let notary_key = ctx
            .directory
            .lookup(&ctx.config.notary)
            .map_err(|e| RedemptionError::malformed(format!("notary not resolvable: {e}")))?
            .ledger_key;

        let selection = match request.basket_id {
            Some(id) => BasketSelection::ById(id),
            None => ctx.config.basket_selection,
        };
        let selected = select_redemption_inputs(
            ctx.vault.as_ref(),
            request.stamp_id,
            &buyer.ledger_key,
            selection,
        )?;
        tracker.advance(FlowState::InputsSelected);
        info!(
            stamp = %selected.stamp.state_ref,
            basket = %selected.basket.state_ref,
            "inputs selected"
        );

        let window = TimeWindow::from_now(chrono::Utc::now(), ctx.config.time_window);
        let envelope = TransactionBuilder::new(Command::Redeem)
            .notary(ctx.config.notary.clone())
            .add_input(selected.stamp.state_ref.clone())
            .add_input(selected.basket.state_ref.clone())
            .add_output(selected.output.clone().into())
            .time_window(window)
            .add_signatories([me, buyer.ledger_key.clone()])
            .build()?;
        tracker.advance(FlowState::TransactionBuilt);
        info!(tx_id = %envelope.id, "transaction built");

        let inputs: Vec<StateAndRef<LedgerState>> = vec![
            StateAndRef::new(selected.stamp.state.into(), selected.stamp.state_ref),
            StateAndRef::new(selected.basket.state.into(), selected.basket.state_ref),
        ];
        // Catch our own contract violations before involving anyone else.
        verify_redeem(&envelope, &inputs)?;

        if is_cancelled(cancel) {
            return Err(RedemptionError::Cancelled {
                stage: "opening session",
            });
        }
        let mut session = ctx.messaging.initiate(&request.buyer).await?;

        FinalizationProtocol::new(
            &ctx.keypair,
            ctx.vault.as_ref(),
            ctx.notary.as_ref(),
            notary_key,
            &ctx.config,
        )
        .finalize(&envelope, &inputs, session.as_mut(), cancel, tracker)
        .await
    }
}
