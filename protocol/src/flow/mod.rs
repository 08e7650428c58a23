//! # Redemption Flows
//!
//! The stamp-for-basket exchange between a seller (initiator) and a buyer
//! (responder), finalized through a uniqueness notary.
//!
//! ```text
//! redeem.rs        — RedeemFlow entry point, RedeemRequest, FlowOutcome
//! responder.rs     — RedeemResponder: validate, sign, record
//! finality.rs      — sign → notarise → record → distribute
//! coordinator.rs   — SigningCoordinator: counterparty signature collection
//! notarization.rs  — NotarizationClient with bounded retry
//! state.rs         — FlowState machine and FlowTracker
//! error.rs         — RedemptionError and its stable kinds
//! context.rs       — PartyContext, CancelToken
//! ```
//!
//! ## Lifecycle
//!
//! ```text
//! Initiated → InputsSelected → TransactionBuilt → Signed → Notarized → Committed
//!     └───────────┴────────────────┴──────────────┴──────────┴──→ Failed(kind)
//! ```
//!
//! Everything before `Notarized` is free to abandon: no vault has changed
//! and the inputs are still spendable. From `Notarized` on, the inputs are
//! consumed for good: a copy missing on either side is reported as
//! [`FlowStatus::PartialFinalization`] or [`FlowStatus::LocalRecordFailed`]
//! together with the notarised transaction.

pub mod context;
pub mod coordinator;
pub mod error;
pub mod finality;
pub mod notarization;
pub mod redeem;
pub mod responder;
pub mod state;

pub use context::{never_cancel, CancelToken, PartyContext};
pub use coordinator::{SigningCoordinator, SigningState};
pub use error::{RedemptionError, RedemptionErrorKind};
pub use finality::{FinalizationProtocol, Finality};
pub use notarization::NotarizationClient;
pub use redeem::{FlowOutcome, FlowStatus, RedeemFlow, RedeemRequest};
pub use responder::RedeemResponder;
pub use state::{FlowState, FlowTracker};
