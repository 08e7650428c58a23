//! Contract rules for the `Redeem` command.
//!
//! Both parties run [`verify_redeem`] before signing. The notary does not:
//! it certifies uniqueness, not meaning.

use thiserror::Error;

use super::builder::TransactionEnvelope;
use super::types::Command;
use crate::asset::{Basket, LedgerState, StateAndRef, Stamp};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContractError {
    #[error("{command} requires {expected} inputs, got {actual}")]
    InputCount {
        command: Command,
        expected: usize,
        actual: usize,
    },

    #[error("{command} requires {expected} outputs, got {actual}")]
    OutputCount {
        command: Command,
        expected: usize,
        actual: usize,
    },

    #[error("resolved inputs do not match the transaction's input references")]
    UnresolvedInputs,

    #[error("redemption must consume exactly one stamp and one basket")]
    InputKinds,

    #[error("redemption must produce a basket")]
    OutputKind,

    #[error("basket owner is not the stamp issuer")]
    IssuerMismatch,

    #[error("redeemed basket must keep its id, description, farm and weight")]
    ContentsChanged,

    #[error("redeemed basket must change owner")]
    OwnerUnchanged,

    #[error("new basket owner is not a participant of the redeemed basket")]
    OwnerNotParticipant,

    #[error("basket weight must be positive")]
    EmptyBasket,

    #[error("{0} must be a required signatory")]
    MissingSignatory(&'static str),
}

/// Verify `envelope` against the `Redeem` rules.
///
/// `inputs` are the states behind `envelope.inputs`, in the same order.
pub fn verify_redeem(
    envelope: &TransactionEnvelope,
    inputs: &[StateAndRef<LedgerState>],
) -> Result<(), ContractError> {
    let command = envelope.command;
    if envelope.inputs.len() != 2 {
        return Err(ContractError::InputCount {
            command,
            expected: 2,
            actual: envelope.inputs.len(),
        });
    }
    if envelope.outputs.len() != 1 {
        return Err(ContractError::OutputCount {
            command,
            expected: 1,
            actual: envelope.outputs.len(),
        });
    }
    let resolved_in_order = inputs.len() == envelope.inputs.len()
        && inputs
            .iter()
            .zip(&envelope.inputs)
            .all(|(sar, r)| &sar.state_ref == r);
    if !resolved_in_order {
        return Err(ContractError::UnresolvedInputs);
    }

    let (stamp, basket) = split_inputs(inputs).ok_or(ContractError::InputKinds)?;
    let output = envelope.outputs[0]
        .as_basket()
        .ok_or(ContractError::OutputKind)?;

    if basket.owner != stamp.issuer {
        return Err(ContractError::IssuerMismatch);
    }
    if !output.same_contents(basket) {
        return Err(ContractError::ContentsChanged);
    }
    if output.owner == basket.owner {
        return Err(ContractError::OwnerUnchanged);
    }
    if !output.participants.contains(&output.owner) {
        return Err(ContractError::OwnerNotParticipant);
    }
    if output.weight == 0 {
        return Err(ContractError::EmptyBasket);
    }
    if !envelope.signatories.contains(&stamp.issuer) {
        return Err(ContractError::MissingSignatory("stamp issuer"));
    }
    if !envelope.signatories.contains(&output.owner) {
        return Err(ContractError::MissingSignatory("new basket owner"));
    }
    Ok(())
}

fn split_inputs(inputs: &[StateAndRef<LedgerState>]) -> Option<(&Stamp, &Basket)> {
    match (&inputs[0].state, &inputs[1].state) {
        (LedgerState::Stamp(s), LedgerState::Basket(b))
        | (LedgerState::Basket(b), LedgerState::Stamp(s)) => Some((s, b)),
        _ => None,
    }
}
