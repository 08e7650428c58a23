//! Transaction construction via the builder pattern.
//!
//! [`TransactionBuilder`] collects inputs, outputs, the command, a time
//! window, the notary, and the required signatories, then `build()`s an
//! unsigned [`TransactionEnvelope`] whose canonical id is derived from its
//! contents.
//!
//! The builder does not sign. That happens in [`super::signing`], which keeps
//! construction testable without key material.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::types::{Command, TimeWindow, TransactionId};
use super::verification::TransactionError;
use crate::asset::{LedgerState, StateRef};
use crate::config::TRANSACTION_VERSION;
use crate::crypto::hash::double_sha256;
use crate::crypto::PublicKey;
use crate::identity::PartyName;

// ---------------------------------------------------------------------------
// TransactionEnvelope
// ---------------------------------------------------------------------------

/// An unsigned ledger transaction.
///
/// `id` is `double_sha256` of [`TransactionEnvelope::signable_bytes`] and is
/// fixed at build time. Two builders fed the same logical inputs produce the
/// same id: inputs and outputs keep the order they were added in, and the
/// signatory set is sorted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionEnvelope {
    pub id: TransactionId,
    pub version: u16,
    /// Consumed states, in the order the builder received them.
    pub inputs: Vec<StateRef>,
    /// Produced states. Output `i` becomes `StateRef { tx_id: id, index: i }`.
    pub outputs: Vec<LedgerState>,
    pub command: Command,
    pub time_window: TimeWindow,
    pub notary: PartyName,
    /// Keys that must sign before the notary will look at the transaction.
    pub signatories: BTreeSet<PublicKey>,
}

impl TransactionEnvelope {
    /// Canonical bytes hashed into the id.
    ///
    /// Layout: version (LE u16), input count + each `tx_id || index`,
    /// output count + each length-prefixed canonical state, command name,
    /// time window, notary name, signatory count + each key. Counts and
    /// lengths are LE u32.
    pub fn signable_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(512);

        buf.extend_from_slice(&self.version.to_le_bytes());

        buf.extend_from_slice(&(self.inputs.len() as u32).to_le_bytes());
        for input in &self.inputs {
            buf.extend_from_slice(input.tx_id.as_bytes());
            buf.extend_from_slice(&input.index.to_le_bytes());
        }

        buf.extend_from_slice(&(self.outputs.len() as u32).to_le_bytes());
        for output in &self.outputs {
            let bytes = output.canonical_bytes();
            buf.extend_from_slice(&(bytes.len() as u32).to_le_bytes());
            buf.extend_from_slice(&bytes);
        }

        buf.extend_from_slice(self.command.to_string().as_bytes());
        buf.push(0x00);

        self.time_window.write_canonical(&mut buf);

        buf.extend_from_slice(self.notary.as_str().as_bytes());
        buf.push(0x00);

        buf.extend_from_slice(&(self.signatories.len() as u32).to_le_bytes());
        for key in &self.signatories {
            buf.extend_from_slice(key.as_bytes());
        }

        buf
    }

    /// Recompute the id from the current field values.
    pub fn compute_id(&self) -> TransactionId {
        TransactionId::from_bytes(double_sha256(&self.signable_bytes()))
    }

    /// Reference to this transaction's `index`-th output.
    pub fn output_ref(&self, index: u32) -> StateRef {
        StateRef::new(self.id, index)
    }

    /// Outputs paired with their future ledger references.
    pub fn output_refs(&self) -> impl Iterator<Item = (StateRef, &LedgerState)> + '_ {
        self.outputs
            .iter()
            .enumerate()
            .map(move |(i, s)| (StateRef::new(self.id, i as u32), s))
    }
}

// ---------------------------------------------------------------------------
// TransactionBuilder
// ---------------------------------------------------------------------------

/// Fluent builder for [`TransactionEnvelope`].
///
/// ```rust,no_run
/// use orchard_protocol::transaction::{Command, TimeWindow, TransactionBuilder};
/// # fn demo(stamp_ref: orchard_protocol::asset::StateRef,
/// #         basket_ref: orchard_protocol::asset::StateRef,
/// #         output: orchard_protocol::asset::Basket,
/// #         seller: orchard_protocol::crypto::PublicKey,
/// #         buyer: orchard_protocol::crypto::PublicKey,
/// #         window: TimeWindow) {
/// let envelope = TransactionBuilder::new(Command::Redeem)
///     .notary("O=Notary, L=London, C=GB".into())
///     .add_input(stamp_ref)
///     .add_input(basket_ref)
///     .add_output(output.into())
///     .time_window(window)
///     .add_signatories([seller, buyer])
///     .build()
///     .expect("well-formed");
/// # }
/// ```
pub struct TransactionBuilder {
    version: u16,
    command: Command,
    notary: Option<PartyName>,
    inputs: Vec<StateRef>,
    outputs: Vec<LedgerState>,
    time_window: Option<TimeWindow>,
    signatories: BTreeSet<PublicKey>,
}

impl TransactionBuilder {
    pub fn new(command: Command) -> Self {
        Self {
            version: TRANSACTION_VERSION,
            command,
            notary: None,
            inputs: Vec::new(),
            outputs: Vec::new(),
            time_window: None,
            signatories: BTreeSet::new(),
        }
    }

    /// Override the transaction version. Only useful when testing upgrades.
    pub fn version(mut self, version: u16) -> Self {
        self.version = version;
        self
    }

    pub fn notary(mut self, notary: PartyName) -> Self {
        self.notary = Some(notary);
        self
    }

    pub fn add_input(mut self, state_ref: StateRef) -> Self {
        self.inputs.push(state_ref);
        self
    }

    pub fn add_output(mut self, state: LedgerState) -> Self {
        self.outputs.push(state);
        self
    }

    pub fn time_window(mut self, window: TimeWindow) -> Self {
        self.time_window = Some(window);
        self
    }

    pub fn add_signatories(mut self, keys: impl IntoIterator<Item = PublicKey>) -> Self {
        self.signatories.extend(keys);
        self
    }

    /// Consume the builder and produce an unsigned envelope.
    ///
    /// # Errors
    ///
    /// [`TransactionError::Malformed`] when there are no inputs, no outputs,
    /// no signatories, no notary, no time window, or the same input appears
    /// twice.
    pub fn build(self) -> Result<TransactionEnvelope, TransactionError> {
        if self.inputs.is_empty() {
            return Err(TransactionError::malformed("transaction has no inputs"));
        }
        if self.outputs.is_empty() {
            return Err(TransactionError::malformed("transaction has no outputs"));
        }
        if self.signatories.is_empty() {
            return Err(TransactionError::malformed(
                "transaction has no required signatories",
            ));
        }
        let notary = self
            .notary
            .filter(|n| !n.is_empty())
            .ok_or_else(|| TransactionError::malformed("transaction has no notary"))?;
        let time_window = self
            .time_window
            .ok_or_else(|| TransactionError::malformed("transaction has no time window"))?;

        let distinct: BTreeSet<&StateRef> = self.inputs.iter().collect();
        if distinct.len() != self.inputs.len() {
            return Err(TransactionError::malformed("duplicate input state"));
        }

        let mut envelope = TransactionEnvelope {
            id: TransactionId::from_bytes([0u8; 32]),
            version: self.version,
            inputs: self.inputs,
            outputs: self.outputs,
            command: self.command,
            time_window,
            notary,
            signatories: self.signatories,
        };
        envelope.id = envelope.compute_id();
        Ok(envelope)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
