//! Transaction verification: id integrity and signature completeness.
//!
//! Both the counterparty (before it signs) and the notary (before it
//! certifies) need to know that an envelope is what it claims to be and that
//! every required party has signed it. Checks run cheapest first.

use thiserror::Error;

use super::builder::TransactionEnvelope;
use super::signing::SignedTransaction;
use super::types::TransactionId;
use crate::crypto::PublicKey;

/// Structural and cryptographic transaction errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransactionError {
    /// Missing inputs, outputs, signatories, notary, or similar.
    #[error("malformed transaction: {reason}")]
    Malformed { reason: String },

    /// The stored id is not the hash of the envelope's contents.
    #[error("transaction id mismatch: expected {expected}, got {actual}")]
    IdMismatch {
        expected: TransactionId,
        actual: TransactionId,
    },

    /// One or more required signatories have not signed.
    #[error("missing signatures from {} required signatories", missing.len())]
    MissingSignatures { missing: Vec<PublicKey> },

    /// A signature does not verify against its key and the transaction id.
    #[error("invalid signature from {key}")]
    InvalidSignature { key: PublicKey },

    /// A signature from a key that is not a required signatory.
    #[error("unexpected signer {key}: not a required signatory")]
    UnexpectedSigner { key: PublicKey },
}

impl TransactionError {
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::Malformed {
            reason: reason.into(),
        }
    }
}

/// Check that `envelope.id` matches its contents.
pub fn verify_id(envelope: &TransactionEnvelope) -> Result<(), TransactionError> {
    let expected = envelope.compute_id();
    if envelope.id != expected {
        return Err(TransactionError::IdMismatch {
            expected,
            actual: envelope.id,
        });
    }
    Ok(())
}

/// Verify a signed transaction is ready for notarization.
///
/// 1. **Id** — recomputed and compared.
/// 2. **Signers** — every signer must be a required signatory.
/// 3. **Validity** — every signature verifies over the id.
/// 4. **Completeness** — every required signatory has signed.
pub fn verify_signed(tx: &SignedTransaction) -> Result<(), TransactionError> {
    verify_id(&tx.envelope)?;
    tx.signatures.verify_all(&tx.envelope.id, &tx.envelope.signatories)?;

    let missing = tx.signatures.missing(&tx.envelope.signatories);
    if !missing.is_empty() {
        return Err(TransactionError::MissingSignatures { missing });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
