//! Messages exchanged between the initiator and responder of a redemption.

use serde::{Deserialize, Serialize};

use super::SessionError;
use crate::asset::{LedgerState, StateAndRef};
use crate::crypto::Signature;
use crate::notary::NotarisedTransaction;
use crate::transaction::{SignatureBundle, TransactionEnvelope};

/// One frame on a redemption session.
///
/// ```text
/// initiator                         responder
///     │ ── Propose ───────────────────▶ │
///     │ ◀──────────── Signatures/Reject │
///     │ ── Finalized ─────────────────▶ │
///     │ ◀──────── Recorded/RecordFailed │
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionMessage {
    /// The unsigned envelope, the resolved input states it consumes (in
    /// envelope input order), and the initiator's signature over its id.
    Propose {
        envelope: TransactionEnvelope,
        inputs: Vec<StateAndRef<LedgerState>>,
        signature: Signature,
    },

    /// The responder's signatures over the proposed id.
    Signatures(SignatureBundle),

    /// The responder refuses to sign.
    Reject { reason: String },

    /// The notarised transaction, for the responder to record.
    Finalized(Box<NotarisedTransaction>),

    /// The responder durably recorded the finalized transaction.
    Recorded,

    /// The responder could not record the finalized transaction.
    RecordFailed { reason: String },
}

impl SessionMessage {
    /// Short name for logs and "unexpected message" errors.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Propose { .. } => "Propose",
            Self::Signatures(_) => "Signatures",
            Self::Reject { .. } => "Reject",
            Self::Finalized(_) => "Finalized",
            Self::Recorded => "Recorded",
            Self::RecordFailed { .. } => "RecordFailed",
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>, SessionError> {
        bincode::serialize(self).map_err(|e| SessionError::Codec(e.to_string()))
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, SessionError> {
        bincode::deserialize(bytes).map_err(|e| SessionError::Codec(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frames_survive_the_wire() {
        let msg = SessionMessage::Reject {
            reason: "output not owned by me".into(),
        };
        let bytes = msg.encode().unwrap();
        assert_eq!(SessionMessage::decode(&bytes).unwrap(), msg);
        assert_eq!(msg.name(), "Reject");
    }

    #[test]
    fn garbage_is_a_codec_error() {
        assert!(matches!(
            SessionMessage::decode(&[0xFF, 0xFF, 0xFF, 0xFF, 0x01]),
            Err(SessionError::Codec(_))
        ));
    }
}
