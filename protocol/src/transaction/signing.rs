//! Transaction signing with Ed25519 keypairs.
//!
//! Every party signs the same thing: the 32 raw bytes of the canonical
//! [`TransactionId`]. Because the id commits to inputs, outputs, command,
//! time window, notary, and signatories, a signature over it is a signature
//! over all of them.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use super::builder::TransactionEnvelope;
use super::types::TransactionId;
use super::verification::TransactionError;
use crate::crypto::{PartyKeypair, PublicKey, Signature};

/// Sign an envelope's canonical id.
pub fn sign_envelope(envelope: &TransactionEnvelope, keypair: &PartyKeypair) -> Signature {
    keypair.sign(envelope.id.as_bytes())
}

// ---------------------------------------------------------------------------
// SignatureBundle
// ---------------------------------------------------------------------------

/// Signatures collected so far, keyed by signer.
///
/// Owned by exactly one redemption attempt until it is complete.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureBundle {
    signatures: BTreeMap<PublicKey, Signature>,
}

impl SignatureBundle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sign `id` with `keypair` and add the result. Returns the signature.
    pub fn sign(&mut self, id: &TransactionId, keypair: &PartyKeypair) -> Signature {
        let signature = keypair.sign(id.as_bytes());
        self.signatures.insert(keypair.public_key(), signature.clone());
        signature
    }

    /// Add a signature produced elsewhere. It is not checked here; call
    /// [`SignatureBundle::verify_all`] before trusting the bundle.
    pub fn insert(&mut self, key: PublicKey, signature: Signature) {
        self.signatures.insert(key, signature);
    }

    pub fn get(&self, key: &PublicKey) -> Option<&Signature> {
        self.signatures.get(key)
    }

    pub fn len(&self) -> usize {
        self.signatures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signatures.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&PublicKey, &Signature)> {
        self.signatures.iter()
    }

    /// Required signatories that have not signed yet.
    pub fn missing(&self, required: &BTreeSet<PublicKey>) -> Vec<PublicKey> {
        required
            .iter()
            .filter(|key| !self.signatures.contains_key(key))
            .cloned()
            .collect()
    }

    /// Check every signature in the bundle: the signer must be in `required`
    /// and the signature must verify over `id`. Says nothing about
    /// completeness.
    pub fn verify_all(
        &self,
        id: &TransactionId,
        required: &BTreeSet<PublicKey>,
    ) -> Result<(), TransactionError> {
        for (key, signature) in &self.signatures {
            if !required.contains(key) {
                return Err(TransactionError::UnexpectedSigner { key: key.clone() });
            }
            if !key.verify(id.as_bytes(), signature) {
                return Err(TransactionError::InvalidSignature { key: key.clone() });
            }
        }
        Ok(())
    }

    /// `true` when every required key has a verifying signature and nothing
    /// else is present.
    pub fn is_complete_for(&self, envelope: &TransactionEnvelope) -> bool {
        self.verify_all(&envelope.id, &envelope.signatories).is_ok()
            && self.missing(&envelope.signatories).is_empty()
    }
}

// ---------------------------------------------------------------------------
// SignedTransaction
// ---------------------------------------------------------------------------

/// An envelope together with the signatures gathered for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedTransaction {
    pub envelope: TransactionEnvelope,
    pub signatures: SignatureBundle,
}

impl SignedTransaction {
    pub fn new(envelope: TransactionEnvelope, signatures: SignatureBundle) -> Self {
        Self {
            envelope,
            signatures,
        }
    }

    pub fn id(&self) -> TransactionId {
        self.envelope.id
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signing_is_deterministic_per_key() {
        let kp = PartyKeypair::from_seed(&[3u8; 32]);
        let id = TransactionId::from_bytes([7u8; 32]);
        let mut a = SignatureBundle::new();
        let mut b = SignatureBundle::new();
        assert_eq!(a.sign(&id, &kp), b.sign(&id, &kp));
    }

    #[test]
    fn missing_lists_unsigned_keys_in_order() {
        let k1 = PartyKeypair::generate();
        let k2 = PartyKeypair::generate();
        let required: BTreeSet<_> = [k1.public_key(), k2.public_key()].into_iter().collect();
        let id = TransactionId::from_bytes([1u8; 32]);

        let mut bundle = SignatureBundle::new();
        assert_eq!(bundle.missing(&required).len(), 2);

        bundle.sign(&id, &k2);
        assert_eq!(bundle.missing(&required), vec![k1.public_key()]);

        bundle.sign(&id, &k1);
        assert!(bundle.missing(&required).is_empty());
        assert!(bundle.verify_all(&id, &required).is_ok());
    }

    #[test]
    fn resigning_replaces_previous_entry() {
        let kp = PartyKeypair::generate();
        let mut bundle = SignatureBundle::new();
        bundle.sign(&TransactionId::from_bytes([1u8; 32]), &kp);
        bundle.sign(&TransactionId::from_bytes([2u8; 32]), &kp);
        assert_eq!(bundle.len(), 1);
        assert!(kp.public_key().verify(
            TransactionId::from_bytes([2u8; 32]).as_bytes(),
            bundle.get(&kp.public_key()).unwrap()
        ));
    }
}
