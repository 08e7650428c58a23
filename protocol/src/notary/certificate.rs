//! Uniqueness certificates and notarised transactions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::crypto::{PartyKeypair, PublicKey, Signature};
use crate::identity::PartyName;
use crate::transaction::{SignedTransaction, TransactionId};

/// Domain tag prefixed to the bytes a notary signs. Party signatures cover
/// the bare 32-byte id.
const CERTIFICATE_DOMAIN: &[u8] = b"orchard-uniqueness-v1";

/// The notary's statement that a transaction's inputs were unspent and its
/// time window was open when it was certified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UniquenessCertificate {
    pub notary: PartyName,
    pub notary_key: PublicKey,
    pub tx_id: TransactionId,
    pub certified_at: DateTime<Utc>,
    pub signature: Signature,
}

impl UniquenessCertificate {
    /// Issue a certificate signed by `keypair`.
    pub fn issue(
        notary: PartyName,
        keypair: &PartyKeypair,
        tx_id: TransactionId,
        certified_at: DateTime<Utc>,
    ) -> Self {
        let signature = keypair.sign(&Self::signable_bytes(&tx_id, certified_at));
        Self {
            notary,
            notary_key: keypair.public_key(),
            tx_id,
            certified_at,
            signature,
        }
    }

    fn signable_bytes(tx_id: &TransactionId, certified_at: DateTime<Utc>) -> Vec<u8> {
        let mut buf = Vec::with_capacity(CERTIFICATE_DOMAIN.len() + 40);
        buf.extend_from_slice(CERTIFICATE_DOMAIN);
        buf.extend_from_slice(tx_id.as_bytes());
        buf.extend_from_slice(&certified_at.timestamp_millis().to_le_bytes());
        buf
    }

    /// `true` if this certificate covers `tx_id` and was signed by
    /// `expected_key`.
    pub fn verify(&self, tx_id: &TransactionId, expected_key: &PublicKey) -> bool {
        &self.tx_id == tx_id
            && &self.notary_key == expected_key
            && expected_key.verify(
                &Self::signable_bytes(&self.tx_id, self.certified_at),
                &self.signature,
            )
    }
}

/// A fully signed transaction plus the notary's certificate. This is what
/// both parties record in their vaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotarisedTransaction {
    pub transaction: SignedTransaction,
    pub certificate: UniquenessCertificate,
}

impl NotarisedTransaction {
    pub fn new(transaction: SignedTransaction, certificate: UniquenessCertificate) -> Self {
        Self {
            transaction,
            certificate,
        }
    }

    pub fn id(&self) -> TransactionId {
        self.transaction.id()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn certificate_verifies_for_its_transaction_only() {
        let notary = PartyKeypair::generate();
        let tx = TransactionId::from_bytes([4u8; 32]);
        let cert = UniquenessCertificate::issue(
            PartyName::new("O=Notary, L=London, C=GB"),
            &notary,
            tx,
            Utc::now(),
        );

        assert!(cert.verify(&tx, &notary.public_key()));
        assert!(!cert.verify(&TransactionId::from_bytes([5u8; 32]), &notary.public_key()));
        assert!(!cert.verify(&tx, &PartyKeypair::generate().public_key()));
    }

    #[test]
    fn forged_timestamp_fails() {
        let notary = PartyKeypair::generate();
        let tx = TransactionId::from_bytes([4u8; 32]);
        let mut cert = UniquenessCertificate::issue(
            PartyName::new("O=Notary, L=London, C=GB"),
            &notary,
            tx,
            Utc::now(),
        );
        cert.certified_at += chrono::Duration::seconds(10);
        assert!(!cert.verify(&tx, &notary.public_key()));
    }
}
