//! Stamp state.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::state::{put_keys, put_str};
use crate::crypto::PublicKey;

/// A single-use voucher entitling its bearer to one basket from the issuer.
///
/// Immutable once issued. Consumed exactly once, as an input to a `Redeem`
/// transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stamp {
    pub id: Uuid,
    /// Free-text description printed on the stamp.
    pub description: String,
    /// Ledger key of the issuing party. Baskets owned by this key are the
    /// ones the stamp can be redeemed against.
    pub issuer: PublicKey,
    /// Parties whose vaults keep this stamp.
    pub participants: Vec<PublicKey>,
}

impl Stamp {
    /// Issue a new stamp with a fresh random id.
    pub fn new(description: impl Into<String>, issuer: PublicKey) -> Self {
        Self {
            id: Uuid::new_v4(),
            description: description.into(),
            participants: vec![issuer.clone()],
            issuer,
        }
    }

    pub(crate) fn write_canonical(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(self.id.as_bytes());
        put_str(buf, &self.description);
        buf.extend_from_slice(self.issuer.as_bytes());
        put_keys(buf, &self.participants);
    }
}
