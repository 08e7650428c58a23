//! Basket state and its ownership transition.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::state::{put_keys, put_str};
use crate::crypto::PublicKey;

/// A basket of apples held by an owner.
///
/// `description`, `farm`, and `weight` are the basket's contents; the
/// protocol treats them as opaque and carries them over unchanged on every
/// transfer. `owner` is the only field a transaction ever changes, and
/// `participants` follows it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Basket {
    pub id: Uuid,
    pub description: String,
    pub farm: String,
    pub owner: PublicKey,
    pub weight: u32,
    /// Parties whose vaults keep this basket.
    pub participants: Vec<PublicKey>,
}

impl Basket {
    pub fn new(
        description: impl Into<String>,
        farm: impl Into<String>,
        owner: PublicKey,
        weight: u32,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            description: description.into(),
            farm: farm.into(),
            participants: vec![owner.clone()],
            owner,
            weight,
        }
    }

    /// Returns a copy of this basket owned by `new_owner`.
    ///
    /// Pure: `self` is left untouched. The participants become the new
    /// owner alone; every other field, id included, is carried over as is.
    pub fn change_owner(&self, new_owner: PublicKey) -> Basket {
        Basket {
            participants: vec![new_owner.clone()],
            owner: new_owner,
            ..self.clone()
        }
    }

    /// `true` when `other` has the same contents (everything but the owner).
    pub fn same_contents(&self, other: &Basket) -> bool {
        self.id == other.id
            && self.description == other.description
            && self.farm == other.farm
            && self.weight == other.weight
    }

    pub(crate) fn write_canonical(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(self.id.as_bytes());
        put_str(buf, &self.description);
        put_str(buf, &self.farm);
        buf.extend_from_slice(self.owner.as_bytes());
        buf.extend_from_slice(&self.weight.to_le_bytes());
        put_keys(buf, &self.participants);
    }
}
