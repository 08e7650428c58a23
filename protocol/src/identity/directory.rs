//! Membership directory: resolves party names to ledger keys.
//!
//! The directory is an external collaborator. Flows only see the
//! [`MembershipDirectory`] trait; [`InMemoryDirectory`] backs tests and the
//! demo network.

use dashmap::DashMap;
use thiserror::Error;

use super::party::{PartyInfo, PartyName};
use crate::crypto::PublicKey;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum IdentityError {
    #[error("unknown party: {0}")]
    UnknownParty(PartyName),
}

/// Lookup interface over network membership.
pub trait MembershipDirectory: Send + Sync {
    /// The local node's own identity.
    fn my_info(&self) -> PartyInfo;

    /// Resolve a member by name.
    fn lookup(&self, name: &PartyName) -> Result<PartyInfo, IdentityError>;

    /// Reverse lookup by ledger key. `None` when the key is not a member's.
    fn lookup_by_key(&self, key: &PublicKey) -> Option<PartyInfo>;
}

/// Directory backed by a shared concurrent map.
///
/// Every node in an in-process network gets its own `InMemoryDirectory`
/// (different `me`) over the same member map.
#[derive(Debug, Clone)]
pub struct InMemoryDirectory {
    me: PartyInfo,
    members: std::sync::Arc<DashMap<PartyName, PartyInfo>>,
}

impl InMemoryDirectory {
    /// A directory containing only `me`.
    pub fn new(me: PartyInfo) -> Self {
        let members = DashMap::new();
        members.insert(me.name.clone(), me.clone());
        Self {
            me,
            members: std::sync::Arc::new(members),
        }
    }

    /// A view of the same membership from another member's point of view.
    /// `me` is registered if it is not already.
    pub fn view_as(&self, me: PartyInfo) -> Self {
        self.members.insert(me.name.clone(), me.clone());
        Self {
            me,
            members: std::sync::Arc::clone(&self.members),
        }
    }

    pub fn register(&self, info: PartyInfo) {
        self.members.insert(info.name.clone(), info);
    }
}

impl MembershipDirectory for InMemoryDirectory {
    fn my_info(&self) -> PartyInfo {
        self.me.clone()
    }

    fn lookup(&self, name: &PartyName) -> Result<PartyInfo, IdentityError> {
        self.members
            .get(name)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| IdentityError::UnknownParty(name.clone()))
    }

    fn lookup_by_key(&self, key: &PublicKey) -> Option<PartyInfo> {
        self.members
            .iter()
            .find(|entry| &entry.value().ledger_key == key)
            .map(|entry| entry.value().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::PartyKeypair;

    fn info(name: &str) -> PartyInfo {
        PartyInfo::new(PartyName::new(name), PartyKeypair::generate().public_key())
    }

    #[test]
    fn lookup_known_and_unknown() {
        let alice = info("O=Alice, L=London, C=GB");
        let dir = InMemoryDirectory::new(alice.clone());

        assert_eq!(dir.lookup(&alice.name).unwrap(), alice);
        assert_eq!(dir.my_info(), alice);

        let ghost = PartyName::new("O=Ghost, L=Nowhere, C=XX");
        assert_eq!(
            dir.lookup(&ghost),
            Err(IdentityError::UnknownParty(ghost.clone()))
        );
    }

    #[test]
    fn views_share_membership() {
        let alice = info("O=Alice, L=London, C=GB");
        let bob = info("O=Bob, L=New York, C=US");
        let alice_dir = InMemoryDirectory::new(alice.clone());
        let bob_dir = alice_dir.view_as(bob.clone());

        assert_eq!(bob_dir.my_info(), bob);
        assert_eq!(alice_dir.lookup(&bob.name).unwrap(), bob);
        assert_eq!(bob_dir.lookup(&alice.name).unwrap(), alice);
        assert_eq!(alice_dir.lookup_by_key(&bob.ledger_key), Some(bob));
    }
}
