//! Input selection for a redemption.
//!
//! Reads are snapshot reads. Two attempts may select the same states; the
//! notary decides which one wins.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::asset::{Basket, LedgerState, StateAndRef, StateKind, Stamp};
use crate::crypto::PublicKey;
use crate::vault::{Lookup, StateStore, VaultError};

/// Which basket to take when the stamp issuer owns several.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "policy", content = "basket_id")]
pub enum BasketSelection {
    /// The first eligible basket in the store's iteration order.
    #[default]
    FirstEligible,
    /// Only the basket with this id, and only if it is eligible.
    ById(Uuid),
}

#[derive(Debug, Error)]
pub enum SelectionError {
    #[error("no unconsumed stamp with id {0}")]
    StampNotFound(Uuid),

    #[error("stamp issuer {issuer} owns no eligible basket")]
    NoEligibleBasket { issuer: PublicKey },

    #[error(transparent)]
    Vault(#[from] VaultError),
}

/// The states a redemption consumes and the state it produces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedemptionInputs {
    pub stamp: StateAndRef<Stamp>,
    pub basket: StateAndRef<Basket>,
    /// `basket` re-owned by the buyer.
    pub output: Basket,
}

/// Locate the stamp, pick a basket owned by its issuer, and compute the
/// re-owned output basket.
pub fn select_redemption_inputs(
    store: &dyn StateStore,
    stamp_id: Uuid,
    buyer: &PublicKey,
    selection: BasketSelection,
) -> Result<RedemptionInputs, SelectionError> {
    let stamp = match store.find_unconsumed_by_id(StateKind::Stamp, stamp_id)? {
        Lookup::Found(sar) => sar.into_stamp(),
        Lookup::NotFound => None,
    }
    .ok_or(SelectionError::StampNotFound(stamp_id))?;

    let issuer = stamp.state.issuer.clone();
    let eligible = |state: &LedgerState| {
        state.as_basket().is_some_and(|basket| {
            basket.owner == issuer
                && match selection {
                    BasketSelection::FirstEligible => true,
                    BasketSelection::ById(id) => basket.id == id,
                }
        })
    };
    let basket = match store.find_unconsumed_by_predicate(StateKind::Basket, &eligible)? {
        Lookup::Found(sar) => sar.into_basket(),
        Lookup::NotFound => None,
    }
    .ok_or_else(|| SelectionError::NoEligibleBasket {
        issuer: issuer.clone(),
    })?;

    let output = basket.state.change_owner(buyer.clone());
    Ok(RedemptionInputs {
        stamp,
        basket,
        output,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::PartyKeypair;
    use crate::vault::MemoryVault;

    struct Setup {
        vault: MemoryVault,
        seller: PublicKey,
        buyer: PublicKey,
        stamp: Stamp,
    }

    fn setup() -> Setup {
        let seller = PartyKeypair::generate().public_key();
        let vault = MemoryVault::new(seller.clone());
        let buyer = PartyKeypair::generate().public_key();
        let stamp = Stamp::new("one basket", seller.clone());
        vault.seed(vec![stamp.clone().into()]).unwrap();
        Setup {
            vault,
            seller,
            buyer,
            stamp,
        }
    }

    #[test]
    fn selects_first_eligible_and_reowns_it() {
        let s = setup();
        let stranger = PartyKeypair::generate().public_key();
        let foreign = Basket::new("pears", "Elsewhere", stranger, 3);
        let first = Basket::new("apples", "Farm", s.seller.clone(), 10);
        let second = Basket::new("apples", "Farm", s.seller.clone(), 20);
        s.vault
            .seed(vec![foreign.into(), first.clone().into(), second.into()])
            .unwrap();

        let picked =
            select_redemption_inputs(&s.vault, s.stamp.id, &s.buyer, BasketSelection::default())
                .unwrap();
        assert_eq!(picked.stamp.state, s.stamp);
        assert_eq!(picked.basket.state, first);
        assert_eq!(picked.output.owner, s.buyer);
        assert!(picked.output.same_contents(&first));
    }

    #[test]
    fn by_id_picks_the_named_basket() {
        let s = setup();
        let first = Basket::new("apples", "Farm", s.seller.clone(), 10);
        let second = Basket::new("apples", "Farm", s.seller.clone(), 20);
        s.vault
            .seed(vec![first.into(), second.clone().into()])
            .unwrap();

        let picked = select_redemption_inputs(
            &s.vault,
            s.stamp.id,
            &s.buyer,
            BasketSelection::ById(second.id),
        )
        .unwrap();
        assert_eq!(picked.basket.state, second);
    }

    #[test]
    fn unknown_stamp() {
        let s = setup();
        let missing = Uuid::new_v4();
        match select_redemption_inputs(&s.vault, missing, &s.buyer, BasketSelection::default()) {
            Err(SelectionError::StampNotFound(id)) => assert_eq!(id, missing),
            other => panic!("expected StampNotFound, got {:?}", other),
        }
    }

    #[test]
    fn issuer_without_baskets() {
        let s = setup();
        let stranger = PartyKeypair::generate().public_key();
        s.vault
            .seed(vec![Basket::new("apples", "Farm", stranger, 10).into()])
            .unwrap();
        match select_redemption_inputs(&s.vault, s.stamp.id, &s.buyer, BasketSelection::default())
        {
            Err(SelectionError::NoEligibleBasket { issuer }) => assert_eq!(issuer, s.seller),
            other => panic!("expected NoEligibleBasket, got {:?}", other),
        }
    }

    #[test]
    fn by_id_for_ineligible_basket() {
        let s = setup();
        let stranger = PartyKeypair::generate().public_key();
        let foreign = Basket::new("apples", "Farm", stranger, 10);
        s.vault
            .seed(vec![
                foreign.clone().into(),
                Basket::new("apples", "Farm", s.seller.clone(), 10).into(),
            ])
            .unwrap();
        assert!(matches!(
            select_redemption_inputs(
                &s.vault,
                s.stamp.id,
                &s.buyer,
                BasketSelection::ById(foreign.id)
            ),
            Err(SelectionError::NoEligibleBasket { .. })
        ));
    }

    #[test]
    fn selection_json_shape() {
        let json = serde_json::to_string(&BasketSelection::FirstEligible).unwrap();
        assert_eq!(json, r#"{"policy":"first_eligible"}"#);
        let id = Uuid::new_v4();
        let parsed: BasketSelection =
            serde_json::from_str(&format!(r#"{{"policy":"by_id","basket_id":"{}"}}"#, id)).unwrap();
        assert_eq!(parsed, BasketSelection::ById(id));
    }
}
