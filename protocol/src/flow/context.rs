//! Services a party's flows run against.

use std::sync::Arc;
use tokio::sync::watch;

use crate::config::FlowConfig;
use crate::crypto::{PartyKeypair, PublicKey};
use crate::identity::MembershipDirectory;
use crate::notary::NotaryService;
use crate::session::FlowMessaging;
use crate::vault::StateStore;

/// Everything a node injects into its flows. Shared by the initiating
/// [`super::RedeemFlow`] and the [`super::RedeemResponder`].
#[derive(Clone)]
pub struct PartyContext {
    pub keypair: PartyKeypair,
    pub vault: Arc<dyn StateStore>,
    pub directory: Arc<dyn MembershipDirectory>,
    pub messaging: Arc<dyn FlowMessaging>,
    pub notary: Arc<dyn NotaryService>,
    pub config: FlowConfig,
}

impl PartyContext {
    pub fn public_key(&self) -> PublicKey {
        self.keypair.public_key()
    }
}

/// Cancellation signal for one redemption attempt. Send `true` to cancel.
pub type CancelToken = watch::Receiver<bool>;

/// A token that never fires.
pub fn never_cancel() -> CancelToken {
    let (_tx, rx) = watch::channel(false);
    rx
}

/// Resolves once `token` reads `true`. Pends forever if its sender is
/// dropped without cancelling.
pub(crate) async fn cancelled(token: &mut CancelToken) {
    loop {
        if *token.borrow_and_update() {
            return;
        }
        if token.changed().await.is_err() {
            futures::future::pending::<()>().await;
        }
    }
}

pub(crate) fn is_cancelled(token: &CancelToken) -> bool {
    *token.borrow()
}
