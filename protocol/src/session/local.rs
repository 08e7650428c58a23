//! In-process session network.
//!
//! Every registered party owns an inbox of [`IncomingSession`]s. Initiating
//! a session creates a pair of bounded mpsc channels, keeps one end and
//! posts the other into the counterparty's inbox. Frames cross the channel
//! bincode-encoded, so whatever goes over a session here would also go over
//! a real transport.

use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::debug;

use super::{FlowMessaging, Session, SessionError, SessionMessage};
use crate::config::{REDEEM_PROTOCOL, SESSION_CHANNEL_CAPACITY};
use crate::identity::PartyName;

/// A session another party opened with us.
pub struct IncomingSession {
    /// Flow protocol tag the initiator speaks.
    pub protocol: &'static str,
    pub session: ChannelSession,
}

impl IncomingSession {
    pub fn initiator(&self) -> &PartyName {
        self.session.counterparty()
    }
}

/// Session half backed by tokio mpsc channels.
pub struct ChannelSession {
    counterparty: PartyName,
    outbound: mpsc::Sender<Vec<u8>>,
    inbound: mpsc::Receiver<Vec<u8>>,
}

impl ChannelSession {
    /// Two connected halves: the first talks to `b`, the second to `a`.
    fn pair(a: PartyName, b: PartyName) -> (Self, Self) {
        let (a_tx, b_rx) = mpsc::channel(SESSION_CHANNEL_CAPACITY);
        let (b_tx, a_rx) = mpsc::channel(SESSION_CHANNEL_CAPACITY);
        (
            Self {
                counterparty: b,
                outbound: a_tx,
                inbound: a_rx,
            },
            Self {
                counterparty: a,
                outbound: b_tx,
                inbound: b_rx,
            },
        )
    }
}

#[async_trait]
impl Session for ChannelSession {
    fn counterparty(&self) -> &PartyName {
        &self.counterparty
    }

    async fn send(&mut self, message: SessionMessage) -> Result<(), SessionError> {
        debug!(to = %self.counterparty, message = message.name(), "session send");
        let frame = message.encode()?;
        self.outbound
            .send(frame)
            .await
            .map_err(|_| SessionError::Closed(self.counterparty.clone()))
    }

    async fn receive(&mut self) -> Result<SessionMessage, SessionError> {
        let frame = self
            .inbound
            .recv()
            .await
            .ok_or_else(|| SessionError::Closed(self.counterparty.clone()))?;
        let message = SessionMessage::decode(&frame)?;
        debug!(from = %self.counterparty, message = message.name(), "session receive");
        Ok(message)
    }
}

// ---------------------------------------------------------------------------
// InProcessNetwork
// ---------------------------------------------------------------------------

/// Registry of party inboxes. Cloning shares the registry.
#[derive(Clone, Default)]
pub struct InProcessNetwork {
    inboxes: Arc<DashMap<PartyName, mpsc::Sender<IncomingSession>>>,
}

impl InProcessNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `party` and return the receiver its responder should drain.
    /// Re-registering replaces the previous inbox.
    pub fn register(&self, party: PartyName) -> mpsc::Receiver<IncomingSession> {
        let (tx, rx) = mpsc::channel(SESSION_CHANNEL_CAPACITY);
        self.inboxes.insert(party, tx);
        rx
    }

    pub fn deregister(&self, party: &PartyName) {
        self.inboxes.remove(party);
    }

    /// A messaging handle that initiates sessions as `me`.
    pub fn endpoint(&self, me: PartyName) -> NetworkEndpoint {
        NetworkEndpoint {
            me,
            network: self.clone(),
        }
    }
}

/// [`FlowMessaging`] for one party on an [`InProcessNetwork`].
#[derive(Clone)]
pub struct NetworkEndpoint {
    me: PartyName,
    network: InProcessNetwork,
}

#[async_trait]
impl FlowMessaging for NetworkEndpoint {
    async fn initiate(&self, counterparty: &PartyName) -> Result<Box<dyn Session>, SessionError> {
        let inbox = self
            .network
            .inboxes
            .get(counterparty)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| SessionError::UnknownParty(counterparty.clone()))?;

        let (ours, theirs) = ChannelSession::pair(self.me.clone(), counterparty.clone());
        inbox
            .send(IncomingSession {
                protocol: REDEEM_PROTOCOL,
                session: theirs,
            })
            .await
            .map_err(|_| SessionError::Closed(counterparty.clone()))?;

        debug!(from = %self.me, to = %counterparty, protocol = REDEEM_PROTOCOL, "session initiated");
        Ok(Box::new(ours))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn initiate_delivers_connected_half() {
        let network = InProcessNetwork::new();
        let alice = PartyName::new("O=Alice, L=London, C=GB");
        let bob = PartyName::new("O=Bob, L=New York, C=US");
        let mut bob_inbox = network.register(bob.clone());

        let mut session = network.endpoint(alice.clone()).initiate(&bob).await.unwrap();
        let mut incoming = bob_inbox.recv().await.unwrap();
        assert_eq!(incoming.initiator(), &alice);
        assert_eq!(incoming.protocol, REDEEM_PROTOCOL);

        session.send(SessionMessage::Recorded).await.unwrap();
        assert_eq!(incoming.session.receive().await.unwrap(), SessionMessage::Recorded);

        incoming
            .session
            .send(SessionMessage::Reject { reason: "no".into() })
            .await
            .unwrap();
        assert_eq!(
            session.receive().await.unwrap(),
            SessionMessage::Reject { reason: "no".into() }
        );
    }

    #[tokio::test]
    async fn unknown_party_has_no_route() {
        let network = InProcessNetwork::new();
        let result = network
            .endpoint(PartyName::new("O=Alice, L=London, C=GB"))
            .initiate(&PartyName::new("O=Nobody, L=Nowhere, C=XX"))
            .await;
        assert!(matches!(result, Err(SessionError::UnknownParty(_))));
    }

    #[tokio::test]
    async fn dropped_counterparty_closes_session() {
        let network = InProcessNetwork::new();
        let bob = PartyName::new("O=Bob, L=New York, C=US");
        let mut inbox = network.register(bob.clone());
        let mut session = network
            .endpoint(PartyName::new("O=Alice, L=London, C=GB"))
            .initiate(&bob)
            .await
            .unwrap();
        drop(inbox.recv().await.unwrap());

        assert_eq!(
            session.receive().await.unwrap_err(),
            SessionError::Closed(bob)
        );
    }
}
