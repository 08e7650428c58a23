//! # Session Messaging
//!
//! Point-to-point sessions between two named parties. A flow initiates a
//! session to a counterparty, exchanges [`SessionMessage`]s over it, and
//! drops it when done.
//!
//! ```text
//! session/
//! ├── message.rs  — SessionMessage frames and their bincode codec
//! └── local.rs    — in-process network over tokio mpsc channels
//! ```
//!
//! Sessions never time out on their own. Callers bound every wait with
//! `tokio::time::timeout`, so the policy lives with the flow that knows how
//! long it is willing to hold its inputs.

pub mod local;
pub mod message;

pub use local::{ChannelSession, InProcessNetwork, IncomingSession, NetworkEndpoint};
pub use message::SessionMessage;

use async_trait::async_trait;
use thiserror::Error;

use crate::identity::PartyName;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("no route to party {0}")]
    UnknownParty(PartyName),

    #[error("session with {0} closed")]
    Closed(PartyName),

    #[error("expected {expected} from {counterparty}, got {actual}")]
    Unexpected {
        counterparty: PartyName,
        expected: &'static str,
        actual: &'static str,
    },

    #[error("frame codec error: {0}")]
    Codec(String),
}

/// One side of an open session.
#[async_trait]
pub trait Session: Send {
    fn counterparty(&self) -> &PartyName;

    async fn send(&mut self, message: SessionMessage) -> Result<(), SessionError>;

    /// Wait for the next message. Returns [`SessionError::Closed`] once the
    /// other side has gone away.
    async fn receive(&mut self) -> Result<SessionMessage, SessionError>;
}

/// Opens sessions to other parties.
#[async_trait]
pub trait FlowMessaging: Send + Sync {
    async fn initiate(&self, counterparty: &PartyName) -> Result<Box<dyn Session>, SessionError>;
}
