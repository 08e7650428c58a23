//! # Protocol Configuration & Constants
//!
//! Every magic number the redemption protocol relies on lives here, next to
//! [`FlowConfig`], the per-deployment runtime configuration.
//!
//! The notary is named in `FlowConfig`, resolved once when a node starts and
//! injected into every flow.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::identity::PartyName;
use crate::transaction::selection::BasketSelection;

// ---------------------------------------------------------------------------
// Protocol Version
// ---------------------------------------------------------------------------

/// Version byte mixed into every canonical transaction id. Bump when the
/// signable byte layout changes.
pub const TRANSACTION_VERSION: u16 = 1;

/// Human-readable protocol version string.
pub const PROTOCOL_VERSION: &str = "0.1.0";

/// Session protocol tag carried by every initiated session, so a responder
/// can refuse traffic meant for another flow.
pub const REDEEM_PROTOCOL: &str = "redeem-apples";

// ---------------------------------------------------------------------------
// Timing Constants
// ---------------------------------------------------------------------------

/// Length of a redemption transaction's validity window. The upper bound is
/// submission time plus this.
pub const TIME_WINDOW: Duration = Duration::from_secs(24 * 60 * 60);

/// How long the initiator waits on the counterparty for any single message
/// (signature or record acknowledgement) before aborting.
pub const SESSION_TIMEOUT: Duration = Duration::from_secs(30);

/// Default number of notary submission attempts, first try included.
pub const NOTARY_MAX_ATTEMPTS: u32 = 4;

/// Backoff before the first notary retry. Doubles on each retry.
pub const NOTARY_INITIAL_BACKOFF: Duration = Duration::from_millis(200);

/// Cap on the notary retry backoff.
pub const NOTARY_MAX_BACKOFF: Duration = Duration::from_secs(5);

/// Capacity of each direction of an in-process session channel.
pub const SESSION_CHANNEL_CAPACITY: usize = 16;

// ---------------------------------------------------------------------------
// RetryPolicy
// ---------------------------------------------------------------------------

/// Bounded exponential backoff for transient notary failures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts including the first. `1` disables retries.
    pub max_attempts: u32,
    #[serde(with = "duration_ms")]
    pub initial_backoff: Duration,
    #[serde(with = "duration_ms")]
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: NOTARY_MAX_ATTEMPTS,
            initial_backoff: NOTARY_INITIAL_BACKOFF,
            max_backoff: NOTARY_MAX_BACKOFF,
        }
    }
}

impl RetryPolicy {
    /// No retries at all.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Sum of every backoff a fully failing submission waits through.
    pub fn total_backoff(&self) -> Duration {
        (1..self.max_attempts).map(|attempt| self.backoff_for(attempt)).sum()
    }

    /// Backoff to wait after the given (1-based) failed attempt.
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let factor = 1u32
            .checked_shl(attempt.saturating_sub(1))
            .unwrap_or(u32::MAX);
        self.initial_backoff
            .checked_mul(factor)
            .unwrap_or(self.max_backoff)
            .min(self.max_backoff)
    }
}

// ---------------------------------------------------------------------------
// FlowConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("notary_retry.max_attempts must be at least 1")]
    NoNotaryAttempts,

    /// The counterparty waits `session_timeout` for the finalized
    /// transaction while the initiator may still be backing off.
    #[error(
        "session timeout of {session_timeout:?} must exceed the notary retry backoff of {retry_backoff:?}"
    )]
    SessionTimeoutTooShort {
        session_timeout: Duration,
        retry_backoff: Duration,
    },
}

/// Runtime configuration shared by every redemption flow on a node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowConfig {
    /// The notary every redemption is submitted to.
    pub notary: PartyName,

    /// Bound on each wait for the counterparty.
    #[serde(with = "duration_ms", default = "default_session_timeout")]
    pub session_timeout: Duration,

    /// Validity window length; upper bound = now + this.
    #[serde(with = "duration_ms", default = "default_time_window")]
    pub time_window: Duration,

    #[serde(default)]
    pub notary_retry: RetryPolicy,

    /// How to choose among several eligible baskets.
    #[serde(default)]
    pub basket_selection: BasketSelection,
}

impl FlowConfig {
    /// Configuration with protocol defaults for everything but the notary.
    pub fn new(notary: PartyName) -> Self {
        Self {
            notary,
            session_timeout: SESSION_TIMEOUT,
            time_window: TIME_WINDOW,
            notary_retry: RetryPolicy::default(),
            basket_selection: BasketSelection::default(),
        }
    }

    pub fn with_session_timeout(mut self, timeout: Duration) -> Self {
        self.session_timeout = timeout;
        self
    }

    pub fn with_notary_retry(mut self, policy: RetryPolicy) -> Self {
        self.notary_retry = policy;
        self
    }

    pub fn with_time_window(mut self, window: Duration) -> Self {
        self.time_window = window;
        self
    }

    /// Check the settings against each other. Run after loading.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.notary_retry.max_attempts == 0 {
            return Err(ConfigError::NoNotaryAttempts);
        }
        let retry_backoff = self.notary_retry.total_backoff();
        if self.session_timeout <= retry_backoff {
            return Err(ConfigError::SessionTimeoutTooShort {
                session_timeout: self.session_timeout,
                retry_backoff,
            });
        }
        Ok(())
    }
}

fn default_session_timeout() -> Duration {
    SESSION_TIMEOUT
}

fn default_time_window() -> Duration {
    TIME_WINDOW
}

/// Serialize `Duration` as integer milliseconds in config files.
mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}
