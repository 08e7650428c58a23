//! Core value types for redemption transactions.
//!
//! Small, mostly `Copy` vocabulary shared by the builder, the signing code,
//! the notary, and the vault.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ---------------------------------------------------------------------------
// TransactionId
// ---------------------------------------------------------------------------

/// Canonical transaction identifier: `double_sha256(signable_bytes)`.
///
/// The id is both the signing target for every party and the key under which
/// the notary and the vaults record the transaction. Displayed as lowercase
/// hex.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TransactionId([u8; 32]);

impl TransactionId {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TransactionId({})", &self.to_hex()[..16])
    }
}

impl FromStr for TransactionId {
    type Err = hex::FromHexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(s, &mut bytes)?;
        Ok(Self(bytes))
    }
}

// ---------------------------------------------------------------------------
// Command
// ---------------------------------------------------------------------------

/// The transition rule a transaction claims to follow. Contract
/// verification dispatches on this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Command {
    /// Consume a stamp and a basket, re-issue the basket to a new owner.
    Redeem,
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Redeem => write!(f, "Redeem"),
        }
    }
}

// ---------------------------------------------------------------------------
// TimeWindow
// ---------------------------------------------------------------------------

/// Interval within which the notary may certify a transaction.
///
/// Redemptions only ever set an upper bound. `from`, when present, is
/// inclusive; `until` is exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub from: Option<DateTime<Utc>>,
    pub until: DateTime<Utc>,
}

impl TimeWindow {
    pub fn until(until: DateTime<Utc>) -> Self {
        Self { from: None, until }
    }

    /// Window ending `length` after `now`.
    pub fn from_now(now: DateTime<Utc>, length: std::time::Duration) -> Self {
        let length =
            ChronoDuration::from_std(length).unwrap_or_else(|_| ChronoDuration::days(36_500));
        Self::until(now.checked_add_signed(length).unwrap_or(DateTime::<Utc>::MAX_UTC))
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.from.map_or(true, |from| instant >= from) && instant < self.until
    }

    pub(crate) fn write_canonical(&self, buf: &mut Vec<u8>) {
        match self.from {
            Some(from) => {
                buf.push(0x01);
                buf.extend_from_slice(&from.timestamp_millis().to_le_bytes());
            }
            None => buf.push(0x00),
        }
        buf.extend_from_slice(&self.until.timestamp_millis().to_le_bytes());
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.from {
            Some(from) => write!(f, "[{}, {})", from.to_rfc3339(), self.until.to_rfc3339()),
            None => write!(f, "(.., {})", self.until.to_rfc3339()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn transaction_id_hex_roundtrip() {
        let id = TransactionId::from_bytes([0xAB; 32]);
        assert_eq!(id.to_string().len(), 64);
        assert_eq!(id.to_string().parse::<TransactionId>().unwrap(), id);
        assert!("xyz".parse::<TransactionId>().is_err());
    }

    #[test]
    fn command_display() {
        assert_eq!(Command::Redeem.to_string(), "Redeem");
    }

    #[test]
    fn time_window_bounds() {
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap();
        let window = TimeWindow::from_now(now, std::time::Duration::from_secs(86_400));

        assert!(window.contains(now));
        assert!(window.contains(now + ChronoDuration::hours(23)));
        assert!(!window.contains(now + ChronoDuration::hours(24)));
        assert_eq!(window.until, now + ChronoDuration::days(1));
    }

    #[test]
    fn time_window_lower_bound_is_inclusive() {
        let from = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let window = TimeWindow {
            from: Some(from),
            until: from + ChronoDuration::hours(1),
        };
        assert!(window.contains(from));
        assert!(!window.contains(from - ChronoDuration::seconds(1)));
    }
}
