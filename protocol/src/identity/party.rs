//! Party identity value types.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::crypto::PublicKey;

/// A distinguished name identifying a network member, e.g.
/// `"O=Bob, L=New York, C=US"`.
///
/// Names are compared after trimming surrounding whitespace; no further
/// X.500 normalization is attempted.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PartyName(String);

impl PartyName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into().trim().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns `true` for an empty name, which no directory will ever resolve.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for PartyName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PartyName {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// What the directory knows about a member: its name and ledger key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartyInfo {
    pub name: PartyName,
    pub ledger_key: PublicKey,
}

impl PartyInfo {
    pub fn new(name: PartyName, ledger_key: PublicKey) -> Self {
        Self { name, ledger_key }
    }
}
