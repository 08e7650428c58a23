//! Finalization state machine.
//!
//! ```text
//! Initiated → InputsSelected → TransactionBuilt → Signed → Notarized → Committed
//!     └────────────┴──────────────┴──────────┴─────────┴──→ Failed(kind)
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info};

use super::error::RedemptionErrorKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlowState {
    Initiated,
    InputsSelected,
    TransactionBuilt,
    Signed,
    Notarized,
    Committed,
    Failed(RedemptionErrorKind),
}

impl FlowState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Committed | Self::Failed(_))
    }

    /// The single forward step from this state, if any.
    fn successor(&self) -> Option<FlowState> {
        match self {
            Self::Initiated => Some(Self::InputsSelected),
            Self::InputsSelected => Some(Self::TransactionBuilt),
            Self::TransactionBuilt => Some(Self::Signed),
            Self::Signed => Some(Self::Notarized),
            Self::Notarized => Some(Self::Committed),
            Self::Committed | Self::Failed(_) => None,
        }
    }

    pub fn can_transition_to(&self, next: &FlowState) -> bool {
        match next {
            Self::Failed(_) => !self.is_terminal(),
            _ => self.successor().as_ref() == Some(next),
        }
    }
}

impl fmt::Display for FlowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Failed(kind) => write!(f, "Failed({kind})"),
            other => fmt::Debug::fmt(other, f),
        }
    }
}

/// Records the current [`FlowState`] of one attempt and logs transitions.
#[derive(Debug)]
pub struct FlowTracker {
    state: FlowState,
    history: Vec<FlowState>,
}

impl Default for FlowTracker {
    fn default() -> Self {
        Self {
            state: FlowState::Initiated,
            history: vec![FlowState::Initiated],
        }
    }
}

impl FlowTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> FlowState {
        self.state
    }

    /// Every state visited, in order.
    pub fn history(&self) -> &[FlowState] {
        &self.history
    }

    /// Move to `next`. Illegal transitions are ignored and logged; the
    /// tracker never leaves a terminal state.
    pub fn advance(&mut self, next: FlowState) -> bool {
        if !self.state.can_transition_to(&next) {
            debug!(from = %self.state, to = %next, "ignored illegal flow transition");
            return false;
        }
        info!(from = %self.state, to = %next, "flow state");
        self.state = next;
        self.history.push(next);
        true
    }

    pub fn fail(&mut self, kind: RedemptionErrorKind) {
        self.advance(FlowState::Failed(kind));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path_is_linear() {
        let mut t = FlowTracker::new();
        for next in [
            FlowState::InputsSelected,
            FlowState::TransactionBuilt,
            FlowState::Signed,
            FlowState::Notarized,
            FlowState::Committed,
        ] {
            assert!(t.advance(next));
        }
        assert!(t.state().is_terminal());
        assert_eq!(t.history().len(), 6);
    }

    #[test]
    fn cannot_skip_notarization() {
        let mut t = FlowTracker::new();
        t.advance(FlowState::InputsSelected);
        t.advance(FlowState::TransactionBuilt);
        t.advance(FlowState::Signed);
        assert!(!t.advance(FlowState::Committed));
        assert_eq!(t.state(), FlowState::Signed);
    }

    #[test]
    fn failure_is_terminal() {
        let mut t = FlowTracker::new();
        t.fail(RedemptionErrorKind::StampNotFound);
        assert_eq!(t.state(), FlowState::Failed(RedemptionErrorKind::StampNotFound));
        assert!(!t.advance(FlowState::InputsSelected));
        t.fail(RedemptionErrorKind::Vault);
        assert_eq!(t.state(), FlowState::Failed(RedemptionErrorKind::StampNotFound));
    }
}
