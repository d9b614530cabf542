//! Secured trade types
//!
//! Session identifiers, the session lifecycle states, and the outcome returned
//! to the caller when a session resolves.

use super::error::TransferError;
use super::transfer::UserId;
use std::fmt;

/// Secured trade session identifier
///
/// Assigned monotonically by the session registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Secured trade lifecycle
///
/// Terminal states: EXECUTED (success), REJECTED and EXPIRED (failure).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TradeState {
    /// Offer recorded, not yet shown to the counterparty
    Proposed,

    /// Both offered sets are visible; waiting for the counterparty
    AwaitingConfirmation,

    /// Counterparty confirmed; re-validation and execution in progress
    Confirmed,

    /// Terminal: both legs applied
    Executed,

    /// Terminal: declined or failed validation, nothing moved
    Rejected,

    /// Terminal: not confirmed within the timeout
    Expired,
}

impl TradeState {
    /// Check if this is a terminal state (no more transitions possible)
    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TradeState::Executed | TradeState::Rejected | TradeState::Expired
        )
    }

    /// Whether the session can still be confirmed, declined or expired
    #[inline]
    pub fn is_open(&self) -> bool {
        matches!(
            self,
            TradeState::Proposed | TradeState::AwaitingConfirmation
        )
    }

    /// Get human-readable state name
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeState::Proposed => "PROPOSED",
            TradeState::AwaitingConfirmation => "AWAITING_CONFIRMATION",
            TradeState::Confirmed => "CONFIRMED",
            TradeState::Executed => "EXECUTED",
            TradeState::Rejected => "REJECTED",
            TradeState::Expired => "EXPIRED",
        }
    }
}

impl fmt::Display for TradeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How a secured trade session resolved
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TradeOutcome {
    /// Both legs were applied
    Executed { session: SessionId },

    /// Validation failed at confirmation time; nothing moved
    Rejected {
        session: SessionId,
        reason: TransferError,
    },

    /// A participant called the trade off
    Declined { session: SessionId, by: UserId },
}

impl TradeOutcome {
    /// The session this outcome belongs to
    pub fn session(&self) -> SessionId {
        match self {
            TradeOutcome::Executed { session }
            | TradeOutcome::Rejected { session, .. }
            | TradeOutcome::Declined { session, .. } => *session,
        }
    }

    /// Terminal state the session reached
    pub fn state(&self) -> TradeState {
        match self {
            TradeOutcome::Executed { .. } => TradeState::Executed,
            TradeOutcome::Rejected { .. } | TradeOutcome::Declined { .. } => TradeState::Rejected,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(TradeState::Executed.is_terminal());
        assert!(TradeState::Rejected.is_terminal());
        assert!(TradeState::Expired.is_terminal());

        assert!(!TradeState::Proposed.is_terminal());
        assert!(!TradeState::AwaitingConfirmation.is_terminal());
        assert!(!TradeState::Confirmed.is_terminal());
    }

    #[test]
    fn test_open_states() {
        assert!(TradeState::Proposed.is_open());
        assert!(TradeState::AwaitingConfirmation.is_open());
        assert!(!TradeState::Confirmed.is_open());
        assert!(!TradeState::Executed.is_open());
    }

    #[test]
    fn test_display() {
        assert_eq!(TradeState::AwaitingConfirmation.to_string(), "AWAITING_CONFIRMATION");
        assert_eq!(TradeState::Executed.to_string(), "EXECUTED");
        assert_eq!(SessionId(12).to_string(), "#12");
    }

    #[test]
    fn test_outcome_state() {
        let rejected = TradeOutcome::Rejected {
            session: SessionId(3),
            reason: TransferError::account_not_found(9),
        };
        assert_eq!(rejected.state(), TradeState::Rejected);
        assert_eq!(rejected.session(), SessionId(3));
        assert_eq!(
            TradeOutcome::Executed { session: SessionId(4) }.state(),
            TradeState::Executed
        );
    }
}
