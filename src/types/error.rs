//! Error types for the card trade engine
//!
//! Every failure in this crate is a recoverable, caller-facing outcome. None of
//! them leaves partial state behind: a failed operation leaves the ledger
//! exactly as it was before the call.
//!
//! # Error Categories
//!
//! - [`TransferError`]: ledger and direct transfer failures
//! - [`TradeError`]: secured trade session failures (wraps `TransferError`)
//! - [`ExchangeError`]: either of the above, returned when replaying commands

use super::trade::SessionId;
use super::transfer::{CardId, Currency, UserId};
use thiserror::Error;

/// Failures of ledger primitives and direct transfers
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransferError {
    /// Transfer amount is zero or not representable
    #[error("Invalid transfer amount {amount}")]
    InvalidAmount {
        /// The rejected amount
        amount: Currency,
    },

    /// Source and destination are the same account
    #[error("User {user} cannot transfer to themselves")]
    SameAccount {
        /// User ID on both sides of the transfer
        user: UserId,
    },

    /// The ledger has no account for this user
    #[error("Account {user} not found")]
    AccountNotFound {
        /// Unknown user ID
        user: UserId,
    },

    /// Debit would take the balance below zero
    #[error("Insufficient funds for user {user}: balance {balance}, requested {requested}")]
    InsufficientFunds {
        /// User ID
        user: UserId,
        /// Balance at the time of the check
        balance: Currency,
        /// Requested debit
        requested: Currency,
    },

    /// At least one card is not held by the expected owner
    #[error("User {user} does not own card(s) {}", cards.join(", "))]
    CardNotOwned {
        /// Expected owner
        user: UserId,
        /// The ids that were not found in the owner's inventory
        cards: Vec<CardId>,
    },

    /// A card transfer named no cards
    #[error("Card transfer requires at least one card")]
    EmptyCardSet,

    /// Minting a card id that already exists
    #[error("Card {card} already exists (owned by user {owner})")]
    DuplicateCard {
        /// The duplicated card id
        card: CardId,
        /// Current owner of that id
        owner: UserId,
    },

    /// Crediting would overflow the balance
    #[error("Arithmetic overflow in {operation} for user {user}")]
    ArithmeticOverflow {
        /// Operation that would overflow
        operation: String,
        /// User ID
        user: UserId,
    },

    /// A banned user tried to initiate a transfer or trade
    #[error("User {user} is banned")]
    AccountBanned {
        /// Banned user ID
        user: UserId,
    },
}

impl TransferError {
    /// Create an InvalidAmount error
    pub fn invalid_amount(amount: Currency) -> Self {
        TransferError::InvalidAmount { amount }
    }

    /// Create a SameAccount error
    pub fn same_account(user: UserId) -> Self {
        TransferError::SameAccount { user }
    }

    /// Create an AccountNotFound error
    pub fn account_not_found(user: UserId) -> Self {
        TransferError::AccountNotFound { user }
    }

    /// Create an InsufficientFunds error
    pub fn insufficient_funds(user: UserId, balance: Currency, requested: Currency) -> Self {
        TransferError::InsufficientFunds {
            user,
            balance,
            requested,
        }
    }

    /// Create a CardNotOwned error
    pub fn card_not_owned(user: UserId, cards: Vec<CardId>) -> Self {
        TransferError::CardNotOwned { user, cards }
    }

    /// Create a DuplicateCard error
    pub fn duplicate_card(card: &str, owner: UserId) -> Self {
        TransferError::DuplicateCard {
            card: card.to_string(),
            owner,
        }
    }

    /// Create an ArithmeticOverflow error
    pub fn arithmetic_overflow(operation: &str, user: UserId) -> Self {
        TransferError::ArithmeticOverflow {
            operation: operation.to_string(),
            user,
        }
    }

    /// Create an AccountBanned error
    pub fn account_banned(user: UserId) -> Self {
        TransferError::AccountBanned { user }
    }
}

/// Failures of the secured trade protocol
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TradeError {
    /// A ledger or transfer failure surfaced during a trade step
    #[error(transparent)]
    Transfer(#[from] TransferError),

    /// The initiator does not own everything they offered
    #[error("User {user} cannot offer card(s) they do not own: {}", cards.join(", "))]
    OfferNotOwned {
        /// Initiator
        user: UserId,
        /// Offered ids missing from the initiator's inventory
        cards: Vec<CardId>,
    },

    /// Someone other than the counterparty tried to confirm
    #[error("Trade {session} can only be confirmed by user {expected}, not user {actual}")]
    WrongConfirmer {
        /// Session being confirmed
        session: SessionId,
        /// The designated counterparty
        expected: UserId,
        /// Who actually tried to confirm
        actual: UserId,
    },

    /// Someone outside the trade tried to call it off
    #[error("User {user} is not a participant of trade {session}")]
    NotParticipant {
        /// Session
        session: SessionId,
        /// Caller
        user: UserId,
    },

    /// The pair already has an unresolved session
    #[error("Trade {existing} between users {initiator} and {counterparty} is still active")]
    SessionAlreadyActive {
        /// Initiator of the new proposal
        initiator: UserId,
        /// Counterparty of the new proposal
        counterparty: UserId,
        /// The session occupying the pair
        existing: SessionId,
    },

    /// No session with this id is registered
    #[error("Trade {session} not found")]
    SessionNotFound {
        /// Unknown session
        session: SessionId,
    },

    /// The session timed out before it was confirmed
    #[error("Trade {session} has expired")]
    SessionExpired {
        /// Expired session
        session: SessionId,
    },

    /// Neither side offered anything
    #[error("Trade between users {initiator} and {counterparty} offers no cards")]
    EmptyTrade {
        /// Initiator
        initiator: UserId,
        /// Counterparty
        counterparty: UserId,
    },

    /// Secured trades are switched off in the configuration
    #[error("{feature} is disabled")]
    FeatureDisabled {
        /// Name of the disabled feature
        feature: String,
    },

    /// No unresolved session exists between two users
    #[error("No active trade between users {first} and {second}")]
    NoActiveSession {
        /// One participant
        first: UserId,
        /// The other participant
        second: UserId,
    },
}

impl TradeError {
    /// Create an OfferNotOwned error
    pub fn offer_not_owned(user: UserId, cards: Vec<CardId>) -> Self {
        TradeError::OfferNotOwned { user, cards }
    }

    /// Create a WrongConfirmer error
    pub fn wrong_confirmer(session: SessionId, expected: UserId, actual: UserId) -> Self {
        TradeError::WrongConfirmer {
            session,
            expected,
            actual,
        }
    }

    /// Create a NotParticipant error
    pub fn not_participant(session: SessionId, user: UserId) -> Self {
        TradeError::NotParticipant { session, user }
    }

    /// Create a SessionAlreadyActive error
    pub fn session_already_active(
        initiator: UserId,
        counterparty: UserId,
        existing: SessionId,
    ) -> Self {
        TradeError::SessionAlreadyActive {
            initiator,
            counterparty,
            existing,
        }
    }

    /// Create a SessionNotFound error
    pub fn session_not_found(session: SessionId) -> Self {
        TradeError::SessionNotFound { session }
    }

    /// Create a SessionExpired error
    pub fn session_expired(session: SessionId) -> Self {
        TradeError::SessionExpired { session }
    }

    /// Create an EmptyTrade error
    pub fn empty_trade(initiator: UserId, counterparty: UserId) -> Self {
        TradeError::EmptyTrade {
            initiator,
            counterparty,
        }
    }

    /// Create a FeatureDisabled error
    pub fn feature_disabled(feature: &str) -> Self {
        TradeError::FeatureDisabled {
            feature: feature.to_string(),
        }
    }

    /// Create a NoActiveSession error
    pub fn no_active_session(first: UserId, second: UserId) -> Self {
        TradeError::NoActiveSession { first, second }
    }
}

/// Any failure produced while applying a ledger command
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExchangeError {
    #[error(transparent)]
    Transfer(#[from] TransferError),

    #[error(transparent)]
    Trade(#[from] TradeError),
}
