//! Transfer-related types for the card trade engine
//!
//! This module defines the identifiers shared across the crate and the
//! `TransferRequest` value describing one intended movement of value.

use std::collections::BTreeSet;

/// User identifier
///
/// Opaque id handed to the core by the identity resolver.
pub type UserId = u64;

/// Card instance identifier
///
/// Every card instance is non-fungible and globally unique.
pub type CardId = String;

/// Currency amount
pub type Currency = u64;

/// An ordered, duplicate-free set of card ids
pub type CardSet = BTreeSet<CardId>;

/// Build a card set from whitespace-separated ids
///
/// Repeated ids collapse into one entry.
pub fn parse_card_set(raw: &str) -> CardSet {
    raw.split_whitespace().map(str::to_string).collect()
}

/// What a transfer moves
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferKind {
    /// Move an amount of currency
    Currency(Currency),

    /// Move a set of card instances
    Cards(CardSet),
}

/// A single intended movement between two accounts
///
/// Transient: built by the caller, consumed by the transfer engine and never
/// persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferRequest {
    /// Account the value leaves
    pub from: UserId,

    /// Account the value arrives at
    pub to: UserId,

    /// Currency amount or card set being moved
    pub kind: TransferKind,
}

impl TransferRequest {
    /// Request a currency transfer
    pub fn currency(from: UserId, to: UserId, amount: Currency) -> Self {
        TransferRequest {
            from,
            to,
            kind: TransferKind::Currency(amount),
        }
    }

    /// Request a card transfer
    pub fn cards(from: UserId, to: UserId, cards: CardSet) -> Self {
        TransferRequest {
            from,
            to,
            kind: TransferKind::Cards(cards),
        }
    }
}
