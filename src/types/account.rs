//! Account-related types for the card trade engine
//!
//! This module defines the Account structure held by the ledger for every
//! known user.

use super::transfer::{CardId, Currency, UserId};
use std::collections::BTreeSet;

/// User account state
///
/// Represents everything the ledger tracks for one user: their currency
/// balance, the card instances they own, and whether they are banned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    /// The user ID this account belongs to
    pub user: UserId,

    /// Display tag shown next to the user (e.g. `name#0001`)
    ///
    /// Refreshed every time the identity resolver sees the user.
    pub tag: String,

    /// Currency balance
    ///
    /// Never negative; the ledger rejects any adjustment that would take it
    /// below zero.
    pub balance: Currency,

    /// Card instances owned by this account
    ///
    /// A card id appears in at most one account's inventory at any time.
    pub cards: BTreeSet<CardId>,

    /// Whether the user is banned from initiating transfers and trades
    pub banned: bool,
}

impl Account {
    /// Create a new account with an empty inventory and zero balance
    ///
    /// # Arguments
    ///
    /// * `user` - The user ID for this account
    /// * `tag` - The display tag for this user
    pub fn new(user: UserId, tag: impl Into<String>) -> Self {
        Account {
            user,
            tag: tag.into(),
            balance: 0,
            cards: BTreeSet::new(),
            banned: false,
        }
    }

    /// Whether every id in `cards` is currently held by this account
    pub fn owns_all<'a, I>(&self, cards: I) -> bool
    where
        I: IntoIterator<Item = &'a CardId>,
    {
        cards.into_iter().all(|card| self.cards.contains(card))
    }

    /// Ids from `cards` that this account does not hold, in sorted order
    pub fn missing_cards<'a, I>(&self, cards: I) -> Vec<CardId>
    where
        I: IntoIterator<Item = &'a CardId>,
    {
        let mut missing: Vec<CardId> = cards
            .into_iter()
            .filter(|card| !self.cards.contains(*card))
            .cloned()
            .collect();
        missing.sort();
        missing.dedup();
        missing
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_account_is_empty() {
        let account = Account::new(7, "ash#0001");
        assert_eq!(account.user, 7);
        assert_eq!(account.tag, "ash#0001");
        assert_eq!(account.balance, 0);
        assert!(account.cards.is_empty());
        assert!(!account.banned);
    }

    #[test]
    fn test_missing_cards_reports_sorted_unowned_ids() {
        let mut account = Account::new(1, "misty");
        account.cards.insert("c2".to_string());

        let wanted = ["c3".to_string(), "c2".to_string(), "c1".to_string()];
        assert!(!account.owns_all(&wanted));
        assert_eq!(account.missing_cards(&wanted), vec!["c1", "c3"]);
        assert!(account.owns_all(&["c2".to_string()]));
    }
}
