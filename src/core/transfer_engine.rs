//! All-or-nothing peer-to-peer transfers
//!
//! This module provides the `TransferEngine`, which composes ledger primitives
//! into unconditional currency and card transfers. Each transfer runs inside a
//! single [`UserLedger::atomically`] call, so the source and destination are
//! locked together (in user-id order) for the whole read-check-write sequence.

use std::sync::Arc;

use tracing::{debug, info};

use super::UserLedger;
use crate::types::{CardSet, Currency, TransferError, TransferKind, TransferRequest, UserId};

/// Transfer orchestrator over a shared ledger
///
/// Cheap to clone; every clone works against the same `UserLedger`.
#[derive(Debug, Clone)]
pub struct TransferEngine {
    ledger: Arc<UserLedger>,
}

impl TransferEngine {
    /// Create a transfer engine over `ledger`
    pub fn new(ledger: Arc<UserLedger>) -> Self {
        Self { ledger }
    }

    /// The ledger this engine mutates
    pub fn ledger(&self) -> &Arc<UserLedger> {
        &self.ledger
    }

    /// Move currency from one account to another
    ///
    /// # Errors
    ///
    /// - `InvalidAmount` if `amount` is zero
    /// - `SameAccount` if `from == to`
    /// - `AccountNotFound` if either user is unknown
    /// - `InsufficientFunds` if `from` cannot cover the amount
    /// - `ArithmeticOverflow` if the credit would overflow `to`
    ///
    /// On any error neither balance changes.
    pub fn transfer_currency(
        &self,
        from: UserId,
        to: UserId,
        amount: Currency,
    ) -> Result<(), TransferError> {
        if amount == 0 {
            return Err(TransferError::invalid_amount(amount));
        }
        if from == to {
            return Err(TransferError::same_account(from));
        }

        self.ledger.atomically(&[from, to], |txn| {
            txn.debit(from, amount)?;
            txn.credit(to, amount)?;
            Ok(())
        })?;

        info!(from, to, amount, "currency transferred");
        Ok(())
    }

    /// Move a set of cards from one account to another
    ///
    /// Ownership of the entire set is verified before any card moves.
    ///
    /// # Errors
    ///
    /// - `EmptyCardSet` if `cards` is empty
    /// - `SameAccount` if `from == to`
    /// - `AccountNotFound` if either user is unknown
    /// - `CardNotOwned` if `from` is missing any of the cards; inventories are
    ///   left unchanged
    pub fn transfer_cards(
        &self,
        from: UserId,
        to: UserId,
        cards: &CardSet,
    ) -> Result<(), TransferError> {
        if cards.is_empty() {
            return Err(TransferError::EmptyCardSet);
        }
        if from == to {
            return Err(TransferError::same_account(from));
        }

        self.ledger
            .atomically(&[from, to], |txn| txn.move_cards(from, to, cards))?;

        info!(from, to, count = cards.len(), "cards transferred");
        Ok(())
    }

    /// Swap card sets between two accounts as one atomic unit
    ///
    /// Both accounts are locked once, both sides' ownership is checked, and
    /// both legs are applied before the locks are released. Either leg may be
    /// empty, but not both.
    ///
    /// # Errors
    ///
    /// - `EmptyCardSet` if both sets are empty
    /// - `SameAccount` if `first == second`
    /// - `AccountNotFound` if either user is unknown
    /// - `CardNotOwned` naming whichever side is missing cards; nothing moves
    pub fn exchange_cards(
        &self,
        first: UserId,
        first_cards: &CardSet,
        second: UserId,
        second_cards: &CardSet,
    ) -> Result<(), TransferError> {
        if first_cards.is_empty() && second_cards.is_empty() {
            return Err(TransferError::EmptyCardSet);
        }
        if first == second {
            return Err(TransferError::same_account(first));
        }

        self.ledger.atomically(&[first, second], |txn| {
            // Both sides are checked against the pre-swap inventories so a card
            // received in the first leg can never satisfy the second.
            for (owner, cards) in [(first, first_cards), (second, second_cards)] {
                let missing = txn.missing_cards(owner, cards)?;
                if !missing.is_empty() {
                    return Err(TransferError::card_not_owned(owner, missing));
                }
            }
            txn.move_cards(first, second, first_cards)?;
            txn.move_cards(second, first, second_cards)
        })?;

        debug!(
            first,
            second,
            given = first_cards.len(),
            received = second_cards.len(),
            "cards exchanged"
        );
        Ok(())
    }

    /// Execute a transfer request of either kind
    pub fn execute(&self, request: &TransferRequest) -> Result<(), TransferError> {
        match &request.kind {
            TransferKind::Currency(amount) => {
                self.transfer_currency(request.from, request.to, *amount)
            }
            TransferKind::Cards(cards) => self.transfer_cards(request.from, request.to, cards),
        }
    }
}
