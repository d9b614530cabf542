//! Thread-safe user ledger
//!
//! This module provides the `UserLedger` struct, the single source of truth for
//! every user's currency balance, card inventory and ban flag.
//!
//! # Design
//!
//! Accounts live in a `DashMap<UserId, Arc<Mutex<Account>>>`. The map only
//! resolves ids to handles; every read or write of an account goes through
//! that account's own `Mutex`. Handles are cloned out of the map before any
//! account lock is taken, so no map shard lock is ever held while waiting on an
//! account.
//!
//! Operations touching several accounts run inside [`UserLedger::atomically`],
//! which locks every named account in ascending user-id order and hands the
//! closure a [`LedgerTxn`]. If the closure fails, each locked account is
//! restored to the snapshot taken when the locks were acquired, so no partial
//! effect is ever observable.
//!
//! # Card Index
//!
//! A second map records the owner of every card id. It backs the uniqueness
//! check when cards are minted. Moves are written to it when a transaction
//! commits; minted ids are claimed immediately and released on rollback. Both
//! happen while the account locks are still held.

use crate::types::{Account, CardId, CardSet, Currency, TransferError, UserId};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::debug;

type AccountHandle = Arc<Mutex<Account>>;

fn lock(handle: &AccountHandle) -> MutexGuard<'_, Account> {
    // An account is only mutated through LedgerTxn, which restores the
    // snapshot on failure, so a poisoned lock still guards a consistent value.
    handle.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Authoritative store of all user accounts
///
/// `UserLedger` is `Send + Sync` and is shared behind an `Arc` by the transfer
/// engine, the trade registry and the exchange facade.
#[derive(Debug, Default)]
pub struct UserLedger {
    /// Account handles by user ID
    accounts: DashMap<UserId, AccountHandle>,

    /// Current owner of every card id
    card_owners: DashMap<CardId, UserId>,
}

impl UserLedger {
    /// Create an empty ledger
    pub fn new() -> Self {
        Self {
            accounts: DashMap::new(),
            card_owners: DashMap::new(),
        }
    }

    /// Get or create the account for a user and refresh its display tag
    ///
    /// This is the identity resolver's entry point: the first time a user is
    /// seen an empty account is created for them.
    ///
    /// # Returns
    ///
    /// A snapshot of the account after the tag update.
    pub fn open_account(&self, user: UserId, tag: &str) -> Account {
        let handle = self.handle_or_create(user, tag);
        let mut account = lock(&handle);
        if account.tag != tag {
            account.tag = tag.to_string();
        }
        account.clone()
    }

    /// Get or create the account for a user, keeping an existing tag
    ///
    /// `tag` is only used when the account has to be created.
    pub fn ensure_account(&self, user: UserId, tag: &str) -> Account {
        let handle = self.handle_or_create(user, tag);
        let account = lock(&handle);
        account.clone()
    }

    /// Whether the ledger knows this user
    pub fn contains(&self, user: UserId) -> bool {
        self.accounts.contains_key(&user)
    }

    /// Number of accounts
    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    /// Whether the ledger has no accounts
    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    /// Read-only snapshot of an account
    ///
    /// The snapshot is not kept in sync with later changes.
    pub fn get_account(&self, user: UserId) -> Option<Account> {
        self.handle(user).ok().map(|handle| lock(&handle).clone())
    }

    /// Apply a signed delta to a user's balance
    ///
    /// # Returns
    ///
    /// The new balance.
    ///
    /// # Errors
    ///
    /// - `AccountNotFound` if the user is unknown
    /// - `InsufficientFunds` if the balance would become negative
    /// - `ArithmeticOverflow` if the balance would exceed `u64::MAX`
    pub fn adjust_currency(&self, user: UserId, delta: i64) -> Result<Currency, TransferError> {
        self.atomically(&[user], |txn| txn.adjust_currency(user, delta))
    }

    /// Whether the user currently owns every id in `cards`
    ///
    /// Unknown users own nothing. This is a precondition check only; ownership
    /// may change as soon as it returns.
    pub fn has_cards(&self, user: UserId, cards: &CardSet) -> bool {
        self.handle(user)
            .map(|handle| lock(&handle).owns_all(cards))
            .unwrap_or(false)
    }

    /// Move a set of cards from one account to another as one atomic step
    ///
    /// # Errors
    ///
    /// - `AccountNotFound` if either user is unknown
    /// - `CardNotOwned` if any id is not owned by `from`; nothing moves
    pub fn move_cards(
        &self,
        from: UserId,
        to: UserId,
        cards: &CardSet,
    ) -> Result<(), TransferError> {
        self.atomically(&[from, to], |txn| txn.move_cards(from, to, cards))
    }

    /// Whether the user is banned
    ///
    /// Unknown users are not banned. Enforcing the ban is the caller's job.
    pub fn is_banned(&self, user: UserId) -> bool {
        self.handle(user)
            .map(|handle| lock(&handle).banned)
            .unwrap_or(false)
    }

    /// Set or clear the ban flag
    pub fn set_banned(&self, user: UserId, banned: bool) -> Result<(), TransferError> {
        let handle = self.handle(user)?;
        lock(&handle).banned = banned;
        debug!(user, banned, "ban flag updated");
        Ok(())
    }

    /// Mint new card instances into a user's inventory
    ///
    /// All-or-nothing: if any id already exists anywhere in the ledger, no card
    /// is minted.
    ///
    /// # Errors
    ///
    /// - `AccountNotFound` if the user is unknown
    /// - `DuplicateCard` naming the first id that already has an owner
    pub fn issue_cards(&self, user: UserId, cards: &CardSet) -> Result<(), TransferError> {
        self.atomically(&[user], |txn| txn.issue_cards(user, cards))?;
        debug!(user, count = cards.len(), "cards issued");
        Ok(())
    }

    /// Current owner of a card id
    pub fn card_owner(&self, card: &str) -> Option<UserId> {
        self.card_owners.get(card).map(|entry| *entry.value())
    }

    /// Run `f` with exclusive access to every account in `users`
    ///
    /// Locks are acquired in ascending user-id order (duplicates removed), so
    /// two transactions over overlapping account sets cannot deadlock. If `f`
    /// returns an error, every locked account is restored to its state at the
    /// start of the call and the card index is as it was before the call.
    ///
    /// # Errors
    ///
    /// - `AccountNotFound` if any user is unknown (before anything is locked)
    /// - Whatever `f` returns
    pub fn atomically<T, F>(&self, users: &[UserId], f: F) -> Result<T, TransferError>
    where
        F: FnOnce(&mut LedgerTxn<'_>) -> Result<T, TransferError>,
    {
        let mut ids = users.to_vec();
        ids.sort_unstable();
        ids.dedup();

        let handles = ids
            .into_iter()
            .map(|user| self.handle(user).map(|handle| (user, handle)))
            .collect::<Result<Vec<_>, _>>()?;

        let mut txn = LedgerTxn::begin(
            handles
                .iter()
                .map(|(user, handle)| (*user, lock(handle)))
                .collect(),
            &self.card_owners,
        );

        match f(&mut txn) {
            Ok(value) => {
                txn.commit();
                Ok(value)
            }
            Err(err) => {
                txn.rollback();
                Err(err)
            }
        }
    }

    /// Snapshots of all accounts sorted by user ID
    pub fn all_accounts(&self) -> Vec<Account> {
        let mut accounts: Vec<Account> = self
            .handles()
            .iter()
            .map(|handle| lock(handle).clone())
            .collect();
        accounts.sort_by_key(|account| account.user);
        accounts
    }

    /// Sum of every balance
    pub fn total_currency(&self) -> u128 {
        self.handles()
            .iter()
            .map(|handle| u128::from(lock(handle).balance))
            .sum()
    }

    /// Every card id held by any account, sorted
    ///
    /// Duplicates would appear twice, which makes this suitable for
    /// conservation checks.
    pub fn card_population(&self) -> Vec<CardId> {
        let mut cards: Vec<CardId> = self
            .handles()
            .iter()
            .flat_map(|handle| lock(handle).cards.iter().cloned().collect::<Vec<_>>())
            .collect();
        cards.sort();
        cards
    }

    fn handle(&self, user: UserId) -> Result<AccountHandle, TransferError> {
        self.accounts
            .get(&user)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| TransferError::account_not_found(user))
    }

    fn handle_or_create(&self, user: UserId, tag: &str) -> AccountHandle {
        Arc::clone(
            self.accounts
                .entry(user)
                .or_insert_with(|| {
                    debug!(user, tag, "opening account");
                    Arc::new(Mutex::new(Account::new(user, tag)))
                })
                .value(),
        )
    }

    fn handles(&self) -> Vec<AccountHandle> {
        self.accounts
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect()
    }
}

/// Exclusive view over a fixed set of locked accounts
///
/// Created by [`UserLedger::atomically`]. Only the ledger's own operations are
/// exposed; callers never receive a mutable account handle. Every operation
/// fails with `AccountNotFound` for a user outside the locked set.
///
/// Minted ids are claimed in the card index as soon as they are issued, so a
/// concurrent mint of the same id fails; a rollback releases them again.
pub struct LedgerTxn<'g> {
    accounts: Vec<(UserId, MutexGuard<'g, Account>)>,
    snapshot: Vec<Account>,
    card_owners: &'g DashMap<CardId, UserId>,
    relocated: Vec<(CardId, UserId)>,
    claimed: Vec<CardId>,
}

impl<'g> LedgerTxn<'g> {
    fn begin(
        accounts: Vec<(UserId, MutexGuard<'g, Account>)>,
        card_owners: &'g DashMap<CardId, UserId>,
    ) -> Self {
        let snapshot = accounts
            .iter()
            .map(|(_, guard)| Account::clone(guard))
            .collect();
        Self {
            accounts,
            snapshot,
            card_owners,
            relocated: Vec::new(),
            claimed: Vec::new(),
        }
    }

    fn account(&self, user: UserId) -> Result<&Account, TransferError> {
        self.accounts
            .iter()
            .find(|(id, _)| *id == user)
            .map(|(_, guard)| &**guard)
            .ok_or_else(|| TransferError::account_not_found(user))
    }

    fn account_mut(&mut self, user: UserId) -> Result<&mut Account, TransferError> {
        self.accounts
            .iter_mut()
            .find(|(id, _)| *id == user)
            .map(|(_, guard)| &mut **guard)
            .ok_or_else(|| TransferError::account_not_found(user))
    }

    /// Remove `amount` from a balance
    pub fn debit(&mut self, user: UserId, amount: Currency) -> Result<Currency, TransferError> {
        let account = self.account_mut(user)?;
        if account.balance < amount {
            return Err(TransferError::insufficient_funds(
                user,
                account.balance,
                amount,
            ));
        }
        account.balance -= amount;
        Ok(account.balance)
    }

    /// Add `amount` to a balance
    pub fn credit(&mut self, user: UserId, amount: Currency) -> Result<Currency, TransferError> {
        let account = self.account_mut(user)?;
        account.balance = account
            .balance
            .checked_add(amount)
            .ok_or_else(|| TransferError::arithmetic_overflow("credit", user))?;
        Ok(account.balance)
    }

    /// Apply a signed delta to a balance
    pub fn adjust_currency(&mut self, user: UserId, delta: i64) -> Result<Currency, TransferError> {
        if delta >= 0 {
            self.credit(user, delta.unsigned_abs())
        } else {
            self.debit(user, delta.unsigned_abs())
        }
    }

    /// Ids from `cards` that `user` does not own, sorted
    pub fn missing_cards(
        &self,
        user: UserId,
        cards: &CardSet,
    ) -> Result<Vec<CardId>, TransferError> {
        Ok(self.account(user)?.missing_cards(cards))
    }

    /// Move every id in `cards` from `from` to `to`
    ///
    /// Ownership of the whole set is checked before anything moves.
    pub fn move_cards(
        &mut self,
        from: UserId,
        to: UserId,
        cards: &CardSet,
    ) -> Result<(), TransferError> {
        let missing = self.missing_cards(from, cards)?;
        if !missing.is_empty() {
            return Err(TransferError::card_not_owned(from, missing));
        }
        self.account(to)?;
        if from == to {
            return Ok(());
        }

        let source = self.account_mut(from)?;
        for card in cards {
            source.cards.remove(card);
        }
        let destination = self.account_mut(to)?;
        destination.cards.extend(cards.iter().cloned());

        self.relocated
            .extend(cards.iter().map(|card| (card.clone(), to)));
        Ok(())
    }

    /// Mint new card ids into `user`'s inventory
    ///
    /// # Errors
    ///
    /// `DuplicateCard` naming the first id that already has an owner. Ids
    /// claimed before the conflict are released when the transaction rolls
    /// back.
    pub fn issue_cards(&mut self, user: UserId, cards: &CardSet) -> Result<(), TransferError> {
        self.account(user)?;
        let card_owners = self.card_owners;
        for card in cards {
            match card_owners.entry(card.clone()) {
                Entry::Occupied(entry) => {
                    return Err(TransferError::duplicate_card(card, *entry.get()));
                }
                Entry::Vacant(entry) => {
                    entry.insert(user);
                    self.claimed.push(card.clone());
                }
            }
        }
        self.account_mut(user)?.cards.extend(cards.iter().cloned());
        Ok(())
    }

    fn commit(self) {
        // Index is updated before the guards drop, while the accounts are
        // still locked.
        for (card, owner) in self.relocated {
            self.card_owners.insert(card, owner);
        }
    }

    fn rollback(self) {
        for card in &self.claimed {
            self.card_owners.remove(card);
        }
        for ((_, mut guard), before) in self.accounts.into_iter().zip(self.snapshot) {
            *guard = before;
        }
    }
}
