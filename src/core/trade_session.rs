//! Secured trade state machine
//!
//! A `SecuredTradeSession` lets two users each lock in a card offer and
//! requires the counterparty's explicit confirmation before anything moves.
//!
//! # Lifecycle
//!
//! ```text
//! Proposed ──publish──> AwaitingConfirmation ──confirm──> Confirmed ──> Executed
//!     │                      │                                │
//!     └──────────────────────┴──decline / expire──> Rejected   └──validation failure──> Rejected
//!                                                   Expired
//! ```
//!
//! The session itself holds only user ids and card ids. Execution goes through
//! [`TransferEngine::exchange_cards`], which applies both legs under one ledger
//! transaction.

use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use super::{TransferEngine, UserLedger};
use crate::types::{CardSet, SessionId, TradeError, TradeOutcome, TradeState, TransferError, UserId};

/// One bilateral offer/confirm/execute handshake
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecuredTradeSession {
    id: SessionId,
    initiator: UserId,
    counterparty: UserId,
    initiator_cards: CardSet,
    counterparty_cards: CardSet,
    initiator_confirmed: bool,
    counterparty_confirmed: bool,
    created_at: Instant,
    state: TradeState,
}

impl SecuredTradeSession {
    /// Validate a proposal and build the session in the `Proposed` state
    ///
    /// The initiator must currently own everything they offer. The
    /// counterparty's requested cards are only checked for a warning here;
    /// ownership is enforced when the trade is confirmed.
    ///
    /// # Errors
    ///
    /// - `SameAccount` if both participants are the same user
    /// - `EmptyTrade` if neither side offers a card
    /// - `AccountNotFound` if either participant is unknown
    /// - `OfferNotOwned` if the initiator is missing any offered card
    pub fn propose(
        id: SessionId,
        initiator: UserId,
        counterparty: UserId,
        initiator_cards: CardSet,
        counterparty_cards: CardSet,
        ledger: &UserLedger,
        now: Instant,
    ) -> Result<Self, TradeError> {
        if initiator == counterparty {
            return Err(TransferError::same_account(initiator).into());
        }
        if initiator_cards.is_empty() && counterparty_cards.is_empty() {
            return Err(TradeError::empty_trade(initiator, counterparty));
        }

        let initiator_account = ledger
            .get_account(initiator)
            .ok_or_else(|| TransferError::account_not_found(initiator))?;
        let counterparty_account = ledger
            .get_account(counterparty)
            .ok_or_else(|| TransferError::account_not_found(counterparty))?;

        let missing = initiator_account.missing_cards(&initiator_cards);
        if !missing.is_empty() {
            return Err(TradeError::offer_not_owned(initiator, missing));
        }

        let not_yet_owned = counterparty_account.missing_cards(&counterparty_cards);
        if !not_yet_owned.is_empty() {
            warn!(
                session = %id,
                counterparty,
                missing = ?not_yet_owned,
                "counterparty does not own the requested cards"
            );
        }

        Ok(Self {
            id,
            initiator,
            counterparty,
            initiator_cards,
            counterparty_cards,
            initiator_confirmed: true,
            counterparty_confirmed: false,
            created_at: now,
            state: TradeState::Proposed,
        })
    }

    /// Make the offer visible to the counterparty
    pub fn publish(&mut self) {
        if self.state == TradeState::Proposed {
            self.state = TradeState::AwaitingConfirmation;
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn initiator(&self) -> UserId {
        self.initiator
    }

    pub fn counterparty(&self) -> UserId {
        self.counterparty
    }

    /// Cards the initiator gives up
    pub fn initiator_cards(&self) -> &CardSet {
        &self.initiator_cards
    }

    /// Cards the counterparty gives up
    pub fn counterparty_cards(&self) -> &CardSet {
        &self.counterparty_cards
    }

    pub fn state(&self) -> TradeState {
        self.state
    }

    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    /// Whether `user` is one of the two participants
    pub fn is_participant(&self, user: UserId) -> bool {
        user == self.initiator || user == self.counterparty
    }

    /// Whether `user` has confirmed their side
    pub fn is_confirmed_by(&self, user: UserId) -> bool {
        (user == self.initiator && self.initiator_confirmed)
            || (user == self.counterparty && self.counterparty_confirmed)
    }

    /// Whether the session is still open and older than `ttl`
    pub fn is_overdue(&self, now: Instant, ttl: Duration) -> bool {
        self.state.is_open() && now.saturating_duration_since(self.created_at) >= ttl
    }

    /// Move an open session to `Expired`
    ///
    /// # Returns
    ///
    /// `true` if the session was open and is now expired.
    pub fn expire(&mut self) -> bool {
        if self.state.is_open() {
            self.state = TradeState::Expired;
            debug!(session = %self.id, "trade expired");
            true
        } else {
            false
        }
    }

    /// Counterparty confirmation: re-validate, then execute both legs
    ///
    /// A confirmation from anyone but the counterparty is refused and leaves
    /// the session exactly as it was. A valid confirmation always resolves the
    /// session: `Executed` if both legs were applied, `Rejected` (with the
    /// reason) if anything failed, in which case no card moved.
    ///
    /// # Errors
    ///
    /// - `WrongConfirmer` if `confirmer` is not the side still owing a
    ///   confirmation
    /// - `SessionExpired` if the session has expired
    /// - `SessionNotFound` if the session is not awaiting confirmation
    pub fn confirm(
        &mut self,
        confirmer: UserId,
        engine: &TransferEngine,
    ) -> Result<TradeOutcome, TradeError> {
        self.ensure_awaiting()?;

        // The initiator confirmed by proposing; only the other side is owed.
        if !self.is_participant(confirmer) || self.is_confirmed_by(confirmer) {
            warn!(
                session = %self.id,
                expected = self.counterparty,
                actual = confirmer,
                "confirmation from wrong user refused"
            );
            return Err(TradeError::wrong_confirmer(
                self.id,
                self.counterparty,
                confirmer,
            ));
        }

        self.counterparty_confirmed = true;
        self.state = TradeState::Confirmed;

        // Ownership may have changed since the proposal.
        let missing = engine
            .ledger()
            .get_account(self.counterparty)
            .map(|account| account.missing_cards(&self.counterparty_cards))
            .unwrap_or_else(|| self.counterparty_cards.iter().cloned().collect());
        if !missing.is_empty() {
            return Ok(self.reject(TransferError::card_not_owned(self.counterparty, missing)));
        }

        match engine.exchange_cards(
            self.initiator,
            &self.initiator_cards,
            self.counterparty,
            &self.counterparty_cards,
        ) {
            Ok(()) => {
                self.state = TradeState::Executed;
                info!(
                    session = %self.id,
                    initiator = self.initiator,
                    counterparty = self.counterparty,
                    given = ?self.initiator_cards,
                    received = ?self.counterparty_cards,
                    "secured trade executed"
                );
                Ok(TradeOutcome::Executed { session: self.id })
            }
            Err(reason) => Ok(self.reject(reason)),
        }
    }

    /// Either participant calls the trade off
    ///
    /// # Errors
    ///
    /// - `NotParticipant` if `user` is not part of the trade
    /// - `SessionExpired` / `SessionNotFound` as for [`confirm`](Self::confirm)
    pub fn decline(&mut self, user: UserId) -> Result<TradeOutcome, TradeError> {
        self.ensure_awaiting()?;

        if !self.is_participant(user) {
            return Err(TradeError::not_participant(self.id, user));
        }

        self.state = TradeState::Rejected;
        debug!(session = %self.id, by = user, "trade declined");
        Ok(TradeOutcome::Declined {
            session: self.id,
            by: user,
        })
    }

    fn ensure_awaiting(&self) -> Result<(), TradeError> {
        match self.state {
            TradeState::AwaitingConfirmation => Ok(()),
            TradeState::Expired => Err(TradeError::session_expired(self.id)),
            _ => Err(TradeError::session_not_found(self.id)),
        }
    }

    fn reject(&mut self, reason: TransferError) -> TradeOutcome {
        self.state = TradeState::Rejected;
        debug!(session = %self.id, %reason, "trade rejected");
        TradeOutcome::Rejected {
            session: self.id,
            reason,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::parse_card_set;
    use std::sync::Arc;

    fn engine_with(accounts: &[(UserId, &str)]) -> TransferEngine {
        let ledger = Arc::new(UserLedger::new());
        for (user, cards) in accounts {
            ledger.open_account(*user, "trainer");
            ledger.issue_cards(*user, &parse_card_set(cards)).unwrap();
        }
        TransferEngine::new(ledger)
    }

    fn open_session(
        engine: &TransferEngine,
        initiator: UserId,
        counterparty: UserId,
        offered: &str,
        requested: &str,
    ) -> Result<SecuredTradeSession, TradeError> {
        let mut session = SecuredTradeSession::propose(
            SessionId(1),
            initiator,
            counterparty,
            parse_card_set(offered),
            parse_card_set(requested),
            engine.ledger(),
            Instant::now(),
        )?;
        session.publish();
        Ok(session)
    }

    #[test]
    fn test_propose_builds_proposed_session() {
        let engine = engine_with(&[(1, "a b"), (2, "c")]);
        let session = SecuredTradeSession::propose(
            SessionId(5),
            1,
            2,
            parse_card_set("a b"),
            parse_card_set("c"),
            engine.ledger(),
            Instant::now(),
        )
        .unwrap();

        assert_eq!(session.state(), TradeState::Proposed);
        assert_eq!(session.id(), SessionId(5));
        assert!(session.is_confirmed_by(1));
        assert!(!session.is_confirmed_by(2));
        assert!(session.is_participant(2));
        assert!(!session.is_participant(3));
    }

    #[test]
    fn test_propose_rejects_unowned_offer() {
        let engine = engine_with(&[(1, "a"), (2, "c")]);

        let result = open_session(&engine, 1, 2, "a b", "c");

        assert_eq!(
            result,
            Err(TradeError::offer_not_owned(1, vec!["b".to_string()]))
        );
    }

    #[test]
    fn test_propose_validation_errors() {
        let engine = engine_with(&[(1, "a"), (2, "c")]);

        assert_eq!(
            open_session(&engine, 1, 1, "a", ""),
            Err(TradeError::Transfer(TransferError::same_account(1)))
        );
        assert_eq!(
            open_session(&engine, 1, 2, "", ""),
            Err(TradeError::empty_trade(1, 2))
        );
        assert_eq!(
            open_session(&engine, 1, 9, "a", ""),
            Err(TradeError::Transfer(TransferError::account_not_found(9)))
        );
    }

    #[test]
    fn test_propose_tolerates_counterparty_missing_cards() {
        let engine = engine_with(&[(1, "a"), (2, "")]);
        let session = open_session(&engine, 1, 2, "a", "z").unwrap();
        assert_eq!(session.state(), TradeState::AwaitingConfirmation);
    }

    #[test]
    fn test_confirm_happy_path_executes_both_legs() {
        let engine = engine_with(&[(1, "a b"), (2, "c")]);
        let mut session = open_session(&engine, 1, 2, "a b", "c").unwrap();

        let outcome = session.confirm(2, &engine).unwrap();

        assert_eq!(outcome, TradeOutcome::Executed { session: SessionId(1) });
        assert_eq!(session.state(), TradeState::Executed);
        assert_eq!(engine.ledger().get_account(1).unwrap().cards, parse_card_set("c"));
        assert_eq!(engine.ledger().get_account(2).unwrap().cards, parse_card_set("a b"));
    }

    #[test]
    fn test_wrong_confirmer_is_refused_and_changes_nothing() {
        let engine = engine_with(&[(1, "a"), (2, "c"), (3, "")]);
        let mut session = open_session(&engine, 1, 2, "a", "c").unwrap();
        let before = session.clone();
        let accounts = engine.ledger().all_accounts();

        for intruder in [1, 3] {
            assert_eq!(
                session.confirm(intruder, &engine),
                Err(TradeError::wrong_confirmer(SessionId(1), 2, intruder))
            );
        }

        assert_eq!(session, before);
        assert_eq!(engine.ledger().all_accounts(), accounts);

        // The real counterparty can still confirm afterwards.
        let outcome = session.confirm(2, &engine).unwrap();
        assert_eq!(outcome.state(), TradeState::Executed);
        assert!(session.is_confirmed_by(1) && session.is_confirmed_by(2));
    }

    #[test]
    fn test_confirm_rejects_stale_counterparty_ownership() {
        let engine = engine_with(&[(1, "a b"), (2, "c"), (3, "")]);
        let mut session = open_session(&engine, 1, 2, "a b", "c").unwrap();
        engine
            .transfer_cards(2, 3, &parse_card_set("c"))
            .unwrap();
        let accounts = engine.ledger().all_accounts();

        let outcome = session.confirm(2, &engine).unwrap();

        assert_eq!(
            outcome,
            TradeOutcome::Rejected {
                session: SessionId(1),
                reason: TransferError::card_not_owned(2, vec!["c".to_string()]),
            }
        );
        assert_eq!(session.state(), TradeState::Rejected);
        assert_eq!(engine.ledger().all_accounts(), accounts);
    }

    #[test]
    fn test_confirm_rejects_when_initiator_gave_cards_away() {
        let engine = engine_with(&[(1, "a b"), (2, "c"), (3, "")]);
        let mut session = open_session(&engine, 1, 2, "a b", "c").unwrap();
        engine
            .transfer_cards(1, 3, &parse_card_set("b"))
            .unwrap();

        let outcome = session.confirm(2, &engine).unwrap();

        assert_eq!(
            outcome,
            TradeOutcome::Rejected {
                session: SessionId(1),
                reason: TransferError::card_not_owned(1, vec!["b".to_string()]),
            }
        );
        assert_eq!(engine.ledger().card_owner("a"), Some(1));
        assert_eq!(engine.ledger().card_owner("c"), Some(2));
    }

    #[test]
    fn test_confirm_after_resolution_is_refused() {
        let engine = engine_with(&[(1, "a"), (2, "c")]);
        let mut session = open_session(&engine, 1, 2, "a", "c").unwrap();
        session.confirm(2, &engine).unwrap();

        assert_eq!(
            session.confirm(2, &engine),
            Err(TradeError::session_not_found(SessionId(1)))
        );
    }

    #[test]
    fn test_unpublished_session_cannot_be_confirmed() {
        let engine = engine_with(&[(1, "a"), (2, "c")]);
        let mut session = SecuredTradeSession::propose(
            SessionId(1),
            1,
            2,
            parse_card_set("a"),
            parse_card_set("c"),
            engine.ledger(),
            Instant::now(),
        )
        .unwrap();

        assert_eq!(
            session.confirm(2, &engine),
            Err(TradeError::session_not_found(SessionId(1)))
        );
    }

    #[test]
    fn test_decline_by_either_participant() {
        let engine = engine_with(&[(1, "a"), (2, "c"), (3, "")]);

        for user in [1, 2] {
            let mut session = open_session(&engine, 1, 2, "a", "c").unwrap();
            let outcome = session.decline(user).unwrap();
            assert_eq!(
                outcome,
                TradeOutcome::Declined {
                    session: SessionId(1),
                    by: user
                }
            );
            assert_eq!(session.state(), TradeState::Rejected);
        }

        let mut session = open_session(&engine, 1, 2, "a", "c").unwrap();
        assert_eq!(
            session.decline(3),
            Err(TradeError::not_participant(SessionId(1), 3))
        );
        assert_eq!(session.state(), TradeState::AwaitingConfirmation);
    }

    #[test]
    fn test_expiry() {
        let engine = engine_with(&[(1, "a"), (2, "c")]);
        let mut session = open_session(&engine, 1, 2, "a", "c").unwrap();
        let ttl = Duration::from_secs(180);
        let created = session.created_at();

        assert!(!session.is_overdue(created + Duration::from_secs(179), ttl));
        assert!(session.is_overdue(created + ttl, ttl));

        assert!(session.expire());
        assert!(!session.expire());
        assert_eq!(session.state(), TradeState::Expired);
        assert!(!session.is_overdue(created + ttl, ttl));
        assert_eq!(
            session.confirm(2, &engine),
            Err(TradeError::session_expired(SessionId(1)))
        );
    }
}
