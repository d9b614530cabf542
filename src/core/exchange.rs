//! Exchange facade
//!
//! `Exchange` is what the command layer talks to. It owns the ledger, the
//! transfer engine and the trade registry, and adds the policies that sit above
//! them: identity resolution, the ban check on initiators and the secured
//! trade switch. It also applies replayed [`LedgerCommand`]s.

use std::sync::Arc;

use tracing::{debug, info};

use super::{Clock, SystemClock, TradeSessionRegistry, TransferEngine, UserLedger};
use crate::config::ExchangeConfig;
use crate::types::{
    Account, CardSet, Currency, ExchangeError, LedgerCommand, SessionId, TradeError,
    TradeOutcome, TransferError, TransferRequest, UserId,
};

const SECURED_TRADES: &str = "secured trading";

/// Entry point for every ledger-changing operation
#[derive(Debug)]
pub struct Exchange {
    engine: TransferEngine,
    registry: Arc<TradeSessionRegistry>,
    config: ExchangeConfig,
}

impl Exchange {
    /// Create an exchange with an empty ledger and the system clock
    pub fn new(config: ExchangeConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Create an exchange with an empty ledger and a custom time source
    pub fn with_clock(config: ExchangeConfig, clock: Arc<dyn Clock>) -> Self {
        let engine = TransferEngine::new(Arc::new(UserLedger::new()));
        let registry = Arc::new(TradeSessionRegistry::new(
            engine.clone(),
            config.session_ttl,
            clock,
        ));
        Self {
            engine,
            registry,
            config,
        }
    }

    pub fn ledger(&self) -> &Arc<UserLedger> {
        self.engine.ledger()
    }

    pub fn registry(&self) -> &Arc<TradeSessionRegistry> {
        &self.registry
    }

    /// Get or create a user's account, refreshing their display tag
    pub fn resolve_account(&self, user: UserId, tag: &str) -> Account {
        self.ledger().open_account(user, tag)
    }

    /// Create a user if needed, credit an opening balance and mint cards
    ///
    /// A new account gets a default tag; an existing one keeps its tag. The
    /// credit and the mint happen under one lock of the account, so nothing
    /// changes if the credit would overflow or any card id already exists.
    pub fn open(
        &self,
        user: UserId,
        balance: Currency,
        cards: &CardSet,
    ) -> Result<(), TransferError> {
        self.ledger().ensure_account(user, &default_tag(user));
        self.ledger().atomically(&[user], |txn| {
            txn.credit(user, balance)?;
            txn.issue_cards(user, cards)
        })?;
        debug!(user, balance, cards = cards.len(), "account funded");
        Ok(())
    }

    /// Ban a user from initiating transfers and trades
    pub fn ban(&self, user: UserId) -> Result<(), TransferError> {
        self.ledger().set_banned(user, true)
    }

    /// Lift a ban
    pub fn unban(&self, user: UserId) -> Result<(), TransferError> {
        self.ledger().set_banned(user, false)
    }

    /// Send currency, refused if the sender is banned
    pub fn transfer_currency(
        &self,
        from: UserId,
        to: UserId,
        amount: Currency,
    ) -> Result<(), TransferError> {
        self.ensure_not_banned(from)?;
        self.engine.transfer_currency(from, to, amount)
    }

    /// Give cards away, refused if the sender is banned
    pub fn transfer_cards(
        &self,
        from: UserId,
        to: UserId,
        cards: &CardSet,
    ) -> Result<(), TransferError> {
        self.ensure_not_banned(from)?;
        self.engine.transfer_cards(from, to, cards)
    }

    /// Apply a transfer request, refused if the sender is banned
    pub fn execute(&self, request: &TransferRequest) -> Result<(), TransferError> {
        self.ensure_not_banned(request.from)?;
        self.engine.execute(request)
    }

    /// Open a secured trade
    ///
    /// # Errors
    ///
    /// - `FeatureDisabled` if secured trades are switched off
    /// - `AccountBanned` if the initiator is banned
    /// - Any registry or proposal error
    pub fn propose_secured_trade(
        &self,
        initiator: UserId,
        counterparty: UserId,
        initiator_cards: CardSet,
        counterparty_cards: CardSet,
    ) -> Result<SessionId, TradeError> {
        if !self.config.secured_trades_enabled {
            return Err(TradeError::feature_disabled(SECURED_TRADES));
        }
        self.ensure_not_banned(initiator)?;
        self.registry
            .propose(initiator, counterparty, initiator_cards, counterparty_cards)
    }

    pub fn confirm_secured_trade(
        &self,
        session: SessionId,
        confirmer: UserId,
    ) -> Result<TradeOutcome, TradeError> {
        self.registry.confirm(session, confirmer)
    }

    pub fn decline_secured_trade(
        &self,
        session: SessionId,
        user: UserId,
    ) -> Result<TradeOutcome, TradeError> {
        self.registry.decline(session, user)
    }

    /// Expire and remove overdue trades, returning their ids
    pub fn expire_overdue_trades(&self) -> Vec<SessionId> {
        self.registry.expire_overdue()
    }

    /// Snapshots of every account, sorted by user ID
    pub fn accounts(&self) -> Vec<Account> {
        self.ledger().all_accounts()
    }

    /// Apply one replayed command
    ///
    /// `Confirm` and `Decline` address the pair's active trade. A trade that
    /// resolves as rejected or declined is a normal outcome, not an error.
    pub fn process(&self, command: LedgerCommand) -> Result<(), ExchangeError> {
        match command {
            LedgerCommand::Open {
                user,
                balance,
                cards,
            } => self.open(user, balance, &cards)?,
            LedgerCommand::Ban { user } => self.ban(user)?,
            LedgerCommand::Unban { user } => self.unban(user)?,
            LedgerCommand::Transfer(request) => self.execute(&request)?,
            LedgerCommand::Propose {
                initiator,
                counterparty,
                offered,
                requested,
            } => {
                self.propose_secured_trade(initiator, counterparty, offered, requested)?;
            }
            LedgerCommand::Confirm { confirmer, peer } => {
                let session = self.active_session(confirmer, peer)?;
                let outcome = self.confirm_secured_trade(session, confirmer)?;
                info!(session = %outcome.session(), state = %outcome.state(), "trade resolved");
            }
            LedgerCommand::Decline { user, peer } => {
                let session = self.active_session(user, peer)?;
                self.decline_secured_trade(session, user)?;
            }
            LedgerCommand::Sweep => {
                let expired = self.expire_overdue_trades();
                debug!(count = expired.len(), "sweep finished");
            }
        }
        Ok(())
    }

    fn active_session(&self, user: UserId, peer: UserId) -> Result<SessionId, TradeError> {
        self.registry
            .active_session_for(user, peer)
            .ok_or_else(|| TradeError::no_active_session(user, peer))
    }

    fn ensure_not_banned(&self, user: UserId) -> Result<(), TransferError> {
        if self.ledger().is_banned(user) {
            return Err(TransferError::account_banned(user));
        }
        Ok(())
    }
}

fn default_tag(user: UserId) -> String {
    format!("user#{user:04}")
}
