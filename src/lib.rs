//! Card Trade Engine Library
//!
//! # Overview
//!
//! A concurrent ledger of user balances and non-fungible card instances, with
//! atomic peer-to-peer transfers and a two-party secured trade protocol. A CSV
//! replay harness drives it with either a sync or an async strategy.
//!
//! # Architecture
//!
//! - [`types`] - Core data types (Account, TransferRequest, LedgerCommand, errors)
//! - [`config`] - Exchange settings
//! - [`core`] - Business logic components:
//!   - [`core::ledger`] - Per-account locked state and multi-account transactions
//!   - [`core::transfer_engine`] - Atomic currency and card transfers
//!   - [`core::trade_session`] - Secured trade state machine
//!   - [`core::session_registry`] - In-flight trades, one per user pair, with expiry
//!   - [`core::exchange`] - Facade adding identity, ban and feature policies
//! - [`io`] - Script parsing and account output
//! - [`strategy`] - Sync and async replay pipelines
//! - [`cli`] - CLI argument parsing and log setup
//!
//! # Operations
//!
//! - **Pay**: move currency between two accounts
//! - **Give**: move a set of cards between two accounts, all or nothing
//! - **Propose / Confirm**: a secured trade; the initiator offers cards, the
//!   counterparty confirms, and both legs are swapped as one atomic step
//! - **Decline / Expire**: a trade that is called off or times out moves nothing
//!
//! # Guarantees
//!
//! - No operation creates or destroys currency or cards
//! - A failed operation leaves every account exactly as it was
//! - Multi-account operations lock accounts in ascending user-id order

pub mod cli;
pub mod config;
pub mod core;
pub mod io;
pub mod strategy;
pub mod types;

pub use config::ExchangeConfig;
pub use core::{Exchange, TradeSessionRegistry, TransferEngine, UserLedger};
pub use io::write_accounts_csv;
pub use types::{
    Account, CardId, CardSet, Currency, ExchangeError, LedgerCommand, SessionId, TradeError,
    TradeOutcome, TradeState, TransferError, UserId,
};
