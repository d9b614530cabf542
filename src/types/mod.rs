//! Types module
//!
//! Contains core data structures used throughout the application.
//! This module organizes types into logical submodules:
//! - `account`: Account state held by the ledger
//! - `transfer`: Identifiers and transfer requests
//! - `trade`: Secured trade sessions ids, states and outcomes
//! - `command`: Replayable ledger commands
//! - `error`: Error types

pub mod account;
pub mod command;
pub mod error;
pub mod trade;
pub mod transfer;

pub use account::Account;
pub use command::LedgerCommand;
pub use error::{ExchangeError, TradeError, TransferError};
pub use trade::{SessionId, TradeOutcome, TradeState};
pub use transfer::{
    parse_card_set, CardId, CardSet, Currency, TransferKind, TransferRequest, UserId,
};
