//! Core business logic module
//!
//! This module contains the ledger and the components layered on top of it:
//! - `ledger` - Per-account locked user state and multi-account transactions
//! - `transfer_engine` - Atomic currency and card transfers
//! - `trade_session` - Secured trade state machine
//! - `session_registry` - In-flight trade sessions, one per user pair
//! - `clock` - Time sources for session expiry
//! - `exchange` - Facade applying policies and replayed commands
//! - `batch_processor` - Concurrent replay of command batches

pub mod batch_processor;
pub mod clock;
pub mod exchange;
pub mod ledger;
pub mod session_registry;
pub mod trade_session;
pub mod transfer_engine;

pub use batch_processor::{BatchProcessor, ProcessingResult};
pub use clock::{Clock, ManualClock, SystemClock};
pub use exchange::Exchange;
pub use ledger::{LedgerTxn, UserLedger};
pub use session_registry::TradeSessionRegistry;
pub use trade_session::SecuredTradeSession;
pub use transfer_engine::TransferEngine;
