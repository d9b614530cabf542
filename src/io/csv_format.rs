//! CSV format handling for replay scripts and account output
//!
//! This module handles all CSV-specific concerns:
//! - The `ScriptRecord` structure matching one row of a replay script
//! - Conversion from `ScriptRecord` to `LedgerCommand`
//! - Serialization of final account states to CSV
//!
//! # Script Format
//!
//! ```text
//! op,user,peer,amount,cards,wanted
//! open,1,,100,c1 c2,
//! give,1,2,,c1,
//! propose,1,2,,c2,c7
//! confirm,2,1,,,
//! sweep,,,,,
//! ```
//!
//! Card lists are whitespace-separated. Columns an operation does not use may
//! be left empty.

use crate::types::{
    parse_card_set, Account, CardSet, Currency, LedgerCommand, TransferRequest, UserId,
};
use serde::Deserialize;
use std::io::Write;

/// Raw replay script row as read from CSV
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct ScriptRecord {
    /// Operation name
    pub op: String,

    /// Acting user (initiator, sender, confirmer)
    pub user: Option<UserId>,

    /// The other user, where the operation has one
    pub peer: Option<UserId>,

    /// Currency amount (parsed later for better error messages)
    pub amount: Option<String>,

    /// Cards the acting user gives or owns
    pub cards: Option<String>,

    /// Cards requested from the peer in a trade proposal
    pub wanted: Option<String>,
}

/// Convert a script row into a ledger command
///
/// # Errors
///
/// Returns a description of the problem if the operation is unknown, the
/// amount is not a non-negative integer, or a column the operation needs is
/// empty.
pub fn convert_script_record(record: ScriptRecord) -> Result<LedgerCommand, String> {
    let op = record.op.to_lowercase();
    if op == "sweep" {
        return Ok(LedgerCommand::Sweep);
    }

    let user = record
        .user
        .ok_or_else(|| format!("'{}' requires a user", record.op))?;
    let peer = || {
        record
            .peer
            .ok_or_else(|| format!("'{}' by user {} requires a peer", record.op, user))
    };
    let cards = || card_column(record.cards.as_deref());

    let command = match op.as_str() {
        "open" => LedgerCommand::Open {
            user,
            balance: parse_amount(record.amount.as_deref(), user)?.unwrap_or(0),
            cards: cards(),
        },
        "ban" => LedgerCommand::Ban { user },
        "unban" => LedgerCommand::Unban { user },
        "pay" => {
            let amount = parse_amount(record.amount.as_deref(), user)?
                .ok_or_else(|| format!("'pay' by user {} requires an amount", user))?;
            LedgerCommand::Transfer(TransferRequest::currency(user, peer()?, amount))
        }
        "give" => LedgerCommand::Transfer(TransferRequest::cards(user, peer()?, cards())),
        "propose" => LedgerCommand::Propose {
            initiator: user,
            counterparty: peer()?,
            offered: cards(),
            requested: card_column(record.wanted.as_deref()),
        },
        "confirm" => LedgerCommand::Confirm {
            confirmer: user,
            peer: peer()?,
        },
        "decline" => LedgerCommand::Decline {
            user,
            peer: peer()?,
        },
        _ => return Err(format!("Invalid operation: '{}' for user {}", record.op, user)),
    };

    Ok(command)
}

fn parse_amount(raw: Option<&str>, user: UserId) -> Result<Option<Currency>, String> {
    match raw.map(str::trim) {
        Some(amount) if !amount.is_empty() => amount
            .parse::<Currency>()
            .map(Some)
            .map_err(|_| format!("Invalid amount '{}' for user {}", amount, user)),
        _ => Ok(None),
    }
}

fn card_column(raw: Option<&str>) -> CardSet {
    raw.map(parse_card_set).unwrap_or_default()
}

/// Write account states to CSV output
///
/// Rows are sorted by user id; each account's cards are written as one
/// space-separated column in sorted order.
///
/// # Output Format
///
/// ```text
/// user,balance,cards,banned
/// 1,40,c2 c7,false
/// 2,60,c1,true
/// ```
pub fn write_accounts_csv(accounts: &[Account], output: &mut dyn Write) -> Result<(), String> {
    use csv::Writer;

    let mut writer = Writer::from_writer(output);

    writer
        .write_record(["user", "balance", "cards", "banned"])
        .map_err(|e| format!("Failed to write CSV header: {}", e))?;

    let mut sorted_accounts = accounts.to_vec();
    sorted_accounts.sort_by_key(|account| account.user);

    for account in sorted_accounts {
        let cards: Vec<&str> = account.cards.iter().map(String::as_str).collect();
        writer
            .write_record(&[
                account.user.to_string(),
                account.balance.to_string(),
                cards.join(" "),
                account.banned.to_string(),
            ])
            .map_err(|e| format!("Failed to write account record: {}", e))?;
    }

    writer
        .flush()
        .map_err(|e| format!("Failed to flush output: {}", e))?;

    Ok(())
}
