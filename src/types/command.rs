//! Replayable ledger commands
//!
//! A `LedgerCommand` is one line of a replay script, already converted from
//! its CSV form. The exchange applies commands one at a time.

use super::transfer::{CardId, CardSet, Currency, TransferKind, TransferRequest, UserId};

/// One operation the exchange can apply
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerCommand {
    /// Resolve the user (creating the account on first sight), then credit an
    /// opening balance and mint the listed cards into their inventory
    Open {
        user: UserId,
        balance: Currency,
        cards: CardSet,
    },

    /// Set the ban flag
    Ban { user: UserId },

    /// Clear the ban flag
    Unban { user: UserId },

    /// Direct, unconditional transfer
    Transfer(TransferRequest),

    /// Open a secured trade
    Propose {
        initiator: UserId,
        counterparty: UserId,
        offered: CardSet,
        requested: CardSet,
    },

    /// Confirm the active trade between `confirmer` and `peer`
    Confirm { confirmer: UserId, peer: UserId },

    /// Call off the active trade between `user` and `peer`
    Decline { user: UserId, peer: UserId },

    /// Expire every overdue trade
    Sweep,
}

impl LedgerCommand {
    /// Users whose state this command may read or write
    ///
    /// Empty for commands that touch the whole registry.
    pub fn participants(&self) -> Vec<UserId> {
        match self {
            LedgerCommand::Open { user, .. }
            | LedgerCommand::Ban { user }
            | LedgerCommand::Unban { user } => vec![*user],
            LedgerCommand::Transfer(request) => vec![request.from, request.to],
            LedgerCommand::Propose {
                initiator,
                counterparty,
                ..
            } => vec![*initiator, *counterparty],
            LedgerCommand::Confirm { confirmer, peer } => vec![*confirmer, *peer],
            LedgerCommand::Decline { user, peer } => vec![*user, *peer],
            LedgerCommand::Sweep => Vec::new(),
        }
    }

    /// Card ids this command names, in no particular order
    pub fn card_ids(&self) -> Vec<&CardId> {
        match self {
            LedgerCommand::Open { cards, .. } => cards.iter().collect(),
            LedgerCommand::Transfer(TransferRequest {
                kind: TransferKind::Cards(cards),
                ..
            }) => cards.iter().collect(),
            LedgerCommand::Propose {
                offered, requested, ..
            } => offered.iter().chain(requested).collect(),
            _ => Vec::new(),
        }
    }

    /// Short name used in log output
    pub fn name(&self) -> &'static str {
        match self {
            LedgerCommand::Open { .. } => "open",
            LedgerCommand::Ban { .. } => "ban",
            LedgerCommand::Unban { .. } => "unban",
            LedgerCommand::Transfer(request) => match request.kind {
                TransferKind::Currency(_) => "pay",
                TransferKind::Cards(_) => "give",
            },
            LedgerCommand::Propose { .. } => "propose",
            LedgerCommand::Confirm { .. } => "confirm",
            LedgerCommand::Decline { .. } => "decline",
            LedgerCommand::Sweep => "sweep",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::transfer::parse_card_set;

    #[test]
    fn test_participants() {
        let pay = LedgerCommand::Transfer(TransferRequest::currency(1, 2, 10));
        assert_eq!(pay.participants(), vec![1, 2]);
        assert_eq!(pay.name(), "pay");

        let give = LedgerCommand::Transfer(TransferRequest::cards(3, 1, parse_card_set("c1")));
        assert_eq!(give.participants(), vec![3, 1]);
        assert_eq!(give.name(), "give");

        assert!(LedgerCommand::Sweep.participants().is_empty());
        assert_eq!(
            LedgerCommand::Confirm { confirmer: 5, peer: 6 }.participants(),
            vec![5, 6]
        );
    }

    #[test]
    fn test_card_ids() {
        let propose = LedgerCommand::Propose {
            initiator: 1,
            counterparty: 2,
            offered: parse_card_set("a b"),
            requested: parse_card_set("c"),
        };
        assert_eq!(propose.card_ids(), vec!["a", "b", "c"]);

        let pay = LedgerCommand::Transfer(TransferRequest::currency(1, 2, 10));
        assert!(pay.card_ids().is_empty());
        assert!(LedgerCommand::Ban { user: 1 }.card_ids().is_empty());
    }
}
