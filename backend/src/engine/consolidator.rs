//! Cross-Game Consolidator
//!
//! Nets every unpaid ledger entry between a user and each counterparty into
//! one signed balance. "A owes B 30 from game 1" and "B owes A 10 from game
//! 2" become a single 20 payment from A to B, with the 10 offset explained.

use super::money::{is_negligible, round_cents};
use crate::models::{
    BalanceDirection, ConsolidatedBalance, ConsolidatedReport, GameContribution, IntegrityWarning,
    LedgerEntry, OffsetExplanation, UserRef,
};
use rust_decimal::Decimal;
use std::collections::HashMap;
use uuid::Uuid;

impl BalanceDirection {
    /// Direction for a signed amount; `None` inside the half-cent band
    pub fn from_net(net_amount: Decimal) -> Option<Self> {
        if is_negligible(net_amount) {
            None
        } else if net_amount > Decimal::ZERO {
            Some(BalanceDirection::OwedToYou)
        } else {
            Some(BalanceDirection::YouOwe)
        }
    }
}

#[derive(Default)]
struct Accumulator {
    gross_you_owe: Decimal,
    gross_they_owe: Decimal,
    games: Vec<GameContribution>,
    game_index: HashMap<Uuid, usize>,
    ledger_ids: Vec<Uuid>,
}

impl Accumulator {
    fn add(&mut self, entry: &LedgerEntry, signed: Decimal) {
        if signed > Decimal::ZERO {
            self.gross_they_owe += signed;
        } else {
            self.gross_you_owe -= signed;
        }

        let games = &mut self.games;
        let slot = *self.game_index.entry(entry.game_id).or_insert_with(|| {
            games.push(GameContribution {
                game_id: entry.game_id,
                group_id: entry.group_id,
                amount: Decimal::ZERO,
                direction: None,
                ledger_ids: Vec::new(),
            });
            games.len() - 1
        });

        let game = &mut self.games[slot];
        game.amount += signed;
        game.direction = BalanceDirection::from_net(game.amount);
        game.ledger_ids.push(entry.id);
        self.ledger_ids.push(entry.id);
    }

    fn finish(self, user: UserRef) -> Option<ConsolidatedBalance> {
        let net_amount = round_cents(self.gross_they_owe - self.gross_you_owe);
        let direction = BalanceDirection::from_net(net_amount)?;

        let offset_explanation = (self.gross_you_owe > Decimal::ZERO
            && self.gross_they_owe > Decimal::ZERO)
            .then(|| OffsetExplanation {
                gross_you_owe: self.gross_you_owe,
                gross_they_owe: self.gross_they_owe,
                offset_amount: self.gross_you_owe.min(self.gross_they_owe),
            });

        Some(ConsolidatedBalance {
            user,
            net_amount,
            direction,
            display_amount: net_amount.abs(),
            game_breakdown: self.games,
            offset_explanation,
            all_ledger_ids: self.ledger_ids,
        })
    }
}

/// Consolidate `user_id`'s unpaid entries per counterparty.
///
/// `directory` resolves counterparties; entries naming a user missing from
/// it are skipped with a warning, as are self-debts, non-positive amounts
/// and entries that do not involve `user_id`. Paid entries are ignored.
///
/// Balances are ordered by `display_amount` descending, then by the order
/// in which the counterparty first appears in `entries`.
pub fn consolidate(
    user_id: Uuid,
    entries: &[LedgerEntry],
    directory: &HashMap<Uuid, UserRef>,
) -> ConsolidatedReport {
    let mut warnings = Vec::new();
    let mut order: Vec<Uuid> = Vec::new();
    let mut per_counterparty: HashMap<Uuid, Accumulator> = HashMap::new();

    for entry in entries.iter().filter(|e| !e.paid) {
        if entry.from_user_id == entry.to_user_id {
            warnings.push(IntegrityWarning::SelfDebt { ledger_id: entry.id });
            continue;
        }
        let Some(counterparty) = entry.counterparty_of(user_id) else {
            warnings.push(IntegrityWarning::NotInvolved { ledger_id: entry.id });
            continue;
        };
        if entry.amount <= Decimal::ZERO {
            warnings.push(IntegrityWarning::InvalidAmount {
                ledger_id: entry.id,
                amount: entry.amount,
            });
            continue;
        }
        if !directory.contains_key(&counterparty) {
            warnings.push(IntegrityWarning::UnknownCounterparty {
                ledger_id: entry.id,
                user_id: counterparty,
            });
            continue;
        }

        let signed = if entry.to_user_id == user_id {
            entry.amount
        } else {
            -entry.amount
        };

        per_counterparty
            .entry(counterparty)
            .or_insert_with(|| {
                order.push(counterparty);
                Accumulator::default()
            })
            .add(entry, signed);
    }

    let mut consolidated: Vec<ConsolidatedBalance> = order
        .into_iter()
        .filter_map(|counterparty| {
            let acc = per_counterparty.remove(&counterparty)?;
            let user = directory.get(&counterparty)?.clone();
            acc.finish(user)
        })
        .collect();
    consolidated.sort_by(|a, b| b.display_amount.cmp(&a.display_amount));

    let total_owed_to_you: Decimal = consolidated
        .iter()
        .filter(|b| b.direction == BalanceDirection::OwedToYou)
        .map(|b| b.display_amount)
        .sum();
    let total_you_owe: Decimal = consolidated
        .iter()
        .filter(|b| b.direction == BalanceDirection::YouOwe)
        .map(|b| b.display_amount)
        .sum();

    ConsolidatedReport {
        consolidated,
        total_owed_to_you,
        total_you_owe,
        net_balance: total_owed_to_you - total_you_owe,
        warnings,
    }
}
