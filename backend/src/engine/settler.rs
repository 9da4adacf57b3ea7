//! Greedy Minimal-Transaction Settler
//!
//! Repeatedly pairs the largest outstanding debtor with the largest
//! outstanding creditor and emits a payment for the smaller of the two.
//! Every step clears at least one party, so `n` non-zero participants
//! settle in at most `n - 1` payments. Finding the true minimum is a
//! partition problem; this greedy is the approximation used in practice.
//!
//! Ties on magnitude go to the party that appears first in the input, which
//! makes the output a pure function of the input order.

use super::money::{is_negligible, round_cents};
use crate::models::{Payment, PlayerGameResult};
use rust_decimal::Decimal;
use std::cmp::Reverse;
use std::collections::BinaryHeap;
use uuid::Uuid;

/// Balance left over after settlement because credits and debts did not match
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnallocatedBalance {
    pub user_id: Uuid,
    /// Signed like a net result: negative for debt nobody could receive
    pub amount: Decimal,
}

/// Payments for one game plus anything that could not be matched
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SettlementPlan {
    pub payments: Vec<Payment>,
    pub unallocated: Vec<UnallocatedBalance>,
}

/// Heap entry. Field order matters: larger `remaining` first, then the
/// earlier input index (hence `Reverse`).
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
struct Party {
    remaining: Decimal,
    order: Reverse<usize>,
}

impl Party {
    fn index(&self) -> usize {
        self.order.0
    }
}

/// Settle a game's player results
pub fn settle_results(results: &[PlayerGameResult]) -> SettlementPlan {
    let balances: Vec<(Uuid, Decimal)> = results.iter().map(|r| (r.user_id, r.net_result)).collect();
    settle_balances(&balances)
}

/// Settle signed balances (positive = is owed money).
pub fn settle_balances(balances: &[(Uuid, Decimal)]) -> SettlementPlan {
    let mut debtors = BinaryHeap::new();
    let mut creditors = BinaryHeap::new();

    for (index, (_, amount)) in balances.iter().enumerate() {
        if is_negligible(*amount) {
            continue;
        }
        let party = Party {
            remaining: amount.abs(),
            order: Reverse(index),
        };
        if amount.is_sign_negative() {
            debtors.push(party);
        } else {
            creditors.push(party);
        }
    }

    let mut exact: Vec<(Uuid, Uuid, Decimal)> = Vec::new();

    while !debtors.is_empty() && !creditors.is_empty() {
        let (Some(mut debtor), Some(mut creditor)) = (debtors.pop(), creditors.pop()) else {
            break;
        };

        let amount = debtor.remaining.min(creditor.remaining);
        exact.push((balances[debtor.index()].0, balances[creditor.index()].0, amount));

        debtor.remaining -= amount;
        creditor.remaining -= amount;

        if !is_negligible(debtor.remaining) {
            debtors.push(debtor);
        }
        if !is_negligible(creditor.remaining) {
            creditors.push(creditor);
        }
    }

    let mut unallocated: Vec<(usize, UnallocatedBalance)> = debtors
        .into_iter()
        .map(|p| {
            (
                p.index(),
                UnallocatedBalance {
                    user_id: balances[p.index()].0,
                    amount: -round_cents(p.remaining),
                },
            )
        })
        .chain(creditors.into_iter().map(|p| {
            (
                p.index(),
                UnallocatedBalance {
                    user_id: balances[p.index()].0,
                    amount: round_cents(p.remaining),
                },
            )
        }))
        .collect();
    unallocated.sort_by_key(|(index, _)| *index);

    SettlementPlan {
        payments: round_chain(exact),
        unallocated: unallocated.into_iter().map(|(_, u)| u).collect(),
    }
}

/// Round each payment to cents; the last payment absorbs the residual so
/// the rounded chain total equals the rounded exact total.
fn round_chain(exact: Vec<(Uuid, Uuid, Decimal)>) -> Vec<Payment> {
    let target: Decimal = round_cents(exact.iter().map(|(_, _, amount)| *amount).sum());

    let mut payments: Vec<Payment> = exact
        .into_iter()
        .map(|(from_user_id, to_user_id, amount)| Payment {
            from_user_id,
            to_user_id,
            amount: round_cents(amount),
        })
        .collect();

    let rounded_total: Decimal = payments.iter().map(|p| p.amount).sum();
    let residual = target - rounded_total;
    if !residual.is_zero() {
        if let Some(last) = payments.last_mut() {
            last.amount += residual;
        }
    }

    payments.retain(|p| p.amount > Decimal::ZERO);
    payments
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn users(n: usize) -> Vec<Uuid> {
        (0..n).map(|_| Uuid::new_v4()).collect()
    }

    fn balances(ids: &[Uuid], amounts: &[i64]) -> Vec<(Uuid, Decimal)> {
        ids.iter()
            .zip(amounts)
            .map(|(id, amount)| (*id, Decimal::new(*amount, 0)))
            .collect()
    }

    fn pay(from: Uuid, to: Uuid, amount: i64) -> Payment {
        Payment {
            from_user_id: from,
            to_user_id: to,
            amount: Decimal::new(amount, 0),
        }
    }

    /// Net flow per user: received minus paid
    fn flows(payments: &[Payment]) -> HashMap<Uuid, Decimal> {
        let mut flows = HashMap::new();
        for p in payments {
            *flows.entry(p.to_user_id).or_insert(Decimal::ZERO) += p.amount;
            *flows.entry(p.from_user_id).or_insert(Decimal::ZERO) -= p.amount;
        }
        flows
    }

    #[test]
    fn test_single_debtor_single_creditor() {
        let ids = users(3);
        let plan = settle_balances(&balances(&ids, &[20, -20, 0]));
        assert_eq!(plan.payments, vec![pay(ids[1], ids[0], 20)]);
        assert!(plan.unallocated.is_empty());
    }

    #[test]
    fn test_four_players_follow_largest_pair_order() {
        // A +30, B +10, C -15, D -25
        let ids = users(4);
        let plan = settle_balances(&balances(&ids, &[30, 10, -15, -25]));

        assert_eq!(
            plan.payments,
            vec![
                pay(ids[3], ids[0], 25),
                pay(ids[2], ids[1], 10),
                pay(ids[2], ids[0], 5),
            ]
        );
    }

    #[test]
    fn test_already_balanced_is_empty() {
        let ids = users(3);
        let plan = settle_balances(&balances(&ids, &[0, 0, 0]));
        assert!(plan.payments.is_empty());

        let plan = settle_balances(&[]);
        assert!(plan.payments.is_empty());
    }

    #[test]
    fn test_only_creditors_leaves_unallocated() {
        let ids = users(2);
        let plan = settle_balances(&balances(&ids, &[5, 10]));
        assert!(plan.payments.is_empty());
        assert_eq!(plan.unallocated.len(), 2);
        assert_eq!(plan.unallocated[0].user_id, ids[0]);
    }

    #[test]
    fn test_ties_broken_by_input_order() {
        let ids = users(4);
        let plan = settle_balances(&balances(&ids, &[10, 10, -10, -10]));
        assert_eq!(
            plan.payments,
            vec![pay(ids[2], ids[0], 10), pay(ids[3], ids[1], 10)]
        );
    }

    #[test]
    fn test_deterministic_for_same_input() {
        let ids = users(6);
        let input = balances(&ids, &[17, -4, 33, -21, -25, 0]);
        assert_eq!(settle_balances(&input), settle_balances(&input));
    }

    #[test]
    fn test_conservation_and_bound() {
        let ids = users(7);
        let input = balances(&ids, &[45, -12, -8, 30, -40, -15, 0]);
        let plan = settle_balances(&input);

        let non_zero = input.iter().filter(|(_, a)| !a.is_zero()).count();
        assert!(plan.payments.len() <= non_zero - 1);
        assert!(plan.payments.iter().all(|p| p.amount > Decimal::ZERO));

        let flows = flows(&plan.payments);
        for (id, amount) in &input {
            assert_eq!(flows.get(id).copied().unwrap_or(Decimal::ZERO), *amount);
        }
    }

    #[test]
    fn test_fractional_balances_round_to_cents() {
        let ids = users(3);
        let third = Decimal::new(20, 0) / Decimal::new(3, 0);
        let input = vec![(ids[0], third), (ids[1], third), (ids[2], -(third + third))];
        let plan = settle_balances(&input);

        assert_eq!(plan.payments.len(), 2);
        assert!(plan.payments.iter().all(|p| p.amount.round_dp(2) == p.amount));
        let total: Decimal = plan.payments.iter().map(|p| p.amount).sum();
        assert_eq!(total, Decimal::new(1333, 2));
    }

    #[test]
    fn test_sub_cent_remainders_are_dropped() {
        let ids = users(2);
        let input = vec![(ids[0], Decimal::new(1000, 2)), (ids[1], Decimal::new(-10004, 3))];
        let plan = settle_balances(&input);
        assert_eq!(plan.payments.len(), 1);
        assert_eq!(plan.payments[0].amount, Decimal::new(1000, 2));
        assert!(plan.unallocated.is_empty());
    }
}
