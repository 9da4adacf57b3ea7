mod helpers;

use helpers::*;
use kvitt_backend::engine::{self, EngineError};
use kvitt_backend::models::*;
use rust_decimal::Decimal;
use std::collections::HashMap;
use uuid::Uuid;

/// Small deterministic generator so failures reproduce
struct Lcg(u64);

impl Lcg {
    fn next(&mut self) -> u64 {
        self.0 = self
            .0
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        self.0 >> 33
    }

    /// Signed cent amount in (-500.00, 500.00)
    fn cents(&mut self) -> Decimal {
        let raw = (self.next() % 100_000) as i64 - 50_000;
        Decimal::new(raw, 2)
    }
}

/// Zero-sum balances for `n` players
fn zero_sum_balances(rng: &mut Lcg, n: usize) -> Vec<(Uuid, Decimal)> {
    let mut balances: Vec<(Uuid, Decimal)> =
        (0..n - 1).map(|_| (Uuid::new_v4(), rng.cents())).collect();
    let sum: Decimal = balances.iter().map(|(_, amount)| *amount).sum();
    balances.push((Uuid::new_v4(), -sum));
    balances
}

fn net_flows(payments: &[Payment]) -> HashMap<Uuid, Decimal> {
    let mut flows = HashMap::new();
    for p in payments {
        *flows.entry(p.to_user_id).or_insert(Decimal::ZERO) += p.amount;
        *flows.entry(p.from_user_id).or_insert(Decimal::ZERO) -= p.amount;
    }
    flows
}

// ============================================================================
// Greedy settler
// ============================================================================

#[test]
fn test_settlement_conserves_every_balance() {
    let mut rng = Lcg(7);
    for n in 2..=9 {
        for _ in 0..25 {
            let balances = zero_sum_balances(&mut rng, n);
            let plan = engine::settle_balances(&balances);
            let flows = net_flows(&plan.payments);

            for (user_id, amount) in &balances {
                let flow = flows.get(user_id).copied().unwrap_or(Decimal::ZERO);
                assert_eq!(flow, *amount, "player {} not settled", user_id);
            }
            assert!(plan.unallocated.is_empty());
        }
    }
}

#[test]
fn test_payment_count_bound_and_positive_amounts() {
    let mut rng = Lcg(42);
    for n in 2..=12 {
        for _ in 0..20 {
            let balances = zero_sum_balances(&mut rng, n);
            let non_zero = balances.iter().filter(|(_, a)| !a.is_zero()).count();
            let plan = engine::settle_balances(&balances);

            assert!(plan.payments.len() <= non_zero.saturating_sub(1));
            for p in &plan.payments {
                assert!(p.amount > Decimal::ZERO);
                assert_eq!(p.amount.round_dp(2), p.amount);
                assert_ne!(p.from_user_id, p.to_user_id);
            }
        }
    }
}

#[test]
fn test_settlement_is_deterministic() {
    let mut rng = Lcg(1234);
    let balances = zero_sum_balances(&mut rng, 8);

    let first = engine::settle_balances(&balances);
    for _ in 0..10 {
        assert_eq!(engine::settle_balances(&balances), first);
    }
}

#[test]
fn test_settled_balances_need_no_further_payments() {
    let mut rng = Lcg(99);
    let balances = zero_sum_balances(&mut rng, 6);
    let plan = engine::settle_balances(&balances);
    let flows = net_flows(&plan.payments);

    let remaining: Vec<(Uuid, Decimal)> = balances
        .iter()
        .map(|(id, amount)| (*id, *amount - flows.get(id).copied().unwrap_or(Decimal::ZERO)))
        .collect();

    assert!(engine::settle_balances(&remaining).payments.is_empty());
}

#[test]
fn test_one_sided_balances_produce_no_payments() {
    let creditors = vec![(Uuid::new_v4(), dec("10")), (Uuid::new_v4(), dec("5"))];
    let plan = engine::settle_balances(&creditors);

    assert!(plan.payments.is_empty());
    assert_eq!(plan.unallocated.len(), 2);
    assert_eq!(plan.unallocated[0].amount, dec("10"));
}

#[test]
fn test_three_way_split_rounds_to_cents() {
    // One winner, three losers sharing an uneven loss
    let winner = Uuid::new_v4();
    let losers: Vec<Uuid> = (0..3).map(|_| Uuid::new_v4()).collect();
    let balances = vec![
        (winner, dec("100")),
        (losers[0], dec("-33.33")),
        (losers[1], dec("-33.33")),
        (losers[2], dec("-33.34")),
    ];

    let plan = engine::settle_balances(&balances);
    let total: Decimal = plan.payments.iter().map(|p| p.amount).sum();

    assert_eq!(plan.payments.len(), 3);
    assert_eq!(total, dec("100"));
    assert!(plan.payments.iter().all(|p| p.to_user_id == winner));
    assert_eq!(plan.payments[0].from_user_id, losers[2]);
}

// ============================================================================
// Net positions
// ============================================================================

#[test]
fn test_net_positions_flag_only_real_discrepancies() {
    let ana = Uuid::new_v4();
    let ben = Uuid::new_v4();

    let balanced = engine::compute_net_positions(&[
        PlayerGameResult::new(ana, "Ana", dec("20"), dec("35.01")),
        PlayerGameResult::new(ben, "Ben", dec("20"), dec("5")),
    ])
    .unwrap();
    assert_eq!(balanced.discrepancy, dec("0.01"));
    assert!(!balanced.has_discrepancy);

    let off = engine::compute_net_positions(&[
        PlayerGameResult::new(ana, "Ana", dec("20"), dec("35")),
        PlayerGameResult::new(ben, "Ben", dec("20"), dec("0")),
    ])
    .unwrap();
    assert_eq!(off.discrepancy, dec("-5"));
    assert!(off.has_discrepancy);
    assert_eq!(off.results[0].net_result, dec("15"));
    assert_eq!(off.results[1].net_result, dec("-20"));
}

#[test]
fn test_net_positions_reject_invalid_input() {
    let ana = Uuid::new_v4();

    let duplicate = engine::compute_net_positions(&[
        PlayerGameResult::new(ana, "Ana", dec("20"), dec("10")),
        PlayerGameResult::new(ana, "Ana", dec("20"), dec("30")),
    ]);
    assert_eq!(duplicate.unwrap_err(), EngineError::DuplicatePlayer(ana));

    let negative =
        engine::compute_net_positions(&[PlayerGameResult::new(ana, "Ana", dec("-1"), dec("0"))]);
    assert!(matches!(negative, Err(EngineError::InvalidAmount(_))));
}

// ============================================================================
// Consolidator
// ============================================================================

fn directory(users: &[&User]) -> HashMap<Uuid, UserRef> {
    users.iter().map(|u| (u.id, u.summary())).collect()
}

#[test]
fn test_consolidation_is_symmetric() {
    let ana = User::new("Ana");
    let ben = User::new("Ben");
    let cy = User::new("Cy");
    let group = Uuid::new_v4();
    let entries = vec![
        LedgerEntry::new(Uuid::new_v4(), group, ana.id, ben.id, dec("12.50")),
        LedgerEntry::new(Uuid::new_v4(), group, ben.id, ana.id, dec("30")),
        LedgerEntry::new(Uuid::new_v4(), group, cy.id, ana.id, dec("7")),
        LedgerEntry::new(Uuid::new_v4(), group, ben.id, cy.id, dec("4")),
    ];
    let dir = directory(&[&ana, &ben, &cy]);

    let reports: HashMap<Uuid, _> = [&ana, &ben, &cy]
        .iter()
        .map(|u| (u.id, engine::consolidate(u.id, &entries, &dir)))
        .collect();

    for a in [&ana, &ben, &cy] {
        for b in [&ana, &ben, &cy] {
            if a.id == b.id {
                continue;
            }
            let ab = reports[&a.id].balance_with(b.id).map(|x| x.net_amount);
            let ba = reports[&b.id].balance_with(a.id).map(|x| x.net_amount);
            assert_eq!(ab, ba.map(|n| -n), "{} vs {}", a.name, b.name);
        }
    }
}

#[test]
fn test_offset_and_display_add_up_to_larger_gross() {
    let ana = User::new("Ana");
    let ben = User::new("Ben");
    let group = Uuid::new_v4();
    let entries = vec![
        LedgerEntry::new(Uuid::new_v4(), group, ana.id, ben.id, dec("30")),
        LedgerEntry::new(Uuid::new_v4(), group, ana.id, ben.id, dec("15")),
        LedgerEntry::new(Uuid::new_v4(), group, ben.id, ana.id, dec("20")),
    ];

    let report = engine::consolidate(ana.id, &entries, &directory(&[&ana, &ben]));
    let balance = report.balance_with(ben.id).unwrap();
    let offset = balance.offset_explanation.as_ref().unwrap();

    assert_eq!(offset.gross_you_owe, dec("45"));
    assert_eq!(offset.gross_they_owe, dec("20"));
    assert_eq!(
        offset.offset_amount + balance.display_amount,
        offset.gross_you_owe.max(offset.gross_they_owe)
    );
    assert_eq!(balance.net_amount, offset.gross_they_owe - offset.gross_you_owe);
    assert_eq!(balance.all_ledger_ids.len(), 3);
}

#[test]
fn test_fully_netted_pair_is_omitted() {
    let ana = User::new("Ana");
    let ben = User::new("Ben");
    let group = Uuid::new_v4();
    let entries = vec![
        LedgerEntry::new(Uuid::new_v4(), group, ana.id, ben.id, dec("10")),
        LedgerEntry::new(Uuid::new_v4(), group, ben.id, ana.id, dec("10")),
    ];

    let report = engine::consolidate(ana.id, &entries, &directory(&[&ana, &ben]));

    assert!(report.consolidated.is_empty());
    assert_eq!(report.net_balance, Decimal::ZERO);
}

#[test]
fn test_malformed_rows_become_warnings() {
    let ana = User::new("Ana");
    let ben = User::new("Ben");
    let group = Uuid::new_v4();
    let mut self_debt = LedgerEntry::new(Uuid::new_v4(), group, ana.id, ben.id, dec("5"));
    self_debt.to_user_id = ana.id;
    let stranger = LedgerEntry::new(Uuid::new_v4(), group, ana.id, Uuid::new_v4(), dec("5"));
    let good = LedgerEntry::new(Uuid::new_v4(), group, ben.id, ana.id, dec("8"));

    let report = engine::consolidate(
        ana.id,
        &[self_debt.clone(), stranger.clone(), good],
        &directory(&[&ana, &ben]),
    );

    assert_eq!(report.consolidated.len(), 1);
    assert_eq!(report.total_owed_to_you, dec("8"));
    let flagged: Vec<Uuid> = report.warnings.iter().map(|w| w.ledger_id()).collect();
    assert_eq!(flagged, vec![self_debt.id, stranger.id]);
}
