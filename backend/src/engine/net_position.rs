//! Net Position Calculator
//!
//! Turns a finished game's buy-ins and cash-outs into signed per-player
//! results. Chip-count errors show up as a discrepancy between total
//! buy-ins and total cash-outs; they are reported, never rebalanced.

use super::money::{round_cents, DISCREPANCY_TOLERANCE};
use super::{EngineError, EngineResult};
use crate::models::{BuyIn, CashOut, Game, PlayerGameResult, User};
use rust_decimal::Decimal;
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

/// Net results for one game plus its conservation check
#[derive(Debug, Clone, PartialEq)]
pub struct GameNetPositions {
    pub results: Vec<PlayerGameResult>,
    pub total_buy_in: Decimal,
    pub total_cash_out: Decimal,
    /// `total_cash_out - total_buy_in`
    pub discrepancy: Decimal,
    pub has_discrepancy: bool,
}

/// Compute every player's net result for one game.
///
/// `net_result` is always re-derived from `cash_out - total_buy_in`, so
/// callers may pass results with a stale or zero `net_result`.
pub fn compute_net_positions(results: &[PlayerGameResult]) -> EngineResult<GameNetPositions> {
    let mut seen = HashSet::with_capacity(results.len());
    let mut normalized = Vec::with_capacity(results.len());
    let mut total_buy_in = Decimal::ZERO;
    let mut total_cash_out = Decimal::ZERO;

    for result in results {
        if !seen.insert(result.user_id) {
            return Err(EngineError::DuplicatePlayer(result.user_id));
        }
        if result.total_buy_in < Decimal::ZERO {
            return Err(EngineError::InvalidAmount(format!(
                "negative buy-in {} for player {}",
                result.total_buy_in, result.user_id
            )));
        }
        if result.cash_out < Decimal::ZERO {
            return Err(EngineError::InvalidAmount(format!(
                "negative cash-out {} for player {}",
                result.cash_out, result.user_id
            )));
        }

        total_buy_in += result.total_buy_in;
        total_cash_out += result.cash_out;
        normalized.push(PlayerGameResult::new(
            result.user_id,
            result.name.clone(),
            result.total_buy_in,
            result.cash_out,
        ));
    }

    let discrepancy = total_cash_out - total_buy_in;

    Ok(GameNetPositions {
        results: normalized,
        total_buy_in,
        total_cash_out,
        discrepancy,
        has_discrepancy: discrepancy.abs() > DISCREPANCY_TOLERANCE,
    })
}

/// Aggregate raw buy-in and cash-out records into per-player results.
///
/// Players are ordered by their first buy-in; players who only cashed out
/// follow in cash-out order. A player with buy-ins but no cash-out busted
/// and cashes out zero. Chips are converted at the game's chip value and
/// rounded to cents.
pub fn collect_player_results(
    game: &Game,
    players: &[User],
    buy_ins: &[BuyIn],
    cash_outs: &[CashOut],
) -> EngineResult<Vec<PlayerGameResult>> {
    let chip_value = game
        .chip_value()
        .ok_or_else(|| EngineError::InvalidGame("chips_per_buy_in must be positive".to_string()))?;

    let names: HashMap<Uuid, &str> = players.iter().map(|u| (u.id, u.name.as_str())).collect();

    let mut order: Vec<Uuid> = Vec::new();
    let mut buy_in_totals: HashMap<Uuid, Decimal> = HashMap::new();

    for buy_in in buy_ins {
        if buy_in.game_id != game.id {
            return Err(EngineError::InvalidGame(format!(
                "buy-in {} belongs to game {}",
                buy_in.id, buy_in.game_id
            )));
        }
        if buy_in.amount < Decimal::ZERO {
            return Err(EngineError::InvalidAmount(format!(
                "negative buy-in {} for player {}",
                buy_in.amount, buy_in.user_id
            )));
        }
        let total = buy_in_totals.entry(buy_in.user_id).or_insert_with(|| {
            order.push(buy_in.user_id);
            Decimal::ZERO
        });
        *total += buy_in.amount;
    }

    let mut chips_returned: HashMap<Uuid, Decimal> = HashMap::new();
    for cash_out in cash_outs {
        if cash_out.game_id != game.id {
            return Err(EngineError::InvalidGame(format!(
                "cash-out for player {} belongs to game {}",
                cash_out.user_id, cash_out.game_id
            )));
        }
        if cash_out.chips < Decimal::ZERO {
            return Err(EngineError::InvalidAmount(format!(
                "negative chip count {} for player {}",
                cash_out.chips, cash_out.user_id
            )));
        }
        if chips_returned.insert(cash_out.user_id, cash_out.chips).is_some() {
            return Err(EngineError::DuplicatePlayer(cash_out.user_id));
        }
        if !buy_in_totals.contains_key(&cash_out.user_id) {
            order.push(cash_out.user_id);
        }
    }

    order
        .into_iter()
        .map(|user_id| {
            let name = names
                .get(&user_id)
                .ok_or(EngineError::UnknownPlayer(user_id))?;
            let total_buy_in = buy_in_totals.get(&user_id).copied().unwrap_or(Decimal::ZERO);
            let cash_out = chips_returned
                .get(&user_id)
                .map(|chips| round_cents(*chips * chip_value))
                .unwrap_or(Decimal::ZERO);
            Ok(PlayerGameResult::new(user_id, *name, total_buy_in, cash_out))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(buy_in: i64, cash_out: i64) -> PlayerGameResult {
        PlayerGameResult::new(
            Uuid::new_v4(),
            "player",
            Decimal::new(buy_in, 0),
            Decimal::new(cash_out, 0),
        )
    }

    #[test]
    fn test_even_game_has_no_discrepancy() {
        let positions =
            compute_net_positions(&[result(20, 40), result(20, 0), result(20, 20)]).unwrap();

        let nets: Vec<Decimal> = positions.results.iter().map(|r| r.net_result).collect();
        assert_eq!(nets, vec![Decimal::new(20, 0), Decimal::new(-20, 0), Decimal::ZERO]);
        assert_eq!(positions.total_buy_in, Decimal::new(60, 0));
        assert_eq!(positions.total_cash_out, Decimal::new(60, 0));
        assert!(!positions.has_discrepancy);
    }

    #[test]
    fn test_discrepancy_reported_not_corrected() {
        let positions = compute_net_positions(&[result(20, 45), result(20, 0)]).unwrap();

        assert!(positions.has_discrepancy);
        assert_eq!(positions.discrepancy, Decimal::new(5, 0));
        assert_eq!(positions.results[0].net_result, Decimal::new(25, 0));
        assert_eq!(positions.results[1].net_result, Decimal::new(-20, 0));
    }

    #[test]
    fn test_one_cent_difference_is_tolerated() {
        let a = PlayerGameResult::new(Uuid::new_v4(), "a", Decimal::new(2000, 2), Decimal::new(2001, 2));
        let b = PlayerGameResult::new(Uuid::new_v4(), "b", Decimal::new(2000, 2), Decimal::new(2000, 2));
        let positions = compute_net_positions(&[a, b]).unwrap();

        assert_eq!(positions.discrepancy, Decimal::new(1, 2));
        assert!(!positions.has_discrepancy);
    }

    #[test]
    fn test_stale_net_result_is_recomputed() {
        let mut stale = result(20, 30);
        stale.net_result = Decimal::ZERO;
        let positions = compute_net_positions(&[stale]).unwrap();
        assert_eq!(positions.results[0].net_result, Decimal::new(10, 0));
    }

    #[test]
    fn test_duplicate_player_rejected() {
        let a = result(20, 20);
        let err = compute_net_positions(&[a.clone(), a.clone()]).unwrap_err();
        assert_eq!(err, EngineError::DuplicatePlayer(a.user_id));
    }

    #[test]
    fn test_negative_cash_out_rejected() {
        let err = compute_net_positions(&[result(20, -1)]).unwrap_err();
        assert!(matches!(err, EngineError::InvalidAmount(_)));
    }

    #[test]
    fn test_collect_player_results_converts_chips() {
        let host = User::new("Host");
        let guest = User::new("Guest");
        let game = Game::new(Uuid::new_v4(), host.id, "Friday", Decimal::new(20, 0), 100);

        let buy_ins = vec![
            BuyIn::new(game.id, host.id, Decimal::new(20, 0), false),
            BuyIn::new(game.id, guest.id, Decimal::new(20, 0), false),
            BuyIn::new(game.id, guest.id, Decimal::new(20, 0), true),
        ];
        let cash_outs = vec![CashOut::new(game.id, host.id, Decimal::new(300, 0))];

        let results =
            collect_player_results(&game, &[host.clone(), guest.clone()], &buy_ins, &cash_outs).unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].user_id, host.id);
        assert_eq!(results[0].cash_out, Decimal::new(60, 0));
        assert_eq!(results[0].net_result, Decimal::new(40, 0));
        assert_eq!(results[1].user_id, guest.id);
        assert_eq!(results[1].total_buy_in, Decimal::new(40, 0));
        assert_eq!(results[1].cash_out, Decimal::ZERO);
        assert_eq!(results[1].net_result, Decimal::new(-40, 0));
    }

    #[test]
    fn test_collect_player_results_rounds_fractional_chips() {
        let host = User::new("Host");
        let game = Game::new(Uuid::new_v4(), host.id, "Odd chips", Decimal::new(20, 0), 3);

        let buy_ins = vec![BuyIn::new(game.id, host.id, Decimal::new(20, 0), false)];
        let cash_outs = vec![CashOut::new(game.id, host.id, Decimal::new(1, 0))];

        let results = collect_player_results(&game, &[host], &buy_ins, &cash_outs).unwrap();
        assert_eq!(results[0].cash_out, Decimal::new(667, 2));
    }

    #[test]
    fn test_collect_player_results_unknown_player() {
        let host = User::new("Host");
        let stranger = Uuid::new_v4();
        let game = Game::new(Uuid::new_v4(), host.id, "Friday", Decimal::new(20, 0), 100);
        let buy_ins = vec![BuyIn::new(game.id, stranger, Decimal::new(20, 0), false)];

        let err = collect_player_results(&game, &[host], &buy_ins, &[]).unwrap_err();
        assert_eq!(err, EngineError::UnknownPlayer(stranger));
    }
}
