//! Rollout (simulation) from a leaf state
//!
//! Every unit samples its action from a softmax over the one-ply evaluator
//! scores of its legal actions, so rollouts follow plausible play rather
//! than uniform noise. The game state is mutated in place and every round
//! played is undone before returning.
//!
//! ## Architecture
//! - Level 3: Single rollout
//! - Level 4: Weighted action sampling

use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;
use tankwar_core::eval::estimate_action;
use tankwar_core::game::SIDES;
use tankwar_core::{Action, GameError, GameResult, GameState, Heuristics, Round, Side, UnitId, ACTIONS};

/// Default softmax temperature, in evaluator score units
pub const DEFAULT_TEMPERATURE: f64 = 50.0;

// ============================================================================
// ROLLOUT RESULT
// ============================================================================

/// Result of a rollout simulation
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RolloutResult {
    pub result: GameResult,
    pub rounds_played: u32,
}

// ============================================================================
// ROLLOUT (Level 3)
// ============================================================================

/// Play weighted-random rounds from `state` until the game is decided.
///
/// `depth` is the number of rounds already played since the search root; the
/// rollout is scored a draw once it passes `max_depth`. A side that loses any
/// unit during the rollout has lost it.
pub fn rollout<R: Rng>(
    state: &mut GameState,
    depth: u32,
    max_depth: u32,
    heuristics: &Heuristics,
    temperature: f64,
    rng: &mut R,
) -> Result<RolloutResult, GameError> {
    let alive_at_start = alive_counts(state);
    let mut rounds_played = 0;

    let outcome = loop {
        if depth + rounds_played > max_depth {
            break Ok(GameResult::Draw);
        }
        let mut round = Round::hold();
        for unit in UnitId::ALL {
            round.set(unit, sample_action(state, unit, heuristics, temperature, rng));
        }
        if let Err(e) = state.apply_round(&round) {
            break Err(e);
        }
        rounds_played += 1;

        let result = state.result();
        if result.is_over() {
            break Ok(result);
        }
        let alive = alive_counts(state);
        let lost = |side: Side| alive[side.index()] < alive_at_start[side.index()];
        match (lost(Side::Blue), lost(Side::Red)) {
            (true, true) => break Ok(GameResult::Draw),
            (true, false) => break Ok(GameResult::RedWins),
            (false, true) => break Ok(GameResult::BlueWins),
            (false, false) => {}
        }
    };

    for _ in 0..rounds_played {
        state.undo_round()?;
    }
    Ok(RolloutResult {
        result: outcome?,
        rounds_played,
    })
}

fn alive_counts(state: &GameState) -> [usize; SIDES] {
    Side::BOTH.map(|side| UnitId::of(side).iter().filter(|&&u| state.is_alive(u)).count())
}

// ============================================================================
// ACTION SAMPLING (Level 4)
// ============================================================================

/// Draw one legal action for `unit`, weighted by `exp(score / temperature)`.
/// Dead units hold.
pub fn sample_action<R: Rng>(
    state: &mut GameState,
    unit: UnitId,
    heuristics: &Heuristics,
    temperature: f64,
    rng: &mut R,
) -> Action {
    if !state.is_alive(unit) {
        return Action::Hold;
    }
    let scored: Vec<(Action, i32)> = ACTIONS
        .into_iter()
        .filter_map(|action| estimate_action(state, unit, action, heuristics).map(|s| (action, s)))
        .collect();
    let Some(best) = scored.iter().map(|&(_, s)| s).max() else {
        return Action::Hold;
    };

    // Shift by the best score so the largest weight is exactly 1
    let weights = scored
        .iter()
        .map(|&(_, s)| ((s as f64 - best as f64) / temperature).exp());
    match WeightedIndex::new(weights) {
        Ok(dist) => scored[dist.sample(rng)].0,
        Err(_) => Action::Hold,
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use tankwar_core::{Direction, Layout, RuleSet};

    fn start_state() -> GameState {
        GameState::new(RuleSet::default(), &Layout::default()).unwrap()
    }

    #[test]
    fn test_rollout_restores_state() {
        let mut state = start_state();
        let before = state.clone();
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        for _ in 0..10 {
            rollout(&mut state, 0, 30, &Heuristics::default(), DEFAULT_TEMPERATURE, &mut rng).unwrap();
            assert_eq!(state, before);
        }
    }

    #[test]
    fn test_rollout_respects_depth_cap() {
        let mut state = start_state();
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let out = rollout(&mut state, 0, 5, &Heuristics::default(), DEFAULT_TEMPERATURE, &mut rng).unwrap();
        assert!(out.rounds_played <= 6);
    }

    #[test]
    fn test_rollout_past_cap_is_draw() {
        let mut state = start_state();
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let out = rollout(&mut state, 31, 30, &Heuristics::default(), DEFAULT_TEMPERATURE, &mut rng).unwrap();
        assert_eq!(out, RolloutResult { result: GameResult::Draw, rounds_played: 0 });
    }

    #[test]
    fn test_rollout_reproducible_with_seed() {
        let mut state = start_state();
        let run = |state: &mut GameState| {
            let mut rng = ChaCha8Rng::seed_from_u64(42);
            (0..5)
                .map(|_| rollout(state, 0, 30, &Heuristics::default(), DEFAULT_TEMPERATURE, &mut rng).unwrap())
                .collect::<Vec<_>>()
        };
        let first = run(&mut state);
        let second = run(&mut state);
        assert_eq!(first, second);
    }

    #[test]
    fn test_sample_action_legal() {
        let mut state = start_state();
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        for _ in 0..50 {
            for unit in UnitId::ALL {
                let action = sample_action(&mut state, unit, &Heuristics::default(), DEFAULT_TEMPERATURE, &mut rng);
                assert!(state.action_is_valid(unit, action));
            }
        }
    }

    #[test]
    fn test_sample_action_dead_unit_holds() {
        let mut state = start_state();
        let blue0 = UnitId::new(Side::Blue, 0);
        state
            .apply_round(&Round::hold().with(blue0.mirror(), Action::Fire(Direction::Up)))
            .unwrap();
        assert!(!state.is_alive(blue0));
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        assert_eq!(
            sample_action(&mut state, blue0, &Heuristics::default(), DEFAULT_TEMPERATURE, &mut rng),
            Action::Hold
        );
    }

    #[test]
    fn test_sample_action_prefers_kill() {
        // Red1 has Blue0 in its open column; at a low temperature it fires
        let mut state = start_state();
        let red1 = UnitId::new(Side::Red, 1);
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let fired = (0..20)
            .filter(|_| sample_action(&mut state, red1, &Heuristics::default(), 1.0, &mut rng) == Action::Fire(Direction::Up))
            .count();
        assert!(fired >= 18, "fired {fired} of 20");
    }
}
