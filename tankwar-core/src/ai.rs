//! Alpha-beta minimax AI
//!
//! Each own unit is searched separately against its mirror unit, with the
//! other two units holding. Rounds are simultaneous, so every node is a
//! max over our actions of a min over the mirror's replies.

use crate::board::Direction;
use crate::eval::{
    cross_fire, estimate_attack, may_kill, may_stack, predicted_action, Heuristics, DOOMED_SCORE,
    WIN_SCORE,
};
use crate::game::{Action, GameError, GameResult, GameState, Round, Side, UnitId};
use crate::strategy::{Decision, SearchError, Strategy};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::debug;

// ============================================================================
// CONSTANTS
// ============================================================================

/// Scores at or below this never become a best action
const SCORE_FLOOR: i32 = -150_000;

/// Actions in search order: press forward first, retreat last
pub fn search_order(side: Side) -> [Action; 9] {
    let forward = side.forward();
    let back = forward.opposite();
    [
        Action::Fire(forward),
        Action::Move(forward),
        Action::Hold,
        Action::Move(Direction::Left),
        Action::Move(Direction::Right),
        Action::Fire(Direction::Left),
        Action::Fire(Direction::Right),
        Action::Move(back),
        Action::Fire(back),
    ]
}

// ============================================================================
// CONFIGURATION
// ============================================================================

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MinimaxConfig {
    /// Plies searched before falling back to the evaluator
    pub max_depth: u32,
    /// Depths at which the one-ply quick judge runs before full recursion
    pub quick_judge_depth: u32,
}

impl Default for MinimaxConfig {
    fn default() -> Self {
        Self {
            max_depth: 4,
            quick_judge_depth: 3,
        }
    }
}

// ============================================================================
// MINIMAX AI
// ============================================================================

/// Result of searching one unit
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UnitChoice {
    pub best: Action,
    /// Fallback when the best action clashes with the partner's
    pub runner_up: Action,
    pub score: i32,
    pub nodes: u64,
}

/// Minimax player
#[derive(Clone, Debug, Default)]
pub struct MinimaxAI {
    pub config: MinimaxConfig,
    pub heuristics: Heuristics,
}

impl MinimaxAI {
    pub fn new(config: MinimaxConfig, heuristics: Heuristics) -> Self {
        Self { config, heuristics }
    }

    pub fn with_depth(max_depth: u32) -> Self {
        Self {
            config: MinimaxConfig {
                max_depth,
                ..MinimaxConfig::default()
            },
            heuristics: Heuristics::default(),
        }
    }

    /// Search one unit. Never returns `Invalid`; no acceptable action means hold.
    pub fn choose(
        &self,
        state: &mut GameState,
        unit: UnitId,
        deadline: Instant,
    ) -> Result<UnitChoice, GameError> {
        let mut tree = DecisionTree {
            unit,
            config: &self.config,
            heuristics: &self.heuristics,
            deadline,
            nodes: 0,
        };
        let verdict = tree.minimax(state, 0, WIN_SCORE)?;
        let or_hold = |action| match action {
            Action::Invalid => Action::Hold,
            action => action,
        };
        let choice = UnitChoice {
            best: or_hold(verdict.best),
            runner_up: or_hold(verdict.runner_up),
            score: verdict.score,
            nodes: tree.nodes,
        };
        debug!(
            unit = %unit,
            nodes = choice.nodes,
            score = choice.score,
            best = ?choice.best,
            runner_up = ?choice.runner_up,
            "minimax search finished"
        );
        Ok(choice)
    }
}

impl Strategy for MinimaxAI {
    fn name(&self) -> &'static str {
        "minimax"
    }

    /// Search both units, half the budget each, then break up friendly fire
    /// and stacking with the runner-up actions.
    fn decide(
        &mut self,
        state: &mut GameState,
        side: Side,
        deadline: Instant,
    ) -> Result<Decision, SearchError> {
        let start = Instant::now();
        if deadline <= start {
            return Err(SearchError::DeadlineElapsed);
        }
        let midpoint = start + (deadline - start) / 2;

        let [u0, u1] = UnitId::of(side);
        let first = self.choose(state, u0, midpoint)?;
        let second = self.choose(state, u1, deadline)?;

        let (mut a0, mut a1) = (first.best, second.best);
        if may_kill(state, u0, a0, u1, a1) {
            a0 = first.runner_up;
        }
        if may_kill(state, u1, a1, u0, a0) {
            a1 = second.runner_up;
        }
        if may_stack(state, u0, a0, u1, a1) {
            a0 = first.runner_up;
        }
        if may_stack(state, u1, a1, u0, a0) {
            a1 = second.runner_up;
        }

        let elapsed = start.elapsed().as_secs_f64();
        Ok(Decision {
            actions: [a0, a1],
            debug: format!("{} {} {:.3}", first.score, second.score, elapsed),
        })
    }
}

// ============================================================================
// DECISION TREE
// ============================================================================

struct Verdict {
    score: i32,
    best: Action,
    runner_up: Action,
}

impl Verdict {
    fn leaf(score: i32) -> Self {
        Self {
            score,
            best: Action::Invalid,
            runner_up: Action::Invalid,
        }
    }
}

/// Best and second-best actions seen so far
struct Ranking {
    best: Action,
    best_score: i32,
    runner_up: Action,
    runner_score: i32,
}

impl Ranking {
    fn new() -> Self {
        Self {
            best: Action::Invalid,
            best_score: SCORE_FLOOR,
            runner_up: Action::Invalid,
            runner_score: SCORE_FLOOR,
        }
    }

    fn offer(&mut self, action: Action, score: i32) {
        if score > self.best_score {
            self.runner_up = self.best;
            self.runner_score = self.best_score;
            self.best = action;
            self.best_score = score;
        } else if score > self.runner_score {
            self.runner_up = action;
            self.runner_score = score;
        }
    }
}

struct DecisionTree<'a> {
    unit: UnitId,
    config: &'a MinimaxConfig,
    heuristics: &'a Heuristics,
    deadline: Instant,
    nodes: u64,
}

impl DecisionTree<'_> {
    /// Scores decay by one per level so that faster wins rank higher.
    /// `alpha` is the parent's current bound; once our best reaches it the
    /// parent will not pick this branch.
    fn minimax(&mut self, state: &mut GameState, depth: u32, alpha: i32) -> Result<Verdict, GameError> {
        self.nodes += 1;
        let me = self.unit;
        let side = me.side;
        let rival = me.mirror();

        match state.unit_result(me) {
            GameResult::Ongoing => {}
            GameResult::Draw => return Ok(Verdict::leaf(0)),
            result if result.is_win_for(side) => return Ok(Verdict::leaf(WIN_SCORE)),
            _ => return Ok(Verdict::leaf(-WIN_SCORE)),
        }
        if cross_fire(state, me) {
            return Ok(Verdict {
                score: -DOOMED_SCORE,
                best: Action::Hold,
                runner_up: Action::Hold,
            });
        }
        if depth >= self.config.max_depth {
            return Ok(Verdict::leaf(estimate_attack(state, me, self.heuristics)));
        }

        let quick = depth <= self.config.quick_judge_depth;
        let predicted = if depth == 0 { predicted_action(state, rival) } else { None };
        let replies = search_order(side.opponent());
        let allowed = replies.map(|act1| {
            state.action_is_valid(rival, act1) && predicted.map_or(true, |p| p == act1)
        });
        let mut ranking = Ranking::new();

        if quick {
            for act0 in search_order(side) {
                if !state.action_is_valid(me, act0) {
                    continue;
                }
                let round = Round::hold()
                    .with(me, act0)
                    .with(rival, predicted.unwrap_or(Action::Hold));
                let won = state.with_round(&round, |s| s.unit_result(me).is_win_for(side))?;
                let mut score = (if won { WIN_SCORE } else { ranking.best_score }) - 1;
                if depth == 0 {
                    score = score.saturating_add(self.cross_check(state, act0, Action::Hold)?);
                }
                ranking.offer(act0, score);
            }
        }

        for act0 in search_order(side) {
            if ranking.best_score >= alpha {
                break;
            }
            if depth == 0 && ranking.best != Action::Invalid && Instant::now() >= self.deadline {
                debug!(unit = %me, nodes = self.nodes, "minimax deadline reached");
                break;
            }
            if !state.action_is_valid(me, act0) {
                continue;
            }

            let mut gamma = WIN_SCORE;
            if quick {
                for (act1, _) in replies.into_iter().zip(allowed).filter(|&(_, ok)| ok) {
                    let round = Round::hold().with(me, act0).with(rival, act1);
                    if let Some(score) = state.with_round(&round, |s| quick_verdict(s, me))? {
                        gamma = gamma.min(score);
                    }
                }
            }
            for (act1, _) in replies.into_iter().zip(allowed).filter(|&(_, ok)| ok) {
                if gamma <= ranking.best_score {
                    break;
                }
                let round = Round::hold().with(me, act0).with(rival, act1);
                let mut score = state
                    .with_round(&round, |s| self.minimax(s, depth + 1, gamma))??
                    .score;
                if depth == 0 {
                    score = score.saturating_add(self.cross_check(state, act0, act1)?);
                }
                gamma = gamma.min(score);
            }
            ranking.offer(act0, gamma);
        }

        Ok(Verdict {
            score: ranking.best_score.saturating_sub(1),
            best: ranking.best,
            runner_up: ranking.runner_up,
        })
    }

    /// Check the counterpart unit, which the two-unit tree ignores: if any
    /// of its replies kills us or leaves us caught in cross-fire, the
    /// branch is as good as lost.
    fn cross_check(&mut self, state: &mut GameState, act0: Action, act1: Action) -> Result<i32, GameError> {
        let me = self.unit;
        let flank = me.counterpart();
        let predicted = predicted_action(state, flank);
        for act2 in search_order(flank.side) {
            if predicted.is_some_and(|p| p != act2) || !state.action_is_valid(flank, act2) {
                continue;
            }
            let round = Round::hold()
                .with(me, act0)
                .with(me.mirror(), act1)
                .with(flank, act2);
            let doomed = state.with_round(&round, |s| !s.is_alive(me) || cross_fire(s, me))?;
            if doomed {
                return Ok(-WIN_SCORE);
            }
        }
        Ok(0)
    }
}

/// Decisive outcome of a single round for `me`, if any
fn quick_verdict(state: &GameState, me: UnitId) -> Option<i32> {
    match state.unit_result(me) {
        GameResult::Ongoing => cross_fire(state, me).then_some(-DOOMED_SCORE),
        GameResult::Draw => Some(0),
        result if result.is_win_for(me.side) => None,
        _ => Some(-WIN_SCORE),
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::can_shoot_each_other;
    use std::time::Duration;

    fn deadline() -> Instant {
        Instant::now() + Duration::from_secs(30)
    }

    fn walk(state: &mut GameState, unit: UnitId, dirs: &[Direction]) {
        for &dir in dirs {
            state
                .apply_round(&Round::hold().with(unit, Action::Move(dir)))
                .unwrap();
        }
    }

    /// A move ends in a cell some ready opposing unit can shoot into
    fn walks_into_fire(state: &GameState, unit: UnitId, action: Action) -> bool {
        let (Action::Move(dir), Some(pos)) = (action, state.unit_pos(unit)) else {
            return false;
        };
        let dest = pos.offset(dir);
        UnitId::of(unit.side.opponent()).into_iter().any(|enemy| {
            !state.just_fired(enemy)
                && state
                    .unit_pos(enemy)
                    .is_some_and(|at| can_shoot_each_other(state, at, dest))
        })
    }

    #[test]
    fn test_search_order() {
        assert_eq!(search_order(Side::Blue)[0], Action::Fire(Direction::Down));
        assert_eq!(search_order(Side::Red)[1], Action::Move(Direction::Up));
        assert_eq!(search_order(Side::Red)[8], Action::Fire(Direction::Down));
    }

    #[test]
    fn test_ranking_keeps_runner_up() {
        let mut ranking = Ranking::new();
        ranking.offer(Action::Hold, 10);
        ranking.offer(Action::Fire(Direction::Up), 30);
        ranking.offer(Action::Move(Direction::Up), 20);
        assert_eq!(ranking.best, Action::Fire(Direction::Up));
        assert_eq!(ranking.runner_up, Action::Move(Direction::Up));
        ranking.offer(Action::Move(Direction::Left), SCORE_FLOOR - 5);
        assert_eq!(ranking.runner_up, Action::Move(Direction::Up));
    }

    #[test]
    fn test_choose_returns_legal_action() {
        let mut state = GameState::empty();
        let ai = MinimaxAI::with_depth(2);
        let unit = UnitId::new(Side::Blue, 0);
        let choice = ai.choose(&mut state, unit, deadline()).unwrap();
        assert!(state.action_is_valid(unit, choice.best));
        assert!(choice.nodes > 1);
    }

    #[test]
    fn test_start_position_avoids_exposed_moves() {
        for depth in 1..=4 {
            for side in Side::BOTH {
                let mut state = GameState::empty();
                let mut ai = MinimaxAI::with_depth(depth);
                let decision = ai.decide(&mut state, side, deadline()).unwrap();
                for (unit, action) in UnitId::of(side).into_iter().zip(decision.actions) {
                    assert!(state.action_is_valid(unit, action));
                    assert!(
                        !walks_into_fire(&state, unit, action),
                        "depth {depth}: {unit} chose {action:?}"
                    );
                }
            }
        }
    }

    #[test]
    fn test_takes_winning_shot() {
        let mut state = GameState::empty();
        let unit = UnitId::new(Side::Blue, 1);
        walk(&mut state, unit, &[Direction::Left]);
        walk(&mut state, unit, &[Direction::Down; 8]);
        let ai = MinimaxAI::with_depth(2);
        let choice = ai.choose(&mut state, unit, deadline()).unwrap();
        assert_eq!(choice.best, Action::Fire(Direction::Left));
        assert!(choice.score > WIN_SCORE - 10);
    }

    #[test]
    fn test_decide_leaves_state_untouched() {
        let mut state = GameState::empty();
        walk(&mut state, UnitId::new(Side::Red, 0), &[Direction::Up, Direction::Up]);
        let before = state.clone();
        let mut ai = MinimaxAI::with_depth(2);
        ai.decide(&mut state, Side::Red, deadline()).unwrap();
        assert_eq!(state, before);
    }

    #[test]
    fn test_decide_rejects_elapsed_deadline() {
        let mut state = GameState::empty();
        let mut ai = MinimaxAI::with_depth(2);
        let err = ai.decide(&mut state, Side::Blue, Instant::now()).unwrap_err();
        assert_eq!(err, SearchError::DeadlineElapsed);
    }

    #[test]
    fn test_dead_unit_holds() {
        let mut state = GameState::empty();
        let round = Round::hold().with(UnitId::new(Side::Red, 1), Action::Fire(Direction::Up));
        state.apply_round(&round).unwrap();
        assert!(!state.is_alive(UnitId::new(Side::Blue, 0)));

        let mut ai = MinimaxAI::with_depth(1);
        let decision = ai.decide(&mut state, Side::Blue, deadline()).unwrap();
        assert_eq!(decision.actions[0], Action::Hold);
        assert_eq!(decision.codes()[0], -1);
    }
}
