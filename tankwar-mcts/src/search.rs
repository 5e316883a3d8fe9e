//! MCTS search loop
//!
//! Each iteration:
//! 1. Selection - both sides pick a decision by UCT, the joint round is
//!    applied, and the search descends into the shared child state
//! 2. Expansion - the first unexpanded state reached gets its decisions
//! 3. Simulation - weighted rollout from there
//! 4. Backpropagation - the result is credited to both sides' decisions
//!
//! Every round applied during an iteration is undone before the next one.
//!
//! ## Architecture
//! - Level 2: Search loop coordination
//! - Level 3: Individual MCTS iteration
//! - Level 4: Statistics

use crate::rollout::rollout;
use crate::tree::{ChoiceId, MctsTree, StateId};
use crate::MctsConfig;
use rand::Rng;
use std::time::Instant;
use tankwar_core::game::UNITS_PER_SIDE;
use tankwar_core::{Action, GameError, GameResult, GameState, Heuristics, Side};

// ============================================================================
// SEARCH RESULT
// ============================================================================

/// Result of MCTS search
#[derive(Debug)]
pub struct SearchResult {
    /// The final tree after search
    pub tree: MctsTree,
    /// Side the search decided for
    pub side: Side,
    /// Iterations completed before the deadline or the cap
    pub iterations: u32,
    /// Statistics for each root decision of `side`, most visited first
    pub choice_stats: Vec<ChoiceStatistics>,
}

/// Statistics for one root decision
#[derive(Clone, Debug)]
pub struct ChoiceStatistics {
    pub actions: [Action; UNITS_PER_SIDE],
    pub visits: u32,
    pub win_rate: f64,
    pub prior: i64,
}

impl SearchResult {
    /// Most visited root decision, holding if the root had none
    pub fn best_actions(&self) -> [Action; UNITS_PER_SIDE] {
        self.tree
            .best_choice(self.side)
            .map(|c| self.tree.choice(c).actions)
            .unwrap_or([Action::Hold; UNITS_PER_SIDE])
    }

    /// Win rate of the chosen decision
    pub fn best_win_rate(&self) -> f64 {
        self.tree
            .best_choice(self.side)
            .map(|c| self.tree.choice(c).stats.win_rate())
            .unwrap_or(0.5)
    }
}

// ============================================================================
// SEARCH LOOP (Level 2 - Main Coordination)
// ============================================================================

/// Run MCTS for `side` until `deadline` or `config.max_iterations`.
///
/// `state` is mutated during the search and restored before returning.
pub fn run_search<R: Rng>(
    state: &mut GameState,
    side: Side,
    config: &MctsConfig,
    heuristics: &Heuristics,
    deadline: Instant,
    rng: &mut R,
) -> Result<SearchResult, GameError> {
    let mut tree = MctsTree::new();
    // The root is expanded up front so a decision exists even with no time
    tree.expand(StateId::ROOT, state, heuristics);

    let mut iterations = 0;
    while Instant::now() < deadline && config.max_iterations.map_or(true, |cap| iterations < cap) {
        run_single_iteration(&mut tree, state, config, heuristics, rng)?;
        iterations += 1;
    }

    let choice_stats = collect_choice_statistics(&tree, side);
    Ok(SearchResult {
        tree,
        side,
        iterations,
        choice_stats,
    })
}

// ============================================================================
// SINGLE ITERATION (Level 3)
// ============================================================================

/// One complete select-expand-simulate-backpropagate cycle
fn run_single_iteration<R: Rng>(
    tree: &mut MctsTree,
    state: &mut GameState,
    config: &MctsConfig,
    heuristics: &Heuristics,
    rng: &mut R,
) -> Result<GameResult, GameError> {
    let mut path = Vec::new();
    let outcome = descend(tree, state, config, heuristics, rng, &mut path);

    // Rounds on the path are still applied, whatever happened below
    for _ in 0..path.len() {
        state.undo_round()?;
    }
    let result = outcome?;
    tree.backpropagate(&path, result);
    Ok(result)
}

/// Walk down the tree applying rounds, pushing each taken step on `path`
fn descend<R: Rng>(
    tree: &mut MctsTree,
    state: &mut GameState,
    config: &MctsConfig,
    heuristics: &Heuristics,
    rng: &mut R,
    path: &mut Vec<(StateId, ChoiceId, ChoiceId)>,
) -> Result<GameResult, GameError> {
    let mut node = StateId::ROOT;
    loop {
        let depth = path.len() as u32;
        if depth > config.max_depth {
            return Ok(GameResult::Draw);
        }
        let result = state.result();
        if result.is_over() {
            return Ok(result);
        }
        if tree.expand(node, state, heuristics) {
            let out = rollout(state, depth, config.max_depth, heuristics, config.temperature, rng)?;
            return Ok(out.result);
        }

        let Some(pair) = tree.select_pair(node, config.exploration) else {
            return Ok(GameResult::Draw);
        };
        state.apply_round(&tree.round(pair))?;
        path.push((node, pair.0, pair.1));
        node = tree.child(pair);
    }
}

// ============================================================================
// STATISTICS (Level 4)
// ============================================================================

fn collect_choice_statistics(tree: &MctsTree, side: Side) -> Vec<ChoiceStatistics> {
    let mut stats: Vec<ChoiceStatistics> = tree
        .choice_statistics(side)
        .into_iter()
        .map(|(_, node)| ChoiceStatistics {
            actions: node.actions,
            visits: node.stats.visits,
            win_rate: node.stats.win_rate(),
            prior: node.prior,
        })
        .collect();
    stats.sort_by(|a, b| b.visits.cmp(&a.visits));
    stats
}

// ============================================================================
// TESTS
// ============================================================================
