//! Tankwar MCTS - Monte Carlo Tree Search over the tank game
//!
//! This crate provides a simultaneous-move MCTS player:
//! - Decision nodes per side sharing realized state nodes (UCT selection)
//! - Evaluator-weighted rollouts
//! - Backpropagation to both sides at once

pub mod rollout;
pub mod search;
pub mod tree;

pub use rollout::{rollout, RolloutResult, DEFAULT_TEMPERATURE};
pub use search::{run_search, ChoiceStatistics, SearchResult};
pub use tree::{ChoiceId, MctsTree, NodeStats, StateId};

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tankwar_core::{Decision, GameState, Heuristics, SearchError, Side, Strategy};
use tracing::debug;

/// MCTS configuration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MctsConfig {
    /// UCT exploration constant
    pub exploration: f64,
    /// Rounds past the root after which a line is scored a draw
    pub max_depth: u32,
    /// Stop after this many iterations even if time remains
    pub max_iterations: Option<u32>,
    /// Rollout softmax temperature
    pub temperature: f64,
    pub seed: u64,
}

impl Default for MctsConfig {
    fn default() -> Self {
        Self {
            exploration: 1.41, // sqrt(2)
            max_depth: 30,
            max_iterations: None,
            temperature: DEFAULT_TEMPERATURE,
            seed: 0,
        }
    }
}

/// MCTS player; the tree is rebuilt every turn
pub struct MctsPlayer {
    config: MctsConfig,
    heuristics: Heuristics,
    rng: ChaCha8Rng,
}

impl MctsPlayer {
    pub fn new(config: MctsConfig) -> Self {
        let rng = ChaCha8Rng::seed_from_u64(config.seed);
        Self {
            config,
            heuristics: Heuristics::default(),
            rng,
        }
    }

    pub fn with_heuristics(mut self, heuristics: Heuristics) -> Self {
        self.heuristics = heuristics;
        self
    }

    pub fn config(&self) -> &MctsConfig {
        &self.config
    }

    /// Full search result for `side`
    pub fn search(
        &mut self,
        state: &mut GameState,
        side: Side,
        deadline: Instant,
    ) -> Result<SearchResult, SearchError> {
        let result = run_search(state, side, &self.config, &self.heuristics, deadline, &mut self.rng)?;
        Ok(result)
    }
}

impl Strategy for MctsPlayer {
    fn name(&self) -> &'static str {
        "mcts"
    }

    fn decide(&mut self, state: &mut GameState, side: Side, deadline: Instant) -> Result<Decision, SearchError> {
        let start = Instant::now();
        if start >= deadline {
            return Err(SearchError::DeadlineElapsed);
        }
        let result = self.search(state, side, deadline)?;
        let actions = result.best_actions();
        let rate = result.best_win_rate();
        debug!(
            ?side,
            iterations = result.iterations,
            states = result.tree.len(),
            decisions = result.tree.choice_count(),
            win_rate = rate,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "mcts search finished"
        );
        Ok(Decision {
            actions,
            debug: format!("{} {:.3} {:.2}", result.iterations, rate, start.elapsed().as_secs_f64()),
        })
    }
}
