//! MCTS tree structure and node management
//!
//! Rounds are simultaneous, so the tree alternates two node kinds held in
//! separate arenas:
//! - a state node per realized position, owning one list of decision nodes
//!   per side
//! - a decision node per candidate joint action of one side
//!
//! A state node's children are keyed by the pair of decision nodes (one per
//! side) that produced them, so every child state is shared by exactly one
//! Blue and one Red decision.
//!
//! ## Architecture
//! - Level 2: Tree operations (expand, select_pair, backpropagate)
//! - Level 3: UCT calculation, node accessors
//! - Level 4: Statistics, utilities

use rustc_hash::FxHashMap;
use tankwar_core::eval::{estimate_action, may_kill, may_stack};
use tankwar_core::game::{SIDES, UNITS_PER_SIDE};
use tankwar_core::{Action, GameResult, GameState, Heuristics, Round, Side, UnitId, ACTIONS};

// ============================================================================
// TYPES
// ============================================================================

/// State node identifier (index into the state arena)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct StateId(pub usize);

impl StateId {
    pub const ROOT: StateId = StateId(0);
}

/// Decision node identifier (index into the decision arena)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ChoiceId(pub usize);

/// Categorical outcome counters, from the owning side's point of view
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct NodeStats {
    pub visits: u32,
    pub wins: u32,
    pub draws: u32,
    pub losses: u32,
}

impl NodeStats {
    /// Win rate with draws counted as half a win
    pub fn win_rate(&self) -> f64 {
        if self.visits == 0 {
            0.5 // Prior for unexplored nodes
        } else {
            (self.wins as f64 + 0.5 * self.draws as f64) / self.visits as f64
        }
    }

    pub fn record(&mut self, result: GameResult, side: Side) {
        self.visits += 1;
        match result.winner() {
            Some(winner) if winner == side => self.wins += 1,
            Some(_) => self.losses += 1,
            None => self.draws += 1,
        }
    }
}

/// One side's candidate joint action at a state
#[derive(Clone, Debug)]
pub struct ChoiceNode {
    pub parent: StateId,
    pub side: Side,
    pub actions: [Action; UNITS_PER_SIDE],
    /// One-ply evaluator score of both actions, orders unvisited nodes
    pub prior: i64,
    pub stats: NodeStats,
}

/// A realized position
#[derive(Clone, Debug, Default)]
pub struct StateNode {
    /// Decision nodes per side, indexed by `Side::index`
    pub choices: [Vec<ChoiceId>; SIDES],
    /// Number of rounds selected from this state
    pub visits: u32,
    pub expanded: bool,
}

impl StateNode {
    pub fn is_expanded(&self) -> bool {
        self.expanded
    }
}

// ============================================================================
// MCTS TREE (Level 2 - Tree Operations)
// ============================================================================

/// Arena-backed decision tree
#[derive(Clone, Debug)]
pub struct MctsTree {
    states: Vec<StateNode>,
    choices: Vec<ChoiceNode>,
    /// Child state reached by a (Blue decision, Red decision) pair
    children: FxHashMap<(ChoiceId, ChoiceId), StateId>,
}

impl Default for MctsTree {
    fn default() -> Self {
        Self::new()
    }
}

impl MctsTree {
    /// Tree with an unexpanded root
    pub fn new() -> Self {
        Self {
            states: vec![StateNode::default()],
            choices: Vec::new(),
            children: FxHashMap::default(),
        }
    }

    pub fn root(&self) -> StateId {
        StateId::ROOT
    }

    pub fn state(&self, id: StateId) -> &StateNode {
        &self.states[id.0]
    }

    pub fn choice(&self, id: ChoiceId) -> &ChoiceNode {
        &self.choices[id.0]
    }

    /// Number of state nodes
    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn choice_count(&self) -> usize {
        self.choices.len()
    }

    /// Create the decision nodes of `id` from the position in `state`.
    ///
    /// A side's candidates are the legal action pairs of its two units,
    /// minus pairs where the units would shoot each other or step into the
    /// same cell. Returns false if the node was already expanded.
    pub fn expand(&mut self, id: StateId, state: &mut GameState, heuristics: &Heuristics) -> bool {
        if self.states[id.0].expanded {
            return false;
        }
        for side in Side::BOTH {
            let candidates = joint_candidates(state, side, heuristics);
            let ids: Vec<ChoiceId> = candidates
                .into_iter()
                .map(|(actions, prior)| {
                    let choice = ChoiceId(self.choices.len());
                    self.choices.push(ChoiceNode {
                        parent: id,
                        side,
                        actions,
                        prior,
                        stats: NodeStats::default(),
                    });
                    choice
                })
                .collect();
            self.states[id.0].choices[side.index()] = ids;
        }
        self.states[id.0].expanded = true;
        true
    }

    /// Pick one decision per side by UCT, independently
    ///
    /// Returns `None` for a state that has not been expanded.
    pub fn select_pair(&self, id: StateId, exploration: f64) -> Option<(ChoiceId, ChoiceId)> {
        let blue = self.select_choice(id, Side::Blue, exploration)?;
        let red = self.select_choice(id, Side::Red, exploration)?;
        Some((blue, red))
    }

    /// Child state of a decision pair, created on first use
    pub fn child(&mut self, pair: (ChoiceId, ChoiceId)) -> StateId {
        if let Some(&existing) = self.children.get(&pair) {
            return existing;
        }
        let id = StateId(self.states.len());
        self.states.push(StateNode::default());
        self.children.insert(pair, id);
        id
    }

    /// Existing child state of a decision pair
    pub fn find_child(&self, pair: (ChoiceId, ChoiceId)) -> Option<StateId> {
        self.children.get(&pair).copied()
    }

    /// The round played when both decisions are taken together
    pub fn round(&self, (blue, red): (ChoiceId, ChoiceId)) -> Round {
        Round::hold()
            .with_pair(Side::Blue, self.choices[blue.0].actions)
            .with_pair(Side::Red, self.choices[red.0].actions)
    }

    /// Credit `result` to every state and decision on the path.
    /// Both sides' decisions of each round are updated together.
    pub fn backpropagate(&mut self, path: &[(StateId, ChoiceId, ChoiceId)], result: GameResult) {
        for &(state, blue, red) in path {
            self.states[state.0].visits += 1;
            self.choices[blue.0].stats.record(result, Side::Blue);
            self.choices[red.0].stats.record(result, Side::Red);
        }
    }

    // ========================================================================
    // SELECTION (Level 3)
    // ========================================================================

    fn select_choice(&self, id: StateId, side: Side, exploration: f64) -> Option<ChoiceId> {
        let node = &self.states[id.0];
        let choices = &node.choices[side.index()];

        // Unvisited decisions go first, best prior leading
        let unvisited = choices
            .iter()
            .copied()
            .filter(|&c| self.choices[c.0].stats.visits == 0)
            .max_by_key(|&c| self.choices[c.0].prior);
        if unvisited.is_some() {
            return unvisited;
        }

        choices.iter().copied().max_by(|&a, &b| {
            let ua = self.uct(a, node.visits, exploration);
            let ub = self.uct(b, node.visits, exploration);
            ua.total_cmp(&ub)
        })
    }

    /// Win rate plus exploration bonus
    fn uct(&self, id: ChoiceId, parent_visits: u32, exploration: f64) -> f64 {
        let stats = &self.choices[id.0].stats;
        if stats.visits == 0 {
            return f64::INFINITY;
        }
        let parent = (parent_visits.max(1) as f64).ln();
        stats.win_rate() + exploration * (parent / stats.visits as f64).sqrt()
    }

    // ========================================================================
    // STATISTICS (Level 4)
    // ========================================================================

    /// Root decision of `side` with the most visits, prior breaking ties
    pub fn best_choice(&self, side: Side) -> Option<ChoiceId> {
        self.states[StateId::ROOT.0].choices[side.index()]
            .iter()
            .copied()
            .max_by_key(|&c| {
                let node = &self.choices[c.0];
                (node.stats.visits, node.prior)
            })
    }

    /// (actions, stats, prior) for every root decision of `side`
    pub fn choice_statistics(&self, side: Side) -> Vec<(ChoiceId, &ChoiceNode)> {
        self.states[StateId::ROOT.0].choices[side.index()]
            .iter()
            .map(|&c| (c, &self.choices[c.0]))
            .collect()
    }

    /// Rounds credited at the root
    pub fn total_simulations(&self) -> u32 {
        self.states[StateId::ROOT.0].visits
    }
}

/// Legal, non-conflicting action pairs of `side` with their priors
fn joint_candidates(
    state: &mut GameState,
    side: Side,
    heuristics: &Heuristics,
) -> Vec<([Action; UNITS_PER_SIDE], i64)> {
    let [first, second] = UnitId::of(side);
    let scored = |state: &mut GameState, unit: UnitId| -> Vec<(Action, i64)> {
        if !state.is_alive(unit) {
            return vec![(Action::Hold, 0)];
        }
        ACTIONS
            .into_iter()
            .filter_map(|action| estimate_action(state, unit, action, heuristics).map(|s| (action, s as i64)))
            .collect()
    };
    let a = scored(state, first);
    let b = scored(state, second);

    let mut pairs = Vec::with_capacity(a.len() * b.len());
    for &(action_a, score_a) in &a {
        for &(action_b, score_b) in &b {
            let conflict = may_kill(state, first, action_a, second, action_b)
                || may_kill(state, second, action_b, first, action_a)
                || may_stack(state, first, action_a, second, action_b);
            if !conflict {
                pairs.push(([action_a, action_b], score_a + score_b));
            }
        }
    }
    if pairs.is_empty() {
        pairs.push(([Action::Hold; UNITS_PER_SIDE], 0));
    }
    pairs
}

// ============================================================================
// TESTS
// ============================================================================
