//! Game state and the simultaneous round transition
//!
//! The state is mutated in place by [`GameState::apply_round`] and restored
//! by [`GameState::undo_round`]. Searches never clone it: every recursive
//! call applies a round, recurses, and undoes it before returning.

use crate::board::{Board, CellItems, Coord, Direction, Item};
use crate::path::PathInfo;
use crate::ruleset::{Layout, LayoutError, RuleSet};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use thiserror::Error;

// ============================================================================
// CONSTANTS
// ============================================================================

pub const SIDES: usize = 2;
pub const UNITS_PER_SIDE: usize = 2;

/// Turn numbering starts here; undo cannot go below it
pub const FIRST_TURN: u16 = 1;

// ============================================================================
// CORE TYPES
// ============================================================================

/// One of the two players. Blue's base is on the top edge.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Side {
    Blue = 0,
    Red = 1,
}

impl Side {
    pub const BOTH: [Side; SIDES] = [Side::Blue, Side::Red];

    pub fn opponent(self) -> Self {
        match self {
            Side::Blue => Side::Red,
            Side::Red => Side::Blue,
        }
    }

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<Side> {
        Side::BOTH.get(index).copied()
    }

    /// Direction toward the opposing base
    pub fn forward(self) -> Direction {
        match self {
            Side::Blue => Direction::Down,
            Side::Red => Direction::Up,
        }
    }
}

/// Half of the board a unit shares with its mirror unit
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Lane {
    West,
    East,
}

impl Lane {
    /// Direction leading from the middle column into this lane
    pub fn outward(self) -> Direction {
        match self {
            Lane::West => Direction::Left,
            Lane::East => Direction::Right,
        }
    }
}

/// Stable identity of a mobile unit, kept after destruction
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UnitId {
    pub side: Side,
    pub slot: usize,
}

impl UnitId {
    pub const ALL: [UnitId; SIDES * UNITS_PER_SIDE] = [
        UnitId { side: Side::Blue, slot: 0 },
        UnitId { side: Side::Blue, slot: 1 },
        UnitId { side: Side::Red, slot: 0 },
        UnitId { side: Side::Red, slot: 1 },
    ];

    pub const fn new(side: Side, slot: usize) -> Self {
        Self { side, slot }
    }

    /// Both units of a side
    pub fn of(side: Side) -> [UnitId; UNITS_PER_SIDE] {
        [UnitId::new(side, 0), UnitId::new(side, 1)]
    }

    /// The opposing unit this one duels: other side, other slot
    pub fn mirror(self) -> Self {
        UnitId::new(self.side.opponent(), 1 - self.slot)
    }

    /// The other unit on the same side
    pub fn partner(self) -> Self {
        UnitId::new(self.side, 1 - self.slot)
    }

    /// The opposing unit with the same slot
    pub fn counterpart(self) -> Self {
        UnitId::new(self.side.opponent(), self.slot)
    }

    pub fn lane(self) -> Lane {
        if self.side.index() ^ self.slot == 0 {
            Lane::West
        } else {
            Lane::East
        }
    }

    pub fn item(self) -> Item {
        match (self.side, self.slot) {
            (Side::Blue, 0) => Item::Blue0,
            (Side::Blue, _) => Item::Blue1,
            (Side::Red, 0) => Item::Red0,
            (Side::Red, _) => Item::Red1,
        }
    }

    pub fn from_item(item: Item) -> Option<UnitId> {
        match item {
            Item::Blue0 => Some(UnitId::new(Side::Blue, 0)),
            Item::Blue1 => Some(UnitId::new(Side::Blue, 1)),
            Item::Red0 => Some(UnitId::new(Side::Red, 0)),
            Item::Red1 => Some(UnitId::new(Side::Red, 1)),
            _ => None,
        }
    }
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}{}", self.side, self.slot)
    }
}

/// What a unit does in one round
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Action {
    Invalid,
    #[default]
    Hold,
    Move(Direction),
    Fire(Direction),
}

/// Every action a live unit may attempt, in host code order
pub const ACTIONS: [Action; 9] = [
    Action::Hold,
    Action::Move(Direction::Up),
    Action::Move(Direction::Right),
    Action::Move(Direction::Down),
    Action::Move(Direction::Left),
    Action::Fire(Direction::Up),
    Action::Fire(Direction::Right),
    Action::Fire(Direction::Down),
    Action::Fire(Direction::Left),
];

impl Action {
    /// Host integer encoding
    pub fn code(self) -> i32 {
        match self {
            Action::Invalid => -2,
            Action::Hold => -1,
            Action::Move(dir) => dir.index() as i32,
            Action::Fire(dir) => dir.index() as i32 + 4,
        }
    }

    /// Decode a host integer; anything unknown is `Invalid`
    pub fn from_code(code: i32) -> Action {
        match code {
            -1 => Action::Hold,
            0..=3 => Direction::from_index(code as usize).map_or(Action::Invalid, Action::Move),
            4..=7 => Direction::from_index(code as usize - 4).map_or(Action::Invalid, Action::Fire),
            _ => Action::Invalid,
        }
    }

    pub fn is_move(self) -> bool {
        matches!(self, Action::Move(_))
    }

    pub fn is_fire(self) -> bool {
        matches!(self, Action::Fire(_))
    }

    pub fn direction(self) -> Option<Direction> {
        match self {
            Action::Move(dir) | Action::Fire(dir) => Some(dir),
            _ => None,
        }
    }

    /// Both are shots in exactly opposite directions
    pub fn fires_against(self, other: Action) -> bool {
        match (self, other) {
            (Action::Fire(a), Action::Fire(b)) => a.opposite() == b,
            _ => false,
        }
    }

    /// Grid displacement of a move, zero otherwise
    pub fn displacement(self) -> (i32, i32) {
        match self {
            Action::Move(dir) => dir.vector(),
            _ => (0, 0),
        }
    }
}

/// One action per unit for a simultaneous round
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Round {
    actions: [[Action; UNITS_PER_SIDE]; SIDES],
}

impl Round {
    /// Everybody holds
    pub fn hold() -> Self {
        Self::default()
    }

    pub fn with(mut self, unit: UnitId, action: Action) -> Self {
        self.set(unit, action);
        self
    }

    pub fn set(&mut self, unit: UnitId, action: Action) {
        self.actions[unit.side.index()][unit.slot] = action;
    }

    pub fn get(&self, unit: UnitId) -> Action {
        self.actions[unit.side.index()][unit.slot]
    }

    /// Both actions of one side
    pub fn pair(&self, side: Side) -> [Action; UNITS_PER_SIDE] {
        self.actions[side.index()]
    }

    pub fn with_pair(mut self, side: Side, pair: [Action; UNITS_PER_SIDE]) -> Self {
        self.actions[side.index()] = pair;
        self
    }

    /// Build from host codes: our own pair and the opponent's pair
    pub fn from_codes(mine: Side, own: [i32; 2], theirs: [i32; 2]) -> Self {
        let decode = |codes: [i32; 2]| codes.map(Action::from_code);
        Round::hold()
            .with_pair(mine, decode(own))
            .with_pair(mine.opponent(), decode(theirs))
    }
}

/// Game result
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GameResult {
    Ongoing,
    Draw,
    BlueWins,
    RedWins,
}

impl GameResult {
    pub fn win_for(side: Side) -> Self {
        match side {
            Side::Blue => GameResult::BlueWins,
            Side::Red => GameResult::RedWins,
        }
    }

    pub fn winner(self) -> Option<Side> {
        match self {
            GameResult::BlueWins => Some(Side::Blue),
            GameResult::RedWins => Some(Side::Red),
            _ => None,
        }
    }

    pub fn is_win_for(self, side: Side) -> bool {
        self.winner() == Some(side)
    }

    pub fn is_over(self) -> bool {
        self != GameResult::Ongoing
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GameError {
    #[error("illegal action {action:?} for unit {unit} on turn {turn}")]
    IllegalAction { unit: UnitId, action: Action, turn: u16 },

    #[error("cannot undo past the first turn")]
    UndoUnderflow,

    #[error("turn counter exhausted")]
    TurnOverflow,

    #[error("bad layout: {0}")]
    Layout(#[from] LayoutError),
}

/// Something that vanished from a cell during a round: a unit that moved
/// away or was destroyed, a brick or a base that was shot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Removal {
    item: Item,
    turn: u16,
    at: Coord,
}

/// What happened in one past round
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RoundRecord {
    /// Actions as resolved; dead units are recorded as holding
    pub actions: Round,
    /// Whose shot stopped on something this round
    landed: [[bool; UNITS_PER_SIDE]; SIDES],
}

impl RoundRecord {
    pub fn shot_landed(&self, unit: UnitId) -> bool {
        self.landed[unit.side.index()][unit.slot]
    }
}

// ============================================================================
// GAME STATE
// ============================================================================

/// Board, units, bases, and everything needed to undo rounds
#[derive(Clone)]
pub struct GameState {
    rules: RuleSet,
    board: Board,
    /// Position of each unit, `None` once destroyed
    units: [[Option<Coord>; UNITS_PER_SIDE]; SIDES],
    base_alive: [bool; SIDES],
    turn: u16,

    /// Append-only removal log; undo pops the entries of the turn it reverts
    log: Vec<Removal>,

    /// `history[t]` is the round played on turn `t`; slot 0 is all-hold
    history: Vec<RoundRecord>,

    /// Per-unit distance caches, dropped whenever a round is applied or undone
    paths: [[PathInfo; UNITS_PER_SIDE]; SIDES],
    paths_valid: [[bool; UNITS_PER_SIDE]; SIDES],
}

impl GameState {
    // ========================================================================
    // CONSTRUCTORS
    // ========================================================================

    /// Build the initial position from a host layout
    pub fn new(rules: RuleSet, layout: &Layout) -> Result<Self, GameError> {
        let board = layout.decode(&rules)?;
        Ok(Self::from_board(rules, board))
    }

    /// Empty board with the default rules
    pub fn empty() -> Self {
        Self::with_rules(RuleSet::default())
    }

    /// Empty board under `rules`
    pub fn with_rules(rules: RuleSet) -> Self {
        let board = Board::new(rules.width, rules.height);
        Self::from_board(rules, board)
    }

    /// Start from an explicit terrain board (bases and units are placed on top)
    pub fn from_board(rules: RuleSet, mut board: Board) -> Self {
        let mut units = [[None; UNITS_PER_SIDE]; SIDES];
        for unit in UnitId::ALL {
            let start = rules.start(unit);
            board.set(start, CellItems::only(unit.item()));
            units[unit.side.index()][unit.slot] = Some(start);
        }
        for side in Side::BOTH {
            board.set(rules.base(side), CellItems::only(Item::Base));
        }
        let len = board.len();
        Self {
            rules,
            board,
            units,
            base_alive: [true; SIDES],
            turn: FIRST_TURN,
            log: Vec::new(),
            history: vec![RoundRecord::default()],
            paths: std::array::from_fn(|_| std::array::from_fn(|_| PathInfo::new(len))),
            paths_valid: [[false; UNITS_PER_SIDE]; SIDES],
        }
    }

    // ========================================================================
    // ACCESSORS
    // ========================================================================

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    /// Current turn number, starting at 1
    pub fn turn(&self) -> u16 {
        self.turn
    }

    pub fn unit_pos(&self, unit: UnitId) -> Option<Coord> {
        self.units[unit.side.index()][unit.slot]
    }

    pub fn is_alive(&self, unit: UnitId) -> bool {
        self.unit_pos(unit).is_some()
    }

    pub fn base_alive(&self, side: Side) -> bool {
        self.base_alive[side.index()]
    }

    pub fn base(&self, side: Side) -> Coord {
        self.rules.base(side)
    }

    /// Record of the round played on `turn`
    pub fn record(&self, turn: u16) -> Option<&RoundRecord> {
        self.history.get(turn as usize)
    }

    /// Action the unit took last turn (hold before the first round)
    pub fn last_action(&self, unit: UnitId) -> Action {
        self.history
            .last()
            .map_or(Action::Hold, |record| record.actions.get(unit))
    }

    /// Fired last turn, so cannot fire this turn
    pub fn just_fired(&self, unit: UnitId) -> bool {
        self.last_action(unit).is_fire()
    }

    /// Number of removal log entries (for diagnostics and tests)
    pub fn log_len(&self) -> usize {
        self.log.len()
    }

    // ========================================================================
    // VALIDATION
    // ========================================================================

    /// Whether `unit` may take `action` this turn. Dead units may only hold.
    pub fn action_is_valid(&self, unit: UnitId, action: Action) -> bool {
        let Some(pos) = self.unit_pos(unit) else {
            return action == Action::Hold;
        };
        match action {
            Action::Invalid => false,
            Action::Hold => true,
            Action::Fire(_) => !self.just_fired(unit),
            Action::Move(dir) => {
                let target = pos.offset(dir);
                self.board.contains(target) && self.board.get(target).is_empty()
            }
        }
    }

    /// Legal actions of a unit, in host code order
    pub fn legal_actions(&self, unit: UnitId) -> impl Iterator<Item = Action> + '_ {
        ACTIONS
            .into_iter()
            .filter(move |&action| self.action_is_valid(unit, action))
    }

    fn validate_round(&self, round: &Round) -> Result<(), GameError> {
        if self.turn == u16::MAX {
            return Err(GameError::TurnOverflow);
        }
        for unit in UnitId::ALL {
            if !self.is_alive(unit) {
                continue;
            }
            let action = round.get(unit);
            if !self.action_is_valid(unit, action) {
                return Err(GameError::IllegalAction {
                    unit,
                    action,
                    turn: self.turn,
                });
            }
        }
        Ok(())
    }

    // ========================================================================
    // TRANSITION
    // ========================================================================

    /// Resolve one simultaneous round: moves, then shots, then destruction.
    /// On error nothing is changed.
    pub fn apply_round(&mut self, round: &Round) -> Result<(), GameError> {
        self.validate_round(round)?;

        let mut actions = *round;
        for unit in UnitId::ALL {
            if !self.is_alive(unit) {
                actions.set(unit, Action::Hold);
            }
        }

        self.move_phase(&actions);
        let (doomed, landed) = self.fire_phase(&actions);
        self.destruction_phase(doomed);

        debug_assert_eq!(self.history.len(), self.turn as usize);
        self.history.push(RoundRecord { actions, landed });
        self.turn += 1;
        self.invalidate_paths();
        Ok(())
    }

    fn move_phase(&mut self, actions: &Round) {
        for unit in UnitId::ALL {
            let Action::Move(dir) = actions.get(unit) else {
                continue;
            };
            let Some(from) = self.unit_pos(unit) else {
                continue;
            };
            let to = from.offset(dir);
            let item = unit.item();
            self.board.get_mut(from).remove(item);
            self.board.get_mut(to).insert(item);
            self.units[unit.side.index()][unit.slot] = Some(to);
            self.log.push(Removal { item, turn: self.turn, at: from });
        }
    }

    /// Trace every shot. Returns the deduplicated set of hit items and which
    /// shooters hit something.
    fn fire_phase(
        &self,
        actions: &Round,
    ) -> (BTreeSet<(Coord, Item)>, [[bool; UNITS_PER_SIDE]; SIDES]) {
        let mut doomed = BTreeSet::new();
        let mut landed = [[false; UNITS_PER_SIDE]; SIDES];

        for unit in UnitId::ALL {
            let Action::Fire(dir) = actions.get(unit) else {
                continue;
            };
            let Some(origin) = self.unit_pos(unit) else {
                continue;
            };
            let shooter_stacked = self.board.get(origin).has_multiple_units();

            let mut cell = origin.offset(dir);
            while self.board.contains(cell) {
                let items = self.board.get(cell);
                if items.is_empty() || (items.is_water_only() && !self.rules.water_blocks_fire) {
                    cell = cell.offset(dir);
                    continue;
                }

                // Two lone units shooting straight at each other cancel out
                if !shooter_stacked && items.is_single() {
                    let target = items.units().next().and_then(UnitId::from_item);
                    if let Some(target) = target {
                        if actions.get(target).fires_against(Action::Fire(dir)) {
                            break;
                        }
                    }
                }

                for item in items.items().filter(|&item| item != Item::Water) {
                    landed[unit.side.index()][unit.slot] = true;
                    doomed.insert((cell, item));
                }
                break;
            }
        }
        (doomed, landed)
    }

    fn destruction_phase(&mut self, doomed: BTreeSet<(Coord, Item)>) {
        for (at, item) in doomed {
            match item {
                Item::Steel | Item::Water => continue,
                Item::Base => {
                    let side = if at == self.base(Side::Blue) { Side::Blue } else { Side::Red };
                    self.base_alive[side.index()] = false;
                }
                Item::Brick => {}
                unit_item => {
                    if let Some(unit) = UnitId::from_item(unit_item) {
                        self.units[unit.side.index()][unit.slot] = None;
                    }
                }
            }
            self.board.get_mut(at).remove(item);
            self.log.push(Removal { item, turn: self.turn, at });
        }
    }

    /// Revert the last applied round
    pub fn undo_round(&mut self) -> Result<(), GameError> {
        if self.turn <= FIRST_TURN {
            return Err(GameError::UndoUnderflow);
        }
        self.rewind();
        Ok(())
    }

    fn rewind(&mut self) {
        self.turn -= 1;
        while let Some(&entry) = self.log.last() {
            if entry.turn != self.turn {
                break;
            }
            self.log.pop();
            match UnitId::from_item(entry.item) {
                Some(unit) => {
                    if let Some(current) = self.unit_pos(unit) {
                        self.board.get_mut(current).remove(entry.item);
                    }
                    self.units[unit.side.index()][unit.slot] = Some(entry.at);
                }
                None if entry.item == Item::Base => {
                    let side = if entry.at == self.base(Side::Blue) { Side::Blue } else { Side::Red };
                    self.base_alive[side.index()] = true;
                }
                None => {}
            }
            self.board.get_mut(entry.at).insert(entry.item);
        }
        self.history.truncate(self.turn as usize);
        self.invalidate_paths();
    }

    /// Apply `round`, run `f` on the resulting state, and undo the round
    /// again before returning.
    pub fn with_round<T>(
        &mut self,
        round: &Round,
        f: impl FnOnce(&mut Self) -> T,
    ) -> Result<T, GameError> {
        self.apply_round(round)?;
        let out = f(self);
        self.rewind();
        Ok(out)
    }

    // ========================================================================
    // RESULT
    // ========================================================================

    /// A side has failed once its base is gone or both its units are
    pub fn result(&self) -> GameResult {
        let failed = |side: Side| {
            !self.base_alive(side) || UnitId::of(side).iter().all(|&u| !self.is_alive(u))
        };
        match (failed(Side::Blue), failed(Side::Red)) {
            (true, true) => GameResult::Draw,
            (true, false) => GameResult::RedWins,
            (false, true) => GameResult::BlueWins,
            (false, false) if self.turn > self.rules.max_turn => GameResult::Draw,
            (false, false) => GameResult::Ongoing,
        }
    }

    /// Result as seen by a single unit: its own loss counts as defeat
    pub fn unit_result(&self, unit: UnitId) -> GameResult {
        match (self.base_alive(Side::Blue), self.base_alive(Side::Red)) {
            (false, false) => return GameResult::Draw,
            (false, true) => return GameResult::RedWins,
            (true, false) => return GameResult::BlueWins,
            (true, true) => {}
        }
        if !self.is_alive(unit) {
            return GameResult::win_for(unit.side.opponent());
        }
        if self.turn > self.rules.max_turn {
            GameResult::Draw
        } else {
            GameResult::Ongoing
        }
    }

    // ========================================================================
    // PATH CACHE
    // ========================================================================

    fn invalidate_paths(&mut self) {
        self.paths_valid = [[false; UNITS_PER_SIDE]; SIDES];
    }

    /// Compute the unit's distance data if the cache is stale
    pub fn ensure_paths(&mut self, unit: UnitId) {
        let (s, u) = (unit.side.index(), unit.slot);
        if self.paths_valid[s][u] {
            return;
        }
        let origin = self.unit_pos(unit);
        let target = self.rules.base(unit.side.opponent());
        let rested = !self.just_fired(unit);
        self.paths[s][u].recompute(
            &self.board,
            origin,
            target,
            unit.side.opponent().forward(),
            rested,
            self.rules.water_blocks_fire,
        );
        self.paths_valid[s][u] = true;
    }

    /// Distance data of a unit, computed on demand
    pub fn paths(&mut self, unit: UnitId) -> &PathInfo {
        self.ensure_paths(unit);
        &self.paths[unit.side.index()][unit.slot]
    }

    /// Cached distance data; call [`GameState::ensure_paths`] first
    pub fn cached_paths(&self, unit: UnitId) -> &PathInfo {
        debug_assert!(self.paths_valid[unit.side.index()][unit.slot]);
        &self.paths[unit.side.index()][unit.slot]
    }
}

impl PartialEq for GameState {
    /// Compares the game itself; path caches are ignored
    fn eq(&self, other: &Self) -> bool {
        self.rules == other.rules
            && self.board == other.board
            && self.units == other.units
            && self.base_alive == other.base_alive
            && self.turn == other.turn
            && self.log == other.log
            && self.history == other.history
    }
}

impl fmt::Debug for GameState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "turn {} ({})", self.turn, self.rules.name)?;
        write!(f, "{:?}", self.board)?;
        for side in Side::BOTH {
            write!(f, "{side:?}: base {}", if self.base_alive(side) { "up" } else { "down" })?;
            for unit in UnitId::of(side) {
                match self.unit_pos(unit) {
                    Some(c) => write!(f, ", {unit} at ({}, {})", c.x, c.y)?,
                    None => write!(f, ", {unit} destroyed")?,
                }
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

/// Unit displacement summed over a run of recorded rounds
pub(crate) fn net_displacement<'a>(
    records: impl Iterator<Item = &'a RoundRecord>,
    unit: UnitId,
) -> (i32, i32) {
    records.fold((0, 0), |(x, y), record| {
        let (dx, dy) = record.actions.get(unit).displacement();
        (x + dx, y + dy)
    })
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const BLUE0: UnitId = UnitId::new(Side::Blue, 0);
    const BLUE1: UnitId = UnitId::new(Side::Blue, 1);
    const RED0: UnitId = UnitId::new(Side::Red, 0);
    const RED1: UnitId = UnitId::new(Side::Red, 1);

    fn board_with(cells: &[(i32, i32, Item)]) -> GameState {
        let rules = RuleSet::default();
        let mut board = Board::new(rules.width, rules.height);
        for &(x, y, item) in cells {
            board.get_mut(Coord::new(x, y)).insert(item);
        }
        GameState::from_board(rules, board)
    }

    /// Move a unit step by step, everyone else holding
    fn walk(state: &mut GameState, unit: UnitId, path: &[Direction]) {
        for &dir in path {
            state
                .apply_round(&Round::hold().with(unit, Action::Move(dir)))
                .unwrap();
        }
    }

    #[test]
    fn test_initial_layout() {
        let state = GameState::empty();
        assert_eq!(state.turn(), FIRST_TURN);
        assert_eq!(state.unit_pos(BLUE0), Some(Coord::new(2, 0)));
        assert_eq!(state.unit_pos(RED1), Some(Coord::new(2, 8)));
        assert!(state.board().get(Coord::new(4, 0)).contains(Item::Base));
        assert_eq!(state.result(), GameResult::Ongoing);
    }

    #[test]
    fn test_action_codes() {
        for action in ACTIONS {
            assert_eq!(Action::from_code(action.code()), action);
        }
        assert_eq!(Action::from_code(-2), Action::Invalid);
        assert_eq!(Action::from_code(8), Action::Invalid);
        assert_eq!(Action::Fire(Direction::Left).code(), 7);
    }

    #[test]
    fn test_unit_relations() {
        assert_eq!(BLUE0.mirror(), RED1);
        assert_eq!(BLUE0.partner(), BLUE1);
        assert_eq!(BLUE0.counterpart(), RED0);
        assert_eq!(BLUE0.lane(), Lane::West);
        assert_eq!(RED1.lane(), Lane::West);
        assert_eq!(BLUE1.lane(), Lane::East);
    }

    #[test]
    fn test_move_validity() {
        let state = board_with(&[(2, 1, Item::Water)]);
        // Up leaves the board, down is water
        assert!(!state.action_is_valid(BLUE0, Action::Move(Direction::Up)));
        assert!(!state.action_is_valid(BLUE0, Action::Move(Direction::Down)));
        assert!(state.action_is_valid(BLUE0, Action::Move(Direction::Left)));
        assert!(!state.action_is_valid(BLUE0, Action::Invalid));
    }

    #[test]
    fn test_no_double_fire() {
        let mut state = GameState::empty();
        let round = Round::hold().with(BLUE0, Action::Fire(Direction::Left));
        state.apply_round(&round).unwrap();
        assert!(state.just_fired(BLUE0));
        assert!(!state.action_is_valid(BLUE0, Action::Fire(Direction::Right)));
        assert!(state.action_is_valid(BLUE0, Action::Hold));
    }

    #[test]
    fn test_illegal_round_does_not_mutate() {
        let mut state = GameState::empty();
        let before = state.clone();
        let round = Round::hold()
            .with(BLUE0, Action::Move(Direction::Down))
            .with(RED0, Action::Move(Direction::Down));
        let err = state.apply_round(&round).unwrap_err();
        assert!(matches!(err, GameError::IllegalAction { unit, .. } if unit == RED0));
        assert_eq!(state, before);
    }

    #[test]
    fn test_undo_underflow() {
        let mut state = GameState::empty();
        assert_eq!(state.undo_round(), Err(GameError::UndoUnderflow));
        assert_eq!(state.turn(), FIRST_TURN);
    }

    #[test]
    fn test_apply_undo_round_trip() {
        let mut state = board_with(&[(2, 3, Item::Brick), (5, 4, Item::Steel), (6, 3, Item::Water)]);
        let before = state.clone();

        let rounds = [
            Round::hold()
                .with(BLUE0, Action::Fire(Direction::Down))
                .with(BLUE1, Action::Move(Direction::Down))
                .with(RED0, Action::Fire(Direction::Up))
                .with(RED1, Action::Move(Direction::Right)),
            Round::hold()
                .with(BLUE0, Action::Move(Direction::Down))
                .with(BLUE1, Action::Fire(Direction::Down))
                .with(RED1, Action::Fire(Direction::Up)),
        ];
        let mut snapshots = vec![state.clone()];
        for round in &rounds {
            state.apply_round(round).unwrap();
            snapshots.push(state.clone());
        }
        for expected in snapshots.iter().rev().skip(1) {
            state.undo_round().unwrap();
            assert_eq!(&state, expected);
        }
        assert_eq!(state, before);
    }

    #[test]
    fn test_mutual_fire_cancels() {
        let mut state = GameState::empty();
        // Blue0 at (2,0) and Red1 at (2,8) share column 2
        let round = Round::hold()
            .with(BLUE0, Action::Fire(Direction::Down))
            .with(RED1, Action::Fire(Direction::Up));
        state.apply_round(&round).unwrap();
        assert!(state.is_alive(BLUE0));
        assert!(state.is_alive(RED1));
        assert_eq!(state.log_len(), 0);
        assert!(!state.record(1).unwrap().shot_landed(BLUE0));
    }

    #[test]
    fn test_shot_kills_single_target() {
        let mut state = GameState::empty();
        let round = Round::hold().with(BLUE0, Action::Fire(Direction::Down));
        state.apply_round(&round).unwrap();
        assert!(!state.is_alive(RED1));
        assert!(state.record(1).unwrap().shot_landed(BLUE0));
        assert!(state.board().get(Coord::new(2, 8)).is_empty());
        assert_eq!(state.unit_result(RED1), GameResult::BlueWins);
        assert_eq!(state.result(), GameResult::Ongoing);

        state.undo_round().unwrap();
        assert_eq!(state.unit_pos(RED1), Some(Coord::new(2, 8)));
    }

    #[test]
    fn test_co_occupied_cell_is_hit_entirely() {
        let mut state = GameState::empty();
        // Blue0 (2,0) -> (2,3); Red1 (2,8) -> (2,5); both then step onto (2,4)
        walk(&mut state, BLUE0, &[Direction::Down; 3]);
        walk(&mut state, RED1, &[Direction::Up; 3]);
        let meet = Round::hold()
            .with(BLUE0, Action::Move(Direction::Down))
            .with(RED1, Action::Move(Direction::Up));
        state.apply_round(&meet).unwrap();
        let cell = state.board().get(Coord::new(2, 4));
        assert!(cell.has_multiple_units());

        // Red0 walks to row 4 and shoots left along it
        walk(&mut state, RED0, &[Direction::Up; 4]);
        assert_eq!(state.unit_pos(RED0), Some(Coord::new(6, 4)));
        let shot = Round::hold().with(RED0, Action::Fire(Direction::Left));
        state.apply_round(&shot).unwrap();
        assert!(!state.is_alive(BLUE0));
        assert!(!state.is_alive(RED1));
        assert!(state.board().get(Coord::new(2, 4)).is_empty());

        state.undo_round().unwrap();
        assert!(state.board().get(Coord::new(2, 4)).has_multiple_units());
    }

    #[test]
    fn test_three_shooters_one_brick() {
        let mut state = board_with(&[(4, 4, Item::Brick)]);
        // Line up Blue0 above the brick, Red0 to its right, Red1 to its left
        walk(&mut state, BLUE0, &[Direction::Down, Direction::Right, Direction::Right]);
        walk(&mut state, RED0, &[Direction::Up; 4]);
        walk(&mut state, RED1, &[Direction::Up; 4]);
        assert_eq!(state.unit_pos(BLUE0), Some(Coord::new(4, 1)));
        assert_eq!(state.unit_pos(RED0), Some(Coord::new(6, 4)));
        assert_eq!(state.unit_pos(RED1), Some(Coord::new(2, 4)));

        let log_before = state.log_len();
        let volley = Round::hold()
            .with(BLUE0, Action::Fire(Direction::Down))
            .with(RED0, Action::Fire(Direction::Left))
            .with(RED1, Action::Fire(Direction::Right));
        state.apply_round(&volley).unwrap();
        assert!(state.board().get(Coord::new(4, 4)).is_empty());
        assert_eq!(state.log_len(), log_before + 1);

        state.undo_round().unwrap();
        assert!(state.board().get(Coord::new(4, 4)).contains(Item::Brick));
        assert_eq!(state.log_len(), log_before);
    }

    #[test]
    fn test_steel_is_inert() {
        let mut state = board_with(&[(2, 3, Item::Steel)]);
        let round = Round::hold().with(BLUE0, Action::Fire(Direction::Down));
        state.apply_round(&round).unwrap();
        assert!(state.board().get(Coord::new(2, 3)).contains(Item::Steel));
        assert!(state.is_alive(RED1));
        assert_eq!(state.log_len(), 0);
    }

    #[test]
    fn test_water_transparent_to_fire() {
        let mut state = board_with(&[(2, 4, Item::Water)]);
        let round = Round::hold().with(BLUE0, Action::Fire(Direction::Down));
        state.apply_round(&round).unwrap();
        assert!(!state.is_alive(RED1));
        assert!(state.board().get(Coord::new(2, 4)).contains(Item::Water));
    }

    #[test]
    fn test_water_blocks_fire_when_configured() {
        let rules = RuleSet { water_blocks_fire: true, ..RuleSet::default() };
        let mut board = Board::new(rules.width, rules.height);
        board.get_mut(Coord::new(2, 4)).insert(Item::Water);
        let mut state = GameState::from_board(rules, board);
        let round = Round::hold().with(BLUE0, Action::Fire(Direction::Down));
        state.apply_round(&round).unwrap();
        assert!(state.is_alive(RED1));
    }

    #[test]
    fn test_base_destruction_results() {
        let mut state = GameState::empty();
        // Blue1 (6,0) walks to (6,8)? Occupied by Red0; use row 8 through (5,8)
        walk(&mut state, BLUE1, &[Direction::Left; 1]);
        walk(&mut state, BLUE1, &[Direction::Down; 8]);
        assert_eq!(state.unit_pos(BLUE1), Some(Coord::new(5, 8)));
        let shot = Round::hold().with(BLUE1, Action::Fire(Direction::Left));
        state.apply_round(&shot).unwrap();
        assert!(!state.base_alive(Side::Red));
        assert_eq!(state.result(), GameResult::BlueWins);
        assert_eq!(state.unit_result(RED0), GameResult::BlueWins);

        state.undo_round().unwrap();
        assert!(state.base_alive(Side::Red));
        assert!(state.board().get(Coord::new(4, 8)).contains(Item::Base));
    }

    #[test]
    fn test_both_bases_same_round_is_draw() {
        let mut state = GameState::empty();
        walk(&mut state, BLUE1, &[Direction::Left]);
        walk(&mut state, BLUE1, &[Direction::Down; 8]);
        walk(&mut state, RED1, &[Direction::Right]);
        walk(&mut state, RED1, &[Direction::Up; 8]);
        assert_eq!(state.unit_pos(RED1), Some(Coord::new(3, 0)));
        let volley = Round::hold()
            .with(BLUE1, Action::Fire(Direction::Left))
            .with(RED1, Action::Fire(Direction::Right));
        state.apply_round(&volley).unwrap();
        assert_eq!(state.result(), GameResult::Draw);
        assert_eq!(state.unit_result(BLUE0), GameResult::Draw);
    }

    #[test]
    fn test_turn_ceiling_draw() {
        let rules = RuleSet { max_turn: 3, ..RuleSet::default() };
        let mut state = GameState::with_rules(rules);
        for _ in 0..3 {
            assert_eq!(state.result(), GameResult::Ongoing);
            state.apply_round(&Round::hold()).unwrap();
        }
        assert_eq!(state.turn(), 4);
        assert_eq!(state.result(), GameResult::Draw);
        assert_eq!(state.unit_result(BLUE0), GameResult::Draw);
    }

    #[test]
    fn test_turn_counter_never_wraps() {
        // Bypasses RuleSet::validate, which refuses this limit
        let rules = RuleSet { max_turn: u16::MAX, ..RuleSet::default() };
        let mut state = GameState::with_rules(rules);
        while state.turn() < u16::MAX {
            state.apply_round(&Round::hold()).unwrap();
        }
        assert_eq!(state.apply_round(&Round::hold()), Err(GameError::TurnOverflow));
        assert_eq!(state.turn(), u16::MAX);
        state.undo_round().unwrap();
        assert_eq!(state.turn(), u16::MAX - 1);
    }

    #[test]
    fn test_dead_units_recorded_as_hold() {
        let mut state = GameState::empty();
        state
            .apply_round(&Round::hold().with(BLUE0, Action::Fire(Direction::Down)))
            .unwrap();
        assert!(!state.is_alive(RED1));
        // Host sends the invalid sentinel for the dead unit
        let round = Round::hold().with(RED1, Action::Invalid);
        state.apply_round(&round).unwrap();
        assert_eq!(state.last_action(RED1), Action::Hold);
        assert!(!state.action_is_valid(RED1, Action::Move(Direction::Up)));
    }

    #[test]
    fn test_determinism() {
        let round = Round::hold()
            .with(BLUE0, Action::Move(Direction::Right))
            .with(BLUE1, Action::Fire(Direction::Down))
            .with(RED0, Action::Move(Direction::Left))
            .with(RED1, Action::Fire(Direction::Right));
        let mut a = board_with(&[(6, 5, Item::Brick)]);
        let mut b = a.clone();
        a.apply_round(&round).unwrap();
        b.apply_round(&round).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_with_round_restores_state() {
        let mut state = GameState::empty();
        let before = state.clone();
        let round = Round::hold().with(BLUE0, Action::Fire(Direction::Down));
        let killed = state.with_round(&round, |s| !s.is_alive(RED1)).unwrap();
        assert!(killed);
        assert_eq!(state, before);
    }
}
