//! Position evaluation and tactical predicates

use crate::board::{Coord, Item};
use crate::game::{net_displacement, Action, GameState, Round, UnitId};
use crate::path::{is_linked, UNREACHABLE};
use serde::{Deserialize, Serialize};

/// Score of a decided game (effectively infinite)
pub const WIN_SCORE: i32 = 1_000_000_000;

/// Score of a unit that is dead or about to be
pub const DOOMED_SCORE: i32 = 100_000_000;

/// Corner count when the unit has no good turn along its duel line
pub const CORNER_NONE: i32 = 50;

/// Longest action cycle the pattern detector looks for
pub const MAX_CYCLE: usize = 8;

/// Heuristic weights for position evaluation
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Heuristics {
    /// Per turn of attack-distance lead while the unit can still defend
    pub race_weight: i32,
    /// Per turn of attack-distance lead once defending is impossible
    pub open_race_weight: i32,
    /// Reward for a short own attack distance
    pub tempo_weight: i32,
    /// Attack distance at which the tempo reward reaches zero
    pub tempo_horizon: i32,
    /// Flat bonus when no approach to our base out-races us
    pub defensible_bonus: i32,
    /// Per step of corner advantage in a direct duel
    pub corner_weight: i32,
}

impl Default for Heuristics {
    fn default() -> Self {
        Self {
            race_weight: 50,
            open_race_weight: 500,
            tempo_weight: 6,
            tempo_horizon: 10,
            defensible_bonus: 20,
            corner_weight: 5,
        }
    }
}

// ============================================================================
// LINE OF FIRE
// ============================================================================

/// Whether a shot from `a` would reach `b`: same row or column with no
/// brick, steel, or base strictly between. Units never block.
pub fn can_shoot_each_other(state: &GameState, a: Coord, b: Coord) -> bool {
    if a == b {
        return false;
    }
    let Some(dir) = a.direction_to(b) else {
        return false;
    };
    let mut c = a.offset(dir);
    while c != b {
        if blocks_fire(state, c) {
            return false;
        }
        c = c.offset(dir);
    }
    true
}

fn blocks_fire(state: &GameState, c: Coord) -> bool {
    let items = state.board().get(c);
    items.contains_any(&[Item::Brick, Item::Steel, Item::Base])
        || (state.rules().water_blocks_fire && items.contains(Item::Water))
}

/// Both units alive and in each other's line of fire
pub fn units_can_shoot(state: &GameState, a: UnitId, b: UnitId) -> bool {
    match (state.unit_pos(a), state.unit_pos(b)) {
        (Some(pa), Some(pb)) => can_shoot_each_other(state, pa, pb),
        _ => false,
    }
}

/// Whether `shooter` taking `action` would hit `target` (units do not block)
pub fn may_fire_into(state: &GameState, shooter: UnitId, action: Action, target: Coord) -> bool {
    let (Action::Fire(dir), Some(origin)) = (action, state.unit_pos(shooter)) else {
        return false;
    };
    let board = state.board();
    let mut c = origin.offset(dir);
    while board.contains(c) {
        if c == target {
            return true;
        }
        if blocks_fire(state, c) {
            break;
        }
        c = c.offset(dir);
    }
    false
}

/// Whether `shooter`'s action could destroy `target` given `target`'s own
/// action. Opposite shots cancel and never kill.
pub fn may_kill(
    state: &GameState,
    shooter: UnitId,
    action: Action,
    target: UnitId,
    target_action: Action,
) -> bool {
    if action.fires_against(target_action) {
        return false;
    }
    let Some(mut dest) = state.unit_pos(target) else {
        return false;
    };
    if let Action::Move(dir) = target_action {
        dest = dest.offset(dir);
    }
    may_fire_into(state, shooter, action, dest)
}

/// Both units step into the same cell
pub fn may_stack(state: &GameState, a: UnitId, action_a: Action, b: UnitId, action_b: Action) -> bool {
    match (action_a, action_b, state.unit_pos(a), state.unit_pos(b)) {
        (Action::Move(da), Action::Move(db), Some(pa), Some(pb)) => pa.offset(da) == pb.offset(db),
        _ => false,
    }
}

// ============================================================================
// TACTICAL PREDICATES
// ============================================================================

/// The unit sits in the line of fire of both opposing units, neither of
/// which is reloading, and they cannot both be dodged. A unit that can hit
/// the opposing base this turn is never considered trapped.
pub fn cross_fire(state: &GameState, unit: UnitId) -> bool {
    let Some(pos) = state.unit_pos(unit) else {
        return false;
    };
    let enemy_base = state.base(unit.side.opponent());
    if can_shoot_each_other(state, pos, enemy_base) && !state.just_fired(unit) {
        return false;
    }
    let (a, b) = (unit.counterpart(), unit.mirror());
    if units_can_shoot(state, unit, a)
        && units_can_shoot(state, unit, b)
        && !state.just_fired(a)
        && !state.just_fired(b)
    {
        if let (Some(pa), Some(pb)) = (state.unit_pos(a), state.unit_pos(b)) {
            return !(pa.x == pb.x || pa.y == pb.y);
        }
    }
    false
}

/// The unit is closer to its own base than its mirror is
pub fn can_defend(state: &GameState, unit: UnitId) -> bool {
    let base = state.base(unit.side);
    match (state.unit_pos(unit), state.unit_pos(unit.mirror())) {
        (Some(mine), Some(theirs)) => theirs.manhattan(base) > mine.manhattan(base),
        (Some(_), None) => true,
        (None, _) => false,
    }
}

/// No cell of the unit's lane on its own base row can be turned into a
/// firing position by the mirror unit faster than the unit can block it.
pub fn defensible(state: &mut GameState, unit: UnitId) -> bool {
    if !state.base_alive(unit.side) || !state.is_alive(unit) {
        return false;
    }
    let mirror = unit.mirror();
    if !state.is_alive(mirror) {
        return true;
    }
    state.ensure_paths(unit);
    state.ensure_paths(mirror);
    let (mine, theirs) = (state.cached_paths(unit), state.cached_paths(mirror));
    let board = state.board();

    let base = state.base(unit.side);
    let step = unit.lane().outward();
    let mut c = base.offset(step);
    let mut extra = 0;
    let mut closest = UNREACHABLE;
    while board.contains(c) {
        let i = board.index(c);
        let (dm, dt) = (mine.dist[i], theirs.dist[i]);
        if closest > dt.saturating_add(extra) && dm >= dt {
            return false;
        }
        closest = closest.min(dm);
        if board.get(c).contains(Item::Brick) {
            extra += 2;
        }
        c = c.offset(step);
    }

    // Guarding beside the base with an empty gun while the mirror can fire
    if let Some(pos) = state.unit_pos(unit) {
        if pos.y == base.y
            && (pos.x - base.x).abs() == 1
            && units_can_shoot(state, unit, mirror)
            && state.just_fired(unit)
            && !state.just_fired(mirror)
        {
            return false;
        }
    }
    true
}

/// Steps the unit must retreat along its duel line with the mirror before
/// some good attack direction branches off. [`CORNER_NONE`] if it never does
/// or the two are not aligned.
pub fn corner(state: &mut GameState, unit: UnitId) -> i32 {
    let (Some(pos), Some(enemy)) = (state.unit_pos(unit), state.unit_pos(unit.mirror())) else {
        return CORNER_NONE;
    };
    let Some(away) = enemy.direction_to(pos) else {
        return CORNER_NONE;
    };
    state.ensure_paths(unit);
    let paths = state.cached_paths(unit);
    let board = state.board();

    let mut c = pos;
    let mut steps = 0;
    while board.contains(c) {
        let branches = board
            .neighbors(c)
            .any(|(dir, _)| dir != away && paths.is_good_dir(board, c, dir));
        if branches {
            return steps;
        }
        steps += 1;
        c = c.offset(away);
    }
    CORNER_NONE
}

// ============================================================================
// EVALUATION
// ============================================================================

/// Score the position for `unit` against its mirror. Positive is good.
pub fn estimate_attack(state: &mut GameState, unit: UnitId, heuristics: &Heuristics) -> i32 {
    if !state.is_alive(unit) {
        return -DOOMED_SCORE;
    }
    let mirror = unit.mirror();
    let mine = state.paths(unit).attack;
    if !state.is_alive(mirror) {
        return DOOMED_SCORE - mine;
    }
    let theirs = state.paths(mirror).attack;
    let lead = theirs - mine;

    if !can_defend(state, unit) {
        return heuristics.open_race_weight * lead;
    }

    let mut score = heuristics.race_weight * lead + heuristics.tempo_weight * (heuristics.tempo_horizon - mine);
    if defensible(state, unit) {
        score += heuristics.defensible_bonus;
    }
    if units_can_shoot(state, unit, mirror) && linked(state, unit, mirror) {
        let advantage = (corner(state, mirror) - corner(state, unit)).clamp(-10, 10);
        score += heuristics.corner_weight * advantage;
    }
    score
}

fn linked(state: &GameState, a: UnitId, b: UnitId) -> bool {
    match (state.unit_pos(a), state.unit_pos(b)) {
        (Some(pa), Some(pb)) => is_linked(state.board(), pa, pb),
        _ => false,
    }
}

/// One-ply score of `action` for `unit` with every other unit holding.
/// `None` if the action is not legal.
pub fn estimate_action(
    state: &mut GameState,
    unit: UnitId,
    action: Action,
    heuristics: &Heuristics,
) -> Option<i32> {
    if !state.action_is_valid(unit, action) {
        return None;
    }
    let round = Round::hold().with(unit, action);
    state
        .with_round(&round, |s| estimate_attack(s, unit, heuristics))
        .ok()
}

// ============================================================================
// CYCLE DETECTION
// ============================================================================

/// Predict `unit`'s next action when the whole game has settled into a
/// repeating loop: for some cycle length, the last four cycles destroyed
/// nothing, every unit repeated its actions with that period, and nobody
/// moved in net over the last cycle. The prediction may be illegal now;
/// callers must check it.
pub fn detect_cycle(state: &GameState, unit: UnitId) -> Option<Action> {
    let turn = state.turn() as usize;
    let record = |t: usize| state.record(t as u16);

    (1..=MAX_CYCLE).filter(|&cycle| turn > 4 * cycle).find_map(|cycle| {
        let window = 4 * cycle;
        let looping = UnitId::ALL.iter().all(|&u| {
            let quiet = (1..=window).all(|i| record(turn - i).is_some_and(|r| !r.shot_landed(u)));
            let periodic = (1..=window - cycle).all(|i| {
                let now = record(turn - i).map(|r| r.actions.get(u));
                let then = record(turn - i - cycle).map(|r| r.actions.get(u));
                now.is_some() && now == then
            });
            let still = net_displacement((1..=cycle).filter_map(|i| record(turn - i)), u) == (0, 0);
            quiet && periodic && still
        });
        looping
            .then(|| record(turn - cycle).map(|r| r.actions.get(unit)))
            .flatten()
    })
}

/// [`detect_cycle`] restricted to predictions that are legal right now
pub fn predicted_action(state: &GameState, unit: UnitId) -> Option<Action> {
    detect_cycle(state, unit).filter(|&action| state.action_is_valid(unit, action))
}

// ============================================================================
// TESTS
// ============================================================================
