//! Terrain-weighted distances and attack routes
//!
//! Walking into an empty cell costs one turn. A brick can be shot and then
//! entered, which costs two. Steel, water, and bases cannot be crossed; a
//! base cell still receives a distance so it can be measured as a target.

use crate::board::{Board, Coord, Direction, Item, DIRECTIONS, IMPASSABLE};

/// Distance of a cell that cannot be reached
pub const UNREACHABLE: i32 = 1_000_000_000;

/// Attack distance reported when no firing line is reachable. Kept small
/// so evaluator arithmetic on it cannot overflow.
pub const NO_ATTACK: i32 = 200;

/// Cells entered without shooting first
const WALK_BLOCKERS: [Item; 3] = [Item::Brick, Item::Steel, Item::Water];

// ============================================================================
// DISTANCE MAP
// ============================================================================

/// Fill `dist` with the cost of reaching every cell from `origin`.
///
/// The queue is processed one distance level at a time. All one-step edges
/// leaving a level are relaxed before any brick edge leaving it, so the
/// queue stays sorted by distance and every cell is finalized on first
/// assignment.
pub fn distance_map(board: &Board, origin: Coord, dist: &mut [i32]) {
    dist.fill(UNREACHABLE);
    if !board.contains(origin) {
        return;
    }

    let mut queue = Vec::with_capacity(board.len());
    dist[board.index(origin)] = 0;
    queue.push(origin);

    let mut head = 0;
    while head < queue.len() {
        let level = dist[board.index(queue[head])];

        let mut i = head;
        while i < queue.len() && dist[board.index(queue[i])] == level {
            for (_, n) in board.neighbors(queue[i]) {
                let items = board.get(n);
                let slot = &mut dist[board.index(n)];
                if *slot != UNREACHABLE || items.contains_any(&WALK_BLOCKERS) {
                    continue;
                }
                *slot = level + 1;
                // Bases are targets, not corridors
                if !items.contains(Item::Base) {
                    queue.push(n);
                }
            }
            i += 1;
        }

        while head < queue.len() && dist[board.index(queue[head])] == level {
            for (_, n) in board.neighbors(queue[head]) {
                let items = board.get(n);
                let slot = &mut dist[board.index(n)];
                if *slot != UNREACHABLE
                    || !items.contains(Item::Brick)
                    || items.contains_any(&[Item::Steel, Item::Base, Item::Water])
                {
                    continue;
                }
                *slot = level + 2;
                queue.push(n);
            }
            head += 1;
        }
    }
}

/// Whether two cells are joined by open ground (no terrain and no base)
pub fn is_linked(board: &Board, from: Coord, to: Coord) -> bool {
    if !board.contains(from) || !board.contains(to) {
        return false;
    }
    let mut seen = vec![false; board.len()];
    let mut stack = vec![from];
    seen[board.index(from)] = true;
    while let Some(c) = stack.pop() {
        if c == to {
            return true;
        }
        for (_, n) in board.neighbors(c) {
            let i = board.index(n);
            if !seen[i] && !board.get(n).contains_any(&IMPASSABLE) {
                seen[i] = true;
                stack.push(n);
            }
        }
    }
    false
}

// ============================================================================
// PATH INFO
// ============================================================================

/// Per-unit distance data derived from the current board
#[derive(Clone, Debug)]
pub struct PathInfo {
    /// Cost to reach each cell
    pub dist: Vec<i32>,
    /// Turns needed to destroy the opposing base, capped at [`NO_ATTACK`]
    pub attack: i32,
    /// Cells on some shortest attack route
    pub good: Vec<bool>,
    /// Directions out of each cell that stay on a shortest attack route
    pub good_dirs: Vec<[bool; 4]>,
}

impl PathInfo {
    pub fn new(len: usize) -> Self {
        Self {
            dist: vec![UNREACHABLE; len],
            attack: NO_ATTACK,
            good: vec![false; len],
            good_dirs: vec![[false; 4]; len],
        }
    }

    /// Whether `dir` out of `c` stays on a shortest attack route
    pub fn is_good_dir(&self, board: &Board, c: Coord, dir: Direction) -> bool {
        self.good_dirs[board.index(c)][dir.index()]
    }

    /// Rebuild everything for a unit at `origin` attacking `target`.
    ///
    /// Firing lines are the two halves of the target's row and its column
    /// walking `into_field`. A brick on a line adds two turns to every cell
    /// beyond it; steel, water that stops shots, or another base closes it.
    /// A unit standing on a firing line with no shot available this turn
    /// pays one extra turn.
    pub fn recompute(
        &mut self,
        board: &Board,
        origin: Option<Coord>,
        target: Coord,
        into_field: Direction,
        rested: bool,
        water_blocks_fire: bool,
    ) {
        self.good.fill(false);
        self.good_dirs.fill([false; 4]);
        let Some(origin) = origin else {
            self.dist.fill(UNREACHABLE);
            self.attack = NO_ATTACK;
            return;
        };
        distance_map(board, origin, &mut self.dist);

        let lines = [Direction::Left, Direction::Right, into_field];
        let mut best = UNREACHABLE;
        for &dir in &lines {
            for (c, extra) in FiringLine::new(board, target, dir, water_blocks_fire) {
                best = best.min(self.dist[board.index(c)].saturating_add(extra));
            }
        }
        if best >= UNREACHABLE {
            self.attack = NO_ATTACK;
            return;
        }

        let penalty = i32::from(best == 0 && !rested);
        self.attack = (best + 1 + penalty).min(NO_ATTACK);

        let mut frontier = Vec::new();
        for &dir in &lines {
            for (c, extra) in FiringLine::new(board, target, dir, water_blocks_fire) {
                let i = board.index(c);
                if !self.good[i] && self.dist[i].saturating_add(extra) == best {
                    self.good[i] = true;
                    frontier.push(c);
                }
            }
        }
        self.trace_back(board, frontier);
    }

    /// Walk backwards from the best firing cells, marking each predecessor
    /// whose distance leads exactly into a good cell.
    fn trace_back(&mut self, board: &Board, mut frontier: Vec<Coord>) {
        let mut head = 0;
        while head < frontier.len() {
            let c = frontier[head];
            head += 1;
            let here = self.dist[board.index(c)];
            let step = if board.get(c).contains(Item::Brick) { 2 } else { 1 };
            for dir in DIRECTIONS {
                let n = c.back(dir);
                if !board.contains(n) {
                    continue;
                }
                let i = board.index(n);
                if self.dist[i] == UNREACHABLE
                    || here - self.dist[i] != step
                    || board.get(n).contains(Item::Base)
                {
                    continue;
                }
                self.good_dirs[i][dir.index()] = true;
                if !self.good[i] {
                    self.good[i] = true;
                    frontier.push(n);
                }
            }
        }
    }
}

/// Cells along one firing line of a base, with the extra turns needed to
/// clear the bricks between each cell and the base
struct FiringLine<'a> {
    board: &'a Board,
    cursor: Coord,
    dir: Direction,
    extra: i32,
    water_blocks_fire: bool,
}

impl<'a> FiringLine<'a> {
    fn new(board: &'a Board, target: Coord, dir: Direction, water_blocks_fire: bool) -> Self {
        Self {
            board,
            cursor: target,
            dir,
            extra: 0,
            water_blocks_fire,
        }
    }
}

impl Iterator for FiringLine<'_> {
    type Item = (Coord, i32);

    fn next(&mut self) -> Option<Self::Item> {
        let c = self.cursor.offset(self.dir);
        if !self.board.contains(c) {
            return None;
        }
        let items = self.board.get(c);
        let closed = items.contains_any(&[Item::Steel, Item::Base])
            || (self.water_blocks_fire && items.contains(Item::Water));
        if closed {
            return None;
        }
        let extra = self.extra;
        if items.contains(Item::Brick) {
            self.extra += 2;
        }
        self.cursor = c;
        Some((c, extra))
    }
}

// ============================================================================
// TESTS
// ============================================================================
