//! Grid geometry and per-cell occupancy bit-sets

use serde::{Deserialize, Serialize};

/// Grid coordinates. Origin is the top-left cell, x grows right, y grows down.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Coord {
    pub x: i32,
    pub y: i32,
}

impl Coord {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Neighbor one step in `dir`
    pub fn offset(self, dir: Direction) -> Coord {
        let (dx, dy) = dir.vector();
        Coord::new(self.x + dx, self.y + dy)
    }

    /// Neighbor one step against `dir`
    pub fn back(self, dir: Direction) -> Coord {
        let (dx, dy) = dir.vector();
        Coord::new(self.x - dx, self.y - dy)
    }

    pub fn manhattan(self, other: Coord) -> i32 {
        (self.x - other.x).abs() + (self.y - other.y).abs()
    }

    /// Direction from `self` toward `other` when they share a row or column
    pub fn direction_to(self, other: Coord) -> Option<Direction> {
        if self.x == other.x {
            Some(if self.y < other.y { Direction::Down } else { Direction::Up })
        } else if self.y == other.y {
            Some(if self.x < other.x { Direction::Right } else { Direction::Left })
        } else {
            None
        }
    }
}

/// The four grid directions, in host encoding order
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Up = 0,
    Right = 1,
    Down = 2,
    Left = 3,
}

pub const DIRECTIONS: [Direction; 4] = [
    Direction::Up,
    Direction::Right,
    Direction::Down,
    Direction::Left,
];

impl Direction {
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<Direction> {
        DIRECTIONS.get(index).copied()
    }

    /// Unit vector (dx, dy)
    pub fn vector(self) -> (i32, i32) {
        match self {
            Direction::Up => (0, -1),
            Direction::Right => (1, 0),
            Direction::Down => (0, 1),
            Direction::Left => (-1, 0),
        }
    }

    pub fn opposite(self) -> Direction {
        DIRECTIONS[(self.index() + 2) % 4]
    }
}

// ============================================================================
// CELL CONTENTS
// ============================================================================

/// Everything that can sit in a cell. The declaration order is the order
/// destruction records are sorted in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Item {
    Brick,
    Steel,
    Base,
    Blue0,
    Blue1,
    Red0,
    Red1,
    Water,
}

pub const ITEMS: [Item; 8] = [
    Item::Brick,
    Item::Steel,
    Item::Base,
    Item::Blue0,
    Item::Blue1,
    Item::Red0,
    Item::Red1,
    Item::Water,
];

impl Item {
    fn bit(self) -> u8 {
        1 << (self as u8)
    }

    pub fn is_unit(self) -> bool {
        matches!(self, Item::Blue0 | Item::Blue1 | Item::Red0 | Item::Red1)
    }
}

const UNIT_MASK: u8 = (1 << Item::Blue0 as u8)
    | (1 << Item::Blue1 as u8)
    | (1 << Item::Red0 as u8)
    | (1 << Item::Red1 as u8);

/// Bit-set over [`Item`]. Several units may share a cell.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct CellItems(u8);

impl CellItems {
    pub const EMPTY: CellItems = CellItems(0);

    pub fn only(item: Item) -> Self {
        CellItems(item.bit())
    }

    pub fn contains(self, item: Item) -> bool {
        self.0 & item.bit() != 0
    }

    /// True if any of `items` is present
    pub fn contains_any(self, items: &[Item]) -> bool {
        items.iter().any(|&item| self.contains(item))
    }

    pub fn insert(&mut self, item: Item) {
        self.0 |= item.bit();
    }

    pub fn remove(&mut self, item: Item) {
        self.0 &= !item.bit();
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Exactly one flag set
    pub fn is_single(self) -> bool {
        self.0.count_ones() == 1
    }

    pub fn has_multiple_units(self) -> bool {
        (self.0 & UNIT_MASK).count_ones() > 1
    }

    pub fn has_unit(self) -> bool {
        self.0 & UNIT_MASK != 0
    }

    /// Only water, which shots pass through
    pub fn is_water_only(self) -> bool {
        self == CellItems::only(Item::Water)
    }

    pub fn items(self) -> impl Iterator<Item = Item> {
        ITEMS.into_iter().filter(move |&item| self.contains(item))
    }

    /// Unit flags only, in item order
    pub fn units(self) -> impl Iterator<Item = Item> {
        CellItems(self.0 & UNIT_MASK).items()
    }
}

impl std::fmt::Debug for CellItems {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.items()).finish()
    }
}

/// Terrain that blocks walking
pub const IMPASSABLE: [Item; 4] = [Item::Brick, Item::Steel, Item::Base, Item::Water];

// ============================================================================
// BOARD
// ============================================================================

/// Rectangular grid of [`CellItems`], row-major
#[derive(Clone, PartialEq, Eq)]
pub struct Board {
    width: i32,
    height: i32,
    cells: Vec<CellItems>,
}

impl Board {
    pub fn new(width: i32, height: i32) -> Self {
        Self {
            width,
            height,
            cells: vec![CellItems::EMPTY; (width * height) as usize],
        }
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn contains(&self, c: Coord) -> bool {
        c.x >= 0 && c.x < self.width && c.y >= 0 && c.y < self.height
    }

    /// Row-major index; caller guarantees `contains(c)`
    pub fn index(&self, c: Coord) -> usize {
        (c.y * self.width + c.x) as usize
    }

    pub fn coord(&self, index: usize) -> Coord {
        let i = index as i32;
        Coord::new(i % self.width, i / self.width)
    }

    pub fn get(&self, c: Coord) -> CellItems {
        self.cells[self.index(c)]
    }

    pub fn get_mut(&mut self, c: Coord) -> &mut CellItems {
        let i = self.index(c);
        &mut self.cells[i]
    }

    pub fn set(&mut self, c: Coord, items: CellItems) {
        let i = self.index(c);
        self.cells[i] = items;
    }

    /// On-board neighbors of `c` with the direction leading to each
    pub fn neighbors(&self, c: Coord) -> impl Iterator<Item = (Direction, Coord)> + '_ {
        DIRECTIONS
            .into_iter()
            .map(move |dir| (dir, c.offset(dir)))
            .filter(|&(_, n)| self.contains(n))
    }

    pub fn coords(&self) -> impl Iterator<Item = Coord> + '_ {
        (0..self.cells.len()).map(|i| self.coord(i))
    }
}

impl std::fmt::Debug for Board {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for y in 0..self.height {
            for x in 0..self.width {
                let items = self.get(Coord::new(x, y));
                let glyph = if items.is_empty() {
                    '.'
                } else if items.has_multiple_units() {
                    '@'
                } else {
                    match items.items().next() {
                        Some(Item::Brick) => '#',
                        Some(Item::Steel) => '%',
                        Some(Item::Base) => '*',
                        Some(Item::Blue0) => 'b',
                        Some(Item::Blue1) => 'B',
                        Some(Item::Red0) => 'r',
                        Some(Item::Red1) => 'R',
                        Some(Item::Water) => 'W',
                        None => '.',
                    }
                };
                write!(f, "{glyph}")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
