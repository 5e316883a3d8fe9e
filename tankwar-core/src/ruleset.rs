//! RuleSet - rule variant knobs and terrain layout decoding

use crate::board::{Board, Coord, Item};
use crate::game::{Side, UnitId};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Number of terrain fields per layer
const FIELDS: i32 = 3;

/// Rows covered by one terrain field
fn rows_per_field(height: i32) -> i32 {
    (height + FIELDS - 1) / FIELDS
}

/// Rule variant. The engines this replaces only differed in these knobs.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleSet {
    pub name: String,
    pub width: i32,
    pub height: i32,
    /// The game is drawn once the turn counter exceeds this
    pub max_turn: u16,
    /// Whether the water layer exists at all
    pub water: bool,
    /// Whether water stops shots (it never stops them in the standard rules)
    pub water_blocks_fire: bool,
}

impl Default for RuleSet {
    fn default() -> Self {
        Self {
            name: "standard".to_string(),
            width: 9,
            height: 9,
            max_turn: 100,
            water: true,
            water_blocks_fire: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LayoutError {
    #[error("grid {width}x{height} cannot hold the bases and starting units")]
    GridTooSmall { width: i32, height: i32 },

    #[error("grid {width}x{height} does not fit three 32-bit terrain fields")]
    GridTooLarge { width: i32, height: i32 },

    #[error("{layer} field {index} has bits set outside the grid: {value:#x}")]
    StrayBits { layer: &'static str, index: usize, value: u32 },

    #[error("max_turn {0} leaves the turn counter no room to pass it")]
    TurnLimitTooHigh(u16),
}

impl RuleSet {
    /// Older variant without water and with a longer game
    pub fn bricks_only() -> Self {
        Self {
            name: "bricks-only".to_string(),
            max_turn: 105,
            water: false,
            ..Self::default()
        }
    }

    /// Check that the grid can be encoded and hosts the fixed start layout
    pub fn validate(&self) -> Result<(), LayoutError> {
        let (width, height) = (self.width, self.height);
        // Units start two columns either side of the base
        if width < 5 || height < 2 {
            return Err(LayoutError::GridTooSmall { width, height });
        }
        if self.bits_per_field() > 32 {
            return Err(LayoutError::GridTooLarge { width, height });
        }
        if self.max_turn == u16::MAX {
            return Err(LayoutError::TurnLimitTooHigh(self.max_turn));
        }
        Ok(())
    }

    fn bits_per_field(&self) -> i32 {
        rows_per_field(self.height) * self.width
    }

    /// Base cell of `side`
    pub fn base(&self, side: Side) -> Coord {
        match side {
            Side::Blue => Coord::new(self.width / 2, 0),
            Side::Red => Coord::new(self.width / 2, self.height - 1),
        }
    }

    /// Starting cell of a unit
    pub fn start(&self, unit: UnitId) -> Coord {
        let mid = self.width / 2;
        let x = match (unit.side, unit.slot) {
            (Side::Blue, 0) | (Side::Red, 1) => mid - 2,
            _ => mid + 2,
        };
        Coord::new(x, self.base(unit.side).y)
    }

    /// Load from JSON file
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read ruleset {}", path.display()))?;
        let rules: RuleSet = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse ruleset {}", path.display()))?;
        rules
            .validate()
            .with_context(|| format!("Invalid ruleset {}", path.display()))?;
        Ok(rules)
    }

    /// Save to JSON file
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write ruleset {}", path.display()))?;
        Ok(())
    }
}

// ============================================================================
// LAYOUT
// ============================================================================

/// Terrain as delivered by the host: one bitmask per layer, each field
/// covering a third of the rows. On the 9x9 grid bit `i` of field `f` is
/// cell `(i % 9, f * 3 + i / 9)`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Layout {
    pub brickfield: [u32; 3],
    #[serde(default)]
    pub waterfield: [u32; 3],
    #[serde(default)]
    pub steelfield: [u32; 3],
}

impl Layout {
    /// Load from JSON file
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read layout {}", path.display()))?;
        serde_json::from_str(&content).with_context(|| format!("Failed to parse layout {}", path.display()))
    }

    /// Decode terrain into a board. Bricks win over water, water over steel.
    /// Bases and units are placed afterwards by the game state.
    pub fn decode(&self, rules: &RuleSet) -> Result<Board, LayoutError> {
        rules.validate()?;
        let bits = rules.bits_per_field();
        let valid_mask = if bits >= 32 { u32::MAX } else { (1u32 << bits) - 1 };

        let layers: [(&'static str, &[u32; 3]); 3] = [
            ("brick", &self.brickfield),
            ("water", &self.waterfield),
            ("steel", &self.steelfield),
        ];
        for (layer, fields) in layers {
            for (index, &value) in fields.iter().enumerate() {
                if value & !valid_mask != 0 {
                    return Err(LayoutError::StrayBits { layer, index, value });
                }
            }
        }

        let rows = rows_per_field(rules.height);
        let mut board = Board::new(rules.width, rules.height);
        for field in 0..FIELDS as usize {
            for bit in 0..bits {
                let c = Coord::new(bit % rules.width, field as i32 * rows + bit / rules.width);
                if !board.contains(c) {
                    continue;
                }
                let mask = 1u32 << bit;
                let item = if self.brickfield[field] & mask != 0 {
                    Some(Item::Brick)
                } else if self.waterfield[field] & mask != 0 {
                    rules.water.then_some(Item::Water)
                } else if self.steelfield[field] & mask != 0 {
                    Some(Item::Steel)
                } else {
                    None
                };
                if let Some(item) = item {
                    board.get_mut(c).insert(item);
                }
            }
        }
        Ok(board)
    }

    /// Encode a board's terrain back into host fields
    pub fn encode(board: &Board) -> Self {
        let rows = rows_per_field(board.height());
        let mut layout = Layout::default();
        for c in board.coords() {
            let field = (c.y / rows) as usize;
            let mask = 1u32 << ((c.y % rows) * board.width() + c.x);
            let items = board.get(c);
            if items.contains(Item::Brick) {
                layout.brickfield[field] |= mask;
            } else if items.contains(Item::Water) {
                layout.waterfield[field] |= mask;
            } else if items.contains(Item::Steel) {
                layout.steelfield[field] |= mask;
            }
        }
        layout
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_positions() {
        let rules = RuleSet::default();
        assert_eq!(rules.base(Side::Blue), Coord::new(4, 0));
        assert_eq!(rules.base(Side::Red), Coord::new(4, 8));
        assert_eq!(rules.start(UnitId::new(Side::Blue, 0)), Coord::new(2, 0));
        assert_eq!(rules.start(UnitId::new(Side::Blue, 1)), Coord::new(6, 0));
        assert_eq!(rules.start(UnitId::new(Side::Red, 0)), Coord::new(6, 8));
        assert_eq!(rules.start(UnitId::new(Side::Red, 1)), Coord::new(2, 8));
    }

    #[test]
    fn test_decode_precedence() {
        let rules = RuleSet::default();
        // Cell (0,0) claimed by every layer, (1,0) by water and steel
        let layout = Layout {
            brickfield: [0b01, 0, 0],
            waterfield: [0b11, 0, 0],
            steelfield: [0b111, 0, 0],
        };
        let board = layout.decode(&rules).unwrap();
        assert!(board.get(Coord::new(0, 0)).contains(Item::Brick));
        assert!(board.get(Coord::new(0, 0)).is_single());
        assert!(board.get(Coord::new(1, 0)).contains(Item::Water));
        assert!(board.get(Coord::new(2, 0)).contains(Item::Steel));
    }

    #[test]
    fn test_decode_rows() {
        let rules = RuleSet::default();
        // Bit 9 of field 1 is the first cell of row 4
        let layout = Layout { brickfield: [0, 1 << 9, 0], ..Layout::default() };
        let board = layout.decode(&rules).unwrap();
        assert!(board.get(Coord::new(0, 4)).contains(Item::Brick));
        assert_eq!(Layout::encode(&board), layout);
    }

    #[test]
    fn test_stray_bits_rejected() {
        let rules = RuleSet::default();
        let layout = Layout { steelfield: [0, 0, 1 << 27], ..Layout::default() };
        assert!(matches!(
            layout.decode(&rules),
            Err(LayoutError::StrayBits { layer: "steel", index: 2, .. })
        ));
    }

    #[test]
    fn test_water_ignored_without_water_rules() {
        let rules = RuleSet::bricks_only();
        let layout = Layout { waterfield: [1, 0, 0], ..Layout::default() };
        let board = layout.decode(&rules).unwrap();
        assert!(board.get(Coord::new(0, 0)).is_empty());
    }

    #[test]
    fn test_validate_rejects_huge_grid() {
        let rules = RuleSet { width: 12, height: 9, ..RuleSet::default() };
        assert!(matches!(rules.validate(), Err(LayoutError::GridTooLarge { .. })));
    }

    #[test]
    fn test_validate_rejects_unreachable_turn_limit() {
        let rules = RuleSet { max_turn: u16::MAX, ..RuleSet::default() };
        assert_eq!(rules.validate(), Err(LayoutError::TurnLimitTooHigh(u16::MAX)));
        let rules = RuleSet { max_turn: u16::MAX - 1, ..RuleSet::default() };
        assert!(rules.validate().is_ok());
    }

    #[test]
    fn test_load_errors_name_the_file() {
        let dir = std::env::temp_dir();
        let missing = dir.join(format!("tankwar-missing-{}.json", std::process::id()));
        let err = RuleSet::load(&missing).unwrap_err();
        assert!(format!("{:#}", err).contains(&missing.display().to_string()));

        let path = dir.join(format!("tankwar-rules-{}.json", std::process::id()));
        let rules = RuleSet { max_turn: u16::MAX, ..RuleSet::default() };
        rules.save(&path).unwrap();
        let err = RuleSet::load(&path).unwrap_err();
        let message = format!("{:#}", err);
        let _ = std::fs::remove_file(&path);
        assert!(message.contains(&path.display().to_string()));
        assert!(message.contains("max_turn"));
    }

    #[test]
    fn test_save_then_load() {
        let path = std::env::temp_dir().join(format!("tankwar-bricks-{}.json", std::process::id()));
        RuleSet::bricks_only().save(&path).unwrap();
        let loaded = RuleSet::load(&path);
        let _ = std::fs::remove_file(&path);
        assert_eq!(loaded.unwrap(), RuleSet::bricks_only());
    }
}
