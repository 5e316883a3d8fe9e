//! Tankwar Core - Game engine and minimax AI
//!
//! This crate provides the core game logic for the two-side tank game:
//! - Grid geometry and per-cell occupancy bit-sets
//! - Rule variants and host terrain decoding
//! - Game state with simultaneous rounds and exact undo
//! - Terrain-weighted distances and attack routes
//! - Position evaluation and tactical predicates
//! - Alpha-beta minimax AI
//! - Host turn snapshots

pub mod board;
pub mod ruleset;
pub mod game;
pub mod path;
pub mod eval;
pub mod strategy;
pub mod ai;
pub mod protocol;

// Re-exports for convenient access
pub use board::{Board, CellItems, Coord, Direction, Item, DIRECTIONS};
pub use ruleset::{Layout, LayoutError, RuleSet};
pub use game::{Action, GameError, GameResult, GameState, Round, Side, UnitId, ACTIONS};
pub use path::{PathInfo, NO_ATTACK, UNREACHABLE};
pub use eval::{estimate_action, estimate_attack, Heuristics, WIN_SCORE};
pub use strategy::{Decision, SearchError, Strategy};
pub use ai::{MinimaxAI, MinimaxConfig};
pub use protocol::{SnapshotError, TurnInput, TurnOutput};
