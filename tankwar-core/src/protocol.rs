//! Host turn snapshots
//!
//! The host sends the whole game so far on every turn: a setup request with
//! the terrain and our side, then one opponent action pair per completed
//! round, alongside our own earlier responses. Replaying it rebuilds the
//! current state.

use crate::game::{Action, GameError, GameState, Round, Side};
use crate::ruleset::{Layout, RuleSet};
use crate::strategy::Decision;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("malformed snapshot JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("snapshot does not start with a setup request")]
    MissingSetup,

    #[error("side {0} is not 0 or 1")]
    BadSide(u8),

    #[error("request {index} is a second setup request")]
    UnexpectedSetup { index: usize },

    #[error("no response recorded for request {index}")]
    MissingResponse { index: usize },

    #[error("replaying round {round} failed: {source}")]
    Replay { round: usize, source: GameError },

    #[error(transparent)]
    Game(#[from] GameError),
}

/// Initial request: terrain plus our side
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Setup {
    #[serde(flatten)]
    pub layout: Layout,
    #[serde(rename = "mySide")]
    pub my_side: u8,
}

/// One entry of the host's request list
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Request {
    /// Opponent's actions for a completed round
    Actions([i32; 2]),
    Setup(Setup),
}

/// Everything the host sends for one turn
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnInput {
    pub requests: Vec<Request>,
    #[serde(default)]
    pub responses: Vec<[i32; 2]>,
    /// Opaque data the host carries between turns
    #[serde(default)]
    pub data: String,
    #[serde(default)]
    pub globaldata: String,
}

/// Answer for one turn
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnOutput {
    pub response: [i32; 2],
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub debug: String,
}

impl From<Decision> for TurnOutput {
    fn from(decision: Decision) -> Self {
        Self {
            response: decision.codes(),
            debug: decision.debug,
        }
    }
}

/// Rebuilt game ready for a decision
#[derive(Clone, Debug)]
pub struct Session {
    pub state: GameState,
    pub side: Side,
}

impl TurnInput {
    pub fn parse(json: &str) -> Result<Self, SnapshotError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Replay every completed round under `rules`
    pub fn replay(&self, rules: &RuleSet) -> Result<Session, SnapshotError> {
        let setup = match self.requests.first() {
            Some(Request::Setup(setup)) => setup,
            _ => return Err(SnapshotError::MissingSetup),
        };
        let side = Side::from_index(setup.my_side as usize).ok_or(SnapshotError::BadSide(setup.my_side))?;
        let mut state = GameState::new(rules.clone(), &setup.layout)?;

        for (index, request) in self.requests.iter().enumerate().skip(1) {
            let Request::Actions(theirs) = request else {
                return Err(SnapshotError::UnexpectedSetup { index });
            };
            let own = self
                .responses
                .get(index - 1)
                .ok_or(SnapshotError::MissingResponse { index })?;
            for code in own.iter().chain(theirs.iter()) {
                if !(-2..=7).contains(code) {
                    warn!(round = index, code, "unknown action code, treating as invalid");
                }
            }
            let round = Round::from_codes(side, *own, *theirs);
            state
                .apply_round(&round)
                .map_err(|source| SnapshotError::Replay { round: index, source })?;
        }
        Ok(Session { state, side })
    }
}

/// Host encoding of a unit's actions, for building snapshots
pub fn encode_pair(actions: [Action; 2]) -> [i32; 2] {
    actions.map(Action::code)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::{Coord, Item};
    use crate::game::UnitId;

    const SETUP: &str = r#"{"brickfield":[0,512,0],"waterfield":[0,0,0],"steelfield":[0,0,0],"mySide":1}"#;

    #[test]
    fn test_parse_setup_only() {
        let json = format!(r#"{{"requests":[{SETUP}],"responses":[]}}"#);
        let input = TurnInput::parse(&json).unwrap();
        let session = input.replay(&RuleSet::default()).unwrap();
        assert_eq!(session.side, Side::Red);
        assert_eq!(session.state.turn(), 1);
        assert!(session.state.board().get(Coord::new(0, 4)).contains(Item::Brick));
    }

    #[test]
    fn test_replay_rounds() {
        // We are Red. Round 1: we move Red0 up, Blue0 moves down.
        // Round 2: Red1 fires up at Blue0 standing in its column.
        let json = format!(
            r#"{{"requests":[{SETUP},[2,-1],[-1,-1]],"responses":[[0,-1],[-1,4]],"data":"","globaldata":""}}"#
        );
        let session = TurnInput::parse(&json)
            .unwrap()
            .replay(&RuleSet::default())
            .unwrap();
        let state = &session.state;
        assert_eq!(state.turn(), 3);
        assert_eq!(state.unit_pos(UnitId::new(Side::Red, 0)), Some(Coord::new(6, 7)));
        assert!(!state.is_alive(UnitId::new(Side::Blue, 0)));
    }

    #[test]
    fn test_missing_setup() {
        let input = TurnInput::parse(r#"{"requests":[[0,0]]}"#).unwrap();
        assert!(matches!(
            input.replay(&RuleSet::default()),
            Err(SnapshotError::MissingSetup)
        ));
    }

    #[test]
    fn test_missing_response() {
        let json = format!(r#"{{"requests":[{SETUP},[-1,-1]],"responses":[]}}"#);
        let input = TurnInput::parse(&json).unwrap();
        assert!(matches!(
            input.replay(&RuleSet::default()),
            Err(SnapshotError::MissingResponse { index: 1 })
        ));
    }

    #[test]
    fn test_illegal_history_reported() {
        // Blue0 cannot move up off the board
        let json = format!(r#"{{"requests":[{SETUP},[0,-1]],"responses":[[-1,-1]]}}"#);
        let input = TurnInput::parse(&json).unwrap();
        assert!(matches!(
            input.replay(&RuleSet::default()),
            Err(SnapshotError::Replay { round: 1, .. })
        ));
    }

    #[test]
    fn test_bad_side() {
        let json = r#"{"requests":[{"brickfield":[0,0,0],"mySide":2}]}"#;
        let input = TurnInput::parse(json).unwrap();
        assert!(matches!(input.replay(&RuleSet::default()), Err(SnapshotError::BadSide(2))));
    }

    #[test]
    fn test_turn_output_json() {
        let out = TurnOutput {
            response: encode_pair([Action::Hold, Action::Fire(crate::board::Direction::Up)]),
            debug: String::new(),
        };
        assert_eq!(serde_json::to_string(&out).unwrap(), r#"{"response":[-1,4]}"#);
    }
}
