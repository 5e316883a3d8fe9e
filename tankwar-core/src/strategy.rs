//! Common interface of the search strategies

use crate::game::{Action, GameError, GameState, Side, UNITS_PER_SIDE};
use std::time::Instant;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SearchError {
    #[error("search deadline had already passed when the search started")]
    DeadlineElapsed,

    #[error(transparent)]
    Game(#[from] GameError),
}

/// Actions chosen for both units of a side
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Decision {
    pub actions: [Action; UNITS_PER_SIDE],
    /// Free-form diagnostics passed back to the host
    pub debug: String,
}

impl Decision {
    /// Host encoding of the two actions
    pub fn codes(&self) -> [i32; UNITS_PER_SIDE] {
        self.actions.map(Action::code)
    }
}

/// A player that picks one round's actions for its side.
///
/// Implementations mutate `state` while searching and must leave it exactly
/// as they found it.
pub trait Strategy {
    fn name(&self) -> &'static str;

    fn decide(
        &mut self,
        state: &mut GameState,
        side: Side,
        deadline: Instant,
    ) -> Result<Decision, SearchError>;
}
