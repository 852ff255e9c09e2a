//! Error types for game orchestration

use std::fmt;

use thiserror::Error;

use crate::entities::EntityTag;
use crate::game::GameState;

/// A precondition of the Preparing to Running transition
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunGuard {
    NoLevel,
    NoCollectible,
    NoGoal,
    /// Two distinct entities overlap
    Overlap,
}

impl fmt::Display for RunGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            RunGuard::NoLevel => "a level must be loaded",
            RunGuard::NoCollectible => "the level needs at least one collectible",
            RunGuard::NoGoal => "the level needs at least one goal",
            RunGuard::Overlap => "entities must not overlap",
        };
        f.write_str(text)
    }
}

/// What an operation expected of the game state
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Requirement {
    State(GameState),
    NotState(GameState),
    Guard(RunGuard),
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Requirement::State(state) => write!(f, "state {}", state),
            Requirement::NotState(state) => write!(f, "any state but {}", state),
            Requirement::Guard(guard) => write!(f, "{}", guard),
        }
    }
}

/// Errors returned by [`crate::GoldbergGame`]
#[derive(Debug, Error, Clone, PartialEq)]
pub enum GameError {
    #[error("operation requires {required} (current state: {actual})")]
    StateViolation { required: Requirement, actual: GameState },
    #[error("{0} cannot be placed as a gameplay entity")]
    NotPlaceable(EntityTag),
    #[error("no {0} left in the inventory")]
    OutOfStock(EntityTag),
    #[error("entity is not part of the game")]
    UnknownEntity,
    #[error("no entity is being dragged")]
    NoDraggedEntity,
}
