//! Core types for the Goldberg puzzle game
//!
//! This crate builds the game on top of `goldberg_physics`:
//!
//! - [`ComplexObject`] - Contract of an entity made of bodies and constraints
//! - [`Entity`] - A game entity, one of the closed set of [`EntityKind`]s
//! - [`EntityFactory`] / [`EntityTemplate`] - Building entities from serializable specs
//! - [`DynamicWorld`] - Physics world adapter tracking entities and their contacts
//! - [`CollisionPairTracker`] - Unordered pairs of touching entities
//! - [`GoldbergGame`] - Build / prepare / run state machine
//! - [`EndOfGameWatcher`] - Periodic win/loss evaluation
//! - [`Level`], [`Planet`], [`Inventory`] - Level data

mod dynamic_world;
pub mod entities;
mod error;
mod factory;
mod game;
mod inventory;
mod level;
mod object;
mod pairs;
mod signal;
mod timers;
mod watcher;

pub use dynamic_world::{
    BoundEdge, BoundsKind, DynamicWorld, EntityKey, BOUNDS_THICKNESS, DEFAULT_BORDER_FRICTION, MIN_UPDATE_RATIO,
};
pub use entities::{Entity, EntityKind, EntityTag, Gripper};
pub use error::{GameError, Requirement, RunGuard};
pub use factory::{EntityFactory, EntitySpec, EntityTemplate};
pub use game::{GameSettings, GameState, GameView, GoldbergGame};
pub use inventory::{Inventory, InventoryItem, Quantity};
pub use level::{BorderType, Level, Planet, ANONYMOUS_CREATOR};
pub use object::{
    detach_parts, BodySet, CollideEvent, ComplexObject, ConstraintSet, DirtyFlags, EntityCommand, Partner, Pose,
    SimContext,
};
pub use pairs::{CollidingPair, CollisionPairTracker};
pub use signal::ModeSignal;
pub use timers::TimerQueue;
pub use watcher::{
    evaluate, CollectibleProbe, EndOfGameWatcher, Outcome, Verdict, WatchError, WatchSnapshot, WatchTimings,
    GRACE_PERIOD, STALL_TIMEOUT, WATCH_INTERVAL,
};

// Re-export physics types for convenient access through goldberg_core
pub use goldberg_math::{Aabb2, Vec2};
pub use goldberg_physics::{BodyKey, ConstraintKey, MassType, PhysicsConfig, PhysicsWorld, RigidBody2D};
