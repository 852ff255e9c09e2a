//! 2D Physics simulation for the Goldberg game
//!
//! This crate provides a small rigid-body engine, including:
//! - Collision shapes (circles, oriented rectangles)
//! - Collision detection with layer filtering
//! - Rigid body dynamics with gravity, impulses and friction
//! - Constraints (revolute, rope, weld, spring)
//! - Contact lifecycle notifications (begin / persist / end) and
//!   out-of-bounds notifications through [`ContactListener`]

pub mod body;
pub mod collision;
pub mod constraint;
pub mod material;
pub mod shapes;
pub mod world;

// Re-export commonly used types
pub use body::{BodyKey, MassType, RigidBody2D};
pub use collision::{circle_vs_circle, circle_vs_rect, detect, rect_vs_rect, CollisionFilter, CollisionLayer, Contact};
pub use constraint::{Constraint, ConstraintKey, ConstraintKind};
pub use material::PhysicsMaterial;
pub use shapes::Shape;
pub use world::{ContactEvent, ContactListener, NoopListener, PhysicsConfig, PhysicsWorld};
