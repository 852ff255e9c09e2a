//! 2D Mathematics Library
//!
//! This crate provides the vector type shared by the Goldberg physics engine
//! and the game core.
//!
//! ## Core Types
//!
//! - [`Vec2`] - 2D vector with x, y components
//! - [`Aabb2`] - Axis-aligned box used for bounds tests

mod aabb;
mod vec2;

pub use aabb::Aabb2;
pub use vec2::Vec2;
