//! Collision shapes
//!
//! Shapes are stored in body-local coordinates; the owning body supplies the
//! position and rotation when a world-space query is needed.

use goldberg_math::{Aabb2, Vec2};
use serde::{Deserialize, Serialize};

/// Shape of a rigid body, centered on the body origin
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum Shape {
    Circle { radius: f32 },
    /// Oriented rectangle described by its half width and half height
    Rect { half_extents: Vec2 },
}

impl Shape {
    /// Circle of the given radius
    pub fn circle(radius: f32) -> Self {
        Shape::Circle { radius }
    }

    /// Rectangle of the given full width and height
    pub fn rect(width: f32, height: f32) -> Self {
        Shape::Rect {
            half_extents: Vec2::new(width * 0.5, height * 0.5),
        }
    }

    /// Area of the shape
    pub fn area(&self) -> f32 {
        match *self {
            Shape::Circle { radius } => std::f32::consts::PI * radius * radius,
            Shape::Rect { half_extents } => 4.0 * half_extents.x * half_extents.y,
        }
    }

    /// Rotational inertia of the shape for the given mass
    pub fn inertia(&self, mass: f32) -> f32 {
        match *self {
            Shape::Circle { radius } => 0.5 * mass * radius * radius,
            Shape::Rect { half_extents } => {
                let w = half_extents.x * 2.0;
                let h = half_extents.y * 2.0;
                mass * (w * w + h * h) / 12.0
            }
        }
    }

    /// World-space corners of a rectangle, counter-clockwise. Empty for circles.
    pub fn corners(&self, position: Vec2, angle: f32) -> Vec<Vec2> {
        match *self {
            Shape::Circle { .. } => Vec::new(),
            Shape::Rect { half_extents: h } => [
                Vec2::new(-h.x, -h.y),
                Vec2::new(h.x, -h.y),
                Vec2::new(h.x, h.y),
                Vec2::new(-h.x, h.y),
            ]
            .iter()
            .map(|c| position + c.rotated(angle))
            .collect(),
        }
    }

    /// Axis-aligned box enclosing the shape at the given pose
    pub fn aabb(&self, position: Vec2, angle: f32) -> Aabb2 {
        match *self {
            Shape::Circle { radius } => {
                Aabb2::from_center_half_extents(position, Vec2::new(radius, radius))
            }
            Shape::Rect { half_extents } => {
                let (sin, cos) = angle.sin_cos();
                let extent = Vec2::new(
                    half_extents.x * cos.abs() + half_extents.y * sin.abs(),
                    half_extents.x * sin.abs() + half_extents.y * cos.abs(),
                );
                Aabb2::from_center_half_extents(position, extent)
            }
        }
    }
}
