//! Physical material properties for collision response

use serde::{Deserialize, Serialize};

/// Physical material properties for collision response
///
/// Materials define how bodies interact during contact: friction (how much
/// they resist sliding) and restitution (bounciness).
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PhysicsMaterial {
    /// Friction coefficient (0.0 = ice). May exceed 1.0 for sticky surfaces.
    pub friction: f32,
    /// Restitution/bounciness (0.0 = no bounce, 1.0 = perfect bounce)
    pub restitution: f32,
}

impl Default for PhysicsMaterial {
    fn default() -> Self {
        Self {
            friction: 0.2,
            restitution: 0.0,
        }
    }
}

impl PhysicsMaterial {
    /// Coin-like material: light friction, some bounce
    pub const METAL: Self = Self {
        friction: 0.3,
        restitution: 0.4,
    };

    /// Wood-like material: moderate friction, low bounce
    pub const WOOD: Self = Self {
        friction: 0.5,
        restitution: 0.2,
    };

    /// Glue-like material: grips anything that touches it
    pub const STICKY: Self = Self {
        friction: f32::MAX,
        restitution: 0.0,
    };

    /// Create a new material
    ///
    /// Friction is clamped to be non-negative, restitution to `[0.0, 1.0]`.
    pub fn new(friction: f32, restitution: f32) -> Self {
        Self {
            friction: friction.max(0.0),
            restitution: restitution.clamp(0.0, 1.0),
        }
    }

    /// Same material with a different friction
    pub fn with_friction(mut self, friction: f32) -> Self {
        self.friction = friction.max(0.0);
        self
    }

    /// Combine two materials for collision response
    ///
    /// Uses geometric mean for friction and maximum for restitution
    /// (most bouncy surface wins).
    pub fn combine(&self, other: &Self) -> Self {
        let friction = if self.friction == f32::MAX || other.friction == f32::MAX {
            f32::MAX
        } else {
            (self.friction * other.friction).sqrt()
        };
        Self {
            friction,
            restitution: self.restitution.max(other.restitution),
        }
    }
}
