//! Rigid body types for 2D physics simulation

use crate::collision::CollisionFilter;
use crate::material::PhysicsMaterial;
use crate::shapes::Shape;
use goldberg_math::{Aabb2, Vec2};
use slotmap::new_key_type;

// Define generational key type for rigid bodies
new_key_type! {
    /// Key to a rigid body in the physics world
    ///
    /// Uses generational indexing: if a body is removed and its slot reused,
    /// old keys return None instead of pointing to the wrong body.
    pub struct BodyKey;
}

/// Mass configuration of a body
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum MassType {
    /// Finite mass, moved by forces, gravity and contacts
    Normal { mass: f32, inertia: f32 },
    /// Unmovable by forces or contacts; may still be moved explicitly
    Infinite,
}

impl MassType {
    /// Finite mass with the inertia derived from the shape
    pub fn from_shape(shape: &Shape, mass: f32) -> Self {
        MassType::Normal {
            mass,
            inertia: shape.inertia(mass),
        }
    }

    pub fn is_infinite(&self) -> bool {
        matches!(self, MassType::Infinite)
    }

    pub fn inverse_mass(&self) -> f32 {
        match *self {
            MassType::Normal { mass, .. } if mass > 0.0 => 1.0 / mass,
            _ => 0.0,
        }
    }

    pub fn inverse_inertia(&self) -> f32 {
        match *self {
            MassType::Normal { inertia, .. } if inertia > 0.0 => 1.0 / inertia,
            _ => 0.0,
        }
    }
}

/// A 2D rigid body with pose, velocity and collision shape
#[derive(Clone, Debug)]
pub struct RigidBody2D {
    /// Center position in world coordinates
    pub position: Vec2,
    /// Rotation in radians, counter-clockwise
    pub angle: f32,
    /// Linear velocity (meters per second)
    pub velocity: Vec2,
    /// Angular velocity (radians per second)
    pub angular_velocity: f32,
    pub mass: MassType,
    /// Multiplier applied to world gravity (0.0 = floating)
    pub gravity_scale: f32,
    /// Inactive bodies are neither integrated nor detected
    pub active: bool,
    pub shape: Shape,
    pub material: PhysicsMaterial,
    pub filter: CollisionFilter,
    pub linear_damping: f32,
    pub angular_damping: f32,
    /// Force accumulated since the last step
    pub force: Vec2,
    /// Torque accumulated since the last step
    pub torque: f32,
}

impl RigidBody2D {
    /// Create a body of unit density at the origin
    pub fn new(shape: Shape) -> Self {
        Self {
            position: Vec2::ZERO,
            angle: 0.0,
            velocity: Vec2::ZERO,
            angular_velocity: 0.0,
            mass: MassType::from_shape(&shape, shape.area()),
            gravity_scale: 1.0,
            active: true,
            shape,
            material: PhysicsMaterial::default(),
            filter: CollisionFilter::default(),
            linear_damping: 0.0,
            angular_damping: 0.0,
            force: Vec2::ZERO,
            torque: 0.0,
        }
    }

    /// Create a circular body
    pub fn new_circle(radius: f32) -> Self {
        Self::new(Shape::circle(radius))
    }

    /// Create a rectangular body from full width and height
    pub fn new_rect(width: f32, height: f32) -> Self {
        Self::new(Shape::rect(width, height))
    }

    /// Create an unmovable rectangle
    pub fn new_static_rect(width: f32, height: f32) -> Self {
        Self::new_rect(width, height).with_infinite_mass()
    }

    pub fn with_position(mut self, position: Vec2) -> Self {
        self.position = position;
        self
    }

    pub fn with_angle(mut self, angle: f32) -> Self {
        self.angle = angle;
        self
    }

    pub fn with_velocity(mut self, velocity: Vec2) -> Self {
        self.velocity = velocity;
        self
    }

    /// Set a finite mass, deriving inertia from the shape
    pub fn with_mass(mut self, mass: f32) -> Self {
        self.mass = MassType::from_shape(&self.shape, mass);
        self
    }

    /// Set a finite mass with an explicit rotational inertia
    pub fn with_mass_inertia(mut self, mass: f32, inertia: f32) -> Self {
        self.mass = MassType::Normal { mass, inertia };
        self
    }

    pub fn with_infinite_mass(mut self) -> Self {
        self.mass = MassType::Infinite;
        self
    }

    pub fn with_material(mut self, material: PhysicsMaterial) -> Self {
        self.material = material;
        self
    }

    pub fn with_friction(mut self, friction: f32) -> Self {
        self.material = self.material.with_friction(friction);
        self
    }

    pub fn with_restitution(mut self, restitution: f32) -> Self {
        self.material.restitution = restitution.clamp(0.0, 1.0);
        self
    }

    pub fn with_gravity_scale(mut self, scale: f32) -> Self {
        self.gravity_scale = scale;
        self
    }

    pub fn with_angular_damping(mut self, damping: f32) -> Self {
        self.angular_damping = damping.max(0.0);
        self
    }

    pub fn with_filter(mut self, filter: CollisionFilter) -> Self {
        self.filter = filter;
        self
    }

    /// True when the body has finite mass
    pub fn is_dynamic(&self) -> bool {
        !self.mass.is_infinite()
    }

    /// Inverse mass as seen by the solver (zero for infinite or inactive bodies)
    pub fn inverse_mass(&self) -> f32 {
        if self.active {
            self.mass.inverse_mass()
        } else {
            0.0
        }
    }

    pub fn inverse_inertia(&self) -> f32 {
        if self.active {
            self.mass.inverse_inertia()
        } else {
            0.0
        }
    }

    /// World-space bounding box at the current pose
    pub fn aabb(&self) -> Aabb2 {
        self.shape.aabb(self.position, self.angle)
    }

    /// Convert a body-local point to world space
    pub fn local_to_world(&self, local: Vec2) -> Vec2 {
        self.position + local.rotated(self.angle)
    }

    /// Convert a world point to body-local space
    pub fn world_to_local(&self, world: Vec2) -> Vec2 {
        (world - self.position).rotated(-self.angle)
    }

    /// Velocity of the body material at a world point
    pub fn velocity_at(&self, point: Vec2) -> Vec2 {
        self.velocity + Vec2::cross_scalar(self.angular_velocity, point - self.position)
    }

    /// Accumulate a force through the center of mass
    pub fn apply_force(&mut self, force: Vec2) {
        self.force += force;
    }

    /// Apply an impulse at a world point
    pub fn apply_impulse(&mut self, impulse: Vec2, point: Vec2) {
        let inv_mass = self.inverse_mass();
        if inv_mass == 0.0 {
            return;
        }
        self.velocity += impulse * inv_mass;
        self.angular_velocity += (point - self.position).cross(impulse) * self.inverse_inertia();
    }

    /// Zero linear and angular velocity
    pub fn clear_motion(&mut self) {
        self.velocity = Vec2::ZERO;
        self.angular_velocity = 0.0;
    }

    /// Zero accumulated force and torque
    pub fn clear_forces(&mut self) {
        self.force = Vec2::ZERO;
        self.torque = 0.0;
    }

    /// Apply a positional correction (e.g., from collision resolution)
    pub fn apply_correction(&mut self, correction: Vec2) {
        self.position += correction;
    }
}
