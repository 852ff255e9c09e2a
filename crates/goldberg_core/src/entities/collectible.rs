//! Coins the player must bring to a goal

use goldberg_physics::{CollisionFilter, MassType, PhysicsWorld, RigidBody2D, Shape};

use super::{object_parts, EntityTag};
use crate::dynamic_world::EntityKey;
use crate::object::{BodySet, CollideEvent, ComplexObject, ConstraintSet, SimContext};

pub const COIN_MASS: f32 = 0.0005;
pub const COIN_INERTIA: f32 = 0.003;
pub const COIN_RESTITUTION: f32 = 0.4;
pub const COIN_FRICTION: f32 = 0.3;
pub const COIN_ANGULAR_DAMPING: f32 = 0.5;

/// A single light, bouncy circle
#[derive(Debug)]
pub struct Collectible {
    radius: f32,
    bodies: BodySet,
    constraints: ConstraintSet,
    /// Goal this coin reached during the current run
    captured_by: Option<EntityKey>,
}

impl Collectible {
    pub fn new(radius: f32) -> Self {
        let mut bodies = BodySet::new();
        bodies.push(Self::default_body(radius));
        Self {
            radius,
            bodies,
            constraints: ConstraintSet::new(),
            captured_by: None,
        }
    }

    fn default_body(radius: f32) -> RigidBody2D {
        RigidBody2D::new_circle(radius)
            .with_mass_inertia(COIN_MASS, COIN_INERTIA)
            .with_restitution(COIN_RESTITUTION)
            .with_friction(COIN_FRICTION)
            .with_angular_damping(COIN_ANGULAR_DAMPING)
            .with_filter(CollisionFilter::collectible())
    }

    pub fn radius(&self) -> f32 {
        self.radius
    }

    pub fn captured_by(&self) -> Option<EntityKey> {
        self.captured_by
    }

    pub fn is_captured(&self) -> bool {
        self.captured_by.is_some()
    }

    /// Whether the coin can no longer move on its own
    pub fn is_immobile(&self, physics: &PhysicsWorld) -> bool {
        self.bodies
            .get(physics, 0)
            .map_or(true, |body| !body.active || !body.is_dynamic())
    }

    /// Zero the coin's velocity
    pub fn stop_movement(&mut self, physics: &mut PhysicsWorld) {
        self.bodies.for_each_mut(physics, |_, body| body.clear_motion());
    }

    /// Restore mass, activity and capture state as built
    pub fn reset_to_default(&mut self, physics: &mut PhysicsWorld) {
        let scale = self.bodies.natural_gravity_scale(0);
        let template = Self::default_body(self.radius);
        if let Some(body) = self.bodies.get_mut(physics, 0) {
            body.mass = MassType::Normal {
                mass: COIN_MASS,
                inertia: COIN_INERTIA,
            };
            body.material = template.material;
            body.active = true;
            body.gravity_scale = scale;
            body.clear_motion();
            body.clear_forces();
        }
        self.captured_by = None;
    }
}

impl ComplexObject for Collectible {
    object_parts!();

    fn on_dynamic_collide_begin(&mut self, event: &CollideEvent, _ctx: &mut SimContext<'_>) {
        if let Some(goal) = event.partner_of(EntityTag::Goal) {
            log::debug!("collectible captured by goal {:?}", goal.key);
            self.captured_by = Some(goal.key);
        }
    }
}

/// Immobilize a collectible body in place: no motion, infinite mass
pub(crate) fn pin_body(body: &mut RigidBody2D) {
    body.clear_motion();
    body.clear_forces();
    body.mass = MassType::Infinite;
}

/// Shape radius of a collectible body
pub(crate) fn body_radius(body: &RigidBody2D) -> f32 {
    match body.shape {
        Shape::Circle { radius } => radius,
        Shape::Rect { half_extents } => half_extents.length(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use goldberg_math::Vec2;

    #[test]
    fn test_coin_body() {
        let physics = PhysicsWorld::new();
        let coin = Collectible::new(0.4);
        let body = coin.bodies().get(&physics, 0).unwrap();
        assert_eq!(body.mass, MassType::Normal { mass: COIN_MASS, inertia: COIN_INERTIA });
        assert_eq!(body.material.restitution, COIN_RESTITUTION);
        assert_eq!(body_radius(body), 0.4);
        assert!(!coin.is_immobile(&physics));
    }

    #[test]
    fn test_reset_restores_defaults() {
        let mut physics = PhysicsWorld::new();
        let mut coin = Collectible::new(0.4);
        coin.initialize_in_world(&mut physics);
        let key = coin.bodies().key(0).unwrap();
        {
            let body = physics.get_body_mut(key).unwrap();
            pin_body(body);
            body.active = false;
            body.velocity = Vec2::new(3.0, 0.0);
        }
        assert!(coin.is_immobile(&physics));

        coin.reset_to_default(&mut physics);
        let body = physics.get_body(key).unwrap();
        assert!(body.active);
        assert!(body.is_dynamic());
        assert_eq!(body.velocity, Vec2::ZERO);
        assert!(!coin.is_captured());
    }
}
