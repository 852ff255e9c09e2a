//! The pot of gold collectibles must reach

use goldberg_math::Vec2;
use goldberg_physics::{CollisionFilter, RigidBody2D};

use super::collectible::pin_body;
use super::{object_parts, EntityTag};
use crate::object::{BodySet, CollideEvent, ComplexObject, ConstraintSet, SimContext};

/// A static box that absorbs collectibles
#[derive(Debug)]
pub struct Goal {
    width: f32,
    height: f32,
    bodies: BodySet,
    constraints: ConstraintSet,
}

impl Goal {
    pub fn new(width: f32, height: f32) -> Self {
        let mut bodies = BodySet::new();
        bodies.push(RigidBody2D::new_static_rect(width, height).with_filter(CollisionFilter::static_world()));
        Self {
            width,
            height,
            bodies,
            constraints: ConstraintSet::new(),
        }
    }

    pub fn size(&self) -> Vec2 {
        Vec2::new(self.width, self.height)
    }
}

impl ComplexObject for Goal {
    object_parts!();

    /// Swallow a collectible: it stops, becomes unmovable, sits at the goal
    /// center and stops colliding
    fn on_dynamic_collide_begin(&mut self, event: &CollideEvent, ctx: &mut SimContext<'_>) {
        let Some(coin) = event.partner_of(EntityTag::Collectible) else {
            return;
        };
        let Some(center) = self.bodies.get(ctx.physics, 0).map(|b| b.position) else {
            return;
        };
        for &key in &coin.bodies {
            if let Some(body) = ctx.physics.get_body_mut(key) {
                pin_body(body);
                body.gravity_scale = 0.0;
                body.position = center;
                body.active = false;
            }
        }
        log::info!("goal reached by collectible {:?}", coin.key);
    }
}
