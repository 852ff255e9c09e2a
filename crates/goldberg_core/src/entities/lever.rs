//! Levers pivoting around a fixed anchor, optionally magnetic

use goldberg_math::Vec2;
use goldberg_physics::{CollisionFilter, Constraint, PhysicsMaterial, PhysicsWorld, RigidBody2D};

use super::{object_parts, EntityTag, Grip, Gripper};
use crate::dynamic_world::EntityKey;
use crate::object::{detach_parts, BodySet, CollideEvent, ComplexObject, ConstraintSet, SimContext};

pub const LEVER_MASS: f32 = 1000.0;
pub const LEVER_INERTIA: f32 = 0.001;
pub const ANCHOR_RADIUS: f32 = 0.05;
/// Seconds a magnetic lever stays disarmed after dropping what it held
pub const MAGNETIC_REARM_DELAY: f32 = 0.5;

/// A heavy plank on a revolute joint
///
/// Body 0 is the plank, body 1 the anchor it turns around.
#[derive(Debug)]
pub struct Lever {
    width: f32,
    height: f32,
    bodies: BodySet,
    constraints: ConstraintSet,
}

impl Lever {
    pub fn new(width: f32, height: f32) -> Self {
        Self::with_gravity_scale(width, height, 1.0)
    }

    fn with_gravity_scale(width: f32, height: f32, gravity_scale: f32) -> Self {
        let mut bodies = BodySet::new();
        bodies.push(
            RigidBody2D::new_rect(width, height)
                .with_mass_inertia(LEVER_MASS, LEVER_INERTIA)
                .with_material(PhysicsMaterial::new(0.2, 0.0))
                .with_gravity_scale(gravity_scale),
        );
        bodies.push(
            RigidBody2D::new_circle(ANCHOR_RADIUS)
                .with_infinite_mass()
                .with_filter(CollisionFilter::anchor()),
        );
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

impl ComplexObject for Lever {
    object_parts!();

    fn build_constraints(&mut self, physics: &mut PhysicsWorld) {
        let (Some(plank_key), Some(anchor_key)) = (self.bodies.key(0), self.bodies.key(1)) else {
            return;
        };
        let (Some(plank), Some(anchor)) = (physics.get_body(plank_key), physics.get_body(anchor_key)) else {
            return;
        };
        let joint = Constraint::revolute(anchor_key, anchor, plank_key, plank, anchor.position);
        self.constraints.add(physics, joint);
    }
}

/// A weightless lever that welds collectibles touching it
#[derive(Debug)]
pub struct MagneticLever {
    lever: Lever,
    grip: Grip,
}

impl MagneticLever {
    pub fn new(width: f32, height: f32) -> Self {
        Self {
            lever: Lever::with_gravity_scale(width, height, 0.0),
            grip: Grip::new(MAGNETIC_REARM_DELAY),
        }
    }

    pub fn lever(&self) -> &Lever {
        &self.lever
    }

    pub fn grip(&self) -> &Grip {
        &self.grip
    }
}

impl ComplexObject for MagneticLever {
    fn bodies(&self) -> &BodySet {
        &self.lever.bodies
    }

    fn bodies_mut(&mut self) -> &mut BodySet {
        &mut self.lever.bodies
    }

    fn constraints(&self) -> &ConstraintSet {
        &self.lever.constraints
    }

    fn constraints_mut(&mut self) -> &mut ConstraintSet {
        &mut self.lever.constraints
    }

    fn build_constraints(&mut self, physics: &mut PhysicsWorld) {
        self.lever.build_constraints(physics);
    }

    fn remove_from_world(&mut self, physics: &mut PhysicsWorld) {
        self.grip.forget();
        detach_parts(self, physics);
    }

    fn on_dynamic_collide_begin(&mut self, event: &CollideEvent, ctx: &mut SimContext<'_>) {
        if !self.grip.can_catch() {
            return;
        }
        let Some(coin) = event.partner_of(EntityTag::Collectible) else {
            return;
        };
        let (Some(plank_key), Some(&coin_key)) = (self.lever.bodies.key(0), coin.bodies.first()) else {
            return;
        };
        if event.own_body != Some(plank_key) {
            return;
        }
        let (Some(plank), Some(coin_body)) = (ctx.physics.get_body(plank_key), ctx.physics.get_body(coin_key)) else {
            return;
        };
        if !coin_body.is_dynamic() {
            return;
        }
        let anchor = event.point.unwrap_or(coin_body.position);
        let weld = Constraint::weld(plank_key, plank, coin_key, coin_body, anchor);
        let constraint = self.lever.constraints.add(ctx.physics, weld);
        self.grip.hold(ctx, coin.key, constraint);
        log::debug!("magnetic lever caught {:?}", coin.key);
    }
}

impl Gripper for MagneticLever {
    fn held(&self) -> Option<EntityKey> {
        self.grip.held()
    }

    fn can_catch(&self) -> bool {
        self.grip.can_catch()
    }

    fn release_held(&mut self, physics: &mut PhysicsWorld) -> Option<EntityKey> {
        self.grip.release(physics, &mut self.lever.constraints)
    }

    fn rearm(&mut self) {
        self.grip.rearm();
    }

    fn rearm_delay(&self) -> f32 {
        self.grip.rearm_delay()
    }
}
