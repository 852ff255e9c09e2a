//! A pendulum: a fixed top, a rope, and a magnetic bottom block

use std::f32::consts::{PI, TAU};

use goldberg_math::Vec2;
use goldberg_physics::{BodyKey, CollisionFilter, Constraint, ConstraintKey, ConstraintKind, PhysicsWorld, RigidBody2D};

use super::{object_parts, EntityTag, Grip, Gripper};
use crate::dynamic_world::EntityKey;
use crate::object::{detach_parts, BodySet, CollideEvent, ComplexObject, ConstraintSet, DirtyFlags, SimContext};

pub const TOP_WIDTH: f32 = 1.0;
pub const TOP_HEIGHT: f32 = 0.3;
pub const BOTTOM_WIDTH: f32 = 1.7;
pub const BOTTOM_HEIGHT: f32 = 1.5;
pub const BOTTOM_MASS: f32 = 0.0005;
pub const BOTTOM_INERTIA: f32 = 50000.0;
/// Seconds the bottom block stays disarmed after dropping what it held
pub const ROPE_REARM_DELAY: f32 = 1.5;

const TOP: usize = 0;
const BOTTOM: usize = 1;

/// Top anchor and bottom magnet joined by a rope of limited length
#[derive(Debug)]
pub struct Rope {
    height: f32,
    bodies: BodySet,
    constraints: ConstraintSet,
    rope: Option<ConstraintKey>,
    grip: Grip,
    /// Small-angle pendulum frequency, `sqrt(|g| / height)`
    angular_frequency: f32,
}

impl Rope {
    pub fn new(height: f32) -> Self {
        let mut bodies = BodySet::new();
        bodies.push(RigidBody2D::new_static_rect(TOP_WIDTH, TOP_HEIGHT).with_filter(CollisionFilter::static_world()));
        bodies.push(
            RigidBody2D::new_rect(BOTTOM_WIDTH, BOTTOM_HEIGHT)
                .with_mass_inertia(BOTTOM_MASS, BOTTOM_INERTIA)
                .with_angle(PI)
                .with_position(Vec2::new(0.0, -(height + BOTTOM_HEIGHT / 2.0))),
        );
        Self {
            height,
            bodies,
            constraints: ConstraintSet::new(),
            rope: None,
            grip: Grip::new(ROPE_REARM_DELAY),
            angular_frequency: 0.0,
        }
    }

    /// Rope length between the top and the bottom block
    pub fn height(&self) -> f32 {
        self.height
    }

    pub fn max_length(&self) -> f32 {
        self.height + BOTTOM_HEIGHT
    }

    pub fn angular_frequency(&self) -> f32 {
        self.angular_frequency
    }

    pub fn grip(&self) -> &Grip {
        &self.grip
    }

    /// Whether `key` is the bottom block that catches collectibles
    pub fn is_magnet(&self, key: BodyKey) -> bool {
        self.bodies.key(BOTTOM) == Some(key)
    }

    /// Polar angle of the bottom block around the top, in `[0, 2π)`
    ///
    /// Inverse of [`Rope::set_bottom_angle`], so the offset ellipse is undone first.
    pub fn bottom_angle(&self, physics: &PhysicsWorld) -> f32 {
        let (Some(top), Some(bottom)) = (self.bodies.get(physics, TOP), self.bodies.get(physics, BOTTOM)) else {
            return 3.0 * PI / 2.0;
        };
        let delta = bottom.position - top.position;
        if delta.length_squared() == 0.0 {
            return 3.0 * PI / 2.0;
        }
        let (rx, ry) = self.radii();
        (delta.y / ry).atan2(delta.x / rx).rem_euclid(TAU)
    }

    /// Semi-axes of the ellipse the bottom block is placed on
    fn radii(&self) -> (f32, f32) {
        (self.height + BOTTOM_WIDTH / 2.0, self.height + BOTTOM_HEIGHT / 2.0)
    }

    /// Put the bottom block at polar angle `theta` around the top
    pub fn set_bottom_angle(&mut self, physics: &mut PhysicsWorld, theta: f32) {
        let Some(top) = self.bodies.get(physics, TOP).map(|b| b.position) else {
            return;
        };
        let (rx, ry) = self.radii();
        let offset = Vec2::new(rx * theta.cos(), ry * theta.sin());
        if let Some(bottom) = self.bodies.get_mut(physics, BOTTOM) {
            bottom.position = top + offset;
            bottom.clear_motion();
        }
    }

    /// Change the rope length, keeping the bottom block's direction
    pub fn set_rope_height(&mut self, physics: &mut PhysicsWorld, height: f32) {
        let angle = self.bottom_angle(physics);
        self.height = height.max(0.0);
        let max_length = self.max_length();
        if let Some(ConstraintKind::Rope { max_length: limit, .. }) = self
            .rope
            .and_then(|key| physics.get_constraint_mut(key))
            .map(|c| &mut c.kind)
        {
            *limit = max_length;
        }
        self.set_bottom_angle(physics, angle);
    }
}

impl ComplexObject for Rope {
    object_parts!();

    fn build_constraints(&mut self, physics: &mut PhysicsWorld) {
        let (Some(top_key), Some(bottom_key)) = (self.bodies.key(TOP), self.bodies.key(BOTTOM)) else {
            return;
        };
        let (Some(top), Some(bottom)) = (physics.get_body(top_key), physics.get_body(bottom_key)) else {
            return;
        };
        let rope = Constraint::rope(
            top_key,
            top,
            top.position,
            bottom_key,
            bottom,
            bottom.position,
            self.height + BOTTOM_HEIGHT,
        )
        .with_collide_connected(true);
        self.rope = Some(self.constraints.add(physics, rope));
    }

    fn remove_from_world(&mut self, physics: &mut PhysicsWorld) {
        self.grip.forget();
        self.rope = None;
        detach_parts(self, physics);
    }

    /// The angle of a rope is the direction of its bottom block
    fn rotate(&mut self, physics: &mut PhysicsWorld, theta: f32) {
        self.set_bottom_angle(physics, theta);
    }

    fn angle(&self, physics: &PhysicsWorld) -> f32 {
        self.bottom_angle(physics)
    }

    fn update(&mut self, physics: &PhysicsWorld) -> DirtyFlags {
        let frequency = if self.height > 0.0 {
            (physics.gravity().y.abs() / self.height).sqrt()
        } else {
            0.0
        };
        if frequency != self.angular_frequency {
            self.angular_frequency = frequency;
            DirtyFlags::SHAPE
        } else {
            DirtyFlags::empty()
        }
    }

    /// The bottom block catches a moving collectible, hanging it just below
    fn on_dynamic_collide_begin(&mut self, event: &CollideEvent, ctx: &mut SimContext<'_>) {
        if !self.grip.can_catch() {
            return;
        }
        let Some(bottom_key) = self.bodies.key(BOTTOM) else {
            return;
        };
        if event.own_body != Some(bottom_key) {
            return;
        }
        let Some(coin) = event.partner_of(EntityTag::Collectible) else {
            return;
        };
        let Some(&coin_key) = coin.bodies.first() else {
            return;
        };
        let Some(center) = ctx.physics.get_body(bottom_key).map(|b| b.position) else {
            return;
        };
        match ctx.physics.get_body_mut(coin_key) {
            Some(body) if body.is_dynamic() => {
                let radius = super::collectible::body_radius(body);
                body.position = Vec2::new(center.x, center.y - BOTTOM_HEIGHT / 2.0 - radius / 2.0);
            }
            _ => return,
        }
        let (Some(bottom), Some(coin_body)) = (ctx.physics.get_body(bottom_key), ctx.physics.get_body(coin_key)) else {
            return;
        };
        let weld = Constraint::weld(bottom_key, bottom, coin_key, coin_body, center);
        let constraint = self.constraints.add(ctx.physics, weld);
        self.grip.hold(ctx, coin.key, constraint);
        log::debug!("rope caught {:?}", coin.key);
    }
}

impl Gripper for Rope {
    fn held(&self) -> Option<EntityKey> {
        self.grip.held()
    }

    fn can_catch(&self) -> bool {
        self.grip.can_catch()
    }

    fn release_held(&mut self, physics: &mut PhysicsWorld) -> Option<EntityKey> {
        self.grip.release(physics, &mut self.constraints)
    }

    fn rearm(&mut self) {
        self.grip.rearm();
    }

    fn rearm_delay(&self) -> f32 {
        self.grip.rearm_delay()
    }
}
