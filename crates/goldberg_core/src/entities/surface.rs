//! Single-body parts: plain surfaces, sticky walls and dominoes

use goldberg_physics::{CollisionFilter, PhysicsMaterial, RigidBody2D};

use super::collectible::pin_body;
use super::{object_parts, EntityTag};
use crate::object::{BodySet, CollideEvent, ComplexObject, ConstraintSet, SimContext};

pub const SURFACE_FRICTION: f32 = 0.2;
pub const DOMINO_WIDTH: f32 = 0.5;
pub const DOMINO_HEIGHT: f32 = 3.0;
pub const DOMINO_MASS: f32 = 0.001;
pub const DOMINO_INERTIA: f32 = 0.001;

fn static_box(width: f32, height: f32, material: PhysicsMaterial) -> BodySet {
    let mut bodies = BodySet::new();
    bodies.push(
        RigidBody2D::new_static_rect(width, height)
            .with_material(material)
            .with_filter(CollisionFilter::static_world()),
    );
    bodies
}

/// An unmovable box
#[derive(Debug)]
pub struct Surface {
    bodies: BodySet,
    constraints: ConstraintSet,
}

impl Surface {
    pub fn new(width: f32, height: f32, friction: f32) -> Self {
        Self {
            bodies: static_box(width, height, PhysicsMaterial::new(friction, 0.0)),
            constraints: ConstraintSet::new(),
        }
    }
}

impl ComplexObject for Surface {
    object_parts!();
}

/// An unmovable box that stops any collectible touching it
#[derive(Debug)]
pub struct StickySurface {
    bodies: BodySet,
    constraints: ConstraintSet,
}

impl StickySurface {
    pub fn new(width: f32, height: f32) -> Self {
        Self {
            bodies: static_box(width, height, PhysicsMaterial::STICKY),
            constraints: ConstraintSet::new(),
        }
    }
}

impl ComplexObject for StickySurface {
    object_parts!();

    fn on_dynamic_collide_begin(&mut self, event: &CollideEvent, ctx: &mut SimContext<'_>) {
        let Some(coin) = event.partner_of(EntityTag::Collectible) else {
            return;
        };
        for &key in &coin.bodies {
            if let Some(body) = ctx.physics.get_body_mut(key) {
                pin_body(body);
            }
        }
    }
}

/// A tall, light box that topples
#[derive(Debug)]
pub struct Domino {
    bodies: BodySet,
    constraints: ConstraintSet,
}

impl Domino {
    pub fn new() -> Self {
        let mut bodies = BodySet::new();
        bodies.push(RigidBody2D::new_rect(DOMINO_WIDTH, DOMINO_HEIGHT).with_mass_inertia(DOMINO_MASS, DOMINO_INERTIA));
        Self {
            bodies,
            constraints: ConstraintSet::new(),
        }
    }
}

impl Default for Domino {
    fn default() -> Self {
        Self::new()
    }
}

impl ComplexObject for Domino {
    object_parts!();
}
