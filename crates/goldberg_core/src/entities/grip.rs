//! Catch-and-hold state shared by ropes and magnetic levers

use goldberg_physics::{ConstraintKey, PhysicsWorld};

use crate::dynamic_world::EntityKey;
use crate::object::{ConstraintSet, EntityCommand, SimContext};

/// Arming state and the constraint holding a caught entity
#[derive(Debug)]
pub struct Grip {
    held: Option<(EntityKey, ConstraintKey)>,
    armed: bool,
    rearm_delay: f32,
}

impl Grip {
    pub fn new(rearm_delay: f32) -> Self {
        Self {
            held: None,
            armed: true,
            rearm_delay,
        }
    }

    pub fn held(&self) -> Option<EntityKey> {
        self.held.map(|(entity, _)| entity)
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }

    pub fn can_catch(&self) -> bool {
        self.armed && self.held.is_none()
    }

    pub fn rearm_delay(&self) -> f32 {
        self.rearm_delay
    }

    pub fn rearm(&mut self) {
        self.armed = true;
    }

    /// Record a catch made with `constraint`, which the owner already added
    ///
    /// The caught entity loses its wrap-around eligibility while held.
    pub fn hold(&mut self, ctx: &mut SimContext<'_>, entity: EntityKey, constraint: ConstraintKey) {
        self.held = Some((entity, constraint));
        self.armed = false;
        ctx.push(EntityCommand::SetTeleportable {
            entity,
            teleportable: false,
        });
    }

    /// Remove the holding constraint, leaving the grip disarmed
    pub fn release(&mut self, physics: &mut PhysicsWorld, constraints: &mut ConstraintSet) -> Option<EntityKey> {
        let (entity, constraint) = self.held.take()?;
        constraints.remove(physics, constraint);
        self.armed = false;
        Some(entity)
    }

    /// Forget the held entity without touching the world
    pub fn forget(&mut self) {
        self.held = None;
        self.armed = true;
    }
}
