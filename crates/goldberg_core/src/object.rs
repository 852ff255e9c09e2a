//! The contract shared by every simulated game entity
//!
//! A complex object owns an ordered list of bodies and constraints. Bodies
//! live inside the object until it is initialized into a physics world, at
//! which point they move into the world and the object keeps their keys.
//! Removing the object moves them back out, so the same value can be added
//! again later.

use bitflags::bitflags;
use goldberg_math::{Aabb2, Vec2};
use goldberg_physics::{BodyKey, Constraint, ConstraintKey, PhysicsWorld, RigidBody2D};
use serde::{Deserialize, Serialize};

use crate::dynamic_world::EntityKey;
use crate::entities::EntityTag;

bitflags! {
    /// Flags indicating which parts of an entity changed during `update`
    ///
    /// Consumers (rendering, UI) use them to refresh only what moved.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct DirtyFlags: u8 {
        /// Position or rotation changed
        const POSE = 1 << 0;
        /// Derived geometry changed (rope length, spring compression)
        const SHAPE = 1 << 1;
        /// Gameplay state changed (captured, armed, locked)
        const STATE = 1 << 2;
        const ALL = Self::POSE.bits() | Self::SHAPE.bits() | Self::STATE.bits();
    }
}

/// Position and orientation of a body or entity
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    pub position: Vec2,
    pub angle: f32,
}

impl Pose {
    pub fn new(position: Vec2, angle: f32) -> Self {
        Self { position, angle }
    }

    fn of(body: &RigidBody2D) -> Self {
        Self::new(body.position, body.angle)
    }
}

#[derive(Debug)]
enum BodySlot {
    Detached(RigidBody2D),
    Attached(BodyKey),
}

/// Ordered bodies owned by an entity
///
/// Each slot holds either the body itself (not yet in a world) or its key in
/// the world. Index 0 is the primary body that defines the entity pose.
#[derive(Debug, Default)]
pub struct BodySet {
    slots: Vec<BodySlot>,
    /// Gravity scale each body returns to when made mobile again
    gravity_scales: Vec<f32>,
}

impl BodySet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a body and return its index
    pub fn push(&mut self, body: RigidBody2D) -> usize {
        self.gravity_scales.push(body.gravity_scale);
        self.slots.push(BodySlot::Detached(body));
        self.slots.len() - 1
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// True when every body lives in a world
    pub fn is_attached(&self) -> bool {
        !self.slots.is_empty() && self.slots.iter().all(|s| matches!(s, BodySlot::Attached(_)))
    }

    /// World key of the body at `index`, if attached
    pub fn key(&self, index: usize) -> Option<BodyKey> {
        match self.slots.get(index)? {
            BodySlot::Attached(key) => Some(*key),
            BodySlot::Detached(_) => None,
        }
    }

    /// Keys of all attached bodies, in order
    pub fn keys(&self) -> Vec<BodyKey> {
        (0..self.slots.len()).filter_map(|i| self.key(i)).collect()
    }

    pub fn index_of(&self, key: BodyKey) -> Option<usize> {
        self.slots
            .iter()
            .position(|s| matches!(s, BodySlot::Attached(k) if *k == key))
    }

    pub fn contains(&self, key: BodyKey) -> bool {
        self.index_of(key).is_some()
    }

    pub fn natural_gravity_scale(&self, index: usize) -> f32 {
        self.gravity_scales.get(index).copied().unwrap_or(1.0)
    }

    pub fn get<'a>(&'a self, physics: &'a PhysicsWorld, index: usize) -> Option<&'a RigidBody2D> {
        match self.slots.get(index)? {
            BodySlot::Detached(body) => Some(body),
            BodySlot::Attached(key) => physics.get_body(*key),
        }
    }

    pub fn get_mut<'a>(&'a mut self, physics: &'a mut PhysicsWorld, index: usize) -> Option<&'a mut RigidBody2D> {
        match self.slots.get_mut(index)? {
            BodySlot::Detached(body) => Some(body),
            BodySlot::Attached(key) => physics.get_body_mut(*key),
        }
    }

    /// Run `f` on every body in order
    pub fn for_each_mut(&mut self, physics: &mut PhysicsWorld, mut f: impl FnMut(usize, &mut RigidBody2D)) {
        for index in 0..self.slots.len() {
            if let Some(body) = self.get_mut(physics, index) {
                f(index, body);
            }
        }
    }

    /// Move every detached body into the world
    ///
    /// Bodies already attached are left alone, so calling this twice adds
    /// nothing the second time. Returns the keys added by this call.
    pub fn attach(&mut self, physics: &mut PhysicsWorld) -> Vec<BodyKey> {
        let mut added = Vec::new();
        for slot in &mut self.slots {
            if let BodySlot::Detached(_) = slot {
                let BodySlot::Detached(body) = std::mem::replace(slot, BodySlot::Attached(BodyKey::default())) else {
                    continue;
                };
                let key = physics.add_body(body);
                *slot = BodySlot::Attached(key);
                added.push(key);
            }
        }
        added
    }

    /// Move every attached body back out of the world
    ///
    /// A body that vanished from the world is replaced by nothing; its slot
    /// is dropped.
    pub fn detach(&mut self, physics: &mut PhysicsWorld) {
        let mut kept = Vec::with_capacity(self.slots.len());
        let mut scales = Vec::with_capacity(self.slots.len());
        for (slot, scale) in self.slots.drain(..).zip(self.gravity_scales.drain(..)) {
            match slot {
                BodySlot::Attached(key) => {
                    if let Some(body) = physics.remove_body(key) {
                        kept.push(BodySlot::Detached(body));
                        scales.push(scale);
                    } else {
                        log::warn!("body {:?} was removed behind its owner's back", key);
                    }
                }
                detached => {
                    kept.push(detached);
                    scales.push(scale);
                }
            }
        }
        self.slots = kept;
        self.gravity_scales = scales;
    }
}

/// Constraints owned by an entity, by world key
#[derive(Debug, Default)]
pub struct ConstraintSet {
    keys: Vec<ConstraintKey>,
}

impl ConstraintSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a constraint to the world and remember it
    pub fn add(&mut self, physics: &mut PhysicsWorld, constraint: Constraint) -> ConstraintKey {
        let key = physics.add_constraint(constraint);
        self.keys.push(key);
        key
    }

    /// Remove one owned constraint from the world
    pub fn remove(&mut self, physics: &mut PhysicsWorld, key: ConstraintKey) -> bool {
        let Some(index) = self.keys.iter().position(|k| *k == key) else {
            return false;
        };
        self.keys.remove(index);
        physics.remove_constraint(key).is_some()
    }

    /// Remove every owned constraint from the world
    pub fn detach_all(&mut self, physics: &mut PhysicsWorld) {
        for key in self.keys.drain(..) {
            physics.remove_constraint(key);
        }
    }

    pub fn keys(&self) -> &[ConstraintKey] {
        &self.keys
    }

    pub fn contains(&self, key: ConstraintKey) -> bool {
        self.keys.contains(&key)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// The other side of a collision
#[derive(Clone, Debug, PartialEq)]
pub struct Partner {
    pub key: EntityKey,
    pub tag: EntityTag,
    /// Partner bodies in their owner's order
    pub bodies: Vec<BodyKey>,
}

/// Payload handed to collision handlers
///
/// Every field is `None` for synthesized notifications such as the ones
/// fired on a mode change.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CollideEvent {
    /// Which of the receiver's bodies was touched
    pub own_body: Option<BodyKey>,
    pub partner: Option<Partner>,
    pub point: Option<Vec2>,
}

impl CollideEvent {
    /// Payload carrying no information
    pub fn empty() -> Self {
        Self::default()
    }

    /// The partner, when it is of the given kind
    pub fn partner_of(&self, tag: EntityTag) -> Option<&Partner> {
        self.partner.as_ref().filter(|p| p.tag == tag)
    }
}

/// Cross-entity requests raised by a handler, applied by the world afterwards
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum EntityCommand {
    SetTeleportable { entity: EntityKey, teleportable: bool },
}

/// Mutable simulation access for handlers
pub struct SimContext<'a> {
    pub physics: &'a mut PhysicsWorld,
    /// The entity whose handler is running
    pub entity: EntityKey,
    commands: Vec<EntityCommand>,
}

impl<'a> SimContext<'a> {
    pub fn new(physics: &'a mut PhysicsWorld, entity: EntityKey) -> Self {
        Self {
            physics,
            entity,
            commands: Vec::new(),
        }
    }

    pub fn push(&mut self, command: EntityCommand) {
        self.commands.push(command);
    }

    pub fn into_commands(self) -> Vec<EntityCommand> {
        self.commands
    }
}

/// Capability every simulated game entity implements
pub trait ComplexObject {
    fn bodies(&self) -> &BodySet;
    fn bodies_mut(&mut self) -> &mut BodySet;
    fn constraints(&self) -> &ConstraintSet;
    fn constraints_mut(&mut self) -> &mut ConstraintSet;

    /// Create the structural constraints once the bodies are in the world
    fn build_constraints(&mut self, _physics: &mut PhysicsWorld) {}

    /// Add owned bodies and constraints to the world
    ///
    /// Parts already in the world are ignored.
    fn initialize_in_world(&mut self, physics: &mut PhysicsWorld) {
        self.bodies_mut().attach(physics);
        if self.constraints().is_empty() {
            self.build_constraints(physics);
        }
    }

    /// Take owned constraints and bodies back out of the world
    fn remove_from_world(&mut self, physics: &mut PhysicsWorld) {
        detach_parts(self, physics);
    }

    /// Move the entity so its primary body sits at `(x, y)`
    ///
    /// Other bodies keep their offset from the primary body.
    fn translate(&mut self, physics: &mut PhysicsWorld, x: f32, y: f32) {
        let Some(origin) = self.bodies().get(physics, 0).map(|b| b.position) else {
            return;
        };
        let delta = Vec2::new(x, y) - origin;
        self.bodies_mut().for_each_mut(physics, |_, body| body.position += delta);
    }

    /// Rotate the entity to the absolute angle `theta` around its primary body
    fn rotate(&mut self, physics: &mut PhysicsWorld, theta: f32) {
        let Some(primary) = self.bodies().get(physics, 0).map(Pose::of) else {
            return;
        };
        let delta = theta - primary.angle;
        self.bodies_mut().for_each_mut(physics, |_, body| {
            body.position = primary.position + (body.position - primary.position).rotated(delta);
            body.angle += delta;
        });
    }

    fn apply_force(&mut self, physics: &mut PhysicsWorld, force: Vec2) {
        self.bodies_mut().for_each_mut(physics, |_, body| body.apply_force(force));
    }

    /// Sync derived state from the physics state, once per tick
    fn update(&mut self, _physics: &PhysicsWorld) -> DirtyFlags {
        DirtyFlags::empty()
    }

    /// True when no owned body touches `bounds`
    fn is_outside_bounds(&self, physics: &PhysicsWorld, bounds: &Aabb2) -> bool {
        let bodies = self.bodies();
        (0..bodies.len())
            .filter_map(|i| bodies.get(physics, i))
            .all(|body| !bounds.intersects(&body.aabb()))
    }

    /// Freeze (zero velocity, no gravity) or unfreeze the entity
    fn set_mobile(&mut self, physics: &mut PhysicsWorld, mobile: bool) {
        let scales: Vec<f32> = (0..self.bodies().len())
            .map(|i| self.bodies().natural_gravity_scale(i))
            .collect();
        self.bodies_mut().for_each_mut(physics, |index, body| {
            if mobile {
                body.active = true;
                body.gravity_scale = scales[index];
            } else {
                body.clear_motion();
                body.gravity_scale = 0.0;
            }
        });
    }

    fn position(&self, physics: &PhysicsWorld) -> Vec2 {
        self.bodies().get(physics, 0).map(|b| b.position).unwrap_or_default()
    }

    fn angle(&self, physics: &PhysicsWorld) -> f32 {
        self.bodies().get(physics, 0).map(|b| b.angle).unwrap_or_default()
    }

    fn pose(&self, physics: &PhysicsWorld) -> Pose {
        Pose::new(self.position(physics), self.angle(physics))
    }

    /// Pose of every owned body, in order
    fn body_poses(&self, physics: &PhysicsWorld) -> Vec<Pose> {
        let bodies = self.bodies();
        (0..bodies.len())
            .filter_map(|i| bodies.get(physics, i))
            .map(Pose::of)
            .collect()
    }

    /// Put every owned body back at a saved pose, at rest
    fn restore_body_poses(&mut self, physics: &mut PhysicsWorld, poses: &[Pose]) {
        self.bodies_mut().for_each_mut(physics, |index, body| {
            if let Some(pose) = poses.get(index) {
                body.position = pose.position;
                body.angle = pose.angle;
                body.clear_motion();
            }
        });
    }

    /// World box enclosing every owned body
    fn aabb(&self, physics: &PhysicsWorld) -> Option<Aabb2> {
        let bodies = self.bodies();
        (0..bodies.len())
            .filter_map(|i| bodies.get(physics, i))
            .map(|b| b.aabb())
            .reduce(|a, b| a.union(&b))
    }

    fn on_dynamic_collide_begin(&mut self, _event: &CollideEvent, _ctx: &mut SimContext<'_>) {}
    fn on_dynamic_collide_end(&mut self, _event: &CollideEvent, _ctx: &mut SimContext<'_>) {}
    fn on_static_collide_begin(&mut self, _event: &CollideEvent, _ctx: &mut SimContext<'_>) {}
    fn on_static_collide_end(&mut self, _event: &CollideEvent, _ctx: &mut SimContext<'_>) {}
}

/// Default removal: constraints first, then bodies
pub fn detach_parts<T: ComplexObject + ?Sized>(object: &mut T, physics: &mut PhysicsWorld) {
    object.constraints_mut().detach_all(physics);
    object.bodies_mut().detach(physics);
}
