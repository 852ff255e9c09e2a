//! Game entities
//!
//! An [`Entity`] wraps one of the closed set of [`EntityKind`]s and adds the
//! bookkeeping every kind shares: teleport eligibility and dirty tracking.
//! The kinds implement [`ComplexObject`] themselves; `Entity` forwards the
//! contract to whichever kind it holds.

mod collectible;
mod goal;
mod grip;
mod lever;
mod rope;
mod spring;
mod surface;

use std::collections::BTreeSet;
use std::fmt;

use goldberg_math::{Aabb2, Vec2};
use goldberg_physics::PhysicsWorld;
use serde::{Deserialize, Serialize};

use crate::dynamic_world::EntityKey;
use crate::object::{BodySet, CollideEvent, ComplexObject, ConstraintSet, DirtyFlags, Pose, SimContext};

pub use collectible::Collectible;
pub use goal::Goal;
pub use grip::Grip;
pub use lever::{Lever, MagneticLever};
pub use rope::Rope;
pub use spring::Spring;
pub use surface::{Domino, StickySurface, Surface, SURFACE_FRICTION};

/// The kind of an entity, without its data
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EntityTag {
    Collectible,
    Goal,
    Surface,
    StickySurface,
    Lever,
    MagneticLever,
    Rope,
    Spring,
    Domino,
}

impl EntityTag {
    pub const ALL: [EntityTag; 9] = [
        EntityTag::Collectible,
        EntityTag::Goal,
        EntityTag::Surface,
        EntityTag::StickySurface,
        EntityTag::Lever,
        EntityTag::MagneticLever,
        EntityTag::Rope,
        EntityTag::Spring,
        EntityTag::Domino,
    ];

    /// Whether a player may place this kind while preparing a run
    pub fn is_placeable(&self) -> bool {
        !matches!(self, EntityTag::Collectible | EntityTag::Goal)
    }

    /// Whether the kind can be moved across wrap-around bounds by default
    pub fn default_teleportable(&self) -> bool {
        !matches!(self, EntityTag::Rope | EntityTag::Spring)
    }
}

impl fmt::Display for EntityTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Entities that can catch a collectible and hold it with a constraint
pub trait Gripper {
    /// The entity currently held, if any
    fn held(&self) -> Option<EntityKey>;

    /// Whether the next contact may catch something
    fn can_catch(&self) -> bool;

    /// Drop the held entity, removing the holding constraint
    ///
    /// Returns the released entity. The gripper stays disarmed until
    /// [`Gripper::rearm`] is called.
    fn release_held(&mut self, physics: &mut PhysicsWorld) -> Option<EntityKey>;

    fn rearm(&mut self);

    /// Seconds between a release and the automatic re-arm
    fn rearm_delay(&self) -> f32;
}

/// Data of each entity kind
#[derive(Debug)]
pub enum EntityKind {
    Collectible(Collectible),
    Goal(Goal),
    Surface(Surface),
    StickySurface(StickySurface),
    Lever(Lever),
    MagneticLever(MagneticLever),
    Rope(Rope),
    Spring(Spring),
    Domino(Domino),
}

impl EntityKind {
    pub fn tag(&self) -> EntityTag {
        match self {
            EntityKind::Collectible(_) => EntityTag::Collectible,
            EntityKind::Goal(_) => EntityTag::Goal,
            EntityKind::Surface(_) => EntityTag::Surface,
            EntityKind::StickySurface(_) => EntityTag::StickySurface,
            EntityKind::Lever(_) => EntityTag::Lever,
            EntityKind::MagneticLever(_) => EntityTag::MagneticLever,
            EntityKind::Rope(_) => EntityTag::Rope,
            EntityKind::Spring(_) => EntityTag::Spring,
            EntityKind::Domino(_) => EntityTag::Domino,
        }
    }

    fn object(&self) -> &dyn ComplexObject {
        match self {
            EntityKind::Collectible(o) => o,
            EntityKind::Goal(o) => o,
            EntityKind::Surface(o) => o,
            EntityKind::StickySurface(o) => o,
            EntityKind::Lever(o) => o,
            EntityKind::MagneticLever(o) => o,
            EntityKind::Rope(o) => o,
            EntityKind::Spring(o) => o,
            EntityKind::Domino(o) => o,
        }
    }

    fn object_mut(&mut self) -> &mut dyn ComplexObject {
        match self {
            EntityKind::Collectible(o) => o,
            EntityKind::Goal(o) => o,
            EntityKind::Surface(o) => o,
            EntityKind::StickySurface(o) => o,
            EntityKind::Lever(o) => o,
            EntityKind::MagneticLever(o) => o,
            EntityKind::Rope(o) => o,
            EntityKind::Spring(o) => o,
            EntityKind::Domino(o) => o,
        }
    }
}

/// A simulated game entity
#[derive(Debug)]
pub struct Entity {
    kind: EntityKind,
    teleportable: bool,
    dirty: DirtyFlags,
    last_pose: Option<Pose>,
    /// Entities overlapping this one while placed in static mode
    overlapping: BTreeSet<EntityKey>,
}

impl Entity {
    pub fn new(kind: EntityKind) -> Self {
        Self {
            teleportable: kind.tag().default_teleportable(),
            kind,
            dirty: DirtyFlags::ALL, // New entities are dirty
            last_pose: None,
            overlapping: BTreeSet::new(),
        }
    }

    pub fn tag(&self) -> EntityTag {
        self.kind.tag()
    }

    pub fn kind(&self) -> &EntityKind {
        &self.kind
    }

    pub fn kind_mut(&mut self) -> &mut EntityKind {
        &mut self.kind
    }

    /// Whether wrap-around bounds may move this entity
    pub fn is_teleportable(&self) -> bool {
        self.teleportable
    }

    pub fn set_teleportable(&mut self, teleportable: bool) {
        self.teleportable = teleportable;
    }

    pub fn as_collectible(&self) -> Option<&Collectible> {
        match &self.kind {
            EntityKind::Collectible(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_collectible_mut(&mut self) -> Option<&mut Collectible> {
        match &mut self.kind {
            EntityKind::Collectible(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_rope(&self) -> Option<&Rope> {
        match &self.kind {
            EntityKind::Rope(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_rope_mut(&mut self) -> Option<&mut Rope> {
        match &mut self.kind {
            EntityKind::Rope(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_spring(&self) -> Option<&Spring> {
        match &self.kind {
            EntityKind::Spring(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_spring_mut(&mut self) -> Option<&mut Spring> {
        match &mut self.kind {
            EntityKind::Spring(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_gripper(&self) -> Option<&dyn Gripper> {
        match &self.kind {
            EntityKind::Rope(r) => Some(r),
            EntityKind::MagneticLever(m) => Some(m),
            _ => None,
        }
    }

    /// Access to the gripping capability of ropes and magnetic levers
    pub fn as_gripper_mut(&mut self) -> Option<&mut dyn Gripper> {
        match &mut self.kind {
            EntityKind::Rope(r) => Some(r),
            EntityKind::MagneticLever(m) => Some(m),
            _ => None,
        }
    }

    /// Restore a collectible to its freshly built state
    ///
    /// Returns false for any other kind.
    pub fn reset_to_default(&mut self, physics: &mut PhysicsWorld) -> bool {
        let Some(collectible) = self.as_collectible_mut() else {
            return false;
        };
        collectible.reset_to_default(physics);
        self.teleportable = self.tag().default_teleportable();
        self.dirty |= DirtyFlags::STATE | DirtyFlags::POSE;
        true
    }

    /// Entities this one overlaps in static mode, in key order
    pub fn overlapping(&self) -> impl Iterator<Item = EntityKey> + '_ {
        self.overlapping.iter().copied()
    }

    /// Whether the entity sits on top of another one in static mode
    pub fn is_overlapping(&self) -> bool {
        !self.overlapping.is_empty()
    }

    pub fn dirty(&self) -> DirtyFlags {
        self.dirty
    }

    pub fn is_dirty(&self) -> bool {
        !self.dirty.is_empty()
    }

    /// Return the accumulated flags and clear them
    pub fn take_dirty(&mut self) -> DirtyFlags {
        std::mem::take(&mut self.dirty)
    }

    pub fn mark_dirty(&mut self, flags: DirtyFlags) {
        self.dirty |= flags;
    }
}

impl ComplexObject for Entity {
    fn bodies(&self) -> &BodySet {
        self.kind.object().bodies()
    }

    fn bodies_mut(&mut self) -> &mut BodySet {
        self.kind.object_mut().bodies_mut()
    }

    fn constraints(&self) -> &ConstraintSet {
        self.kind.object().constraints()
    }

    fn constraints_mut(&mut self) -> &mut ConstraintSet {
        self.kind.object_mut().constraints_mut()
    }

    fn build_constraints(&mut self, physics: &mut PhysicsWorld) {
        self.kind.object_mut().build_constraints(physics);
    }

    fn initialize_in_world(&mut self, physics: &mut PhysicsWorld) {
        self.kind.object_mut().initialize_in_world(physics);
    }

    fn remove_from_world(&mut self, physics: &mut PhysicsWorld) {
        self.kind.object_mut().remove_from_world(physics);
    }

    fn translate(&mut self, physics: &mut PhysicsWorld, x: f32, y: f32) {
        self.kind.object_mut().translate(physics, x, y);
        self.dirty |= DirtyFlags::POSE;
    }

    fn rotate(&mut self, physics: &mut PhysicsWorld, theta: f32) {
        self.kind.object_mut().rotate(physics, theta);
        self.dirty |= DirtyFlags::POSE;
    }

    fn apply_force(&mut self, physics: &mut PhysicsWorld, force: Vec2) {
        self.kind.object_mut().apply_force(physics, force);
    }

    fn update(&mut self, physics: &PhysicsWorld) -> DirtyFlags {
        let mut flags = self.kind.object_mut().update(physics);
        let pose = self.pose(physics);
        if self.last_pose != Some(pose) {
            self.last_pose = Some(pose);
            flags |= DirtyFlags::POSE;
        }
        self.dirty |= flags;
        flags
    }

    fn is_outside_bounds(&self, physics: &PhysicsWorld, bounds: &Aabb2) -> bool {
        self.kind.object().is_outside_bounds(physics, bounds)
    }

    fn set_mobile(&mut self, physics: &mut PhysicsWorld, mobile: bool) {
        self.kind.object_mut().set_mobile(physics, mobile);
    }

    fn position(&self, physics: &PhysicsWorld) -> Vec2 {
        self.kind.object().position(physics)
    }

    fn angle(&self, physics: &PhysicsWorld) -> f32 {
        self.kind.object().angle(physics)
    }

    fn restore_body_poses(&mut self, physics: &mut PhysicsWorld, poses: &[Pose]) {
        self.kind.object_mut().restore_body_poses(physics, poses);
        self.dirty |= DirtyFlags::POSE;
    }

    fn on_dynamic_collide_begin(&mut self, event: &CollideEvent, ctx: &mut SimContext<'_>) {
        self.kind.object_mut().on_dynamic_collide_begin(event, ctx);
        self.dirty |= DirtyFlags::STATE;
    }

    fn on_dynamic_collide_end(&mut self, event: &CollideEvent, ctx: &mut SimContext<'_>) {
        self.kind.object_mut().on_dynamic_collide_end(event, ctx);
        self.dirty |= DirtyFlags::STATE;
    }

    fn on_static_collide_begin(&mut self, event: &CollideEvent, ctx: &mut SimContext<'_>) {
        self.kind.object_mut().on_static_collide_begin(event, ctx);
        let Some(partner) = event.partner.as_ref() else {
            return;
        };
        if partner.key != ctx.entity && self.overlapping.insert(partner.key) {
            self.dirty |= DirtyFlags::STATE;
        }
    }

    /// An empty payload clears every overlap
    fn on_static_collide_end(&mut self, event: &CollideEvent, ctx: &mut SimContext<'_>) {
        self.kind.object_mut().on_static_collide_end(event, ctx);
        let changed = match event.partner.as_ref() {
            Some(partner) => self.overlapping.remove(&partner.key),
            None => !std::mem::take(&mut self.overlapping).is_empty(),
        };
        if changed {
            self.dirty |= DirtyFlags::STATE;
        }
    }
}

/// Implement the four accessors of [`ComplexObject`] for a kind storing
/// `bodies` and `constraints` fields
macro_rules! object_parts {
    () => {
        fn bodies(&self) -> &$crate::object::BodySet {
            &self.bodies
        }

        fn bodies_mut(&mut self) -> &mut $crate::object::BodySet {
            &mut self.bodies
        }

        fn constraints(&self) -> &$crate::object::ConstraintSet {
            &self.constraints
        }

        fn constraints_mut(&mut self) -> &mut $crate::object::ConstraintSet {
            &mut self.constraints
        }
    };
}

pub(crate) use object_parts;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeable_kinds() {
        assert!(!EntityTag::Collectible.is_placeable());
        assert!(!EntityTag::Goal.is_placeable());
        assert!(EntityTag::Rope.is_placeable());
        assert!(EntityTag::Domino.is_placeable());
    }

    #[test]
    fn test_teleport_defaults() {
        assert!(Entity::new(EntityKind::Collectible(Collectible::new(0.5))).is_teleportable());
        assert!(!Entity::new(EntityKind::Rope(Rope::new(3.0))).is_teleportable());
        assert!(!Entity::new(EntityKind::Spring(Spring::new(10.0, 1.0, 3.0))).is_teleportable());
    }

    #[test]
    fn test_gripper_access() {
        let mut rope = Entity::new(EntityKind::Rope(Rope::new(3.0)));
        assert!(rope.as_gripper_mut().is_some());
        let mut surface = Entity::new(EntityKind::Surface(Surface::new(2.0, 0.5, 0.2)));
        assert!(surface.as_gripper_mut().is_none());
    }

    #[test]
    fn test_update_reports_pose_changes() {
        let mut physics = PhysicsWorld::new();
        let mut entity = Entity::new(EntityKind::Domino(Domino::new()));
        entity.initialize_in_world(&mut physics);
        entity.take_dirty();

        assert!(entity.update(&physics).contains(DirtyFlags::POSE));
        assert!(!entity.update(&physics).contains(DirtyFlags::POSE));

        entity.translate(&mut physics, 4.0, 2.0);
        assert!(entity.update(&physics).contains(DirtyFlags::POSE));
        assert!(entity.take_dirty().contains(DirtyFlags::POSE));
        assert!(!entity.is_dirty());
    }
}
