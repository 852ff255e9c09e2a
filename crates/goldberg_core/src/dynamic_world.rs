//! The simulation world: entities on top of the physics engine
//!
//! `DynamicWorld` owns the physics world and every tracked entity. Each tick
//! it steps physics, turns native contact notifications into entity-level
//! collision events, and keeps the set of colliding entity pairs current.
//!
//! The world runs in one of two modes:
//! - **static**: placement mode. Gravity is off, every entity is frozen and
//!   contacts between different entities are reported but not solved.
//! - **dynamic**: live simulation with gravity and full contact response.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use goldberg_math::{Aabb2, Vec2};
use goldberg_physics::{
    BodyKey, CollisionFilter, ContactEvent, ContactListener, PhysicsConfig, PhysicsWorld, RigidBody2D,
};
use slotmap::{new_key_type, SecondaryMap, SlotMap};

use crate::entities::Entity;
use crate::factory::{EntityFactory, EntityTemplate};
use crate::object::{CollideEvent, ComplexObject, DirtyFlags, EntityCommand, Partner, Pose, SimContext};
use crate::pairs::{CollidingPair, CollisionPairTracker};
use crate::signal::ModeSignal;
use crate::timers::TimerQueue;

new_key_type! {
    /// Key to an entity tracked by a [`DynamicWorld`]
    pub struct EntityKey;
}

/// Thickness of the rigid edges around the play area
pub const BOUNDS_THICKNESS: f32 = 6.24323;
/// Smallest accepted simulation speed factor
pub const MIN_UPDATE_RATIO: f32 = 1e-8;
pub const DEFAULT_BORDER_FRICTION: f32 = 0.2;

/// One side of the play area
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BoundEdge {
    Top,
    Right,
    Bottom,
    Left,
}

impl BoundEdge {
    pub const ALL: [BoundEdge; 4] = [BoundEdge::Top, BoundEdge::Right, BoundEdge::Bottom, BoundEdge::Left];

    /// Rigid edge body for a `width` x `height` area
    fn body(self, width: f32, height: f32, friction: f32) -> RigidBody2D {
        let t = BOUNDS_THICKNESS;
        let (size, center) = match self {
            BoundEdge::Top => (Vec2::new(width, t), Vec2::new(width / 2.0, height + t / 2.0)),
            BoundEdge::Bottom => (Vec2::new(width, t), Vec2::new(width / 2.0, -t / 2.0)),
            BoundEdge::Right => (Vec2::new(t, height), Vec2::new(width + t / 2.0, height / 2.0)),
            BoundEdge::Left => (Vec2::new(t, height), Vec2::new(-t / 2.0, height / 2.0)),
        };
        RigidBody2D::new_static_rect(size.x, size.y)
            .with_position(center)
            .with_friction(friction)
            .with_restitution(0.0)
            .with_filter(CollisionFilter::bound())
    }
}

/// How the edges of the play area behave
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BoundsKind {
    /// Zero to four solid edges
    Rigid,
    /// No edges; leaving one side re-enters from the opposite side
    CrossTeleport,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Phase {
    Begin,
    End,
}

#[derive(Clone, Copy, Debug)]
enum Notice {
    Contact {
        phase: Phase,
        body_a: BodyKey,
        body_b: BodyKey,
        point: Vec2,
    },
    Outside(BodyKey),
}

/// Decides which native contacts are solved and queues them for dispatch
///
/// Contacts between bodies of two different entities are only solved in
/// dynamic mode. Contacts within one entity are always solved, and bodies
/// with no owning entity (rigid edges) follow the mode.
struct ContactRouter<'a> {
    owners: &'a SecondaryMap<BodyKey, EntityKey>,
    dynamic: bool,
    notices: Vec<Notice>,
}

impl ContactRouter<'_> {
    fn should_solve(&self, event: &ContactEvent) -> bool {
        match (self.owners.get(event.body_a), self.owners.get(event.body_b)) {
            (Some(a), Some(b)) => self.dynamic || a == b,
            _ => self.dynamic,
        }
    }

    fn is_owned(&self, event: &ContactEvent) -> bool {
        self.owners.contains_key(event.body_a) && self.owners.contains_key(event.body_b)
    }

    fn push_contact(&mut self, phase: Phase, event: &ContactEvent) {
        self.notices.push(Notice::Contact {
            phase,
            body_a: event.body_a,
            body_b: event.body_b,
            point: event.point,
        });
    }
}

impl ContactListener for ContactRouter<'_> {
    fn begin(&mut self, event: &ContactEvent) -> bool {
        if self.is_owned(event) {
            self.push_contact(Phase::Begin, event);
        }
        self.should_solve(event)
    }

    fn persist(&mut self, event: &ContactEvent) -> bool {
        self.should_solve(event)
    }

    fn end(&mut self, event: &ContactEvent) {
        if self.is_owned(event) {
            self.push_contact(Phase::End, event);
        }
    }

    fn outside(&mut self, body: BodyKey) {
        self.notices.push(Notice::Outside(body));
    }
}

/// Physics world adapter tracking game entities
pub struct DynamicWorld {
    physics: PhysicsWorld,
    entities: SlotMap<EntityKey, Entity>,
    /// Tracking order, used for every per-entity pass
    order: Vec<EntityKey>,
    /// Non-owning body to entity registry
    owners: SecondaryMap<BodyKey, EntityKey>,
    pairs: CollisionPairTracker,
    dynamic: bool,
    /// Vertical gravity applied in dynamic mode (negative = down)
    gravity: f32,
    update_ratio: f32,
    running: bool,
    width: f32,
    height: f32,
    border_friction: f32,
    edges: BTreeSet<BoundEdge>,
    bound_bodies: BTreeMap<BoundEdge, BodyKey>,
    cross_teleport: bool,
    timers: TimerQueue,
    signal: Arc<ModeSignal>,
}

impl Default for DynamicWorld {
    fn default() -> Self {
        Self::new()
    }
}

impl DynamicWorld {
    /// Create an empty, static, running world
    pub fn new() -> Self {
        Self::with_physics_config(PhysicsConfig::default())
    }

    pub fn with_physics_config(config: PhysicsConfig) -> Self {
        let gravity = config.gravity.y;
        let mut physics = PhysicsWorld::with_config(config);
        physics.set_gravity(Vec2::ZERO);
        Self {
            physics,
            entities: SlotMap::with_key(),
            order: Vec::new(),
            owners: SecondaryMap::new(),
            pairs: CollisionPairTracker::new(),
            dynamic: false,
            gravity,
            update_ratio: 1.0,
            running: true,
            width: 0.0,
            height: 0.0,
            border_friction: DEFAULT_BORDER_FRICTION,
            edges: BTreeSet::new(),
            bound_bodies: BTreeMap::new(),
            cross_teleport: false,
            timers: TimerQueue::new(),
            signal: Arc::new(ModeSignal::new()),
        }
    }

    pub fn physics(&self) -> &PhysicsWorld {
        &self.physics
    }

    // --- Entities ---

    /// Initialize an entity into the world and start tracking it
    pub fn add_entity(&mut self, entity: Entity) -> EntityKey {
        let key = self.entities.insert(entity);
        let entity = &mut self.entities[key];
        entity.initialize_in_world(&mut self.physics);
        for body in entity.bodies().keys() {
            self.owners.insert(body, key);
        }
        entity.set_mobile(&mut self.physics, self.dynamic);
        self.order.push(key);
        log::debug!("added {} entity {:?}", entity.tag(), key);
        key
    }

    /// Add several entities, returning their keys in order
    pub fn add_entities(&mut self, entities: impl IntoIterator<Item = Entity>) -> Vec<EntityKey> {
        entities.into_iter().map(|entity| self.add_entity(entity)).collect()
    }

    /// Build an entity from a template and add it at the template pose
    pub fn spawn(&mut self, template: &EntityTemplate) -> EntityKey {
        let mut entity = EntityFactory::build(&template.spec);
        entity.translate(&mut self.physics, template.position.x, template.position.y);
        if template.angle != 0.0 {
            entity.rotate(&mut self.physics, template.angle);
        }
        self.add_entity(entity)
    }

    /// Stop tracking an entity and take its bodies and constraints out of the world
    ///
    /// Any constraint holding the entity, or held by it, is released first.
    /// In static mode its overlap partners get a static end.
    pub fn remove_entity(&mut self, key: EntityKey) -> Option<Entity> {
        if !self.entities.contains_key(key) {
            return None;
        }
        let holders: Vec<EntityKey> = self
            .order
            .iter()
            .copied()
            .filter(|&k| self.entities[k].as_gripper().and_then(|g| g.held()) == Some(key))
            .collect();
        for holder in holders {
            self.release_now(holder);
        }
        self.release_now(key);
        if !self.dynamic {
            let partners: Vec<EntityKey> = self
                .pairs
                .iter()
                .filter_map(|pair| pair.other(key))
                .filter(|&other| other != key)
                .collect();
            for partner in partners {
                self.notify(partner, None, Some(key), None, Phase::End, false);
            }
        }

        let mut entity = self.entities.remove(key)?;
        for body in entity.bodies().keys() {
            self.owners.remove(body);
        }
        entity.remove_from_world(&mut self.physics);
        self.pairs.remove_entity(key);
        self.timers.cancel_entity(key);
        self.order.retain(|&k| k != key);
        log::debug!("removed {} entity {:?}", entity.tag(), key);
        Some(entity)
    }

    pub fn get_entity(&self, key: EntityKey) -> Option<&Entity> {
        self.entities.get(key)
    }

    /// Mutable access to an entity together with the physics world its bodies live in
    pub fn entity_and_physics(&mut self, key: EntityKey) -> Option<(&mut Entity, &mut PhysicsWorld)> {
        let entity = self.entities.get_mut(key)?;
        Some((entity, &mut self.physics))
    }

    pub fn contains_entity(&self, key: EntityKey) -> bool {
        self.entities.contains_key(key)
    }

    /// Keys of tracked entities in the order they were added
    pub fn entity_keys(&self) -> &[EntityKey] {
        &self.order
    }

    pub fn entity_count(&self) -> usize {
        self.order.len()
    }

    /// Entity owning a physics body
    pub fn owner_of(&self, body: BodyKey) -> Option<EntityKey> {
        self.owners.get(body).copied()
    }

    pub fn pose(&self, key: EntityKey) -> Option<Pose> {
        self.entities.get(key).map(|e| e.pose(&self.physics))
    }

    /// Move and rotate an entity to an absolute pose
    pub fn set_pose(&mut self, key: EntityKey, pose: Pose) -> bool {
        let Some(entity) = self.entities.get_mut(key) else {
            return false;
        };
        entity.translate(&mut self.physics, pose.position.x, pose.position.y);
        entity.rotate(&mut self.physics, pose.angle);
        true
    }

    pub fn translate_entity(&mut self, key: EntityKey, x: f32, y: f32) -> bool {
        let Some(entity) = self.entities.get_mut(key) else {
            return false;
        };
        entity.translate(&mut self.physics, x, y);
        true
    }

    pub fn rotate_entity(&mut self, key: EntityKey, theta: f32) -> bool {
        let Some(entity) = self.entities.get_mut(key) else {
            return false;
        };
        entity.rotate(&mut self.physics, theta);
        true
    }

    pub fn body_poses(&self, key: EntityKey) -> Option<Vec<Pose>> {
        self.entities.get(key).map(|e| e.body_poses(&self.physics))
    }

    pub fn restore_body_poses(&mut self, key: EntityKey, poses: &[Pose]) -> bool {
        let Some(entity) = self.entities.get_mut(key) else {
            return false;
        };
        entity.restore_body_poses(&mut self.physics, poses);
        true
    }

    /// Remove every entity and rigid edge
    pub fn clear(&mut self) {
        for key in self.order.clone() {
            self.remove_entity(key);
        }
        self.pairs.clear();
        self.timers.clear();
        self.edges.clear();
        self.regenerate_bounds();
    }

    // --- Simulation ---

    /// Advance the world by `elapsed` seconds of wall time
    pub fn tick(&mut self, elapsed: f32) {
        self.signal.observe(self.dynamic);

        if self.running {
            let dt = elapsed * self.update_ratio;
            for key in self.timers.advance(dt) {
                if let Some(gripper) = self.entities.get_mut(key).and_then(|e| e.as_gripper_mut()) {
                    gripper.rearm();
                    log::trace!("re-armed {:?}", key);
                }
            }

            let mut router = ContactRouter {
                owners: &self.owners,
                dynamic: self.dynamic,
                notices: Vec::new(),
            };
            self.physics.step_with(dt, &mut router);
            let notices = router.notices;
            self.dispatch(notices);
        }

        for &key in &self.order {
            if let Some(entity) = self.entities.get_mut(key) {
                entity.update(&self.physics);
            }
        }

        if !self.dynamic {
            for &key in &self.order {
                if let Some(entity) = self.entities.get_mut(key) {
                    entity.set_mobile(&mut self.physics, false);
                }
            }
            self.sweep_static_pairs();
        }
    }

    fn dispatch(&mut self, notices: Vec<Notice>) {
        let mut outside = Vec::new();
        for notice in notices {
            match notice {
                Notice::Contact {
                    phase,
                    body_a,
                    body_b,
                    point,
                } => self.dispatch_contact(phase, body_a, body_b, point),
                Notice::Outside(body) => {
                    if let Some(owner) = self.owner_of(body) {
                        if !outside.contains(&owner) {
                            outside.push(owner);
                        }
                    }
                }
            }
        }
        for key in outside {
            self.handle_outside(key);
        }
    }

    fn dispatch_contact(&mut self, phase: Phase, body_a: BodyKey, body_b: BodyKey, point: Vec2) {
        let (Some(a), Some(b)) = (self.owner_of(body_a), self.owner_of(body_b)) else {
            return;
        };
        log::trace!("{:?} {:?} / {:?} (dynamic: {})", phase, a, b, self.dynamic);
        let dynamic = self.dynamic;
        self.notify(a, Some(body_a), Some(b), Some(point), phase, dynamic);
        if a != b {
            self.notify(b, Some(body_b), Some(a), Some(point), phase, dynamic);
        }
        match phase {
            Phase::Begin => {
                self.pairs.insert(a, b);
            }
            Phase::End => {
                self.pairs.remove(a, b);
            }
        }
    }

    fn partner(&self, key: EntityKey) -> Option<Partner> {
        let entity = self.entities.get(key)?;
        Some(Partner {
            key,
            tag: entity.tag(),
            bodies: entity.bodies().keys(),
        })
    }

    /// Run one collision handler on `receiver` and apply the commands it raised
    fn notify(
        &mut self,
        receiver: EntityKey,
        own_body: Option<BodyKey>,
        partner: Option<EntityKey>,
        point: Option<Vec2>,
        phase: Phase,
        dynamic: bool,
    ) {
        let event = CollideEvent {
            own_body,
            partner: partner.and_then(|key| self.partner(key)),
            point,
        };
        let Some(entity) = self.entities.get_mut(receiver) else {
            return;
        };
        let mut ctx = SimContext::new(&mut self.physics, receiver);
        match (phase, dynamic) {
            (Phase::Begin, true) => entity.on_dynamic_collide_begin(&event, &mut ctx),
            (Phase::End, true) => entity.on_dynamic_collide_end(&event, &mut ctx),
            (Phase::Begin, false) => entity.on_static_collide_begin(&event, &mut ctx),
            (Phase::End, false) => entity.on_static_collide_end(&event, &mut ctx),
        }
        let commands = ctx.into_commands();
        self.apply_commands(commands);
    }

    fn apply_commands(&mut self, commands: Vec<EntityCommand>) {
        for command in commands {
            match command {
                EntityCommand::SetTeleportable { entity, teleportable } => {
                    if let Some(entity) = self.entities.get_mut(entity) {
                        entity.set_teleportable(teleportable);
                    }
                }
            }
        }
    }

    /// Wake an entity that left the bounds and wrap it around when allowed
    fn handle_outside(&mut self, key: EntityKey) {
        let Some(entity) = self.entities.get_mut(key) else {
            return;
        };
        entity.set_mobile(&mut self.physics, true);
        if !self.cross_teleport || !entity.is_teleportable() {
            return;
        }
        let area = Aabb2::from_size(self.width, self.height);
        if !entity.is_outside_bounds(&self.physics, &area) {
            return;
        }
        let Some(primary) = entity.bodies().get(&self.physics, 0) else {
            return;
        };
        let (position, velocity) = (primary.position, primary.velocity);

        let mut target = position;
        if position.x > self.width && velocity.x > 0.0 {
            target.x -= self.width;
        } else if position.x < 0.0 && velocity.x < 0.0 {
            target.x += self.width;
        }
        if position.y > self.height && velocity.y > 0.0 {
            target.y -= self.height;
        } else if position.y < 0.0 && velocity.y < 0.0 {
            target.y += self.height;
        }
        if target != position {
            entity.translate(&mut self.physics, target.x, target.y);
            log::trace!("teleported {:?} from {:?} to {:?}", key, position, target);
        }
    }

    /// Drop pairs that stopped touching while frozen, notifying both sides
    fn sweep_static_pairs(&mut self) {
        let lost = {
            let (entities, physics) = (&self.entities, &self.physics);
            self.pairs.sweep(|pair| touching(entities, physics, pair))
        };
        for pair in lost {
            let (a, b) = (pair.first(), pair.second());
            self.notify(a, None, Some(b), None, Phase::End, false);
            if a != b {
                self.notify(b, None, Some(a), None, Phase::End, false);
            }
        }
    }

    pub fn is_dynamic(&self) -> bool {
        self.dynamic
    }

    /// Switch between static (placement) and dynamic (live) mode
    ///
    /// Every entity receives the end notification of the mode being left,
    /// with an empty payload. Tracked pairs are dropped; contacts still
    /// touching begin again under the new mode on the next step.
    ///
    /// The mode signal is raised once the switch is complete.
    pub fn set_dynamic(&mut self, dynamic: bool) {
        if self.dynamic == dynamic {
            self.signal.observe(dynamic);
            return;
        }
        let leaving_dynamic = self.dynamic;
        for key in self.order.clone() {
            self.notify(key, None, None, None, Phase::End, leaving_dynamic);
        }
        self.dynamic = dynamic;
        self.pairs.clear();
        self.physics.forget_contacts();
        self.apply_gravity();
        for &key in &self.order {
            if let Some(entity) = self.entities.get_mut(key) {
                entity.set_mobile(&mut self.physics, dynamic);
            }
        }
        self.signal.observe(dynamic);
        log::debug!("world is now {}", if dynamic { "dynamic" } else { "static" });
    }

    pub fn gravity(&self) -> f32 {
        self.gravity
    }

    /// Set the vertical gravity used in dynamic mode
    pub fn set_gravity(&mut self, gravity: f32) {
        self.gravity = gravity;
        self.apply_gravity();
    }

    fn apply_gravity(&mut self) {
        let gravity = if self.dynamic {
            Vec2::new(0.0, self.gravity)
        } else {
            Vec2::ZERO
        };
        self.physics.set_gravity(gravity);
    }

    pub fn update_ratio(&self) -> f32 {
        self.update_ratio
    }

    /// Scale simulated time relative to wall time
    pub fn set_update_ratio(&mut self, ratio: f32) {
        self.update_ratio = if ratio > 0.0 { ratio } else { MIN_UPDATE_RATIO };
    }

    /// Resume stepping
    pub fn start(&mut self) {
        self.running = true;
    }

    /// Stop stepping; ticks still update entities and observe the mode
    pub fn pause(&mut self) {
        self.running = false;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Signal raised with the mode the world runs in, on every tick and mode switch
    pub fn mode_signal(&self) -> Arc<ModeSignal> {
        Arc::clone(&self.signal)
    }

    // --- Bounds ---

    pub fn size(&self) -> (f32, f32) {
        (self.width, self.height)
    }

    /// Resize the play area, rebuilding whatever bounds are configured
    pub fn set_size(&mut self, width: f32, height: f32) {
        self.width = width;
        self.height = height;
        self.regenerate_bounds();
    }

    pub fn border_friction(&self) -> f32 {
        self.border_friction
    }

    pub fn set_border_friction(&mut self, friction: f32) {
        self.border_friction = friction;
        self.regenerate_bounds();
    }

    /// Enable one rigid edge, leaving cross-teleport mode if needed
    pub fn add_bound(&mut self, edge: BoundEdge) {
        self.cross_teleport = false;
        self.edges.insert(edge);
        self.regenerate_bounds();
    }

    /// Enable all four rigid edges
    pub fn set_all_bounds(&mut self) {
        self.cross_teleport = false;
        self.edges.extend(BoundEdge::ALL);
        self.regenerate_bounds();
    }

    /// Remove every rigid edge
    pub fn clear_bounds(&mut self) {
        self.edges.clear();
        self.regenerate_bounds();
    }

    /// Switch to wrap-around bounds, or back to open bounds
    pub fn set_cross_teleport(&mut self, enabled: bool) {
        self.cross_teleport = enabled;
        if enabled {
            self.edges.clear();
        }
        self.regenerate_bounds();
    }

    pub fn bounds_kind(&self) -> BoundsKind {
        if self.cross_teleport {
            BoundsKind::CrossTeleport
        } else {
            BoundsKind::Rigid
        }
    }

    /// Physics body of a rigid edge
    pub fn bound_body(&self, edge: BoundEdge) -> Option<BodyKey> {
        self.bound_bodies.get(&edge).copied()
    }

    pub fn bound_count(&self) -> usize {
        self.bound_bodies.len()
    }

    fn regenerate_bounds(&mut self) {
        for (_, key) in std::mem::take(&mut self.bound_bodies) {
            self.physics.remove_body(key);
        }
        if self.cross_teleport {
            self.physics.set_bounds(Some(Aabb2::from_size(self.width, self.height)));
            return;
        }
        self.physics.set_bounds(None);
        if self.width <= 0.0 || self.height <= 0.0 {
            return;
        }
        for &edge in &self.edges {
            let body = edge.body(self.width, self.height, self.border_friction);
            self.bound_bodies.insert(edge, self.physics.add_body(body));
        }
    }

    // --- Contacts and feasibility ---

    /// Entity pairs currently in contact
    pub fn collision_pairs(&self) -> &CollisionPairTracker {
        &self.pairs
    }

    /// Whether two tracked entities touch at their current poses
    pub fn entities_touch(&self, a: EntityKey, b: EntityKey) -> bool {
        touching(&self.entities, &self.physics, &CollidingPair::new(a, b))
    }

    /// Whether an entity touches any other tracked entity
    pub fn entity_overlaps_other(&self, key: EntityKey) -> bool {
        self.order
            .iter()
            .any(|&other| other != key && self.entities_touch(key, other))
    }

    /// Whether any two distinct tracked entities touch
    pub fn has_distinct_overlap(&self) -> bool {
        self.order
            .iter()
            .enumerate()
            .any(|(i, &a)| self.order[i + 1..].iter().any(|&b| self.entities_touch(a, b)))
    }

    // --- Grippers and collectibles ---

    /// Drop whatever an entity holds; it re-arms after its cooldown
    pub fn release_held(&mut self, key: EntityKey) -> Option<EntityKey> {
        let delay = self.entities.get(key)?.as_gripper()?.rearm_delay();
        let released = self.release_now(key)?;
        self.timers.schedule(delay, key);
        Some(released)
    }

    /// Release every held entity and re-arm all grippers immediately
    pub fn release_held_constraints(&mut self) {
        for key in self.order.clone() {
            self.release_now(key);
            self.timers.cancel_entity(key);
            if let Some(gripper) = self.entities.get_mut(key).and_then(|e| e.as_gripper_mut()) {
                gripper.rearm();
            }
        }
    }

    fn release_now(&mut self, key: EntityKey) -> Option<EntityKey> {
        let gripper = self.entities.get_mut(key)?.as_gripper_mut()?;
        let released = gripper.release_held(&mut self.physics)?;
        if let Some(held) = self.entities.get_mut(released) {
            held.set_teleportable(held.tag().default_teleportable());
        }
        log::debug!("{:?} released {:?}", key, released);
        Some(released)
    }

    /// Restore one collectible to its built state
    pub fn reset_collectible(&mut self, key: EntityKey) -> bool {
        let Some(entity) = self.entities.get_mut(key) else {
            return false;
        };
        let reset = entity.reset_to_default(&mut self.physics);
        if reset {
            entity.set_mobile(&mut self.physics, self.dynamic);
        }
        reset
    }

    /// Dirty flags accumulated since the last drain, per entity
    pub fn drain_dirty(&mut self) -> Vec<(EntityKey, DirtyFlags)> {
        self.order
            .iter()
            .filter_map(|&key| {
                let flags = self.entities.get_mut(key)?.take_dirty();
                (!flags.is_empty()).then_some((key, flags))
            })
            .collect()
    }
}

/// Live narrowphase test between the bodies of a pair
fn touching(entities: &SlotMap<EntityKey, Entity>, physics: &PhysicsWorld, pair: &CollidingPair) -> bool {
    let (Some(a), Some(b)) = (entities.get(pair.first()), entities.get(pair.second())) else {
        return false;
    };
    let bodies_a = a.bodies().keys();
    if pair.is_self() {
        return bodies_a.iter().enumerate().any(|(i, &x)| {
            bodies_a[i + 1..]
                .iter()
                .any(|&y| physics.test_overlap(x, y).is_some())
        });
    }
    let bodies_b = b.bodies().keys();
    bodies_a
        .iter()
        .any(|&x| bodies_b.iter().any(|&y| physics.test_overlap(x, y).is_some()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::factory::EntitySpec;

    fn coin_at(world: &mut DynamicWorld, x: f32, y: f32) -> EntityKey {
        world.spawn(&EntityTemplate::new(EntitySpec::Collectible { radius: 0.5 }, Vec2::new(x, y)))
    }

    fn floor_at(world: &mut DynamicWorld, x: f32, y: f32) -> EntityKey {
        world.spawn(&EntityTemplate::new(
            EntitySpec::Surface {
                width: 10.0,
                height: 1.0,
                friction: 0.2,
            },
            Vec2::new(x, y),
        ))
    }

    #[test]
    fn test_add_registers_owners() {
        let mut world = DynamicWorld::new();
        let key = world.spawn(&EntityTemplate::new(EntitySpec::Rope { height: 2.0 }, Vec2::new(5.0, 5.0)));
        let bodies = world.get_entity(key).unwrap().bodies().keys();
        assert_eq!(bodies.len(), 2);
        for body in bodies {
            assert_eq!(world.owner_of(body), Some(key));
        }
        assert_eq!(world.entity_keys(), &[key]);
    }

    #[test]
    fn test_remove_detaches_everything() {
        let mut world = DynamicWorld::new();
        let floor = floor_at(&mut world, 5.0, 0.0);
        let coin = coin_at(&mut world, 5.0, 0.9);
        world.tick(1.0 / 60.0);
        assert!(world.collision_pairs().contains(floor, coin));

        let entity = world.remove_entity(coin).unwrap();
        assert!(!entity.bodies().is_attached());
        assert_eq!(world.physics().body_count(), 1);
        assert!(world.collision_pairs().is_empty());
        assert!(world.remove_entity(coin).is_none());

        let again = world.add_entity(entity);
        assert_eq!(world.physics().body_count(), 2);
        assert!(world.contains_entity(again));
    }

    #[test]
    fn test_static_mode_freezes_entities() {
        let mut world = DynamicWorld::new();
        let coin = coin_at(&mut world, 5.0, 5.0);
        for _ in 0..30 {
            world.tick(1.0 / 60.0);
        }
        assert_eq!(world.pose(coin).unwrap().position, Vec2::new(5.0, 5.0));
        assert_eq!(world.physics().gravity(), Vec2::ZERO);
    }

    #[test]
    fn test_dynamic_mode_applies_gravity() {
        let mut world = DynamicWorld::new();
        world.set_gravity(-9.8);
        let coin = coin_at(&mut world, 5.0, 5.0);
        world.set_dynamic(true);
        assert_eq!(world.physics().gravity(), Vec2::new(0.0, -9.8));
        for _ in 0..30 {
            world.tick(1.0 / 60.0);
        }
        assert!(world.pose(coin).unwrap().position.y < 5.0);
    }

    #[test]
    fn test_pause_stops_stepping() {
        let mut world = DynamicWorld::new();
        let coin = coin_at(&mut world, 5.0, 5.0);
        world.set_dynamic(true);
        world.pause();
        world.tick(0.5);
        assert_eq!(world.pose(coin).unwrap().position, Vec2::new(5.0, 5.0));
        assert!(!world.is_running());
        world.start();
        world.tick(0.5);
        assert!(world.pose(coin).unwrap().position.y < 5.0);
    }

    #[test]
    fn test_update_ratio_clamped() {
        let mut world = DynamicWorld::new();
        world.set_update_ratio(0.0);
        assert_eq!(world.update_ratio(), MIN_UPDATE_RATIO);
        world.set_update_ratio(2.0);
        assert_eq!(world.update_ratio(), 2.0);
    }

    #[test]
    fn test_bounds_generated_from_size() {
        let mut world = DynamicWorld::new();
        world.set_all_bounds();
        assert_eq!(world.bound_count(), 0);

        world.set_size(20.0, 10.0);
        assert_eq!(world.bound_count(), 4);
        let right = world.bound_body(BoundEdge::Right).unwrap();
        let body = world.physics().get_body(right).unwrap();
        assert_eq!(body.position, Vec2::new(20.0 + BOUNDS_THICKNESS / 2.0, 5.0));

        world.set_cross_teleport(true);
        assert_eq!(world.bound_count(), 0);
        assert_eq!(world.bounds_kind(), BoundsKind::CrossTeleport);
        assert_eq!(world.physics().bounds(), Some(Aabb2::from_size(20.0, 10.0)));

        world.set_cross_teleport(false);
        assert_eq!(world.physics().bounds(), None);
        assert_eq!(world.bounds_kind(), BoundsKind::Rigid);
    }

    #[test]
    fn test_border_friction_rebuilds_edges() {
        let mut world = DynamicWorld::new();
        world.set_size(20.0, 10.0);
        world.add_bound(BoundEdge::Bottom);
        let before = world.bound_body(BoundEdge::Bottom).unwrap();
        world.set_border_friction(0.9);
        let after = world.bound_body(BoundEdge::Bottom).unwrap();
        assert_ne!(before, after);
        assert_eq!(world.physics().get_body(after).unwrap().material.friction, 0.9);
        assert_eq!(world.bound_count(), 1);
    }

    #[test]
    fn test_overlap_queries_use_live_geometry() {
        let mut world = DynamicWorld::new();
        let floor = floor_at(&mut world, 5.0, 0.0);
        let coin = coin_at(&mut world, 5.0, 3.0);
        assert!(!world.has_distinct_overlap());

        world.translate_entity(coin, 5.0, 0.8);
        assert!(world.has_distinct_overlap());
        assert!(world.entity_overlaps_other(coin));
        assert!(world.entities_touch(floor, coin));
    }

    #[test]
    fn test_clear_removes_everything() {
        let mut world = DynamicWorld::new();
        world.set_size(10.0, 10.0);
        world.set_all_bounds();
        coin_at(&mut world, 5.0, 5.0);
        world.clear();
        assert_eq!(world.entity_count(), 0);
        assert_eq!(world.physics().body_count(), 0);
    }

    #[test]
    fn test_drain_dirty() {
        let mut world = DynamicWorld::new();
        let coin = coin_at(&mut world, 5.0, 5.0);
        world.tick(1.0 / 60.0);
        let dirty = world.drain_dirty();
        assert_eq!(dirty.len(), 1);
        assert_eq!(dirty[0].0, coin);
        world.tick(1.0 / 60.0);
        assert!(world.drain_dirty().is_empty());
    }
}
