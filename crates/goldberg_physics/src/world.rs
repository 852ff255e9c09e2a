//! Physics world and simulation
//!
//! The world owns every body and constraint. Each step integrates motion,
//! solves constraints, then runs a narrowphase over all body pairs and asks a
//! [`ContactListener`] whether each contact should be solved. Contact
//! lifecycle is reported as begin / persist / end, and bodies that leave the
//! configured bounds are reported as outside.

use std::collections::BTreeMap;

use crate::body::{BodyKey, RigidBody2D};
use crate::collision::{detect, Contact};
use crate::constraint::{Constraint, ConstraintKey};
use goldberg_math::{Aabb2, Vec2};
use slotmap::SlotMap;

/// Configuration for the physics simulation
#[derive(Clone, Debug)]
pub struct PhysicsConfig {
    /// Gravity acceleration (negative y = down)
    pub gravity: Vec2,
    /// Velocity and constraint iterations per substep
    pub solver_iterations: usize,
    /// Longest time slice integrated at once; longer steps are subdivided
    pub max_substep: f32,
    /// Penetration tolerated before positional correction kicks in
    pub slop: f32,
    /// Fraction of the remaining penetration corrected per substep
    pub correction: f32,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            gravity: Vec2::new(0.0, -9.8),
            solver_iterations: 8,
            max_substep: 1.0 / 60.0,
            slop: 0.005,
            correction: 0.8,
        }
    }
}

impl PhysicsConfig {
    /// Create a new physics config with the given gravity
    pub fn new(gravity: Vec2) -> Self {
        Self {
            gravity,
            ..Default::default()
        }
    }
}

/// A contact between two bodies as reported to a [`ContactListener`]
///
/// `body_a` always orders before `body_b`; the normal points from A to B.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ContactEvent {
    pub body_a: BodyKey,
    pub body_b: BodyKey,
    pub point: Vec2,
    pub normal: Vec2,
    pub penetration: f32,
}

impl ContactEvent {
    fn new(body_a: BodyKey, body_b: BodyKey, contact: &Contact) -> Self {
        Self {
            body_a,
            body_b,
            point: contact.point,
            normal: contact.normal,
            penetration: contact.penetration,
        }
    }
}

/// Receives contact lifecycle and bounds notifications during a step
///
/// `begin` and `persist` decide whether the contact is solved this substep.
/// `end` is only reported for contacts whose latest decision was to solve
/// them; a contact that was refused disappears silently.
pub trait ContactListener {
    fn begin(&mut self, _event: &ContactEvent) -> bool {
        true
    }

    fn persist(&mut self, _event: &ContactEvent) -> bool {
        true
    }

    fn end(&mut self, _event: &ContactEvent) {}

    /// A body's bounding box no longer touches the world bounds
    fn outside(&mut self, _body: BodyKey) {}
}

/// Listener that solves every contact and ignores notifications
pub struct NoopListener;

impl ContactListener for NoopListener {}

#[derive(Clone, Copy, Debug)]
struct ContactRecord {
    event: ContactEvent,
    solved: bool,
}

/// The physics world containing all rigid bodies and constraints
pub struct PhysicsWorld {
    /// All rigid bodies in the world (using generational keys)
    bodies: SlotMap<BodyKey, RigidBody2D>,
    constraints: SlotMap<ConstraintKey, Constraint>,
    /// Contacts alive after the last substep, keyed by ordered body pair
    contacts: BTreeMap<(BodyKey, BodyKey), ContactRecord>,
    /// Region outside of which bodies are reported
    bounds: Option<Aabb2>,
    /// Physics configuration
    pub config: PhysicsConfig,
}

impl Default for PhysicsWorld {
    fn default() -> Self {
        Self::new()
    }
}

impl PhysicsWorld {
    /// Create a new physics world with default configuration
    pub fn new() -> Self {
        Self::with_config(PhysicsConfig::default())
    }

    /// Create a new physics world with custom configuration
    pub fn with_config(config: PhysicsConfig) -> Self {
        Self {
            bodies: SlotMap::with_key(),
            constraints: SlotMap::with_key(),
            contacts: BTreeMap::new(),
            bounds: None,
            config,
        }
    }

    pub fn gravity(&self) -> Vec2 {
        self.config.gravity
    }

    pub fn set_gravity(&mut self, gravity: Vec2) {
        self.config.gravity = gravity;
    }

    pub fn bounds(&self) -> Option<Aabb2> {
        self.bounds
    }

    /// Set or remove the region outside of which bodies are reported
    pub fn set_bounds(&mut self, bounds: Option<Aabb2>) {
        self.bounds = bounds;
    }

    /// Add a body to the world and return its key
    pub fn add_body(&mut self, body: RigidBody2D) -> BodyKey {
        self.bodies.insert(body)
    }

    /// Remove a body from the world and return it
    ///
    /// Contacts involving the body are dropped without an end notification.
    pub fn remove_body(&mut self, key: BodyKey) -> Option<RigidBody2D> {
        let body = self.bodies.remove(key)?;
        self.contacts.retain(|&(a, b), _| a != key && b != key);
        Some(body)
    }

    /// Get an immutable reference to a body by key
    pub fn get_body(&self, key: BodyKey) -> Option<&RigidBody2D> {
        self.bodies.get(key)
    }

    /// Get a mutable reference to a body by key
    pub fn get_body_mut(&mut self, key: BodyKey) -> Option<&mut RigidBody2D> {
        self.bodies.get_mut(key)
    }

    pub fn contains_body(&self, key: BodyKey) -> bool {
        self.bodies.contains_key(key)
    }

    /// Get the number of bodies in the world
    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    /// Iterate over all body keys
    pub fn body_keys(&self) -> impl Iterator<Item = BodyKey> + '_ {
        self.bodies.keys()
    }

    pub fn add_constraint(&mut self, constraint: Constraint) -> ConstraintKey {
        self.constraints.insert(constraint)
    }

    pub fn remove_constraint(&mut self, key: ConstraintKey) -> Option<Constraint> {
        self.constraints.remove(key)
    }

    pub fn get_constraint(&self, key: ConstraintKey) -> Option<&Constraint> {
        self.constraints.get(key)
    }

    pub fn get_constraint_mut(&mut self, key: ConstraintKey) -> Option<&mut Constraint> {
        self.constraints.get_mut(key)
    }

    pub fn contains_constraint(&self, key: ConstraintKey) -> bool {
        self.constraints.contains_key(key)
    }

    pub fn constraint_count(&self) -> usize {
        self.constraints.len()
    }

    /// Drop every contact record without end notifications
    ///
    /// Contacts still touching on the next step are reported through
    /// `begin` again.
    pub fn forget_contacts(&mut self) {
        self.contacts.clear();
    }

    /// Remove every body, constraint and contact
    pub fn clear(&mut self) {
        self.bodies.clear();
        self.constraints.clear();
        self.contacts.clear();
    }

    /// Check whether two bodies may generate contacts at all
    ///
    /// Both must exist and be active, their filters must agree, and they must
    /// not be linked by a constraint that disables connected collision.
    pub fn can_collide(&self, a: BodyKey, b: BodyKey) -> bool {
        if a == b {
            return false;
        }
        let (Some(body_a), Some(body_b)) = (self.bodies.get(a), self.bodies.get(b)) else {
            return false;
        };
        if !body_a.active || !body_b.active || !body_a.filter.collides_with(&body_b.filter) {
            return false;
        }
        !self
            .constraints
            .values()
            .any(|c| !c.collide_connected && c.connects(a, b))
    }

    /// Run a fresh narrowphase test between two bodies at their current poses
    ///
    /// Honors the same filtering as the step loop. The contact normal points
    /// from `a` toward `b`.
    pub fn test_overlap(&self, a: BodyKey, b: BodyKey) -> Option<Contact> {
        if !self.can_collide(a, b) {
            return None;
        }
        detect(&self.bodies[a], &self.bodies[b])
    }

    /// Check whether the last step left these bodies touching
    pub fn in_contact(&self, a: BodyKey, b: BodyKey) -> bool {
        self.contacts.contains_key(&ordered(a, b))
    }

    /// Contacts alive after the last step
    pub fn contacts(&self) -> impl Iterator<Item = &ContactEvent> + '_ {
        self.contacts.values().map(|record| &record.event)
    }

    /// Check whether a body's bounding box lies fully outside the bounds
    pub fn is_outside(&self, key: BodyKey) -> bool {
        match (self.bounds, self.bodies.get(key)) {
            (Some(bounds), Some(body)) => !bounds.intersects(&body.aabb()),
            _ => false,
        }
    }

    /// Step the physics simulation forward by dt seconds, solving every contact
    pub fn step(&mut self, dt: f32) {
        self.step_with(dt, &mut NoopListener);
    }

    /// Step the physics simulation forward by dt seconds
    ///
    /// Long steps are split into substeps no longer than
    /// [`PhysicsConfig::max_substep`]. Outside notifications are raised once,
    /// after the last substep.
    pub fn step_with(&mut self, dt: f32, listener: &mut dyn ContactListener) {
        if dt <= 0.0 || !dt.is_finite() {
            return;
        }
        let max_substep = self.config.max_substep.max(1e-4);
        let substeps = (dt / max_substep).ceil().max(1.0) as usize;
        let h = dt / substeps as f32;
        for _ in 0..substeps {
            self.substep(h, listener);
        }

        if self.bounds.is_some() {
            let outside: Vec<BodyKey> = self
                .bodies
                .iter()
                .filter(|(_, body)| body.active)
                .map(|(key, _)| key)
                .filter(|&key| self.is_outside(key))
                .collect();
            for key in outside {
                listener.outside(key);
            }
        }
    }

    fn substep(&mut self, h: f32, listener: &mut dyn ContactListener) {
        // Phase 1: Forces into velocities
        let gravity = self.config.gravity;
        for (_key, body) in &mut self.bodies {
            if !body.active || !body.is_dynamic() {
                body.clear_forces();
                continue;
            }
            let inv_mass = body.inverse_mass();
            body.velocity += (gravity * body.gravity_scale + body.force * inv_mass) * h;
            body.angular_velocity += body.torque * body.inverse_inertia() * h;
            body.velocity *= 1.0 / (1.0 + h * body.linear_damping);
            body.angular_velocity *= 1.0 / (1.0 + h * body.angular_damping);
            body.clear_forces();
        }

        for constraint in self.constraints.values() {
            if let Some([a, b]) = self.bodies.get_disjoint_mut([constraint.body_a, constraint.body_b]) {
                constraint.apply_forces(a, b, h);
            }
        }

        // Phase 2: Integrate velocity into position
        for (_key, body) in &mut self.bodies {
            if body.active && body.is_dynamic() {
                body.position += body.velocity * h;
                body.angle += body.angular_velocity * h;
            }
        }

        // Phase 3: Constraints
        for _ in 0..self.config.solver_iterations {
            for constraint in self.constraints.values() {
                if let Some([a, b]) = self.bodies.get_disjoint_mut([constraint.body_a, constraint.body_b]) {
                    constraint.solve_position(a, b);
                }
            }
        }

        // Phase 4: Narrowphase and listener decisions
        let solved = self.update_contacts(listener);

        // Phase 5: Contact response
        self.resolve_contacts(&solved);
    }

    /// Detect all contacts, notify the listener, and return those to solve
    fn update_contacts(&mut self, listener: &mut dyn ContactListener) -> Vec<ContactEvent> {
        let keys: Vec<BodyKey> = self
            .bodies
            .iter()
            .filter(|(_, body)| body.active)
            .map(|(key, _)| key)
            .collect();

        let mut current = BTreeMap::new();
        let mut solved = Vec::new();
        for i in 0..keys.len() {
            for j in (i + 1)..keys.len() {
                let (key_a, key_b) = ordered(keys[i], keys[j]);
                let Some(contact) = self.test_overlap(key_a, key_b) else {
                    continue;
                };
                let event = ContactEvent::new(key_a, key_b, &contact);
                let solve = if self.contacts.contains_key(&(key_a, key_b)) {
                    listener.persist(&event)
                } else {
                    log::trace!("contact begin {:?} / {:?}", key_a, key_b);
                    listener.begin(&event)
                };
                if solve {
                    solved.push(event);
                }
                current.insert((key_a, key_b), ContactRecord { event, solved: solve });
            }
        }

        let previous = std::mem::replace(&mut self.contacts, current);
        for (pair, record) in previous {
            if record.solved && !self.contacts.contains_key(&pair) {
                log::trace!("contact end {:?} / {:?}", pair.0, pair.1);
                listener.end(&record.event);
            }
        }
        solved
    }

    /// Sequential impulses followed by positional correction
    fn resolve_contacts(&mut self, contacts: &[ContactEvent]) {
        for _ in 0..self.config.solver_iterations {
            for event in contacts {
                if let Some([a, b]) = self.bodies.get_disjoint_mut([event.body_a, event.body_b]) {
                    apply_contact_impulse(a, b, event);
                }
            }
        }

        let slop = self.config.slop;
        let percent = self.config.correction;
        for event in contacts {
            let Some([a, b]) = self.bodies.get_disjoint_mut([event.body_a, event.body_b]) else {
                continue;
            };
            let ima = a.inverse_mass();
            let imb = b.inverse_mass();
            let total = ima + imb;
            if total == 0.0 {
                continue;
            }
            let depth = (event.penetration - slop).max(0.0) * percent / total;
            a.apply_correction(-event.normal * (depth * ima));
            b.apply_correction(event.normal * (depth * imb));
        }
    }
}

fn ordered(a: BodyKey, b: BodyKey) -> (BodyKey, BodyKey) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

/// Normal and friction impulse at one contact point
fn apply_contact_impulse(a: &mut RigidBody2D, b: &mut RigidBody2D, event: &ContactEvent) {
    let normal = event.normal;
    let point = event.point;
    let ra = point - a.position;
    let rb = point - b.position;

    let relative = b.velocity_at(point) - a.velocity_at(point);
    let closing = relative.dot(normal);
    if closing > 0.0 {
        return;
    }

    let ima = a.inverse_mass();
    let imb = b.inverse_mass();
    let iia = a.inverse_inertia();
    let iib = b.inverse_inertia();
    let rna = ra.cross(normal);
    let rnb = rb.cross(normal);
    let k_normal = ima + imb + rna * rna * iia + rnb * rnb * iib;
    if k_normal <= 0.0 {
        return;
    }

    let material = a.material.combine(&b.material);
    // Resting contacts should not bounce
    let restitution = if -closing > 1.0 { material.restitution } else { 0.0 };
    let j = -(1.0 + restitution) * closing / k_normal;
    let impulse = normal * j;
    a.apply_impulse(-impulse, point);
    b.apply_impulse(impulse, point);

    // Friction
    let relative = b.velocity_at(point) - a.velocity_at(point);
    let tangent = relative - normal * relative.dot(normal);
    if tangent.length_squared() < 1e-12 {
        return;
    }
    let tangent = tangent.normalized();
    let rta = ra.cross(tangent);
    let rtb = rb.cross(tangent);
    let k_tangent = ima + imb + rta * rta * iia + rtb * rtb * iib;
    if k_tangent <= 0.0 {
        return;
    }
    let max_friction = material.friction * j;
    let jt = (-relative.dot(tangent) / k_tangent).clamp(-max_friction, max_friction);
    let friction = tangent * jt;
    a.apply_impulse(-friction, point);
    b.apply_impulse(friction, point);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collision::CollisionFilter;

    #[derive(Default)]
    struct Recorder {
        begins: usize,
        persists: usize,
        ends: usize,
        outside: Vec<BodyKey>,
        accept: bool,
    }

    impl ContactListener for Recorder {
        fn begin(&mut self, _event: &ContactEvent) -> bool {
            self.begins += 1;
            self.accept
        }

        fn persist(&mut self, _event: &ContactEvent) -> bool {
            self.persists += 1;
            self.accept
        }

        fn end(&mut self, _event: &ContactEvent) {
            self.ends += 1;
        }

        fn outside(&mut self, body: BodyKey) {
            self.outside.push(body);
        }
    }

    fn world_with_floor() -> (PhysicsWorld, BodyKey) {
        let mut world = PhysicsWorld::new();
        let floor = world.add_body(RigidBody2D::new_static_rect(20.0, 1.0));
        (world, floor)
    }

    #[test]
    fn test_gravity_moves_dynamic_bodies_only() {
        let (mut world, floor) = world_with_floor();
        let ball = world.add_body(RigidBody2D::new_circle(0.5).with_position(Vec2::new(0.0, 10.0)));

        world.step(0.1);

        assert!(world.get_body(ball).unwrap().position.y < 10.0);
        assert_eq!(world.get_body(floor).unwrap().position, Vec2::ZERO);
    }

    #[test]
    fn test_gravity_scale_zero_floats() {
        let mut world = PhysicsWorld::new();
        let ball = world.add_body(
            RigidBody2D::new_circle(0.5)
                .with_position(Vec2::new(0.0, 10.0))
                .with_gravity_scale(0.0),
        );
        world.step(1.0);
        assert_eq!(world.get_body(ball).unwrap().position, Vec2::new(0.0, 10.0));
    }

    #[test]
    fn test_ball_comes_to_rest_on_floor() {
        let (mut world, _floor) = world_with_floor();
        let ball = world.add_body(RigidBody2D::new_circle(0.5).with_position(Vec2::new(0.0, 3.0)));

        for _ in 0..240 {
            world.step(1.0 / 60.0);
        }

        let body = world.get_body(ball).unwrap();
        // Resting on the floor top (y = 0.5), within slop
        assert!((body.position.y - 1.0).abs() < 0.05, "y = {}", body.position.y);
        assert!(body.velocity.length() < 0.5);
    }

    #[test]
    fn test_begin_persist_end_lifecycle() {
        let (mut world, floor) = world_with_floor();
        let ball = world.add_body(RigidBody2D::new_circle(0.5).with_position(Vec2::new(0.0, 0.9)));
        let mut recorder = Recorder {
            accept: true,
            ..Default::default()
        };

        world.step_with(1.0 / 60.0, &mut recorder);
        assert_eq!(recorder.begins, 1);
        assert!(world.in_contact(floor, ball));

        world.step_with(1.0 / 60.0, &mut recorder);
        assert_eq!(recorder.begins, 1);
        assert!(recorder.persists >= 1);

        // Teleport away: the contact ends
        world.get_body_mut(ball).unwrap().position = Vec2::new(0.0, 10.0);
        world.step_with(1.0 / 60.0, &mut recorder);
        assert_eq!(recorder.ends, 1);
        assert!(!world.in_contact(floor, ball));
    }

    #[test]
    fn test_refused_contact_is_not_solved_and_ends_silently() {
        let (mut world, _floor) = world_with_floor();
        let ball = world.add_body(RigidBody2D::new_circle(0.5).with_position(Vec2::new(0.0, 0.9)));
        let mut recorder = Recorder::default();

        for _ in 0..120 {
            world.step_with(1.0 / 60.0, &mut recorder);
        }

        // Fell through the floor
        assert!(world.get_body(ball).unwrap().position.y < -2.0);
        assert_eq!(recorder.begins, 1);
        assert_eq!(recorder.ends, 0);
    }

    #[test]
    fn test_static_pairs_are_detected() {
        let (mut world, floor) = world_with_floor();
        let wall = world.add_body(RigidBody2D::new_static_rect(1.0, 4.0));
        let mut recorder = Recorder::default();

        world.step_with(1.0 / 60.0, &mut recorder);

        assert_eq!(recorder.begins, 1);
        assert!(world.test_overlap(floor, wall).is_some());
    }

    #[test]
    fn test_filters_prevent_contacts() {
        let (mut world, floor) = world_with_floor();
        let ghost = world.add_body(RigidBody2D::new_circle(0.5).with_filter(CollisionFilter::anchor()));
        assert!(!world.can_collide(floor, ghost));
        assert!(world.test_overlap(floor, ghost).is_none());
    }

    #[test]
    fn test_connected_bodies_do_not_collide() {
        let mut world = PhysicsWorld::new();
        let anchor_body = RigidBody2D::new_circle(0.1).with_infinite_mass();
        let plank_body = RigidBody2D::new_rect(4.0, 0.2).with_mass(1.0);
        let joint = Constraint::revolute(BodyKey::default(), &anchor_body, BodyKey::default(), &plank_body, Vec2::ZERO);
        let anchor = world.add_body(anchor_body);
        let plank = world.add_body(plank_body);
        assert!(world.can_collide(anchor, plank));

        world.add_constraint(Constraint {
            body_a: anchor,
            body_b: plank,
            ..joint
        });
        assert!(!world.can_collide(anchor, plank));
    }

    #[test]
    fn test_outside_bounds_reported() {
        let mut world = PhysicsWorld::new();
        world.set_gravity(Vec2::ZERO);
        world.set_bounds(Some(Aabb2::from_size(10.0, 10.0)));
        let inside = world.add_body(RigidBody2D::new_circle(0.5).with_position(Vec2::new(5.0, 5.0)));
        let gone = world.add_body(RigidBody2D::new_circle(0.5).with_position(Vec2::new(12.0, 5.0)));
        let mut recorder = Recorder::default();

        world.step_with(1.0 / 60.0, &mut recorder);

        assert_eq!(recorder.outside, vec![gone]);
        assert!(!world.is_outside(inside));
    }

    #[test]
    fn test_remove_body_drops_contacts() {
        let (mut world, floor) = world_with_floor();
        let ball = world.add_body(RigidBody2D::new_circle(0.5).with_position(Vec2::new(0.0, 0.9)));
        let mut recorder = Recorder {
            accept: true,
            ..Default::default()
        };
        world.step_with(1.0 / 60.0, &mut recorder);
        assert!(world.in_contact(floor, ball));

        world.remove_body(ball);
        world.step_with(1.0 / 60.0, &mut recorder);
        assert_eq!(recorder.ends, 0);
        assert_eq!(world.contacts().count(), 0);
    }

    #[test]
    fn test_forget_contacts_reports_begin_again() {
        let (mut world, _floor) = world_with_floor();
        world.add_body(RigidBody2D::new_circle(0.5).with_position(Vec2::new(0.0, 0.9)));
        let mut recorder = Recorder::default();

        world.step_with(1.0 / 60.0, &mut recorder);
        world.step_with(1.0 / 60.0, &mut recorder);
        assert_eq!(recorder.begins, 1);

        world.set_gravity(Vec2::ZERO);
        world.forget_contacts();
        world.step_with(1.0 / 60.0, &mut recorder);
        assert_eq!(recorder.begins, 2);
        assert_eq!(recorder.ends, 0);
    }

    #[test]
    fn test_rope_holds_hanging_body() {
        let mut world = PhysicsWorld::new();
        let top_body = RigidBody2D::new_static_rect(1.0, 0.3).with_position(Vec2::new(0.0, 10.0));
        let bottom_body = RigidBody2D::new_rect(1.0, 1.0)
            .with_mass(1.0)
            .with_position(Vec2::new(0.0, 8.0));
        let rope = Constraint::rope(
            BodyKey::default(),
            &top_body,
            top_body.position,
            BodyKey::default(),
            &bottom_body,
            bottom_body.position,
            2.0,
        );
        let top = world.add_body(top_body);
        let bottom = world.add_body(bottom_body);
        world.add_constraint(Constraint {
            body_a: top,
            body_b: bottom,
            ..rope
        });

        for _ in 0..120 {
            world.step(1.0 / 60.0);
        }

        let distance = world.get_body(bottom).unwrap().position.distance(Vec2::new(0.0, 10.0));
        assert!(distance <= 2.01, "distance = {}", distance);
    }
}
