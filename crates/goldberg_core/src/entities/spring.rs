//! A spring launcher: a fixed base pushing a sliding plate

use goldberg_math::Vec2;
use goldberg_physics::{
    Constraint, ConstraintKey, ConstraintKind, MassType, PhysicsMaterial, PhysicsWorld, RigidBody2D,
};

use super::object_parts;
use crate::object::{BodySet, CollideEvent, ComplexObject, ConstraintSet, DirtyFlags, SimContext};

/// Share of the total width taken by the spring itself
pub const SPRING_LENGTH_RATIO: f32 = 0.6;
/// Base height relative to the plate height
pub const BASE_HEIGHT_RATIO: f32 = 0.6;
pub const PLATE_MASS: f32 = 0.01;
pub const PLATE_INERTIA: f32 = 5.0;
/// Gap kept between base and plate while locked
pub const LOCK_MARGIN: f32 = 0.05;

const BASE: usize = 0;
const PLATE: usize = 1;

/// Base and plate linked by a prismatic spring
///
/// A locked spring holds the plate compressed against the base; unlocking
/// releases it toward its rest length.
#[derive(Debug)]
pub struct Spring {
    stiffness: f32,
    height: f32,
    width: f32,
    spring_length: f32,
    plate_width: f32,
    locked: bool,
    /// Unlock on the first dynamic hit against the plate
    detonator: bool,
    bodies: BodySet,
    constraints: ConstraintSet,
    joint: Option<ConstraintKey>,
    /// Last computed `F = -k x`
    force: f32,
}

impl Spring {
    pub fn new(stiffness: f32, height: f32, width: f32) -> Self {
        let spring_length = width * SPRING_LENGTH_RATIO;
        let plate_width = (width - spring_length) / 2.0;
        let lift = (1.0 - BASE_HEIGHT_RATIO) * height / 2.0;

        let mut bodies = BodySet::new();
        bodies.push(
            RigidBody2D::new_static_rect(plate_width, BASE_HEIGHT_RATIO * height)
                .with_material(PhysicsMaterial::STICKY)
                .with_position(Vec2::new(0.0, lift)),
        );
        bodies.push(
            RigidBody2D::new_rect(plate_width, height)
                .with_mass_inertia(PLATE_MASS, PLATE_INERTIA)
                .with_position(Vec2::new(plate_width + LOCK_MARGIN, lift)),
        );
        Self {
            stiffness,
            height,
            width,
            spring_length,
            plate_width,
            locked: true,
            detonator: false,
            bodies,
            constraints: ConstraintSet::new(),
            joint: None,
            force: 0.0,
        }
    }

    pub fn stiffness(&self) -> f32 {
        self.stiffness
    }

    pub fn size(&self) -> Vec2 {
        Vec2::new(self.width, self.height)
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    pub fn is_detonator(&self) -> bool {
        self.detonator
    }

    pub fn set_detonator(&mut self, detonator: bool) {
        self.detonator = detonator;
    }

    /// Spring force from the last update, negative while compressed
    pub fn force(&self) -> f32 {
        self.force
    }

    /// Distance between the facing sides of base and plate
    pub fn gap(&self, physics: &PhysicsWorld) -> f32 {
        match (self.bodies.get(physics, BASE), self.bodies.get(physics, PLATE)) {
            (Some(base), Some(plate)) => base.position.distance(plate.position) - self.plate_width,
            _ => self.spring_length,
        }
    }

    pub fn lock(&mut self, physics: &mut PhysicsWorld) {
        self.locked = true;
        self.apply_joint_properties(physics);
    }

    pub fn unlock(&mut self, physics: &mut PhysicsWorld) {
        self.locked = false;
        self.apply_joint_properties(physics);
    }

    pub fn set_stiffness(&mut self, physics: &mut PhysicsWorld, stiffness: f32) {
        self.stiffness = stiffness.max(0.0);
        self.apply_joint_properties(physics);
    }

    pub fn set_plate_mass(&mut self, physics: &mut PhysicsWorld, mass: f32) {
        if let Some(plate) = self.bodies.get_mut(physics, PLATE) {
            plate.mass = MassType::Normal {
                mass,
                inertia: PLATE_INERTIA,
            };
        }
    }

    /// Rest length and travel of the joint for the current lock state
    fn travel(&self) -> (f32, f32, f32) {
        if self.locked {
            let held = self.plate_width + LOCK_MARGIN;
            (held, held, held)
        } else {
            let extended = self.spring_length + self.plate_width;
            (extended, self.plate_width, extended)
        }
    }

    fn apply_joint_properties(&mut self, physics: &mut PhysicsWorld) {
        let (rest, min, max) = self.travel();
        let stiffness_now = self.stiffness;
        let Some(constraint) = self.joint.and_then(|key| physics.get_constraint_mut(key)) else {
            return;
        };
        if let ConstraintKind::Spring {
            rest_length,
            stiffness,
            min_length,
            max_length,
            ..
        } = &mut constraint.kind
        {
            *rest_length = rest;
            *stiffness = stiffness_now;
            *min_length = min;
            *max_length = max;
        }
    }
}

impl ComplexObject for Spring {
    object_parts!();

    fn build_constraints(&mut self, physics: &mut PhysicsWorld) {
        let (Some(base_key), Some(plate_key)) = (self.bodies.key(BASE), self.bodies.key(PLATE)) else {
            return;
        };
        let (Some(base), Some(plate)) = (physics.get_body(base_key), physics.get_body(plate_key)) else {
            return;
        };
        let axis = plate.position - base.position;
        let (rest, _, _) = self.travel();
        let joint = Constraint::spring(base_key, base, plate_key, plate, axis, rest, self.stiffness);
        self.joint = Some(self.constraints.add(physics, joint));
        self.apply_joint_properties(physics);
    }

    fn remove_from_world(&mut self, physics: &mut PhysicsWorld) {
        self.joint = None;
        crate::object::detach_parts(self, physics);
    }

    fn update(&mut self, physics: &PhysicsWorld) -> DirtyFlags {
        let force = -(self.spring_length - self.gap(physics)) * self.stiffness;
        if force != self.force {
            self.force = force;
            DirtyFlags::SHAPE
        } else {
            DirtyFlags::empty()
        }
    }

    fn on_dynamic_collide_begin(&mut self, event: &CollideEvent, ctx: &mut SimContext<'_>) {
        let hit_plate = event.own_body.is_some() && event.own_body == self.bodies.key(PLATE);
        let by_other = event.partner.as_ref().is_some_and(|p| p.key != ctx.entity);
        if self.detonator && self.locked && hit_plate && by_other {
            log::debug!("spring detonated");
            self.unlock(ctx.physics);
        }
    }
}
