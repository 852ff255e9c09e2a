//! Constraints linking two bodies
//!
//! Constraints are solved at the position level after integration, with a
//! velocity fix-up so that corrected bodies do not immediately drift apart
//! again. Anchors are stored in body-local coordinates.

use crate::body::{BodyKey, RigidBody2D};
use goldberg_math::Vec2;
use slotmap::new_key_type;

new_key_type! {
    /// Key to a constraint in the physics world
    pub struct ConstraintKey;
}

/// The kinds of linkage between two bodies
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ConstraintKind {
    /// Pins a point of B onto a point of A; both rotate freely around it
    Revolute { local_a: Vec2, local_b: Vec2 },
    /// Keeps two anchor points at most `max_length` apart
    Rope {
        local_a: Vec2,
        local_b: Vec2,
        max_length: f32,
    },
    /// Keeps B at a fixed pose relative to A
    Weld {
        local_a: Vec2,
        local_b: Vec2,
        reference_angle: f32,
    },
    /// B slides along an axis fixed in A, pushed by a linear spring,
    /// with its travel limited to `[min_length, max_length]`
    Spring {
        local_a: Vec2,
        axis: Vec2,
        reference_angle: f32,
        rest_length: f32,
        stiffness: f32,
        damping: f32,
        min_length: f32,
        max_length: f32,
    },
}

/// A constraint between two bodies
#[derive(Clone, Debug)]
pub struct Constraint {
    pub body_a: BodyKey,
    pub body_b: BodyKey,
    pub kind: ConstraintKind,
    /// Whether the two linked bodies still generate contacts with each other
    pub collide_connected: bool,
}

impl Constraint {
    /// Pin B to A at a world-space anchor
    pub fn revolute(key_a: BodyKey, a: &RigidBody2D, key_b: BodyKey, b: &RigidBody2D, anchor: Vec2) -> Self {
        Self {
            body_a: key_a,
            body_b: key_b,
            kind: ConstraintKind::Revolute {
                local_a: a.world_to_local(anchor),
                local_b: b.world_to_local(anchor),
            },
            collide_connected: false,
        }
    }

    /// Limit the distance between two world-space anchors
    pub fn rope(
        key_a: BodyKey,
        a: &RigidBody2D,
        anchor_a: Vec2,
        key_b: BodyKey,
        b: &RigidBody2D,
        anchor_b: Vec2,
        max_length: f32,
    ) -> Self {
        Self {
            body_a: key_a,
            body_b: key_b,
            kind: ConstraintKind::Rope {
                local_a: a.world_to_local(anchor_a),
                local_b: b.world_to_local(anchor_b),
                max_length: max_length.max(0.0),
            },
            collide_connected: false,
        }
    }

    /// Freeze the current relative pose of B with respect to A around a world anchor
    pub fn weld(key_a: BodyKey, a: &RigidBody2D, key_b: BodyKey, b: &RigidBody2D, anchor: Vec2) -> Self {
        Self {
            body_a: key_a,
            body_b: key_b,
            kind: ConstraintKind::Weld {
                local_a: a.world_to_local(anchor),
                local_b: b.world_to_local(anchor),
                reference_angle: b.angle - a.angle,
            },
            collide_connected: false,
        }
    }

    /// Spring along the world-space `axis` starting at A's center
    pub fn spring(
        key_a: BodyKey,
        a: &RigidBody2D,
        key_b: BodyKey,
        b: &RigidBody2D,
        axis: Vec2,
        rest_length: f32,
        stiffness: f32,
    ) -> Self {
        let current = (b.position - a.position).dot(axis.normalized());
        Self {
            body_a: key_a,
            body_b: key_b,
            kind: ConstraintKind::Spring {
                local_a: Vec2::ZERO,
                axis: axis.normalized().rotated(-a.angle),
                reference_angle: b.angle - a.angle,
                rest_length,
                stiffness,
                damping: 0.0,
                min_length: current.min(rest_length),
                max_length: current.max(rest_length),
            },
            collide_connected: false,
        }
    }

    pub fn with_collide_connected(mut self, collide: bool) -> Self {
        self.collide_connected = collide;
        self
    }

    /// Check if the constraint touches the given body
    pub fn involves(&self, key: BodyKey) -> bool {
        self.body_a == key || self.body_b == key
    }

    /// Check if the constraint links exactly these two bodies (in either order)
    pub fn connects(&self, a: BodyKey, b: BodyKey) -> bool {
        (self.body_a == a && self.body_b == b) || (self.body_a == b && self.body_b == a)
    }

    /// Velocity-level part of the constraint (spring forces)
    pub(crate) fn apply_forces(&self, a: &mut RigidBody2D, b: &mut RigidBody2D, dt: f32) {
        if let ConstraintKind::Spring {
            local_a,
            axis,
            rest_length,
            stiffness,
            damping,
            ..
        } = self.kind
        {
            let axis = axis.rotated(a.angle);
            let origin = a.local_to_world(local_a);
            let extension = (b.position - origin).dot(axis);
            let closing = (b.velocity - a.velocity).dot(axis);
            let force = stiffness * (rest_length - extension) - damping * closing;
            let impulse = axis * (force * dt);
            b.velocity += impulse * b.inverse_mass();
            a.velocity -= impulse * a.inverse_mass();
        }
    }

    /// Position-level correction, run once per solver iteration
    pub(crate) fn solve_position(&self, a: &mut RigidBody2D, b: &mut RigidBody2D) {
        match self.kind {
            ConstraintKind::Revolute { local_a, local_b } => {
                solve_point(a, b, local_a, local_b);
            }
            ConstraintKind::Rope {
                local_a,
                local_b,
                max_length,
            } => {
                let pa = a.local_to_world(local_a);
                let pb = b.local_to_world(local_b);
                let delta = pb - pa;
                let length = delta.length();
                if length > max_length && length > 1e-6 {
                    let normal = delta / length;
                    separate_along(a, b, normal, -(length - max_length));
                }
            }
            ConstraintKind::Weld {
                local_a,
                local_b,
                reference_angle,
            } => {
                solve_angle(a, b, reference_angle);
                solve_point(a, b, local_a, local_b);
            }
            ConstraintKind::Spring {
                local_a,
                axis,
                reference_angle,
                min_length,
                max_length,
                ..
            } => {
                solve_angle(a, b, reference_angle);
                let axis = axis.rotated(a.angle);
                let origin = a.local_to_world(local_a);
                let offset = b.position - origin;
                let extension = offset.dot(axis);

                // Prismatic: no motion across the axis
                let lateral = offset - axis * extension;
                let (wa, wb) = weights(a, b);
                if wa + wb > 0.0 {
                    a.position += lateral * wa;
                    b.position -= lateral * wb;
                    let normal = lateral.normalized();
                    let across = (b.velocity - a.velocity).dot(normal);
                    a.velocity += normal * (across * wa);
                    b.velocity -= normal * (across * wb);
                }

                if extension < min_length {
                    separate_along(a, b, axis, min_length - extension);
                } else if extension > max_length {
                    separate_along(a, b, axis, -(extension - max_length));
                }
            }
        }
    }
}

/// Mass-weighted share of a correction taken by each body
fn weights(a: &RigidBody2D, b: &RigidBody2D) -> (f32, f32) {
    let wa = a.inverse_mass();
    let wb = b.inverse_mass();
    let total = wa + wb;
    if total > 0.0 {
        (wa / total, wb / total)
    } else {
        (0.0, 0.0)
    }
}

/// Move B along `normal` by `amount` relative to A and cancel relative
/// velocity that would undo the correction
fn separate_along(a: &mut RigidBody2D, b: &mut RigidBody2D, normal: Vec2, amount: f32) {
    let (wa, wb) = weights(a, b);
    if wa + wb == 0.0 {
        return;
    }
    a.position -= normal * (amount * wa);
    b.position += normal * (amount * wb);

    let relative = (b.velocity - a.velocity).dot(normal);
    // Only cancel velocity pointing back into the violated limit
    if relative * amount < 0.0 {
        a.velocity += normal * (relative * wa);
        b.velocity -= normal * (relative * wb);
    }
}

/// Make two anchor points coincide and match their velocities
fn solve_point(a: &mut RigidBody2D, b: &mut RigidBody2D, local_a: Vec2, local_b: Vec2) {
    let (wa, wb) = weights(a, b);
    if wa + wb == 0.0 {
        return;
    }
    let pa = a.local_to_world(local_a);
    let pb = b.local_to_world(local_b);
    let error = pb - pa;
    a.position += error * wa;
    b.position -= error * wb;

    let relative = b.velocity_at(pb) - a.velocity_at(pa);
    a.velocity += relative * wa;
    b.velocity -= relative * wb;
}

/// Keep `b.angle - a.angle` at the reference angle
fn solve_angle(a: &mut RigidBody2D, b: &mut RigidBody2D, reference_angle: f32) {
    let ia = a.inverse_inertia();
    let ib = b.inverse_inertia();
    let total = ia + ib;
    if total == 0.0 {
        // Rotation locked on both sides; if only linear mass exists, snap B
        if b.inverse_mass() > 0.0 {
            b.angle = a.angle + reference_angle;
            b.angular_velocity = a.angular_velocity;
        }
        return;
    }
    let error = (b.angle - a.angle) - reference_angle;
    a.angle += error * (ia / total);
    b.angle -= error * (ib / total);

    let relative = b.angular_velocity - a.angular_velocity;
    a.angular_velocity += relative * (ia / total);
    b.angular_velocity -= relative * (ib / total);
}
