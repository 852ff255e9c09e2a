//! Collision detection for 2D shapes
//!
//! Provides narrowphase tests between circles and oriented rectangles, and
//! collision filtering via layer masks.

use bitflags::bitflags;

use crate::body::RigidBody2D;
use crate::shapes::Shape;
use goldberg_math::Vec2;

bitflags! {
    /// Collision layers for filtering which bodies can collide
    ///
    /// Each layer is a bit in a 32-bit mask. Bodies can belong to multiple layers
    /// and define which layers they collide with via a collision mask.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct CollisionLayer: u32 {
        /// Default layer for most bodies
        const DEFAULT = 1 << 0;
        /// Level geometry that never moves
        const STATIC = 1 << 1;
        /// Rigid edges of the simulation area
        const BOUND = 1 << 2;
        /// Collectible items (coins)
        const COLLECTIBLE = 1 << 3;
        /// Anchor points of jointed parts, never touched by anything
        const ANCHOR = 1 << 4;
        /// All layers (collide with everything)
        const ALL = 0xFFFFFFFF;
    }
}

/// Collision filter determining what a body collides with
///
/// Two bodies A and B collide if:
/// - (A.layer & B.mask) != 0, AND
/// - (B.layer & A.mask) != 0
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CollisionFilter {
    /// Which layer(s) this body belongs to
    pub layer: CollisionLayer,
    /// Which layer(s) this body can collide with
    pub mask: CollisionLayer,
}

impl Default for CollisionFilter {
    fn default() -> Self {
        Self {
            layer: CollisionLayer::DEFAULT,
            mask: CollisionLayer::ALL,
        }
    }
}

impl CollisionFilter {
    pub fn new(layer: CollisionLayer, mask: CollisionLayer) -> Self {
        Self { layer, mask }
    }

    /// Check if this filter allows collision with another filter
    pub fn collides_with(&self, other: &Self) -> bool {
        self.layer.intersects(other.mask) && other.layer.intersects(self.mask)
    }

    /// Filter for level geometry
    pub fn static_world() -> Self {
        Self::new(CollisionLayer::STATIC, CollisionLayer::ALL)
    }

    /// Filter for the rigid edges of the simulation area
    pub fn bound() -> Self {
        Self::new(CollisionLayer::BOUND, CollisionLayer::ALL)
    }

    /// Filter for collectibles
    pub fn collectible() -> Self {
        Self::new(CollisionLayer::COLLECTIBLE, CollisionLayer::ALL)
    }

    /// Filter for pivot anchors: belongs to its own layer and detects nothing
    pub fn anchor() -> Self {
        Self::new(CollisionLayer::ANCHOR, CollisionLayer::empty())
    }
}

/// Contact information from a collision test
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Contact {
    /// Point of contact in world space
    pub point: Vec2,
    /// Unit normal pointing from the first shape toward the second
    pub normal: Vec2,
    /// Penetration depth (positive means overlapping)
    pub penetration: f32,
}

impl Contact {
    pub fn new(point: Vec2, normal: Vec2, penetration: f32) -> Self {
        Self {
            point,
            normal,
            penetration,
        }
    }

    /// Check if this represents an actual collision (positive penetration)
    pub fn is_colliding(&self) -> bool {
        self.penetration > 0.0
    }

    /// Same contact seen from the other shape
    pub fn flipped(mut self) -> Self {
        self.normal = -self.normal;
        self
    }
}

/// Test circle vs circle
///
/// The contact normal points from circle A toward circle B.
pub fn circle_vs_circle(center_a: Vec2, radius_a: f32, center_b: Vec2, radius_b: f32) -> Option<Contact> {
    let delta = center_b - center_a;
    let min_dist = radius_a + radius_b;
    let dist_sq = delta.length_squared();
    if dist_sq >= min_dist * min_dist {
        return None;
    }
    let dist = dist_sq.sqrt();
    // Concentric circles: pick an arbitrary separation axis
    let normal = if dist > 1e-6 { delta / dist } else { Vec2::Y };
    let penetration = min_dist - dist;
    let point = center_a + normal * (radius_a - penetration * 0.5);
    Some(Contact::new(point, normal, penetration))
}

/// Test circle vs oriented rectangle
///
/// The contact normal points from the rectangle toward the circle.
pub fn circle_vs_rect(
    center: Vec2,
    radius: f32,
    rect_position: Vec2,
    rect_angle: f32,
    half_extents: Vec2,
) -> Option<Contact> {
    let local = (center - rect_position).rotated(-rect_angle);
    let clamped = Vec2::new(
        local.x.clamp(-half_extents.x, half_extents.x),
        local.y.clamp(-half_extents.y, half_extents.y),
    );
    let inside = local.x.abs() <= half_extents.x && local.y.abs() <= half_extents.y;

    let (normal_local, penetration, point_local) = if inside {
        // Center inside the rectangle: push out through the nearest face
        let dx = half_extents.x - local.x.abs();
        let dy = half_extents.y - local.y.abs();
        if dx < dy {
            let sign = if local.x >= 0.0 { 1.0 } else { -1.0 };
            (Vec2::new(sign, 0.0), dx + radius, Vec2::new(sign * half_extents.x, local.y))
        } else {
            let sign = if local.y >= 0.0 { 1.0 } else { -1.0 };
            (Vec2::new(0.0, sign), dy + radius, Vec2::new(local.x, sign * half_extents.y))
        }
    } else {
        let delta = local - clamped;
        let dist_sq = delta.length_squared();
        if dist_sq >= radius * radius {
            return None;
        }
        let dist = dist_sq.sqrt();
        (delta / dist, radius - dist, clamped)
    };

    Some(Contact::new(
        rect_position + point_local.rotated(rect_angle),
        normal_local.rotated(rect_angle),
        penetration,
    ))
}

/// Test oriented rectangle vs oriented rectangle using separating axes
///
/// The contact normal points from rectangle A toward rectangle B.
pub fn rect_vs_rect(
    position_a: Vec2,
    angle_a: f32,
    half_a: Vec2,
    position_b: Vec2,
    angle_b: f32,
    half_b: Vec2,
) -> Option<Contact> {
    let axes_a = [Vec2::X.rotated(angle_a), Vec2::Y.rotated(angle_a)];
    let axes_b = [Vec2::X.rotated(angle_b), Vec2::Y.rotated(angle_b)];
    let delta = position_b - position_a;

    let mut best_overlap = f32::MAX;
    let mut best_normal = Vec2::Y;
    let mut best_from_a = true;

    for (index, axis) in axes_a.iter().chain(axes_b.iter()).enumerate() {
        let radius_a = half_a.x * axes_a[0].dot(*axis).abs() + half_a.y * axes_a[1].dot(*axis).abs();
        let radius_b = half_b.x * axes_b[0].dot(*axis).abs() + half_b.y * axes_b[1].dot(*axis).abs();
        let distance = delta.dot(*axis);
        let overlap = radius_a + radius_b - distance.abs();
        if overlap <= 0.0 {
            return None;
        }
        if overlap < best_overlap {
            best_overlap = overlap;
            best_normal = if distance < 0.0 { -*axis } else { *axis };
            best_from_a = index < 2;
        }
    }

    // Contact point: the incident corner(s) reaching deepest across the reference face
    let point = if best_from_a {
        let corners = Shape::Rect { half_extents: half_b }.corners(position_b, angle_b);
        deepest_corners(&corners, -best_normal)
    } else {
        let corners = Shape::Rect { half_extents: half_a }.corners(position_a, angle_a);
        deepest_corners(&corners, best_normal)
    };

    Some(Contact::new(point, best_normal, best_overlap))
}

/// Average of the corners furthest along `direction`
fn deepest_corners(corners: &[Vec2], direction: Vec2) -> Vec2 {
    let max = corners
        .iter()
        .map(|c| c.dot(direction))
        .fold(f32::MIN, f32::max);
    let mut sum = Vec2::ZERO;
    let mut count = 0.0;
    for corner in corners {
        if max - corner.dot(direction) < 1e-4 {
            sum += *corner;
            count += 1.0;
        }
    }
    if count > 0.0 {
        sum / count
    } else {
        Vec2::ZERO
    }
}

/// Narrowphase test between two bodies
///
/// The contact normal points from body A toward body B. Layer filtering is
/// the caller's concern.
pub fn detect(a: &RigidBody2D, b: &RigidBody2D) -> Option<Contact> {
    let contact = match (a.shape, b.shape) {
        (Shape::Circle { radius: ra }, Shape::Circle { radius: rb }) => {
            circle_vs_circle(a.position, ra, b.position, rb)
        }
        (Shape::Circle { radius }, Shape::Rect { half_extents }) => {
            // circle_vs_rect points from the rectangle (B) toward the circle (A)
            circle_vs_rect(a.position, radius, b.position, b.angle, half_extents).map(Contact::flipped)
        }
        (Shape::Rect { half_extents }, Shape::Circle { radius }) => {
            circle_vs_rect(b.position, radius, a.position, a.angle, half_extents)
        }
        (Shape::Rect { half_extents: ha }, Shape::Rect { half_extents: hb }) => {
            rect_vs_rect(a.position, a.angle, ha, b.position, b.angle, hb)
        }
    };
    contact.filter(Contact::is_colliding)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::FRAC_PI_4;

    #[test]
    fn test_filter_collides_with() {
        let default = CollisionFilter::default();
        assert!(default.collides_with(&CollisionFilter::static_world()));
        assert!(default.collides_with(&CollisionFilter::bound()));
        assert!(!default.collides_with(&CollisionFilter::anchor()));
        assert!(!CollisionFilter::anchor().collides_with(&CollisionFilter::anchor()));
    }

    #[test]
    fn test_circle_vs_circle_overlapping() {
        let contact = circle_vs_circle(Vec2::ZERO, 1.0, Vec2::new(1.5, 0.0), 1.0).unwrap();
        assert_eq!(contact.normal, Vec2::X);
        assert!((contact.penetration - 0.5).abs() < 0.0001);
    }

    #[test]
    fn test_circle_vs_circle_separated() {
        assert!(circle_vs_circle(Vec2::ZERO, 1.0, Vec2::new(3.0, 0.0), 1.0).is_none());
        // Touching is not overlapping
        assert!(circle_vs_circle(Vec2::ZERO, 1.0, Vec2::new(2.0, 0.0), 1.0).is_none());
    }

    #[test]
    fn test_circle_resting_on_rect() {
        let contact = circle_vs_rect(Vec2::new(0.0, 1.4), 0.5, Vec2::ZERO, 0.0, Vec2::new(2.0, 1.0)).unwrap();
        assert!((contact.normal.y - 1.0).abs() < 0.0001);
        assert!((contact.penetration - 0.1).abs() < 0.0001);
        assert!((contact.point.y - 1.0).abs() < 0.0001);
    }

    #[test]
    fn test_circle_center_inside_rect() {
        let contact = circle_vs_rect(Vec2::new(1.8, 0.0), 0.5, Vec2::ZERO, 0.0, Vec2::new(2.0, 1.0)).unwrap();
        assert_eq!(contact.normal, Vec2::X);
        assert!((contact.penetration - 0.7).abs() < 0.0001);
    }

    #[test]
    fn test_circle_near_rotated_rect_corner() {
        // Rect rotated 45 degrees: its corner points straight up at (0, sqrt(2))
        let half = Vec2::new(1.0, 1.0);
        assert!(circle_vs_rect(Vec2::new(0.0, 1.9), 0.4, Vec2::ZERO, FRAC_PI_4, half).is_none());
        let contact = circle_vs_rect(Vec2::new(0.0, 1.6), 0.4, Vec2::ZERO, FRAC_PI_4, half).unwrap();
        assert!(contact.normal.y > 0.99);
    }

    #[test]
    fn test_rect_vs_rect_axis_aligned() {
        let contact = rect_vs_rect(
            Vec2::ZERO,
            0.0,
            Vec2::new(1.0, 1.0),
            Vec2::new(0.0, 1.8),
            0.0,
            Vec2::new(1.0, 1.0),
        )
        .unwrap();
        assert_eq!(contact.normal, Vec2::Y);
        assert!((contact.penetration - 0.2).abs() < 0.0001);
        // Averaged bottom edge of B
        assert!((contact.point.x).abs() < 0.0001);
        assert!((contact.point.y - 0.8).abs() < 0.0001);
    }

    #[test]
    fn test_rect_vs_rect_separated_by_rotated_axis() {
        // Diamond next to a square: AABBs overlap but the diamond's axis separates
        let result = rect_vs_rect(
            Vec2::ZERO,
            0.0,
            Vec2::new(1.0, 1.0),
            Vec2::new(2.3, 2.3),
            FRAC_PI_4,
            Vec2::new(1.0, 1.0),
        );
        assert!(result.is_none());
    }

    #[test]
    fn test_detect_normal_points_from_a_to_b() {
        let floor = RigidBody2D::new_static_rect(10.0, 1.0);
        let ball = RigidBody2D::new_circle(0.5).with_position(Vec2::new(0.0, 0.9));

        let ab = detect(&floor, &ball).unwrap();
        assert!(ab.normal.y > 0.99);
        let ba = detect(&ball, &floor).unwrap();
        assert!(ba.normal.y < -0.99);
    }
}
