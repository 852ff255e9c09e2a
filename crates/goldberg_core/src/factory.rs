//! Serializable entity specifications and the factory building them
//!
//! [`EntitySpec`] stores the construction parameters of each entity kind,
//! so levels can describe their content without holding physics bodies.
//! Entities are built at the origin; [`EntityTemplate`] adds the pose they
//! are placed at.

use goldberg_math::Vec2;
use serde::{Deserialize, Serialize};

use crate::entities::{
    Collectible, Domino, Entity, EntityKind, EntityTag, Goal, Lever, MagneticLever, Rope, Spring, StickySurface,
    Surface,
};
use crate::object::Pose;

/// Construction parameters of an entity
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum EntitySpec {
    Collectible {
        radius: f32,
    },
    Goal {
        width: f32,
        height: f32,
    },
    Surface {
        width: f32,
        height: f32,
        #[serde(default = "default_friction")]
        friction: f32,
    },
    StickySurface {
        width: f32,
        height: f32,
    },
    Lever {
        width: f32,
        height: f32,
    },
    MagneticLever {
        width: f32,
        height: f32,
    },
    Rope {
        /// Rope length between the top anchor and the bottom block
        height: f32,
    },
    Spring {
        stiffness: f32,
        height: f32,
        width: f32,
        #[serde(default)]
        detonator: bool,
    },
    Domino,
}

fn default_friction() -> f32 {
    crate::entities::SURFACE_FRICTION
}

impl EntitySpec {
    pub fn tag(&self) -> EntityTag {
        match self {
            EntitySpec::Collectible { .. } => EntityTag::Collectible,
            EntitySpec::Goal { .. } => EntityTag::Goal,
            EntitySpec::Surface { .. } => EntityTag::Surface,
            EntitySpec::StickySurface { .. } => EntityTag::StickySurface,
            EntitySpec::Lever { .. } => EntityTag::Lever,
            EntitySpec::MagneticLever { .. } => EntityTag::MagneticLever,
            EntitySpec::Rope { .. } => EntityTag::Rope,
            EntitySpec::Spring { .. } => EntityTag::Spring,
            EntitySpec::Domino => EntityTag::Domino,
        }
    }

    /// Parameters used when a kind is taken from an inventory
    pub fn default_for(tag: EntityTag) -> Self {
        match tag {
            EntityTag::Collectible => EntitySpec::Collectible { radius: 0.5 },
            EntityTag::Goal => EntitySpec::Goal {
                width: 2.0,
                height: 1.5,
            },
            EntityTag::Surface => EntitySpec::Surface {
                width: 4.0,
                height: 0.5,
                friction: default_friction(),
            },
            EntityTag::StickySurface => EntitySpec::StickySurface {
                width: 0.5,
                height: 4.0,
            },
            EntityTag::Lever => EntitySpec::Lever {
                width: 4.0,
                height: 0.3,
            },
            EntityTag::MagneticLever => EntitySpec::MagneticLever {
                width: 4.0,
                height: 0.3,
            },
            EntityTag::Rope => EntitySpec::Rope { height: 3.0 },
            EntityTag::Spring => EntitySpec::Spring {
                stiffness: 100.0,
                height: 1.5,
                width: 3.0,
                detonator: false,
            },
            EntityTag::Domino => EntitySpec::Domino,
        }
    }
}

/// Builds entities from their specification
pub struct EntityFactory;

impl EntityFactory {
    /// Create a new entity at the origin
    pub fn build(spec: &EntitySpec) -> Entity {
        let kind = match *spec {
            EntitySpec::Collectible { radius } => EntityKind::Collectible(Collectible::new(radius)),
            EntitySpec::Goal { width, height } => EntityKind::Goal(Goal::new(width, height)),
            EntitySpec::Surface {
                width,
                height,
                friction,
            } => EntityKind::Surface(Surface::new(width, height, friction)),
            EntitySpec::StickySurface { width, height } => EntityKind::StickySurface(StickySurface::new(width, height)),
            EntitySpec::Lever { width, height } => EntityKind::Lever(Lever::new(width, height)),
            EntitySpec::MagneticLever { width, height } => EntityKind::MagneticLever(MagneticLever::new(width, height)),
            EntitySpec::Rope { height } => EntityKind::Rope(Rope::new(height)),
            EntitySpec::Spring {
                stiffness,
                height,
                width,
                detonator,
            } => {
                let mut spring = Spring::new(stiffness, height, width);
                spring.set_detonator(detonator);
                EntityKind::Spring(spring)
            }
            EntitySpec::Domino => EntityKind::Domino(Domino::new()),
        };
        Entity::new(kind)
    }

    pub fn build_default(tag: EntityTag) -> Entity {
        Self::build(&EntitySpec::default_for(tag))
    }
}

/// A serializable entity placed at a pose
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EntityTemplate {
    pub spec: EntitySpec,
    pub position: Vec2,
    #[serde(default)]
    pub angle: f32,
}

impl EntityTemplate {
    pub fn new(spec: EntitySpec, position: Vec2) -> Self {
        Self {
            spec,
            position,
            angle: 0.0,
        }
    }

    pub fn with_angle(mut self, angle: f32) -> Self {
        self.angle = angle;
        self
    }

    pub fn pose(&self) -> Pose {
        Pose::new(self.position, self.angle)
    }
}
