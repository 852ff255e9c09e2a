//! Level description: play area, planet, borders, fixed entities and inventory

use serde::{Deserialize, Serialize};

use crate::factory::EntityTemplate;
use crate::inventory::Inventory;

/// Creator name used when none is given
pub const ANONYMOUS_CREATOR: &str = "Anonyme";

/// Where a level takes place; sets the strength of gravity
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Planet {
    Space,
    Moon,
    Mars,
    #[default]
    Earth,
    Jupiter,
    Sun,
    Muffin,
}

impl Planet {
    pub const ALL: [Planet; 7] = [
        Planet::Space,
        Planet::Moon,
        Planet::Mars,
        Planet::Earth,
        Planet::Jupiter,
        Planet::Sun,
        Planet::Muffin,
    ];

    /// Gravity acceleration magnitude in m/s²; negative pulls upward
    pub fn gravity(&self) -> f32 {
        match self {
            Planet::Space => 0.0,
            Planet::Moon => 1.6,
            Planet::Mars => 3.8,
            Planet::Earth => 9.8,
            Planet::Jupiter => 24.8,
            Planet::Sun => 273.9,
            Planet::Muffin => -6.66,
        }
    }

    /// Vertical gravity of the simulation world
    pub fn world_gravity(&self) -> f32 {
        -self.gravity()
    }

    /// Whether the level editor offers this planet
    pub fn allowed_in_builder(&self) -> bool {
        *self != Planet::Muffin
    }
}

/// Behavior of the play area edges
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum BorderType {
    /// Four rigid walls
    #[default]
    Normal,
    /// Leaving one side re-enters from the opposite side
    Teleportable,
}

/// A puzzle: the fixed setup and what the player may add to it
#[derive(Clone, Debug, PartialEq)]
pub struct Level {
    pub name: String,
    pub creator: String,
    pub width: f32,
    pub height: f32,
    pub planet: Planet,
    pub borders: BorderType,
    /// Entities placed by the level author, in placement order
    pub fixed: Vec<EntityTemplate>,
    pub inventory: Inventory,
}

impl Level {
    pub fn new(name: impl Into<String>, creator: impl Into<String>, width: f32, height: f32) -> Self {
        let creator = creator.into();
        let creator = if creator.trim().is_empty() {
            ANONYMOUS_CREATOR.to_string()
        } else {
            creator
        };
        Self {
            name: name.into(),
            creator,
            width,
            height,
            planet: Planet::default(),
            borders: BorderType::default(),
            fixed: Vec::new(),
            inventory: Inventory::new(),
        }
    }

    pub fn with_planet(mut self, planet: Planet) -> Self {
        self.planet = planet;
        self
    }

    pub fn with_borders(mut self, borders: BorderType) -> Self {
        self.borders = borders;
        self
    }

    pub fn with_fixed(mut self, template: EntityTemplate) -> Self {
        self.fixed.push(template);
        self
    }

    pub fn with_inventory(mut self, inventory: Inventory) -> Self {
        self.inventory = inventory;
        self
    }
}
