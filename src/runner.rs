//! Headless level runner
//!
//! Drives a [`GoldbergGame`] through Preparing and Running with a fixed frame
//! time, the way a frontend would drive it from its event loop.

use goldberg_core::{
    EntityFactory, EntityKey, EntitySpec, EntityTag, EntityTemplate, GameError, GameState, GoldbergGame, Inventory,
    Level, Planet, Quantity, Requirement, RunGuard, Vec2,
};

use crate::config::AppConfig;

/// How a run ended
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RunOutcome {
    Won { seconds: f32 },
    Lost { seconds: f32 },
    /// The frame limit was reached first
    Undecided,
}

/// Runs one level without a window
pub struct LevelRunner {
    game: GoldbergGame,
    frame_dt: f32,
    max_frames: u32,
}

impl LevelRunner {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            game: GoldbergGame::new(config.game_settings()),
            frame_dt: config.simulation.frame_dt,
            max_frames: config.simulation.max_frames,
        }
    }

    pub fn game(&self) -> &GoldbergGame {
        &self.game
    }

    pub fn game_mut(&mut self) -> &mut GoldbergGame {
        &mut self.game
    }

    /// Load a level and get ready for the player's parts
    pub fn load(&mut self, level: Level) -> Result<(), GameError> {
        if self.game.state() == GameState::Running {
            self.game.set_state(GameState::Preparing)?;
        }
        self.game.set_level(level)?;
        self.game.set_state(GameState::Preparing)
    }

    /// Place a part from the inventory
    ///
    /// A part that would overlap another entity is taken back.
    pub fn place(&mut self, template: &EntityTemplate) -> Result<EntityKey, GameError> {
        let key = self.game.add_gameplay_entity(EntityFactory::build(&template.spec))?;
        self.game.set_dragged(key)?;
        self.game.move_dragged(template.position.x, template.position.y)?;
        if template.angle != 0.0 {
            self.game.rotate_dragged(template.angle)?;
        }
        if !self.game.drop_dragged()? {
            log::warn!("{} at {:?} overlaps, taken back", template.spec.tag(), template.position);
            self.game.remove_gameplay_entity(key)?;
            return Err(GameError::StateViolation {
                required: Requirement::Guard(RunGuard::Overlap),
                actual: self.game.state(),
            });
        }
        Ok(key)
    }

    /// Simulate until the game is decided or the frame limit is hit
    pub fn run(&mut self) -> Result<RunOutcome, GameError> {
        if self.game.state() == GameState::Building {
            self.game.set_state(GameState::Preparing)?;
        }
        self.game.start();
        self.game.set_state(GameState::Running)?;

        for frame in 0..self.max_frames {
            self.game.tick(self.frame_dt);
            if self.game.is_game_over() {
                log::debug!("decided on frame {}", frame);
                let seconds = self.game.sim_time();
                return Ok(if self.game.is_won() {
                    RunOutcome::Won { seconds }
                } else {
                    RunOutcome::Lost { seconds }
                });
            }
        }
        Ok(RunOutcome::Undecided)
    }
}

/// A coin above a ramp, and a goal at the bottom right
pub fn demo_level() -> Level {
    Level::new("Ramp", "", 20.0, 12.0)
        .with_planet(Planet::Earth)
        .with_fixed(EntityTemplate::new(EntitySpec::Collectible { radius: 0.4 }, Vec2::new(4.0, 10.0)))
        .with_fixed(EntityTemplate::new(
            EntitySpec::Goal {
                width: 5.0,
                height: 1.0,
            },
            Vec2::new(16.5, 1.0),
        ))
        .with_inventory(Inventory::new().with_item(EntityTag::Surface, Quantity::Countable(1)))
}

/// Parts the player puts down to solve [`demo_level`]
pub fn demo_solution() -> Vec<EntityTemplate> {
    vec![EntityTemplate::new(
        EntitySpec::Surface {
            width: 10.0,
            height: 0.5,
            friction: 0.1,
        },
        Vec2::new(8.0, 6.0),
    )
    .with_angle(-0.35)]
}
