//! Game orchestration: build, prepare and run a level
//!
//! [`GoldbergGame`] owns the [`DynamicWorld`] and drives it through three
//! states. In `Building` the level author places fixed entities. In
//! `Preparing` the player places gameplay entities from the inventory. In
//! `Running` the world is dynamic and an [`EndOfGameWatcher`] decides the
//! outcome. Leaving `Running` restores every entity to the pose it had when
//! the run started.

use std::fmt;
use std::time::Duration;

use goldberg_physics::PhysicsConfig;
use serde::{Deserialize, Serialize};

use crate::dynamic_world::{BoundsKind, DynamicWorld, EntityKey, DEFAULT_BORDER_FRICTION};
use crate::entities::{Entity, EntityTag};
use crate::error::{GameError, Requirement, RunGuard};
use crate::inventory::Inventory;
use crate::level::{BorderType, Level};
use crate::object::{ComplexObject, Pose};
use crate::pairs::CollidingPair;
use crate::watcher::{CollectibleProbe, EndOfGameWatcher, Outcome, WatchSnapshot, WatchTimings};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GameState {
    #[default]
    Building,
    Preparing,
    Running,
}

impl fmt::Display for GameState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Tunables of a game session
#[derive(Clone, Debug)]
pub struct GameSettings {
    pub physics: PhysicsConfig,
    pub border_friction: f32,
    pub update_ratio: f32,
    pub timings: WatchTimings,
}

impl Default for GameSettings {
    fn default() -> Self {
        Self {
            physics: PhysicsConfig::default(),
            border_friction: DEFAULT_BORDER_FRICTION,
            update_ratio: 1.0,
            timings: WatchTimings::default(),
        }
    }
}

/// Read-only snapshot of the game for presentation layers
#[derive(Clone, Debug, PartialEq)]
pub struct GameView {
    pub state: GameState,
    pub bounds: BoundsKind,
    pub game_over: bool,
    pub won: bool,
    pub gameplay: Vec<EntityKey>,
    pub fixed: Vec<EntityKey>,
    pub pairs: Vec<CollidingPair>,
    /// Entities placed on top of another one
    pub overlapping: Vec<EntityKey>,
}

/// Longest wait for the world to confirm static mode before a restore
const MODE_SWITCH_TIMEOUT: Duration = Duration::from_millis(200);

/// Body poses of every entity, gameplay entities first
type Checkpoint = Vec<(EntityKey, Vec<Pose>)>;

#[derive(Clone, Debug)]
struct Drag {
    entity: EntityKey,
    /// Body poses when the drag started
    origin: Vec<Pose>,
}

/// The puzzle game state machine
pub struct GoldbergGame {
    world: DynamicWorld,
    settings: GameSettings,
    state: GameState,
    level: Option<Level>,
    fixed: Vec<EntityKey>,
    gameplay: Vec<EntityKey>,
    /// Player inventory for the loaded level
    inventory: Option<Inventory>,
    building_inventory: Inventory,
    checkpoint: Option<Checkpoint>,
    /// Checkpoint waiting for the step loop to observe static mode
    pending_restore: Option<Checkpoint>,
    watcher: EndOfGameWatcher,
    game_over: bool,
    won: bool,
    /// Simulated seconds since the current run started
    sim_time: f32,
    dragged: Option<Drag>,
}

impl Default for GoldbergGame {
    fn default() -> Self {
        Self::new(GameSettings::default())
    }
}

impl GoldbergGame {
    pub fn new(settings: GameSettings) -> Self {
        let mut world = DynamicWorld::with_physics_config(settings.physics.clone());
        world.set_border_friction(settings.border_friction);
        world.set_update_ratio(settings.update_ratio);
        Self {
            world,
            watcher: EndOfGameWatcher::new(settings.timings),
            settings,
            state: GameState::Building,
            level: None,
            fixed: Vec::new(),
            gameplay: Vec::new(),
            inventory: None,
            building_inventory: Inventory::building(),
            checkpoint: None,
            pending_restore: None,
            game_over: false,
            won: false,
            sim_time: 0.0,
            dragged: None,
        }
    }

    pub fn world(&self) -> &DynamicWorld {
        &self.world
    }

    pub fn settings(&self) -> &GameSettings {
        &self.settings
    }

    pub fn state(&self) -> GameState {
        self.state
    }

    pub fn level(&self) -> Option<&Level> {
        self.level.as_ref()
    }

    pub fn is_game_over(&self) -> bool {
        self.game_over
    }

    pub fn is_won(&self) -> bool {
        self.won
    }

    /// Simulated seconds since the current run started
    pub fn sim_time(&self) -> f32 {
        self.sim_time
    }

    pub fn fixed_entities(&self) -> &[EntityKey] {
        &self.fixed
    }

    pub fn gameplay_entities(&self) -> &[EntityKey] {
        &self.gameplay
    }

    /// Whether a reset is still waiting for the world to reach static mode
    pub fn is_restoring(&self) -> bool {
        self.pending_restore.is_some()
    }

    fn violation(&self, required: Requirement) -> GameError {
        let err = GameError::StateViolation {
            required,
            actual: self.state,
        };
        log::warn!("refused: {}", err);
        err
    }

    fn require(&self, state: GameState) -> Result<(), GameError> {
        if self.state == state {
            Ok(())
        } else {
            Err(self.violation(Requirement::State(state)))
        }
    }

    fn require_not(&self, state: GameState) -> Result<(), GameError> {
        if self.state == state {
            Err(self.violation(Requirement::NotState(state)))
        } else {
            Ok(())
        }
    }

    // --- State machine ---

    /// Move to another state
    ///
    /// Requesting the current state does nothing. Entering `Running` is only
    /// possible from `Preparing` once [`GoldbergGame::can_run`] holds.
    pub fn set_state(&mut self, state: GameState) -> Result<(), GameError> {
        if state == self.state {
            return Ok(());
        }
        match state {
            GameState::Building => self.enter_building(),
            GameState::Preparing => self.enter_preparing(),
            GameState::Running => self.enter_running()?,
        }
        log::debug!("game state {} -> {}", self.state, state);
        self.state = state;
        Ok(())
    }

    fn enter_building(&mut self) {
        self.leave_run();
        for key in std::mem::take(&mut self.gameplay) {
            self.world.remove_entity(key);
        }
        self.inventory = self.level.as_ref().map(|level| level.inventory.clone());
    }

    fn enter_preparing(&mut self) {
        self.leave_run();
    }

    fn leave_run(&mut self) {
        self.watcher.cancel();
        self.game_over = false;
        self.won = false;
        self.dragged = None;
        let signal = self.world.mode_signal();
        signal.invalidate();
        self.world.set_dynamic(false);
        if let Some(checkpoint) = self.checkpoint.take() {
            if signal.wait_for(false, MODE_SWITCH_TIMEOUT) {
                self.restore(checkpoint);
            } else {
                log::warn!("world did not report static mode, restoring on the next tick");
                self.pending_restore = Some(checkpoint);
            }
        }
    }

    fn enter_running(&mut self) -> Result<(), GameError> {
        self.require(GameState::Preparing)?;
        // A reset requested earlier must land before the guards look at the poses
        if let Some(checkpoint) = self.pending_restore.take() {
            self.restore(checkpoint);
        }
        if let Err(guard) = self.can_run() {
            return Err(self.violation(Requirement::Guard(guard)));
        }
        self.dragged = None;
        self.checkpoint = Some(self.capture());
        self.sim_time = 0.0;
        self.game_over = false;
        self.won = false;
        self.world.set_dynamic(true);
        self.watcher.start();
        if !self.world.is_running() {
            self.watcher.cancel();
        }
        Ok(())
    }

    /// Go back to `Preparing` from a run, restoring the starting poses
    pub fn reset(&mut self) -> Result<(), GameError> {
        self.require(GameState::Running)?;
        self.set_state(GameState::Preparing)
    }

    /// Check the preconditions of a run
    pub fn can_run(&self) -> Result<(), RunGuard> {
        if self.level.is_none() {
            return Err(RunGuard::NoLevel);
        }
        if self.count_tag(EntityTag::Collectible) == 0 {
            return Err(RunGuard::NoCollectible);
        }
        if self.count_tag(EntityTag::Goal) == 0 {
            return Err(RunGuard::NoGoal);
        }
        if self.world.has_distinct_overlap() {
            return Err(RunGuard::Overlap);
        }
        Ok(())
    }

    pub fn is_feasible(&self) -> bool {
        self.can_run().is_ok()
    }

    fn count_tag(&self, tag: EntityTag) -> usize {
        self.tracked()
            .filter(|&key| self.world.get_entity(key).is_some_and(|e| e.tag() == tag))
            .count()
    }

    /// Every game entity, gameplay first
    fn tracked(&self) -> impl Iterator<Item = EntityKey> + '_ {
        self.gameplay.iter().chain(&self.fixed).copied()
    }

    fn capture(&self) -> Checkpoint {
        self.tracked()
            .filter_map(|key| Some((key, self.world.body_poses(key)?)))
            .collect()
    }

    fn restore(&mut self, checkpoint: Checkpoint) {
        self.world.release_held_constraints();
        for (key, poses) in &checkpoint {
            self.world.restore_body_poses(*key, poses);
        }
        for key in self.tracked().collect::<Vec<_>>() {
            self.world.reset_collectible(key);
        }
        log::debug!("restored {} entities", checkpoint.len());
    }

    /// Resume the simulation
    ///
    /// The watcher picks the current run up where it stopped.
    pub fn start(&mut self) {
        self.world.start();
        if self.state == GameState::Running && !self.game_over {
            self.watcher.resume();
        }
    }

    /// Pause the simulation
    pub fn stop(&mut self) {
        self.world.pause();
        self.watcher.cancel();
    }

    pub fn is_running(&self) -> bool {
        self.world.is_running()
    }

    /// Advance the game by `dt` seconds of wall time
    pub fn tick(&mut self, dt: f32) {
        self.world.tick(dt);

        if self.pending_restore.is_some() && self.world.mode_signal().observed() == Some(false) {
            if let Some(checkpoint) = self.pending_restore.take() {
                self.restore(checkpoint);
            }
        }

        if self.state == GameState::Running && self.world.is_running() {
            let sim_dt = dt * self.world.update_ratio();
            self.sim_time += sim_dt;
            let world = &self.world;
            self.watcher.advance(sim_dt, || watch_snapshot(world));
        }

        for verdict in self.watcher.poll_all() {
            if verdict.epoch != self.watcher.epoch() {
                log::debug!("discarding verdict of cancelled run {}", verdict.epoch);
                continue;
            }
            self.game_over = true;
            self.won = verdict.outcome == Outcome::Won;
            log::info!(
                "game over after {:.1}s: {}",
                self.sim_time,
                if self.won { "won" } else { "lost" }
            );
        }
    }

    // --- Level ---

    /// Load a level, replacing everything in the world
    pub fn set_level(&mut self, level: Level) -> Result<(), GameError> {
        self.require_not(GameState::Running)?;
        self.clear();

        self.world.set_size(level.width, level.height);
        match level.borders {
            BorderType::Normal => self.world.set_all_bounds(),
            BorderType::Teleportable => self.world.set_cross_teleport(true),
        }
        self.world.set_gravity(level.planet.world_gravity());
        for template in &level.fixed {
            self.fixed.push(self.world.spawn(template));
        }
        self.inventory = Some(level.inventory.clone());
        log::info!(
            "loaded level '{}' by {} ({} fixed entities, {:?})",
            level.name,
            level.creator,
            self.fixed.len(),
            level.planet
        );
        self.level = Some(level);
        Ok(())
    }

    /// Drop the level and every entity
    pub fn clear(&mut self) {
        self.watcher.cancel();
        self.world.clear();
        self.world.set_cross_teleport(false);
        self.fixed.clear();
        self.gameplay.clear();
        self.checkpoint = None;
        self.pending_restore = None;
        self.dragged = None;
        self.level = None;
        self.inventory = None;
        self.game_over = false;
        self.won = false;
    }

    /// Kinds the player may currently place
    ///
    /// `None` when no level is loaded.
    pub fn allowed_inventory(&self) -> Option<&Inventory> {
        self.level.as_ref()?;
        match self.state {
            GameState::Building => Some(&self.building_inventory),
            _ => self.inventory.as_ref(),
        }
    }

    // --- Entities ---

    /// Add an entity to the level setup
    pub fn add_fixed_entity(&mut self, entity: Entity) -> Result<EntityKey, GameError> {
        self.require(GameState::Building)?;
        let key = self.world.add_entity(entity);
        self.fixed.push(key);
        Ok(key)
    }

    pub fn remove_fixed_entity(&mut self, key: EntityKey) -> Result<Entity, GameError> {
        self.require(GameState::Building)?;
        if !self.fixed.contains(&key) {
            return Err(GameError::UnknownEntity);
        }
        self.fixed.retain(|&k| k != key);
        self.forget_drag(key);
        self.world.remove_entity(key).ok_or(GameError::UnknownEntity)
    }

    /// Place a player entity, taking it from the inventory
    pub fn add_gameplay_entity(&mut self, entity: Entity) -> Result<EntityKey, GameError> {
        self.require(GameState::Preparing)?;
        let tag = entity.tag();
        if !tag.is_placeable() {
            log::warn!("refused: {} is not placeable", tag);
            return Err(GameError::NotPlaceable(tag));
        }
        if let Some(inventory) = &mut self.inventory {
            if !inventory.pick(tag) {
                log::warn!("refused: no {} left in the inventory", tag);
                return Err(GameError::OutOfStock(tag));
            }
        }
        let key = self.world.add_entity(entity);
        self.gameplay.push(key);
        Ok(key)
    }

    /// Take back a player entity, returning it to the inventory
    pub fn remove_gameplay_entity(&mut self, key: EntityKey) -> Result<Entity, GameError> {
        self.require(GameState::Preparing)?;
        if !self.gameplay.contains(&key) {
            return Err(GameError::UnknownEntity);
        }
        self.gameplay.retain(|&k| k != key);
        self.forget_drag(key);
        let entity = self.world.remove_entity(key).ok_or(GameError::UnknownEntity)?;
        if let Some(inventory) = &mut self.inventory {
            inventory.put(entity.tag());
        }
        Ok(entity)
    }

    /// Entity at a key, if it belongs to the game
    pub fn entity(&self, key: EntityKey) -> Option<&Entity> {
        self.world.get_entity(key)
    }

    pub fn pose(&self, key: EntityKey) -> Option<Pose> {
        self.world.pose(key)
    }

    // --- Dragging ---

    /// Start moving an entity by hand
    ///
    /// Fixed entities can be dragged while building, gameplay entities while
    /// preparing.
    pub fn set_dragged(&mut self, key: EntityKey) -> Result<(), GameError> {
        self.require_not(GameState::Running)?;
        let owned = match self.state {
            GameState::Building => &self.fixed,
            _ => &self.gameplay,
        };
        if !owned.contains(&key) {
            return Err(GameError::UnknownEntity);
        }
        let origin = self.world.body_poses(key).ok_or(GameError::UnknownEntity)?;
        self.dragged = Some(Drag { entity: key, origin });
        Ok(())
    }

    pub fn dragged(&self) -> Option<EntityKey> {
        self.dragged.as_ref().map(|drag| drag.entity)
    }

    /// Move the dragged entity to an absolute position
    pub fn move_dragged(&mut self, x: f32, y: f32) -> Result<(), GameError> {
        self.require_not(GameState::Running)?;
        let entity = self.dragged().ok_or(GameError::NoDraggedEntity)?;
        self.world.translate_entity(entity, x, y);
        Ok(())
    }

    /// Rotate the dragged entity to an absolute angle
    pub fn rotate_dragged(&mut self, theta: f32) -> Result<(), GameError> {
        self.require_not(GameState::Running)?;
        let entity = self.dragged().ok_or(GameError::NoDraggedEntity)?;
        self.world.rotate_entity(entity, theta);
        Ok(())
    }

    /// Release the dragged entity
    ///
    /// Returns `false` when the entity overlapped another one and was put back
    /// where the drag started.
    pub fn drop_dragged(&mut self) -> Result<bool, GameError> {
        self.require_not(GameState::Running)?;
        let drag = self.dragged.take().ok_or(GameError::NoDraggedEntity)?;
        if self.world.entity_overlaps_other(drag.entity) {
            self.world.restore_body_poses(drag.entity, &drag.origin);
            log::debug!("drop of {:?} overlaps, reverted", drag.entity);
            return Ok(false);
        }
        Ok(true)
    }

    fn forget_drag(&mut self, key: EntityKey) {
        if self.dragged() == Some(key) {
            self.dragged = None;
        }
    }

    // --- Player actions ---

    /// Drop whatever a rope or magnetic lever holds
    pub fn release_held(&mut self, key: EntityKey) -> Option<EntityKey> {
        if self.state != GameState::Running {
            return None;
        }
        self.world.release_held(key)
    }

    /// Unlock a spring so it can push
    pub fn unlock_spring(&mut self, key: EntityKey) -> Result<(), GameError> {
        let (entity, physics) = self.world.entity_and_physics(key).ok_or(GameError::UnknownEntity)?;
        let spring = entity.as_spring_mut().ok_or(GameError::UnknownEntity)?;
        spring.unlock(physics);
        Ok(())
    }

    pub fn view(&self) -> GameView {
        GameView {
            state: self.state,
            bounds: self.world.bounds_kind(),
            game_over: self.game_over,
            won: self.won,
            gameplay: self.gameplay.clone(),
            fixed: self.fixed.clone(),
            pairs: self.world.collision_pairs().iter().copied().collect(),
            overlapping: self
                .world
                .entity_keys()
                .iter()
                .copied()
                .filter(|&key| self.world.get_entity(key).is_some_and(|e| e.is_overlapping()))
                .collect(),
        }
    }
}

/// Sample the collectibles and goals of the world
fn watch_snapshot(world: &DynamicWorld) -> WatchSnapshot {
    let physics = world.physics();
    let mut snapshot = WatchSnapshot::default();
    for &key in world.entity_keys() {
        let Some(entity) = world.get_entity(key) else {
            continue;
        };
        if let Some(collectible) = entity.as_collectible() {
            snapshot.collectibles.push(CollectibleProbe {
                position: entity.position(physics),
                captured: collectible.is_captured(),
                immobile: collectible.is_immobile(physics),
            });
        } else if entity.tag() == EntityTag::Goal {
            snapshot.goals.push(entity.position(physics));
        }
    }
    snapshot
}
