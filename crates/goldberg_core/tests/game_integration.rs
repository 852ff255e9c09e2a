//! Integration tests for the game state machine
//!
//! These tests load levels into a `GoldbergGame` and check:
//! 1. The Running guards and the errors they report
//! 2. Reset restores every entity exactly
//! 3. The end-of-game watcher decides wins and losses on the game tick
//! 4. Level settings (planet, borders, inventory) reach the world

use goldberg_core::{
    BorderType, BoundsKind, EntityFactory, EntitySpec, EntityTag, EntityTemplate, GameError, GameState, GoldbergGame,
    Inventory, Level, Planet, Quantity, Requirement, RunGuard, Vec2,
};

const DT: f32 = 1.0 / 60.0;

fn run(game: &mut GoldbergGame, seconds: f32) {
    let frames = (seconds / DT).round() as usize;
    for _ in 0..frames {
        game.tick(DT);
    }
}

fn coin_at(x: f32, y: f32) -> EntityTemplate {
    EntityTemplate::new(EntitySpec::Collectible { radius: 0.5 }, Vec2::new(x, y))
}

fn goal_at(x: f32, y: f32) -> EntityTemplate {
    EntityTemplate::new(
        EntitySpec::Goal {
            width: 2.0,
            height: 1.0,
        },
        Vec2::new(x, y),
    )
}

fn floor_at(x: f32, y: f32) -> EntityTemplate {
    EntityTemplate::new(
        EntitySpec::Surface {
            width: 6.0,
            height: 0.5,
            friction: 0.2,
        },
        Vec2::new(x, y),
    )
}

/// A coin dropped straight into a goal
fn easy_level() -> Level {
    Level::new("Easy", "tests", 20.0, 20.0)
        .with_fixed(coin_at(15.0, 3.0))
        .with_fixed(goal_at(15.0, 1.0))
        .with_inventory(Inventory::new().with_item(EntityTag::Surface, Quantity::Countable(2)))
}

fn guard_error(guard: RunGuard) -> GameError {
    GameError::StateViolation {
        required: Requirement::Guard(guard),
        actual: GameState::Preparing,
    }
}

// ==================== Feasibility Tests ====================

#[test]
fn test_cannot_run_without_level() {
    let mut game = GoldbergGame::default();
    game.set_state(GameState::Preparing).unwrap();
    assert_eq!(game.can_run(), Err(RunGuard::NoLevel));
    assert_eq!(game.set_state(GameState::Running), Err(guard_error(RunGuard::NoLevel)));
    assert_eq!(game.state(), GameState::Preparing);
}

#[test]
fn test_cannot_run_without_collectible() {
    let mut game = GoldbergGame::default();
    game.set_level(Level::new("No coin", "", 20.0, 20.0).with_fixed(goal_at(15.0, 1.0)))
        .unwrap();
    game.set_state(GameState::Preparing).unwrap();
    assert_eq!(game.set_state(GameState::Running), Err(guard_error(RunGuard::NoCollectible)));
}

#[test]
fn test_cannot_run_without_goal() {
    let mut game = GoldbergGame::default();
    game.set_level(Level::new("No goal", "", 20.0, 20.0).with_fixed(coin_at(5.0, 5.0)))
        .unwrap();
    game.set_state(GameState::Preparing).unwrap();
    assert_eq!(game.set_state(GameState::Running), Err(guard_error(RunGuard::NoGoal)));
}

#[test]
fn test_cannot_run_with_overlap() {
    let mut game = GoldbergGame::default();
    game.set_level(easy_level()).unwrap();
    game.set_state(GameState::Preparing).unwrap();
    let blocker = game
        .add_gameplay_entity(EntityFactory::build(&EntitySpec::Surface {
            width: 2.0,
            height: 0.5,
            friction: 0.2,
        }))
        .unwrap();
    game.set_dragged(blocker).unwrap();
    game.move_dragged(15.0, 3.2).unwrap();
    assert!(!game.is_feasible());
    assert_eq!(game.set_state(GameState::Running), Err(guard_error(RunGuard::Overlap)));

    game.remove_gameplay_entity(blocker).unwrap();
    assert!(game.is_feasible());
    assert_eq!(game.set_state(GameState::Running), Ok(()));
}

// ==================== Reset Tests ====================

/// Running then resetting puts every body back where it started
#[test]
fn test_reset_restores_poses_exactly() {
    let mut game = GoldbergGame::default();
    game.set_level(
        Level::new("Drop", "", 20.0, 20.0)
            .with_fixed(coin_at(5.0, 15.0))
            .with_fixed(goal_at(15.0, 1.0))
            .with_fixed(EntityTemplate::new(EntitySpec::Domino, Vec2::new(10.0, 1.5))),
    )
    .unwrap();
    game.set_state(GameState::Preparing).unwrap();

    let keys: Vec<_> = game.fixed_entities().to_vec();
    let before: Vec<_> = keys.iter().map(|&k| game.world().body_poses(k).unwrap()).collect();

    game.set_state(GameState::Running).unwrap();
    run(&mut game, 1.0);
    let coin = keys[0];
    assert!(game.pose(coin).unwrap().position.y < 15.0, "Coin should fall while running");

    game.reset().unwrap();
    assert_eq!(game.state(), GameState::Preparing);
    assert!(!game.is_restoring(), "The restore should land inside reset()");

    let after: Vec<_> = keys.iter().map(|&k| game.world().body_poses(k).unwrap()).collect();
    assert_eq!(before, after);
    assert!(!game.world().is_dynamic());
}

/// Poses are back to the checkpoint as soon as reset() returns
#[test]
fn test_reset_restores_before_returning() {
    let mut game = GoldbergGame::default();
    game.set_level(
        Level::new("Floor", "", 20.0, 20.0)
            .with_fixed(coin_at(5.0, 8.0))
            .with_fixed(floor_at(5.0, 5.0))
            .with_fixed(goal_at(15.0, 1.0)),
    )
    .unwrap();
    game.set_state(GameState::Preparing).unwrap();
    let coin = game.fixed_entities()[0];
    let saved = game.pose(coin).unwrap();

    game.set_state(GameState::Running).unwrap();
    run(&mut game, 3.0);
    assert!(game.pose(coin).unwrap().position.y < 6.5, "Coin should rest on the floor");

    game.reset().unwrap();
    assert_eq!(game.pose(coin).unwrap(), saved);
}

/// A run can start again right after a reset, judged on the restored poses
#[test]
fn test_run_again_right_after_reset() {
    let mut game = GoldbergGame::default();
    game.set_level(
        Level::new("Floor", "", 20.0, 20.0)
            .with_fixed(coin_at(5.0, 8.0))
            .with_fixed(floor_at(5.0, 5.0))
            .with_fixed(goal_at(15.0, 1.0)),
    )
    .unwrap();
    game.set_state(GameState::Preparing).unwrap();
    game.set_state(GameState::Running).unwrap();
    run(&mut game, 3.0);

    game.reset().unwrap();
    assert_eq!(game.set_state(GameState::Running), Ok(()));
    assert_eq!(game.state(), GameState::Running);
}

/// The restore does not need the simulation to be running
#[test]
fn test_reset_while_paused() {
    let mut game = GoldbergGame::default();
    game.set_level(easy_level()).unwrap();
    game.set_state(GameState::Preparing).unwrap();
    let coin = game.fixed_entities()[0];
    let start = game.pose(coin).unwrap();

    game.set_state(GameState::Running).unwrap();
    run(&mut game, 0.3);
    game.stop();
    assert!(!game.is_running());

    game.reset().unwrap();
    assert_eq!(game.pose(coin).unwrap(), start);
    assert!(!game.world().get_entity(coin).unwrap().as_collectible().unwrap().is_captured());
}

#[test]
fn test_reset_only_from_running() {
    let mut game = GoldbergGame::default();
    assert_eq!(
        game.reset(),
        Err(GameError::StateViolation {
            required: Requirement::State(GameState::Running),
            actual: GameState::Building,
        })
    );
}

// ==================== Watcher Tests ====================

/// A coin falling into the goal wins once the grace period is over
#[test]
fn test_win_after_grace_period() {
    let mut game = GoldbergGame::default();
    game.set_level(easy_level()).unwrap();
    game.set_state(GameState::Preparing).unwrap();
    game.set_state(GameState::Running).unwrap();

    run(&mut game, 1.5);
    assert!(!game.is_game_over(), "No verdict during the grace period");

    run(&mut game, 1.0);
    assert!(game.is_game_over());
    assert!(game.is_won());
    let view = game.view();
    assert!(view.game_over && view.won);
}

/// A coin floating in space never moves and the run is lost after the stall timeout
#[test]
fn test_loss_after_stall_timeout() {
    let mut game = GoldbergGame::default();
    game.set_level(
        Level::new("Space", "", 20.0, 20.0)
            .with_planet(Planet::Space)
            .with_fixed(coin_at(5.0, 10.0))
            .with_fixed(goal_at(15.0, 1.0)),
    )
    .unwrap();
    game.set_state(GameState::Preparing).unwrap();
    game.set_state(GameState::Running).unwrap();

    run(&mut game, 7.5);
    assert!(!game.is_game_over());

    run(&mut game, 1.0);
    assert!(game.is_game_over());
    assert!(!game.is_won());
}

/// A coin stuck to a sticky wall is lost after the grace period
#[test]
fn test_loss_when_collectible_is_stuck() {
    let mut game = GoldbergGame::default();
    game.set_level(
        Level::new("Sticky", "", 20.0, 20.0)
            .with_fixed(coin_at(5.0, 3.0))
            .with_fixed(EntityTemplate::new(
                EntitySpec::StickySurface {
                    width: 4.0,
                    height: 0.5,
                },
                Vec2::new(5.0, 1.0),
            ))
            .with_fixed(goal_at(15.0, 1.0)),
    )
    .unwrap();
    game.set_state(GameState::Preparing).unwrap();
    game.set_state(GameState::Running).unwrap();

    run(&mut game, 2.5);
    assert!(game.is_game_over());
    assert!(!game.is_won());
}

/// Leaving the run cancels the watcher and clears the outcome
#[test]
fn test_leaving_run_clears_outcome() {
    let mut game = GoldbergGame::default();
    game.set_level(easy_level()).unwrap();
    game.set_state(GameState::Preparing).unwrap();
    game.set_state(GameState::Running).unwrap();
    run(&mut game, 2.5);
    assert!(game.is_won());

    game.set_state(GameState::Preparing).unwrap();
    assert!(!game.is_game_over());
    assert!(!game.is_won());
    run(&mut game, 5.0);
    assert!(!game.is_game_over(), "No verdict outside a run");
}

/// Pausing stops the run clock; resuming carries on from where it stopped
#[test]
fn test_pause_holds_the_watcher() {
    let mut game = GoldbergGame::default();
    game.set_level(easy_level()).unwrap();
    game.set_state(GameState::Preparing).unwrap();
    game.set_state(GameState::Running).unwrap();

    game.stop();
    run(&mut game, 5.0);
    assert!(!game.is_game_over());
    assert_eq!(game.sim_time(), 0.0);

    game.start();
    run(&mut game, 2.5);
    assert!(game.is_won());
}

/// The stall timeout counts from the start of the run, not from the last resume
#[test]
fn test_resume_keeps_the_stall_clock() {
    let mut game = GoldbergGame::default();
    game.set_level(
        Level::new("Space", "", 20.0, 20.0)
            .with_planet(Planet::Space)
            .with_fixed(coin_at(5.0, 10.0))
            .with_fixed(goal_at(15.0, 1.0)),
    )
    .unwrap();
    game.set_state(GameState::Preparing).unwrap();
    game.set_state(GameState::Running).unwrap();

    run(&mut game, 7.0);
    assert!(!game.is_game_over());
    game.stop();
    run(&mut game, 3.0);
    game.start();

    run(&mut game, 1.5);
    assert!(game.is_game_over(), "Lost at 8 s of run time despite the pause");
    assert!(!game.is_won());
    assert!(game.sim_time() < 9.0);
}

// ==================== Level Tests ====================

#[test]
fn test_planet_sets_gravity() {
    let mut game = GoldbergGame::default();
    for planet in [Planet::Moon, Planet::Jupiter, Planet::Space] {
        game.set_level(easy_level().with_planet(planet)).unwrap();
        assert_eq!(game.world().gravity(), -planet.gravity());
    }
}

#[test]
fn test_teleportable_borders() {
    let mut game = GoldbergGame::default();
    game.set_level(easy_level().with_borders(BorderType::Teleportable)).unwrap();
    assert_eq!(game.view().bounds, BoundsKind::CrossTeleport);
    game.set_level(easy_level()).unwrap();
    assert_eq!(game.view().bounds, BoundsKind::Rigid);
    assert_eq!(game.world().bound_count(), 4);
}

#[test]
fn test_level_refused_while_running() {
    let mut game = GoldbergGame::default();
    game.set_level(easy_level()).unwrap();
    game.set_state(GameState::Preparing).unwrap();
    game.set_state(GameState::Running).unwrap();
    assert_eq!(
        game.set_level(easy_level()),
        Err(GameError::StateViolation {
            required: Requirement::NotState(GameState::Running),
            actual: GameState::Running,
        })
    );
    assert!(game.set_dragged(game.fixed_entities()[0]).is_err());
}

#[test]
fn test_inventory_limits_gameplay_entities() {
    let mut game = GoldbergGame::default();
    game.set_level(easy_level()).unwrap();
    game.set_state(GameState::Preparing).unwrap();

    let surface = || EntityFactory::build_default(EntityTag::Surface);
    game.add_gameplay_entity(surface()).unwrap();
    game.add_gameplay_entity(surface()).unwrap();
    assert_eq!(
        game.add_gameplay_entity(surface()),
        Err(GameError::OutOfStock(EntityTag::Surface))
    );
    assert!(game.allowed_inventory().unwrap().items().is_empty());

    game.set_state(GameState::Building).unwrap();
    assert!(game.gameplay_entities().is_empty());
    game.set_state(GameState::Preparing).unwrap();
    assert_eq!(game.allowed_inventory().unwrap().quantity(EntityTag::Surface), 2);
}

#[test]
fn test_floor_keeps_coin_out_of_goal() {
    let mut game = GoldbergGame::default();
    game.set_level(
        Level::new("Blocked", "", 20.0, 20.0)
            .with_fixed(coin_at(15.0, 6.0))
            .with_fixed(goal_at(15.0, 1.0)),
    )
    .unwrap();
    game.set_state(GameState::Preparing).unwrap();
    let floor = EntityFactory::build(&floor_at(0.0, 0.0).spec);
    let key = game.add_gameplay_entity(floor).unwrap();
    game.set_dragged(key).unwrap();
    game.move_dragged(15.0, 4.0).unwrap();
    assert_eq!(game.drop_dragged(), Ok(true));

    game.set_state(GameState::Running).unwrap();
    run(&mut game, 3.0);
    assert!(!game.is_won());
    let coin = game.fixed_entities()[0];
    assert!(game.pose(coin).unwrap().position.y > 4.0);
}
