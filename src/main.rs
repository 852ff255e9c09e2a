//! Goldberg - physics puzzle game
//!
//! Headless runner: loads the demo level, places the player's parts, runs the
//! simulation until the game is decided and logs the outcome.

use goldberg::config::AppConfig;
use goldberg::runner::{demo_level, demo_solution, LevelRunner, RunOutcome};

fn main() {
    // Load configuration
    let config = AppConfig::load().unwrap_or_else(|e| {
        eprintln!("Failed to load config: {}. Using defaults.", e);
        AppConfig::default()
    });

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&config.debug.log_level)).init();
    log::info!("Starting Goldberg");

    let mut runner = LevelRunner::new(&config);
    if let Err(e) = runner.load(demo_level()) {
        log::error!("Failed to load the demo level: {}", e);
        std::process::exit(1);
    }
    for template in demo_solution() {
        if let Err(e) = runner.place(&template) {
            log::warn!("Could not place {}: {}", template.spec.tag(), e);
        }
    }

    match runner.run() {
        Ok(RunOutcome::Won { seconds }) => log::info!("Level solved in {:.1}s", seconds),
        Ok(RunOutcome::Lost { seconds }) => log::info!("Level lost after {:.1}s", seconds),
        Ok(RunOutcome::Undecided) => log::warn!("No outcome within {} frames", config.simulation.max_frames),
        Err(e) => {
            log::error!("Run refused: {}", e);
            std::process::exit(1);
        }
    }
}
