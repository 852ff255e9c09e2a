//! Application configuration
//!
//! Configuration is loaded from multiple sources with the following priority (lowest to highest):
//! 1. `config/default.toml` (version controlled)
//! 2. `config/user.toml` (gitignored, user overrides)
//! 3. Environment variables (`GOLDBERG_SECTION__KEY`)

use figment::{Figment, providers::{Format, Toml, Env}};
use goldberg_core::{GameSettings, Vec2, WatchTimings, PhysicsConfig as EnginePhysicsConfig};
use serde::{Serialize, Deserialize};
use std::path::Path;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Simulation loop configuration
    #[serde(default)]
    pub simulation: SimulationConfig,
    /// Physics configuration
    #[serde(default)]
    pub physics: PhysicsConfig,
    /// End-of-game watcher configuration
    #[serde(default)]
    pub game: GameConfig,
    /// Debug configuration
    #[serde(default)]
    pub debug: DebugConfig,
}

impl AppConfig {
    /// Load configuration from default locations
    ///
    /// Priority (lowest to highest):
    /// 1. `config/default.toml`
    /// 2. `config/user.toml`
    /// 3. Environment variables (`GOLDBERG_*`)
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from("config")
    }

    /// Load configuration from a specific config directory
    pub fn load_from<P: AsRef<Path>>(config_dir: P) -> Result<Self, ConfigError> {
        let config_dir = config_dir.as_ref();
        let default_path = config_dir.join("default.toml");
        let user_path = config_dir.join("user.toml");

        let mut figment = Figment::new();

        if default_path.exists() {
            figment = figment.merge(Toml::file(&default_path));
        }

        // Load user config (optional)
        if user_path.exists() {
            figment = figment.merge(Toml::file(&user_path));
        }

        // GOLDBERG_PHYSICS__GRAVITY=-3.7 -> physics.gravity = -3.7
        figment = figment.merge(Env::prefixed("GOLDBERG_").split("__"));

        figment.extract().map_err(ConfigError::from)
    }

    /// Settings handed to a new game
    pub fn game_settings(&self) -> GameSettings {
        GameSettings {
            physics: EnginePhysicsConfig {
                gravity: Vec2::new(0.0, self.physics.gravity),
                solver_iterations: self.physics.solver_iterations,
                max_substep: self.physics.max_substep,
                ..EnginePhysicsConfig::default()
            },
            border_friction: self.physics.border_friction,
            update_ratio: self.simulation.update_ratio,
            timings: WatchTimings {
                interval: self.game.poll_interval,
                grace: self.game.grace_period,
                stall: self.game.stall_timeout,
            },
        }
    }
}

/// Simulation loop configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Wall time per frame in seconds
    pub frame_dt: f32,
    /// Simulated seconds per wall second
    pub update_ratio: f32,
    /// Frames the headless runner simulates before giving up
    pub max_frames: u32,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            frame_dt: 1.0 / 60.0,
            update_ratio: 1.0,
            max_frames: 1200,
        }
    }
}

/// Physics configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhysicsConfig {
    /// Gravity used before a level sets its planet (negative = downward)
    pub gravity: f32,
    /// Solver iterations per substep
    pub solver_iterations: usize,
    /// Longest integrated time slice
    pub max_substep: f32,
    /// Friction of the rigid play area edges
    pub border_friction: f32,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            gravity: -9.8,
            solver_iterations: 8,
            max_substep: 1.0 / 60.0,
            border_friction: 0.2,
        }
    }
}

/// End-of-game watcher configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameConfig {
    /// Seconds during which no verdict is given
    pub grace_period: f32,
    /// Seconds after which a motionless run is lost
    pub stall_timeout: f32,
    /// Seconds between two checks
    pub poll_interval: f32,
}

impl Default for GameConfig {
    fn default() -> Self {
        let timings = WatchTimings::default();
        Self {
            grace_period: timings.grace,
            stall_timeout: timings.stall,
            poll_interval: timings.interval,
        }
    }
}

/// Debug configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DebugConfig {
    /// Log level (error, warn, info, debug, trace)
    pub log_level: String,
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

/// Configuration error
#[derive(Debug)]
pub struct ConfigError {
    message: String,
}

impl From<figment::Error> for ConfigError {
    fn from(e: figment::Error) -> Self {
        ConfigError {
            message: e.to_string(),
        }
    }
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Configuration error: {}", self.message)
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.physics.gravity, -9.8);
        assert_eq!(config.game.stall_timeout, 8.0);
        assert_eq!(config.debug.log_level, "info");
    }

    #[test]
    fn test_config_serialization() {
        let config = AppConfig::default();
        let toml = toml::to_string(&config).unwrap();
        assert!(toml.contains("[simulation]"));
        assert!(toml.contains("border_friction"));
        assert!(toml.contains("grace_period"));
    }

    #[test]
    fn test_game_settings_conversion() {
        let mut config = AppConfig::default();
        config.physics.gravity = -1.6;
        config.game.grace_period = 3.0;
        config.simulation.update_ratio = 2.0;

        let settings = config.game_settings();
        assert_eq!(settings.physics.gravity, Vec2::new(0.0, -1.6));
        assert_eq!(settings.timings.grace, 3.0);
        assert_eq!(settings.update_ratio, 2.0);
        assert_eq!(settings.border_friction, 0.2);
    }

    #[test]
    fn test_missing_directory_uses_defaults() {
        let config = AppConfig::load_from("does/not/exist").unwrap();
        assert_eq!(config.simulation.max_frames, 1200);
    }
}
