//! Configuration module - environment variable parsing

use std::env;
use std::str::FromStr;

use glam::DVec2;

use crate::util::time::SIMULATION_TPS;

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Optional path to a track grid JSON file
    pub track_path: Option<String>,
    /// Simulation ticks per second
    pub tick_rate: u32,
    /// Broadcast a snapshot every N ticks
    pub snapshot_every: u32,
    /// Simulation constants
    pub race: RaceConfig,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            track_path: env::var("TRACK_PATH").ok(),
            tick_rate: parse_var("TICK_RATE", SIMULATION_TPS)?,
            snapshot_every: parse_var("SNAPSHOT_EVERY", 2)?,
            race: RaceConfig::from_env()?,
        })
    }
}

/// Constants consumed by the tick core. The embedding application owns these.
#[derive(Clone, Debug, PartialEq)]
pub struct RaceConfig {
    /// Forward thruster force per throttle step
    pub thrust_force: f64,
    /// Sideways lean force
    pub lean_force: f64,
    /// Velocity multiplier applied once per tick
    pub velocity_damping: f64,
    /// Track grid cell size in world units
    pub cell_size: f64,
    /// Time between the first finisher and the results screen (ms)
    pub finish_countdown_ms: i64,
    /// Time the results screen stays up (ms)
    pub results_screen_ms: i64,
    /// Laps needed to finish
    pub laps: i32,
    /// Ship mass
    pub ship_mass: f64,
    /// Ship hull box width
    pub hull_width: f64,
    /// Ship hull box height
    pub hull_height: f64,
    /// Position of slot 0 on the grid
    pub spawn_origin: DVec2,
    /// Horizontal distance between consecutive slots
    pub spawn_spacing_x: f64,
    /// Vertical offset applied to odd slots
    pub spawn_spacing_y: f64,
    /// Heading every ship starts with (radians)
    pub spawn_angle: f64,
}

impl Default for RaceConfig {
    fn default() -> Self {
        Self {
            thrust_force: 600.0,
            lean_force: 250.0,
            velocity_damping: 0.98,
            cell_size: 16.0,
            finish_countdown_ms: 15_000,
            results_screen_ms: 8_000,
            laps: 3,
            ship_mass: 5.0,
            hull_width: 12.0,
            hull_height: 24.0,
            // Lane just behind the finish line of the built-in oval, facing -y
            spawn_origin: DVec2::new(8.0, 100.0),
            spawn_spacing_x: 20.0,
            spawn_spacing_y: 30.0,
            spawn_angle: std::f64::consts::PI,
        }
    }
}

impl RaceConfig {
    /// Defaults with `RACE_*` environment overrides
    pub fn from_env() -> Result<Self, ConfigError> {
        let d = Self::default();
        let config = Self {
            thrust_force: parse_var("RACE_THRUST_FORCE", d.thrust_force)?,
            lean_force: parse_var("RACE_LEAN_FORCE", d.lean_force)?,
            velocity_damping: parse_var("RACE_VELOCITY_DAMPING", d.velocity_damping)?,
            cell_size: parse_var("RACE_CELL_SIZE", d.cell_size)?,
            finish_countdown_ms: parse_var("RACE_FINISH_COUNTDOWN_MS", d.finish_countdown_ms)?,
            results_screen_ms: parse_var("RACE_RESULTS_SCREEN_MS", d.results_screen_ms)?,
            laps: parse_var("RACE_LAPS", d.laps)?,
            ..d
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..1.0).contains(&self.velocity_damping) {
            return Err(ConfigError::OutOfRange("RACE_VELOCITY_DAMPING"));
        }
        if self.cell_size <= 0.0 {
            return Err(ConfigError::OutOfRange("RACE_CELL_SIZE"));
        }
        if self.laps < 0 {
            return Err(ConfigError::OutOfRange("RACE_LAPS"));
        }
        Ok(())
    }

    /// Deterministic starting pose for a slot: (position, heading)
    pub fn spawn_pose(&self, slot: usize) -> (DVec2, f64) {
        let offset = DVec2::new(
            slot as f64 * self.spawn_spacing_x,
            (slot % 2) as f64 * self.spawn_spacing_y,
        );
        (self.spawn_origin + offset, self.spawn_angle)
    }
}

fn parse_var<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid(name)),
        Err(_) => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),

    #[error("Value out of range for environment variable: {0}")]
    OutOfRange(&'static str),
}
