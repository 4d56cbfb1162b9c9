//! Engine configuration.
//!
//! Simulation parameters for the headless drill run plus the nested terrain
//! configuration. Loaded from `delve.toml` unless another path is given.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use delve_common::ConfigError;
use delve_world::TerrainConfig;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Configuration file name.
pub const CONFIG_FILE: &str = "delve.toml";

/// Engine configuration parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    // === Simulation ===
    /// Number of ticks to simulate
    pub ticks: u32,
    /// Seconds per tick
    pub fixed_dt: f32,
    /// Log streaming stats every this many ticks (0 = never)
    pub log_interval: u32,

    // === Drill ===
    /// Starting world X
    pub start_x: f32,
    /// Starting world Y
    pub start_y: f32,
    /// Descent speed through air, in world units per second
    pub drill_speed: f32,
    /// Dig radius in pixels
    pub dig_radius: u32,
    /// Fire a blast every this many ticks (0 = never)
    pub blast_interval: u32,
    /// Blast length in world units
    pub blast_length: f32,

    // === Population ===
    /// Material planted by the population hook
    pub pocket_material: String,
    /// Pockets planted per populated chunk
    pub pockets_per_chunk: u32,

    // === Terrain ===
    /// Terrain engine configuration
    pub terrain: TerrainConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            ticks: 1800,
            fixed_dt: 1.0 / 60.0,
            log_interval: 300,

            start_x: 2.0,
            start_y: 2.0,
            drill_speed: 3.0,
            dig_radius: 6,
            blast_interval: 240,
            blast_length: 3.0,

            pocket_material: "gold".to_string(),
            pockets_per_chunk: 3,

            terrain: TerrainConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Loads configuration from `path`, or from `delve.toml` when `None`.
    ///
    /// A missing file yields the defaults. A file that exists but cannot be
    /// read, parsed or validated is an error.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = path.map_or_else(|| PathBuf::from(CONFIG_FILE), Path::to_path_buf);
        Self::load_from(path)
    }

    /// Loads configuration from a specific path.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            info!("Config file {} not found, using defaults", path.display());
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Saves configuration to a specific path.
    pub fn save_to<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        fs::write(path, contents)?;

        info!("Saved config to {}", path.display());
        Ok(())
    }

    /// Checks simulation values, then the terrain section.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.fixed_dt.is_nan() || self.fixed_dt <= 0.0 {
            return Err(ConfigError::Invalid(format!("fixed_dt {} must be positive", self.fixed_dt)));
        }
        if self.drill_speed < 0.0 {
            return Err(ConfigError::Invalid(format!("drill_speed {} is negative", self.drill_speed)));
        }
        if self.dig_radius >= self.terrain.chunk_pixel_size {
            return Err(ConfigError::Invalid(format!(
                "dig_radius {} must be smaller than chunk_pixel_size {}",
                self.dig_radius, self.terrain.chunk_pixel_size
            )));
        }
        self.terrain.validate()
    }
}
