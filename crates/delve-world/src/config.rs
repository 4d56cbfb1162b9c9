//! Terrain configuration.
//!
//! Everything here is static startup configuration, read from TOML and turned
//! into a tile database, generator, producer and manager by the `build_*`
//! helpers.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use ahash::AHashSet;
use delve_common::{ChunkGeometry, ConfigError, DelveResult, Rgba, MAX_MATERIALS};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::generation::{ChunkGenerator, GenerationRule, GeneratorSettings, TerrainFields};
use crate::noise_field::{FractalKind, NoiseKind, NoiseSettings};
use crate::producer::{ChunkProducer, ProducerSettings};
use crate::streaming::{ChunkManager, StreamingConfig};
use crate::tiles::{Material, TileDatabase};

/// A material as written in config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaterialConfig {
    /// Unique name
    pub name: String,
    /// RGBA color
    pub color: [u8; 4],
    /// Hardness (0-255)
    pub hardness: u8,
    /// Sell value
    pub value: u8,
}

impl MaterialConfig {
    fn new(name: &str, color: [u8; 4], hardness: u8, value: u8) -> Self {
        Self {
            name: name.to_string(),
            color,
            hardness,
            value,
        }
    }

    fn to_material(&self) -> Material {
        let [r, g, b, a] = self.color;
        Material::new(self.name.clone(), Rgba::new(r, g, b, a), self.hardness, self.value)
    }
}

/// A generation rule as written in config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleConfig {
    /// Material name
    pub material: String,
    /// Upper temperature bound
    pub temperature: f32,
    /// Upper pressure bound
    pub pressure: f32,
    /// Upper tectonics bound
    pub tectonics: f32,
}

impl RuleConfig {
    fn new(material: &str, temperature: f32, pressure: f32, tectonics: f32) -> Self {
        Self {
            material: material.to_string(),
            temperature,
            pressure,
            tectonics,
        }
    }
}

/// Static terrain configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TerrainConfig {
    // === Chunks ===
    /// Chunk side in pixels (power of two)
    pub chunk_pixel_size: u32,
    /// Chunk side in world units (power of two)
    pub chunk_unit_size: i32,
    /// Brick side in pixels; divides the chunk side
    pub brick_size: u32,

    // === Streaming ===
    /// Load radius in chunks
    pub load_radius: u32,
    /// Unload radius in chunks (defaults to load radius + 1)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unload_radius: Option<u32>,

    // === Generation ===
    /// World seed
    pub seed: u32,
    /// Chunks above this Y are all air
    pub ground_level: i32,
    /// Chunks below this Y may be populated
    pub population_level: i32,
    /// Chance an eligible chunk is populated
    pub population_chance: f32,
    /// Density below this is air
    pub cave_threshold: f32,
    /// Cave density field
    pub density: NoiseSettings,
    /// Temperature field
    pub temperature: NoiseSettings,
    /// Pressure field
    pub pressure: NoiseSettings,
    /// Tectonics field
    pub tectonics: NoiseSettings,

    // === Materials ===
    /// Materials in ID order, air first
    pub materials: Vec<MaterialConfig>,
    /// Ordered generation rules
    pub rules: Vec<RuleConfig>,
    /// Material placed when no rule matches
    pub base_material: String,

    // === Producer ===
    /// Chunk producer settings
    pub producer: ProducerSettings,
}

impl Default for TerrainConfig {
    fn default() -> Self {
        Self {
            chunk_pixel_size: 64,
            chunk_unit_size: 4,
            brick_size: 4,

            load_radius: 3,
            unload_radius: None,

            seed: 1337,
            ground_level: 0,
            population_level: -16,
            population_chance: 0.2,
            cave_threshold: 0.25,
            density: NoiseSettings::simple(NoiseKind::OpenSimplex, 0.02, 0).with_fractal(FractalKind::Fbm, 3),
            temperature: NoiseSettings::simple(NoiseKind::SuperSimplex, 0.004, 101),
            pressure: NoiseSettings::simple(NoiseKind::Perlin, 0.006, 202).with_fractal(FractalKind::Ridged, 2),
            tectonics: NoiseSettings {
                cellular_jitter: 0.8,
                ..NoiseSettings::simple(NoiseKind::Cellular, 0.01, 303)
            },

            materials: vec![
                MaterialConfig::new("air", [0, 0, 0, 0], 0, 0),
                MaterialConfig::new("dirt", [121, 85, 58, 255], 20, 1),
                MaterialConfig::new("clay", [166, 104, 74, 255], 35, 1),
                MaterialConfig::new("stone", [118, 118, 124, 255], 90, 2),
                MaterialConfig::new("coal", [40, 40, 44, 255], 70, 6),
                MaterialConfig::new("iron", [170, 120, 96, 255], 130, 12),
                MaterialConfig::new("gold", [232, 190, 48, 255], 150, 40),
                MaterialConfig::new("magma", [214, 72, 24, 255], 200, 25),
            ],
            rules: vec![
                RuleConfig::new("dirt", 0.35, 0.4, 1.0),
                RuleConfig::new("clay", 0.45, 0.5, 1.0),
                RuleConfig::new("gold", 1.0, 1.0, 0.08),
                RuleConfig::new("iron", 1.0, 0.35, 0.2),
                RuleConfig::new("coal", 0.6, 1.0, 0.25),
                RuleConfig::new("magma", 1.0, 0.3, 1.0),
            ],
            base_material: "stone".to_string(),

            producer: ProducerSettings::default(),
        }
    }
}

impl TerrainConfig {
    /// Parses and validates a TOML file.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)?;
        let config = Self::from_toml(&contents)?;
        info!("Loaded terrain config from {}", path.display());
        Ok(config)
    }

    /// Parses and validates TOML text.
    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(contents).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Unload radius after applying the default.
    #[must_use]
    pub fn effective_unload_radius(&self) -> u32 {
        self.unload_radius.unwrap_or(self.load_radius + 1)
    }

    /// Chunk geometry. Only meaningful after [`validate`](Self::validate).
    #[must_use]
    pub fn geometry(&self) -> ChunkGeometry {
        ChunkGeometry::new(self.chunk_pixel_size, self.chunk_unit_size)
    }

    /// Checks that the values are consistent.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |reason: String| -> Result<(), ConfigError> { Err(ConfigError::Invalid(reason)) };

        if !self.chunk_pixel_size.is_power_of_two() || self.chunk_pixel_size > u32::from(u16::MAX) {
            return invalid(format!("chunk_pixel_size {} is not a power of two", self.chunk_pixel_size));
        }
        if self.chunk_unit_size <= 0 || !(self.chunk_unit_size as u32).is_power_of_two() {
            return invalid(format!("chunk_unit_size {} is not a power of two", self.chunk_unit_size));
        }
        if self.brick_size == 0 || self.chunk_pixel_size % self.brick_size != 0 {
            return invalid(format!(
                "brick_size {} does not divide chunk_pixel_size {}",
                self.brick_size, self.chunk_pixel_size
            ));
        }
        if self.load_radius == 0 {
            return invalid("load_radius must be at least 1".to_string());
        }
        if self.effective_unload_radius() <= self.load_radius {
            return invalid(format!(
                "unload_radius {} must exceed load_radius {}",
                self.effective_unload_radius(),
                self.load_radius
            ));
        }
        for (name, value) in [
            ("cave_threshold", self.cave_threshold),
            ("population_chance", self.population_chance),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return invalid(format!("{name} {value} is outside [0, 1]"));
            }
        }

        if self.materials.is_empty() {
            return invalid("no materials configured".to_string());
        }
        if self.materials.len() > MAX_MATERIALS {
            return invalid(format!("{} materials exceed {}", self.materials.len(), MAX_MATERIALS));
        }
        let first = &self.materials[0];
        if first.color[3] != 0 || first.hardness != 0 {
            return invalid(format!(
                "first material {} must be air (transparent, hardness 0)",
                first.name
            ));
        }
        let mut names = AHashSet::with_capacity(self.materials.len());
        for material in &self.materials {
            if !names.insert(material.name.as_str()) {
                return invalid(format!("material {} is listed twice", material.name));
            }
        }

        for rule in &self.rules {
            if !names.contains(rule.material.as_str()) {
                return invalid(format!("rule references unknown material {}", rule.material));
            }
            for value in [rule.temperature, rule.pressure, rule.tectonics] {
                if !(0.0..=1.0).contains(&value) {
                    return invalid(format!("rule for {} has threshold {value} outside [0, 1]", rule.material));
                }
            }
        }
        if !names.contains(self.base_material.as_str()) {
            return invalid(format!("base_material {} is not a material", self.base_material));
        }
        self.producer.validate()
    }

    /// Builds the material registry.
    pub fn build_tiles(&self) -> DelveResult<Arc<TileDatabase>> {
        let materials = self.materials.iter().map(MaterialConfig::to_material).collect();
        Ok(Arc::new(TileDatabase::from_materials(materials)?))
    }

    /// Builds the generator, resolving material names against `tiles`.
    pub fn build_generator(&self, tiles: Arc<TileDatabase>) -> DelveResult<ChunkGenerator> {
        let rules = self
            .rules
            .iter()
            .map(|rule| -> DelveResult<GenerationRule> {
                Ok(GenerationRule::new(
                    tiles.resolve(&rule.material)?,
                    rule.temperature,
                    rule.pressure,
                    rule.tectonics,
                ))
            })
            .collect::<DelveResult<Vec<_>>>()?;

        let settings = GeneratorSettings {
            geometry: self.geometry(),
            brick_size: self.brick_size,
            ground_level: self.ground_level,
            population_level: self.population_level,
            cave_threshold: self.cave_threshold,
            base_material: tiles.resolve(&self.base_material)?,
            rules,
        };
        let fields = TerrainFields::new(self.seed, &self.density, &self.temperature, &self.pressure, &self.tectonics);
        Ok(ChunkGenerator::new(settings, fields, tiles))
    }

    /// Builds the configured producer.
    pub fn build_producer(&self, generator: Arc<ChunkGenerator>) -> DelveResult<Box<dyn ChunkProducer>> {
        self.producer.build(generator)
    }

    /// Streaming parameters for the manager.
    #[must_use]
    pub fn streaming_config(&self) -> StreamingConfig {
        StreamingConfig {
            geometry: self.geometry(),
            load_radius: self.load_radius,
            unload_radius: self.effective_unload_radius(),
            population_chance: self.population_chance,
            seed: u64::from(self.seed),
        }
    }

    /// Validates and builds the whole terrain engine.
    pub fn build_manager(&self) -> DelveResult<ChunkManager> {
        self.validate()?;
        let tiles = self.build_tiles()?;
        let generator = Arc::new(self.build_generator(Arc::clone(&tiles))?);
        let producer = self.build_producer(generator)?;
        Ok(ChunkManager::new(self.streaming_config(), tiles, producer))
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use delve_common::{ChunkCoord, DelveError};
    use glam::Vec2;
    use tempfile::NamedTempFile;

    use super::*;
    use crate::producer::ProducerStrategy;

    #[test]
    fn test_default_config_is_valid() {
        let config = TerrainConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.effective_unload_radius(), 4);
        assert_eq!(config.materials[0].name, "air");
    }

    #[test]
    fn test_load_partial_file() {
        let mut file = NamedTempFile::new().expect("Failed to create temp file");
        writeln!(
            file,
            r#"
chunk_pixel_size = 32
load_radius = 2
unload_radius = 5
cave_threshold = 0.4

[density]
kind = "cellular"
frequency = 0.05
cellular_return = "distance2_sub"

[producer]
strategy = "stepped"
rows_per_step = 2
"#
        )
        .expect("Failed to write config");

        let config = TerrainConfig::load_from(file.path()).expect("Failed to load config");
        assert_eq!(config.chunk_pixel_size, 32);
        assert_eq!(config.effective_unload_radius(), 5);
        assert_eq!(config.density.kind, NoiseKind::Cellular);
        assert_eq!(config.producer.strategy, ProducerStrategy::Stepped);
        assert_eq!(config.producer.rows_per_step, 2);
        // Unspecified fields keep their defaults.
        assert_eq!(config.chunk_unit_size, 4);
        assert_eq!(config.materials.len(), TerrainConfig::default().materials.len());
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let result = TerrainConfig::load_from("/nonexistent/delve/terrain.toml");
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[test]
    fn test_malformed_toml_is_parse_error() {
        let result = TerrainConfig::from_toml("load_radius = \"far\"");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let cases: [fn(&mut TerrainConfig); 15] = [
            |c| c.chunk_pixel_size = 48,
            |c| c.chunk_unit_size = 3,
            |c| c.brick_size = 5,
            |c| c.load_radius = 0,
            |c| c.unload_radius = Some(3),
            |c| c.cave_threshold = 1.5,
            |c| c.materials.clear(),
            |c| c.base_material = "obsidian".to_string(),
            |c| c.rules.push(RuleConfig::new("obsidian", 0.5, 0.5, 0.5)),
            |c| c.rules[0].pressure = -0.1,
            |c| c.materials.push(MaterialConfig::new("dirt", [0, 0, 0, 255], 1, 1)),
            |c| c.materials.swap(0, 1),
            |c| c.materials[0].hardness = 5,
            |c| c.producer.dispatch_per_tick = 0,
            |c| c.producer.deliver_per_tick = 0,
        ];
        for (i, mutate) in cases.into_iter().enumerate() {
            let mut config = TerrainConfig::default();
            mutate(&mut config);
            assert!(
                matches!(config.validate(), Err(ConfigError::Invalid(_))),
                "case {i} should be rejected"
            );
        }
    }

    #[test]
    fn test_build_generator_resolves_rules_in_order() {
        let config = TerrainConfig::default();
        let tiles = config.build_tiles().expect("tiles");
        let generator = config.build_generator(Arc::clone(&tiles)).expect("generator");
        let rules = &generator.settings().rules;
        assert_eq!(rules.len(), config.rules.len());
        assert_eq!(Some(rules[0].material), tiles.id_of("dirt"));
        assert_eq!(Some(rules[5].material), tiles.id_of("magma"));
        assert_eq!(Some(generator.settings().base_material), tiles.id_of("stone"));
    }

    #[test]
    fn test_build_generator_unknown_material() {
        let mut config = TerrainConfig::default();
        config.base_material = "obsidian".to_string();
        let tiles = config.build_tiles().expect("tiles");
        assert!(matches!(config.build_generator(tiles), Err(DelveError::Tiles(_))));
    }

    #[test]
    fn test_build_manager_and_stream() {
        let mut config = TerrainConfig::default();
        config.load_radius = 1;
        config.producer.strategy = ProducerStrategy::Stepped;
        config.producer.concurrency = 8;
        config.producer.rows_per_step = 16;

        let mut manager = config.build_manager().expect("manager");
        assert_eq!(manager.material_count(), config.materials.len());
        manager.set_focus(Vec2::new(2.0, -10.0));
        manager.tick(0.016);
        assert_eq!(manager.resident_count(), 5);
        assert_eq!(manager.stats().delivered, 5);
        assert!(manager.chunk(ChunkCoord::new(0, -12)).expect("resident").is_generated());
    }

    #[test]
    fn test_config_toml_serialization() {
        let config = TerrainConfig::default();
        let text = toml::to_string_pretty(&config).expect("Failed to serialize");
        assert!(text.contains("chunk_pixel_size"));
        assert!(text.contains("base_material"));
        let parsed = TerrainConfig::from_toml(&text).expect("Failed to parse");
        assert_eq!(parsed, config);
    }
}
