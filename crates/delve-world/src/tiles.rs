//! Material registry and the tile values copied out of it.
//!
//! The database is filled exactly once at startup and is read-only afterwards,
//! so it can be shared across generator threads behind an `Arc` without locks.

use std::sync::OnceLock;

use ahash::AHashMap;
use delve_common::{MaterialId, Rgba, TileError, AIR, MAX_MATERIALS};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Designer-authored material definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Material {
    /// Unique display name, also used to reference the material from config.
    pub name: String,
    /// Display color.
    pub color: Rgba,
    /// Hardness, 0 = softest, 255 = hardest.
    pub hardness: u8,
    /// Sell value per tile.
    pub value: u8,
}

impl Material {
    /// Creates a material definition.
    #[must_use]
    pub fn new(name: impl Into<String>, color: Rgba, hardness: u8, value: u8) -> Self {
        Self {
            name: name.into(),
            color,
            hardness,
            value,
        }
    }

    /// The conventional air material: transparent, no hardness, no value.
    #[must_use]
    pub fn air() -> Self {
        Self::new("air", Rgba::TRANSPARENT, 0, 0)
    }
}

/// Runtime cell payload, a frozen snapshot of a material.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Tile {
    /// Material ID.
    pub id: MaterialId,
    /// Display color cached for rendering.
    pub color: Rgba,
    /// Hardness copied from the material.
    pub hardness: u8,
    /// Sell value copied from the material.
    pub value: u8,
}

impl Tile {
    /// Empty tile. Returned for any query outside resident terrain.
    pub const AIR: Self = Self {
        id: AIR,
        color: Rgba::TRANSPARENT,
        hardness: 0,
        value: 0,
    };

    /// Whether this tile is empty space.
    #[must_use]
    pub const fn is_air(&self) -> bool {
        self.id == AIR
    }
}

impl Default for Tile {
    fn default() -> Self {
        Self::AIR
    }
}

#[derive(Debug)]
struct Registry {
    materials: Vec<Material>,
    tiles: Vec<Tile>,
    by_name: AHashMap<String, MaterialId>,
}

/// Registry mapping dense material IDs to tile templates.
#[derive(Debug, Default)]
pub struct TileDatabase {
    registry: OnceLock<Registry>,
}

impl TileDatabase {
    /// Creates an uninitialized database.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            registry: OnceLock::new(),
        }
    }

    /// Creates and initializes a database in one step.
    pub fn from_materials(materials: Vec<Material>) -> Result<Self, TileError> {
        let db = Self::new();
        db.initialize(materials)?;
        Ok(db)
    }

    /// Registers the materials, assigning IDs in list order (air first, ID 0).
    ///
    /// Fails if the database was already initialized, if the list is empty,
    /// or if it holds more materials than a [`MaterialId`] can address.
    pub fn initialize(&self, materials: Vec<Material>) -> Result<(), TileError> {
        if self.registry.get().is_some() {
            return Err(TileError::AlreadyInitialized);
        }
        if materials.is_empty() {
            return Err(TileError::NoMaterials);
        }
        if materials.len() > MAX_MATERIALS {
            return Err(TileError::TooManyMaterials {
                count: materials.len(),
                max: MAX_MATERIALS,
            });
        }

        let mut tiles = Vec::with_capacity(materials.len());
        let mut by_name = AHashMap::with_capacity(materials.len());
        for (index, material) in materials.iter().enumerate() {
            let id = index as MaterialId;
            debug!("Registering material {} as {}", material.name, id);
            tiles.push(Tile {
                id,
                color: material.color,
                hardness: material.hardness,
                value: material.value,
            });
            by_name.entry(material.name.clone()).or_insert(id);
        }

        let count = materials.len();
        self.registry
            .set(Registry {
                materials,
                tiles,
                by_name,
            })
            .map_err(|_| TileError::AlreadyInitialized)?;

        info!("Tile database initialized with {} materials", count);
        Ok(())
    }

    /// Whether [`initialize`](Self::initialize) has completed.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.registry.get().is_some()
    }

    /// Number of registered materials (0 before initialization).
    #[must_use]
    pub fn len(&self) -> usize {
        self.registry.get().map_or(0, |r| r.tiles.len())
    }

    /// Whether no materials are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Tile template for an ID.
    #[must_use]
    pub fn get(&self, id: MaterialId) -> Option<&Tile> {
        self.registry.get()?.tiles.get(usize::from(id))
    }

    /// Tile template for an ID, falling back to air for unknown IDs.
    #[must_use]
    pub fn tile(&self, id: MaterialId) -> Tile {
        self.get(id).copied().unwrap_or(Tile::AIR)
    }

    /// The registered air tile.
    #[must_use]
    pub fn air(&self) -> Tile {
        self.tile(AIR)
    }

    /// Source definition for an ID.
    #[must_use]
    pub fn material(&self, id: MaterialId) -> Option<&Material> {
        self.registry.get()?.materials.get(usize::from(id))
    }

    /// ID registered under `name`.
    #[must_use]
    pub fn id_of(&self, name: &str) -> Option<MaterialId> {
        self.registry.get()?.by_name.get(name).copied()
    }

    /// Like [`id_of`](Self::id_of) but reports the missing name as an error.
    pub fn resolve(&self, name: &str) -> Result<MaterialId, TileError> {
        self.id_of(name)
            .ok_or_else(|| TileError::UnknownMaterial(name.to_string()))
    }

    /// Iterates all tile templates in ID order.
    pub fn tiles(&self) -> impl Iterator<Item = &Tile> {
        self.registry
            .get()
            .map(|r| r.tiles.as_slice())
            .unwrap_or_default()
            .iter()
    }
}
