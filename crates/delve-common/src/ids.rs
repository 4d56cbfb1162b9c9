//! Material identifiers.

/// Dense material ID. Fits in one byte so tile grids stay compact.
pub type MaterialId = u8;

/// ID of the empty "air" material, always the first registered material.
pub const AIR: MaterialId = 0;

/// Largest number of materials the ID space can hold.
pub const MAX_MATERIALS: usize = 1 << MaterialId::BITS;
