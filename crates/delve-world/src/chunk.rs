//! Chunk tile storage.
//!
//! A chunk keeps three flattened parallel arrays indexed `y * size + x`:
//! material IDs, hardness, and colors. Hardness is a generation-time snapshot
//! used for movement queries; IDs and colors change together on every write.

use delve_common::{ChunkCoord, LocalCoord, MaterialId, Rgba, AIR};
use tracing::warn;

use crate::generation::ChunkData;
use crate::tiles::Tile;

/// A resident square of terrain.
#[derive(Debug)]
pub struct Chunk {
    /// Chunk coordinate
    coord: ChunkCoord,
    /// Side length in pixels
    size: u32,
    /// Identifies this particular residency of `coord`
    ticket: u64,
    ids: Vec<MaterialId>,
    hardness: Vec<u8>,
    colors: Vec<Rgba>,
    /// Whether the generator output has been loaded
    generated: bool,
    /// Whether colors changed since the last render flush
    dirty: bool,
}

impl Chunk {
    /// Creates an ungenerated, all-air chunk.
    #[must_use]
    pub fn new(coord: ChunkCoord, size: u32, ticket: u64) -> Self {
        let count = (size * size) as usize;
        Self {
            coord,
            size,
            ticket,
            ids: vec![AIR; count],
            hardness: vec![0; count],
            colors: vec![Rgba::TRANSPARENT; count],
            generated: false,
            dirty: false,
        }
    }

    /// Returns the chunk coordinate.
    #[must_use]
    pub const fn coord(&self) -> ChunkCoord {
        self.coord
    }

    /// Returns the side length in pixels.
    #[must_use]
    pub const fn size(&self) -> u32 {
        self.size
    }

    /// Returns the residency ticket.
    #[must_use]
    pub const fn ticket(&self) -> u64 {
        self.ticket
    }

    /// Whether generator output has been loaded.
    #[must_use]
    pub const fn is_generated(&self) -> bool {
        self.generated
    }

    /// Whether the color buffer needs re-uploading.
    #[must_use]
    pub const fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Marks the color buffer for re-upload.
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Clears the dirty flag, returning whether it was set.
    pub fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    #[inline]
    fn index(&self, x: u32, y: u32) -> usize {
        debug_assert!(
            x < self.size && y < self.size,
            "({x}, {y}) outside chunk of size {}",
            self.size
        );
        (y * self.size + x) as usize
    }

    /// Material ID at a local pixel.
    #[must_use]
    pub fn tile_id(&self, x: u32, y: u32) -> MaterialId {
        self.ids[self.index(x, y)]
    }

    /// Hardness at a local pixel.
    #[must_use]
    pub fn hardness(&self, x: u32, y: u32) -> u8 {
        self.hardness[self.index(x, y)]
    }

    /// Color at a local pixel.
    #[must_use]
    pub fn color(&self, x: u32, y: u32) -> Rgba {
        self.colors[self.index(x, y)]
    }

    /// Same as [`tile_id`](Self::tile_id) for a [`LocalCoord`].
    #[must_use]
    pub fn tile_id_at(&self, local: LocalCoord) -> MaterialId {
        self.tile_id(u32::from(local.x), u32::from(local.y))
    }

    /// Writes a tile's ID and color.
    pub fn set_tile(&mut self, x: u32, y: u32, tile: &Tile) {
        let index = self.index(x, y);
        self.ids[index] = tile.id;
        self.colors[index] = tile.color;
        self.dirty = true;
    }

    /// Writes a tile and returns the ID it replaced.
    pub fn replace_tile(&mut self, x: u32, y: u32, tile: &Tile) -> MaterialId {
        let index = self.index(x, y);
        let previous = self.ids[index];
        if previous != tile.id {
            self.ids[index] = tile.id;
            self.colors[index] = tile.color;
            self.dirty = true;
        }
        previous
    }

    /// Copies a generated buffer into this chunk.
    ///
    /// Returns `false` without touching the chunk if it was already generated
    /// or the buffer does not fit.
    pub fn load(&mut self, data: &ChunkData) -> bool {
        if self.generated {
            return false;
        }
        let count = self.ids.len();
        if data.ids.len() != count || data.hardness.len() != count || data.colors.len() != count {
            warn!(
                "Generated buffer for {} has {} tiles, expected {}",
                self.coord,
                data.ids.len(),
                count
            );
            return false;
        }

        self.ids.copy_from_slice(&data.ids);
        self.hardness.copy_from_slice(&data.hardness);
        self.colors.copy_from_slice(&data.colors);
        self.generated = true;
        self.dirty = true;
        true
    }

    /// Material IDs, row-major.
    #[must_use]
    pub fn ids(&self) -> &[MaterialId] {
        &self.ids
    }

    /// Colors, row-major.
    #[must_use]
    pub fn colors(&self) -> &[Rgba] {
        &self.colors
    }

    /// Colors as raw RGBA bytes, ready for a texture upload.
    #[must_use]
    pub fn color_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.colors)
    }
}
