//! Coordinate types for world, chunk, and pixel positions.
//!
//! Three spaces are in play:
//! - **World space**: continuous `Vec2` positions in world units (what the player moves in).
//! - **Chunk grid**: a chunk is addressed by the world position of its corner, always a
//!   multiple of the chunk unit size.
//! - **Pixel space**: every chunk holds `pixel_size × pixel_size` tiles. Pixels are addressed
//!   either locally within a chunk (`LocalCoord`) or globally (`PixelCoord`).

use glam::{IVec2, Vec2};
use serde::{Deserialize, Serialize};

/// Chunk-grid coordinate: world-space corner of a chunk, aligned to the unit size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChunkCoord {
    /// X of the chunk corner in world units
    pub x: i32,
    /// Y of the chunk corner in world units
    pub y: i32,
}

impl ChunkCoord {
    /// Creates a new chunk coordinate. The caller guarantees grid alignment.
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Returns the world-space corner of the chunk.
    #[must_use]
    pub fn world_origin(self) -> Vec2 {
        Vec2::new(self.x as f32, self.y as f32)
    }

    /// Returns the chunk `steps` chunks away along each axis, or `None` when
    /// it lies past the edge of the addressable grid.
    #[must_use]
    pub fn step(self, steps: IVec2, unit_size: i32) -> Option<Self> {
        Some(Self {
            x: self.x.checked_add(steps.x.checked_mul(unit_size)?)?,
            y: self.y.checked_add(steps.y.checked_mul(unit_size)?)?,
        })
    }

    /// Index of this chunk in whole chunks from the world origin.
    #[must_use]
    pub const fn grid_index(self, unit_size: i32) -> IVec2 {
        IVec2::new(self.x.div_euclid(unit_size), self.y.div_euclid(unit_size))
    }

    /// Squared distance to `other`, measured in whole chunks.
    #[must_use]
    pub fn grid_distance_sq(self, other: Self, unit_size: i32) -> i64 {
        let d = self.grid_index(unit_size) - other.grid_index(unit_size);
        let (dx, dy) = (i64::from(d.x), i64::from(d.y));
        dx * dx + dy * dy
    }
}

impl std::fmt::Display for ChunkCoord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Pixel coordinate within a chunk (0 to pixel_size-1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LocalCoord {
    /// X coordinate within chunk
    pub x: u16,
    /// Y coordinate within chunk
    pub y: u16,
}

impl LocalCoord {
    /// Creates a new local coordinate.
    #[must_use]
    pub const fn new(x: u16, y: u16) -> Self {
        Self { x, y }
    }

    /// Converts to linear index for array access.
    #[must_use]
    pub const fn to_index(self, pixel_size: u32) -> usize {
        (self.y as usize) * (pixel_size as usize) + (self.x as usize)
    }

    /// Creates from linear index.
    #[must_use]
    pub const fn from_index(index: usize, pixel_size: u32) -> Self {
        let size = pixel_size as usize;
        Self {
            x: (index % size) as u16,
            y: (index / size) as u16,
        }
    }
}

/// Global pixel coordinate (pixel index counted from the world origin).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PixelCoord {
    /// X in pixels
    pub x: i32,
    /// Y in pixels
    pub y: i32,
}

impl PixelCoord {
    /// Creates a new pixel coordinate.
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Chunk dimensions: how many world units and how many pixels one chunk spans.
///
/// All world/chunk/pixel transforms go through this type so every caller
/// agrees on the rounding rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkGeometry {
    /// Side length of a chunk in pixels (power of two).
    pub pixel_size: u32,
    /// Side length of a chunk in world units (power of two).
    pub unit_size: i32,
}

impl ChunkGeometry {
    /// Creates a geometry. Both sizes must be powers of two.
    #[must_use]
    pub const fn new(pixel_size: u32, unit_size: i32) -> Self {
        debug_assert!(pixel_size.is_power_of_two());
        debug_assert!(unit_size > 0 && (unit_size as u32).is_power_of_two());
        Self {
            pixel_size,
            unit_size,
        }
    }

    /// Pixels per world unit.
    #[must_use]
    pub fn pixels_per_unit(&self) -> f32 {
        self.pixel_size as f32 / self.unit_size as f32
    }

    /// Number of tiles in one chunk.
    #[must_use]
    pub const fn tile_count(&self) -> usize {
        (self.pixel_size as usize) * (self.pixel_size as usize)
    }

    /// Chunk containing a world position.
    ///
    /// Floors each axis then clears the bits below the unit size, which aligns
    /// to the grid for negative positions too.
    #[must_use]
    pub fn chunk_of(&self, pos: Vec2) -> ChunkCoord {
        let mask = !(self.unit_size - 1);
        ChunkCoord {
            x: (pos.x.floor() as i32) & mask,
            y: (pos.y.floor() as i32) & mask,
        }
    }

    /// Position of `pos` inside `chunk`, normalized to [0, 1) per axis.
    #[must_use]
    pub fn local_uv(&self, pos: Vec2, chunk: ChunkCoord) -> Vec2 {
        (pos - chunk.world_origin()) / self.unit_size as f32
    }

    /// Local pixel of a world position inside `chunk`.
    ///
    /// Returns `None` when the position lies outside the chunk.
    #[must_use]
    pub fn local_pixel(&self, pos: Vec2, chunk: ChunkCoord) -> Option<LocalCoord> {
        let uv = self.local_uv(pos, chunk);
        let size = self.pixel_size as f32;
        let (px, py) = ((uv.x * size).floor(), (uv.y * size).floor());
        if px < 0.0 || py < 0.0 || px > size || py > size {
            return None;
        }
        // uv can round up to exactly 1.0 just below a chunk border.
        let max = (self.pixel_size - 1) as f32;
        Some(LocalCoord::new(px.min(max) as u16, py.min(max) as u16))
    }

    /// Global pixel containing a world position.
    ///
    /// Returns `None` when the position is too far out for an `i32` pixel index.
    #[must_use]
    pub fn pixel_of(&self, pos: Vec2) -> Option<PixelCoord> {
        let chunk = self.chunk_of(pos);
        let local = self
            .local_pixel(pos, chunk)
            .unwrap_or(LocalCoord::new(0, 0));
        self.to_global(chunk, local)
    }

    /// Global pixel of the chunk's (0, 0) tile.
    #[must_use]
    pub fn chunk_base(&self, chunk: ChunkCoord) -> Option<PixelCoord> {
        self.to_global(chunk, LocalCoord::new(0, 0))
    }

    /// Combines a chunk and a local pixel into a global pixel coordinate.
    ///
    /// Returns `None` when the result does not fit in an `i32`.
    #[must_use]
    pub fn to_global(&self, chunk: ChunkCoord, local: LocalCoord) -> Option<PixelCoord> {
        let index = chunk.grid_index(self.unit_size);
        let size = self.pixel_size as i32;
        Some(PixelCoord {
            x: index.x.checked_mul(size)?.checked_add(i32::from(local.x))?,
            y: index.y.checked_mul(size)?.checked_add(i32::from(local.y))?,
        })
    }

    /// Splits a global pixel into its chunk and local pixel.
    #[must_use]
    pub fn split_pixel(&self, pixel: PixelCoord) -> (ChunkCoord, LocalCoord) {
        let size = self.pixel_size as i32;
        let chunk = ChunkCoord {
            x: pixel.x.div_euclid(size) * self.unit_size,
            y: pixel.y.div_euclid(size) * self.unit_size,
        };
        let local = LocalCoord::new(
            pixel.x.rem_euclid(size) as u16,
            pixel.y.rem_euclid(size) as u16,
        );
        (chunk, local)
    }

    /// World position of the lower-left corner of a global pixel.
    #[must_use]
    pub fn pixel_to_world(&self, pixel: PixelCoord) -> Vec2 {
        Vec2::new(pixel.x as f32, pixel.y as f32) / self.pixels_per_unit()
    }
}
