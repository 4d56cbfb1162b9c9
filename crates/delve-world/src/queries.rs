//! Spatial tile queries and mutations in world coordinates.
//!
//! Everything here degrades quietly: a position with no resident, generated
//! chunk reads as air and ignores writes. Region operations visit the 3×3
//! chunk neighbourhood around the center and clip the region to each chunk,
//! so radii must stay below the chunk pixel size.

use delve_common::{ChunkCoord, LocalCoord, MaterialId, PixelCoord, Rgba, AIR};
use glam::{IVec2, Vec2};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::chunk::Chunk;
use crate::streaming::ChunkManager;
use crate::tiles::Tile;

/// Footprint of a region query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegionShape {
    /// Pixels with `dx² + dy² <= r²`.
    #[default]
    Circle,
    /// Every pixel within `r` on both axes.
    Square,
}

impl RegionShape {
    /// Whether the offset lies inside the shape of the given radius.
    #[must_use]
    pub fn contains(self, dx: i32, dy: i32, radius: i32) -> bool {
        match self {
            Self::Circle => dx * dx + dy * dy <= radius * radius,
            Self::Square => dx.abs() <= radius && dy.abs() <= radius,
        }
    }
}

/// Pixel rectangle of one chunk covered by a region.
struct Clip {
    coord: ChunkCoord,
    /// Global pixel of the chunk's (0, 0) tile
    base: IVec2,
    min: IVec2,
    max: IVec2,
}

impl ChunkManager {
    fn locate(&self, pos: Vec2) -> Option<(&Chunk, LocalCoord)> {
        let geometry = self.config.geometry;
        let coord = geometry.chunk_of(pos);
        let chunk = self.chunks.get(&coord).filter(|c| c.is_generated())?;
        Some((chunk, geometry.local_pixel(pos, coord)?))
    }

    /// Hardness at a world position, 0 outside resident terrain.
    #[must_use]
    pub fn hardness_at(&self, pos: Vec2) -> u8 {
        self.locate(pos)
            .map_or(0, |(chunk, l)| chunk.hardness(u32::from(l.x), u32::from(l.y)))
    }

    /// Color at a world position, transparent outside resident terrain.
    #[must_use]
    pub fn color_at(&self, pos: Vec2) -> Rgba {
        self.locate(pos)
            .map_or(Rgba::TRANSPARENT, |(chunk, l)| chunk.color(u32::from(l.x), u32::from(l.y)))
    }

    /// Material ID at a world position, air outside resident terrain.
    #[must_use]
    pub fn tile_id_at(&self, pos: Vec2) -> MaterialId {
        self.locate(pos).map_or(AIR, |(chunk, l)| chunk.tile_id_at(l))
    }

    /// Tile at a world position, air outside resident terrain.
    ///
    /// Color and hardness come from the chunk; the value from the database.
    #[must_use]
    pub fn tile_at(&self, pos: Vec2) -> Tile {
        self.locate(pos).map_or(Tile::AIR, |(chunk, l)| {
            let (x, y) = (u32::from(l.x), u32::from(l.y));
            let id = chunk.tile_id(x, y);
            Tile {
                id,
                color: chunk.color(x, y),
                hardness: chunk.hardness(x, y),
                value: self.tiles.tile(id).value,
            }
        })
    }

    /// Writes one tile at a world position. Returns `false` if nothing was
    /// resident there.
    pub fn set_tile_at(&mut self, pos: Vec2, tile: &Tile) -> bool {
        let geometry = self.config.geometry;
        let coord = geometry.chunk_of(pos);
        let Some(local) = geometry.local_pixel(pos, coord) else {
            return false;
        };
        match self.chunks.get_mut(&coord).filter(|c| c.is_generated()) {
            Some(chunk) => {
                chunk.set_tile(u32::from(local.x), u32::from(local.y), tile);
                true
            },
            None => false,
        }
    }

    /// Whether any non-air tile lies within `radius` pixels of `center`.
    #[must_use]
    pub fn region_has_solid(&self, center: Vec2, radius: u32, shape: RegionShape) -> bool {
        let Some(r) = self.checked_radius(radius) else {
            return false;
        };
        let Some(center) = self.config.geometry.pixel_of(center) else {
            return false;
        };
        self.clips(center, r).any(|clip| {
            let Some(chunk) = self.chunks.get(&clip.coord).filter(|c| c.is_generated()) else {
                return false;
            };
            (clip.min.y..=clip.max.y).any(|y| {
                (clip.min.x..=clip.max.x).any(|x| {
                    shape.contains(x - center.x, y - center.y, r)
                        && chunk.tile_id((x - clip.base.x) as u32, (y - clip.base.y) as u32) != AIR
                })
            })
        })
    }

    /// Ground contact probe: a square solid test under `pos`.
    #[must_use]
    pub fn is_grounded(&self, pos: Vec2, radius: u32) -> bool {
        self.region_has_solid(pos, radius, RegionShape::Square)
    }

    /// Replaces every tile in the region with `tile`.
    ///
    /// `counts[id]` is incremented for each replaced non-air tile of material
    /// `id`; the air slot is never touched. Tiles already equal to `tile` are
    /// not counted. Returns the total counted.
    pub fn fill_region(
        &mut self,
        center: Vec2,
        radius: u32,
        shape: RegionShape,
        tile: &Tile,
        counts: &mut [u32],
    ) -> u32 {
        match self.config.geometry.pixel_of(center) {
            Some(center) => self.apply_region(center, radius, shape, tile, Some(counts)),
            None => 0,
        }
    }

    /// Like [`fill_region`](Self::fill_region) without per-material counts.
    /// Returns the number of non-air tiles replaced.
    pub fn replace_region(&mut self, center: Vec2, radius: u32, shape: RegionShape, tile: &Tile) -> u32 {
        match self.config.geometry.pixel_of(center) {
            Some(center) => self.apply_region(center, radius, shape, tile, None),
            None => 0,
        }
    }

    /// Carves a Bresenham line between two world positions.
    ///
    /// With `half_width` 0 each step writes a single pixel; otherwise a circle
    /// of that radius is stamped. Counting follows
    /// [`fill_region`](Self::fill_region).
    pub fn carve_line(
        &mut self,
        from: Vec2,
        to: Vec2,
        half_width: u32,
        tile: &Tile,
        mut counts: Option<&mut [u32]>,
    ) -> u32 {
        if self.checked_radius(half_width).is_none() {
            return 0;
        }
        let geometry = self.config.geometry;
        let (Some(start), Some(end)) = (geometry.pixel_of(from), geometry.pixel_of(to)) else {
            return 0;
        };

        let mut total = 0;
        for pixel in bresenham(start, end) {
            total += if half_width == 0 {
                self.replace_pixel(pixel, tile, counts.as_deref_mut())
            } else {
                self.apply_region(pixel, half_width, RegionShape::Circle, tile, counts.as_deref_mut())
            };
        }
        total
    }

    fn checked_radius(&self, radius: u32) -> Option<i32> {
        if radius >= self.config.geometry.pixel_size {
            warn!(
                "Region radius {} does not fit {}px chunks, ignoring",
                radius, self.config.geometry.pixel_size
            );
            return None;
        }
        Some(radius as i32)
    }

    /// The resident-or-not chunks around `center` with the part of the region
    /// each one covers. Neighbours past the edge of the pixel grid are left out.
    fn clips(&self, center: PixelCoord, r: i32) -> impl Iterator<Item = Clip> {
        let geometry = self.config.geometry;
        let last = geometry.pixel_size as i32 - 1;
        let (origin, _) = geometry.split_pixel(center);
        let lo = IVec2::new(center.x.saturating_sub(r), center.y.saturating_sub(r));
        let hi = IVec2::new(center.x.saturating_add(r), center.y.saturating_add(r));

        (-1..=1).flat_map(move |dy| (-1..=1).map(move |dx| IVec2::new(dx, dy))).filter_map(move |step| {
            let coord = origin.step(step, geometry.unit_size)?;
            let base = geometry.chunk_base(coord)?;
            let base = IVec2::new(base.x, base.y);
            let end = IVec2::new(base.x.checked_add(last)?, base.y.checked_add(last)?);
            let min = lo.max(base);
            let max = hi.min(end);
            (min.x <= max.x && min.y <= max.y).then_some(Clip { coord, base, min, max })
        })
    }

    fn apply_region(
        &mut self,
        center: PixelCoord,
        radius: u32,
        shape: RegionShape,
        tile: &Tile,
        mut counts: Option<&mut [u32]>,
    ) -> u32 {
        let Some(r) = self.checked_radius(radius) else {
            return 0;
        };
        let clips: Vec<Clip> = self.clips(center, r).collect();

        let mut total = 0;
        for clip in clips {
            let Some(chunk) = self.chunks.get_mut(&clip.coord).filter(|c| c.is_generated()) else {
                continue;
            };
            for y in clip.min.y..=clip.max.y {
                for x in clip.min.x..=clip.max.x {
                    if !shape.contains(x - center.x, y - center.y, r) {
                        continue;
                    }
                    let previous = chunk.replace_tile((x - clip.base.x) as u32, (y - clip.base.y) as u32, tile);
                    total += tally(previous, tile, counts.as_deref_mut());
                }
            }
        }
        total
    }

    fn replace_pixel(&mut self, pixel: PixelCoord, tile: &Tile, counts: Option<&mut [u32]>) -> u32 {
        let (coord, local) = self.config.geometry.split_pixel(pixel);
        match self.chunks.get_mut(&coord).filter(|c| c.is_generated()) {
            Some(chunk) => {
                let previous = chunk.replace_tile(u32::from(local.x), u32::from(local.y), tile);
                tally(previous, tile, counts)
            },
            None => 0,
        }
    }
}

fn tally(previous: MaterialId, tile: &Tile, counts: Option<&mut [u32]>) -> u32 {
    if previous == AIR || previous == tile.id {
        return 0;
    }
    if let Some(slot) = counts.and_then(|c| c.get_mut(usize::from(previous))) {
        *slot += 1;
    }
    1
}

/// Integer line from `start` to `end`, both ends included.
///
/// Error terms are kept in `i64` so any two `i32` pixels can be joined.
fn bresenham(start: PixelCoord, end: PixelCoord) -> impl Iterator<Item = PixelCoord> {
    let dx = (i64::from(end.x) - i64::from(start.x)).abs();
    let dy = -(i64::from(end.y) - i64::from(start.y)).abs();
    let sx = if start.x < end.x { 1 } else { -1 };
    let sy = if start.y < end.y { 1 } else { -1 };
    let mut err = dx + dy;
    let mut current = Some(start);

    std::iter::from_fn(move || {
        let pixel = current?;
        current = if pixel == end {
            None
        } else {
            let mut next = pixel;
            let e2 = 2 * err;
            if e2 >= dy {
                err += dy;
                next.x += sx;
            }
            if e2 <= dx {
                err += dx;
                next.y += sy;
            }
            Some(next)
        };
        Some(pixel)
    })
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::generation::ChunkRequest;
    use crate::streaming::tests::{recording_manager, solid, stone};

    /// Manager with the 3×3 chunks around the origin resident and solid stone.
    fn stone_world() -> ChunkManager {
        let (mut manager, producer) = recording_manager(2);
        manager.set_focus(Vec2::new(2.0, 2.0));
        manager.tick(0.016);
        for request in producer.posted.borrow().iter() {
            manager.deliver(&solid(*request, stone()));
        }
        manager
    }

    #[test]
    fn test_shape_membership() {
        let inside = |shape: RegionShape| {
            (-3..=3)
                .flat_map(|y| (-3..=3).map(move |x| (x, y)))
                .filter(|&(x, y)| shape.contains(x, y, 3))
                .count()
        };
        assert_eq!(inside(RegionShape::Circle), 29);
        assert_eq!(inside(RegionShape::Square), 49);
    }

    #[test]
    fn test_point_queries() {
        let manager = stone_world();
        let pos = Vec2::new(1.3, 2.7);
        assert_eq!(manager.tile_id_at(pos), 2);
        assert_eq!(manager.hardness_at(pos), 90);
        assert_eq!(manager.color_at(pos), stone().color);
        assert_eq!(manager.tile_at(pos), stone());
    }

    #[test]
    fn test_non_resident_defaults() {
        let mut manager = stone_world();
        let far = Vec2::new(500.0, -500.0);
        assert_eq!(manager.hardness_at(far), 0);
        assert_eq!(manager.color_at(far), Rgba::TRANSPARENT);
        assert_eq!(manager.tile_at(far), Tile::AIR);
        assert!(!manager.region_has_solid(far, 4, RegionShape::Circle));
        assert!(!manager.set_tile_at(far, &stone()));
        let mut counts = vec![0; manager.material_count()];
        assert_eq!(manager.fill_region(far, 4, RegionShape::Circle, &Tile::AIR, &mut counts), 0);
    }

    #[test]
    fn test_ungenerated_chunk_reads_air() {
        let (mut manager, _producer) = recording_manager(0);
        manager.tick(0.016);
        assert!(manager.is_resident(ChunkCoord::new(0, 0)));
        assert_eq!(manager.tile_at(Vec2::new(1.0, 1.0)), Tile::AIR);
        assert!(!manager.set_tile_at(Vec2::new(1.0, 1.0), &stone()));
    }

    #[test]
    fn test_point_write_then_read() {
        let mut manager = stone_world();
        let pos = Vec2::new(-3.2, 0.5);
        assert!(manager.set_tile_at(pos, &Tile::AIR));
        assert_eq!(manager.tile_id_at(pos), AIR);
        assert_eq!(manager.tile_id_at(pos), AIR);
        assert!(manager.color_at(pos).is_transparent());
        // Hardness stays at its generated value.
        assert_eq!(manager.hardness_at(pos), 90);
    }

    #[test]
    fn test_dig_circle_at_chunk_center() {
        let (mut manager, producer) = recording_manager(0);
        manager.set_focus(Vec2::new(36.0, 74.0));
        manager.tick(0.016);
        let request = producer.posted.borrow()[0];
        assert_eq!(request.coord, ChunkCoord::new(36, 72));
        manager.deliver(&solid(request, stone()));

        let mut counts = vec![0; manager.material_count()];
        let center = Vec2::new(38.0, 74.0);
        let dug = manager.fill_region(center, 3, RegionShape::Circle, &Tile::AIR, &mut counts);
        assert_eq!(dug, 29);
        assert_eq!(counts, vec![0, 0, 29, 0]);

        // A second identical dig finds nothing left to replace.
        let again = manager.fill_region(center, 3, RegionShape::Circle, &Tile::AIR, &mut counts);
        assert_eq!(again, 0);
        assert_eq!(counts, vec![0, 0, 29, 0]);

        let chunk = manager.chunk(request.coord).expect("resident");
        assert_eq!(chunk.tile_id(32, 32), AIR);
        assert_eq!(chunk.tile_id(35, 32), AIR);
        assert_eq!(chunk.tile_id(36, 32), 2);
        assert_eq!(chunk.tile_id(35, 35), 2);
    }

    #[test]
    fn test_fill_crosses_chunk_corner() {
        let mut manager = stone_world();
        let mut counts = vec![0; manager.material_count()];
        // World (0, 0) is the shared corner of four chunks.
        let dug = manager.fill_region(Vec2::ZERO, 2, RegionShape::Square, &Tile::AIR, &mut counts);
        assert_eq!(dug, 25);
        for coord in [(0, 0), (-4, 0), (0, -4), (-4, -4)] {
            let chunk = manager.chunk(ChunkCoord::new(coord.0, coord.1)).expect("resident");
            assert!(chunk.ids().iter().any(|&id| id == AIR), "chunk {coord:?} untouched");
        }
        assert_eq!(manager.chunk(ChunkCoord::new(0, 0)).expect("resident").tile_id(2, 2), AIR);
        assert_eq!(manager.chunk(ChunkCoord::new(-4, -4)).expect("resident").tile_id(62, 62), AIR);
        assert_eq!(manager.chunk(ChunkCoord::new(-4, -4)).expect("resident").tile_id(61, 62), 2);
    }

    #[test]
    fn test_region_solid_and_grounded() {
        let mut manager = stone_world();
        let center = Vec2::new(2.0, 2.0);
        assert!(manager.region_has_solid(center, 2, RegionShape::Circle));
        assert!(manager.is_grounded(center, 1));

        manager.replace_region(center, 6, RegionShape::Square, &Tile::AIR);
        assert!(!manager.region_has_solid(center, 6, RegionShape::Circle));
        assert!(!manager.is_grounded(center, 6));
        assert!(manager.is_grounded(center, 7));
    }

    #[test]
    fn test_oversized_radius_is_noop() {
        let mut manager = stone_world();
        let mut counts = vec![0; manager.material_count()];
        assert_eq!(manager.fill_region(Vec2::ZERO, 64, RegionShape::Circle, &Tile::AIR, &mut counts), 0);
        assert_eq!(manager.replace_region(Vec2::ZERO, 100, RegionShape::Square, &Tile::AIR), 0);
        assert!(!manager.region_has_solid(Vec2::ZERO, 64, RegionShape::Circle));
        assert_eq!(manager.tile_id_at(Vec2::new(0.1, 0.1)), 2);
    }

    #[test]
    fn test_fill_with_material_counts_replaced_solids() {
        let mut manager = stone_world();
        let magma = manager.tiles().tile(3);
        let mut counts = vec![0; manager.material_count()];
        manager.replace_region(Vec2::new(2.0, 2.0), 1, RegionShape::Square, &Tile::AIR);
        let placed = manager.fill_region(Vec2::new(2.0, 2.0), 2, RegionShape::Square, &magma, &mut counts);
        // The 3×3 hole was air and is not counted.
        assert_eq!(placed, 16);
        assert_eq!(counts[2], 16);
        assert_eq!(counts[AIR as usize], 0);
        assert_eq!(manager.tile_id_at(Vec2::new(2.0, 2.0)), 3);
    }

    #[test]
    fn test_carve_line() {
        let mut manager = stone_world();
        let mut counts = vec![0; manager.material_count()];
        // 16 px per unit: (0.5, 0.5) -> pixel (8, 8), (2.5, 0.5) -> pixel (40, 8).
        let carved = manager.carve_line(Vec2::new(0.5, 0.5), Vec2::new(2.5, 0.5), 0, &Tile::AIR, Some(counts.as_mut_slice()));
        assert_eq!(carved, 33);
        assert_eq!(counts[2], 33);
        let chunk = manager.chunk(ChunkCoord::new(0, 0)).expect("resident");
        assert!((8..=40).all(|x| chunk.tile_id(x, 8) == AIR));
        assert_eq!(chunk.tile_id(20, 9), 2);

        let wide = manager.carve_line(Vec2::new(0.5, 2.0), Vec2::new(0.5, 3.0), 1, &Tile::AIR, None);
        assert!(wide > 0);
        assert_eq!(manager.tile_id_at(Vec2::new(0.5 + 1.0 / 16.0, 2.5)), AIR);
    }

    #[test]
    fn test_far_positions_are_not_resident() {
        let mut manager = stone_world();
        let far = Vec2::new(2.0e8, 0.0);
        let mut counts = vec![0; manager.material_count()];
        assert_eq!(manager.fill_region(far, 3, RegionShape::Circle, &Tile::AIR, &mut counts), 0);
        assert_eq!(manager.replace_region(far, 3, RegionShape::Square, &Tile::AIR), 0);
        assert!(!manager.region_has_solid(far, 3, RegionShape::Circle));
        assert_eq!(manager.carve_line(Vec2::ZERO, far, 1, &Tile::AIR, None), 0);
        assert_eq!(manager.tile_id_at(far), AIR);
        assert_eq!(counts, vec![0; manager.material_count()]);

        // The edge of the grid, where neighbouring chunk coordinates overflow.
        let edge = Vec2::new(f32::MAX, f32::MAX);
        assert_eq!(manager.replace_region(edge, 3, RegionShape::Square, &Tile::AIR), 0);
        assert!(!manager.is_grounded(edge, 3));
        assert_eq!(manager.tile_id_at(Vec2::new(0.1, 0.1)), 2);
    }

    #[test]
    fn test_bresenham_diagonal_and_reverse() {
        let line: Vec<_> = bresenham(PixelCoord::new(0, 0), PixelCoord::new(3, 3)).collect();
        assert_eq!(line, (0..=3).map(|i| PixelCoord::new(i, i)).collect::<Vec<_>>());

        let reverse: Vec<_> = bresenham(PixelCoord::new(2, -1), PixelCoord::new(-2, -1)).collect();
        assert_eq!(reverse.len(), 5);
        assert_eq!(reverse[4], PixelCoord::new(-2, -1));

        let single: Vec<_> = bresenham(PixelCoord::new(5, 5), PixelCoord::new(5, 5)).collect();
        assert_eq!(single, vec![PixelCoord::new(5, 5)]);
    }

    #[test]
    fn test_stale_request_does_not_fill() {
        let (mut manager, _producer) = recording_manager(0);
        manager.tick(0.016);
        assert!(!manager.deliver(&solid(ChunkRequest::new(ChunkCoord::new(0, 0), 999), stone())));
        assert!(!manager.region_has_solid(Vec2::new(2.0, 2.0), 4, RegionShape::Square));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn prop_second_fill_replaces_nothing(
            x in -3.9f32..3.9,
            y in -3.9f32..3.9,
            radius in 0u32..20,
            square in any::<bool>(),
        ) {
            let mut manager = stone_world();
            let shape = if square { RegionShape::Square } else { RegionShape::Circle };
            let center = Vec2::new(x, y);
            let mut counts = vec![0; manager.material_count()];

            let first = manager.fill_region(center, radius, shape, &Tile::AIR, &mut counts);
            let side = 2 * radius + 1;
            prop_assert!(first >= 1 && first <= side * side);
            prop_assert_eq!(counts[2], first);
            prop_assert_eq!(manager.fill_region(center, radius, shape, &Tile::AIR, &mut counts), 0);
            prop_assert!(!manager.region_has_solid(center, radius, shape));
        }
    }
}
