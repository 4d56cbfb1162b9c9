//! Procedural chunk generation.
//!
//! A chunk is split into square bricks. The four terrain fields are sampled
//! only at brick corners and bilinearly interpolated for every pixel, which
//! keeps noise evaluation to `(n + 1)²` samples per field for `n × n` bricks.
//!
//! Generation runs as a [`GenerationJob`]: a resumable state machine that
//! fills one brick row per [`step`](GenerationJob::step). Worker threads run a
//! job to completion in one call; the cooperative producer advances it a few
//! rows per tick.

use std::sync::Arc;

use delve_common::{ChunkCoord, ChunkGeometry, MaterialId, Rgba};
use tracing::trace;

use crate::noise_field::{NoiseField, NoiseSettings};
use crate::tiles::{Tile, TileDatabase};

/// Material selection rule. Matches when every threshold is at or above the
/// pixel's interpolated field value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationRule {
    /// Material placed when the rule matches.
    pub material: MaterialId,
    /// Upper temperature bound.
    pub temperature: f32,
    /// Upper pressure bound.
    pub pressure: f32,
    /// Upper tectonics bound.
    pub tectonics: f32,
}

impl GenerationRule {
    /// Creates a rule.
    #[must_use]
    pub const fn new(material: MaterialId, temperature: f32, pressure: f32, tectonics: f32) -> Self {
        Self {
            material,
            temperature,
            pressure,
            tectonics,
        }
    }

    /// Whether a sample falls under all three thresholds.
    #[must_use]
    pub fn matches(&self, sample: &FieldSample) -> bool {
        !(self.temperature < sample.temperature
            || self.pressure < sample.pressure
            || self.tectonics < sample.tectonics)
    }
}

/// Values of the four terrain fields at one point.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FieldSample {
    /// Cave density; below the cave threshold the pixel is air.
    pub density: f32,
    /// Temperature.
    pub temperature: f32,
    /// Pressure.
    pub pressure: f32,
    /// Tectonic activity.
    pub tectonics: f32,
}

impl FieldSample {
    fn lerp(self, other: Self, t: f32) -> Self {
        Self {
            density: self.density + (other.density - self.density) * t,
            temperature: self.temperature + (other.temperature - self.temperature) * t,
            pressure: self.pressure + (other.pressure - self.pressure) * t,
            tectonics: self.tectonics + (other.tectonics - self.tectonics) * t,
        }
    }

    /// Bilinear interpolation between four corners at fractional `(tx, ty)`.
    #[must_use]
    pub fn bilinear(c00: Self, c10: Self, c01: Self, c11: Self, tx: f32, ty: f32) -> Self {
        let bottom = c00.lerp(c10, tx);
        let top = c01.lerp(c11, tx);
        bottom.lerp(top, ty)
    }
}

/// The four independent noise fields that drive generation.
#[derive(Debug)]
pub struct TerrainFields {
    /// Cave density field.
    pub density: NoiseField,
    /// Temperature field.
    pub temperature: NoiseField,
    /// Pressure field.
    pub pressure: NoiseField,
    /// Tectonics field.
    pub tectonics: NoiseField,
}

impl TerrainFields {
    /// Builds all four fields from one world seed.
    #[must_use]
    pub fn new(
        seed: u32,
        density: &NoiseSettings,
        temperature: &NoiseSettings,
        pressure: &NoiseSettings,
        tectonics: &NoiseSettings,
    ) -> Self {
        Self {
            density: NoiseField::new(seed, density),
            temperature: NoiseField::new(seed, temperature),
            pressure: NoiseField::new(seed, pressure),
            tectonics: NoiseField::new(seed, tectonics),
        }
    }

    /// Samples every field at a global pixel position.
    #[must_use]
    pub fn sample(&self, x: f64, y: f64) -> FieldSample {
        FieldSample {
            density: self.density.sample(x, y),
            temperature: self.temperature.sample(x, y),
            pressure: self.pressure.sample(x, y),
            tectonics: self.tectonics.sample(x, y),
        }
    }
}

/// Static generation parameters.
#[derive(Debug, Clone)]
pub struct GeneratorSettings {
    /// Chunk dimensions.
    pub geometry: ChunkGeometry,
    /// Brick side length in pixels; divides the chunk pixel size.
    pub brick_size: u32,
    /// Chunks whose world Y is above this are generated as air.
    pub ground_level: i32,
    /// Chunks whose world Y is below this may be populated.
    pub population_level: i32,
    /// Density below this carves a cave.
    pub cave_threshold: f32,
    /// Material used when no rule matches.
    pub base_material: MaterialId,
    /// Ordered rules; the first match wins.
    pub rules: Vec<GenerationRule>,
}

/// A request to generate the chunk at `coord`.
///
/// The ticket identifies the live chunk the result is meant for, so a result
/// for an evicted-and-recreated chunk can be recognised as stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChunkRequest {
    /// Chunk to generate.
    pub coord: ChunkCoord,
    /// Ticket of the chunk that asked for it.
    pub ticket: u64,
}

impl ChunkRequest {
    /// Creates a request.
    #[must_use]
    pub const fn new(coord: ChunkCoord, ticket: u64) -> Self {
        Self { coord, ticket }
    }
}

/// Finished tile buffer for one chunk, laid out like [`Chunk`](crate::Chunk).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkData {
    /// Request this result answers.
    pub request: ChunkRequest,
    /// Material IDs, indexed `y * size + x`.
    pub ids: Vec<MaterialId>,
    /// Hardness per tile.
    pub hardness: Vec<u8>,
    /// Color per tile.
    pub colors: Vec<Rgba>,
    /// Generated below the population level.
    pub populate: bool,
}

impl ChunkData {
    fn filled(request: ChunkRequest, count: usize, tile: Tile, populate: bool) -> Self {
        Self {
            request,
            ids: vec![tile.id; count],
            hardness: vec![tile.hardness; count],
            colors: vec![tile.color; count],
            populate,
        }
    }

    /// Chunk coordinate of the result.
    #[must_use]
    pub const fn coord(&self) -> ChunkCoord {
        self.request.coord
    }

    fn write(&mut self, index: usize, tile: Tile) {
        self.ids[index] = tile.id;
        self.hardness[index] = tile.hardness;
        self.colors[index] = tile.color;
    }
}

/// Deterministic chunk generator, shared between workers.
#[derive(Debug)]
pub struct ChunkGenerator {
    settings: GeneratorSettings,
    fields: TerrainFields,
    tiles: Arc<TileDatabase>,
}

impl ChunkGenerator {
    /// Creates a generator.
    #[must_use]
    pub fn new(settings: GeneratorSettings, fields: TerrainFields, tiles: Arc<TileDatabase>) -> Self {
        debug_assert!(settings.brick_size > 0);
        debug_assert_eq!(settings.geometry.pixel_size % settings.brick_size, 0);
        Self {
            settings,
            fields,
            tiles,
        }
    }

    /// Returns the generation settings.
    #[must_use]
    pub fn settings(&self) -> &GeneratorSettings {
        &self.settings
    }

    /// Returns the tile database.
    #[must_use]
    pub fn tiles(&self) -> &Arc<TileDatabase> {
        &self.tiles
    }

    /// Whether a chunk at `coord` is eligible for population.
    #[must_use]
    pub const fn is_population_eligible(&self, coord: ChunkCoord) -> bool {
        coord.y < self.settings.population_level
    }

    /// Whether a chunk at `coord` is skipped as all air.
    #[must_use]
    pub const fn is_above_ground(&self, coord: ChunkCoord) -> bool {
        coord.y > self.settings.ground_level
    }

    /// Chooses the material for one interpolated sample.
    #[must_use]
    pub fn classify(&self, sample: &FieldSample) -> MaterialId {
        if sample.density < self.settings.cave_threshold {
            return delve_common::AIR;
        }
        self.settings
            .rules
            .iter()
            .find(|rule| rule.matches(sample))
            .map_or(self.settings.base_material, |rule| rule.material)
    }

    /// Starts a resumable generation job.
    #[must_use]
    pub fn start(&self, request: ChunkRequest) -> GenerationJob {
        GenerationJob::new(self, request)
    }

    /// Generates a chunk synchronously. Blocks until the buffer is complete.
    #[must_use]
    pub fn generate(&self, request: ChunkRequest) -> ChunkData {
        let mut job = self.start(request);
        while !job.step(self) {}
        job.finish()
    }

    fn sample_corner_row(&self, coord: ChunkCoord, row: u32, out: &mut Vec<FieldSample>) {
        let geometry = self.settings.geometry;
        let brick = self.settings.brick_size as i32;
        let bricks = (geometry.pixel_size / self.settings.brick_size) as i32;
        let index = coord.grid_index(geometry.unit_size);
        let size = f64::from(geometry.pixel_size);
        let (base_x, base_y) = (f64::from(index.x) * size, f64::from(index.y) * size);
        let gy = base_y + f64::from(row as i32 * brick);

        out.clear();
        out.extend((0..=bricks).map(|bx| self.fields.sample(base_x + f64::from(bx * brick), gy)));
    }
}

/// Resumable generation of one chunk, one brick row per step.
#[derive(Debug)]
pub struct GenerationJob {
    data: ChunkData,
    /// Corner samples along the bottom edge of the current brick row.
    lower: Vec<FieldSample>,
    /// Corner samples along its top edge.
    upper: Vec<FieldSample>,
    next_row: u32,
    rows: u32,
}

impl GenerationJob {
    fn new(generator: &ChunkGenerator, request: ChunkRequest) -> Self {
        let settings = &generator.settings;
        let count = settings.geometry.tile_count();
        let populate = generator.is_population_eligible(request.coord);
        let data = ChunkData::filled(request, count, generator.tiles.air(), populate);

        if generator.is_above_ground(request.coord) {
            return Self {
                data,
                lower: Vec::new(),
                upper: Vec::new(),
                next_row: 0,
                rows: 0,
            };
        }

        let bricks = settings.geometry.pixel_size / settings.brick_size;
        let mut lower = Vec::with_capacity(bricks as usize + 1);
        generator.sample_corner_row(request.coord, 0, &mut lower);

        Self {
            data,
            lower,
            upper: Vec::with_capacity(bricks as usize + 1),
            next_row: 0,
            rows: bricks,
        }
    }

    /// Request this job is answering.
    #[must_use]
    pub const fn request(&self) -> ChunkRequest {
        self.data.request
    }

    /// Whether every brick row has been filled.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.next_row >= self.rows
    }

    /// Brick rows still to fill.
    #[must_use]
    pub const fn rows_remaining(&self) -> u32 {
        self.rows.saturating_sub(self.next_row)
    }

    /// Fills the next brick row. Returns `true` once the job is complete.
    pub fn step(&mut self, generator: &ChunkGenerator) -> bool {
        if self.is_complete() {
            return true;
        }

        let settings = &generator.settings;
        let size = settings.geometry.pixel_size;
        let brick = settings.brick_size;
        let row = self.next_row;
        let bricks = self.rows;

        generator.sample_corner_row(self.data.request.coord, row + 1, &mut self.upper);

        let inv = 1.0 / brick as f32;
        for by in 0..brick {
            let ty = by as f32 * inv;
            let y = row * brick + by;
            for bx in 0..bricks {
                let (c00, c10) = (self.lower[bx as usize], self.lower[bx as usize + 1]);
                let (c01, c11) = (self.upper[bx as usize], self.upper[bx as usize + 1]);
                for px in 0..brick {
                    let sample = FieldSample::bilinear(c00, c10, c01, c11, px as f32 * inv, ty);
                    let x = bx * brick + px;
                    let tile = generator.tiles.tile(generator.classify(&sample));
                    self.data.write((y * size + x) as usize, tile);
                }
            }
        }

        std::mem::swap(&mut self.lower, &mut self.upper);
        self.next_row += 1;
        trace!(
            "Chunk {} brick row {}/{}",
            self.data.request.coord,
            self.next_row,
            self.rows
        );
        self.is_complete()
    }

    /// Consumes the job and returns its buffer.
    #[must_use]
    pub fn finish(self) -> ChunkData {
        debug_assert!(self.is_complete());
        self.data
    }
}
