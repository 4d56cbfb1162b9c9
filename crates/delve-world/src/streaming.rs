//! World streaming and chunk management.
//!
//! The manager owns every resident chunk. Each [`tick`](ChunkManager::tick)
//! recenters on the focus position, evicts chunks outside the unload radius,
//! creates and posts chunks inside the load radius in spiral order, and then
//! delivers whatever the producer finished.

use std::sync::Arc;

use ahash::AHashMap;
use delve_common::{ChunkCoord, ChunkGeometry};
use glam::{IVec2, Vec2};
use tracing::{debug, info, trace};

use crate::chunk::Chunk;
use crate::generation::{ChunkData, ChunkRequest};
use crate::producer::ChunkProducer;
use crate::spiral::spiral_offsets;
use crate::tiles::TileDatabase;

/// Callback run on freshly loaded chunks the generator flagged for population.
pub type PopulationHook = Box<dyn FnMut(&mut Chunk, &mut fastrand::Rng)>;

/// Chunk manager configuration.
#[derive(Debug, Clone)]
pub struct StreamingConfig {
    /// Chunk dimensions
    pub geometry: ChunkGeometry,
    /// Chunks within this many grid cells of the focus are loaded
    pub load_radius: u32,
    /// Chunks beyond this many grid cells of the focus are evicted
    pub unload_radius: u32,
    /// Probability that an eligible chunk is populated
    pub population_chance: f32,
    /// Seed for population rolls
    pub seed: u64,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            geometry: ChunkGeometry::new(64, 4),
            load_radius: 3,
            unload_radius: 4,
            population_chance: 0.25,
            seed: 0,
        }
    }
}

/// Counters describing streaming activity.
///
/// The per-tick fields are reset at the start of every tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamingStats {
    /// Resident chunks
    pub resident: usize,
    /// Resident chunks still waiting for generator output
    pub pending: usize,
    /// Requests the producer has not returned yet
    pub in_flight: usize,
    /// Chunks created this tick
    pub loaded: usize,
    /// Chunks evicted this tick
    pub unloaded: usize,
    /// Results applied this tick
    pub delivered: usize,
    /// Stale results discarded this tick
    pub dropped: usize,
    /// Chunks handed to the population hook this tick
    pub populated: usize,
    /// Chunks created since startup
    pub total_loaded: u64,
    /// Chunks evicted since startup
    pub total_unloaded: u64,
    /// Results applied since startup
    pub total_delivered: u64,
    /// Stale results discarded since startup
    pub total_dropped: u64,
}

impl StreamingStats {
    fn begin_tick(&mut self) {
        self.loaded = 0;
        self.unloaded = 0;
        self.delivered = 0;
        self.dropped = 0;
        self.populated = 0;
    }
}

/// Manages chunk residency and generation.
pub struct ChunkManager {
    /// Configuration
    pub(crate) config: StreamingConfig,
    pub(crate) tiles: Arc<TileDatabase>,
    producer: Box<dyn ChunkProducer>,
    /// Resident chunks; a coordinate is resident iff it is a key here
    pub(crate) chunks: AHashMap<ChunkCoord, Chunk>,
    /// Load order, in grid cells
    spiral: Vec<IVec2>,
    focus: Vec2,
    focus_chunk: Option<ChunkCoord>,
    next_ticket: u64,
    /// Reused buffer for producer output
    completed: Vec<ChunkData>,
    population_hook: Option<PopulationHook>,
    stats: StreamingStats,
    elapsed: f64,
}

impl ChunkManager {
    /// Creates a manager with no resident chunks.
    #[must_use]
    pub fn new(config: StreamingConfig, tiles: Arc<TileDatabase>, producer: Box<dyn ChunkProducer>) -> Self {
        let spiral = spiral_offsets(config.load_radius);
        info!(
            "Chunk manager: {}px chunks over {} units, load radius {}, unload radius {}",
            config.geometry.pixel_size, config.geometry.unit_size, config.load_radius, config.unload_radius
        );
        Self {
            config,
            tiles,
            producer,
            chunks: AHashMap::with_capacity(spiral.len() * 2),
            spiral,
            focus: Vec2::ZERO,
            focus_chunk: None,
            next_ticket: 1,
            completed: Vec::new(),
            population_hook: None,
            stats: StreamingStats::default(),
            elapsed: 0.0,
        }
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &StreamingConfig {
        &self.config
    }

    /// Returns the chunk geometry.
    #[must_use]
    pub fn geometry(&self) -> ChunkGeometry {
        self.config.geometry
    }

    /// Returns the tile database.
    #[must_use]
    pub fn tiles(&self) -> &Arc<TileDatabase> {
        &self.tiles
    }

    /// Number of registered materials, for sizing replacement count buffers.
    #[must_use]
    pub fn material_count(&self) -> usize {
        self.tiles.len()
    }

    /// Sets the world position streaming is centered on.
    pub fn set_focus(&mut self, focus: Vec2) {
        self.focus = focus;
    }

    /// Returns the focus position.
    #[must_use]
    pub fn focus(&self) -> Vec2 {
        self.focus
    }

    /// Chunk the focus was in at the last tick.
    #[must_use]
    pub fn focus_chunk(&self) -> Option<ChunkCoord> {
        self.focus_chunk
    }

    /// Installs the population callback.
    pub fn set_population_hook<F>(&mut self, hook: F)
    where
        F: FnMut(&mut Chunk, &mut fastrand::Rng) + 'static,
    {
        self.population_hook = Some(Box::new(hook));
    }

    /// Streaming counters as of the last tick.
    #[must_use]
    pub fn stats(&self) -> &StreamingStats {
        &self.stats
    }

    /// Total simulated time passed to [`tick`](Self::tick).
    #[must_use]
    pub fn elapsed(&self) -> f64 {
        self.elapsed
    }

    /// Checks if a chunk is resident.
    #[must_use]
    pub fn is_resident(&self, coord: ChunkCoord) -> bool {
        self.chunks.contains_key(&coord)
    }

    /// Returns the number of resident chunks.
    #[must_use]
    pub fn resident_count(&self) -> usize {
        self.chunks.len()
    }

    /// Iterates resident chunk coordinates in no particular order.
    pub fn resident_coords(&self) -> impl Iterator<Item = ChunkCoord> + '_ {
        self.chunks.keys().copied()
    }

    /// Resident chunk at `coord`.
    #[must_use]
    pub fn chunk(&self, coord: ChunkCoord) -> Option<&Chunk> {
        self.chunks.get(&coord)
    }

    /// Mutable resident chunk at `coord`.
    pub fn chunk_mut(&mut self, coord: ChunkCoord) -> Option<&mut Chunk> {
        self.chunks.get_mut(&coord)
    }

    /// Runs one streaming step.
    pub fn tick(&mut self, dt: f32) {
        self.elapsed += f64::from(dt);
        self.stats.begin_tick();

        let center = self.config.geometry.chunk_of(self.focus);
        if self.focus_chunk != Some(center) {
            debug!("Focus moved to chunk {}", center);
            self.focus_chunk = Some(center);
        }

        self.unload_outside(center);
        self.load_around(center);

        let mut completed = std::mem::take(&mut self.completed);
        self.producer.consume(&mut completed);
        for data in completed.drain(..) {
            self.deliver(&data);
        }
        self.completed = completed;

        self.stats.resident = self.chunks.len();
        self.stats.pending = self.chunks.values().filter(|c| !c.is_generated()).count();
        self.stats.in_flight = self.producer.in_flight();
        trace!("Streaming tick: {:?}", self.stats);
    }

    fn unload_outside(&mut self, center: ChunkCoord) {
        let unit = self.config.geometry.unit_size;
        let limit = i64::from(self.config.unload_radius) * i64::from(self.config.unload_radius);
        let before = self.chunks.len();
        self.chunks.retain(|coord, _| {
            let keep = coord.grid_distance_sq(center, unit) <= limit;
            if !keep {
                debug!("Unloading chunk {}", coord);
            }
            keep
        });
        let unloaded = before - self.chunks.len();
        self.stats.unloaded = unloaded;
        self.stats.total_unloaded += unloaded as u64;
    }

    fn load_around(&mut self, center: ChunkCoord) {
        let geometry = self.config.geometry;
        for offset in &self.spiral {
            let Some(coord) = center.step(*offset, geometry.unit_size) else {
                continue;
            };
            if self.chunks.contains_key(&coord) {
                continue;
            }
            let ticket = self.next_ticket;
            self.next_ticket += 1;
            self.chunks.insert(coord, Chunk::new(coord, geometry.pixel_size, ticket));
            self.producer.post(ChunkRequest::new(coord, ticket));
            debug!("Loading chunk {} (ticket {})", coord, ticket);
            self.stats.loaded += 1;
        }
        self.stats.total_loaded += self.stats.loaded as u64;
    }

    /// Applies a generator result to its chunk.
    ///
    /// The result is dropped unless a resident, ungenerated chunk with the
    /// same coordinate and ticket is waiting for it. Returns whether it was
    /// applied.
    pub fn deliver(&mut self, data: &ChunkData) -> bool {
        let coord = data.coord();
        let applied = match self.chunks.get_mut(&coord) {
            Some(chunk) if chunk.ticket() == data.request.ticket => chunk.load(data),
            _ => false,
        };
        if !applied {
            debug!("Dropping stale result for chunk {} (ticket {})", coord, data.request.ticket);
            self.stats.dropped += 1;
            self.stats.total_dropped += 1;
            return false;
        }

        self.stats.delivered += 1;
        self.stats.total_delivered += 1;
        trace!("Delivered chunk {}", coord);

        if data.populate {
            let mut rng = fastrand::Rng::with_seed(population_seed(self.config.seed, coord));
            if rng.f32() < self.config.population_chance {
                if let (Some(hook), Some(chunk)) = (self.population_hook.as_mut(), self.chunks.get_mut(&coord)) {
                    hook(chunk, &mut rng);
                    self.stats.populated += 1;
                }
            }
        }
        true
    }

    /// Hands every dirty chunk's color bytes to `upload` and clears the flag.
    ///
    /// Returns the number of chunks uploaded.
    pub fn flush_dirty<F>(&mut self, mut upload: F) -> usize
    where
        F: FnMut(ChunkCoord, &[u8]),
    {
        let mut flushed = 0;
        for (coord, chunk) in &mut self.chunks {
            if chunk.take_dirty() {
                upload(*coord, chunk.color_bytes());
                flushed += 1;
            }
        }
        flushed
    }
}

fn population_seed(seed: u64, coord: ChunkCoord) -> u64 {
    let packed = (u64::from(coord.x as u32) << 32) | u64::from(coord.y as u32);
    (seed ^ packed).wrapping_mul(0x9e37_79b9_7f4a_7c15)
}
