//! Headless game loop.
//!
//! Owns the terrain engine and drives a drill straight down through it at a
//! fixed timestep: stream around the drill, dig under it, bank what was dug,
//! and flush dirty chunks the way a renderer would at end of frame.

use anyhow::Result;
use delve_common::DelveResult;
use delve_world::{Chunk, ChunkManager, RegionShape, Tile};
use glam::Vec2;
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::inventory::Inventory;

/// Slowest fraction of `drill_speed`, reached at maximum hardness.
const MIN_SPEED_FACTOR: f32 = 0.25;

/// What a finished run produced.
#[derive(Debug, Clone)]
pub struct RunSummary {
    /// Ticks simulated
    pub ticks: u32,
    /// Final drill position
    pub drill: Vec2,
    /// Mined materials
    pub inventory: Inventory,
    /// Sell value of the inventory
    pub value: u64,
    /// Chunk texture uploads performed
    pub uploads: u64,
    /// Bytes handed to the upload sink
    pub uploaded_bytes: u64,
}

/// The headless application.
pub struct DelveApp {
    config: EngineConfig,
    manager: ChunkManager,
    inventory: Inventory,
    /// Drill position in world units
    drill: Vec2,
    /// Reused replacement count buffer
    dug: Vec<u32>,
    tick: u32,
    uploads: u64,
    uploaded_bytes: u64,
}

impl DelveApp {
    /// Builds the terrain engine and places the drill.
    pub fn new(config: EngineConfig) -> DelveResult<Self> {
        let mut manager = config.terrain.build_manager()?;
        let material_count = manager.material_count();

        match manager.tiles().id_of(&config.pocket_material) {
            Some(id) => {
                let tile = manager.tiles().tile(id);
                let pockets = config.pockets_per_chunk;
                manager.set_population_hook(move |chunk, rng| plant_pockets(chunk, rng, &tile, pockets));
            },
            None => warn!("Pocket material {} is not registered, population disabled", config.pocket_material),
        }

        let drill = Vec2::new(config.start_x, config.start_y);
        manager.set_focus(drill);

        Ok(Self {
            config,
            manager,
            inventory: Inventory::new(material_count),
            drill,
            dug: vec![0; material_count],
            tick: 0,
            uploads: 0,
            uploaded_bytes: 0,
        })
    }

    /// Current drill position.
    #[must_use]
    pub fn drill(&self) -> Vec2 {
        self.drill
    }

    /// Terrain engine.
    #[must_use]
    pub fn manager(&self) -> &ChunkManager {
        &self.manager
    }

    /// Mined materials so far.
    #[must_use]
    pub fn inventory(&self) -> &Inventory {
        &self.inventory
    }

    /// Advances the simulation by one fixed tick.
    pub fn step(&mut self) {
        let dt = self.config.fixed_dt;
        self.manager.set_focus(self.drill);
        self.manager.tick(dt);

        self.advance_drill(dt);
        self.dig();
        if self.config.blast_interval > 0 && self.tick > 0 && self.tick % self.config.blast_interval == 0 {
            self.blast();
        }

        let (uploads, bytes) = (&mut self.uploads, &mut self.uploaded_bytes);
        self.manager.flush_dirty(|_, colors| {
            *uploads += 1;
            *bytes += colors.len() as u64;
        });

        self.tick += 1;
        if self.config.log_interval > 0 && self.tick % self.config.log_interval == 0 {
            let stats = self.manager.stats();
            info!(
                "Tick {}: drill at ({:.1}, {:.1}), {} resident, {} pending, {} in flight, {} tiles mined",
                self.tick,
                self.drill.x,
                self.drill.y,
                stats.resident,
                stats.pending,
                stats.in_flight,
                self.inventory.total()
            );
        }
    }

    fn advance_drill(&mut self, dt: f32) {
        let coord = self.manager.geometry().chunk_of(self.drill);
        let ready = self.manager.chunk(coord).is_some_and(Chunk::is_generated);
        if !ready {
            debug!("Drill waiting for chunk {}", coord);
            return;
        }

        let hardness = f32::from(self.manager.hardness_at(self.drill)) / 255.0;
        let factor = 1.0 - (1.0 - MIN_SPEED_FACTOR) * hardness;
        self.drill.y -= self.config.drill_speed * factor * dt;
    }

    fn dig(&mut self) {
        self.dug.fill(0);
        let dug = self.manager.fill_region(
            self.drill,
            self.config.dig_radius,
            RegionShape::Circle,
            &Tile::AIR,
            &mut self.dug,
        );
        if dug > 0 {
            self.inventory.add(&self.dug);
        }
    }

    fn blast(&mut self) {
        self.dug.fill(0);
        let reach = Vec2::new(self.config.blast_length, 0.0);
        let mut carved = 0;
        for end in [self.drill - reach, self.drill + reach] {
            carved += self.manager.carve_line(self.drill, end, 1, &Tile::AIR, Some(self.dug.as_mut_slice()));
        }
        self.inventory.add(&self.dug);
        debug!("Blast at ({:.1}, {:.1}) carved {} tiles", self.drill.x, self.drill.y, carved);
    }

    /// Runs every configured tick and reports the result.
    pub fn run_to_end(mut self) -> RunSummary {
        while self.tick < self.config.ticks {
            self.step();
        }
        RunSummary {
            ticks: self.tick,
            drill: self.drill,
            value: self.inventory.value(self.manager.tiles()),
            inventory: self.inventory,
            uploads: self.uploads,
            uploaded_bytes: self.uploaded_bytes,
        }
    }
}

/// Population hook body: plants small 2×2 pockets of `tile`.
fn plant_pockets(chunk: &mut Chunk, rng: &mut fastrand::Rng, tile: &Tile, pockets: u32) {
    let size = chunk.size();
    if size < 2 {
        return;
    }
    for _ in 0..pockets {
        let (x, y) = (rng.u32(0..size - 1), rng.u32(0..size - 1));
        for (dx, dy) in [(0, 0), (1, 0), (0, 1), (1, 1)] {
            chunk.set_tile(x + dx, y + dy, tile);
        }
    }
}

/// Runs the application.
pub fn run(config: EngineConfig) -> Result<RunSummary> {
    info!(
        "Simulating {} ticks at {:.4}s, drill speed {}, dig radius {}",
        config.ticks, config.fixed_dt, config.drill_speed, config.dig_radius
    );
    let app = DelveApp::new(config)?;
    let summary = app.run_to_end();

    for (id, count) in summary.inventory.held() {
        info!("  material {}: {} tiles", id, count);
    }
    info!(
        "Finished after {} ticks at depth {:.1}: {} tiles worth {}, {} uploads ({} bytes)",
        summary.ticks,
        -summary.drill.y,
        summary.inventory.total(),
        summary.value,
        summary.uploads,
        summary.uploaded_bytes
    );
    Ok(summary)
}
