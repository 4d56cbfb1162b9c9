//! Mined material tally.

use delve_common::{MaterialId, AIR};
use delve_world::TileDatabase;

/// Per-material counts of everything the drill has dug out.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Inventory {
    counts: Vec<u64>,
}

impl Inventory {
    /// Creates an empty inventory sized for `material_count` materials.
    #[must_use]
    pub fn new(material_count: usize) -> Self {
        Self {
            counts: vec![0; material_count],
        }
    }

    /// Adds a replacement count buffer. The air slot is ignored.
    pub fn add(&mut self, replaced: &[u32]) {
        for (id, (slot, &count)) in self.counts.iter_mut().zip(replaced).enumerate() {
            if id != usize::from(AIR) {
                *slot += u64::from(count);
            }
        }
    }

    /// Tiles held of one material.
    #[must_use]
    pub fn count(&self, id: MaterialId) -> u64 {
        self.counts.get(usize::from(id)).copied().unwrap_or(0)
    }

    /// Tiles held across all materials.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.counts.iter().sum()
    }

    /// Sell value of everything held.
    #[must_use]
    pub fn value(&self, tiles: &TileDatabase) -> u64 {
        self.held()
            .map(|(id, count)| count * u64::from(tiles.tile(id).value))
            .sum()
    }

    /// Materials with a non-zero count, in ID order.
    pub fn held(&self) -> impl Iterator<Item = (MaterialId, u64)> + '_ {
        self.counts
            .iter()
            .enumerate()
            .filter(|&(_, &count)| count > 0)
            .map(|(id, &count)| (id as MaterialId, count))
    }
}
