//! Jittered cellular (Worley-style) noise.
//!
//! The `noise` crate's `Worley` has no jitter control and only a subset of the
//! two-closest-distance return modes, so the cellular variant used by the
//! terrain fields lives here and plugs into the crate's [`NoiseFn`] trait.

use noise::NoiseFn;
use serde::{Deserialize, Serialize};

const PRIME_X: i32 = 501_125_321;
const PRIME_Y: i32 = 1_136_930_381;

/// Distance metric between a sample point and a cell's feature point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CellularDistance {
    /// Straight-line distance.
    Euclidean,
    /// Squared straight-line distance (cheaper, sharper cells).
    #[default]
    EuclideanSq,
    /// Sum of axis distances.
    Manhattan,
    /// Blend of euclidean-squared and manhattan.
    Hybrid,
}

/// What a cellular sample reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CellularReturn {
    /// Random value of the closest cell (flat-shaded cells).
    CellValue,
    /// Distance to the closest feature point.
    #[default]
    Distance,
    /// Distance to the second-closest feature point.
    Distance2,
    /// Mean of the two closest distances.
    Distance2Add,
    /// Difference of the two closest distances (cell borders).
    Distance2Sub,
    /// Product of the two closest distances.
    Distance2Mul,
    /// Ratio of the two closest distances.
    Distance2Div,
}

/// Cellular noise generator. Output is roughly in [-1, 1].
#[derive(Debug, Clone, Copy)]
pub struct Cellular {
    seed: i32,
    distance: CellularDistance,
    return_type: CellularReturn,
    jitter: f64,
}

impl Cellular {
    /// Creates a cellular generator.
    #[must_use]
    pub fn new(seed: u32, distance: CellularDistance, return_type: CellularReturn, jitter: f64) -> Self {
        Self {
            seed: seed as i32,
            distance,
            return_type,
            jitter: jitter.clamp(0.0, 1.0),
        }
    }

    fn hash(&self, x: i32, y: i32) -> u32 {
        let h = self.seed ^ x.wrapping_mul(PRIME_X) ^ y.wrapping_mul(PRIME_Y);
        (h.wrapping_mul(0x27d4_eb2d) as u32) ^ ((h as u32) >> 15)
    }

    fn measure(&self, dx: f64, dy: f64) -> f64 {
        match self.distance {
            CellularDistance::Euclidean | CellularDistance::EuclideanSq => dx * dx + dy * dy,
            CellularDistance::Manhattan => dx.abs() + dy.abs(),
            CellularDistance::Hybrid => (dx.abs() + dy.abs()) + (dx * dx + dy * dy),
        }
    }
}

impl NoiseFn<f64, 2> for Cellular {
    fn get(&self, point: [f64; 2]) -> f64 {
        let [x, y] = point;
        // Cell indices wrap into the hash, so far-out points stay defined.
        let (xr, yr) = (x.round() as i64, y.round() as i64);

        let mut d0 = f64::MAX;
        let mut d1 = f64::MAX;
        let mut closest = 0u32;

        for xi in xr - 1..=xr + 1 {
            for yi in yr - 1..=yr + 1 {
                let h = self.hash(xi as i32, yi as i32);
                let jx = (f64::from(h & 0xffff) / 65535.0 - 0.5) * self.jitter;
                let jy = (f64::from(h >> 16) / 65535.0 - 0.5) * self.jitter;
                let d = self.measure(xi as f64 + jx - x, yi as f64 + jy - y);

                if d < d0 {
                    d1 = d0;
                    d0 = d;
                    closest = h;
                } else if d < d1 {
                    d1 = d;
                }
            }
        }

        if self.distance == CellularDistance::Euclidean {
            d0 = d0.sqrt();
            d1 = d1.sqrt();
        }

        match self.return_type {
            CellularReturn::CellValue => f64::from(closest) / f64::from(u32::MAX) * 2.0 - 1.0,
            CellularReturn::Distance => d0 - 1.0,
            CellularReturn::Distance2 => d1 - 1.0,
            CellularReturn::Distance2Add => (d1 + d0) * 0.5 - 1.0,
            CellularReturn::Distance2Sub => d1 - d0 - 1.0,
            CellularReturn::Distance2Mul => d1 * d0 * 0.5 - 1.0,
            CellularReturn::Distance2Div => d0 / d1 - 1.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cellular_deterministic() {
        let a = Cellular::new(7, CellularDistance::Euclidean, CellularReturn::Distance, 1.0);
        let b = Cellular::new(7, CellularDistance::Euclidean, CellularReturn::Distance, 1.0);
        for i in 0..50 {
            let p = [f64::from(i) * 0.37, f64::from(i) * -0.91];
            assert_eq!(a.get(p), b.get(p));
        }
    }

    #[test]
    fn test_zero_jitter_feature_points_on_grid() {
        let cells = Cellular::new(1, CellularDistance::Euclidean, CellularReturn::Distance, 0.0);
        // Integer points coincide with feature points, so the closest distance is zero.
        assert!((cells.get([3.0, -2.0]) - -1.0).abs() < 1e-9);
    }

    #[test]
    fn test_cell_value_constant_inside_cell() {
        let cells = Cellular::new(3, CellularDistance::EuclideanSq, CellularReturn::CellValue, 0.0);
        let a = cells.get([10.05, 10.05]);
        let b = cells.get([9.95, 10.1]);
        assert_eq!(a, b);
        assert!((-1.0..=1.0).contains(&a));
    }

    #[test]
    fn test_second_distance_not_closer() {
        let near = Cellular::new(9, CellularDistance::Manhattan, CellularReturn::Distance, 0.8);
        let far = Cellular::new(9, CellularDistance::Manhattan, CellularReturn::Distance2, 0.8);
        for i in 0..30 {
            let p = [f64::from(i) * 1.3, f64::from(i) * 0.7];
            assert!(far.get(p) >= near.get(p));
        }
    }
}
