//! Configurable coherent-noise fields sampled in [0, 1].
//!
//! Each field layers one base generator (from the `noise` crate, or the local
//! [`Cellular`] generator) into an optional fractal sum. Fields hold no
//! mutable state after construction and are shared freely between threads.

use noise::{NoiseFn, OpenSimplex, Perlin, SuperSimplex, Value};
use serde::{Deserialize, Serialize};

use crate::cellular::{Cellular, CellularDistance, CellularReturn};

/// Base noise generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoiseKind {
    /// OpenSimplex gradient noise.
    #[default]
    OpenSimplex,
    /// SuperSimplex gradient noise.
    SuperSimplex,
    /// Classic Perlin noise.
    Perlin,
    /// Interpolated value noise.
    Value,
    /// Jittered cellular noise.
    Cellular,
}

/// How octaves are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FractalKind {
    /// Single octave.
    #[default]
    None,
    /// Fractional Brownian motion.
    Fbm,
    /// Ridged multifractal.
    Ridged,
    /// Ping-pong folding.
    PingPong,
}

/// Parameters for one noise field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NoiseSettings {
    /// Base generator.
    pub kind: NoiseKind,
    /// Added to the world seed so fields stay independent.
    pub seed_offset: u32,
    /// Coordinate scale applied before sampling.
    pub frequency: f64,
    /// Octave combination.
    pub fractal: FractalKind,
    /// Number of octaves (ignored for `FractalKind::None`).
    pub octaves: u32,
    /// Frequency multiplier per octave.
    pub lacunarity: f64,
    /// Amplitude multiplier per octave.
    pub gain: f64,
    /// How much an octave's amplitude follows the previous octave's value.
    pub weighted_strength: f64,
    /// Fold strength for `FractalKind::PingPong`.
    pub ping_pong_strength: f64,
    /// Cellular distance metric.
    pub cellular_distance: CellularDistance,
    /// Cellular output mode.
    pub cellular_return: CellularReturn,
    /// Cellular feature point jitter in [0, 1].
    pub cellular_jitter: f64,
}

impl Default for NoiseSettings {
    fn default() -> Self {
        Self {
            kind: NoiseKind::OpenSimplex,
            seed_offset: 0,
            frequency: 0.01,
            fractal: FractalKind::None,
            octaves: 3,
            lacunarity: 2.0,
            gain: 0.5,
            weighted_strength: 0.0,
            ping_pong_strength: 2.0,
            cellular_distance: CellularDistance::EuclideanSq,
            cellular_return: CellularReturn::Distance,
            cellular_jitter: 1.0,
        }
    }
}

impl NoiseSettings {
    /// Settings for a plain single-octave field.
    #[must_use]
    pub fn simple(kind: NoiseKind, frequency: f64, seed_offset: u32) -> Self {
        Self {
            kind,
            frequency,
            seed_offset,
            ..Self::default()
        }
    }

    /// Adds fractal layering.
    #[must_use]
    pub fn with_fractal(mut self, fractal: FractalKind, octaves: u32) -> Self {
        self.fractal = fractal;
        self.octaves = octaves;
        self
    }
}

type Source = Box<dyn NoiseFn<f64, 2> + Send + Sync>;

/// A seeded, configured noise field.
pub struct NoiseField {
    settings: NoiseSettings,
    /// One generator per octave, each with its own seed.
    octaves: Vec<Source>,
    /// Normalizes the fractal sum back to roughly [-1, 1].
    bounding: f64,
}

impl NoiseField {
    /// Creates a field for the given world seed.
    #[must_use]
    pub fn new(world_seed: u32, settings: &NoiseSettings) -> Self {
        let seed = world_seed.wrapping_add(settings.seed_offset);
        let octave_count = match settings.fractal {
            FractalKind::None => 1,
            _ => settings.octaves.max(1),
        };

        let octaves = (0..octave_count)
            .map(|i| Self::make_source(settings, seed.wrapping_add(i)))
            .collect();

        let mut amp = settings.gain.abs();
        let mut total = 1.0;
        for _ in 1..octave_count {
            total += amp;
            amp *= settings.gain;
        }

        Self {
            settings: settings.clone(),
            octaves,
            bounding: 1.0 / total,
        }
    }

    fn make_source(settings: &NoiseSettings, seed: u32) -> Source {
        match settings.kind {
            NoiseKind::OpenSimplex => Box::new(OpenSimplex::new(seed)),
            NoiseKind::SuperSimplex => Box::new(SuperSimplex::new(seed)),
            NoiseKind::Perlin => Box::new(Perlin::new(seed)),
            NoiseKind::Value => Box::new(Value::new(seed)),
            NoiseKind::Cellular => Box::new(Cellular::new(
                seed,
                settings.cellular_distance,
                settings.cellular_return,
                settings.cellular_jitter,
            )),
        }
    }

    /// Returns the field settings.
    #[must_use]
    pub fn settings(&self) -> &NoiseSettings {
        &self.settings
    }

    /// Raw signed sample, roughly in [-1, 1].
    #[must_use]
    pub fn sample_signed(&self, x: f64, y: f64) -> f64 {
        let s = &self.settings;
        let (mut x, mut y) = (x * s.frequency, y * s.frequency);

        if s.fractal == FractalKind::None {
            return self.octaves[0].get([x, y]);
        }

        let mut sum = 0.0;
        let mut amp = self.bounding;
        for octave in &self.octaves {
            let n = octave.get([x, y]);
            match s.fractal {
                FractalKind::Fbm | FractalKind::None => {
                    sum += n * amp;
                    amp *= lerp(1.0, (n + 1.0).min(2.0) * 0.5, s.weighted_strength);
                }
                FractalKind::Ridged => {
                    let n = n.abs();
                    sum += (n * -2.0 + 1.0) * amp;
                    amp *= lerp(1.0, 1.0 - n, s.weighted_strength);
                }
                FractalKind::PingPong => {
                    let n = ping_pong((n + 1.0) * s.ping_pong_strength);
                    sum += (n - 0.5) * 2.0 * amp;
                    amp *= lerp(1.0, n, s.weighted_strength);
                }
            }
            x *= s.lacunarity;
            y *= s.lacunarity;
            amp *= s.gain;
        }
        sum
    }

    /// Sample remapped from [-1, 1] to [0, 1].
    #[must_use]
    pub fn sample(&self, x: f64, y: f64) -> f32 {
        ((self.sample_signed(x, y) + 1.0) * 0.5).clamp(0.0, 1.0) as f32
    }
}

impl std::fmt::Debug for NoiseField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NoiseField")
            .field("settings", &self.settings)
            .field("octaves", &self.octaves.len())
            .finish_non_exhaustive()
    }
}

fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a + t * (b - a)
}

fn ping_pong(t: f64) -> f64 {
    let t = t - (t * 0.5).trunc() * 2.0;
    if t < 1.0 {
        t
    } else {
        2.0 - t
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all_kinds() -> [NoiseKind; 5] {
        [
            NoiseKind::OpenSimplex,
            NoiseKind::SuperSimplex,
            NoiseKind::Perlin,
            NoiseKind::Value,
            NoiseKind::Cellular,
        ]
    }

    #[test]
    fn test_sample_in_unit_range() {
        for kind in all_kinds() {
            for fractal in [FractalKind::None, FractalKind::Fbm, FractalKind::Ridged, FractalKind::PingPong] {
                let settings = NoiseSettings::simple(kind, 0.05, 3).with_fractal(fractal, 4);
                let field = NoiseField::new(1234, &settings);
                for i in 0..200 {
                    let v = field.sample(f64::from(i) * 3.7, f64::from(i) * -1.3);
                    assert!((0.0..=1.0).contains(&v), "{kind:?}/{fractal:?} gave {v}");
                }
            }
        }
    }

    #[test]
    fn test_same_seed_same_field() {
        let settings = NoiseSettings::simple(NoiseKind::OpenSimplex, 0.02, 0).with_fractal(FractalKind::Fbm, 3);
        let a = NoiseField::new(99, &settings);
        let b = NoiseField::new(99, &settings);
        for i in 0..64 {
            let (x, y) = (f64::from(i) * 7.0, f64::from(i) * 11.0);
            assert_eq!(a.sample(x, y), b.sample(x, y));
        }
    }

    #[test]
    fn test_seed_offset_decorrelates() {
        let a = NoiseField::new(99, &NoiseSettings::simple(NoiseKind::Perlin, 0.03, 0));
        let b = NoiseField::new(99, &NoiseSettings::simple(NoiseKind::Perlin, 0.03, 1));
        let differs = (0..64).any(|i| {
            let (x, y) = (f64::from(i) * 5.3, f64::from(i) * 2.1);
            a.sample(x, y) != b.sample(x, y)
        });
        assert!(differs);
    }

    #[test]
    fn test_ping_pong_folds() {
        assert!((ping_pong(0.5) - 0.5).abs() < 1e-12);
        assert!((ping_pong(1.5) - 0.5).abs() < 1e-12);
        assert!((ping_pong(2.25) - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_field_is_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<NoiseField>();
    }
}
