//! Interval sample generator.
//!
//! One call to [`SampleGenerator::generate`] produces the five numeric samples
//! of a single inspection interval:
//!
//! 1. `base_k = floor(inspections * rate_k / 100)` for each defect category
//! 2. add independent integer noise in `[-2, 2]`
//! 3. clamp at zero
//! 4. `tag-4 = tag-1 + tag-2 + tag-3` (post-clamp)
//! 5. `tag-5 = inspections`, passed through untouched
//!
//! Noise comes from a [`NoiseSource`] so tests can pin it.

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::StreamConfig;
use crate::sample::{Sample, TagId};

/// Noise amplitude: offsets are drawn from `[-NOISE_AMPLITUDE, NOISE_AMPLITUDE]`.
pub const NOISE_AMPLITUDE: i64 = 2;

/// Number of samples emitted per interval.
pub const SAMPLES_PER_INTERVAL: usize = 5;

/// Source of per-category integer noise.
pub trait NoiseSource: Send {
    /// Next offset, within `[-NOISE_AMPLITUDE, NOISE_AMPLITUDE]`.
    fn offset(&mut self) -> i64;
}

/// Uniform integer noise from a seedable RNG.
pub struct UniformNoise {
    rng: StdRng,
}

impl UniformNoise {
    /// Seeded from the OS.
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_os_rng(),
        }
    }

    /// Reproducible noise for tests and demos.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Default for UniformNoise {
    fn default() -> Self {
        Self::new()
    }
}

impl NoiseSource for UniformNoise {
    fn offset(&mut self) -> i64 {
        self.rng.random_range(-NOISE_AMPLITUDE..=NOISE_AMPLITUDE)
    }
}

/// Always zero. Yields the bare `floor(inspections * rate / 100)` counts.
#[derive(Debug, Default, Clone, Copy)]
pub struct ZeroNoise;

impl NoiseSource for ZeroNoise {
    fn offset(&mut self) -> i64 {
        0
    }
}

impl NoiseSource for Box<dyn NoiseSource> {
    fn offset(&mut self) -> i64 {
        (**self).offset()
    }
}

/// Expected defects before noise: `floor(inspections * rate / 100)`.
pub fn base_defects(inspections: u32, rate_percent: f64) -> i64 {
    (f64::from(inspections) * rate_percent / 100.0).floor() as i64
}

/// Produces one interval's worth of samples per call.
pub struct SampleGenerator<N = UniformNoise> {
    noise: N,
}

impl SampleGenerator<UniformNoise> {
    pub fn new() -> Self {
        Self::with_noise(UniformNoise::new())
    }
}

impl Default for SampleGenerator<UniformNoise> {
    fn default() -> Self {
        Self::new()
    }
}

impl<N: NoiseSource> SampleGenerator<N> {
    pub fn with_noise(noise: N) -> Self {
        Self { noise }
    }

    /// Generate tag-1..tag-5 for one interval, all stamped `timestamp`.
    pub fn generate(
        &mut self,
        timestamp: DateTime<Utc>,
        config: &StreamConfig,
    ) -> [Sample; SAMPLES_PER_INTERVAL] {
        let inspections = config.inspections_per_interval;
        let [flange, glass, wall] = config.rates.as_array().map(|rate| {
            let noisy = base_defects(inspections, rate) + self.noise.offset();
            noisy.max(0) as u64
        });
        let total = flange + glass + wall;

        [
            Sample::count(TagId::FlangeDefects, flange, timestamp),
            Sample::count(TagId::GlassDefects, glass, timestamp),
            Sample::count(TagId::WallDefects, wall, timestamp),
            Sample::count(TagId::TotalDefects, total, timestamp),
            Sample::count(TagId::Inspected, u64::from(inspections), timestamp),
        ]
    }
}
