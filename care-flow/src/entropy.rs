use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::ops::RangeInclusive;

/// Per-session source of randomness handed to evaluators.
///
/// Seeded sessions produce reproducible outcomes; unseeded ones draw from the OS.
#[derive(Debug, Clone)]
pub struct Entropy {
    rng: StdRng,
}

impl Entropy {
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn from_os() -> Self {
        Self {
            rng: StdRng::from_os_rng(),
        }
    }

    /// Uniform draw from an inclusive integer range.
    pub fn between(&mut self, range: RangeInclusive<u32>) -> u32 {
        if range.is_empty() {
            return *range.start();
        }
        self.rng.random_range(range)
    }

    /// Uniform draw from `[0, 1)`.
    pub fn fraction(&mut self) -> f64 {
        self.rng.random::<f64>()
    }

    /// Uniform offset in `[-magnitude, magnitude)`.
    pub fn jitter(&mut self, magnitude: f64) -> f64 {
        (self.fraction() - 0.5) * 2.0 * magnitude
    }
}

impl Default for Entropy {
    fn default() -> Self {
        Self::from_os()
    }
}
