//! Random sources for the forecast noise term

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Produces samples uniformly distributed over `[-0.5, 0.5)`
pub trait NoiseSource {
    fn sample(&mut self) -> f64;
}

/// Thread-local RNG, non-reproducible
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadNoise;

impl NoiseSource for ThreadNoise {
    fn sample(&mut self) -> f64 {
        rand::thread_rng().gen_range(-0.5..0.5)
    }
}

/// Reproducible sequence from a fixed seed
#[derive(Debug, Clone)]
pub struct SeededNoise {
    rng: StdRng,
}

impl SeededNoise {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl NoiseSource for SeededNoise {
    fn sample(&mut self) -> f64 {
        self.rng.gen_range(-0.5..0.5)
    }
}

/// Always zero; leaves only the deterministic part of the forecast
#[derive(Debug, Default, Clone, Copy)]
pub struct NoNoise;

impl NoiseSource for NoNoise {
    fn sample(&mut self) -> f64 {
        0.0
    }
}

/// How each forecast request draws its noise
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoiseMode {
    Random,
    /// Every request replays the same sequence
    Seeded(u64),
    Disabled,
}

impl NoiseMode {
    pub fn source(&self) -> Box<dyn NoiseSource + Send> {
        match self {
            Self::Random => Box::new(ThreadNoise),
            Self::Seeded(seed) => Box::new(SeededNoise::new(*seed)),
            Self::Disabled => Box::new(NoNoise),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_samples_stay_in_range() {
        let mut sources: Vec<Box<dyn NoiseSource + Send>> =
            vec![NoiseMode::Random.source(), NoiseMode::Seeded(7).source()];
        for source in sources.iter_mut() {
            for _ in 0..1000 {
                let s = source.sample();
                assert!((-0.5..0.5).contains(&s), "sample {} out of range", s);
            }
        }
    }

    #[test]
    fn test_seeded_is_reproducible() {
        let mut a = SeededNoise::new(42);
        let mut b = SeededNoise::new(42);
        for _ in 0..16 {
            assert_eq!(a.sample(), b.sample());
        }
    }

    #[test]
    fn test_disabled_is_zero() {
        let mut source = NoiseMode::Disabled.source();
        assert_eq!(source.sample(), 0.0);
    }
}
